//! Label, annotation and environment contracts.

// === Service selection ===

/// A service labelled `expose=true` is exposed.
pub const EXPOSE_LABEL: (&str, &str) = ("expose", "true");

/// A service annotated `fabric8.io/expose=true` is exposed.
pub const EXPOSE_ANNOTATION: (&str, &str) = ("fabric8.io/expose", "true");

/// A service annotated `fabric8.io/inject=true` has its values injected into
/// config maps and is exposed.
pub const INJECT_ANNOTATION: (&str, &str) = ("fabric8.io/inject", "true");

// === Service write-back ===

/// Holds the externally reachable URL of the service.
pub const EXPOSE_URL: &str = "fabric8.io/exposeUrl";

/// Names an additional annotation that receives the bare exposed host.
pub const EXPOSE_HOST_NAME_AS: &str = "fabric8.io/exposeHostNameAs";

/// A path appended to the exposed URL.
pub const API_SERVICE_PATH: &str = "api.service.kubernetes.io/path";

// === Service routing overrides ===

pub const EXPOSE_PORT: &str = "fabric8.io/exposePort";
pub const INGRESS_NAME: &str = "fabric8.io/ingress.name";
pub const HOST_NAME: &str = "fabric8.io/host.name";
pub const INGRESS_PATH: &str = "fabric8.io/ingress.path";
pub const PATH_MODE: &str = "fabric8.io/path.mode";
pub const USE_INTERNAL_DOMAIN: &str = "fabric8.io/use.internal.domain";
pub const INGRESS_ANNOTATIONS: &str = "fabric8.io/ingress.annotations";
pub const SKIP_TLS: &str = "jenkins-x.io/skip.tls";

/// The value of [`PATH_MODE`] that routes by path on the bare domain.
pub const PATH_MODE_USE_PATH: &str = "path";

/// The label carrying a Helm release name, stripped from application names.
pub const RELEASE_LABEL: &str = "release";

// === Routing resource markers ===

pub const PROVIDER_LABEL: (&str, &str) = ("provider", "fabric8");
pub const GENERATED_BY: (&str, &str) = ("fabric8.io/generated-by", "exposecontroller");
pub const INGRESS_CLASS: &str = "kubernetes.io/ingress.class";
pub const NGINX_INGRESS_CLASS: &str = "nginx.ingress.kubernetes.io/ingress.class";
pub const DEFAULT_INGRESS_CLASS: &str = "nginx";
pub const TLS_ACME: &str = "kubernetes.io/tls-acme";

// === Nodes ===

/// Marks the node whose address is used for wildcard DNS, and, as an
/// annotation, overrides that address.
pub const EXTERNAL_IP_LABEL: &str = "fabric8.io/externalIP";

/// Suffix of the kubelet annotation holding the node's provided IP.
pub const PROVIDED_NODE_IP_SUFFIX: &str = "kubernetes.io/provided-node-ip";

// === Config map propagation ===

/// Any config map may name keys that receive the protocol services are
/// exposed with.
pub const CONFIG_URL_PROTOCOL: &str = "expose.config.fabric8.io/url-protocol";
pub const CONFIG_URL_KEY: &str = "expose.config.fabric8.io/url-key";
pub const CONFIG_HOST_KEY: &str = "expose.config.fabric8.io/host-key";
pub const CONFIG_PATH_KEY: &str = "expose.config.fabric8.io/path-key";
pub const CONFIG_CLUSTER_IP_KEY: &str = "expose.config.fabric8.io/clusterip-key";
pub const CONFIG_CLUSTER_IP_PORT_KEY: &str = "expose.config.fabric8.io/clusterip-port-key";
pub const CONFIG_CLUSTER_IP_PORT_IF_EMPTY_KEY: &str =
    "expose.config.fabric8.io/clusterip-port-if-empty-key";
pub const CONFIG_API_SERVER_KEY: &str = "expose.config.fabric8.io/apiserver-key";
pub const CONFIG_API_SERVER_URL_KEY: &str = "expose.config.fabric8.io/apiserver-url-key";
pub const CONFIG_API_SERVER_PROTOCOL_KEY: &str = "expose.config.fabric8.io/apiserver-protocol-key";
pub const CONFIG_CONSOLE_URL_KEY: &str = "expose.config.fabric8.io/console-url-key";

/// A YAML list of line rewrites, carried on the service.
pub const CONFIG_YAML: &str = "expose.config.fabric8.io/config-yaml";

// === Rollouts ===

/// Comma separated config map names a deployment restarts on.
pub const UPDATE_ON_CHANGE: &str = "configmap.fabric8.io/update-on-change";

pub const CONFIG_MAP_ENV_PREFIX: &str = "FABRIC8_";
pub const CONFIG_MAP_ENV_SUFFIX: &str = "_CONFIGMAP";
