//! Cluster platform and address discovery.

use crate::{
    annotations,
    k8s::{self, ResourceExt},
    strategy::{ExposeError, ExposerKind},
    Store,
};
use anyhow::{Context, Result};
use std::fmt;
use tracing::debug;

const OPENSHIFT_API_PATH: &str = "/oapi";

const SINGLE_NODE_NAMES: [&str; 2] = ["minikube", "minishift"];

const BALANCER_NAMESPACE: &str = "stackpoint-system";
const BALANCER_NAME: &str = "spc-balancer";
const BALANCER_IP_ENV: &str = "BALANCER_IP";

const NIP_IO: &str = "nip.io";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Platform {
    Kubernetes,
    OpenShift,
}

// === impl Platform ===

impl Platform {
    /// Inspects the API server's discovery root.
    pub async fn detect<S: Store + ?Sized>(store: &S) -> Result<Self> {
        let paths = store
            .discovery_paths()
            .await
            .context("could not discover the type of your installation")?;
        Ok(Self::from_paths(&paths))
    }

    pub fn from_paths<P: AsRef<str>>(paths: &[P]) -> Self {
        if paths.iter().any(|p| p.as_ref() == OPENSHIFT_API_PATH) {
            Self::OpenShift
        } else {
            Self::Kubernetes
        }
    }

    pub fn default_exposer(self) -> ExposerKind {
        match self {
            Self::Kubernetes => ExposerKind::Ingress,
            Self::OpenShift => ExposerKind::Route,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kubernetes => "Kubernetes",
            Self::OpenShift => "OpenShift",
        })
    }
}

// === Domain discovery ===

/// Derives a wildcard DNS domain from the cluster's nodes.
///
/// Single node development clusters and a node labelled as the external IP
/// holder yield `<ip>.nip.io` for that node; StackPoint clusters use the
/// address of their balancer.
pub async fn default_domain<S: Store + ?Sized>(store: &S) -> Result<String> {
    let nodes = store.list_nodes().await.context("failed to list nodes")?;

    if let [node] = nodes.as_slice() {
        if SINGLE_NODE_NAMES.contains(&node.name_any().as_str()) {
            let ip = node_external_ip(node)?;
            return Ok(format!("{ip}.{NIP_IO}"));
        }
    }

    let labelled = nodes
        .iter()
        .filter(|node| {
            node.labels()
                .get(annotations::EXTERNAL_IP_LABEL)
                .is_some_and(|v| v == "true")
        })
        .collect::<Vec<_>>();
    if let [node] = labelled.as_slice() {
        let ip = node_external_ip(node)?;
        return Ok(format!("{ip}.{NIP_IO}"));
    }

    match store.get_pod(BALANCER_NAMESPACE, BALANCER_NAME).await {
        Ok(Some(pod)) => {
            if let Some(ip) = balancer_ip(&pod) {
                return Ok(format!("{ip}.{NIP_IO}"));
            }
        }
        Ok(None) => {}
        Err(error) => debug!(%error, "No balancer pod"),
    }

    Err(ExposeError::NoDomain.into())
}

fn balancer_ip(pod: &k8s::Pod) -> Option<&str> {
    pod.spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .filter(|c| c.name == BALANCER_NAME)
        .flat_map(|c| c.env.iter().flatten())
        .find(|env| env.name == BALANCER_IP_ENV)
        .and_then(|env| env.value.as_deref())
        .filter(|v| !v.is_empty())
}

/// The address used to build a node's nip.io domain.
///
/// A kubelet-provided node IP annotation takes precedence over the node's
/// reported addresses.
pub fn node_external_ip(node: &k8s::Node) -> Result<String, ExposeError> {
    if let Some(ip) = node
        .annotations()
        .iter()
        .find(|(k, v)| k.ends_with(annotations::PROVIDED_NODE_IP_SUFFIX) && !v.is_empty())
        .map(|(_, v)| v.clone())
    {
        return Ok(ip);
    }
    node_host_ip(node).ok_or_else(|| ExposeError::NoNodeAddress(node.name_any()))
}

/// The first external address of a node, else its first internal address.
pub fn node_host_ip(node: &k8s::Node) -> Option<String> {
    let addresses = node
        .status
        .as_ref()
        .and_then(|status| status.addresses.as_deref())
        .unwrap_or_default();
    let first = |kind: &str| {
        addresses
            .iter()
            .find(|a| a.type_ == kind && !a.address.is_empty())
            .map(|a| a.address.clone())
    };
    first(k8s::NODE_EXTERNAL_IP).or_else(|| first(k8s::NODE_INTERNAL_IP))
}

// === API server protocol ===

const API_SERVER_NAMESPACE: &str = "default";
const API_SERVER_SERVICE: &str = "kubernetes";

/// Infers the protocol the API server is reached with from the `kubernetes`
/// service. Defaults to `https`.
pub async fn api_server_protocol<S: Store + ?Sized>(store: &S) -> String {
    match store
        .get_service(API_SERVER_NAMESPACE, API_SERVER_SERVICE)
        .await
    {
        Ok(Some(svc)) => service_protocol(&svc).to_string(),
        Ok(None) => "https".to_string(),
        Err(error) => {
            debug!(%error, "Could not look up the API server service");
            "https".to_string()
        }
    }
}

fn service_protocol(svc: &k8s::Service) -> &'static str {
    let ports = svc
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default();
    let any = |name: &str, number: i32| {
        ports
            .iter()
            .any(|p| p.name.as_deref() == Some(name) || p.port == number)
    };
    if any("https", 443) {
        "https"
    } else if any("http", 80) {
        "http"
    } else {
        "https"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{
        EnvVar, NodeAddress, NodeStatus, ObjectMeta, ServicePort, ServiceSpec,
    };
    use maplit::btreemap;

    fn node(name: &str, addresses: &[(&str, &str)]) -> k8s::Node {
        k8s::Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                addresses: Some(
                    addresses
                        .iter()
                        .map(|(type_, address)| NodeAddress {
                            type_: type_.to_string(),
                            address: address.to_string(),
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn detects_openshift() {
        assert_eq!(
            Platform::from_paths(&["/api", "/apis", "/oapi"]),
            Platform::OpenShift
        );
        assert_eq!(
            Platform::from_paths(&["/api", "/apis", "/healthz"]),
            Platform::Kubernetes
        );
        assert_eq!(Platform::OpenShift.default_exposer(), ExposerKind::Route);
        assert_eq!(Platform::Kubernetes.default_exposer(), ExposerKind::Ingress);
    }

    #[test]
    fn node_addresses() {
        let n = node(
            "n1",
            &[("InternalIP", "192.168.0.2"), ("ExternalIP", "10.0.0.5")],
        );
        assert_eq!(node_host_ip(&n).as_deref(), Some("10.0.0.5"));
        assert_eq!(node_external_ip(&n).unwrap(), "10.0.0.5");

        let n = node("n1", &[("Hostname", "n1"), ("InternalIP", "192.168.0.2")]);
        assert_eq!(node_host_ip(&n).as_deref(), Some("192.168.0.2"));

        let mut n = node("n1", &[("InternalIP", "192.168.0.2")]);
        n.metadata.annotations = Some(btreemap! {
            "alpha.kubernetes.io/provided-node-ip".to_string() => "172.16.0.9".to_string(),
        });
        assert_eq!(node_external_ip(&n).unwrap(), "172.16.0.9");

        let n = node("n1", &[("Hostname", "n1")]);
        assert!(node_host_ip(&n).is_none());
        assert!(node_external_ip(&n).is_err());
    }

    #[test]
    fn balancer_env() {
        let pod = k8s::Pod {
            spec: Some(k8s::PodSpec {
                containers: vec![k8s::Container {
                    name: BALANCER_NAME.to_string(),
                    env: Some(vec![EnvVar {
                        name: BALANCER_IP_ENV.to_string(),
                        value: Some("34.1.2.3".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(balancer_ip(&pod), Some("34.1.2.3"));
    }

    #[test]
    fn kubernetes_service_protocol() {
        let svc = |ports: Vec<ServicePort>| k8s::Service {
            spec: Some(ServiceSpec {
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        };
        let port = |name: &str, port: i32| ServicePort {
            name: Some(name.to_string()),
            port,
            ..Default::default()
        };

        assert_eq!(service_protocol(&svc(vec![port("https", 6443)])), "https");
        assert_eq!(service_protocol(&svc(vec![port("api", 443)])), "https");
        assert_eq!(service_protocol(&svc(vec![port("http", 8080)])), "http");
        assert_eq!(service_protocol(&svc(vec![port("api", 80)])), "http");
        assert_eq!(service_protocol(&svc(vec![port("api", 8080)])), "https");
    }
}
