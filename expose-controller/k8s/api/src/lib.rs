#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod route;

pub use self::route::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            ConfigMap, Container, EnvVar, Node, NodeAddress, NodeStatus, Pod, PodSpec,
            PodTemplateSpec, Service, ServicePort, ServiceSpec,
        },
        networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
            IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
        },
    },
    apimachinery::pkg::{apis::meta::v1::OwnerReference, util::intstr::IntOrString},
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    Client, Error, Resource,
};

/// The service type that exposes a port on every node.
pub const SERVICE_TYPE_NODE_PORT: &str = "NodePort";

/// The service type that requests a provider load balancer.
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

/// Node address types, in the order they are preferred.
pub const NODE_EXTERNAL_IP: &str = "ExternalIP";
pub const NODE_INTERNAL_IP: &str = "InternalIP";

/// Returns true if the error is an API response indicating that the
/// requested object does not exist.
pub fn is_not_found(error: &Error) -> bool {
    matches!(error, Error::Api(rsp) if rsp.code == 404)
}
