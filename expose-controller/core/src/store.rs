use crate::k8s;
use anyhow::Result;

/// Read and write access to the cluster resources the controller manages.
///
/// Lookups return `Ok(None)` for objects that do not exist, and deletes of
/// objects that do not exist succeed.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Lists the paths served at the API server's discovery root.
    async fn discovery_paths(&self) -> Result<Vec<String>>;

    async fn list_nodes(&self) -> Result<Vec<k8s::Node>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<k8s::Pod>>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<k8s::Service>>;

    /// Applies a JSON merge patch to a service.
    async fn patch_service(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()>;

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<k8s::Ingress>>;
    async fn create_ingress(&self, ingress: &k8s::Ingress) -> Result<()>;
    async fn replace_ingress(&self, ingress: &k8s::Ingress) -> Result<()>;
    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<()>;

    async fn list_routes(&self, namespace: &str) -> Result<Vec<k8s::Route>>;
    async fn create_route(&self, route: &k8s::Route) -> Result<()>;
    async fn replace_route(&self, route: &k8s::Route) -> Result<()>;
    async fn delete_route(&self, namespace: &str, name: &str) -> Result<()>;

    async fn list_config_maps(&self, namespace: &str) -> Result<Vec<k8s::ConfigMap>>;
    async fn replace_config_map(&self, config_map: &k8s::ConfigMap) -> Result<()>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<k8s::Deployment>>;
    async fn replace_deployment(&self, deployment: &k8s::Deployment) -> Result<()>;
}
