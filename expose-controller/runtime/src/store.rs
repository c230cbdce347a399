use crate::{
    core::Store,
    k8s::{
        self, is_not_found, Api, Client, DeleteParams, ListParams, NamespaceResourceScope, Patch,
        PatchParams, PostParams, Resource, ResourceExt,
    },
};
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

/// A [`Store`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

#[derive(Deserialize)]
struct RootPaths {
    paths: Vec<String>,
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn list<K>(&self, namespace: &str) -> Result<Vec<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
        K: Clone + DeserializeOwned + Debug,
    {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .with_context(|| format!("failed to list {} in {namespace}", K::plural(&())))?;
        Ok(list.items)
    }

    async fn create<K>(&self, obj: &K) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
        K: Clone + DeserializeOwned + Serialize + Debug,
    {
        let namespace = obj.namespace().unwrap_or_default();
        self.api::<K>(&namespace)
            .create(&PostParams::default(), obj)
            .await?;
        Ok(())
    }

    async fn replace<K>(&self, obj: &K) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
        K: Clone + DeserializeOwned + Serialize + Debug,
    {
        let namespace = obj.namespace().unwrap_or_default();
        self.api::<K>(&namespace)
            .replace(&obj.name_any(), &PostParams::default(), obj)
            .await?;
        Ok(())
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
        K: Clone + DeserializeOwned + Debug,
    {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(error) if is_not_found(&error) => {
                debug!(%namespace, %name, "Already deleted");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait::async_trait]
impl Store for KubeStore {
    async fn discovery_paths(&self) -> Result<Vec<String>> {
        let req = http::Request::get("/").body(Vec::new())?;
        let root = self
            .client
            .request::<RootPaths>(req)
            .await
            .context("failed to list API paths")?;
        Ok(root.paths)
    }

    async fn list_nodes(&self) -> Result<Vec<k8s::Node>> {
        let nodes = Api::<k8s::Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .context("failed to list nodes")?;
        Ok(nodes.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<k8s::Pod>> {
        let pod = self.api::<k8s::Pod>(namespace).get_opt(name).await?;
        Ok(pod)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<k8s::Service>> {
        let svc = self.api::<k8s::Service>(namespace).get_opt(name).await?;
        Ok(svc)
    }

    async fn patch_service(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()> {
        let params = PatchParams::default();
        self.api::<k8s::Service>(namespace)
            .patch(name, &params, &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn list_ingresses(&self, namespace: &str) -> Result<Vec<k8s::Ingress>> {
        self.list(namespace).await
    }

    async fn create_ingress(&self, ingress: &k8s::Ingress) -> Result<()> {
        self.create(ingress).await
    }

    async fn replace_ingress(&self, ingress: &k8s::Ingress) -> Result<()> {
        self.replace(ingress).await
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<()> {
        self.delete::<k8s::Ingress>(namespace, name).await
    }

    async fn list_routes(&self, namespace: &str) -> Result<Vec<k8s::Route>> {
        self.list(namespace).await
    }

    async fn create_route(&self, route: &k8s::Route) -> Result<()> {
        self.create(route).await
    }

    async fn replace_route(&self, route: &k8s::Route) -> Result<()> {
        self.replace(route).await
    }

    async fn delete_route(&self, namespace: &str, name: &str) -> Result<()> {
        self.delete::<k8s::Route>(namespace, name).await
    }

    async fn list_config_maps(&self, namespace: &str) -> Result<Vec<k8s::ConfigMap>> {
        self.list(namespace).await
    }

    async fn replace_config_map(&self, config_map: &k8s::ConfigMap) -> Result<()> {
        self.replace(config_map).await
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<k8s::Deployment>> {
        self.list(namespace).await
    }

    async fn replace_deployment(&self, deployment: &k8s::Deployment) -> Result<()> {
        self.replace(deployment).await
    }
}
