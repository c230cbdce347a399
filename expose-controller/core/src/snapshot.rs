use crate::{
    k8s::{self, ResourceExt},
    Store, Strategy,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// A read-only view of the namespace a service lives in.
///
/// Objects are keyed by name. Only the routing resources of the active
/// strategy are loaded.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub namespace: String,
    pub ingresses: BTreeMap<String, k8s::Ingress>,
    pub routes: BTreeMap<String, k8s::Route>,
    pub config_maps: BTreeMap<String, k8s::ConfigMap>,
    pub deployments: BTreeMap<String, k8s::Deployment>,
}

impl Snapshot {
    pub fn new(namespace: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    pub async fn load<S: Store + ?Sized>(
        store: &S,
        namespace: &str,
        strategy: &Strategy,
    ) -> Result<Self> {
        let mut snapshot = Self::new(namespace);

        match strategy {
            Strategy::Ingress(_) => {
                let ingresses = store
                    .list_ingresses(namespace)
                    .await
                    .with_context(|| format!("failed to list ingresses in {namespace}"))?;
                snapshot = snapshot.with_ingresses(ingresses);
            }
            Strategy::Route(_) => {
                let routes = store
                    .list_routes(namespace)
                    .await
                    .with_context(|| format!("failed to list routes in {namespace}"))?;
                snapshot = snapshot.with_routes(routes);
            }
            Strategy::NodePort(_) | Strategy::LoadBalancer(_) => {}
        }

        let config_maps = store
            .list_config_maps(namespace)
            .await
            .with_context(|| format!("failed to list config maps in {namespace}"))?;
        let deployments = store
            .list_deployments(namespace)
            .await
            .with_context(|| format!("failed to list deployments in {namespace}"))?;

        Ok(snapshot
            .with_config_maps(config_maps)
            .with_deployments(deployments))
    }

    pub fn with_ingresses(mut self, items: impl IntoIterator<Item = k8s::Ingress>) -> Self {
        self.ingresses
            .extend(items.into_iter().map(|i| (i.name_any(), i)));
        self
    }

    pub fn with_routes(mut self, items: impl IntoIterator<Item = k8s::Route>) -> Self {
        self.routes
            .extend(items.into_iter().map(|r| (r.name_any(), r)));
        self
    }

    pub fn with_config_maps(mut self, items: impl IntoIterator<Item = k8s::ConfigMap>) -> Self {
        self.config_maps
            .extend(items.into_iter().map(|cm| (cm.name_any(), cm)));
        self
    }

    pub fn with_deployments(mut self, items: impl IntoIterator<Item = k8s::Deployment>) -> Self {
        self.deployments
            .extend(items.into_iter().map(|d| (d.name_any(), d)));
        self
    }
}
