use crate::{
    k8s::{self, ResourceExt},
    Store,
};
use anyhow::{Context, Result};
use std::fmt;

/// A change the controller intends to make to the cluster.
#[derive(Clone, Debug)]
pub enum Write {
    CreateIngress(k8s::Ingress),
    ReplaceIngress(k8s::Ingress),
    DeleteIngress { namespace: String, name: String },

    CreateRoute(k8s::Route),
    ReplaceRoute(k8s::Route),
    DeleteRoute { namespace: String, name: String },

    PatchService {
        namespace: String,
        name: String,
        patch: serde_json::Value,
    },

    ReplaceConfigMap(k8s::ConfigMap),
    ReplaceDeployment(k8s::Deployment),
}

/// Applies `writes` in order, stopping at the first failure.
///
/// Writes after a failure are abandoned; a later notification is expected to
/// plan them again.
pub async fn apply<S: Store + ?Sized>(store: &S, writes: &[Write]) -> Result<()> {
    for write in writes {
        apply_one(store, write)
            .await
            .with_context(|| format!("failed to {write}"))?;
        tracing::info!(%write, "Applied");
    }
    Ok(())
}

async fn apply_one<S: Store + ?Sized>(store: &S, write: &Write) -> Result<()> {
    match write {
        Write::CreateIngress(ingress) => store.create_ingress(ingress).await,
        Write::ReplaceIngress(ingress) => store.replace_ingress(ingress).await,
        Write::DeleteIngress { namespace, name } => store.delete_ingress(namespace, name).await,
        Write::CreateRoute(route) => store.create_route(route).await,
        Write::ReplaceRoute(route) => store.replace_route(route).await,
        Write::DeleteRoute { namespace, name } => store.delete_route(namespace, name).await,
        Write::PatchService {
            namespace,
            name,
            patch,
        } => store.patch_service(namespace, name, patch).await,
        Write::ReplaceConfigMap(cm) => store.replace_config_map(cm).await,
        Write::ReplaceDeployment(deployment) => store.replace_deployment(deployment).await,
    }
}

impl Write {
    pub fn is_service_patch(&self) -> bool {
        matches!(self, Self::PatchService { .. })
    }
}

impl fmt::Display for Write {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn id<K: ResourceExt>(obj: &K) -> String {
            format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
        }

        match self {
            Self::CreateIngress(i) => write!(f, "create ingress {}", id(i)),
            Self::ReplaceIngress(i) => write!(f, "update ingress {}", id(i)),
            Self::DeleteIngress { namespace, name } => {
                write!(f, "delete ingress {namespace}/{name}")
            }
            Self::CreateRoute(r) => write!(f, "create route {}", id(r)),
            Self::ReplaceRoute(r) => write!(f, "update route {}", id(r)),
            Self::DeleteRoute { namespace, name } => write!(f, "delete route {namespace}/{name}"),
            Self::PatchService {
                namespace, name, ..
            } => write!(f, "patch service {namespace}/{name}"),
            Self::ReplaceConfigMap(cm) => write!(f, "update config map {}", id(cm)),
            Self::ReplaceDeployment(d) => write!(f, "update deployment {}", id(d)),
        }
    }
}
