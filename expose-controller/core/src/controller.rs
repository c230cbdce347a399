use crate::{
    config::{non_empty, Config},
    k8s::ResourceExt,
    platform,
    propagate::Settings,
    strategy, write, Notification, Reconciler, Snapshot, Store,
};
use anyhow::{Context, Result};
use tracing::{debug, info};

/// Drives reconciliation of service notifications against a store.
#[derive(Debug)]
pub struct Controller<S> {
    reconciler: Reconciler,
    store: S,
}

impl<S: Store> Controller<S> {
    /// Selects the exposure strategy and resolves the cluster settings.
    ///
    /// Fails when the configured strategy cannot be used on this cluster.
    pub async fn new(config: &Config, store: S) -> Result<Self> {
        let strategy = strategy::select(config, &store)
            .await
            .context("failed to create new strategy")?;

        let api_server_protocol = match non_empty(&config.api_server_protocol) {
            Some(protocol) => protocol.to_string(),
            None => platform::api_server_protocol(&store).await,
        };
        let settings = Settings {
            api_server: non_empty(&config.api_server).map(Into::into),
            api_server_protocol,
            console_url: non_empty(&config.console_url).map(Into::into),
            url_protocol: if config.http { "http" } else { "https" }.to_string(),
        };
        info!(api_server_protocol = %settings.api_server_protocol, "Controller configured");

        let reconciler = Reconciler::new(strategy, settings, config.services.clone());
        Ok(Self::from_parts(reconciler, store))
    }

    pub fn from_parts(reconciler: Reconciler, store: S) -> Self {
        Self { reconciler, store }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handles a notification to completion, returning the number of writes
    /// applied.
    pub async fn handle(&self, notification: &Notification) -> Result<usize> {
        if !self.reconciler.wants(notification) {
            return Ok(0);
        }

        let svc = notification.service();
        let namespace = svc.namespace().unwrap_or_default();
        let snapshot = Snapshot::load(&self.store, &namespace, self.reconciler.strategy())
            .await
            .with_context(|| format!("failed to load namespace {namespace}"))?;

        let writes = self.reconciler.plan(notification, &snapshot);
        debug!(%namespace, name = %svc.name_any(), writes = writes.len(), "Planned");
        write::apply(&self.store, &writes).await?;
        Ok(writes.len())
    }
}
