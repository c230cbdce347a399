use crate::{
    annotations,
    k8s::{ResourceExt, Service},
    propagate::{self, Settings},
    restart, ExposeStrategy, Snapshot, Strategy, Write,
};
use std::collections::BTreeSet;
use tracing::{debug, error};

/// A change to a service observed by the watch.
#[derive(Clone, Debug)]
pub enum Notification {
    Added(Service),
    Updated { old: Service, new: Service },
    Deleted(Service),
}

/// Plans the writes that follow from a notification.
#[derive(Clone, Debug)]
pub struct Reconciler {
    strategy: Strategy,
    settings: Settings,
    services: Vec<String>,
}

/// Returns true if `svc` opts in to being exposed.
pub fn is_exposed(svc: &Service) -> bool {
    let labelled = |(key, value): (&str, &str)| svc.labels().get(key).is_some_and(|v| v == value);
    let annotated =
        |(key, value): (&str, &str)| svc.annotations().get(key).is_some_and(|v| v == value);
    labelled(annotations::EXPOSE_LABEL)
        || annotated(annotations::EXPOSE_ANNOTATION)
        || annotated(annotations::INJECT_ANNOTATION)
}

// === impl Notification ===

impl Notification {
    /// The most recent state of the service.
    pub fn service(&self) -> &Service {
        match self {
            Self::Added(svc) | Self::Deleted(svc) => svc,
            Self::Updated { new, .. } => new,
        }
    }
}

// === impl Reconciler ===

impl Reconciler {
    /// `services` restricts the handled services by name when non-empty.
    pub fn new(strategy: Strategy, settings: Settings, services: Vec<String>) -> Self {
        Self {
            strategy,
            settings,
            services,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Returns true if the notification may produce writes.
    pub fn wants(&self, notification: &Notification) -> bool {
        let name = notification.service().name_any();
        if !self.services.is_empty() && !self.services.contains(&name) {
            return false;
        }
        match notification {
            Notification::Added(svc) | Notification::Deleted(svc) => is_exposed(svc),
            Notification::Updated { old, new } => is_exposed(new) || is_exposed(old),
        }
    }

    pub fn plan(&self, notification: &Notification, snapshot: &Snapshot) -> Vec<Write> {
        if !self.wants(notification) {
            return Vec::new();
        }
        match notification {
            Notification::Added(svc) => self.plan_add(svc, snapshot),
            Notification::Updated { new, .. } if is_exposed(new) => self.plan_add(new, snapshot),
            Notification::Updated { new, .. } => self.plan_remove(new, snapshot),
            Notification::Deleted(svc) => {
                // The service is gone, so only its routing resources remain.
                let mut writes = self.plan_remove(svc, snapshot);
                writes.retain(|w| !w.is_service_patch());
                writes
            }
        }
    }

    fn plan_add(&self, svc: &Service, snapshot: &Snapshot) -> Vec<Write> {
        let (service, mut writes) = match self.strategy.add(svc, snapshot) {
            Ok(exposure) => (exposure.service, exposure.writes),
            Err(error) => {
                error!(
                    namespace = %svc.namespace().unwrap_or_default(),
                    name = %svc.name_any(),
                    %error,
                    "Failed to expose service",
                );
                (svc.clone(), Vec::new())
            }
        };

        let config_maps = propagate::propagate(&self.settings, &service, &snapshot.config_maps);
        if config_maps.is_empty() {
            debug!(name = %service.name_any(), "No config maps to update");
            return writes;
        }

        let mut deployments = snapshot.deployments.clone();
        let mut rolled = BTreeSet::new();
        for cm in &config_maps {
            rolled.extend(restart::roll(cm, &mut deployments));
        }

        writes.extend(config_maps.into_iter().map(Write::ReplaceConfigMap));
        writes.extend(
            rolled
                .into_iter()
                .filter_map(|name| deployments.remove(&name))
                .map(Write::ReplaceDeployment),
        );
        writes
    }

    fn plan_remove(&self, svc: &Service, snapshot: &Snapshot) -> Vec<Write> {
        match self.strategy.remove(svc, snapshot) {
            Ok(exposure) => exposure.writes,
            Err(error) => {
                error!(
                    namespace = %svc.namespace().unwrap_or_default(),
                    name = %svc.name_any(),
                    %error,
                    "Failed to remove service exposure",
                );
                Vec::new()
            }
        }
    }
}
