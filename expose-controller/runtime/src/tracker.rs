use crate::{
    core::Notification,
    k8s::{ResourceExt, Service},
};
use kube::runtime::watcher::Event;
use std::collections::{HashMap, HashSet};

type Key = (String, String);

/// Turns service watch events into notifications.
///
/// The tracker remembers the last observed state of each service so that
/// updates carry the previous object, and so that services which disappear
/// while the watch is restarting are reported as deleted.
#[derive(Debug, Default)]
pub struct Tracker {
    services: HashMap<Key, Service>,
    relisted: Option<HashSet<Key>>,
}

fn key(svc: &Service) -> Key {
    (svc.namespace().unwrap_or_default(), svc.name_any())
}

// === impl Tracker ===

impl Tracker {
    pub fn process(&mut self, event: Event<Service>) -> Vec<Notification> {
        match event {
            Event::Init => {
                tracing::debug!("Restarting service watch");
                self.relisted = Some(HashSet::new());
                Vec::new()
            }

            Event::InitApply(svc) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(key(&svc));
                }
                vec![self.apply(svc)]
            }

            Event::Apply(svc) => vec![self.apply(svc)],

            Event::Delete(svc) => {
                self.services.remove(&key(&svc));
                vec![Notification::Deleted(svc)]
            }

            Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return Vec::new();
                };
                let gone = self
                    .services
                    .keys()
                    .filter(|k| !relisted.contains(*k))
                    .cloned()
                    .collect::<Vec<_>>();
                gone.into_iter()
                    .filter_map(|k| self.services.remove(&k))
                    .map(|svc| {
                        let (namespace, name) = key(&svc);
                        tracing::debug!(%namespace, %name, "Service removed while relisting");
                        Notification::Deleted(svc)
                    })
                    .collect()
            }
        }
    }

    fn apply(&mut self, svc: Service) -> Notification {
        match self.services.insert(key(&svc), svc.clone()) {
            Some(old) => Notification::Updated { old, new: svc },
            None => Notification::Added(svc),
        }
    }
}
