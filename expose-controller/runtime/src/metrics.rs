use crate::core::Notification;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::{
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct ControllerMetrics {
    notifications: Family<NotificationLabels, Counter>,
    writes: Counter,
    failures: Family<NotificationLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct NotificationLabels {
    kind: &'static str,
}

impl NotificationLabels {
    fn of(notification: &Notification) -> Self {
        let kind = match notification {
            Notification::Added(_) => "added",
            Notification::Updated { .. } => "updated",
            Notification::Deleted(_) => "deleted",
        };
        Self { kind }
    }
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let notifications = Family::<NotificationLabels, Counter>::default();
        reg.register(
            "notifications",
            "Total number of service notifications handled",
            notifications.clone(),
        );

        let writes = Counter::default();
        reg.register(
            "writes",
            "Total number of resource writes applied",
            writes.clone(),
        );

        let failures = Family::<NotificationLabels, Counter>::default();
        reg.register(
            "failures",
            "Total number of service notifications that failed to reconcile",
            failures.clone(),
        );

        Self {
            notifications,
            writes,
            failures,
        }
    }

    pub(crate) fn handled(&self, notification: &Notification, writes: usize) {
        self.notifications
            .get_or_create(&NotificationLabels::of(notification))
            .inc();
        self.writes.inc_by(writes as u64);
    }

    pub(crate) fn failed(&self, notification: &Notification) {
        let labels = NotificationLabels::of(notification);
        self.notifications.get_or_create(&labels).inc();
        self.failures.get_or_create(&labels).inc();
    }
}
