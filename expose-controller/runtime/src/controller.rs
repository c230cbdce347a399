use crate::{
    core::{Controller, Notification, Store},
    k8s::{ResourceExt, Service},
    ControllerMetrics, Tracker,
};
use futures::prelude::*;
use kube::runtime::watcher::Event;
use tracing::{debug, error, info};

/// Handles service watch events until the stream ends.
///
/// Notifications are processed one at a time so that writes for a namespace
/// never interleave. A failed notification is logged and dropped; the next
/// event for the service plans its writes again.
pub async fn run<S, E>(controller: Controller<S>, events: E, metrics: ControllerMetrics)
where
    S: Store,
    E: Stream<Item = Event<Service>>,
{
    tokio::pin!(events);
    let mut tracker = Tracker::default();
    while let Some(event) = events.next().await {
        for notification in tracker.process(event) {
            handle(&controller, &notification, &metrics).await;
        }
    }
    info!("Service watch ended");
}

async fn handle<S: Store>(
    controller: &Controller<S>,
    notification: &Notification,
    metrics: &ControllerMetrics,
) {
    let svc = notification.service();
    let namespace = svc.namespace().unwrap_or_default();
    let name = svc.name_any();
    match controller.handle(notification).await {
        Ok(writes) => {
            debug!(%namespace, %name, writes, "Reconciled");
            metrics.handled(notification, writes);
        }
        Err(error) => {
            error!(
                %namespace,
                %name,
                error = %format_args!("{error:#}"),
                "Failed to reconcile service"
            );
            metrics.failed(notification);
        }
    }
}
