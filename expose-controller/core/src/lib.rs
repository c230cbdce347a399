//! Service exposure reconciliation engine
//!
//! The engine reacts to notifications about `Service` objects that opt in to
//! being exposed, and makes them reachable from outside the cluster:
//!
//! - A [`Strategy`] decides how the service is exposed (an `Ingress` rule, a
//!   node port, a load balancer, or an OpenShift `Route`) and produces the
//!   routing resource writes along with the desired state of the service.
//! - The [`patch`] engine diffs the observed and desired service so that a
//!   write-back is only issued when something actually changed.
//! - The [`propagate`] module injects the exposed URL into `ConfigMap` keys
//!   declared by annotations on those `ConfigMap`s.
//! - The [`restart`] module fingerprints every changed `ConfigMap` and stamps
//!   the fingerprint into the environment of the `Deployment`s that depend on
//!   it, forcing a rollout.
//!
//! ```text
//! [ Service ] -> [ Strategy ] -> [ Patch ] -> [ ConfigMap ] -> [ Deployment ]
//! ```
//!
//! Planning is a pure function of a notification and a read-only [`Snapshot`]
//! of the service's namespace; the resulting [`Write`]s are then applied in
//! order against a [`Store`].

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;
mod config;
mod controller;
pub mod patch;
pub mod platform;
pub mod propagate;
mod reconcile;
pub mod restart;
mod snapshot;
mod store;
pub mod strategy;
mod template;
pub mod urls;
mod write;


pub use self::{
    config::Config,
    controller::Controller,
    reconcile::{is_exposed, Notification, Reconciler},
    snapshot::Snapshot,
    store::Store,
    strategy::{select, ExposeError, ExposeStrategy, Exposure, Strategy},
    template::{TemplateError, UrlTemplate},
    write::{apply, Write},
};
pub use expose_controller_k8s_api as k8s;
