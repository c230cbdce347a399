#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod controller;
mod metrics;
mod store;
mod tracker;

pub use self::{args::Args, metrics::ControllerMetrics, store::KubeStore, tracker::Tracker};
pub use expose_controller_core::{self as core, k8s};
