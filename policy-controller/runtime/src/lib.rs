//! Drives policy passes.
//!
//! A pass takes a snapshot of the cluster index, builds the topology graph,
//! resolves effective policies for each enabled kind concurrently, compiles
//! and reconciles the downstream artifacts, and finally publishes policy
//! statuses. Index changes trigger passes; changes that arrive while a pass is
//! running coalesce into a single follow-up pass.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use gateway_policy_controller_core as core;
pub use gateway_policy_controller_k8s_api as k8s;
pub use gateway_policy_controller_k8s_index as index;
pub use gateway_policy_controller_k8s_status as status;

mod config;
mod controller;
mod metrics;
mod pass;
mod reconcile;
mod watches;


pub use self::{
    config::Config,
    controller::PolicyController,
    metrics::PassMetrics,
    pass::{run_pass, PassContext, PassOutcome},
    reconcile::{InMemoryReconciler, Reconcile},
    watches::Watches,
};
