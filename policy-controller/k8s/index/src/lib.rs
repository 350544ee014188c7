//! Gateway policy cache index
//!
//! Indexes the cluster objects the policy engine reasons about:
//!
//! - Each `GatewayClass` names the controller that implements its gateways.
//! - Each `Gateway` references a class and enumerates its listeners.
//! - Each `HTTPRoute` references the gateways (or individual listeners) it binds to and enumerates
//!   its rules.
//! - Each policy (`AuthPolicy`, `RateLimitPolicy`, `TLSPolicy`, `DNSPolicy`) references a single
//!   object in its namespace, or a section of one.
//!
//! ```text
//! [ GatewayClass ] <- [ Gateway ] <- [ HTTPRoute ]
//!         ^               ^               ^
//!         +-------------- [ Policy ] -----+
//! ```
//!
//! The index does not resolve anything itself. Each change wakes the policy pass, which takes a
//! [`Snapshot`](gateway_policy_controller_core::Snapshot) of the index and rebuilds the topology
//! graph from it.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod gateway;
mod http_route;
mod index;
pub mod metrics;
mod policy;

#[cfg(test)]
mod tests;

pub use self::{
    index::{Index, ResourceId, SharedIndex},
    metrics::IndexMetrics,
    policy::PolicyResource,
};
