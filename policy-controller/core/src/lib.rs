//! Topology & effective-policy resolution.
//!
//! Routing objects form a hierarchy:
//!
//! ```text
//! [ GatewayClass ] -> [ Gateway ] -> [ Listener ] -> [ Route ] -> [ RouteRule ]
//!        ^                ^              ^              ^              ^
//!        +----------------+---- [ Policy ] (attached to any level) ----+
//! ```
//!
//! Every walk from a gateway class down to a route rule is a [`Path`]: one
//! distinct request-matching context. For each path and each [`PolicyKind`],
//! the policies attached along the path are merged into a single
//! [`EffectivePolicy`] where the most specific policy wins each rule key. The
//! resulting index feeds the status computation, which reports whether each
//! policy is accepted and enforced, and the config compiler, which groups
//! effective policies into the artifacts that downstream systems consume.
//!
//! Nothing here is incremental: every pass rebuilds the [`Graph`] from a
//! snapshot of the cluster cache and recomputes the index from scratch.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod compile;
mod component;
pub mod effective;
pub mod graph;
mod locator;
mod node;
pub mod path;
mod policy;
pub mod status;


pub use self::{
    compile::CompiledConfig,
    component::{ArtifactScope, Component, Provider, Providers},
    effective::{effective_policy_for_path, EffectivePolicies, EffectivePolicy, MergedRule},
    graph::{Graph, InconsistentGraphError, Snapshot},
    locator::Locator,
    node::{Level, Meta, Node},
    path::{Path, PathId},
    policy::{AcceptanceError, AcceptancePredicate, LastKnownStatus, Policy, PolicyKind, Validity},
    status::{
        ComponentReadiness, Enforcement, MissingRequiredStateError, PolicyStatus,
        ReadinessSnapshot, StatusComputer,
    },
};

pub const ISTIO_CONTROLLER_NAME: &str = "istio.io/gateway-controller";
pub const ENVOY_GATEWAY_CONTROLLER_NAME: &str = "gateway.envoyproxy.io/gatewayclass-controller";
