use crate::{gateway, http_route, index::meta, Index, ResourceId};
use anyhow::{bail, Result};
use gateway_policy_controller_core::{Level, Locator, Policy, PolicyKind, Validity};
use gateway_policy_controller_k8s_api::{
    self as k8s,
    policy::{GatewayPolicy, PolicyStatus, TargetRef},
    ResourceExt,
};

/// Associates a policy resource with the kind the engine merges it as.
pub trait PolicyResource: GatewayPolicy {
    const KIND: PolicyKind;
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct IndexedPolicy {
    pub policy: Policy,

    /// Unset when the target reference cannot name a routing object.
    pub target: Option<Locator>,
}

impl PolicyResource for k8s::policy::AuthPolicy {
    const KIND: PolicyKind = PolicyKind::Auth;
}

impl PolicyResource for k8s::policy::RateLimitPolicy {
    const KIND: PolicyKind = PolicyKind::RateLimit;
}

impl PolicyResource for k8s::policy::TlsPolicy {
    const KIND: PolicyKind = PolicyKind::Tls;
}

impl PolicyResource for k8s::policy::DnsPolicy {
    const KIND: PolicyKind = PolicyKind::Dns;
}

// === impl IndexedPolicy ===

impl IndexedPolicy {
    pub(crate) fn from_resource<P: PolicyResource>(resource: &P) -> Result<(ResourceId, Self)> {
        let Some(namespace) = resource.namespace() else {
            bail!("{} must have a namespace", P::KIND);
        };
        let name = resource.name_unchecked();
        let id = ResourceId::new(&namespace, &name);

        let mut policy = Policy::new(P::KIND, &namespace, &name);
        policy.meta = meta(policy.locator().clone(), resource.meta());
        policy.rules = resource.rules().clone();
        policy.last_known = resource
            .policy_status()
            .and_then(|status| last_known(status, resource.meta().generation));

        let target = target_locator(&namespace, resource.target_ref());
        if target.is_none() {
            tracing::info!(%id, kind = %P::KIND, target = ?resource.target_ref(), "Unsupported policy target");
        }
        Ok((id, Self { policy, target }))
    }
}

impl Index {
    fn index_policy<P: PolicyResource>(&mut self, resource: P) {
        match IndexedPolicy::from_resource(&resource) {
            Ok((id, policy)) => self.apply_policy(id, policy),
            Err(error) => {
                tracing::info!(name = %resource.name_any(), %error, "Ignoring policy");
            }
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::policy::AuthPolicy> for Index {
    fn apply(&mut self, resource: k8s::policy::AuthPolicy) {
        self.index_policy(resource)
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_policy(PolicyKind::Auth, ResourceId::new(namespace, name))
    }
}

impl kubert::index::IndexNamespacedResource<k8s::policy::RateLimitPolicy> for Index {
    fn apply(&mut self, resource: k8s::policy::RateLimitPolicy) {
        self.index_policy(resource)
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_policy(PolicyKind::RateLimit, ResourceId::new(namespace, name))
    }
}

impl kubert::index::IndexNamespacedResource<k8s::policy::TlsPolicy> for Index {
    fn apply(&mut self, resource: k8s::policy::TlsPolicy) {
        self.index_policy(resource)
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_policy(PolicyKind::Tls, ResourceId::new(namespace, name))
    }
}

impl kubert::index::IndexNamespacedResource<k8s::policy::DnsPolicy> for Index {
    fn apply(&mut self, resource: k8s::policy::DnsPolicy) {
        self.index_policy(resource)
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_policy(PolicyKind::Dns, ResourceId::new(namespace, name))
    }
}

/// Reads the Accepted condition last written by the controller. Conditions
/// written for an older generation of the policy are disregarded.
fn last_known(status: &PolicyStatus, generation: Option<i64>) -> Option<Validity> {
    let accepted = status.conditions.iter().find(|c| c.type_ == "Accepted")?;
    let observed = accepted.observed_generation.or(status.observed_generation);
    if let (Some(observed), Some(generation)) = (observed, generation) {
        if observed != generation {
            return None;
        }
    }
    match accepted.status.as_str() {
        "True" => Some(Validity::Valid),
        "False" => Some(Validity::Invalid(accepted.message.clone())),
        _ => None,
    }
}

/// Policies target objects in their own namespace. Gateway classes are
/// cluster-scoped and are targeted by name.
fn target_locator(namespace: &str, target: &TargetRef) -> Option<Locator> {
    let section = target.section_name.as_deref();
    if target.targets_kind::<k8s::gateway::GatewayClass>() {
        return section
            .is_none()
            .then(|| gateway::class_locator(&target.name));
    }
    if target.targets_kind::<k8s::gateway::Gateway>() {
        let gw = gateway::gateway_locator(&ResourceId::new(namespace, &target.name));
        return Some(match section {
            Some(listener) => gateway::listener_locator(&gw, listener),
            None => gw,
        });
    }
    if target.targets_kind::<k8s::gateway::HttpRoute>() {
        let route = http_route::route_locator(&ResourceId::new(namespace, &target.name));
        return Some(match section {
            Some(rule) => Locator::section(Level::RouteRule.kind(), &route, rule),
            None => route,
        });
    }
    None
}
