mod auth_policy;
mod dns_policy;
mod ratelimit_policy;
mod target_ref;
mod tls_policy;

pub use self::{
    auth_policy::{AuthPolicy, AuthPolicySpec},
    dns_policy::{DnsPolicy, DnsPolicySpec},
    ratelimit_policy::{RateLimitPolicy, RateLimitPolicySpec},
    target_ref::TargetRef,
    tls_policy::{TlsPolicy, TlsPolicySpec},
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use std::collections::BTreeMap;

pub const POLICY_API_GROUP: &str = "kuadrant.io";

/// Named rules. Rule values are opaque to the controller.
pub type Rules = BTreeMap<String, serde_json::Value>;

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Accessors shared by every policy resource.
pub trait GatewayPolicy:
    kube::Resource<DynamicType = ()>
    + Clone
    + std::fmt::Debug
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn target_ref(&self) -> &TargetRef;

    fn rules(&self) -> &Rules;

    fn policy_status(&self) -> Option<&PolicyStatus>;
}

// === impl PolicyStatus ===

impl PolicyStatus {
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}
