use super::{GatewayPolicy, PolicyStatus, Rules, TargetRef};

#[derive(
    Clone, Debug, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "kuadrant.io",
    version = "v1",
    kind = "RateLimitPolicy",
    status = "PolicyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicySpec {
    pub target_ref: TargetRef,
    /// Rate limits, keyed by name.
    #[serde(default)]
    pub limits: Rules,
}

impl GatewayPolicy for RateLimitPolicy {
    fn target_ref(&self) -> &TargetRef {
        &self.spec.target_ref
    }

    fn rules(&self) -> &Rules {
        &self.spec.limits
    }

    fn policy_status(&self) -> Option<&PolicyStatus> {
        self.status.as_ref()
    }
}
