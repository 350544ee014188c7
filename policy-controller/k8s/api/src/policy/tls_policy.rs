use super::{GatewayPolicy, PolicyStatus, Rules, TargetRef};

#[derive(
    Clone, Debug, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "kuadrant.io",
    version = "v1",
    kind = "TLSPolicy",
    root = "TlsPolicy",
    status = "PolicyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TlsPolicySpec {
    pub target_ref: TargetRef,
    /// Certificate issuance settings, keyed by name.
    #[serde(default)]
    pub rules: Rules,
}

impl GatewayPolicy for TlsPolicy {
    fn target_ref(&self) -> &TargetRef {
        &self.spec.target_ref
    }

    fn rules(&self) -> &Rules {
        &self.spec.rules
    }

    fn policy_status(&self) -> Option<&PolicyStatus> {
        self.status.as_ref()
    }
}
