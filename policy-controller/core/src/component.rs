use crate::{
    graph::Graph, status::MissingRequiredStateError, Level, Node, Path, PolicyKind,
    ENVOY_GATEWAY_CONTROLLER_NAME, ISTIO_CONTROLLER_NAME,
};
use ahash::AHashMap as HashMap;

/// The gateway implementation behind a gateway class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Provider {
    Istio,
    EnvoyGateway,
    Other,
}

/// Maps gateway class controller names to providers.
#[derive(Clone, Debug)]
pub struct Providers {
    by_controller: HashMap<String, Provider>,
}

/// A downstream artifact kind that materializes effective policies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Component {
    /// Auth-decision service configuration.
    AuthConfig,
    /// Rate-limit service limits.
    Limits,
    IstioEnvoyFilter,
    IstioWasmPlugin,
    EnvoyPatchPolicy,
    EnvoyExtensionPolicy,
    Certificate,
    DnsRecord,
}

/// How many artifacts of a component a gateway gets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArtifactScope {
    PerPath,
    PerListener,
    PerGateway,
}

// === impl Providers ===

impl Default for Providers {
    fn default() -> Self {
        Self {
            by_controller: HashMap::default(),
        }
        .with_controller(ISTIO_CONTROLLER_NAME, Provider::Istio)
        .with_controller(ENVOY_GATEWAY_CONTROLLER_NAME, Provider::EnvoyGateway)
    }
}

impl Providers {
    pub fn with_controller(mut self, controller_name: impl ToString, provider: Provider) -> Self {
        self.by_controller
            .insert(controller_name.to_string(), provider);
        self
    }

    pub fn for_controller(&self, controller_name: &str) -> Provider {
        self.by_controller
            .get(controller_name)
            .copied()
            .unwrap_or(Provider::Other)
    }

    /// Resolves the provider of the gateway class at the root of `path`.
    pub fn for_path(&self, graph: &Graph, path: &Path) -> Result<Provider, MissingRequiredStateError> {
        let missing = || {
            MissingRequiredStateError::GatewayClass(
                path.at(Level::Gateway)
                    .or_else(|| path.leaf())
                    .cloned()
                    .unwrap_or_else(|| "<empty path>".into()),
            )
        };
        let class = path.at(Level::GatewayClass).ok_or_else(missing)?;
        match graph.node(class) {
            Some(Node::GatewayClass {
                controller_name, ..
            }) => Ok(self.for_controller(controller_name)),
            _ => Err(missing()),
        }
    }
}

// === impl Component ===

impl Component {
    /// The components that must reflect a policy of `kind` on a gateway run
    /// by `provider`.
    pub fn for_policy(kind: PolicyKind, provider: Provider) -> &'static [Component] {
        use Component::*;
        match (kind, provider) {
            (PolicyKind::Auth, Provider::Istio) => &[AuthConfig, IstioEnvoyFilter, IstioWasmPlugin],
            (PolicyKind::Auth, Provider::EnvoyGateway) => {
                &[AuthConfig, EnvoyPatchPolicy, EnvoyExtensionPolicy]
            }
            (PolicyKind::Auth, Provider::Other) => &[AuthConfig],
            (PolicyKind::RateLimit, Provider::Istio) => &[Limits, IstioEnvoyFilter, IstioWasmPlugin],
            (PolicyKind::RateLimit, Provider::EnvoyGateway) => {
                &[Limits, EnvoyPatchPolicy, EnvoyExtensionPolicy]
            }
            (PolicyKind::RateLimit, Provider::Other) => &[Limits],
            (PolicyKind::Tls, _) => &[Certificate],
            (PolicyKind::Dns, _) => &[DnsRecord],
        }
    }

    pub fn scope(&self) -> ArtifactScope {
        match self {
            Self::AuthConfig => ArtifactScope::PerPath,
            Self::Certificate | Self::DnsRecord => ArtifactScope::PerListener,
            Self::Limits
            | Self::IstioEnvoyFilter
            | Self::IstioWasmPlugin
            | Self::EnvoyPatchPolicy
            | Self::EnvoyExtensionPolicy => ArtifactScope::PerGateway,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthConfig => "AuthConfig",
            Self::Limits => "Limits",
            Self::IstioEnvoyFilter => "EnvoyFilter",
            Self::IstioWasmPlugin => "WasmPlugin",
            Self::EnvoyPatchPolicy => "EnvoyPatchPolicy",
            Self::EnvoyExtensionPolicy => "EnvoyExtensionPolicy",
            Self::Certificate => "Certificate",
            Self::DnsRecord => "DNSRecord",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind().fmt(f)
    }
}
