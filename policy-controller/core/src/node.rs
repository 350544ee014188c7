use crate::{Locator, Policy};
use chrono::{offset::Utc, DateTime};

/// A level of the routing hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Level {
    GatewayClass,
    Gateway,
    Listener,
    Route,
    RouteRule,
}

/// Object metadata common to every node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Meta {
    pub locator: Locator,
    pub generation: Option<i64>,
    pub resource_version: Option<String>,
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Set when the backing object carries a deletion timestamp.
    pub deleting: bool,
}

/// A graph node: either a routing object at some [`Level`] or a policy.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    GatewayClass { meta: Meta, controller_name: String },
    Gateway(Meta),
    Listener(Meta),
    Route(Meta),
    RouteRule(Meta),
    Policy(Policy),
}

// === impl Level ===

impl Level {
    /// All levels, outermost first.
    pub const ALL: [Level; 5] = [
        Level::GatewayClass,
        Level::Gateway,
        Level::Listener,
        Level::Route,
        Level::RouteRule,
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::GatewayClass => "GatewayClass",
            Self::Gateway => "Gateway",
            Self::Listener => "Listener",
            Self::Route => "HTTPRoute",
            Self::RouteRule => "HTTPRouteRule",
        }
    }

    pub fn outermost() -> Level {
        Self::ALL[0]
    }

    /// The innermost level; paths end here.
    pub fn innermost() -> Level {
        Self::ALL[Self::ALL.len() - 1]
    }
}

// === impl Meta ===

impl Meta {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            generation: None,
            resource_version: None,
            creation_timestamp: None,
            deleting: false,
        }
    }

    pub fn with_creation_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.creation_timestamp = Some(ts);
        self
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }
}

// === impl Node ===

impl Node {
    pub fn meta(&self) -> &Meta {
        match self {
            Self::GatewayClass { meta, .. } => meta,
            Self::Gateway(meta)
            | Self::Listener(meta)
            | Self::Route(meta)
            | Self::RouteRule(meta) => meta,
            Self::Policy(policy) => &policy.meta,
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.meta().locator
    }

    /// The node's hierarchy level, or `None` for policies.
    pub fn level(&self) -> Option<Level> {
        match self {
            Self::GatewayClass { .. } => Some(Level::GatewayClass),
            Self::Gateway(_) => Some(Level::Gateway),
            Self::Listener(_) => Some(Level::Listener),
            Self::Route(_) => Some(Level::Route),
            Self::RouteRule(_) => Some(Level::RouteRule),
            Self::Policy(_) => None,
        }
    }

    pub fn as_policy(&self) -> Option<&Policy> {
        match self {
            Self::Policy(policy) => Some(policy),
            _ => None,
        }
    }

    /// Builds a routing node at `level`. Gateway classes are built with
    /// [`Node::GatewayClass`] directly since they carry a controller name.
    pub fn at_level(level: Level, meta: Meta) -> Self {
        match level {
            Level::GatewayClass => Self::GatewayClass {
                meta,
                controller_name: String::new(),
            },
            Level::Gateway => Self::Gateway(meta),
            Level::Listener => Self::Listener(meta),
            Level::Route => Self::Route(meta),
            Level::RouteRule => Self::RouteRule(meta),
        }
    }
}
