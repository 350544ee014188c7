use crate::{index::meta, Index, ResourceId};
use anyhow::{bail, Result};
use gateway_policy_controller_core::{Level, Locator, Meta};
use gateway_policy_controller_k8s_api::{self as k8s, ResourceExt};

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GatewayClass {
    pub meta: Meta,
    pub controller_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Gateway {
    pub meta: Meta,
    pub class_name: String,

    /// Sorted and deduplicated.
    pub listeners: Vec<String>,
}

// === impl GatewayClass ===

impl GatewayClass {
    pub(crate) fn from_resource(class: &k8s::gateway::GatewayClass) -> Self {
        Self {
            meta: meta(class_locator(&class.name_unchecked()), &class.metadata),
            controller_name: class.spec.controller_name.clone(),
        }
    }
}

// === impl Gateway ===

impl Gateway {
    pub(crate) fn from_resource(gateway: &k8s::gateway::Gateway) -> Result<(ResourceId, Self)> {
        let Some(namespace) = gateway.namespace() else {
            bail!("Gateway must have a namespace");
        };
        let id = ResourceId::new(namespace, gateway.name_unchecked());

        let mut listeners = gateway
            .spec
            .listeners
            .iter()
            .map(|l| l.name.clone())
            .collect::<Vec<_>>();
        listeners.sort();
        listeners.dedup();

        let gw = Self {
            meta: meta(gateway_locator(&id), &gateway.metadata),
            class_name: gateway.spec.gateway_class_name.clone(),
            listeners,
        };
        Ok((id, gw))
    }
}

impl kubert::index::IndexNamespacedResource<k8s::gateway::Gateway> for Index {
    fn apply(&mut self, resource: k8s::gateway::Gateway) {
        match Gateway::from_resource(&resource) {
            Ok((id, gateway)) => self.apply_gateway(id, gateway),
            Err(error) => {
                tracing::info!(name = %resource.name_any(), %error, "Ignoring Gateway");
            }
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_gateway(ResourceId::new(namespace, name))
    }
}

pub(crate) fn class_locator(name: &str) -> Locator {
    Locator::new(Level::GatewayClass.kind(), None, name)
}

pub(crate) fn gateway_locator(id: &ResourceId) -> Locator {
    Locator::new(Level::Gateway.kind(), Some(id.namespace.as_str()), &id.name)
}

pub(crate) fn listener_locator(gateway: &Locator, name: &str) -> Locator {
    Locator::section(Level::Listener.kind(), gateway, name)
}
