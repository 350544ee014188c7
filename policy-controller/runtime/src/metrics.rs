use crate::{core::PolicyKind, PassContext};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct PassMetrics {
    passes: Counter,
    pass_failures: Counter,
    effective_policies: Family<KindLabels, Gauge>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: String,
}

// === impl PassMetrics ===

impl PassMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let passes = Counter::default();
        prom.register("passes", "Count of policy passes run", passes.clone());

        let pass_failures = Counter::default();
        prom.register(
            "pass_failures",
            "Count of policy passes that failed before publishing statuses",
            pass_failures.clone(),
        );

        let effective_policies = Family::default();
        prom.register(
            "effective_policies",
            "Gauge of the number of paths with an effective policy, by policy kind",
            effective_policies.clone(),
        );

        Self {
            passes,
            pass_failures,
            effective_policies,
        }
    }

    pub(crate) fn pass_succeeded(&self, context: &PassContext) {
        self.passes.inc();
        for kind in PolicyKind::ALL {
            let size = context.effective(kind).map_or(0, |index| index.len());
            self.effective_policies
                .get_or_create(&KindLabels {
                    kind: kind.kind().to_string(),
                })
                .set(size as i64);
        }
    }

    pub(crate) fn pass_failed(&self) {
        self.passes.inc();
        self.pass_failures.inc();
    }
}
