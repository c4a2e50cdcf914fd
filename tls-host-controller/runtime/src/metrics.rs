use crate::core::Skip;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    requests: Family<RequestLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RequestLabels {
    kind: String,
    outcome: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Mutated,
    Skipped(Skip),
    Unsupported,
    Invalid,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let requests = Family::default();
        reg.register(
            "requests",
            "Count of admission requests reviewed, by object kind and outcome",
            requests.clone(),
        );
        Self { requests }
    }

    pub(crate) fn observe(&self, kind: &str, outcome: Outcome) {
        self.requests
            .get_or_create(&RequestLabels {
                kind: kind.to_string(),
                outcome: outcome.as_str(),
            })
            .inc();
    }
}

// === impl Outcome ===

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Mutated => "mutated",
            Self::Skipped(skip) => skip.as_str(),
            Self::Unsupported => "unsupported",
            Self::Invalid => "invalid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_outcomes() {
        let mut prom = Registry::default();
        let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        metrics.observe("networking.k8s.io/v1/Ingress", Outcome::Mutated);
        metrics.observe("networking.k8s.io/v1/Ingress", Outcome::Mutated);
        metrics.observe(
            "networking.k8s.io/v1/Ingress",
            Outcome::Skipped(Skip::ExplicitTls),
        );

        let mut text = String::new();
        prometheus_client::encoding::text::encode(&mut text, &prom).unwrap();
        assert!(
            text.contains(
                r#"admission_requests_total{kind="networking.k8s.io/v1/Ingress",outcome="mutated"} 2"#
            ),
            "{text}"
        );
        assert!(
            text.contains(
                r#"admission_requests_total{kind="networking.k8s.io/v1/Ingress",outcome="explicit_tls"} 1"#
            ),
            "{text}"
        );
    }
}
