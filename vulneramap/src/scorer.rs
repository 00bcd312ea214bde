use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::component::Component;

/// Number of features the model consumes:
/// `[base_score, depth, exploit_maturity, transitive_count]`.
pub const FEATURE_COUNT: usize = 4;

/// Linear risk model over a fixed feature vector.
///
/// A pure function of its inputs: no training step, no hidden state,
/// trivially substitutable with a real model behind the same contract.
#[derive(Debug, Clone, Copy)]
pub struct RiskModel {
    pub weights: [f64; FEATURE_COUNT],
    pub bias: f64,
}

impl Default for RiskModel {
    fn default() -> Self {
        RiskModel {
            weights: [1.0, 0.1, 5.0, 0.05],
            bias: 0.0,
        }
    }
}

impl RiskModel {
    /// Risk score in [0, 100] for one feature vector.
    pub fn predict(&self, features: [f64; FEATURE_COUNT]) -> f64 {
        let score: f64 = features
            .iter()
            .zip(self.weights.iter())
            .map(|(f, w)| f * w)
            .sum::<f64>()
            + self.bias;
        score.clamp(0.0, 100.0)
    }

    /// Score every component in place. Unlike the matcher this stage is
    /// total: no component is dropped. The derived feature vector is
    /// stored alongside the score for downstream explainability.
    #[instrument(skip_all, fields(components = components.len()))]
    pub fn score_components(
        &self,
        mut components: Vec<Component>,
        depths: &HashMap<String, usize>,
    ) -> Vec<Component> {
        for comp in &mut components {
            let features = derive_features(comp, depths);
            comp.ml_risk_score = round2(self.predict(features));
            comp.ml_features = Some(features);
        }
        debug!(scored = components.len(), "risk scoring complete");
        components
    }
}

fn derive_features(comp: &Component, depths: &HashMap<String, usize>) -> [f64; FEATURE_COUNT] {
    let base_score = comp.max_cvss();
    let depth = depths.get(&comp.node_id()).copied().unwrap_or(0) as f64;
    let exploit_maturity = exploit_maturity_bucket(base_score);
    // Reserved feature, always 0 for now.
    let transitive_count = 0.0;
    [base_score, depth, exploit_maturity, transitive_count]
}

/// Discrete exploit-maturity bucket derived from the base CVSS score.
fn exploit_maturity_bucket(base_score: f64) -> f64 {
    if base_score >= 9.0 {
        3.0
    } else if base_score >= 7.0 {
        2.0
    } else if base_score > 0.0 {
        1.0
    } else {
        0.0
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Vulnerability;
    use crate::severity::Severity;

    fn vulnerable(name: &str, purl: &str, cvss: f64) -> Component {
        let mut c = Component::new(name);
        c.purl = Some(purl.to_string());
        c.vulnerabilities.push(Vulnerability {
            id: "CVE-TEST".into(),
            severity: Severity::High,
            cvss,
            description: None,
        });
        c
    }

    #[test]
    fn predict_matches_reference_arithmetic() {
        let model = RiskModel::default();
        // 9.0*1.0 + 3*0.1 + 1.0*5.0 + 0*0.05
        assert_eq!(model.predict([9.0, 3.0, 1.0, 0.0]), 14.3);
    }

    #[test]
    fn predict_clamps_to_100() {
        let model = RiskModel::default();
        assert_eq!(model.predict([100.0, 100.0, 100.0, 100.0]), 100.0);
    }

    #[test]
    fn predict_clamps_negative_to_zero() {
        let model = RiskModel {
            weights: [-1.0, 0.0, 0.0, 0.0],
            bias: 0.0,
        };
        assert_eq!(model.predict([5.0, 0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn exploit_maturity_buckets() {
        assert_eq!(exploit_maturity_bucket(0.0), 0.0);
        assert_eq!(exploit_maturity_bucket(5.0), 1.0);
        assert_eq!(exploit_maturity_bucket(6.9), 1.0);
        assert_eq!(exploit_maturity_bucket(7.0), 2.0);
        assert_eq!(exploit_maturity_bucket(8.9), 2.0);
        assert_eq!(exploit_maturity_bucket(9.0), 3.0);
        assert_eq!(exploit_maturity_bucket(10.0), 3.0);
    }

    #[test]
    fn score_components_derives_and_stores_features() {
        let model = RiskModel::default();
        let comp = vulnerable("log4j-core", "pkg:log4j", 10.0);
        let depths = HashMap::from([("pkg:log4j".to_string(), 2usize)]);

        let scored = model.score_components(vec![comp], &depths);
        assert_eq!(scored[0].ml_features, Some([10.0, 2.0, 3.0, 0.0]));
        // 10 + 0.2 + 15 = 25.2
        assert_eq!(scored[0].ml_risk_score, 25.2);
    }

    #[test]
    fn missing_depth_defaults_to_zero() {
        let model = RiskModel::default();
        let comp = vulnerable("lib", "pkg:lib", 5.0);
        let scored = model.score_components(vec![comp], &HashMap::new());
        assert_eq!(scored[0].ml_features, Some([5.0, 0.0, 1.0, 0.0]));
        assert_eq!(scored[0].ml_risk_score, 10.0);
    }

    #[test]
    fn stage_is_total_over_unmatched_components() {
        let model = RiskModel::default();
        let safe = Component::new("safe-lib");
        let scored = model.score_components(vec![safe], &HashMap::new());
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].ml_risk_score, 0.0);
        assert_eq!(scored[0].ml_features, Some([0.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn score_is_rounded_to_two_decimals() {
        let model = RiskModel {
            weights: [1.0, 0.0, 0.0, 0.0],
            bias: 0.0,
        };
        let mut comp = Component::new("lib");
        comp.vulnerabilities.push(Vulnerability {
            id: "CVE-TEST".into(),
            severity: Severity::Low,
            cvss: 3.14159,
            description: None,
        });
        let scored = model.score_components(vec![comp], &HashMap::new());
        assert_eq!(scored[0].ml_risk_score, 3.14);
    }
}
