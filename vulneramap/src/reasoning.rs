use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::component::Component;
use crate::inference::{InferenceResult, TextInference};
use crate::scorer::round2;
use crate::severity::Severity;

/// Neuro-symbolic reasoning layer: fuses the structured match severity,
/// the ML score and free-text inference into a final verdict plus an
/// ordered explanation trail.
pub struct ReasoningEngine {
    inference: Arc<dyn TextInference>,
}

impl ReasoningEngine {
    pub fn new(inference: Arc<dyn TextInference>) -> Self {
        Self { inference }
    }

    /// Apply the reasoning rules to every component, in order. Later
    /// rules may override earlier numeric adjustments; the reason list
    /// accumulates everything that fired.
    #[instrument(skip_all, fields(components = components.len()))]
    pub fn reason(&self, mut components: Vec<Component>) -> Vec<Component> {
        for comp in &mut components {
            self.reason_one(comp);
        }
        debug!(reasoned = components.len(), "reasoning complete");
        components
    }

    fn reason_one(&self, comp: &mut Component) {
        let mut reasons = Vec::new();
        let mut final_score = comp.ml_risk_score;

        let inferred = match comp.vulnerabilities.first() {
            Some(vuln) => {
                let description = vuln.description.as_deref().unwrap_or("");
                let result = match self.inference.analyze(description) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(component = %comp.name, inference = self.inference.name(), error = %e,
                            "text inference failed; using neutral result");
                        InferenceResult::unknown()
                    }
                };
                comp.nlp_analysis = Some(result.clone());
                result
            }
            None => InferenceResult::no_vulnerabilities(),
        };

        // Proximity amplification: vulnerable components close to the
        // root have immediate blast radius.
        let features = comp.ml_features.unwrap_or([0.0; 4]);
        let depth = features[1];
        if depth < 2.0 && final_score > 5.0 {
            final_score *= 1.2;
            reasons.push(format!(
                "High risk component near root (depth {}). Impact is immediate.",
                depth as usize
            ));
        }

        // Structural severity from matched records, possibly promoted
        // by a higher-ranked textual inference.
        let mut structural = comp.structural_severity();
        if inferred.inferred_severity.outranks(structural) {
            structural = inferred.inferred_severity;
            reasons.push(format!(
                "Advisory text analysis detected '{structural}' severity context."
            ));
        }

        // Score floors: structural severity only ever raises the score.
        if structural == Severity::Critical {
            reasons.push("Contains CRITICAL vulnerability. Immediate remediation required.".into());
            final_score = final_score.max(90.0);
        } else if structural == Severity::High {
            final_score = final_score.max(70.0);
        }

        if features[2] > 0.0 {
            reasons.push("Exploit code is publicly available.".into());
        }

        reasons.push(format!("[inference] {}", inferred.explanation));

        final_score = final_score.min(100.0);

        // Structural signal dominates the final label; the score-derived
        // bucket only applies below HIGH.
        let label = if matches!(structural, Severity::Critical | Severity::High) {
            structural
        } else {
            score_label(final_score)
        };

        comp.final_risk_score = round2(final_score);
        comp.risk_severity = label;
        comp.risk_reasons = reasons;
    }

    /// One-paragraph system summary: a lead sentence prioritizing
    /// critical over high over "relatively secure", then an optional
    /// clustering sentence over affected ecosystems.
    pub fn summarize(&self, components: &[Component]) -> String {
        let critical = components
            .iter()
            .filter(|c| c.final_risk_score >= 90.0)
            .count();
        let high = components
            .iter()
            .filter(|c| (70.0..90.0).contains(&c.final_risk_score))
            .count();

        let mut sentences = Vec::new();
        if critical > 0 {
            sentences.push(format!(
                "CRITICAL RISK: System contains {critical} critical components. Immediate action required."
            ));
        } else if high > 0 {
            sentences.push(format!(
                "HIGH RISK: System has {high} high-severity issues."
            ));
        } else {
            sentences.push("System is relatively secure. No critical/high risks detected.".into());
        }

        let mut ecosystems = BTreeSet::new();
        for comp in components {
            if comp.final_risk_score > 40.0 {
                let purl = comp.purl.as_deref().unwrap_or("");
                if purl.contains("npm") {
                    ecosystems.insert("NPM");
                }
                if purl.contains("pypi") {
                    ecosystems.insert("PyPI");
                }
            }
        }
        if !ecosystems.is_empty() {
            let list: Vec<&str> = ecosystems.into_iter().collect();
            sentences.push(format!(
                "Risk concentration detected in: {} ecosystems.",
                list.join(", ")
            ));
        }

        sentences.join(" ")
    }
}

/// Score-derived severity bucket, used when no structural signal
/// dominates.
fn score_label(score: f64) -> Severity {
    if score >= 90.0 {
        Severity::Critical
    } else if score >= 70.0 {
        Severity::High
    } else if score >= 40.0 {
        Severity::Medium
    } else if score > 0.0 {
        Severity::Low
    } else {
        Severity::Safe
    }
}
