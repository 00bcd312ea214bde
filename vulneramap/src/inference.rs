use serde::{Deserialize, Serialize};

use crate::severity::Severity;

/// Structured result of free-text severity inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub attack_type: String,
    pub inferred_severity: Severity,
    pub explanation: String,
}

impl InferenceResult {
    /// Neutral result for empty or missing advisory text, and the
    /// fallback when a collaborator fails.
    pub fn unknown() -> Self {
        InferenceResult {
            attack_type: "Unknown".into(),
            inferred_severity: Severity::Unknown,
            explanation: "No description available.".into(),
        }
    }

    /// Canned result for components carrying no vulnerability records.
    pub fn no_vulnerabilities() -> Self {
        InferenceResult {
            attack_type: "None".into(),
            inferred_severity: Severity::Safe,
            explanation: "No vulnerabilities detected.".into(),
        }
    }
}

/// Text-inference collaborator: classifies free-text advisory
/// descriptions into an attack type, an inferred severity and a
/// human-readable explanation.
///
/// Implementations must tolerate empty text by returning a neutral
/// unknown result. The reasoning engine treats an `Err` as a missing
/// inference and substitutes [`InferenceResult::unknown`].
pub trait TextInference: Send + Sync {
    fn analyze(&self, description: &str) -> anyhow::Result<InferenceResult>;
    fn name(&self) -> &str;
}

/// Severity keyword table: trigger phrases to (severity, attack type).
/// Checked highest severity first; the first hit wins.
const SEVERITY_TRIGGERS: &[(Severity, &str, &[&str])] = &[
    (
        Severity::Critical,
        "Remote Code Execution (RCE)",
        &["remote code execution", "rce", "arbitrary code", "jndi lookup"],
    ),
    (
        Severity::High,
        "Privilege Escalation / Auth Bypass",
        &["privilege escalation", "sql injection", "authentication bypass", "xss"],
    ),
    (
        Severity::Medium,
        "Denial of Service (DoS)",
        &["denial of service", "dos", "information disclosure"],
    ),
    (
        Severity::Low,
        "Resource Exposure",
        &["small memory leak", "local access"],
    ),
];

/// Keyword-driven inference over advisory text. Stands in for a real
/// language model behind the same contract.
#[derive(Debug, Default)]
pub struct KeywordInference;

impl KeywordInference {
    pub fn new() -> Self {
        Self
    }
}

impl TextInference for KeywordInference {
    fn analyze(&self, description: &str) -> anyhow::Result<InferenceResult> {
        if description.trim().is_empty() {
            return Ok(InferenceResult::unknown());
        }

        let text = description.to_lowercase();
        let mut inferred = Severity::Unknown;
        let mut attack_type = "Generic Vulnerability".to_string();

        'outer: for (severity, attack, triggers) in SEVERITY_TRIGGERS {
            for trigger in *triggers {
                if text.contains(trigger) {
                    inferred = *severity;
                    attack_type = (*attack).to_string();
                    break 'outer;
                }
            }
        }

        let mut explanation = format!(
            "This vulnerability involves {} which allows attackers to exploit the system.",
            attack_type.to_lowercase()
        );
        if inferred == Severity::Critical {
            explanation.push_str(" This is highly dangerous and requires immediate patching.");
        }

        Ok(InferenceResult {
            attack_type,
            inferred_severity: inferred,
            explanation,
        })
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
