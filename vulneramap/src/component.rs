use serde::{Deserialize, Serialize};

use crate::inference::InferenceResult;
use crate::severity::Severity;

/// One vulnerability record attached to a component by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub severity: Severity,
    pub cvss: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One SBOM entry, created at decode time and enriched in place by each
/// downstream stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purl: Option<String>,
    #[serde(rename = "bom-ref", skip_serializing_if = "Option::is_none")]
    pub bom_ref: Option<String>,
    /// Declared dependency identifiers, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    /// Raw match severity (rule CVSS), 0 if unmatched.
    #[serde(default)]
    pub risk_score: f64,
    /// Provenance of the vulnerability match, e.g. "rule_engine".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    /// Scorer output, 0 until the scoring stage runs.
    #[serde(default)]
    pub ml_risk_score: f64,
    /// Feature vector the scorer derived: [base_score, depth, exploit_maturity, transitive_count].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_features: Option<[f64; 4]>,
    /// Reasoning output, always in [0, 100].
    #[serde(default)]
    pub final_risk_score: f64,
    #[serde(default = "default_severity")]
    pub risk_severity: Severity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nlp_analysis: Option<InferenceResult>,
}

fn default_severity() -> Severity {
    Severity::Safe
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Component {
            name: name.into(),
            version: None,
            purl: None,
            bom_ref: None,
            dependencies: vec![],
            vulnerabilities: vec![],
            risk_score: 0.0,
            match_type: None,
            ml_risk_score: 0.0,
            ml_features: None,
            final_risk_score: 0.0,
            risk_severity: Severity::Safe,
            risk_reasons: vec![],
            nlp_analysis: None,
        }
    }

    /// Graph node key: purl, falling back to bom-ref, falling back to
    /// `name@version`.
    pub fn node_id(&self) -> String {
        if let Some(purl) = &self.purl {
            return purl.clone();
        }
        if let Some(bom_ref) = &self.bom_ref {
            return bom_ref.clone();
        }
        format!(
            "{}@{}",
            self.name,
            self.version.as_deref().unwrap_or("unknown")
        )
    }

    /// Maximum CVSS among attached vulnerabilities, 0 if none.
    pub fn max_cvss(&self) -> f64 {
        self.vulnerabilities
            .iter()
            .map(|v| v.cvss)
            .fold(0.0, f64::max)
    }

    /// Highest-ranked severity among attached vulnerability records.
    pub fn structural_severity(&self) -> Severity {
        let mut max = Severity::Safe;
        for vuln in &self.vulnerabilities {
            if vuln.severity.outranks(max) {
                max = vuln.severity;
            }
        }
        max
    }
}
