use std::collections::HashMap;

use crate::severity::Severity;

/// One version-range rule for a package.
#[derive(Debug, Clone)]
pub struct VulnRule {
    /// Range specifier for affected versions, e.g. `<2.17.1`.
    pub affected: String,
    pub severity: Severity,
    pub cve: String,
    pub cvss: f64,
    pub description: String,
}

/// Immutable vulnerability knowledge base: normalized package name to
/// its rule. Constructed once at startup and passed by reference to the
/// matcher; never mutated during a pipeline run.
///
/// Known limitation: one rule per package name. Packages with multiple
/// disjoint vulnerable ranges are not representable.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    rules: HashMap<String, VulnRule>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ground-truth rule set for the reference pipeline. A live feed
    /// could hydrate the same structure in a later iteration.
    pub fn builtin() -> Self {
        let mut kb = KnowledgeBase::new();
        kb.insert(
            "log4j-core",
            VulnRule {
                // Covers Log4Shell and the subsequent incomplete patches.
                affected: "<2.17.1".into(),
                severity: Severity::Critical,
                cve: "CVE-2021-44228".into(),
                cvss: 10.0,
                description: "Remote Code Execution (RCE) in Log4j 2.x".into(),
            },
        );
        kb.insert(
            "jackson-databind",
            VulnRule {
                affected: "<2.13.0".into(),
                severity: Severity::High,
                cve: "CVE-2020-36518".into(),
                cvss: 7.5,
                description: "Denial of Service (DoS) via deeply nested objects".into(),
            },
        );
        kb.insert(
            "commons-collections",
            VulnRule {
                affected: "<=3.2.1".into(),
                severity: Severity::Critical,
                cve: "CVE-2015-7501".into(),
                cvss: 9.8,
                description: "Deserialization remote code execution".into(),
            },
        );
        kb.insert(
            "spring-web",
            VulnRule {
                affected: "<5.3.18".into(),
                severity: Severity::Critical,
                cve: "CVE-2022-22965".into(),
                cvss: 9.8,
                description: "Spring4Shell RCE".into(),
            },
        );
        kb.insert(
            "fastapi",
            VulnRule {
                affected: "<0.65.2".into(),
                severity: Severity::Medium,
                cve: "CVE-2021-32677".into(),
                cvss: 5.4,
                description: "Incorrect Authorization".into(),
            },
        );
        kb
    }

    /// Register a rule under a normalized (lowercased) package name.
    pub fn insert(&mut self, package: &str, rule: VulnRule) {
        self.rules.insert(package.to_lowercase(), rule);
    }

    /// Look up the rule for a normalized package name, if any.
    pub fn lookup(&self, normalized_name: &str) -> Option<&VulnRule> {
        self.rules.get(normalized_name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_reference_rules() {
        let kb = KnowledgeBase::builtin();
        assert_eq!(kb.len(), 5);

        let log4j = kb.lookup("log4j-core").unwrap();
        assert_eq!(log4j.cve, "CVE-2021-44228");
        assert_eq!(log4j.severity, Severity::Critical);
        assert_eq!(log4j.cvss, 10.0);
        assert_eq!(log4j.affected, "<2.17.1");
    }

    #[test]
    fn lookup_is_exact_on_normalized_name() {
        let kb = KnowledgeBase::builtin();
        assert!(kb.lookup("log4j-core").is_some());
        // Callers normalize; the lookup itself does not case-fold.
        assert!(kb.lookup("Log4j-Core").is_none());
        assert!(kb.lookup("no-such-package").is_none());
    }

    #[test]
    fn insert_normalizes_key() {
        let mut kb = KnowledgeBase::new();
        kb.insert(
            "MyLib",
            VulnRule {
                affected: "<1.0.0".into(),
                severity: Severity::Low,
                cve: "CVE-2024-0001".into(),
                cvss: 3.1,
                description: "test".into(),
            },
        );
        assert!(kb.lookup("mylib").is_some());
    }

    #[test]
    fn one_rule_per_package() {
        let mut kb = KnowledgeBase::new();
        let rule = |cve: &str| VulnRule {
            affected: "<1.0.0".into(),
            severity: Severity::Low,
            cve: cve.into(),
            cvss: 3.1,
            description: "test".into(),
        };
        kb.insert("lib", rule("CVE-1"));
        kb.insert("lib", rule("CVE-2"));
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.lookup("lib").unwrap().cve, "CVE-2");
    }
}
