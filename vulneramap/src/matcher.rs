use tracing::{debug, instrument};

use crate::component::{Component, Vulnerability};
use crate::knowledge::KnowledgeBase;
use crate::version::{Version, VersionRange};

/// Provenance tag recorded on components matched by the rule engine.
pub const MATCH_TYPE_RULE_ENGINE: &str = "rule_engine";

/// Deterministic vulnerability matching against the knowledge base.
///
/// Returns only the components that matched a rule; callers must not
/// assume length preservation. Matched components get one vulnerability
/// record attached, their `risk_score` set to the rule CVSS, and a
/// `match_type` provenance tag. Relative input order is preserved.
#[instrument(skip_all, fields(components = components.len()))]
pub fn match_components(components: Vec<Component>, kb: &KnowledgeBase) -> Vec<Component> {
    let mut matched = Vec::new();

    for mut comp in components {
        let name = comp.name.to_lowercase();
        let Some(version) = comp.version.clone() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let Some(rule) = kb.lookup(&name) else {
            continue;
        };
        if !is_vulnerable(&version, &rule.affected) {
            continue;
        }

        // Re-matching an already-enriched component must not stack a
        // second copy of the same record.
        if !comp.vulnerabilities.iter().any(|v| v.id == rule.cve) {
            comp.vulnerabilities.push(Vulnerability {
                id: rule.cve.clone(),
                severity: rule.severity,
                cvss: rule.cvss,
                description: Some(rule.description.clone()),
            });
        }
        comp.risk_score = rule.cvss;
        comp.match_type = Some(MATCH_TYPE_RULE_ENGINE.to_string());
        matched.push(comp);
    }

    debug!(matched = matched.len(), "vulnerability matching complete");
    matched
}

/// Version-range inclusion test. Any parse failure, on either side,
/// reads as not vulnerable: false negatives are preferred over false
/// positives when input is malformed, and this never errors.
fn is_vulnerable(version: &str, affected: &str) -> bool {
    let version = match version.parse::<Version>() {
        Ok(v) => v,
        Err(e) => {
            debug!(version, error = %e, "unparseable component version; treating as not vulnerable");
            return false;
        }
    };
    let range = match affected.parse::<VersionRange>() {
        Ok(r) => r,
        Err(e) => {
            debug!(affected, error = %e, "unparseable range specifier; treating as not vulnerable");
            return false;
        }
    };
    range.contains(&version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;

    fn comp(name: &str, version: &str) -> Component {
        let mut c = Component::new(name);
        c.version = Some(version.to_string());
        c
    }

    #[test]
    fn log4j_vulnerable_version_matches_reference_rule() {
        let kb = KnowledgeBase::builtin();
        let matched = match_components(vec![comp("log4j-core", "2.14.0")], &kb);

        assert_eq!(matched.len(), 1);
        let vulns = &matched[0].vulnerabilities;
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].id, "CVE-2021-44228");
        assert_eq!(vulns[0].severity, Severity::Critical);
        assert_eq!(vulns[0].cvss, 10.0);
        assert_eq!(matched[0].risk_score, 10.0);
        assert_eq!(matched[0].match_type.as_deref(), Some(MATCH_TYPE_RULE_ENGINE));
    }

    #[test]
    fn log4j_boundary_version_is_excluded() {
        let kb = KnowledgeBase::builtin();
        assert!(match_components(vec![comp("log4j-core", "2.17.1")], &kb).is_empty());
    }

    #[test]
    fn name_matching_is_case_folded() {
        let kb = KnowledgeBase::builtin();
        let matched = match_components(vec![comp("Log4j-Core", "2.14.0")], &kb);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn v_prefixed_version_is_stripped() {
        let kb = KnowledgeBase::builtin();
        let matched = match_components(vec![comp("log4j-core", "v2.14.0")], &kb);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn unmatched_components_are_dropped_not_enriched() {
        let kb = KnowledgeBase::builtin();
        let matched = match_components(
            vec![comp("log4j-core", "2.14.0"), comp("some-safe-lib", "1.0.0")],
            &kb,
        );
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "log4j-core");
    }

    #[test]
    fn unparseable_version_reads_as_not_vulnerable() {
        let kb = KnowledgeBase::builtin();
        assert!(match_components(vec![comp("log4j-core", "2.14.0-beta9")], &kb).is_empty());
        assert!(match_components(vec![comp("log4j-core", "garbage")], &kb).is_empty());
    }

    #[test]
    fn component_without_version_is_skipped() {
        let kb = KnowledgeBase::builtin();
        assert!(match_components(vec![Component::new("log4j-core")], &kb).is_empty());
    }

    #[test]
    fn inclusive_rule_matches_boundary() {
        let kb = KnowledgeBase::builtin();
        // commons-collections is affected "<=3.2.1"
        let matched = match_components(vec![comp("commons-collections", "3.2.1")], &kb);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].vulnerabilities[0].id, "CVE-2015-7501");
        assert!(match_components(vec![comp("commons-collections", "3.2.2")], &kb).is_empty());
    }

    #[test]
    fn rematching_does_not_duplicate_records() {
        let kb = KnowledgeBase::builtin();
        let once = match_components(vec![comp("log4j-core", "2.14.0")], &kb);
        let twice = match_components(once, &kb);
        assert_eq!(twice[0].vulnerabilities.len(), 1);
    }

    #[test]
    fn relative_order_is_preserved() {
        let kb = KnowledgeBase::builtin();
        let matched = match_components(
            vec![
                comp("spring-web", "5.0.0"),
                comp("safe", "1.0.0"),
                comp("fastapi", "0.60.0"),
            ],
            &kb,
        );
        let names: Vec<&str> = matched.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["spring-web", "fastapi"]);
    }
}
