use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::component::Component;

/// Raw dependency record from the SBOM dependency section.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyEdge {
    #[serde(rename = "ref")]
    pub from_ref: Option<String>,
    #[serde(rename = "dependsOn", default)]
    pub to_refs: Vec<String>,
}

/// Fully materialized decode output: component records in document
/// order plus the raw dependency edge list.
#[derive(Debug, Default)]
pub struct DecodedSbom {
    pub components: Vec<Component>,
    pub dependencies: Vec<DependencyEdge>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("SBOM document is not valid JSON: {0}")]
    InvalidDocument(String),
    #[error("failed to decode SBOM components: {0}")]
    InvalidComponents(String),
}

/// Decoder collaborator. Implementations must return complete,
/// already-materialized collections — never a stream or cursor — so the
/// orchestrator can hand results across worker threads.
#[async_trait]
pub trait SbomDecoder: Send + Sync {
    async fn decode(&self, bytes: &[u8]) -> Result<DecodedSbom, DecodeError>;
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    name: Option<String>,
    version: Option<String>,
    purl: Option<String>,
    #[serde(rename = "bom-ref")]
    bom_ref: Option<String>,
}

/// CycloneDX JSON decoder.
///
/// A malformed component section fails the decode; a malformed or
/// missing dependency section degrades to an empty edge list.
#[derive(Debug, Default)]
pub struct CycloneDxDecoder;

impl CycloneDxDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SbomDecoder for CycloneDxDecoder {
    async fn decode(&self, bytes: &[u8]) -> Result<DecodedSbom, DecodeError> {
        let doc: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| DecodeError::InvalidDocument(e.to_string()))?;

        let raw_components: Vec<RawComponent> = match doc.get("components") {
            Some(section) => serde_json::from_value(section.clone())
                .map_err(|e| DecodeError::InvalidComponents(e.to_string()))?,
            None => vec![],
        };

        let dependencies: Vec<DependencyEdge> = match doc.get("dependencies") {
            Some(section) => match serde_json::from_value(section.clone()) {
                Ok(deps) => deps,
                Err(e) => {
                    warn!(error = %e, "dependency section malformed; continuing without edges");
                    vec![]
                }
            },
            None => vec![],
        };

        let mut components = Vec::with_capacity(raw_components.len());
        for raw in raw_components {
            let Some(name) = raw.name else {
                warn!("skipping component without a name");
                continue;
            };
            let mut comp = Component::new(name);
            comp.version = raw.version;
            comp.purl = raw.purl;
            comp.bom_ref = raw.bom_ref;
            components.push(comp);
        }

        bind_declared_dependencies(&mut components, &dependencies);
        debug!(
            components = components.len(),
            dependencies = dependencies.len(),
            "SBOM decoded"
        );

        Ok(DecodedSbom {
            components,
            dependencies,
        })
    }

    fn name(&self) -> &str {
        "cyclonedx-json"
    }
}

/// Copy each component's declared dependency list from the edge record
/// keyed by its purl (bom-ref as fallback).
fn bind_declared_dependencies(components: &mut [Component], dependencies: &[DependencyEdge]) {
    let dep_map: HashMap<&str, &Vec<String>> = dependencies
        .iter()
        .filter_map(|d| d.from_ref.as_deref().map(|r| (r, &d.to_refs)))
        .collect();

    for comp in components {
        let declared = comp
            .purl
            .as_deref()
            .and_then(|p| dep_map.get(p))
            .or_else(|| comp.bom_ref.as_deref().and_then(|r| dep_map.get(r)));
        if let Some(declared) = declared {
            comp.dependencies = (*declared).clone();
        }
    }
}
