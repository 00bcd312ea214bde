pub mod component;
pub mod decode;
pub mod graph;
pub mod inference;
pub mod job;
pub mod knowledge;
pub mod matcher;
pub mod orchestrator;
pub mod reasoning;
pub mod scorer;
pub mod severity;
pub mod version;

pub use component::{Component, Vulnerability};
pub use decode::{CycloneDxDecoder, DecodeError, DecodedSbom, DependencyEdge, SbomDecoder};
pub use graph::DependencyGraph;
pub use inference::{InferenceResult, KeywordInference, TextInference};
pub use job::{GraphView, JobResultData, JobSnapshot, JobStats, JobStatus};
pub use knowledge::{KnowledgeBase, VulnRule};
pub use orchestrator::{JobInput, Orchestrator};
pub use reasoning::ReasoningEngine;
pub use scorer::RiskModel;
pub use severity::Severity;
pub use version::{Version, VersionRange};
