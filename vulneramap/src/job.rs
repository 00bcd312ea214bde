use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::graph::DependencyGraph;

/// Job state machine: PENDING → PROCESSING → {COMPLETED | FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Aggregate result statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    pub total_components: usize,
    pub vulnerable_components: usize,
    /// Histogram over SAFE/LOW/MEDIUM/HIGH/CRITICAL buckets of the
    /// final risk score.
    pub risk_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

/// Node/edge lists of the dependency graph, rendered for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphView {
    pub fn render(graph: &DependencyGraph) -> Self {
        GraphView {
            nodes: graph
                .nodes()
                .iter()
                .map(|n| GraphNode {
                    id: n.clone(),
                    label: n.clone(),
                })
                .collect(),
            edges: graph
                .edges()
                .map(|(source, target)| GraphEdge {
                    source: source.to_string(),
                    target: target.to_string(),
                })
                .collect(),
        }
    }
}

/// Final result payload, constructed once on completion and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultData {
    pub components: Vec<Component>,
    pub summary: String,
    pub stats: JobStats,
    pub graph: GraphView,
}

/// Point-in-time view of a job, published to the job's event feed after
/// every state or progress change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    /// 0-100, monotonically non-decreasing.
    pub progress: u8,
    /// Elapsed milliseconds per completed stage, append-only.
    pub stages: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JobResultData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn new(job_id: impl Into<String>) -> Self {
        JobSnapshot {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            progress: 0,
            stages: BTreeMap::new(),
            data: None,
            error: None,
        }
    }
}
