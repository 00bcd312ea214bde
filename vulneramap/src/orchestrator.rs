use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::component::Component;
use crate::decode::{DecodedSbom, SbomDecoder};
use crate::graph::DependencyGraph;
use crate::inference::KeywordInference;
use crate::job::{GraphView, JobResultData, JobSnapshot, JobStats, JobStatus};
use crate::knowledge::KnowledgeBase;
use crate::matcher;
use crate::reasoning::ReasoningEngine;
use crate::scorer::RiskModel;

/// Per-job event buffer. Large enough to hold every checkpoint of one
/// run; a consumer that lags further than this is dropped behind, never
/// blocking the producer.
const EVENT_BUFFER: usize = 32;

/// Externally supplied SBOM artifact. A temporary input is removed
/// exactly once when the job is done with it, on every exit path;
/// removal errors are swallowed so cleanup can never mask the job's
/// actual outcome.
#[derive(Debug)]
pub struct JobInput {
    path: PathBuf,
    remove_on_drop: bool,
}

impl JobInput {
    /// Caller-owned file; left in place after analysis.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JobInput {
            path: path.into(),
            remove_on_drop: false,
        }
    }

    /// Uploaded artifact; deleted when the job releases it.
    pub fn temporary(path: impl Into<PathBuf>) -> Self {
        JobInput {
            path: path.into(),
            remove_on_drop: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobInput {
    fn drop(&mut self) {
        if self.remove_on_drop {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[derive(Clone)]
struct JobHandle {
    state: Arc<Mutex<JobSnapshot>>,
    events: broadcast::Sender<JobSnapshot>,
}

/// Drives jobs through the five-stage analysis pipeline and owns the
/// in-memory job registry.
///
/// Each job runs as one task; CPU-bound stages are offloaded to the
/// blocking pool so one job's computation never stalls progress events
/// for others. Every inter-stage handoff is a complete, materialized
/// collection.
pub struct Orchestrator {
    decoder: Arc<dyn SbomDecoder>,
    knowledge: Arc<KnowledgeBase>,
    model: RiskModel,
    reasoning: Arc<ReasoningEngine>,
    jobs: RwLock<HashMap<String, JobHandle>>,
}

impl Orchestrator {
    pub fn new(
        decoder: Arc<dyn SbomDecoder>,
        knowledge: Arc<KnowledgeBase>,
        model: RiskModel,
        reasoning: Arc<ReasoningEngine>,
    ) -> Self {
        Orchestrator {
            decoder,
            knowledge,
            model,
            reasoning,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Reference stack: CycloneDX JSON decoder, built-in knowledge base,
    /// default linear model, keyword inference.
    pub fn with_defaults() -> Self {
        Orchestrator::new(
            Arc::new(crate::decode::CycloneDxDecoder::new()),
            Arc::new(KnowledgeBase::builtin()),
            RiskModel::default(),
            Arc::new(ReasoningEngine::new(Arc::new(KeywordInference::new()))),
        )
    }

    /// Register a new PENDING job and return its id.
    pub async fn create_job(&self) -> String {
        let job_id = format!("job-{}", Uuid::new_v4());
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let handle = JobHandle {
            state: Arc::new(Mutex::new(JobSnapshot::new(&job_id))),
            events,
        };
        self.jobs.write().await.insert(job_id.clone(), handle);
        debug!(job_id, "job created");
        job_id
    }

    /// Current snapshot of a job, including after the feed has closed.
    pub async fn get_job(&self, job_id: &str) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).map(|h| lock_state(&h.state).clone())
    }

    /// Attach to a job's event feed: the current snapshot immediately,
    /// then every subsequent snapshot until a terminal status.
    pub async fn subscribe(
        &self,
        job_id: &str,
    ) -> Option<(JobSnapshot, broadcast::Receiver<JobSnapshot>)> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).map(|h| {
            // Subscribe while holding the registry read lock so no
            // update can slip between snapshot and subscription.
            let receiver = h.events.subscribe();
            (lock_state(&h.state).clone(), receiver)
        })
    }

    /// Spawn the analysis task for an already-created job.
    pub fn spawn_analysis(self: &Arc<Self>, job_id: String, input: JobInput) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_analysis(&job_id, input).await })
    }

    /// Run one job to a terminal state. Exactly one invocation per job;
    /// re-invoking on a terminal job is a caller error.
    #[instrument(skip(self, input))]
    pub async fn run_analysis(&self, job_id: &str, input: JobInput) {
        let Some(handle) = self.handle(job_id).await else {
            warn!(job_id, "analysis requested for unknown job");
            return;
        };

        match self.run_stages(&handle, input).await {
            Ok(()) => info!(job_id, "analysis completed"),
            Err(e) => {
                warn!(job_id, error = %e, "analysis failed");
                publish(&handle, |job| {
                    job.status = JobStatus::Failed;
                    job.error = Some(format!("{e:#}"));
                });
            }
        }
    }

    async fn run_stages(&self, handle: &JobHandle, input: JobInput) -> Result<()> {
        publish(handle, |job| job.status = JobStatus::Processing);

        // Stage 1: decode. The only stage that suspends on I/O.
        let started = Instant::now();
        let bytes = tokio::fs::read(input.path()).await.with_context(|| {
            format!("failed to read SBOM artifact {}", input.path().display())
        })?;
        let DecodedSbom {
            components,
            dependencies,
        } = self.decoder.decode(&bytes).await.context("SBOM decode failed")?;
        let total_components = components.len();
        checkpoint(handle, "decode_ms", started, 20);

        // Stage 2: graph build + depth map from the analysis root (the
        // first decoded component).
        let started = Instant::now();
        let root = components.first().map(|c| c.node_id());
        let (graph, depths, components) = tokio::task::spawn_blocking(move || {
            let graph = DependencyGraph::build(&components, &dependencies);
            let depths = match root {
                Some(root) => graph.depth_from(&root),
                None => HashMap::new(),
            };
            (graph, depths, components)
        })
        .await
        .context("graph stage aborted")?;
        checkpoint(handle, "graph_ms", started, 40);

        // Stage 3: vulnerability matching. Narrows to the matched subset.
        let started = Instant::now();
        let knowledge = Arc::clone(&self.knowledge);
        let matched =
            tokio::task::spawn_blocking(move || matcher::match_components(components, &knowledge))
                .await
                .context("match stage aborted")?;
        checkpoint(handle, "match_ms", started, 60);

        // Stage 4: risk scoring.
        let started = Instant::now();
        let model = self.model;
        let scored =
            tokio::task::spawn_blocking(move || model.score_components(matched, &depths))
                .await
                .context("score stage aborted")?;
        checkpoint(handle, "score_ms", started, 80);

        // Stage 5: reasoning + system summary.
        let started = Instant::now();
        let reasoning = Arc::clone(&self.reasoning);
        let (reasoned, summary) = tokio::task::spawn_blocking(move || {
            let reasoned = reasoning.reason(scored);
            let summary = reasoning.summarize(&reasoned);
            (reasoned, summary)
        })
        .await
        .context("reason stage aborted")?;

        let stats = JobStats {
            total_components,
            vulnerable_components: reasoned
                .iter()
                .filter(|c| !c.vulnerabilities.is_empty())
                .count(),
            risk_distribution: risk_distribution(&reasoned),
        };
        let data = JobResultData {
            components: reasoned,
            summary,
            stats,
            graph: GraphView::render(&graph),
        };
        let elapsed = elapsed_ms(started);
        publish(handle, |job| {
            job.stages.insert("reason_ms".into(), elapsed);
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.data = Some(data);
        });
        Ok(())
    }

    async fn handle(&self, job_id: &str) -> Option<JobHandle> {
        self.jobs.read().await.get(job_id).cloned()
    }
}

fn lock_state(state: &Mutex<JobSnapshot>) -> std::sync::MutexGuard<'_, JobSnapshot> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Mutate the job state and push the resulting snapshot to the feed.
/// Sending never blocks; a send error only means nobody is listening.
fn publish<F: FnOnce(&mut JobSnapshot)>(handle: &JobHandle, mutate: F) {
    let snapshot = {
        let mut state = lock_state(&handle.state);
        mutate(&mut state);
        state.clone()
    };
    let _ = handle.events.send(snapshot);
}

fn checkpoint(handle: &JobHandle, stage: &str, started: Instant, progress: u8) {
    let elapsed = elapsed_ms(started);
    let stage = stage.to_string();
    publish(handle, |job| {
        job.stages.insert(stage, elapsed);
        job.progress = progress;
    });
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Bucket the final risk scores of the reasoned components.
fn risk_distribution(components: &[Component]) -> BTreeMap<String, usize> {
    let mut dist: BTreeMap<String, usize> = ["SAFE", "LOW", "MEDIUM", "HIGH", "CRITICAL"]
        .into_iter()
        .map(|k| (k.to_string(), 0))
        .collect();
    for comp in components {
        let bucket = if comp.final_risk_score == 0.0 {
            "SAFE"
        } else if comp.final_risk_score < 40.0 {
            "LOW"
        } else if comp.final_risk_score < 70.0 {
            "MEDIUM"
        } else if comp.final_risk_score < 90.0 {
            "HIGH"
        } else {
            "CRITICAL"
        };
        if let Some(count) = dist.get_mut(bucket) {
            *count += 1;
        }
    }
    dist
}
