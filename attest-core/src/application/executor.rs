// attest-core/src/application/executor.rs

use crate::application::plan::ExecutionPlan;
use crate::application::store::ArtifactStore;
use crate::domain::message::{ExecutionInfo, ExecutionStatus, Message, derive_origin};
use crate::domain::runbook::{ArtifactDefinition, ArtifactKind};
use crate::domain::schema::Schema;
use crate::error::AttestError;
use crate::ports::component::{ComponentError, ExecutionContext};
use crate::ports::registry::ComponentRegistry;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How long in-flight components get to observe the cancellation token
/// before they are abandoned.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The component itself raised.
    Component,
    /// The produced message broke its schema contract.
    Validation,
    /// Artifact store rejected a read or write.
    Store,
    /// Scheduler-level inconsistency.
    Internal,
}

/// Fate of one artifact in a run.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Arc<Message>),
    Failure { kind: FailureKind, message: String },
    Skipped { reason: String },
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn message(&self) -> Option<&Arc<Message>> {
        match self {
            Self::Success(message) => Some(message),
            _ => None,
        }
    }
}

/// Aggregate report of one `execute` call: one outcome per artifact plus the
/// counters a caller needs to decide what to do next.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub outcomes: BTreeMap<String, Outcome>,
    pub skipped: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub cost: f64,
    pub cancelled: bool,
    pub timed_out: bool,
    pub cost_limit_exceeded: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} skipped, total cost {:.2}",
            self.succeeded_count(),
            self.failed.len(),
            self.skipped.len(),
            self.cost
        )
    }
}

/// What one artifact task reports back to the supervisor.
enum TaskOutput {
    Produced(Arc<Message>),
    Cancelled,
    Failed { kind: FailureKind, message: String },
}

/// Everything a task needs, detached from the plan's lifetime.
struct ProduceJob {
    id: String,
    definition: ArtifactDefinition,
    output_schema: Schema,
    origin: String,
    alias: Option<String>,
}

/// Concurrent DAG executor.
///
/// One supervisor drains the topological ready set and spawns one task per
/// artifact; a semaphore sized to `config.max_concurrency` bounds how many
/// component invocations run at once. Runtime failures never surface as
/// `Err`: they are folded into the [`ExecutionResult`]. `Err` is reserved
/// for plans the executor cannot schedule at all.
pub struct DagExecutor {
    registry: Arc<ComponentRegistry>,
    grace_period: Duration,
}

impl DagExecutor {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    #[instrument(skip_all, fields(runbook = %plan.runbook().name))]
    pub async fn execute(&self, plan: &ExecutionPlan) -> Result<ExecutionResult, AttestError> {
        let store = Arc::new(ArtifactStore::new());
        store.clear();

        let config = plan.config();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        let cancel = CancellationToken::new();
        let deadline = config
            .timeout
            .map(|seconds| Instant::now() + Duration::from_secs(seconds));
        let context = ExecutionContext::new(cancel.clone(), deadline);

        let mut sorter = plan.dag().create_sorter();
        let mut tasks: JoinSet<(String, TaskOutput)> = JoinSet::new();
        let mut outcomes: BTreeMap<String, Outcome> = BTreeMap::new();
        let mut skipped: BTreeSet<String> = BTreeSet::new();
        let mut skip_reasons: BTreeMap<String, String> = BTreeMap::new();
        let mut failed: BTreeSet<String> = BTreeSet::new();
        let mut cost = 0.0_f64;
        let mut cancelled = false;
        let mut timed_out = false;
        let mut cost_limit_exceeded = false;

        debug!(
            artifacts = plan.artifacts().len(),
            max_concurrency = config.max_concurrency,
            "Execution started"
        );

        'supervise: while sorter.is_active() {
            let ready = sorter.get_ready();
            let progressed = !ready.is_empty();
            for id in ready {
                if let Some(reason) = skip_reasons.get(&id) {
                    debug!(artifact = %id, %reason, "Artifact skipped");
                    outcomes.insert(
                        id.clone(),
                        Outcome::Skipped {
                            reason: reason.clone(),
                        },
                    );
                    sorter.done(&id);
                    continue;
                }

                let job = self.job_for(plan, &id)?;
                let registry = Arc::clone(&self.registry);
                let store = Arc::clone(&store);
                let semaphore = Arc::clone(&semaphore);
                let context = context.clone();
                tasks.spawn(produce(job, registry, store, semaphore, context));
            }

            if tasks.is_empty() {
                if !sorter.is_active() {
                    break;
                }
                if progressed {
                    continue;
                }
                return Err(AttestError::Internal(
                    "scheduler stalled: nothing ready and nothing in flight".into(),
                ));
            }

            // One completion at a time keeps outstanding work bounded while
            // fan-out still happens through the ready drain above.
            let joined = match deadline {
                Some(at) => match tokio::time::timeout_at(at, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Execution timeout reached; cancelling remaining work");
                        timed_out = true;
                        cancelled = true;
                        cancel.cancel();
                        break 'supervise;
                    }
                },
                None => tasks.join_next().await,
            };
            let Some(joined) = joined else {
                continue;
            };
            let (id, output) = joined
                .map_err(|e| AttestError::Internal(format!("artifact task panicked: {e}")))?;
            sorter.done(&id);

            match output {
                TaskOutput::Produced(message) => {
                    debug!(artifact = %id, cost = message.reported_cost(), "Artifact produced");
                    cost += message.reported_cost();
                    outcomes.insert(id, Outcome::Success(message));
                    if let Some(limit) = config.cost_limit
                        && cost > limit
                    {
                        warn!(cost, limit, "Cost limit exceeded; cancelling remaining work");
                        cost_limit_exceeded = true;
                        cancelled = true;
                        cancel.cancel();
                        break 'supervise;
                    }
                }
                TaskOutput::Cancelled => {
                    outcomes.insert(id.clone(), Outcome::Cancelled);
                    for dependent in plan.dag().transitive_dependents(&id) {
                        skip_reasons
                            .entry(dependent.clone())
                            .or_insert_with(|| format!("upstream artifact '{id}' was cancelled"));
                        skipped.insert(dependent);
                    }
                }
                TaskOutput::Failed { kind, message } => {
                    error!(artifact = %id, %message, "Artifact failed");
                    failed.insert(id.clone());
                    let optional = plan.artifact(&id).is_some_and(|d| d.optional);
                    outcomes.insert(id.clone(), Outcome::Failure { kind, message });
                    if optional {
                        for dependent in plan.dag().transitive_dependents(&id) {
                            skip_reasons
                                .entry(dependent.clone())
                                .or_insert_with(|| format!("upstream artifact '{id}' failed"));
                            skipped.insert(dependent);
                        }
                    } else {
                        cancelled = true;
                        cancel.cancel();
                        break 'supervise;
                    }
                }
            }
        }

        if cancelled {
            self.drain(
                &mut tasks,
                &mut outcomes,
                &mut failed,
                &mut cost,
            )
            .await;
            for id in plan.dag().node_ids() {
                if !outcomes.contains_key(id) {
                    let outcome = match skip_reasons.get(id) {
                        Some(reason) => Outcome::Skipped {
                            reason: reason.clone(),
                        },
                        None => Outcome::Cancelled,
                    };
                    outcomes.insert(id.clone(), outcome);
                }
            }
        }

        store.clear();

        let result = ExecutionResult {
            outcomes,
            skipped,
            failed,
            cost,
            cancelled,
            timed_out,
            cost_limit_exceeded,
        };
        info!(summary = %result.summary(), cancelled, "Execution finished");
        Ok(result)
    }

    /// Collects whatever in-flight tasks manage to finish within the grace
    /// period; stragglers are aborted. Messages produced before cancellation
    /// keep their success outcome.
    async fn drain(
        &self,
        tasks: &mut JoinSet<(String, TaskOutput)>,
        outcomes: &mut BTreeMap<String, Outcome>,
        failed: &mut BTreeSet<String>,
        cost: &mut f64,
    ) {
        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                let Ok((id, output)) = joined else { continue };
                match output {
                    TaskOutput::Produced(message) => {
                        *cost += message.reported_cost();
                        outcomes.insert(id, Outcome::Success(message));
                    }
                    TaskOutput::Cancelled => {
                        outcomes.insert(id, Outcome::Cancelled);
                    }
                    TaskOutput::Failed { kind, message } => {
                        failed.insert(id.clone());
                        outcomes.insert(id, Outcome::Failure { kind, message });
                    }
                }
            }
        };
        if tokio::time::timeout(self.grace_period, collect).await.is_err() {
            warn!("Grace period elapsed; abandoning in-flight artifacts");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }

    fn job_for(&self, plan: &ExecutionPlan, id: &str) -> Result<ProduceJob, AttestError> {
        let definition = plan
            .artifact(id)
            .ok_or_else(|| AttestError::Internal(format!("artifact '{id}' missing from plan")))?
            .clone();
        let output_schema = plan
            .schema_of(id)
            .ok_or_else(|| AttestError::Internal(format!("schema of '{id}' missing from plan")))?
            .clone();
        Ok(ProduceJob {
            id: id.to_string(),
            origin: derive_origin(&plan.runbook().name, id),
            alias: plan.alias_of(id).cloned(),
            definition,
            output_schema,
        })
    }
}

/// One artifact task: waits for a concurrency slot, invokes the component,
/// validates and stores the produced message.
async fn produce(
    job: ProduceJob,
    registry: Arc<ComponentRegistry>,
    store: Arc<ArtifactStore>,
    semaphore: Arc<Semaphore>,
    context: ExecutionContext,
) -> (String, TaskOutput) {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return (
                job.id,
                TaskOutput::Failed {
                    kind: FailureKind::Internal,
                    message: "concurrency semaphore closed".into(),
                },
            );
        }
    };
    if context.is_cancelled() {
        return (job.id, TaskOutput::Cancelled);
    }

    let id = job.id.clone();
    let output = match produce_message(&job, &registry, &store, &context).await {
        Ok(message) => TaskOutput::Produced(message),
        Err(output) => output,
    };
    (id, output)
}

async fn produce_message(
    job: &ProduceJob,
    registry: &ComponentRegistry,
    store: &ArtifactStore,
    context: &ExecutionContext,
) -> Result<Arc<Message>, TaskOutput> {
    let mut message = match &job.definition.kind {
        ArtifactKind::Source(config) => {
            let factory = registry
                .get_source_factory(&config.type_name)
                .ok_or_else(|| internal_failure(&config.type_name))?;
            let source = factory
                .create(&config.properties)
                .map_err(component_failure)?;
            source.extract(context).await.map_err(component_failure)?
        }
        ArtifactKind::Derived { inputs, process, .. } => {
            let mut upstream = Vec::with_capacity(inputs.len());
            for input in inputs {
                upstream.push(store.get(input).map_err(|e| TaskOutput::Failed {
                    kind: FailureKind::Store,
                    message: e.to_string(),
                })?);
            }
            let factory = registry
                .get_processor_factory(&process.type_name)
                .ok_or_else(|| internal_failure(&process.type_name))?;
            let processor = factory
                .create(&process.properties)
                .map_err(component_failure)?;
            processor
                .process(&upstream, &job.output_schema, context)
                .await
                .map_err(component_failure)?
        }
    };

    message
        .validate_content(&job.id, &job.output_schema)
        .map_err(|e| TaskOutput::Failed {
            kind: FailureKind::Validation,
            message: e.to_string(),
        })?;
    message.extensions.execution = Some(ExecutionInfo {
        status: ExecutionStatus::Success,
        origin: job.origin.clone(),
        alias: job.alias.clone(),
        produced_at: Utc::now().to_rfc3339(),
    });

    let message = Arc::new(message);
    store
        .save(&job.id, Arc::clone(&message))
        .map_err(|e| TaskOutput::Failed {
            kind: FailureKind::Store,
            message: e.to_string(),
        })?;
    Ok(message)
}

fn component_failure(error: ComponentError) -> TaskOutput {
    match error {
        ComponentError::Cancelled => TaskOutput::Cancelled,
        other => TaskOutput::Failed {
            kind: FailureKind::Component,
            message: other.to_string(),
        },
    }
}

fn internal_failure(type_name: &str) -> TaskOutput {
    // The planner resolved every factory; a miss here means the registry
    // changed between planning and execution.
    TaskOutput::Failed {
        kind: FailureKind::Internal,
        message: format!("component type '{type_name}' disappeared from the registry"),
    }
}
