//! Main execution engine - orchestrates a workflow run across the matrix

use crate::{
    core::{EntryContext, EntryPipeline, ExecutionStatus, RunContext, StepState, TriggerEvent, Workflow},
    execution::{
        CommandRunner, ExecutionResult, ExecutionScheduler, SchedulingStrategy, StepExecutor,
    },
    profile::ProfileStore,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a workflow run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    WorkflowStarted {
        run_id: Uuid,
        workflow_name: String,
        entries: usize,
    },
    EntryStarted {
        entry: String,
    },
    StepStarted {
        entry: String,
        step_id: String,
    },
    StepCompleted {
        entry: String,
        step_id: String,
        output: String,
    },
    StepSkipped {
        entry: String,
        step_id: String,
        reason: String,
    },
    StepFailed {
        entry: String,
        step_id: String,
        error: String,
        tolerated: bool,
    },
    EntryFinished {
        entry: String,
        status: ExecutionStatus,
    },
    WorkflowFinished {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

type Handlers = Arc<Mutex<Vec<EventHandler>>>;

/// Outcome of one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub branch: String,
    pub event: TriggerEvent,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// One pipeline per matrix entry, in matrix order
    pub entries: Vec<EntryPipeline>,
}

impl WorkflowRun {
    /// Find an entry by name or `os/arch` target
    pub fn entry(&self, name: &str) -> Option<&EntryPipeline> {
        self.entries
            .iter()
            .find(|p| p.entry.name == name || p.entry.target() == name)
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}

/// Main workflow execution engine
pub struct ExecutionEngine<R> {
    executor: Arc<StepExecutor<R>>,
    strategy: Option<SchedulingStrategy>,
    event_handlers: Handlers,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(executor: StepExecutor<R>) -> Self {
        Self {
            executor: Arc::new(executor),
            strategy: None,
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Override the strategy derived from the workflow's `max_parallel`
    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Run every matrix entry of the workflow
    ///
    /// Entries run as independent tasks; a fatal failure stops only the entry
    /// it happened in.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        run: &RunContext,
        profiles: &ProfileStore,
    ) -> Result<WorkflowRun> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let strategy = self
            .strategy
            .unwrap_or_else(|| SchedulingStrategy::from_max_parallel(workflow.max_parallel));

        // resolve every entry's context up front so profile errors abort before anything runs
        let mut jobs = Vec::with_capacity(workflow.entries.len());
        for pipeline in workflow.pipelines() {
            let ctx = workflow
                .entry_context(&pipeline.entry, run, profiles)
                .with_context(|| format!("Failed to prepare entry '{}'", pipeline.entry.name))?;
            jobs.push((pipeline, ctx));
        }

        info!(
            "Starting workflow {} ({}) with {} entries, strategy {}",
            workflow.name,
            run_id,
            jobs.len(),
            strategy
        );
        emit_event(
            &self.event_handlers,
            ExecutionEvent::WorkflowStarted {
                run_id,
                workflow_name: workflow.name.clone(),
                entries: jobs.len(),
            },
        )
        .await;

        let scheduler = ExecutionScheduler::new(strategy, jobs.len());
        let mut tasks = JoinSet::new();
        for (index, (mut pipeline, ctx)) in jobs.into_iter().enumerate() {
            let executor = self.executor.clone();
            let handlers = self.event_handlers.clone();
            let scheduler = scheduler.clone();
            tasks.spawn(async move {
                match scheduler.acquire().await {
                    Ok(_permit) => run_entry(&executor, &handlers, &mut pipeline, ctx).await,
                    Err(_) => {
                        pipeline.skip_remaining("run cancelled");
                        pipeline.state.cancel();
                        pipeline.update_counts();
                    }
                }
                (index, pipeline)
            });
        }

        let mut finished: Vec<(usize, EntryPipeline)> = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            finished.push(joined.context("Matrix entry task panicked")?);
        }
        finished.sort_by_key(|(index, _)| *index);
        let entries: Vec<EntryPipeline> = finished.into_iter().map(|(_, p)| p).collect();

        let status = if entries
            .iter()
            .all(|p| p.state.status == ExecutionStatus::Completed)
        {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };

        info!("Workflow {} finished: {:?}", workflow.name, status);
        emit_event(
            &self.event_handlers,
            ExecutionEvent::WorkflowFinished { run_id, status },
        )
        .await;

        Ok(WorkflowRun {
            run_id,
            workflow_name: workflow.name.clone(),
            branch: run.branch.clone(),
            event: run.event,
            status,
            started_at,
            completed_at: Some(Utc::now()),
            entries,
        })
    }
}

/// Emit an event to all handlers
async fn emit_event(handlers: &Mutex<Vec<EventHandler>>, event: ExecutionEvent) {
    let handlers = handlers.lock().await;
    for handler in handlers.iter() {
        handler(event.clone());
    }
}

/// Run one entry's steps in order
async fn run_entry<R: CommandRunner>(
    executor: &StepExecutor<R>,
    handlers: &Mutex<Vec<EventHandler>>,
    pipeline: &mut EntryPipeline,
    mut ctx: EntryContext,
) {
    let entry = pipeline.entry.name.clone();
    info!("Starting entry {} ({})", entry, pipeline.entry.target());
    pipeline.state.start(pipeline.steps.len());
    emit_event(handlers, ExecutionEvent::EntryStarted { entry: entry.clone() }).await;

    let mut failed = false;
    while let Some(index) = pipeline.next_pending() {
        let step = pipeline.steps[index].clone();

        let runnable = if failed {
            step.runs_after_failure(ctx.condition_variables())
        } else {
            step.should_run(ctx.condition_variables())
        };
        if !runnable {
            let reason = if failed {
                "previous step failed"
            } else {
                "condition not met"
            };
            info!("Skipping step {} of {}: {}", step.id, entry, reason);
            let reason = reason.to_string();
            pipeline.steps[index].state = StepState::Skipped {
                reason: reason.clone(),
            };
            emit_event(
                handlers,
                ExecutionEvent::StepSkipped {
                    entry: entry.clone(),
                    step_id: step.id.clone(),
                    reason,
                },
            )
            .await;
            continue;
        }

        let started_at = Utc::now();
        pipeline.steps[index].state = StepState::Running { started_at };
        emit_event(
            handlers,
            ExecutionEvent::StepStarted {
                entry: entry.clone(),
                step_id: step.id.clone(),
            },
        )
        .await;

        match executor.execute(&step, &mut ctx).await {
            ExecutionResult::Success { output } => {
                pipeline.steps[index].state = StepState::Completed {
                    output: output.clone(),
                    started_at,
                    completed_at: Utc::now(),
                };
                emit_event(
                    handlers,
                    ExecutionEvent::StepCompleted {
                        entry: entry.clone(),
                        step_id: step.id.clone(),
                        output,
                    },
                )
                .await;
            }
            ExecutionResult::Failed { error } => {
                let tolerated = step.continue_on_error;
                pipeline.steps[index].state = StepState::Failed {
                    error: error.clone(),
                    tolerated,
                    started_at,
                    failed_at: Utc::now(),
                };
                emit_event(
                    handlers,
                    ExecutionEvent::StepFailed {
                        entry: entry.clone(),
                        step_id: step.id.clone(),
                        error: error.clone(),
                        tolerated,
                    },
                )
                .await;

                if tolerated {
                    warn!("Step {} of {} failed, continuing: {}", step.id, entry, error);
                    continue;
                }

                error!("Step {} of {} failed, stopping entry: {}", step.id, entry, error);
                failed = true;
            }
        }
    }

    if pipeline.has_failed() {
        pipeline.state.fail();
    } else {
        executor.save_pending_caches(&mut ctx).await;
        pipeline.state.complete();
    }
    pipeline.update_counts();

    info!("Entry {} finished: {:?}", entry, pipeline.state.status);
    emit_event(
        handlers,
        ExecutionEvent::EntryFinished {
            entry,
            status: pipeline.state.status,
        },
    )
    .await;
}
