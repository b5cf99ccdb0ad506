//! Execution engine - applies a plan's actions in order, halting on the first failure

use crate::context::{ApplyContext, CancelToken, Connector, Observer, StepKind, Step};
use crate::error::{Error, Result};
use crate::planner::Plan;
use crate::resource::Resource;
use crate::state::StateStore;
use crate::types::{Action, ActionType, Host};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of one attempted action
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub action: Action,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ActionOutcome {
    fn start(action: &Action) -> Self {
        Self {
            action: action.clone(),
            started_at: Utc::now(),
            completed_at: None,
            failed_at: None,
            error: None,
        }
    }

    fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    fn fail(&mut self, error: &Error) {
        self.failed_at = Some(Utc::now());
        self.error = Some(error.to_string());
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn duration(&self) -> Duration {
        let end = self.completed_at.or(self.failed_at).unwrap_or(self.started_at);
        (end - self.started_at).to_std().unwrap_or_default()
    }
}

/// Aggregate outcome of executing a plan
#[derive(Debug)]
pub struct ExecutionResult {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub success: bool,
    /// The error that halted the run
    pub error: Option<Error>,
    /// Outcomes of every attempted action, in order
    pub actions: Vec<ActionOutcome>,
}

impl ExecutionResult {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            failed_at: None,
            success: false,
            error: None,
            actions: Vec::new(),
        }
    }

    pub fn success_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.actions.iter().filter(|a| !a.is_success()).count()
    }

    pub fn duration(&self) -> Duration {
        let end = self.completed_at.or(self.failed_at).unwrap_or(self.started_at);
        (end - self.started_at).to_std().unwrap_or_default()
    }
}

/// Applies plans one action at a time against a state store
///
/// Execution is strictly sequential. The first failure is recorded, marked
/// in the state store, and halts the run; earlier actions are not rolled
/// back and nothing is retried.
pub struct Executor<'a> {
    store: &'a mut StateStore,
    connector: &'a dyn Connector,
    observer: &'a mut dyn Observer,
    hosts: &'a [Host],
}

impl<'a> Executor<'a> {
    pub fn new(
        store: &'a mut StateStore,
        connector: &'a dyn Connector,
        observer: &'a mut dyn Observer,
    ) -> Self {
        Self {
            store,
            connector,
            observer,
            hosts: &[],
        }
    }

    /// Hosts available to resources that are not hosts themselves
    pub fn with_hosts(mut self, hosts: &'a [Host]) -> Self {
        self.hosts = hosts;
        self
    }

    /// Execute `plan`, stopping at the first failed action
    ///
    /// Returns `Err` only when the plan fails validation; action failures
    /// are reported through [`ExecutionResult::error`].
    pub fn execute(&mut self, plan: &Plan<'_>, cancel: &CancelToken) -> Result<ExecutionResult> {
        plan.validate()?;

        let total = plan.action_count();
        log::info!("Executing plan with {total} actions");
        self.observer.on_execution_start(plan.actions());

        let mut result = ExecutionResult::start();

        for (index, action) in plan.actions().iter().enumerate() {
            self.observer.on_action_start(index, total, action);
            let mut outcome = ActionOutcome::start(action);

            match self.run_action(plan, action, cancel) {
                Ok(()) => {
                    outcome.complete();
                    log::debug!("{} {} succeeded", action.action_type, action.resource_id);
                    self.observer.on_action_complete(&outcome);
                    result.actions.push(outcome);
                }
                Err(err) => {
                    outcome.fail(&err);
                    log::warn!("{} {} failed: {err}", action.action_type, action.resource_id);
                    self.observer.on_action_complete(&outcome);
                    result.actions.push(outcome);
                    result.failed_at = Some(Utc::now());
                    result.error = Some(err);
                    break;
                }
            }
        }

        if result.error.is_none() {
            result.success = true;
            result.completed_at = Some(Utc::now());
        }

        self.observer.on_execution_complete(&result);
        Ok(result)
    }

    fn run_action(&mut self, plan: &Plan<'_>, action: &Action, cancel: &CancelToken) -> Result<()> {
        let id = &action.resource_id;
        let resource = plan
            .graph()
            .get(id)
            .ok_or_else(|| Error::ResourceNotFound(id.clone()))?;

        let outcome = if cancel.is_cancelled() {
            Err(Error::Cancelled { id: id.clone() })
        } else {
            self.dispatch(resource, action.action_type, cancel)
        };

        match outcome {
            Ok(()) if action.action_type == ActionType::NoOp => Ok(()),
            Ok(()) => self.store.mark_applied(resource),
            Err(err) => {
                if let Err(persist) = self.store.mark_failed(id, &err.to_string()) {
                    log::warn!("Could not record failure of {id}: {persist}");
                    self.observer.on_step(
                        id,
                        &Step {
                            kind: StepKind::Warning,
                            message: format!("could not record failure: {persist}"),
                        },
                    );
                }
                Err(err)
            }
        }
    }

    fn dispatch(
        &mut self,
        resource: &dyn Resource,
        action_type: ActionType,
        cancel: &CancelToken,
    ) -> Result<()> {
        let host = self.bind_host(resource);
        let mut ctx = ApplyContext::new(
            resource.id(),
            host,
            self.connector,
            &mut *self.observer,
            cancel,
        );

        match action_type {
            ActionType::Create | ActionType::Update => resource.apply(&mut ctx),
            ActionType::Delete => resource.destroy(&mut ctx),
            ActionType::NoOp => {
                ctx.info("up to date, skipping");
                Ok(())
            }
        }
    }

    /// Hosts bind themselves; everything else goes to the first configured host
    fn bind_host<'r>(&self, resource: &'r dyn Resource) -> Option<&'r Host>
    where
        'a: 'r,
    {
        resource.host().or_else(|| self.hosts.first())
    }
}
