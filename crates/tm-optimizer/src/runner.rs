//! Parallel trial execution over a shared device pool.
//!
//! The runner keeps up to `min(concurrency, num_workers)` trials in flight.
//! Each trial leases a device for exactly the duration of its objective call,
//! so a failing or panicking objective still gives its device back. Finished
//! trials stream back over a channel and are reported to the strategy before
//! the next suggestion is drawn.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_channel::unbounded;
use serde::{Deserialize, Serialize};
use tm_devices::{DeviceId, DevicePool, PoolSnapshot};
use tm_types::{internal_error, TmResult, TrialError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::executor::ExecutorConfig;
use crate::search::{build_strategy, ParameterSet, ParameterValue, SearchStrategy};
use crate::trial::{StudyConfig, StudyStatus, Trial, TrialResult};

/// What the objective sees for one trial.
#[derive(Debug)]
pub struct TrialContext<'a> {
    pub trial_id: Uuid,
    pub trial_number: usize,
    /// Device the trial must bind its work to.
    pub device: DeviceId,
    pub parameters: &'a ParameterSet,
}

impl TrialContext<'_> {
    pub fn param(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.param(name).and_then(ParameterValue::as_f64)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.param(name).and_then(ParameterValue::as_i64)
    }

    /// Like [`Self::float`] but fails the trial when the parameter is missing.
    pub fn require_float(&self, name: &str) -> Result<f64, TrialError> {
        self.float(name)
            .ok_or_else(|| TrialError::objective(format!("missing numeric parameter '{name}'")))
    }
}

/// Value returned by a successful objective call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub objective: f64,
    pub metrics: HashMap<String, f64>,
}

impl TrialOutcome {
    pub fn new(objective: f64) -> Self {
        Self {
            objective,
            metrics: HashMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

impl From<f64> for TrialOutcome {
    fn from(objective: f64) -> Self {
        Self::new(objective)
    }
}

/// Everything a finished study produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyReport {
    pub status: StudyStatus,
    /// All launched trials, ordered by trial number.
    pub trials: Vec<Trial>,
    /// Pool counters after the last trial finished.
    pub pool: PoolSnapshot,
}

impl StudyReport {
    pub fn best(&self) -> Option<&TrialResult> {
        self.status.best_trial.as_ref()
    }

    /// Number of trials that ran on `device`.
    pub fn trials_on(&self, device: DeviceId) -> usize {
        self.trials
            .iter()
            .filter(|t| t.device == Some(device))
            .count()
    }
}

/// Executes studies on a fixed worker pool and device pool.
#[derive(Debug)]
pub struct TrialRunner {
    config: ExecutorConfig,
    pool: DevicePool,
    workers: rayon::ThreadPool,
}

impl TrialRunner {
    pub fn new(config: ExecutorConfig) -> TmResult<Self> {
        config.validate()?;

        let pool = DevicePool::new(config.num_devices)?;
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_workers)
            .thread_name(|i| format!("trialmux-worker-{i}"))
            .build()
            .map_err(|e| internal_error!("failed to start worker pool: {e}"))?;

        debug!(
            devices = config.num_devices,
            workers = config.num_workers,
            device_kind = %config.device_kind,
            "Trial runner ready"
        );

        Ok(Self {
            config,
            pool,
            workers,
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn pool(&self) -> &DevicePool {
        &self.pool
    }

    /// Build the strategy named in `config` and run the study with it.
    pub fn run_study<F>(&self, config: StudyConfig, objective: F) -> TmResult<StudyReport>
    where
        F: Fn(&TrialContext<'_>) -> Result<TrialOutcome, TrialError> + Sync,
    {
        let mut strategy = build_strategy(&config)?;
        self.run(config, strategy.as_mut(), objective)
    }

    pub fn run<F>(
        &self,
        config: StudyConfig,
        strategy: &mut dyn SearchStrategy,
        objective: F,
    ) -> TmResult<StudyReport>
    where
        F: Fn(&TrialContext<'_>) -> Result<TrialOutcome, TrialError> + Sync,
    {
        let cancel = AtomicBool::new(false);
        self.run_with_cancel(config, strategy, objective, &cancel)
    }

    /// Run a study until `max_trials` is reached, the strategy runs dry, or
    /// `cancel` is set. Cancelling stops new launches; in-flight trials are
    /// allowed to finish.
    pub fn run_with_cancel<F>(
        &self,
        config: StudyConfig,
        strategy: &mut dyn SearchStrategy,
        objective: F,
        cancel: &AtomicBool,
    ) -> TmResult<StudyReport>
    where
        F: Fn(&TrialContext<'_>) -> Result<TrialOutcome, TrialError> + Sync,
    {
        config.validate()?;

        let mut status = StudyStatus::new(config);
        let study_id = status.id;
        let max_trials = status.config.max_trials;
        let in_flight_cap = self.config.max_in_flight(status.config.concurrency);

        status.mark_running();
        info!(
            study = %status.config.name,
            strategy = strategy.name(),
            metric = %status.config.objective_metric,
            direction = ?status.config.direction,
            max_trials,
            in_flight = in_flight_cap,
            devices = self.config.num_devices,
            device_kind = %self.config.device_kind,
            "Starting study"
        );

        let (tx, rx) = unbounded::<Trial>();
        let pool = &self.pool;
        let objective = &objective;
        let mut trials: Vec<Trial> = Vec::with_capacity(max_trials);

        let cancelled = self.workers.in_place_scope(|scope| -> TmResult<bool> {
            let mut launched = 0usize;
            let mut in_flight = 0usize;
            let mut exhausted = false;
            let mut cancelled = false;

            loop {
                if !cancelled && cancel.load(Ordering::Relaxed) {
                    cancelled = true;
                    info!(in_flight, "Cancellation requested, draining in-flight trials");
                }

                while !exhausted
                    && !cancelled
                    && in_flight < in_flight_cap
                    && launched < max_trials
                {
                    let want = (in_flight_cap - in_flight).min(max_trials - launched);
                    let batch = strategy.suggest(want);
                    if batch.len() < want {
                        exhausted = true;
                    }

                    for parameters in batch {
                        let trial = Trial::new(study_id, launched, parameters);
                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            let finished = evaluate(pool, objective, trial);
                            // The receiver outlives the scope.
                            let _ = tx.send(finished);
                        });
                        launched += 1;
                        in_flight += 1;
                    }
                }

                status.trials_running = in_flight;
                if in_flight == 0 {
                    break;
                }

                let trial = rx
                    .recv()
                    .map_err(|e| internal_error!("trial result channel closed: {e}"))?;
                in_flight -= 1;

                if let Some(result) = &trial.result {
                    strategy.report(&trial.parameters, result.objective);
                }
                status.record(&trial);
                trials.push(trial);
            }

            if exhausted && launched < max_trials {
                debug!(launched, "Strategy exhausted before max_trials");
            }
            Ok(cancelled)
        })?;

        status.trials_running = 0;
        trials.sort_by_key(|t| t.trial_number);

        if cancelled {
            status.mark_cancelled();
        } else if status.trials_completed == 0 && status.trials_failed > 0 {
            status.mark_failed(format!("all {} trials failed", status.trials_failed));
        } else {
            status.mark_completed();
        }

        let snapshot = self.pool.snapshot();
        match &status.best_trial {
            Some(best) => info!(
                study = %status.config.name,
                state = ?status.state,
                completed = status.trials_completed,
                failed = status.trials_failed,
                metric = %status.config.objective_metric,
                best_trial = best.trial_number,
                best_objective = best.objective,
                "Study finished"
            ),
            None => warn!(
                study = %status.config.name,
                state = ?status.state,
                failed = status.trials_failed,
                "Study finished without a successful trial"
            ),
        }

        Ok(StudyReport {
            status,
            trials,
            pool: snapshot,
        })
    }
}

/// Run one trial on a leased device.
fn evaluate<F>(pool: &DevicePool, objective: &F, mut trial: Trial) -> Trial
where
    F: Fn(&TrialContext<'_>) -> Result<TrialOutcome, TrialError>,
{
    let lease = pool.lease();
    let device = lease.device();
    trial.mark_running(device);
    debug!(trial = trial.trial_number, device = device.index(), "Trial started");

    let started = Instant::now();
    let ctx = TrialContext {
        trial_id: trial.id,
        trial_number: trial.trial_number,
        device,
        parameters: &trial.parameters,
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| objective(&ctx)))
        .unwrap_or_else(|payload| {
            Err(TrialError::Panicked {
                message: panic_message(payload.as_ref()),
            })
        })
        .and_then(|outcome| {
            if outcome.objective.is_finite() {
                Ok(outcome)
            } else {
                Err(TrialError::NonFiniteObjective {
                    value: outcome.objective,
                })
            }
        });

    drop(lease);
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(outcome) => {
            debug!(
                trial = trial.trial_number,
                device = device.index(),
                objective = outcome.objective,
                duration_ms,
                "Trial completed"
            );
            let result = TrialResult {
                trial_id: trial.id,
                trial_number: trial.trial_number,
                objective: outcome.objective,
                metrics: outcome.metrics,
                parameters: trial.parameters.clone(),
                device,
                duration_ms: Some(duration_ms),
            };
            trial.mark_completed(result);
        }
        Err(e) => {
            warn!(
                trial = trial.trial_number,
                device = device.index(),
                error = %e,
                "Trial failed"
            );
            trial.mark_failed(e.to_string());
        }
    }

    trial
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
