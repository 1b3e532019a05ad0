//! Trial tracking and study run management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tm_devices::DeviceId;
use tm_types::{validation_error, TmResult};
use uuid::Uuid;

use crate::search::{ParameterSet, SearchSpace, StrategyKind};

/// Unique study identifier.
pub type StudyId = Uuid;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    /// True if `candidate` beats `incumbent` in this direction.
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }
}

/// Top-level configuration for a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub id: StudyId,
    pub name: String,

    /// The parameter search space.
    pub search_space: SearchSpace,

    pub strategy: StrategyKind,

    /// Maximum number of trials to run.
    pub max_trials: usize,

    /// How many trials may be in flight at once.
    pub concurrency: usize,

    /// Metric name reported as the objective (e.g. "auc", "logloss").
    pub objective_metric: String,

    /// Direction of optimization.
    pub direction: ObjectiveDirection,

    /// RNG seed for random and bayesian strategies.
    pub seed: Option<u64>,

    /// Exploration weight for Bayesian search (ignored for grid/random).
    pub exploration_weight: f64,

    /// Number of steps per continuous dimension for grid search.
    pub grid_steps: usize,

    pub created_at: DateTime<Utc>,
}

impl StudyConfig {
    pub fn new(name: impl Into<String>, search_space: SearchSpace, strategy: StrategyKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            search_space,
            strategy,
            max_trials: 100,
            concurrency: 4,
            objective_metric: "objective".to_string(),
            direction: ObjectiveDirection::Maximize,
            seed: None,
            exploration_weight: 0.3,
            grid_steps: 5,
            created_at: Utc::now(),
        }
    }

    pub fn with_max_trials(mut self, n: usize) -> Self {
        self.max_trials = n;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_objective(mut self, metric: &str, direction: ObjectiveDirection) -> Self {
        self.objective_metric = metric.to_string();
        self.direction = direction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_grid_steps(mut self, steps: usize) -> Self {
        self.grid_steps = steps;
        self
    }

    pub fn with_exploration_weight(mut self, weight: f64) -> Self {
        self.exploration_weight = weight;
        self
    }

    pub fn validate(&self) -> TmResult<()> {
        if self.max_trials == 0 {
            return Err(validation_error!("study '{}' has max_trials = 0", self.name));
        }
        if self.concurrency == 0 {
            return Err(validation_error!("study '{}' has concurrency = 0", self.name));
        }
        if !(0.0..=1.0).contains(&self.exploration_weight) {
            return Err(validation_error!(
                "exploration_weight must be within [0, 1], got {}",
                self.exploration_weight
            ));
        }
        self.search_space.validate()
    }
}

/// Lifecycle state for a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudyState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Aggregate status of a study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyStatus {
    pub id: StudyId,
    pub config: StudyConfig,
    pub state: StudyState,
    pub trials_completed: usize,
    pub trials_failed: usize,
    pub trials_running: usize,
    pub best_trial: Option<TrialResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StudyStatus {
    pub fn new(config: StudyConfig) -> Self {
        Self {
            id: config.id,
            config,
            state: StudyState::Pending,
            trials_completed: 0,
            trials_failed: 0,
            trials_running: 0,
            best_trial: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = StudyState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = StudyState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = StudyState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn mark_cancelled(&mut self) {
        self.state = StudyState::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    pub fn trials_finished(&self) -> usize {
        self.trials_completed + self.trials_failed
    }

    /// Fold a finished trial into the counters and best-trial tracking.
    pub fn record(&mut self, trial: &Trial) {
        match (&trial.status, &trial.result) {
            (TrialStatus::Completed, Some(result)) => {
                self.trials_completed += 1;
                self.update_best(result);
            }
            _ => self.trials_failed += 1,
        }
    }

    /// Update the best trial if `result` improves on the current best.
    /// Non-finite objectives never become the best.
    pub fn update_best(&mut self, result: &TrialResult) {
        if !result.objective.is_finite() {
            return;
        }
        let improves = match &self.best_trial {
            None => true,
            Some(current_best) => self
                .config
                .direction
                .improves(result.objective, current_best.objective),
        };
        if improves {
            self.best_trial = Some(result.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Individual trial
// ---------------------------------------------------------------------------

/// A single trial (one parameter combination evaluated by the objective).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub study_id: StudyId,
    pub trial_number: usize,
    pub parameters: ParameterSet,
    pub status: TrialStatus,
    pub result: Option<TrialResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Device the trial was bound to while running.
    pub device: Option<DeviceId>,
    pub error: Option<String>,
}

impl Trial {
    pub fn new(study_id: StudyId, trial_number: usize, parameters: ParameterSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            study_id,
            trial_number,
            parameters,
            status: TrialStatus::Pending,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            device: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self, device: DeviceId) {
        self.status = TrialStatus::Running;
        self.started_at = Some(Utc::now());
        self.device = Some(device);
    }

    pub fn mark_completed(&mut self, result: TrialResult) {
        self.status = TrialStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.result = Some(result);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = TrialStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TrialStatus::Completed | TrialStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Result of a single trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: Uuid,
    pub trial_number: usize,
    pub objective: f64,
    pub metrics: HashMap<String, f64>,
    pub parameters: ParameterSet,
    pub device: DeviceId,
    pub duration_ms: Option<u64>,
}
