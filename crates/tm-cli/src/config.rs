//! Command-line arguments and run configuration.
//!
//! Settings come from an optional JSON file; explicit flags override it.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tm_optimizer::{ExecutorConfig, ObjectiveDirection, SearchSpace, StrategyKind, StudyConfig};
use tm_types::{ConfigError, TmResult};

/// Command-line arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "trialmux",
    version,
    about = "Run a hyperparameter study with trials spread across accelerator devices"
)]
pub struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of devices in the pool.
    #[arg(long)]
    pub devices: Option<usize>,

    /// Worker threads evaluating trials.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Maximum number of trials.
    #[arg(long)]
    pub trials: Option<usize>,

    /// Trials allowed in flight at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Search strategy: grid, random or bayesian.
    #[arg(long)]
    pub strategy: Option<StrategyKind>,

    /// RNG seed for reproducible sampling.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Simulated training time per trial in milliseconds.
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Study settings as they appear in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudySettings {
    pub name: String,
    pub strategy: StrategyKind,
    pub max_trials: usize,
    pub concurrency: usize,
    pub direction: ObjectiveDirection,
    pub seed: Option<u64>,
    pub grid_steps: usize,
    pub exploration_weight: f64,
    /// Simulated training time per trial.
    pub trial_delay_ms: u64,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            name: "classifier-sweep".to_string(),
            strategy: StrategyKind::Bayesian,
            max_trials: 40,
            concurrency: 4,
            direction: ObjectiveDirection::Maximize,
            seed: None,
            grid_steps: 3,
            exploration_weight: 0.3,
            trial_delay_ms: 25,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub executor: ExecutorConfig,
    pub study: StudySettings,
}

impl AppConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Resolve the file (if any), apply flag overrides, and validate.
    pub fn load(cli: &Cli) -> TmResult<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(devices) = cli.devices {
            self.executor.num_devices = devices;
        }
        if let Some(workers) = cli.workers {
            self.executor.num_workers = workers;
        }
        if let Some(trials) = cli.trials {
            self.study.max_trials = trials;
        }
        if let Some(concurrency) = cli.concurrency {
            self.study.concurrency = concurrency;
        }
        if let Some(strategy) = cli.strategy {
            self.study.strategy = strategy;
        }
        if cli.seed.is_some() {
            self.study.seed = cli.seed;
        }
        if let Some(delay) = cli.delay_ms {
            self.study.trial_delay_ms = delay;
        }
    }

    pub fn validate(&self) -> TmResult<()> {
        self.executor.validate()?;
        self.study_config().validate()
    }

    /// Study over the demo classifier's hyperparameters.
    pub fn study_config(&self) -> StudyConfig {
        let settings = &self.study;
        let mut config = StudyConfig::new(settings.name.clone(), search_space(), settings.strategy)
            .with_max_trials(settings.max_trials)
            .with_concurrency(settings.concurrency)
            .with_objective("val_auc", settings.direction)
            .with_grid_steps(settings.grid_steps)
            .with_exploration_weight(settings.exploration_weight);
        config.seed = settings.seed;
        config
    }
}

/// Hyperparameters of the synthetic boosted-tree classifier.
pub fn search_space() -> SearchSpace {
    SearchSpace::new()
        .add_int("max_depth", 2, 12)
        .add_log_uniform("learning_rate", 1e-3, 0.3)
        .add_float("subsample", 0.5, 1.0)
        .add_int("n_estimators", 100, 600)
}
