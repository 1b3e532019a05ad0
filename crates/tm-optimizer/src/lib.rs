//! # tm-optimizer
//!
//! Parameter search and device-aware trial execution for Trialmux.
//!
//! Provides search space definitions, parameter sweep strategies (grid,
//! random, Bayesian-style explore/exploit), trial and study tracking, and a
//! [`TrialRunner`] that evaluates trials in parallel while spreading them
//! across a [`tm_devices::DevicePool`].

mod executor;
mod runner;
mod search;
mod trial;

pub use executor::{DeviceKind, ExecutorConfig};
pub use runner::{StudyReport, TrialContext, TrialOutcome, TrialRunner};
pub use search::{
    build_strategy, BayesianSearch, GridSearch, ParameterDef, ParameterKind, ParameterSet,
    ParameterValue, RandomSearch, SearchSpace, SearchStrategy, StrategyKind,
};
pub use trial::{
    ObjectiveDirection, StudyConfig, StudyId, StudyState, StudyStatus, Trial, TrialResult,
    TrialStatus,
};
