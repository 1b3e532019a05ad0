//! Search space definitions and parameter sweep strategies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tm_types::{validation_error, TmResult};

use crate::trial::{ObjectiveDirection, StudyConfig};

/// Largest grid `build_strategy` will materialise.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Parameter assignment for one trial.
pub type ParameterSet = HashMap<String, ParameterValue>;

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Hyperparameter name as the objective expects it (e.g. "max_depth").
    pub name: String,
    /// The kind of search range.
    pub kind: ParameterKind,
}

/// Describes how a parameter is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    /// Continuous uniform range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
    /// Categorical choices.
    Choice { values: Vec<serde_json::Value> },
}

/// A concrete parameter value produced by a search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl ParameterValue {
    /// Numeric view; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Json(v) => v.as_f64(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Json(v) => v.as_i64(),
            Self::Float(_) => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    pub fn add_choice(mut self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Choice { values },
        });
        self
    }

    /// Total number of grid points (returns `None` if any parameter is
    /// continuous without a natural grid, or the count overflows).
    pub fn grid_size(&self) -> Option<usize> {
        let mut total: usize = 1;
        for param in &self.parameters {
            let dim_size = match &param.kind {
                ParameterKind::IntRange { low, high } => int_axis_len(*low, *high)?,
                ParameterKind::Choice { values } => values.len(),
                _ => return None,
            };
            total = total.checked_mul(dim_size)?;
        }
        Some(total)
    }

    /// Number of points [`GridSearch`] produces when continuous axes are
    /// split into `float_steps` points. `None` on overflow.
    pub fn grid_points(&self, float_steps: usize) -> Option<usize> {
        let mut total: usize = 1;
        for param in &self.parameters {
            let dim_size = match &param.kind {
                ParameterKind::IntRange { low, high } => int_axis_len(*low, *high)?,
                ParameterKind::Choice { values } => values.len(),
                ParameterKind::FloatRange { .. } | ParameterKind::LogUniform { .. } => {
                    float_steps.max(2)
                }
            };
            total = total.checked_mul(dim_size)?;
        }
        Some(total)
    }

    /// Reject spaces that no strategy can sample from.
    pub fn validate(&self) -> TmResult<()> {
        if self.parameters.is_empty() {
            return Err(validation_error!("search space has no parameters"));
        }

        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(validation_error!("duplicate parameter '{}'", param.name));
            }

            match &param.kind {
                ParameterKind::FloatRange { low, high } => {
                    if !low.is_finite() || !high.is_finite() || low > high {
                        return Err(validation_error!(
                            "parameter '{}' has invalid range [{low}, {high}]",
                            param.name
                        ));
                    }
                    if !(high - low).is_finite() {
                        return Err(validation_error!(
                            "parameter '{}' range [{low}, {high}] is too wide to sample",
                            param.name
                        ));
                    }
                }
                ParameterKind::IntRange { low, high } => {
                    if low > high {
                        return Err(validation_error!(
                            "parameter '{}' has invalid range [{low}, {high}]",
                            param.name
                        ));
                    }
                }
                ParameterKind::LogUniform { low, high } => {
                    if !(*low > 0.0) || !high.is_finite() || low > high {
                        return Err(validation_error!(
                            "parameter '{}' needs 0 < low <= high for log sampling, got [{}, {}]",
                            param.name,
                            low,
                            high
                        ));
                    }
                    if !(high.ln() - low.ln()).is_finite() {
                        return Err(validation_error!(
                            "parameter '{}' log range [{low}, {high}] is too wide to sample",
                            param.name
                        ));
                    }
                }
                ParameterKind::Choice { values } => {
                    if values.is_empty() {
                        return Err(validation_error!("parameter '{}' has no choices", param.name));
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}

fn int_axis_len(low: i64, high: i64) -> Option<usize> {
    let span = high.checked_sub(low)?.checked_add(1)?;
    usize::try_from(span).ok()
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

// ---------------------------------------------------------------------------
// Search strategies
// ---------------------------------------------------------------------------

/// Which sweep a study uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Grid,
    Random,
    Bayesian,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Grid => "grid",
            Self::Random => "random",
            Self::Bayesian => "bayesian",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grid" => Ok(Self::Grid),
            "random" => Ok(Self::Random),
            "bayesian" => Ok(Self::Bayesian),
            other => Err(format!("unknown strategy '{other}' (expected grid, random or bayesian)")),
        }
    }
}

/// Common trait for all search strategies.
pub trait SearchStrategy: Send + Sync {
    /// Generate the next batch of parameter combinations to evaluate.
    /// Fewer than `count` (possibly zero) means the strategy is exhausted.
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet>;

    /// Report completed trial results so adaptive strategies can learn.
    fn report(&mut self, _params: &ParameterSet, _objective: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Build the strategy named by `config`, validating its search space first.
pub fn build_strategy(config: &StudyConfig) -> TmResult<Box<dyn SearchStrategy>> {
    config.search_space.validate()?;

    if config.strategy == StrategyKind::Grid {
        match config.search_space.grid_points(config.grid_steps) {
            Some(points) if points <= MAX_GRID_POINTS => {}
            Some(points) => {
                return Err(validation_error!(
                    "grid of {points} points exceeds the limit of {MAX_GRID_POINTS}"
                ))
            }
            None => return Err(validation_error!("grid size overflows")),
        }
    }

    let strategy: Box<dyn SearchStrategy> = match config.strategy {
        StrategyKind::Grid => Box::new(GridSearch::new(
            config.search_space.clone(),
            config.grid_steps,
        )),
        StrategyKind::Random => Box::new(RandomSearch::with_seed(
            config.search_space.clone(),
            config.seed,
        )),
        StrategyKind::Bayesian => Box::new(
            BayesianSearch::with_seed(
                config.search_space.clone(),
                config.exploration_weight,
                config.seed,
            )
            .with_direction(config.direction),
        ),
    };
    Ok(strategy)
}

// ---- Grid search ----

/// Exhaustive grid search over discrete parameter combinations.
#[derive(Debug, Clone)]
pub struct GridSearch {
    cursor: usize,
    combos: Vec<ParameterSet>,
}

impl GridSearch {
    /// `float_steps` is the number of evenly spaced points taken on each
    /// continuous axis (at least 2). The whole grid is built up front; check
    /// [`SearchSpace::grid_points`] first for wide integer axes.
    pub fn new(space: SearchSpace, float_steps: usize) -> Self {
        Self {
            cursor: 0,
            combos: Self::build_grid(&space, float_steps),
        }
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    fn build_grid(space: &SearchSpace, float_steps: usize) -> Vec<ParameterSet> {
        let mut axes: Vec<Vec<(&str, ParameterValue)>> = Vec::new();

        for param in &space.parameters {
            let values: Vec<ParameterValue> = match &param.kind {
                ParameterKind::FloatRange { low, high } => {
                    let steps = float_steps.max(2);
                    (0..steps)
                        .map(|i| {
                            let t = i as f64 / (steps - 1) as f64;
                            ParameterValue::Float(low + t * (high - low))
                        })
                        .collect()
                }
                ParameterKind::IntRange { low, high } => {
                    (*low..=*high).map(ParameterValue::Int).collect()
                }
                ParameterKind::LogUniform { low, high } => {
                    let steps = float_steps.max(2);
                    let log_low = low.ln();
                    let log_high = high.ln();
                    (0..steps)
                        .map(|i| {
                            let t = i as f64 / (steps - 1) as f64;
                            ParameterValue::Float((log_low + t * (log_high - log_low)).exp())
                        })
                        .collect()
                }
                ParameterKind::Choice { values } => values
                    .iter()
                    .map(|v| ParameterValue::Json(v.clone()))
                    .collect(),
            };
            axes.push(
                values
                    .into_iter()
                    .map(|v| (param.name.as_str(), v))
                    .collect(),
            );
        }

        if axes.is_empty() {
            return Vec::new();
        }

        // Cartesian product
        let mut result: Vec<ParameterSet> = vec![HashMap::new()];
        for axis in &axes {
            let mut next = Vec::with_capacity(result.len() * axis.len());
            for existing in &result {
                for (name, value) in axis {
                    let mut combo = existing.clone();
                    combo.insert(name.to_string(), value.clone());
                    next.push(combo);
                }
            }
            result = next;
        }

        result
    }
}

impl SearchStrategy for GridSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        let end = (self.cursor + count).min(self.combos.len());
        let batch = self.combos[self.cursor..end].to_vec();
        self.cursor = end;
        batch
    }

    fn name(&self) -> &str {
        "grid"
    }
}

// ---- Random search ----

/// Independent random sampling across the search space.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(space: SearchSpace) -> Self {
        Self::with_seed(space, None)
    }

    pub fn with_seed(space: SearchSpace, seed: Option<u64>) -> Self {
        Self {
            space,
            rng: seeded_rng(seed),
        }
    }

    fn sample_one(&mut self) -> ParameterSet {
        let mut params = HashMap::new();
        for param in &self.space.parameters {
            let value = sample_param(&mut self.rng, &param.kind);
            params.insert(param.name.clone(), value);
        }
        params
    }
}

fn sample_param(rng: &mut StdRng, kind: &ParameterKind) -> ParameterValue {
    match kind {
        ParameterKind::FloatRange { low, high } => {
            ParameterValue::Float(rng.random_range(*low..=*high))
        }
        ParameterKind::IntRange { low, high } => {
            ParameterValue::Int(rng.random_range(*low..=*high))
        }
        ParameterKind::LogUniform { low, high } => {
            let log_val: f64 = rng.random_range(low.ln()..=high.ln());
            ParameterValue::Float(log_val.exp().clamp(*low, *high))
        }
        ParameterKind::Choice { values } => {
            if values.is_empty() {
                return ParameterValue::Json(serde_json::Value::Null);
            }
            let idx = rng.random_range(0..values.len());
            ParameterValue::Json(values[idx].clone())
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        (0..count).map(|_| self.sample_one()).collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- Bayesian-style search (explore / perturb-the-best) ----

/// Explore/exploit search that biases sampling toward the best observation.
///
/// With probability `exploration_weight` a suggestion is drawn uniformly;
/// otherwise the best observed point is perturbed by up to 10% of each
/// dimension's range. Which point is "best" follows the study direction.
#[derive(Debug, Clone)]
pub struct BayesianSearch {
    sampler: RandomSearch,
    observations: Vec<(ParameterSet, f64)>,
    exploration_weight: f64,
    direction: ObjectiveDirection,
}

impl BayesianSearch {
    pub fn new(space: SearchSpace, exploration_weight: f64) -> Self {
        Self::with_seed(space, exploration_weight, None)
    }

    pub fn with_seed(space: SearchSpace, exploration_weight: f64, seed: Option<u64>) -> Self {
        Self {
            sampler: RandomSearch::with_seed(space, seed),
            observations: Vec::new(),
            exploration_weight: exploration_weight.clamp(0.0, 1.0),
            direction: ObjectiveDirection::Maximize,
        }
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn observations(&self) -> usize {
        self.observations.len()
    }

    fn best(&self) -> Option<&ParameterSet> {
        let cmp = |a: &&(ParameterSet, f64), b: &&(ParameterSet, f64)| {
            a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
        };
        let best = match self.direction {
            ObjectiveDirection::Maximize => self.observations.iter().max_by(cmp),
            ObjectiveDirection::Minimize => self.observations.iter().min_by(cmp),
        };
        best.map(|(params, _)| params)
    }

    /// Exploitation: perturb the best-known point.
    fn exploit(&mut self) -> ParameterSet {
        let base = match self.best() {
            Some(params) => params.clone(),
            None => return self.sampler.sample_one(),
        };

        let rng = &mut self.sampler.rng;
        let mut perturbed = HashMap::new();

        for param in &self.sampler.space.parameters {
            let value = match (&param.kind, base.get(&param.name)) {
                (ParameterKind::FloatRange { low, high }, Some(ParameterValue::Float(v))) => {
                    let noise = rng.random_range(-0.1..0.1) * (high - low);
                    ParameterValue::Float((v + noise).clamp(*low, *high))
                }
                (ParameterKind::IntRange { low, high }, Some(ParameterValue::Int(v))) => {
                    let delta: i64 = rng.random_range(-2..=2);
                    ParameterValue::Int(v.saturating_add(delta).clamp(*low, *high))
                }
                (ParameterKind::LogUniform { low, high }, Some(ParameterValue::Float(v))) => {
                    let log_range = high.ln() - low.ln();
                    let noise = rng.random_range(-0.1..0.1) * log_range;
                    ParameterValue::Float((v.ln() + noise).exp().clamp(*low, *high))
                }
                // Choices are resampled
                (kind, _) => sample_param(rng, kind),
            };
            perturbed.insert(param.name.clone(), value);
        }

        perturbed
    }
}

impl SearchStrategy for BayesianSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        (0..count)
            .map(|_| {
                let explore = self.observations.is_empty()
                    || self.sampler.rng.random::<f64>() < self.exploration_weight;
                if explore {
                    self.sampler.sample_one()
                } else {
                    self.exploit()
                }
            })
            .collect()
    }

    fn report(&mut self, params: &ParameterSet, objective: f64) {
        if objective.is_finite() {
            self.observations.push((params.clone(), objective));
        }
    }

    fn name(&self) -> &str {
        "bayesian"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_space() -> SearchSpace {
        SearchSpace::new()
            .add_int("max_depth", 2, 12)
            .add_int("n_estimators", 50, 500)
            .add_float("subsample", 0.5, 1.0)
    }

    #[test]
    fn grid_search_produces_correct_count() {
        let space = SearchSpace::new()
            .add_int("a", 1, 3) // 3 values
            .add_int("b", 10, 11); // 2 values
        assert_eq!(space.grid_size(), Some(6));

        let mut gs = GridSearch::new(space, 5);
        assert_eq!(gs.len(), 6);
        let batch = gs.suggest(100);
        assert_eq!(batch.len(), 6);
    }

    #[test]
    fn grid_search_cursor_advances() {
        let space = SearchSpace::new().add_int("x", 1, 5); // 5 values
        let mut gs = GridSearch::new(space, 5);
        let first = gs.suggest(3);
        assert_eq!(first.len(), 3);
        let second = gs.suggest(10);
        assert_eq!(second.len(), 2); // only 2 remain
        assert!(gs.suggest(1).is_empty());
    }

    #[test]
    fn grid_search_float_axis_hits_endpoints() {
        let space = SearchSpace::new().add_float("eta", 0.0, 1.0);
        let mut gs = GridSearch::new(space, 3);
        let values: Vec<f64> = gs
            .suggest(10)
            .iter()
            .map(|p| p["eta"].as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn empty_space_grid_is_empty() {
        let gs = GridSearch::new(SearchSpace::new(), 5);
        assert!(gs.is_empty());
    }

    #[test]
    fn random_search_respects_bounds() {
        let mut rs = RandomSearch::with_seed(sample_space(), Some(1));
        let suggestions = rs.suggest(50);
        assert_eq!(suggestions.len(), 50);

        for params in &suggestions {
            match params.get("max_depth") {
                Some(ParameterValue::Int(v)) => assert!(*v >= 2 && *v <= 12),
                other => panic!("unexpected max_depth value: {other:?}"),
            }
            match params.get("subsample") {
                Some(ParameterValue::Float(v)) => assert!(*v >= 0.5 && *v <= 1.0),
                other => panic!("unexpected subsample value: {other:?}"),
            }
        }
    }

    #[test]
    fn seeded_random_search_is_reproducible() {
        let mut a = RandomSearch::with_seed(sample_space(), Some(42));
        let mut b = RandomSearch::with_seed(sample_space(), Some(42));
        assert_eq!(a.suggest(10), b.suggest(10));
    }

    #[test]
    fn bayesian_search_starts_with_exploration() {
        let mut bs = BayesianSearch::with_seed(sample_space(), 0.3, Some(3));
        let suggestions = bs.suggest(10);
        assert_eq!(suggestions.len(), 10);
        assert_eq!(bs.observations(), 0);
    }

    #[test]
    fn bayesian_search_exploits_after_reports() {
        let space = SearchSpace::new().add_float("learning_rate", 0.0, 1.0);
        // exploration_weight=0 → always exploit after report
        let mut bs = BayesianSearch::with_seed(space, 0.0, Some(9));

        let mut best = HashMap::new();
        best.insert("learning_rate".to_string(), ParameterValue::Float(0.5));
        bs.report(&best, 0.95);

        let mut worse = HashMap::new();
        worse.insert("learning_rate".to_string(), ParameterValue::Float(0.05));
        bs.report(&worse, 0.10);

        for params in &bs.suggest(20) {
            match params.get("learning_rate") {
                Some(ParameterValue::Float(v)) => assert!((v - 0.5).abs() <= 0.1 + 1e-9),
                other => panic!("unexpected learning_rate value: {other:?}"),
            }
        }
    }

    #[test]
    fn bayesian_search_minimize_exploits_lowest() {
        let space = SearchSpace::new().add_int("max_depth", 0, 100);
        let mut bs = BayesianSearch::with_seed(space, 0.0, Some(5))
            .with_direction(ObjectiveDirection::Minimize);

        let mut low = HashMap::new();
        low.insert("max_depth".to_string(), ParameterValue::Int(10));
        bs.report(&low, 0.01);

        let mut high = HashMap::new();
        high.insert("max_depth".to_string(), ParameterValue::Int(90));
        bs.report(&high, 0.80);

        for params in &bs.suggest(20) {
            let v = params["max_depth"].as_i64().unwrap();
            assert!((8..=12).contains(&v), "max_depth {v} not near 10");
        }
    }

    #[test]
    fn bayesian_ignores_non_finite_reports() {
        let mut bs = BayesianSearch::new(sample_space(), 0.5);
        bs.report(&HashMap::new(), f64::NAN);
        assert_eq!(bs.observations(), 0);
    }

    #[test]
    fn grid_size_none_for_float_only() {
        let space = SearchSpace::new().add_float("x", 0.0, 1.0);
        assert_eq!(space.grid_size(), None);
    }

    #[test]
    fn choice_parameter_works() {
        let space = SearchSpace::new().add_choice(
            "booster",
            vec![
                serde_json::json!("gbtree"),
                serde_json::json!("gblinear"),
                serde_json::json!("dart"),
            ],
        );
        let mut rs = RandomSearch::new(space);
        let suggestions = rs.suggest(30);
        assert_eq!(suggestions.len(), 30);
        for params in &suggestions {
            match params.get("booster") {
                Some(ParameterValue::Json(v)) => {
                    let s = v.as_str().unwrap();
                    assert!(["gbtree", "gblinear", "dart"].contains(&s));
                }
                other => panic!("unexpected booster value: {other:?}"),
            }
        }
    }

    #[test]
    fn log_uniform_stays_in_bounds() {
        let space = SearchSpace::new().add_log_uniform("alpha", 1e-5, 1e-1);
        let mut rs = RandomSearch::new(space);
        for params in &rs.suggest(100) {
            match params.get("alpha") {
                Some(ParameterValue::Float(v)) => {
                    assert!(*v >= 1e-5 && *v <= 1e-1, "alpha out of bounds: {v}");
                }
                other => panic!("unexpected alpha value: {other:?}"),
            }
        }
    }

    #[test]
    fn validate_rejects_bad_spaces() {
        assert!(SearchSpace::new().validate().is_err());
        assert!(SearchSpace::new().add_float("x", 1.0, 0.0).validate().is_err());
        assert!(SearchSpace::new().add_int("x", 5, 1).validate().is_err());
        assert!(SearchSpace::new().add_log_uniform("x", 0.0, 1.0).validate().is_err());
        assert!(SearchSpace::new().add_choice("x", vec![]).validate().is_err());
        assert!(SearchSpace::new()
            .add_int("x", 0, 1)
            .add_float("x", 0.0, 1.0)
            .validate()
            .is_err());
        assert!(sample_space().validate().is_ok());
    }

    #[test]
    fn strategy_kind_parses() {
        assert_eq!("Grid".parse::<StrategyKind>().unwrap(), StrategyKind::Grid);
        assert_eq!("bayesian".parse::<StrategyKind>().unwrap(), StrategyKind::Bayesian);
        assert!("hyperband".parse::<StrategyKind>().is_err());
        assert_eq!(
            serde_json::to_string(&StrategyKind::Random).unwrap(),
            "\"random\""
        );
    }

    #[test]
    fn search_space_serde_shape() {
        let space = SearchSpace::new().add_int("max_depth", 2, 8);
        let json = serde_json::to_value(&space).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "parameters": [
                    {"name": "max_depth", "kind": {"type": "int_range", "low": 2, "high": 8}}
                ]
            })
        );
    }

    #[test]
    fn validate_rejects_unsampleable_widths() {
        let space = SearchSpace::new().add_float("x", -f64::MAX, f64::MAX);
        assert!(space.validate().is_err());

        let space = SearchSpace::new().add_log_uniform("x", f64::MIN_POSITIVE, f64::MAX);
        assert!(space.validate().is_ok());
    }

    #[test]
    fn grid_size_overflow_is_none() {
        let space = SearchSpace::new().add_int("x", i64::MIN, i64::MAX);
        assert!(space.validate().is_ok());
        assert_eq!(space.grid_size(), None);
        assert_eq!(space.grid_points(5), None);

        let space = SearchSpace::new()
            .add_int("a", 0, 1 << 40)
            .add_int("b", 0, 1 << 40);
        assert_eq!(space.grid_size(), None);
    }

    #[test]
    fn grid_points_counts_float_axes() {
        let space = SearchSpace::new()
            .add_int("max_depth", 2, 4)
            .add_float("subsample", 0.5, 1.0)
            .add_log_uniform("eta", 1e-3, 1e-1);
        assert_eq!(space.grid_size(), None);
        assert_eq!(space.grid_points(4), Some(3 * 4 * 4));
        assert_eq!(space.grid_points(0), Some(3 * 2 * 2));
    }

    #[test]
    fn build_strategy_rejects_oversized_grids() {
        let wide = SearchSpace::new().add_int("n", 0, 1_000_000_000_000);
        let config = StudyConfig::new("wide", wide.clone(), StrategyKind::Grid);
        assert!(build_strategy(&config).is_err());

        let full = SearchSpace::new().add_int("n", i64::MIN, i64::MAX);
        let config = StudyConfig::new("full", full, StrategyKind::Grid);
        assert!(build_strategy(&config).is_err());

        // Wide ranges are fine when sampled rather than enumerated
        let config = StudyConfig::new("wide", wide, StrategyKind::Random);
        assert!(build_strategy(&config).is_ok());

        let small = SearchSpace::new().add_int("n", 0, 9).add_float("x", 0.0, 1.0);
        let config = StudyConfig::new("small", small, StrategyKind::Grid).with_grid_steps(3);
        let mut strategy = build_strategy(&config).unwrap();
        assert_eq!(strategy.suggest(100).len(), 30);
    }

    #[test]
    fn bayesian_int_perturbation_saturates_at_bounds() {
        let space = SearchSpace::new().add_int("x", i64::MAX - 1, i64::MAX);
        let mut bs = BayesianSearch::with_seed(space, 0.0, Some(13));

        let mut best = HashMap::new();
        best.insert("x".to_string(), ParameterValue::Int(i64::MAX));
        bs.report(&best, 1.0);

        for params in &bs.suggest(20) {
            let v = params["x"].as_i64().unwrap();
            assert!(v >= i64::MAX - 1);
        }

        let space = SearchSpace::new().add_int("x", i64::MIN, i64::MIN + 1);
        let mut bs = BayesianSearch::with_seed(space, 0.0, Some(13));
        let mut best = HashMap::new();
        best.insert("x".to_string(), ParameterValue::Int(i64::MIN));
        bs.report(&best, 1.0);
        for params in &bs.suggest(20) {
            assert!(params["x"].as_i64().unwrap() <= i64::MIN + 1);
        }
    }
}
