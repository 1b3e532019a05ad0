//! Synthetic stand-in for a GPU-trained boosted-tree classifier.
//!
//! The response surface peaks at max_depth=7, learning_rate=0.05,
//! subsample=0.8, n_estimators=350 with a validation AUC of 0.97.

use std::time::Duration;

use tm_optimizer::{TrialContext, TrialOutcome};
use tm_types::TrialError;
use tracing::debug;

const PEAK_AUC: f64 = 0.97;

/// Validation AUC for one hyperparameter combination.
pub fn validation_auc(
    max_depth: f64,
    learning_rate: f64,
    subsample: f64,
    n_estimators: f64,
) -> f64 {
    let depth_penalty = 0.002 * (max_depth - 7.0).powi(2);
    let lr_penalty = 0.04 * (learning_rate.log10() - 0.05f64.log10()).powi(2);
    let subsample_penalty = 0.1 * (subsample - 0.8).powi(2);
    let trees_penalty = 1.5e-7 * (n_estimators - 350.0).powi(2);

    (PEAK_AUC - depth_penalty - lr_penalty - subsample_penalty - trees_penalty).clamp(0.5, 1.0)
}

/// Evaluate one trial, holding its device for `delay` to mimic training.
pub fn evaluate(ctx: &TrialContext<'_>, delay: Duration) -> Result<TrialOutcome, TrialError> {
    let max_depth = ctx.require_float("max_depth")?;
    let learning_rate = ctx.require_float("learning_rate")?;
    let subsample = ctx.require_float("subsample")?;
    let n_estimators = ctx.require_float("n_estimators")?;

    if learning_rate <= 0.0 {
        return Err(TrialError::objective(format!(
            "learning_rate must be positive, got {learning_rate}"
        )));
    }

    debug!(
        trial = ctx.trial_number,
        device = ctx.device.index(),
        max_depth,
        learning_rate,
        "Training on device"
    );
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }

    let auc = validation_auc(max_depth, learning_rate, subsample, n_estimators);
    Ok(TrialOutcome::new(auc)
        .with_metric("val_auc", auc)
        .with_metric("device", ctx.device.index() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tm_devices::DeviceId;
    use tm_optimizer::ParameterValue;
    use uuid::Uuid;

    #[test]
    fn surface_peaks_at_optimum() {
        let peak = validation_auc(7.0, 0.05, 0.8, 350.0);
        assert!((peak - PEAK_AUC).abs() < 1e-12);
        assert!(validation_auc(2.0, 0.001, 0.5, 100.0) < peak);
        assert!(validation_auc(12.0, 0.3, 1.0, 600.0) < peak);
    }

    #[test]
    fn evaluate_reports_device_metric() {
        let mut params = HashMap::new();
        params.insert("max_depth".to_string(), ParameterValue::Int(7));
        params.insert("learning_rate".to_string(), ParameterValue::Float(0.05));
        params.insert("subsample".to_string(), ParameterValue::Float(0.8));
        params.insert("n_estimators".to_string(), ParameterValue::Int(350));

        let ctx = TrialContext {
            trial_id: Uuid::new_v4(),
            trial_number: 0,
            device: DeviceId(3),
            parameters: &params,
        };
        let outcome = evaluate(&ctx, Duration::ZERO).unwrap();
        assert!((outcome.objective - PEAK_AUC).abs() < 1e-12);
        assert_eq!(outcome.metrics["device"], 3.0);
    }

    #[test]
    fn missing_parameter_fails_trial() {
        let params = HashMap::new();
        let ctx = TrialContext {
            trial_id: Uuid::new_v4(),
            trial_number: 0,
            device: DeviceId(0),
            parameters: &params,
        };
        assert!(matches!(
            evaluate(&ctx, Duration::ZERO),
            Err(TrialError::Objective { .. })
        ));
    }
}
