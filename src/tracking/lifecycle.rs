//! Sequential score and confirm/delete thresholds
//!
//! The track score is an accumulated negative log-likelihood ratio: good
//! updates push it down, misses push it up. Confirmation and deletion are
//! threshold crossings derived from the false-confirmation and true-deletion
//! probabilities.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Scoring and lifecycle constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Assumed probability of detection.
    pub pd: f64,
    /// False-alarm probability per resolution cell.
    pub pfa: f64,
    /// Resolution-cell volume.
    pub vc: f64,
    /// Probability of confirming a false track.
    pub alpha_c: f64,
    /// Probability of deleting a true track.
    pub beta_c: f64,
    pub score_init: f64,
    /// Coast time after which a track is neither active nor confirmed
    /// (seconds).
    pub threshold_coast: f64,
    pub max_missed: u32,
    /// Update count above which a track is confirmed regardless of score.
    pub threshold_confirmed: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            pd: 0.9,
            pfa: 1e-7,
            vc: 1.0,
            alpha_c: 1e-4,
            beta_c: 1e-2,
            score_init: -(15.0_f64.ln()),
            threshold_coast: 5.0,
            max_missed: 6,
            threshold_confirmed: 10,
        }
    }
}

impl LifecycleConfig {
    /// Parses a configuration, filling missing fields with defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let open_unit = |p: f64| p > 0.0 && p < 1.0;
        if !open_unit(self.pd) || !open_unit(self.alpha_c) || !open_unit(self.beta_c) {
            return Err(Error::Decode(
                "pd, alpha_c and beta_c must lie strictly between 0 and 1".into(),
            ));
        }
        if self.pfa <= 0.0 || self.vc <= 0.0 {
            return Err(Error::Decode("pfa and vc must be positive".into()));
        }
        if self.threshold_coast < 0.0 {
            return Err(Error::Decode("threshold_coast must be non-negative".into()));
        }
        Ok(())
    }
}

/// Thresholds and score increments derived once from a [`LifecycleConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifecycle {
    config: LifecycleConfig,
    score_confirm: f64,
    score_delete: f64,
    missed_penalty: f64,
    ln_beta_ft: f64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}

impl Lifecycle {
    /// # Panics
    /// Panics if a probability lies outside `(0, 1)` or a density is not
    /// positive.
    pub fn new(config: LifecycleConfig) -> Self {
        assert!(config.pd > 0.0 && config.pd < 1.0, "Detection probability must be in (0, 1)");
        assert!(config.alpha_c > 0.0 && config.alpha_c < 1.0, "alpha_c must be in (0, 1)");
        assert!(config.beta_c > 0.0 && config.beta_c < 1.0, "beta_c must be in (0, 1)");
        assert!(config.pfa > 0.0 && config.vc > 0.0, "False-target density must be positive");

        let score_confirm = -((1.0 - config.beta_c) / config.alpha_c).ln() + config.score_init;
        let score_delete = -(config.beta_c / (1.0 - config.alpha_c)).ln();
        Self {
            config,
            score_confirm,
            score_delete,
            missed_penalty: -(1.0 - config.pd).ln(),
            ln_beta_ft: (config.pfa / config.vc).ln(),
        }
    }

    #[inline]
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Scores below this confirm a track.
    #[inline]
    pub fn score_confirm(&self) -> f64 {
        self.score_confirm
    }

    /// Scores above this delete a track.
    #[inline]
    pub fn score_delete(&self) -> f64 {
        self.score_delete
    }

    /// Added to the score for every missed detection.
    #[inline]
    pub fn missed_penalty(&self) -> f64 {
        self.missed_penalty
    }

    /// Score increment of an update with squared Mahalanobis distance `d2`,
    /// measurement dimension `m` and innovation covariance determinant
    /// `det_s`.
    pub fn update_increment(&self, d2: f64, m: usize, det_s: f64) -> f64 {
        let m = m as f64;
        d2 / 2.0 + m / 2.0 * core::f64::consts::TAU.ln() + det_s.ln() / 2.0 + self.ln_beta_ft
            - self.config.pd.ln()
    }

    /// True unless one of the deletion criteria is met.
    pub fn is_active(&self, score: f64, dt_coast: f64, n_missed: u32) -> bool {
        !(score > self.score_delete
            || dt_coast > self.config.threshold_coast
            || n_missed > self.config.max_missed)
    }

    /// Confirmation of a track that is still active.
    pub fn is_confirmed(&self, score: f64, dt_coast: f64, n_missed: u32, n_updates: u32) -> bool {
        if !self.is_active(score, dt_coast, n_missed) {
            return false;
        }
        score < self.score_confirm || n_updates > self.config.threshold_confirmed
    }
}

/// Probability of a true track for a score, saturating at 1.
pub fn track_probability(score: f64) -> f64 {
    if score < -500.0 {
        1.0
    } else {
        let e = (-score).exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_thresholds() {
        let lifecycle = Lifecycle::default();
        let expected_confirm = -(0.99_f64 / 1e-4).ln() - 15.0_f64.ln();
        assert_relative_eq!(lifecycle.score_confirm(), expected_confirm, epsilon = 1e-12);
        assert_relative_eq!(lifecycle.score_delete(), -(0.01_f64 / (1.0 - 1e-4)).ln(), epsilon = 1e-12);
        assert_relative_eq!(lifecycle.missed_penalty(), -(0.1_f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_activity_criteria() {
        let lifecycle = Lifecycle::default();
        assert!(lifecycle.is_active(0.0, 4.9, 6));
        assert!(!lifecycle.is_active(0.0, 5.1, 0));
        assert!(!lifecycle.is_active(0.0, 0.0, 7));
        assert!(!lifecycle.is_active(lifecycle.score_delete() + 0.1, 0.0, 0));
    }

    #[test]
    fn test_short_coast_threshold_deactivates() {
        let lifecycle = Lifecycle::new(LifecycleConfig {
            threshold_coast: 2.0,
            ..LifecycleConfig::default()
        });
        assert!(lifecycle.is_active(0.0, 1.9, 0));
        assert!(!lifecycle.is_active(0.0, 3.0, 0));
        assert!(!lifecycle.is_confirmed(-100.0, 3.0, 0, 20));
    }

    #[test]
    fn test_confirmation_by_update_count() {
        let lifecycle = Lifecycle::default();
        assert!(!lifecycle.is_confirmed(0.0, 0.0, 0, 10));
        assert!(lifecycle.is_confirmed(0.0, 0.0, 0, 11));
        assert!(!lifecycle.is_confirmed(0.0, 6.0, 0, 11));
    }

    #[test]
    fn test_probability_saturates() {
        assert_relative_eq!(track_probability(0.0), 0.5);
        assert_eq!(track_probability(-1000.0), 1.0);
        assert!(track_probability(50.0) < 1e-20);
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let config = LifecycleConfig::from_json(r#"{"pd": 0.8, "max_missed": 3}"#).unwrap();
        assert_relative_eq!(config.pd, 0.8);
        assert_eq!(config.max_missed, 3);
        assert_eq!(config.threshold_confirmed, 10);
        assert!(LifecycleConfig::from_json(r#"{"pd": 1.5}"#).is_err());
    }
}
