//! Per-morphology reward weighting profiles.
//!
//! A profile is data, not code: a named map from term key to signed weight,
//! the shared tracking sigma, and the output convention the weights were
//! tuned for. Swapping morphologies (legged vs wheeled) means swapping
//! profiles; the catalog itself never branches on morphology.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RewardError;
use crate::normalize::Convention;
use crate::terms::TermId;
use crate::Result;

/// A named, immutable set of per-term weights.
///
/// A weight of exactly 0 disables a term's contribution (the term is still
/// evaluated for the diagnostic breakdown). Terms absent from the map
/// default to 0. Weights are tuned against one [`Convention`] and are not
/// meaningful under the other.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RewardProfile {
    /// Profile name, for logging and diagnostics.
    pub name: String,
    /// Output convention the weights are tuned for.
    pub convention: Convention,
    /// Term key to signed weight.
    pub scales: HashMap<String, f64>,
    /// Shared smoothing constant of the exponential tracking terms.
    pub tracking_sigma: f64,
}

impl RewardProfile {
    /// Create an empty profile (all terms disabled).
    #[must_use]
    pub fn new(name: impl Into<String>, convention: Convention) -> Self {
        Self {
            name: name.into(),
            convention,
            scales: HashMap::new(),
            tracking_sigma: 0.25,
        }
    }

    /// Set the weight for a catalog term.
    #[must_use]
    pub fn with_scale(mut self, term: TermId, scale: f64) -> Self {
        self.scales.insert(term.key().to_string(), scale);
        self
    }

    /// Set a weight by raw key, e.g. when loaded from external config.
    /// Unknown keys are rejected by [`RewardProfile::validate`].
    #[must_use]
    pub fn with_scale_key(mut self, key: impl Into<String>, scale: f64) -> Self {
        self.scales.insert(key.into(), scale);
        self
    }

    /// Set the tracking sigma.
    #[must_use]
    pub fn with_tracking_sigma(mut self, tracking_sigma: f64) -> Self {
        self.tracking_sigma = tracking_sigma;
        self
    }

    /// The weight configured for `term`, 0 if absent.
    #[must_use]
    pub fn scale(&self, term: TermId) -> f64 {
        self.scales.get(term.key()).copied().unwrap_or(0.0)
    }

    /// Number of terms with a nonzero weight.
    #[must_use]
    pub fn active_term_count(&self) -> usize {
        TermId::ALL
            .iter()
            .filter(|term| self.scale(**term) != 0.0)
            .count()
    }

    /// Validate the profile.
    ///
    /// # Errors
    ///
    /// Returns a config validation error for a scale key naming no catalog
    /// term, a non-finite scale, or a tracking sigma that is not strictly
    /// positive and finite. These fail at load time, never mid-training.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.scales {
            if TermId::from_key(key).is_none() {
                return Err(RewardError::UnknownTerm { key: key.clone() });
            }
            if !value.is_finite() {
                return Err(RewardError::NonFiniteScale {
                    key: key.clone(),
                    value: *value,
                });
            }
        }
        if !self.tracking_sigma.is_finite() || self.tracking_sigma <= 0.0 {
            return Err(RewardError::InvalidTrackingSigma(self.tracking_sigma));
        }
        Ok(())
    }

    /// The quadruped profile: every catalog term active, unit-interval
    /// convention.
    #[must_use]
    pub fn quadruped() -> Self {
        Self::new("quadruped", Convention::UnitInterval)
            .with_scale(TermId::TrackingLinVel, 1.5)
            .with_scale(TermId::TrackingAngVel, 0.8)
            .with_scale(TermId::TrackingOrientation, 1.0)
            .with_scale(TermId::FeetAirTime, 2.0)
            .with_scale(TermId::LinVelZ, -2.0)
            .with_scale(TermId::AngVelXy, -0.3)
            .with_scale(TermId::Orientation, -5.0)
            .with_scale(TermId::Torques, -0.5)
            .with_scale(TermId::JointAcceleration, -0.5)
            .with_scale(TermId::MechanicalWork, -0.2)
            .with_scale(TermId::ActionRate, -0.3)
            .with_scale(TermId::AbductionAngle, -1.0)
            .with_scale(TermId::StandStill, -0.5)
            .with_scale(TermId::StandStillJointVelocity, -0.3)
            .with_scale(TermId::FootSlip, -0.5)
            .with_scale(TermId::GeomCollision, -5.0)
            .with_scale(TermId::KneeCollision, -2.0)
            .with_scale(TermId::Termination, -100.0)
            .with_tracking_sigma(0.25)
    }

    /// The wheeled profile: gait and foot terms forced to 0, tighter
    /// velocity tracking, stronger uprightness penalties.
    #[must_use]
    pub fn wheeled() -> Self {
        Self::new("wheeled", Convention::UnitInterval)
            .with_scale(TermId::TrackingLinVel, 2.5)
            .with_scale(TermId::TrackingAngVel, 1.5)
            .with_scale(TermId::LinVelZ, -5.0)
            .with_scale(TermId::AngVelXy, -2.0)
            .with_scale(TermId::Orientation, -8.0)
            .with_scale(TermId::ActionRate, -0.05)
            .with_scale(TermId::Torques, -0.001)
            .with_scale(TermId::StandStill, -1.0)
            .with_scale(TermId::GeomCollision, -10.0)
            .with_scale(TermId::Termination, -200.0)
            // Walking-specific terms have no meaning without legs.
            .with_scale(TermId::TrackingOrientation, 0.0)
            .with_scale(TermId::JointAcceleration, 0.0)
            .with_scale(TermId::MechanicalWork, 0.0)
            .with_scale(TermId::FeetAirTime, 0.0)
            .with_scale(TermId::StandStillJointVelocity, 0.0)
            .with_scale(TermId::AbductionAngle, 0.0)
            .with_scale(TermId::FootSlip, 0.0)
            .with_scale(TermId::KneeCollision, 0.0)
            .with_tracking_sigma(0.25)
    }
}
