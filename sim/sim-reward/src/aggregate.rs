//! Weighted aggregation of the term catalog into one training signal.
//!
//! A [`RewardEvaluator`] binds a profile, a morphology layout, and the term
//! parameters together at construction, where all configuration validation
//! happens. Per-step evaluation is then a pure function of the snapshot.

use nalgebra::{DVector, Vector3};
use rayon::prelude::*;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RewardError;
use crate::layout::MorphologyLayout;
use crate::profile::RewardProfile;
use crate::state::{GeomId, StepSnapshot};
use crate::terms::{self, TermId};
use crate::Result;

/// Constants the term formulas need beyond the snapshot and weights.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TermParams {
    /// Desired world-up direction expressed in the body frame.
    pub desired_up: Vector3<f64>,
    /// Joint angles of the default (standing) pose.
    pub default_pose: DVector<f64>,
    /// Desired hip abduction angles, one per abduction joint.
    pub desired_abduction: DVector<f64>,
    /// Command magnitude below which stand-still penalties engage.
    pub command_threshold: f64,
    /// Air time under this duration earns no reward (s).
    pub min_air_time: f64,
    /// Geometry ids whose penetrating contacts feed `geom_collision`.
    pub watched_geoms: Vec<GeomId>,
    /// Geometry ids whose penetrating contacts feed `knee_collision`.
    pub knee_geoms: Vec<GeomId>,
}

impl Default for TermParams {
    fn default() -> Self {
        Self::quadruped()
    }
}

impl TermParams {
    /// Parameters for the standard 12-DOF quadruped layout.
    #[must_use]
    pub fn quadruped() -> Self {
        Self::for_layout(&MorphologyLayout::quadruped())
    }

    /// Zeroed parameters sized to fit `layout`.
    #[must_use]
    pub fn for_layout(layout: &MorphologyLayout) -> Self {
        Self {
            desired_up: Vector3::z(),
            default_pose: DVector::zeros(layout.joint_count),
            desired_abduction: DVector::zeros(layout.abduction_count()),
            command_threshold: 0.1,
            min_air_time: 0.1,
            watched_geoms: Vec::new(),
            knee_geoms: Vec::new(),
        }
    }

    /// Set the desired body-frame up direction.
    #[must_use]
    pub fn with_desired_up(mut self, desired_up: Vector3<f64>) -> Self {
        self.desired_up = desired_up;
        self
    }

    /// Set the default pose.
    #[must_use]
    pub fn with_default_pose(mut self, default_pose: DVector<f64>) -> Self {
        self.default_pose = default_pose;
        self
    }

    /// Set the desired abduction angles.
    #[must_use]
    pub fn with_desired_abduction(mut self, desired_abduction: DVector<f64>) -> Self {
        self.desired_abduction = desired_abduction;
        self
    }

    /// Set the stand-still command threshold.
    #[must_use]
    pub fn with_command_threshold(mut self, command_threshold: f64) -> Self {
        self.command_threshold = command_threshold;
        self
    }

    /// Set the minimum rewarded air time.
    #[must_use]
    pub fn with_min_air_time(mut self, min_air_time: f64) -> Self {
        self.min_air_time = min_air_time;
        self
    }

    /// Set the watched collision geometries.
    #[must_use]
    pub fn with_watched_geoms(mut self, geoms: Vec<GeomId>) -> Self {
        self.watched_geoms = geoms;
        self
    }

    /// Set the watched knee geometries.
    #[must_use]
    pub fn with_knee_geoms(mut self, geoms: Vec<GeomId>) -> Self {
        self.knee_geoms = geoms;
        self
    }

    /// Validate the parameters against a layout.
    ///
    /// # Errors
    ///
    /// Returns a config validation error on non-finite values or vector
    /// lengths that disagree with the layout.
    pub fn validate(&self, layout: &MorphologyLayout) -> Result<()> {
        if !self.desired_up.iter().all(|c| c.is_finite()) {
            return Err(RewardError::invalid_params("desired up is not finite"));
        }
        if self.default_pose.len() != layout.joint_count {
            return Err(RewardError::invalid_params(format!(
                "default pose has {} entries, layout has {} joints",
                self.default_pose.len(),
                layout.joint_count
            )));
        }
        if self.desired_abduction.len() != layout.abduction_count() {
            return Err(RewardError::invalid_params(format!(
                "desired abduction has {} entries, layout has {} abduction joints",
                self.desired_abduction.len(),
                layout.abduction_count()
            )));
        }
        let pose_finite = self
            .default_pose
            .iter()
            .chain(self.desired_abduction.iter())
            .all(|v| v.is_finite());
        if !pose_finite {
            return Err(RewardError::invalid_params(
                "default pose or desired abduction is not finite",
            ));
        }
        if !self.command_threshold.is_finite() || self.command_threshold < 0.0 {
            return Err(RewardError::invalid_params(
                "command threshold must be non-negative and finite",
            ));
        }
        if !self.min_air_time.is_finite() || self.min_air_time < 0.0 {
            return Err(RewardError::invalid_params(
                "minimum air time must be non-negative and finite",
            ));
        }
        Ok(())
    }
}

/// One row of the diagnostic breakdown.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TermReward {
    /// Which term this row describes.
    pub term: TermId,
    /// Normalized, unweighted term output.
    pub value: f64,
    /// Term output after applying the configured weight.
    pub weighted: f64,
}

/// Per-term reward breakdown for logging and diagnostics.
///
/// Rows follow the catalog order of [`TermId::ALL`] and include disabled
/// terms (weight 0) so a profile change never shifts the row layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RewardBreakdown {
    /// The weighted total, identical to [`RewardEvaluator::evaluate`].
    pub total: f64,
    /// One row per catalog term.
    pub terms: Vec<TermReward>,
}

impl RewardBreakdown {
    /// Look up the row for a term.
    #[must_use]
    pub fn get(&self, term: TermId) -> Option<&TermReward> {
        self.terms.iter().find(|row| row.term == term)
    }
}

/// Evaluates the weighted reward signal for one morphology.
///
/// Construction validates the profile, layout, and parameters; evaluation
/// is side-effect-free and safe to fan out across parallel environment
/// instances.
#[derive(Debug, Clone)]
pub struct RewardEvaluator {
    profile: RewardProfile,
    layout: MorphologyLayout,
    params: TermParams,
    scales: [f64; TermId::COUNT],
}

impl RewardEvaluator {
    /// Bind a profile, layout, and term parameters into an evaluator.
    ///
    /// # Errors
    ///
    /// Returns a config validation error from any of the three inputs;
    /// nothing is deferred to evaluation time.
    pub fn new(
        profile: RewardProfile,
        layout: MorphologyLayout,
        params: TermParams,
    ) -> Result<Self> {
        profile.validate()?;
        layout.validate()?;
        params.validate(&layout)?;

        let mut scales = [0.0; TermId::COUNT];
        for term in TermId::ALL {
            scales[term as usize] = profile.scale(term);
        }

        debug!(
            profile = %profile.name,
            convention = %profile.convention,
            active_terms = profile.active_term_count(),
            "reward evaluator ready"
        );

        Ok(Self {
            profile,
            layout,
            params,
            scales,
        })
    }

    /// The profile this evaluator was built with.
    #[must_use]
    pub fn profile(&self) -> &RewardProfile {
        &self.profile
    }

    /// The morphology layout this evaluator was built with.
    #[must_use]
    pub fn layout(&self) -> &MorphologyLayout {
        &self.layout
    }

    /// The term parameters this evaluator was built with.
    #[must_use]
    pub fn params(&self) -> &TermParams {
        &self.params
    }

    /// Compute the total reward for one step.
    ///
    /// # Errors
    ///
    /// Returns a state validation error if the snapshot fails its shape and
    /// finiteness checks.
    pub fn evaluate(&self, snapshot: &StepSnapshot) -> Result<f64> {
        self.check_snapshot(snapshot)?;
        let mut total = 0.0;
        for term in TermId::ALL {
            total += self.scales[term as usize] * self.term_value(term, snapshot);
        }
        Ok(total)
    }

    /// Compute the total reward plus the ordered per-term breakdown.
    ///
    /// # Errors
    ///
    /// Same as [`RewardEvaluator::evaluate`].
    pub fn evaluate_with_breakdown(&self, snapshot: &StepSnapshot) -> Result<RewardBreakdown> {
        self.check_snapshot(snapshot)?;
        let mut rows = Vec::with_capacity(TermId::COUNT);
        let mut total = 0.0;
        for term in TermId::ALL {
            let value = self.term_value(term, snapshot);
            let weighted = self.scales[term as usize] * value;
            total += weighted;
            rows.push(TermReward {
                term,
                value,
                weighted,
            });
        }
        Ok(RewardBreakdown { total, terms: rows })
    }

    /// Evaluate a batch of independent environment instances.
    ///
    /// Elementwise over the slice; results are identical to calling
    /// [`RewardEvaluator::evaluate`] per instance, in order.
    ///
    /// # Errors
    ///
    /// Fails if any snapshot fails validation.
    pub fn evaluate_batch(&self, snapshots: &[StepSnapshot]) -> Result<Vec<f64>> {
        snapshots
            .par_iter()
            .map(|snapshot| self.evaluate(snapshot))
            .collect()
    }

    /// Normalized output of one term under the active convention.
    fn term_value(&self, term: TermId, snapshot: &StepSnapshot) -> f64 {
        let raw = self.raw_value(term, snapshot);
        match term.normalization(self.profile.convention) {
            Some(normalization) => normalization.apply(raw),
            None => raw,
        }
    }

    fn raw_value(&self, term: TermId, snapshot: &StepSnapshot) -> f64 {
        let sigma = self.profile.tracking_sigma;
        let params = &self.params;
        match term {
            TermId::LinVelZ => terms::lin_vel_z(&snapshot.base_twist),
            TermId::AngVelXy => terms::ang_vel_xy(&snapshot.base_twist),
            TermId::TrackingOrientation => {
                terms::tracking_orientation(&params.desired_up, &snapshot.base_pose, sigma)
            }
            TermId::Orientation => terms::orientation(&snapshot.base_pose),
            TermId::Torques => terms::torques(&snapshot.joints.torques),
            TermId::JointAcceleration => terms::joint_acceleration(
                &snapshot.joints.velocities,
                &snapshot.previous_joint_velocities,
                snapshot.dt,
            ),
            TermId::MechanicalWork => {
                terms::mechanical_work(&snapshot.joints.torques, &snapshot.joints.velocities)
            }
            TermId::ActionRate => terms::action_rate(&snapshot.action, &snapshot.previous_action),
            TermId::TrackingLinVel => terms::tracking_lin_vel(
                &snapshot.command,
                &snapshot.base_pose,
                &snapshot.base_twist,
                sigma,
            ),
            TermId::TrackingAngVel => terms::tracking_ang_vel(
                &snapshot.command,
                &snapshot.base_pose,
                &snapshot.base_twist,
                sigma,
            ),
            TermId::FeetAirTime => terms::feet_air_time(
                &snapshot.feet.air_time,
                &snapshot.feet.first_contact,
                &snapshot.command,
                params.min_air_time,
            ),
            TermId::AbductionAngle => terms::abduction_angle(
                &snapshot.joints.angles,
                &params.desired_abduction,
                &self.layout,
            ),
            TermId::StandStill => terms::stand_still(
                &snapshot.command,
                &snapshot.joints.angles,
                &params.default_pose,
                params.command_threshold,
            ),
            TermId::StandStillJointVelocity => terms::stand_still_joint_velocity(
                &snapshot.command,
                &snapshot.joints.velocities,
                params.command_threshold,
            ),
            TermId::FootSlip => {
                terms::foot_slip(&snapshot.feet, &snapshot.body_twists, &self.layout)
            }
            TermId::Termination => {
                terms::termination(snapshot.done, snapshot.step, snapshot.step_threshold)
            }
            TermId::GeomCollision => {
                terms::geom_collision(&snapshot.contacts, &params.watched_geoms)
            }
            TermId::KneeCollision => terms::geom_collision(&snapshot.contacts, &params.knee_geoms),
        }
    }

    /// Snapshot checks beyond the shape/finiteness pass: foot bookkeeping
    /// and the body-velocity index mapping, required only while the terms
    /// that read them are active.
    fn check_snapshot(&self, snapshot: &StepSnapshot) -> Result<()> {
        snapshot.validate(&self.layout)?;

        let air_time_active = self.scales[TermId::FeetAirTime as usize] != 0.0;
        let foot_slip_active = self.scales[TermId::FootSlip as usize] != 0.0;

        if (air_time_active || foot_slip_active)
            && snapshot.feet.foot_count() != self.layout.foot_count
        {
            return Err(RewardError::DimensionMismatch {
                field: "feet",
                expected: self.layout.foot_count,
                actual: snapshot.feet.foot_count(),
            });
        }

        if foot_slip_active {
            for body in &snapshot.feet.lower_leg_bodies {
                let Some(index) = self.layout.velocity_index(*body) else {
                    return Err(RewardError::InvalidBodyId(body.raw()));
                };
                if index >= snapshot.body_twists.len() {
                    return Err(RewardError::DimensionMismatch {
                        field: "body_twists",
                        expected: index + 1,
                        actual: snapshot.body_twists.len(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::normalize::Convention;
    use crate::state::{
        BodyId, Command, ContactPair, FeetState, JointState, Pose, StepSnapshot, Twist,
    };
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn snapshot() -> StepSnapshot {
        StepSnapshot::new(
            Pose::identity(),
            Twist::zero(),
            JointState::zeros(12),
            Command::zero(),
            0.02,
        )
    }

    fn quadruped_feet() -> FeetState {
        FeetState {
            air_time: vec![0.0; 4],
            first_contact: vec![false; 4],
            contact: vec![false; 4],
            site_positions: vec![Point3::origin(); 4],
            lower_leg_positions: vec![Point3::origin(); 4],
            lower_leg_bodies: vec![
                BodyId::new(1),
                BodyId::new(2),
                BodyId::new(3),
                BodyId::new(4),
            ],
        }
    }

    fn single_term_evaluator(term: TermId, scale: f64) -> RewardEvaluator {
        let profile =
            RewardProfile::new("single", Convention::UnitInterval).with_scale(term, scale);
        RewardEvaluator::new(
            profile,
            MorphologyLayout::quadruped(),
            TermParams::quadruped(),
        )
        .unwrap()
    }

    #[test]
    fn vertical_velocity_scenario() {
        // 2 m/s vertical velocity saturates the unit-interval bound.
        let evaluator = single_term_evaluator(TermId::LinVelZ, -2.0);
        let mut snap = snapshot();
        snap.base_twist.linear.z = 2.0;
        let breakdown = evaluator.evaluate_with_breakdown(&snap).unwrap();
        let row = breakdown.get(TermId::LinVelZ).unwrap();
        assert_relative_eq!(row.value, 1.0);
        assert_relative_eq!(row.weighted, -2.0);
    }

    #[test]
    fn torque_scenario() {
        // 12 joints at 10 N m saturate the unit-interval bound.
        let evaluator = single_term_evaluator(TermId::Torques, -0.5);
        let mut snap = snapshot();
        snap.joints.torques = nalgebra::DVector::from_element(12, 10.0);
        let breakdown = evaluator.evaluate_with_breakdown(&snap).unwrap();
        assert_relative_eq!(breakdown.get(TermId::Torques).unwrap().value, 1.0);
        assert_relative_eq!(breakdown.total, -0.5);
    }

    #[test]
    fn collision_scenario() {
        let evaluator = RewardEvaluator::new(
            RewardProfile::new("collisions", Convention::UnitInterval)
                .with_scale(TermId::GeomCollision, -1.0),
            MorphologyLayout::quadruped(),
            TermParams::quadruped().with_watched_geoms(vec![GeomId::new(9)]),
        )
        .unwrap();
        let snap = snapshot().with_contacts(vec![
            ContactPair::new(GeomId::new(5), GeomId::new(9), -0.01),
            ContactPair::new(GeomId::new(1), GeomId::new(2), 0.5),
        ]);
        let breakdown = evaluator.evaluate_with_breakdown(&snap).unwrap();
        assert_relative_eq!(breakdown.get(TermId::GeomCollision).unwrap().value, 0.1);
    }

    #[test]
    fn early_termination_scenario() {
        let evaluator = single_term_evaluator(TermId::Termination, -100.0);
        let early = snapshot().with_termination(true, 120, 500);
        assert_relative_eq!(evaluator.evaluate(&early).unwrap(), -100.0);

        let at_threshold = snapshot().with_termination(true, 500, 500);
        assert_relative_eq!(evaluator.evaluate(&at_threshold).unwrap(), 0.0);
    }

    #[test]
    fn total_matches_breakdown_sum() {
        let evaluator = RewardEvaluator::new(
            RewardProfile::quadruped(),
            MorphologyLayout::quadruped(),
            TermParams::quadruped(),
        )
        .unwrap();
        let mut snap = snapshot().with_feet(quadruped_feet()).with_body_twists(vec![
            Twist::zero(),
            Twist::zero(),
            Twist::zero(),
            Twist::zero(),
        ]);
        snap.command = Command::new(0.8, 0.0, 0.3);
        snap.base_twist.linear.x = 0.5;
        snap.joints.torques = nalgebra::DVector::from_element(12, 2.0);

        let breakdown = evaluator.evaluate_with_breakdown(&snap).unwrap();
        let total = evaluator.evaluate(&snap).unwrap();
        let summed: f64 = breakdown.terms.iter().map(|row| row.weighted).sum();
        assert_relative_eq!(breakdown.total, summed, epsilon = 1e-12);
        assert_relative_eq!(breakdown.total, total, epsilon = 1e-12);
        assert_eq!(breakdown.terms.len(), TermId::COUNT);
    }

    #[test]
    fn disabled_term_contributes_nothing() {
        let with_torques = single_term_evaluator(TermId::Torques, -0.5);
        let without = single_term_evaluator(TermId::Torques, 0.0);
        let mut snap = snapshot();
        snap.joints.torques = nalgebra::DVector::from_element(12, 10.0);

        assert_relative_eq!(with_torques.evaluate(&snap).unwrap(), -0.5);
        assert_relative_eq!(without.evaluate(&snap).unwrap(), 0.0);

        // The disabled term still shows up in the breakdown, unweighted.
        let breakdown = without.evaluate_with_breakdown(&snap).unwrap();
        let row = breakdown.get(TermId::Torques).unwrap();
        assert_relative_eq!(row.value, 1.0);
        assert_relative_eq!(row.weighted, 0.0);
    }

    #[test]
    fn unknown_profile_key_fails_at_construction() {
        let profile = RewardProfile::new("bad", Convention::UnitInterval)
            .with_scale_key("wheel_slip", -1.0);
        let err = RewardEvaluator::new(
            profile,
            MorphologyLayout::quadruped(),
            TermParams::quadruped(),
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn params_layout_mismatch_fails_at_construction() {
        let params = TermParams::quadruped()
            .with_default_pose(nalgebra::DVector::zeros(4));
        let err = RewardEvaluator::new(
            RewardProfile::quadruped(),
            MorphologyLayout::quadruped(),
            params,
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn wheeled_profile_runs_without_feet() {
        let layout = MorphologyLayout::wheeled(4);
        let evaluator = RewardEvaluator::new(
            RewardProfile::wheeled(),
            layout,
            TermParams::for_layout(&layout),
        )
        .unwrap();
        let snap = StepSnapshot::new(
            Pose::identity(),
            Twist::zero(),
            JointState::zeros(4),
            Command::new(1.0, 0.0, 0.0),
            0.02,
        );
        let total = evaluator.evaluate(&snap).unwrap();
        assert!(total.is_finite());
        // Perfect-looking tracking from a stationary base is impossible, so
        // the tracking reward is below its peak.
        let breakdown = evaluator.evaluate_with_breakdown(&snap).unwrap();
        assert!(breakdown.get(TermId::TrackingLinVel).unwrap().value < 1.0);
    }

    #[test]
    fn missing_feet_fail_when_air_time_active() {
        let evaluator = single_term_evaluator(TermId::FeetAirTime, 2.0);
        let err = evaluator.evaluate(&snapshot()).unwrap_err();
        assert_eq!(
            err,
            RewardError::DimensionMismatch {
                field: "feet",
                expected: 4,
                actual: 0,
            }
        );
        assert!(err.is_state_error());
    }

    #[test]
    fn world_body_in_feet_fails_when_foot_slip_active() {
        let evaluator = single_term_evaluator(TermId::FootSlip, -0.5);
        let mut feet = quadruped_feet();
        feet.lower_leg_bodies[2] = BodyId::new(0);
        let snap = snapshot()
            .with_feet(feet)
            .with_body_twists(vec![Twist::zero(); 4]);
        assert_eq!(
            evaluator.evaluate(&snap).unwrap_err(),
            RewardError::InvalidBodyId(0)
        );
    }

    #[test]
    fn short_body_twists_fail_when_foot_slip_active() {
        let evaluator = single_term_evaluator(TermId::FootSlip, -0.5);
        let snap = snapshot()
            .with_feet(quadruped_feet())
            .with_body_twists(vec![Twist::zero(); 2]);
        assert!(matches!(
            evaluator.evaluate(&snap).unwrap_err(),
            RewardError::DimensionMismatch {
                field: "body_twists",
                ..
            }
        ));
    }

    #[test]
    fn batch_matches_per_instance() {
        let evaluator = RewardEvaluator::new(
            RewardProfile::quadruped(),
            MorphologyLayout::quadruped(),
            TermParams::quadruped(),
        )
        .unwrap();
        let snapshots: Vec<StepSnapshot> = (0..8)
            .map(|i| {
                let mut snap = snapshot()
                    .with_feet(quadruped_feet())
                    .with_body_twists(vec![Twist::zero(); 4]);
                snap.command = Command::new(0.1 * i as f64, 0.0, 0.0);
                snap.base_twist.linear.x = 0.05 * i as f64;
                snap
            })
            .collect();

        let batch = evaluator.evaluate_batch(&snapshots).unwrap();
        assert_eq!(batch.len(), snapshots.len());
        for (snap, batched) in snapshots.iter().zip(&batch) {
            assert_relative_eq!(evaluator.evaluate(snap).unwrap(), *batched);
        }
    }

    #[test]
    fn batch_surfaces_validation_errors() {
        let evaluator = single_term_evaluator(TermId::LinVelZ, -1.0);
        let mut bad = snapshot();
        bad.base_twist.linear.z = f64::NAN;
        let result = evaluator.evaluate_batch(&[snapshot(), bad]);
        assert!(result.is_err());
    }

    #[test]
    fn stand_still_at_default_pose_is_free() {
        let evaluator = single_term_evaluator(TermId::StandStill, -1.0);
        let snap = snapshot(); // zero command, angles equal to default pose
        assert_relative_eq!(evaluator.evaluate(&snap).unwrap(), 0.0);
    }

    #[test]
    fn signed_wide_preserves_raw_magnitude() {
        let profile = RewardProfile::new("wide", Convention::SignedWide)
            .with_scale(TermId::Torques, -0.001);
        let evaluator = RewardEvaluator::new(
            profile,
            MorphologyLayout::quadruped(),
            TermParams::quadruped(),
        )
        .unwrap();
        let mut snap = snapshot();
        snap.joints.torques = nalgebra::DVector::from_element(12, 5.0);
        // Raw sum of squares is 300; signed-wide keeps it unscaled.
        let breakdown = evaluator.evaluate_with_breakdown(&snap).unwrap();
        assert_relative_eq!(breakdown.get(TermId::Torques).unwrap().value, 300.0);
        assert_relative_eq!(breakdown.total, -0.3, epsilon = 1e-12);
    }
}
