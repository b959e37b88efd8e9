//! Physics state snapshot types.
//!
//! Everything in this module is transient data reconstructed fresh each
//! simulation step from the simulator's output. The reward core never owns
//! state across steps; per-foot air time and first-contact flags are
//! maintained by the environment and passed in read-only.

use nalgebra::{DVector, Point3, Quaternion, UnitQuaternion, Vector2, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RewardError;
use crate::layout::MorphologyLayout;
use crate::Result;

/// Tolerance on the orientation quaternion norm.
///
/// Deviations within this bound are renormalized; anything beyond is
/// rejected as a state validation error. Loose enough for single-precision
/// simulators.
pub const UNIT_QUATERNION_TOLERANCE: f64 = 1e-4;

/// Unique identifier for a rigid body in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for BodyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Unique identifier for a collision geometry in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeomId(pub u64);

impl GeomId {
    /// Create a new geometry ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for GeomId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for GeomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Geom({})", self.0)
    }
}

/// Position and orientation of the robot base (or any tracked body).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion (body to world).
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub fn from_position_rotation(position: Point3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Create a pose from a raw (unnormalized) quaternion.
    ///
    /// Rejects quaternions whose norm deviates from 1 beyond
    /// [`UNIT_QUATERNION_TOLERANCE`]; smaller deviations are renormalized.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::NonUnitQuaternion`] for non-unit input and
    /// [`RewardError::NonFiniteInput`] if any component is `NaN` or `Inf`.
    pub fn try_from_parts(position: Point3<f64>, rotation: Quaternion<f64>) -> Result<Self> {
        if !position.coords.iter().all(|c| c.is_finite())
            || !rotation.coords.iter().all(|c| c.is_finite())
        {
            return Err(RewardError::non_finite("pose"));
        }
        let norm = rotation.norm();
        if (norm - 1.0).abs() > UNIT_QUATERNION_TOLERANCE {
            return Err(RewardError::NonUnitQuaternion { norm });
        }
        Ok(Self {
            position,
            rotation: UnitQuaternion::from_quaternion(rotation),
        })
    }

    /// Rotate a world-frame vector into the body frame.
    #[must_use]
    pub fn into_body_frame(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse_transform_vector(world)
    }

    /// The world up axis expressed in the body frame.
    ///
    /// Equals +Z when the base is perfectly upright; its xy components
    /// measure tilt.
    #[must_use]
    pub fn world_up_in_body(&self) -> Vector3<f64> {
        self.into_body_frame(&Vector3::z())
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|c| c.is_finite())
            && self.rotation.quaternion().coords.iter().all(|c| c.is_finite())
    }
}

/// Linear and angular velocity of a body, world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Create a twist from linear and angular velocity.
    #[must_use]
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Create a zero twist (body at rest).
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Velocity of a point rigidly attached to the body at `offset` from its
    /// origin: `v + omega x r`.
    #[must_use]
    pub fn velocity_at_offset(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.linear.iter().all(|c| c.is_finite()) && self.angular.iter().all(|c| c.is_finite())
    }
}

/// Angles, velocities, and torques for every actuated degree of freedom.
///
/// Index layout is fixed per morphology and shared by all reward terms; see
/// [`MorphologyLayout`] for the quadruped convention.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointState {
    /// Joint angles (rad).
    pub angles: DVector<f64>,
    /// Joint velocities (rad/s).
    pub velocities: DVector<f64>,
    /// Joint torques (N m).
    pub torques: DVector<f64>,
}

impl JointState {
    /// Create a joint state from angle, velocity, and torque vectors.
    #[must_use]
    pub fn new(angles: DVector<f64>, velocities: DVector<f64>, torques: DVector<f64>) -> Self {
        Self {
            angles,
            velocities,
            torques,
        }
    }

    /// Create an all-zero joint state with the given degree-of-freedom count.
    #[must_use]
    pub fn zeros(dof: usize) -> Self {
        Self {
            angles: DVector::zeros(dof),
            velocities: DVector::zeros(dof),
            torques: DVector::zeros(dof),
        }
    }

    /// Number of actuated degrees of freedom.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.angles.len()
    }
}

/// Desired planar velocity command: forward, lateral, and yaw rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Command {
    /// Desired forward/lateral velocity (m/s), body frame.
    pub linear: Vector2<f64>,
    /// Desired yaw rate (rad/s).
    pub yaw_rate: f64,
}

impl Command {
    /// Create a command from forward velocity, lateral velocity, and yaw rate.
    #[must_use]
    pub fn new(forward: f64, lateral: f64, yaw_rate: f64) -> Self {
        Self {
            linear: Vector2::new(forward, lateral),
            yaw_rate,
        }
    }

    /// The zero command (stand still).
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Magnitude of the planar command over all three components.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        (self.linear.norm_squared() + self.yaw_rate * self.yaw_rate).sqrt()
    }

    /// Whether the command magnitude falls below `threshold`.
    #[must_use]
    pub fn is_near_zero(&self, threshold: f64) -> bool {
        self.magnitude() < threshold
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.linear.iter().all(|c| c.is_finite()) && self.yaw_rate.is_finite()
    }
}

/// A simulator-reported pair of geometries with signed penetration distance.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactPair {
    /// First geometry in the pair.
    pub geom_a: GeomId,
    /// Second geometry in the pair.
    pub geom_b: GeomId,
    /// Signed distance between the geometries (negative = interpenetrating).
    pub distance: f64,
}

impl ContactPair {
    /// Create a contact pair.
    #[must_use]
    pub fn new(geom_a: GeomId, geom_b: GeomId, distance: f64) -> Self {
        Self {
            geom_a,
            geom_b,
            distance,
        }
    }

    /// Whether the pair is actually colliding (negative distance).
    #[must_use]
    pub fn is_penetrating(&self) -> bool {
        self.distance < 0.0
    }

    /// Whether this pair involves the given geometry.
    #[must_use]
    pub fn involves(&self, geom: GeomId) -> bool {
        self.geom_a == geom || self.geom_b == geom
    }
}

/// Per-foot contact bookkeeping, maintained by the environment.
///
/// All vectors run in the same foot order and must have equal length. A
/// morphology without feet (wheeled) supplies the empty default.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeetState {
    /// Time each foot has spent airborne since its last ground contact (s).
    pub air_time: Vec<f64>,
    /// True exactly at the step a foot transitions from airborne to contact.
    pub first_contact: Vec<bool>,
    /// True while a foot is in ground contact.
    pub contact: Vec<bool>,
    /// Foot site positions in world coordinates.
    pub site_positions: Vec<Point3<f64>>,
    /// Positions of the lower-leg bodies the feet are attached to.
    pub lower_leg_positions: Vec<Point3<f64>>,
    /// Body ids of those lower legs, used to look up spatial velocities.
    pub lower_leg_bodies: Vec<BodyId>,
}

impl FeetState {
    /// Number of feet this state describes.
    #[must_use]
    pub fn foot_count(&self) -> usize {
        self.air_time.len()
    }

    fn validate(&self) -> Result<()> {
        let n = self.foot_count();
        for (field, len) in [
            ("feet.first_contact", self.first_contact.len()),
            ("feet.contact", self.contact.len()),
            ("feet.site_positions", self.site_positions.len()),
            ("feet.lower_leg_positions", self.lower_leg_positions.len()),
            ("feet.lower_leg_bodies", self.lower_leg_bodies.len()),
        ] {
            if len != n {
                return Err(RewardError::DimensionMismatch {
                    field,
                    expected: n,
                    actual: len,
                });
            }
        }
        if !self.air_time.iter().all(|t| t.is_finite()) {
            return Err(RewardError::non_finite("feet.air_time"));
        }
        let positions_finite = self
            .site_positions
            .iter()
            .chain(&self.lower_leg_positions)
            .all(|p| p.coords.iter().all(|c| c.is_finite()));
        if !positions_finite {
            return Err(RewardError::non_finite("feet.site_positions"));
        }
        Ok(())
    }
}

/// Immutable record of one simulation step, as handed in by the simulator.
///
/// Constructed via [`StepSnapshot::new`] with neutral defaults for the
/// optional parts, then filled in with the `with_*` builders. Validated as a
/// whole by the evaluator before any term runs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepSnapshot {
    /// Base pose in world coordinates.
    pub base_pose: Pose,
    /// Base velocities in world frame.
    pub base_twist: Twist,
    /// Current joint state.
    pub joints: JointState,
    /// Joint velocities from the previous step (for acceleration).
    pub previous_joint_velocities: DVector<f64>,
    /// Current policy action.
    pub action: DVector<f64>,
    /// Previous policy action.
    pub previous_action: DVector<f64>,
    /// Active velocity command.
    pub command: Command,
    /// Active contact pairs this step.
    pub contacts: Vec<ContactPair>,
    /// Per-foot contact bookkeeping.
    pub feet: FeetState,
    /// Spatial velocities per body, ordered by body index with world-body
    /// slots removed (see [`MorphologyLayout::velocity_index`]).
    pub body_twists: Vec<Twist>,
    /// Control timestep (s).
    pub dt: f64,
    /// Episode termination flag, as decided by the environment.
    pub done: bool,
    /// Step count within the episode.
    pub step: u64,
    /// Step threshold below which termination is scored as early.
    pub step_threshold: u64,
}

impl StepSnapshot {
    /// Create a snapshot with neutral defaults for everything not given.
    ///
    /// Previous joint velocities and both action vectors default to zeros
    /// sized by the joint state; contacts, feet, and body twists default to
    /// empty.
    #[must_use]
    pub fn new(
        base_pose: Pose,
        base_twist: Twist,
        joints: JointState,
        command: Command,
        dt: f64,
    ) -> Self {
        let dof = joints.dof();
        Self {
            base_pose,
            base_twist,
            joints,
            previous_joint_velocities: DVector::zeros(dof),
            action: DVector::zeros(dof),
            previous_action: DVector::zeros(dof),
            command,
            contacts: Vec::new(),
            feet: FeetState::default(),
            body_twists: Vec::new(),
            dt,
            done: false,
            step: 0,
            step_threshold: 0,
        }
    }

    /// Set the current and previous policy actions.
    #[must_use]
    pub fn with_actions(mut self, action: DVector<f64>, previous: DVector<f64>) -> Self {
        self.action = action;
        self.previous_action = previous;
        self
    }

    /// Set the previous-step joint velocities.
    #[must_use]
    pub fn with_previous_joint_velocities(mut self, velocities: DVector<f64>) -> Self {
        self.previous_joint_velocities = velocities;
        self
    }

    /// Set the active contact pairs.
    #[must_use]
    pub fn with_contacts(mut self, contacts: Vec<ContactPair>) -> Self {
        self.contacts = contacts;
        self
    }

    /// Set the per-foot contact bookkeeping.
    #[must_use]
    pub fn with_feet(mut self, feet: FeetState) -> Self {
        self.feet = feet;
        self
    }

    /// Set the per-body spatial velocities.
    #[must_use]
    pub fn with_body_twists(mut self, twists: Vec<Twist>) -> Self {
        self.body_twists = twists;
        self
    }

    /// Set the termination flag, step count, and early-termination threshold.
    #[must_use]
    pub fn with_termination(mut self, done: bool, step: u64, step_threshold: u64) -> Self {
        self.done = done;
        self.step = step;
        self.step_threshold = step_threshold;
        self
    }

    /// Fail-fast shape and finiteness checks against a morphology layout.
    ///
    /// # Errors
    ///
    /// Returns a state validation error on `NaN`/`Inf` in any field, vector
    /// lengths that disagree with the layout, or a negative/non-finite
    /// timestep. `NaN` never propagates silently into the reward.
    pub fn validate(&self, layout: &MorphologyLayout) -> Result<()> {
        if !self.base_pose.is_finite() {
            return Err(RewardError::non_finite("base_pose"));
        }
        if !self.base_twist.is_finite() {
            return Err(RewardError::non_finite("base_twist"));
        }
        if !self.command.is_finite() {
            return Err(RewardError::non_finite("command"));
        }
        if !self.dt.is_finite() || self.dt < 0.0 {
            return Err(RewardError::InvalidTimestep(self.dt));
        }

        let dof = layout.joint_count;
        for (field, len) in [
            ("joints.angles", self.joints.angles.len()),
            ("joints.velocities", self.joints.velocities.len()),
            ("joints.torques", self.joints.torques.len()),
            (
                "previous_joint_velocities",
                self.previous_joint_velocities.len(),
            ),
            ("action", self.action.len()),
            ("previous_action", self.previous_action.len()),
        ] {
            if len != dof {
                return Err(RewardError::DimensionMismatch {
                    field,
                    expected: dof,
                    actual: len,
                });
            }
        }

        for (field, vector) in [
            ("joints.angles", &self.joints.angles),
            ("joints.velocities", &self.joints.velocities),
            ("joints.torques", &self.joints.torques),
            (
                "previous_joint_velocities",
                &self.previous_joint_velocities,
            ),
            ("action", &self.action),
            ("previous_action", &self.previous_action),
        ] {
            if !vector.iter().all(|v| v.is_finite()) {
                return Err(RewardError::non_finite(field));
            }
        }

        if !self.contacts.iter().all(|c| c.distance.is_finite()) {
            return Err(RewardError::non_finite("contacts"));
        }
        if !self.body_twists.iter().all(Twist::is_finite) {
            return Err(RewardError::non_finite("body_twists"));
        }

        self.feet.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn quadruped_snapshot() -> StepSnapshot {
        StepSnapshot::new(
            Pose::identity(),
            Twist::zero(),
            JointState::zeros(12),
            Command::zero(),
            0.02,
        )
    }

    #[test]
    fn test_pose_rejects_non_unit_quaternion() {
        let raw = Quaternion::new(0.5, 0.0, 0.0, 0.0);
        let err = Pose::try_from_parts(Point3::origin(), raw).unwrap_err();
        assert_eq!(err, RewardError::NonUnitQuaternion { norm: 0.5 });
        assert!(err.is_state_error());
    }

    #[test]
    fn test_pose_renormalizes_within_tolerance() {
        let raw = Quaternion::new(1.0 + 5e-5, 0.0, 0.0, 0.0);
        let pose = Pose::try_from_parts(Point3::origin(), raw).unwrap();
        let norm = pose.rotation.quaternion().norm();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pose_rejects_nan() {
        let raw = Quaternion::new(f64::NAN, 0.0, 0.0, 0.0);
        assert!(Pose::try_from_parts(Point3::origin(), raw).is_err());
    }

    #[test]
    fn test_world_up_in_body_upright() {
        let up = Pose::identity().world_up_in_body();
        assert!((up - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_world_up_in_body_rolled() {
        // 90 degree roll puts world up along the body's -y axis.
        let pose = Pose::from_position_rotation(
            Point3::origin(),
            UnitQuaternion::from_euler_angles(std::f64::consts::FRAC_PI_2, 0.0, 0.0),
        );
        let up = pose.world_up_in_body();
        assert!(up.z.abs() < 1e-10);
        assert!((up.y - -1.0).abs() < 1e-10 || (up.y - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_twist_velocity_at_offset() {
        // Pure yaw spin at 1 rad/s; a point 1 m ahead moves sideways at 1 m/s.
        let twist = Twist::new(Vector3::zeros(), Vector3::z());
        let v = twist.velocity_at_offset(&Vector3::x());
        assert!((v - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_command_magnitude_includes_yaw() {
        let cmd = Command::new(0.0, 0.0, 0.5);
        assert!((cmd.magnitude() - 0.5).abs() < 1e-12);
        assert!(!cmd.is_near_zero(0.1));
        assert!(Command::zero().is_near_zero(0.1));
    }

    #[test]
    fn test_contact_pair_predicates() {
        let pair = ContactPair::new(GeomId::new(5), GeomId::new(9), -0.01);
        assert!(pair.is_penetrating());
        assert!(pair.involves(GeomId::new(9)));
        assert!(!pair.involves(GeomId::new(7)));

        let separated = ContactPair::new(GeomId::new(1), GeomId::new(2), 0.5);
        assert!(!separated.is_penetrating());
    }

    #[test]
    fn test_snapshot_validate_accepts_neutral() {
        let layout = MorphologyLayout::quadruped();
        assert!(quadruped_snapshot().validate(&layout).is_ok());
    }

    #[test]
    fn test_snapshot_validate_rejects_nan_torque() {
        let layout = MorphologyLayout::quadruped();
        let mut snapshot = quadruped_snapshot();
        snapshot.joints.torques[3] = f64::NAN;
        let err = snapshot.validate(&layout).unwrap_err();
        assert_eq!(err, RewardError::non_finite("joints.torques"));
    }

    #[test]
    fn test_snapshot_validate_rejects_wrong_dof() {
        let layout = MorphologyLayout::quadruped();
        let snapshot = StepSnapshot::new(
            Pose::identity(),
            Twist::zero(),
            JointState::zeros(4),
            Command::zero(),
            0.02,
        );
        let err = snapshot.validate(&layout).unwrap_err();
        assert!(matches!(err, RewardError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_snapshot_validate_rejects_negative_dt() {
        let layout = MorphologyLayout::quadruped();
        let mut snapshot = quadruped_snapshot();
        snapshot.dt = -0.01;
        assert_eq!(
            snapshot.validate(&layout).unwrap_err(),
            RewardError::InvalidTimestep(-0.01)
        );
    }

    #[test]
    fn test_snapshot_validate_rejects_ragged_feet() {
        let layout = MorphologyLayout::quadruped();
        let mut snapshot = quadruped_snapshot();
        snapshot.feet.air_time = vec![0.0; 4];
        snapshot.feet.first_contact = vec![false; 3];
        assert!(snapshot.validate(&layout).is_err());
    }

    #[test]
    fn test_zero_dt_is_guarded_not_rejected() {
        let layout = MorphologyLayout::quadruped();
        let mut snapshot = quadruped_snapshot();
        snapshot.dt = 0.0;
        assert!(snapshot.validate(&layout).is_ok());
    }
}
