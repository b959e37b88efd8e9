//! The reward term catalog.
//!
//! Each term is a pure function mapping the slice of snapshot state it needs
//! to a single raw scalar. Raw values are unbounded here; the shared
//! clip/scale step lives in [`Normalization`](crate::Normalization) and is
//! applied uniformly by the evaluator. Batched evaluation is elementwise
//! application of these same functions across instances.

use nalgebra::{DVector, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::layout::MorphologyLayout;
use crate::normalize::{Convention, Normalization};
use crate::state::{Command, ContactPair, FeetState, GeomId, Pose, Twist};

/// Additive epsilon guarding divisions by `dt` and tracking sigma.
pub const EPS: f64 = 1e-6;

/// Command magnitude below which air-time reward is withheld.
pub const AIR_TIME_COMMAND_GATE: f64 = 0.05;

/// Identifier for one catalog term.
///
/// The string keys are the stable identifiers used by
/// [`RewardProfile`](crate::RewardProfile) scale tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TermId {
    /// Vertical base velocity penalty.
    LinVelZ,
    /// Base roll/pitch rate penalty.
    AngVelXy,
    /// Desired body orientation tracking reward.
    TrackingOrientation,
    /// Base tilt penalty.
    Orientation,
    /// Joint torque penalty.
    Torques,
    /// Joint acceleration penalty.
    JointAcceleration,
    /// Mechanical work penalty.
    MechanicalWork,
    /// Action rate penalty.
    ActionRate,
    /// Linear velocity command tracking reward.
    TrackingLinVel,
    /// Yaw rate command tracking reward.
    TrackingAngVel,
    /// Feet air time reward.
    FeetAirTime,
    /// Hip abduction angle penalty.
    AbductionAngle,
    /// Joint deviation penalty at zero command.
    StandStill,
    /// Joint velocity penalty at zero command.
    StandStillJointVelocity,
    /// Foot slip penalty.
    FootSlip,
    /// Early termination penalty indicator.
    Termination,
    /// Watched-geometry collision count penalty.
    GeomCollision,
    /// Knee-geometry collision count penalty.
    KneeCollision,
}

impl TermId {
    /// Number of catalog terms.
    pub const COUNT: usize = 18;

    /// Every catalog term, in evaluation and breakdown order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::LinVelZ,
        Self::AngVelXy,
        Self::TrackingOrientation,
        Self::Orientation,
        Self::Torques,
        Self::JointAcceleration,
        Self::MechanicalWork,
        Self::ActionRate,
        Self::TrackingLinVel,
        Self::TrackingAngVel,
        Self::FeetAirTime,
        Self::AbductionAngle,
        Self::StandStill,
        Self::StandStillJointVelocity,
        Self::FootSlip,
        Self::Termination,
        Self::GeomCollision,
        Self::KneeCollision,
    ];

    /// The stable string key for this term.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::LinVelZ => "lin_vel_z",
            Self::AngVelXy => "ang_vel_xy",
            Self::TrackingOrientation => "tracking_orientation",
            Self::Orientation => "orientation",
            Self::Torques => "torques",
            Self::JointAcceleration => "joint_acceleration",
            Self::MechanicalWork => "mechanical_work",
            Self::ActionRate => "action_rate",
            Self::TrackingLinVel => "tracking_lin_vel",
            Self::TrackingAngVel => "tracking_ang_vel",
            Self::FeetAirTime => "feet_air_time",
            Self::AbductionAngle => "abduction_angle",
            Self::StandStill => "stand_still",
            Self::StandStillJointVelocity => "stand_still_joint_velocity",
            Self::FootSlip => "foot_slip",
            Self::Termination => "termination",
            Self::GeomCollision => "geom_collision",
            Self::KneeCollision => "knee_collision",
        }
    }

    /// Look up a term by its string key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|term| term.key() == key)
    }

    /// The unit-interval divisor mapping this term's practical maximum to
    /// roughly 1, or `None` for the boolean termination indicator.
    ///
    /// Exponential tracking terms self-normalize and only clip.
    fn unit_divisor(self) -> Option<f64> {
        match self {
            // max ~2 m/s vertical velocity
            Self::LinVelZ => Some(4.0),
            // max ~5 rad/s roll/pitch rate
            Self::AngVelXy => Some(25.0),
            // fully inverted base
            Self::Orientation => Some(2.0),
            // max ~10 N m per joint, 12 joints
            Self::Torques => Some(1200.0),
            // max ~100 rad/s^2 per joint, 12 joints
            Self::JointAcceleration => Some(120_000.0),
            // max ~50 W per joint, 12 joints
            Self::MechanicalWork => Some(600.0),
            // max ~2.0 action delta per joint, 12 joints
            Self::ActionRate => Some(48.0),
            Self::TrackingOrientation | Self::TrackingLinVel | Self::TrackingAngVel => Some(1.0),
            // max ~0.5 s air-time benefit over 4 feet
            Self::FeetAirTime => Some(2.0),
            // max ~pi/2 rad deviation per hip, 4 hips
            Self::AbductionAngle => Some(std::f64::consts::PI * std::f64::consts::PI),
            // max ~pi rad deviation per joint, 12 joints
            Self::StandStill => Some(12.0 * std::f64::consts::PI),
            // max ~5 rad/s per joint, 12 joints
            Self::StandStillJointVelocity => Some(60.0),
            // max ~2 m/s slip over 4 feet, 2 planar components
            Self::FootSlip => Some(16.0),
            // max ~10 simultaneous watched contacts
            Self::GeomCollision | Self::KneeCollision => Some(10.0),
            Self::Termination => None,
        }
    }

    /// The normalization applied to this term under `convention`, or `None`
    /// for terms exempt from clipping (termination).
    #[must_use]
    pub fn normalization(self, convention: Convention) -> Option<Normalization> {
        let divisor = self.unit_divisor()?;
        Some(match convention {
            Convention::UnitInterval => Normalization::UnitInterval { divisor },
            Convention::SignedWide => Normalization::SignedWide,
        })
    }
}

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Squared vertical base velocity.
#[must_use]
pub fn lin_vel_z(base_twist: &Twist) -> f64 {
    base_twist.linear.z * base_twist.linear.z
}

/// Sum of squared roll and pitch rates of the base.
#[must_use]
pub fn ang_vel_xy(base_twist: &Twist) -> f64 {
    base_twist.angular.x * base_twist.angular.x + base_twist.angular.y * base_twist.angular.y
}

/// Exponential tracking of a desired body-frame up direction.
///
/// 1 when the world up axis, seen from the body frame, coincides with
/// `desired_up`; decays with the squared error at a rate set by
/// `tracking_sigma`.
#[must_use]
pub fn tracking_orientation(
    desired_up: &Vector3<f64>,
    base_pose: &Pose,
    tracking_sigma: f64,
) -> f64 {
    let error = (base_pose.world_up_in_body() - desired_up).norm_squared();
    (-error / (tracking_sigma + EPS)).exp()
}

/// Base tilt: squared xy components of the world up axis in the body frame.
///
/// 0 when upright, approaching 1 sideways, back to 0 fully inverted.
#[must_use]
pub fn orientation(base_pose: &Pose) -> f64 {
    let up = base_pose.world_up_in_body();
    up.x * up.x + up.y * up.y
}

/// Sum of squared joint torques.
#[must_use]
pub fn torques(joint_torques: &DVector<f64>) -> f64 {
    joint_torques.norm_squared()
}

/// Sum of squared joint accelerations from finite-differenced velocities.
///
/// The division is epsilon-guarded so a zero `dt` yields a large finite
/// value instead of `Inf`.
#[must_use]
pub fn joint_acceleration(
    velocities: &DVector<f64>,
    previous_velocities: &DVector<f64>,
    dt: f64,
) -> f64 {
    ((velocities - previous_velocities) / (dt + EPS)).norm_squared()
}

/// Total mechanical work magnitude: sum of |torque * velocity|.
#[must_use]
pub fn mechanical_work(joint_torques: &DVector<f64>, velocities: &DVector<f64>) -> f64 {
    joint_torques
        .iter()
        .zip(velocities.iter())
        .map(|(torque, velocity)| (torque * velocity).abs())
        .sum()
}

/// Sum of squared changes between consecutive actions.
#[must_use]
pub fn action_rate(action: &DVector<f64>, previous_action: &DVector<f64>) -> f64 {
    (action - previous_action).norm_squared()
}

/// Exponential tracking of the planar velocity command.
///
/// Base linear velocity is rotated into the body frame before comparison
/// against the commanded xy velocity.
#[must_use]
pub fn tracking_lin_vel(
    command: &Command,
    base_pose: &Pose,
    base_twist: &Twist,
    tracking_sigma: f64,
) -> f64 {
    let local_vel = base_pose.into_body_frame(&base_twist.linear);
    let error = (command.linear - local_vel.xy()).norm_squared();
    (-error / (tracking_sigma + EPS)).exp()
}

/// Exponential tracking of the commanded yaw rate.
#[must_use]
pub fn tracking_ang_vel(
    command: &Command,
    base_pose: &Pose,
    base_twist: &Twist,
    tracking_sigma: f64,
) -> f64 {
    let local_ang = base_pose.into_body_frame(&base_twist.angular);
    let error = (command.yaw_rate - local_ang.z).powi(2);
    (-error / (tracking_sigma + EPS)).exp()
}

/// Air-time reward credited on first contact, withheld near zero command.
///
/// Each foot touching down contributes its air time minus `min_air_time`;
/// the whole term is zeroed when the command magnitude is at or below the
/// fixed gate of [`AIR_TIME_COMMAND_GATE`].
#[must_use]
pub fn feet_air_time(
    air_time: &[f64],
    first_contact: &[bool],
    command: &Command,
    min_air_time: f64,
) -> f64 {
    if command.magnitude() <= AIR_TIME_COMMAND_GATE {
        return 0.0;
    }
    air_time
        .iter()
        .zip(first_contact.iter())
        .map(|(time, landed)| if *landed { time - min_air_time } else { 0.0 })
        .sum()
}

/// Sum of squared deviations of the hip abduction joints from their
/// desired angles. The abduction index stride comes from the layout.
#[must_use]
pub fn abduction_angle(
    joint_angles: &DVector<f64>,
    desired_angles: &DVector<f64>,
    layout: &MorphologyLayout,
) -> f64 {
    layout
        .abduction_indices()
        .zip(desired_angles.iter())
        .map(|(index, desired)| (joint_angles[index] - desired).powi(2))
        .sum()
}

/// Joint deviation from the default pose, penalized only near zero command.
#[must_use]
pub fn stand_still(
    command: &Command,
    joint_angles: &DVector<f64>,
    default_pose: &DVector<f64>,
    command_threshold: f64,
) -> f64 {
    if !command.is_near_zero(command_threshold) {
        return 0.0;
    }
    joint_angles
        .iter()
        .zip(default_pose.iter())
        .map(|(angle, default)| (angle - default).abs())
        .sum()
}

/// Joint velocity magnitude, penalized only near zero command.
#[must_use]
pub fn stand_still_joint_velocity(
    command: &Command,
    joint_velocities: &DVector<f64>,
    command_threshold: f64,
) -> f64 {
    if !command.is_near_zero(command_threshold) {
        return 0.0;
    }
    joint_velocities.iter().map(|velocity| velocity.abs()).sum()
}

/// Squared planar foot velocity summed over feet in ground contact.
///
/// Foot velocity is the lower-leg spatial velocity rigidly offset to the
/// foot site. Lower-leg body ids map into `body_twists` through the
/// layout's world-body offset.
#[must_use]
pub fn foot_slip(feet: &FeetState, body_twists: &[Twist], layout: &MorphologyLayout) -> f64 {
    let mut penalty = 0.0;
    for foot in 0..feet.foot_count() {
        if !feet.contact[foot] {
            continue;
        }
        let Some(index) = layout.velocity_index(feet.lower_leg_bodies[foot]) else {
            continue;
        };
        let Some(twist) = body_twists.get(index) else {
            continue;
        };
        let offset = feet.site_positions[foot] - feet.lower_leg_positions[foot];
        let velocity = twist.velocity_at_offset(&offset);
        penalty += velocity.x * velocity.x + velocity.y * velocity.y;
    }
    penalty
}

/// 1 when the episode terminated before reaching the step threshold.
///
/// Exactly at the threshold the termination is not early.
#[must_use]
pub fn termination(done: bool, step: u64, step_threshold: u64) -> f64 {
    if done && step < step_threshold {
        1.0
    } else {
        0.0
    }
}

/// Count of penetrating contacts touching any watched geometry.
///
/// Accumulated per watched id; a pair touching two watched ids counts
/// twice.
#[must_use]
pub fn geom_collision(contacts: &[ContactPair], watched: &[GeomId]) -> f64 {
    let mut count = 0usize;
    for id in watched {
        count += contacts
            .iter()
            .filter(|pair| pair.involves(*id) && pair.is_penetrating())
            .count();
    }
    count as f64
}
