//! Reward shaping for legged and wheeled locomotion policies.
//!
//! This crate turns one step of simulated physics state into the scalar
//! training signal consumed by a reinforcement-learning loop:
//!
//! - [`StepSnapshot`] - Immutable per-step state handed in by a simulator
//! - [`terms`] - The catalog of reward and penalty term formulas
//! - [`Normalization`] - Unit-interval or signed-wide output conventions
//! - [`RewardProfile`] - Per-morphology term weights (quadruped, wheeled)
//! - [`RewardEvaluator`] - Weighted aggregation into one scalar, with an
//!   optional per-term breakdown for diagnostics
//!
//! # Design Philosophy
//!
//! Term formulas are pure functions of the snapshot. Nothing in this crate
//! steps physics, owns episode state, or mutates between calls; air time and
//! first-contact flags are maintained by the environment and merely read
//! here. A morphology switch (legged vs wheeled) is a profile swap, never a
//! code branch inside the catalog.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero engine dependencies**. It can be used
//! in:
//!
//! - Headless training loops
//! - Hardware-in-the-loop reward audits
//! - Analysis and replay tools
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use sim_reward::{
//!     BodyId, Command, FeetState, JointState, MorphologyLayout, Pose, RewardEvaluator,
//!     RewardProfile, StepSnapshot, TermParams, Twist,
//! };
//!
//! # fn main() -> sim_reward::Result<()> {
//! let evaluator = RewardEvaluator::new(
//!     RewardProfile::quadruped(),
//!     MorphologyLayout::quadruped(),
//!     TermParams::quadruped(),
//! )?;
//!
//! // The quadruped profile reads foot bookkeeping, so the snapshot
//! // carries it alongside the base and joint state.
//! let feet = FeetState {
//!     air_time: vec![0.0; 4],
//!     first_contact: vec![false; 4],
//!     contact: vec![true; 4],
//!     site_positions: vec![Point3::origin(); 4],
//!     lower_leg_positions: vec![Point3::origin(); 4],
//!     lower_leg_bodies: (1..=4).map(BodyId::new).collect(),
//! };
//! let snapshot = StepSnapshot::new(
//!     Pose::identity(),
//!     Twist::zero(),
//!     JointState::zeros(12),
//!     Command::new(1.0, 0.0, 0.0),
//!     0.02,
//! )
//! .with_feet(feet)
//! .with_body_twists(vec![Twist::zero(); 4]);
//!
//! let reward = evaluator.evaluate(&snapshot)?;
//! assert!(reward.is_finite());
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/sim-reward/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss
)]

mod aggregate;
mod error;
mod layout;
mod normalize;
mod profile;
mod state;
pub mod terms;

pub use aggregate::{RewardBreakdown, RewardEvaluator, TermParams, TermReward};
pub use error::RewardError;
pub use layout::MorphologyLayout;
pub use normalize::{Convention, Normalization, SIGNED_WIDE_BOUND};
pub use profile::RewardProfile;
pub use state::{
    BodyId, Command, ContactPair, FeetState, GeomId, JointState, Pose, StepSnapshot, Twist,
    UNIT_QUATERNION_TOLERANCE,
};
pub use terms::TermId;

/// Result type for reward operations.
pub type Result<T> = std::result::Result<T, RewardError>;
