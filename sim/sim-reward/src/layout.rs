//! Morphology layout constants.
//!
//! The reward catalog relies on a fixed index convention for the actuated
//! degrees of freedom and on a mapping from lower-leg body ids to entries in
//! the per-body velocity array. Both are fragile as implicit strides, so
//! they live here as explicit named parameters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RewardError;
use crate::state::BodyId;
use crate::Result;

/// Index conventions for one robot morphology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MorphologyLayout {
    /// Actuated degrees of freedom (12 for a quadruped: 3 per leg, 4 legs).
    pub joint_count: usize,
    /// Index of the first abduction joint in the angle vector.
    pub abduction_offset: usize,
    /// Stride between consecutive abduction joints.
    pub abduction_stride: usize,
    /// Number of feet tracked for air-time and slip terms.
    pub foot_count: usize,
    /// Leading body slots (the world body) absent from the velocity array.
    pub world_body_slots: usize,
}

impl MorphologyLayout {
    /// The 12-DOF quadruped convention: abduction joints at every 3rd index
    /// starting from 1, four feet, one world-body slot.
    #[must_use]
    pub const fn quadruped() -> Self {
        Self {
            joint_count: 12,
            abduction_offset: 1,
            abduction_stride: 3,
            foot_count: 4,
            world_body_slots: 1,
        }
    }

    /// A layout without abduction joints or feet, for wheeled bases.
    #[must_use]
    pub const fn wheeled(joint_count: usize) -> Self {
        Self {
            joint_count,
            abduction_offset: 0,
            abduction_stride: 1,
            foot_count: 0,
            world_body_slots: 1,
        }
    }

    /// Indices of the abduction joints in the angle vector.
    pub fn abduction_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (self.abduction_offset..self.joint_count).step_by(self.abduction_stride.max(1))
    }

    /// Number of abduction joints under this layout.
    #[must_use]
    pub fn abduction_count(&self) -> usize {
        self.abduction_indices().count()
    }

    /// Map a body id to its entry in the per-body velocity array, which has
    /// the world-body slots stripped. `None` if the id addresses a stripped
    /// slot.
    #[must_use]
    pub fn velocity_index(&self, body: BodyId) -> Option<usize> {
        (body.raw() as usize).checked_sub(self.world_body_slots)
    }

    /// Validate the layout.
    ///
    /// # Errors
    ///
    /// Returns a config validation error for a zero joint count or stride.
    pub fn validate(&self) -> Result<()> {
        if self.joint_count == 0 {
            return Err(RewardError::invalid_params("layout has zero joints"));
        }
        if self.abduction_stride == 0 {
            return Err(RewardError::invalid_params(
                "layout abduction stride must be at least 1",
            ));
        }
        Ok(())
    }
}
