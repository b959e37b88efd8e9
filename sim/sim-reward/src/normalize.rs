//! Output normalization conventions.
//!
//! The catalog's raw formulas are convention-agnostic; a single clip/scale
//! step, applied uniformly as the last stage of every term, decides the
//! output range. Exactly one convention is selected per deployment, carried
//! on the [`RewardProfile`](crate::RewardProfile).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Clip bound of the signed-wide convention, guarding numeric blow-up only.
pub const SIGNED_WIDE_BOUND: f64 = 1000.0;

/// Which output convention a deployment runs under.
///
/// Switching conventions changes term magnitudes (unit-interval divides by a
/// per-term maximum, signed-wide keeps raw physical magnitude), so scale
/// tables are convention-specific and must not be mixed between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Convention {
    /// Outputs clipped to [0, 1] after dividing by a per-term maximum.
    #[default]
    UnitInterval,
    /// Outputs clipped to [-1000, 1000] with raw magnitude preserved.
    SignedWide,
}

impl std::fmt::Display for Convention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnitInterval => write!(f, "unit-interval"),
            Self::SignedWide => write!(f, "signed-wide"),
        }
    }
}

/// The clip/scale step applied to one term's raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Normalization {
    /// `clip(raw / divisor, 0, 1)`; the divisor maps the term's practical
    /// maximum to roughly 1.
    UnitInterval {
        /// Term-specific normalizing divisor, strictly positive.
        divisor: f64,
    },
    /// `clip(raw, -1000, 1000)`; no divisor.
    SignedWide,
}

impl Normalization {
    /// Apply the clip/scale step to a raw term value.
    ///
    /// Out-of-range values are silently bounded; clipping is the terminal
    /// defense against numeric blow-up, never an error.
    #[must_use]
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            Self::UnitInterval { divisor } => (raw / divisor).clamp(0.0, 1.0),
            Self::SignedWide => raw.clamp(-SIGNED_WIDE_BOUND, SIGNED_WIDE_BOUND),
        }
    }

    /// The inclusive output bounds of this step.
    #[must_use]
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Self::UnitInterval { .. } => (0.0, 1.0),
            Self::SignedWide => (-SIGNED_WIDE_BOUND, SIGNED_WIDE_BOUND),
        }
    }
}
