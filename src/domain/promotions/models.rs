//! Promotion Models

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use jiff::Timestamp;
use thiserror::Error;

use crate::ids::TypedId;

/// Promotion id
pub type PromotionId = TypedId<Promotion>;

/// How a promotion's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionKind {
    /// `value` is a percentage of the order total.
    Percent,
    /// `value` is an absolute amount in minor units.
    Fixed,
}

impl PromotionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Percent => "percent",
            Self::Fixed => "fixed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown promotion kind")]
pub struct ParsePromotionKindError;

impl FromStr for PromotionKind {
    type Err = ParsePromotionKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "percent" => Ok(Self::Percent),
            "fixed" => Ok(Self::Fixed),
            _ => Err(ParsePromotionKindError),
        }
    }
}

impl Display for PromotionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Promotion Model
#[derive(Debug, Clone)]
pub struct Promotion {
    pub id: PromotionId,
    pub code: String,
    pub kind: PromotionKind,
    pub value: u64,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Promotion {
    /// Whether the promotion applies at `now`.
    ///
    /// Activity is derived, not stored: the flag must be set and `now` must
    /// fall inside the optional window.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        if !self.active {
            return false;
        }

        if self.starts_at.is_some_and(|starts_at| now < starts_at) {
            return false;
        }

        if self.ends_at.is_some_and(|ends_at| now > ends_at) {
            return false;
        }

        true
    }

    /// Apply the discount to a total in minor units.
    ///
    /// The resulting total is clamped to zero; the discount amount itself is
    /// never clamped.
    #[must_use]
    pub fn discounted_total(&self, total: u64) -> u64 {
        let discount = match self.kind {
            PromotionKind::Percent => {
                let scaled = u128::from(total) * u128::from(self.value) / 100;

                u64::try_from(scaled).unwrap_or(u64::MAX)
            }
            PromotionKind::Fixed => self.value,
        };

        total.saturating_sub(discount)
    }
}

/// New Promotion Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewPromotion {
    pub code: String,
    pub kind: PromotionKind,
    pub value: u64,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub active: bool,
}
