//! Card Models

use jiff::Timestamp;

use crate::{domain::users::models::UserId, ids::TypedId};

/// Card id
pub type CardId = TypedId<Card>;

/// Card Model
///
/// Only tokenized metadata is ever stored; the PAN is consumed at add time
/// and never written anywhere.
#[derive(Debug, Clone)]
pub struct Card {
    pub id: CardId,
    pub user_id: UserId,
    pub brand: Option<String>,
    pub last4: String,
    pub exp_month: i16,
    pub exp_year: i16,
    pub token: String,
    pub is_default: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New Card Model
///
/// Carries the raw PAN briefly; `add_card` derives the stored metadata and
/// zeroizes the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub brand: Option<String>,
    pub number: String,
    pub exp_month: i16,
    pub exp_year: i16,
    pub is_default: bool,
}
