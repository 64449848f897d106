//! User Models

use jiff::Timestamp;

use crate::ids::TypedId;

/// User id
pub type UserId = TypedId<User>;

/// User Model
///
/// Account lifecycle (registration, credentials, roles) lives with the
/// excluded auth collaborator; this row only anchors ownership.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New User Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
}
