//! Orders service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrdersServiceError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("not enough stock for {product}")]
    OutOfStock { product: String },

    #[error("order not found")]
    NotFound,

    /// A storage failure inside the checkout transaction. Everything written
    /// since the transaction opened has been rolled back.
    #[error("checkout failed")]
    CheckoutFailed(#[source] Error),

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for OrdersServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::CheckViolation | ErrorKind::NotNullViolation) => Self::InvalidData,
            _ => Self::Sql(error),
        }
    }
}
