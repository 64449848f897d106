//! Cards

pub mod errors;
pub mod models;
mod repository;
pub mod service;

pub use errors::CardsServiceError;
pub use service::*;

pub(crate) use repository::PgCardsRepository;
