//! Promotions

pub mod errors;
pub mod models;
mod repository;
pub mod service;

pub use errors::PromotionsServiceError;
pub use service::*;

pub(crate) use repository::PgPromotionsRepository;
