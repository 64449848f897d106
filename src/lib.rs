//! Bodega
//!
//! Storefront commerce backend: catalog, carts, checkout, promotions and
//! simulated card storage, exposed as service traits over PostgreSQL.

pub mod context;
pub mod database;
pub mod domain;

#[cfg(test)]
mod test;

mod ids;
