//! SeaORM entities backing the identity and token-metadata stores.

pub mod app_user;
pub mod issued_token;
