//! HTTP surface of the lyrics relay.

mod error;
mod routes;

pub use error::ApiError;
pub use routes::{router, WELCOME_MESSAGE};
