/*
 * Responsibility
 * - v1 public surface: routes() and the endpoint -> policy registration table
 */
pub mod dto;
pub mod handlers;
mod routes;

pub use routes::{PREFIX, endpoint_policies, routes};
