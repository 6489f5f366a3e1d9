//! API module - HTTP routes, handlers, and models

pub mod handlers;
pub mod intake;
pub mod models;
pub mod routes;
