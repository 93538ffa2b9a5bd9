//! HTTP API exposing the paper manager to the browser front-end.

mod papers;
mod routes;

pub use routes::{serve, AppState};
