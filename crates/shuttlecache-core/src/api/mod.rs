//! Client for the shuttle backend.
//!
//! The backend is a single script endpoint. An `action` parameter selects
//! the operation: GET requests carry it in the query string, POST requests
//! in the JSON body. Every response is an envelope of the form
//! `{success, data | error}`.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
