//! REST client for the chat backend.

pub mod client;
pub mod upload;

pub use client::{ApiClient, RegisterOutcome};
