//! Handlers HTTP.

pub mod admin;
pub mod health;
pub mod metrics;
pub mod pull_requests;
pub mod repository;
pub mod webhook;
