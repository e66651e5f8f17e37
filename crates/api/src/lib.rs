//! Easy-Paies HTTP API: configuration, routing and request handling.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
