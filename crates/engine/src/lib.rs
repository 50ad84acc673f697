//! Risk engine service: configuration, HTTP API and error mapping

pub mod api;
pub mod config;
pub mod error;
