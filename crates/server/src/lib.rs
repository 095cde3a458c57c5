#![allow(clippy::collapsible_if)]
pub mod auth;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod oauth;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod subscription_pipeline;
pub mod validation;
