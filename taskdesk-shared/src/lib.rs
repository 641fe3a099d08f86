//! # TaskDesk Shared Library
//!
//! This crate contains shared types, utilities, and business logic used by
//! the TaskDesk authentication service and task service.
//!
//! ## Module Organization
//!
//! - `auth`: Token, password and service-key primitives, request auth context
//! - `config`: Environment-driven server configuration shared by both services
//! - `db`: Connection pooling and migrations
//! - `error`: Unified HTTP error type
//! - `http`: Cross-cutting HTTP layers (security headers, CORS)
//! - `models`: Database models and their queries
//! - `redis`: Redis client, rate limiter and session cache
//! - `telemetry`: Tracing subscriber setup

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod redis;
pub mod telemetry;

/// Current version of the TaskDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
