//! # TaskDesk Task Service Library
//!
//! Category and task CRUD for authenticated users. Tokens are verified by
//! the auth service on every request.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `auth_client`: `TokenVerifier` and its HTTP implementation
//! - `config`: Configuration management
//! - `middleware`: Bearer-token gate
//! - `routes`: API route handlers

pub mod app;
pub mod auth_client;
pub mod config;
pub mod middleware;
pub mod routes;
