//! # TaskDesk Authentication Service Library
//!
//! This library provides the core functionality for the TaskDesk
//! authentication service.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `middleware`: Per-IP request limiting
//! - `routes`: API route handlers
//! - `service`: Session lifecycle (login, refresh rotation, revocation)

pub mod app;
pub mod config;
pub mod middleware;
pub mod routes;
pub mod service;
