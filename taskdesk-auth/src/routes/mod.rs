/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Register, login, refresh and logout
/// - `account`: Profile, password change and account deletion
/// - `sessions`: Listing and revoking sessions
/// - `verify`: Token verification for the task service

pub mod account;
pub mod auth;
pub mod health;
pub mod sessions;
pub mod verify;
