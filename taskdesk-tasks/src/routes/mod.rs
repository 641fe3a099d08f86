/// API route handlers
///
/// - `health`: Health check endpoint
/// - `categories`: Category CRUD
/// - `tasks`: Task CRUD and status transitions
///
/// Every handler is scoped to the authenticated owner; another user's
/// resources are reported as not found.

pub mod categories;
pub mod health;
pub mod tasks;
