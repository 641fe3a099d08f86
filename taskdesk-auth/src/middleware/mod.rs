/// Middleware modules for the auth service
///
/// - `rate_limit`: Per-IP request limit on the `/v1/auth` routes
///
/// Security headers and CORS are shared with the task service and live in
/// `taskdesk_shared::http`.

pub mod rate_limit;
