/// Cross-cutting HTTP layers used by both services
///
/// - `security`: Security response headers
/// - `cors`: CORS policy derived from `ServerConfig`

pub mod cors;
pub mod security;

pub use cors::cors_layer;
pub use security::SecurityHeadersLayer;
