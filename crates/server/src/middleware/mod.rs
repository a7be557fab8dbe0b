//! HTTP middleware for the checkout server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (the frontend is served from another origin)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
