//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. CORS (dashboard origin)
//! 3. `TraceLayer` (`http_request` span)
//! 4. Request ID (recorded on the span, echoed in the response)
//!
//! Authentication is not a layer: handlers take the [`AuthUser`] extractor
//! and check their own role allow-list.

pub mod auth;
pub mod request_id;

pub use auth::AuthUser;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
