//! HTTP handlers for stereo-quiz

pub mod admin;
pub mod done;
pub mod entry;
pub mod health;
pub mod quiz;

pub use admin::admin_routes;
pub use done::done_routes;
pub use entry::entry_routes;
pub use health::health_routes;
pub use quiz::quiz_routes;

use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};

/// Query value shown as a notice on the entry page after a lost session
pub const EXPIRED_NOTICE: &str = "expired";

/// Send the browser back to the entry page with the expired notice
pub(crate) fn redirect_expired() -> Response {
    (
        [(header::SET_COOKIE, crate::session::expired_cookie())],
        Redirect::to(&format!("/?notice={EXPIRED_NOTICE}")),
    )
        .into_response()
}
