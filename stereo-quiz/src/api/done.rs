//! Completion page

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tracing::info;

use crate::pages;
use crate::session::{expired_cookie, session_id};
use crate::AppState;

/// Build completion routes
pub fn done_routes() -> Router<AppState> {
    Router::new().route("/done", get(show_done))
}

/// GET /done
///
/// Greets a participant who finished and ends their session; one still
/// mid-quiz is sent back to their current region.
async fn show_done(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let id = session_id(&headers);
    let quiz = match id {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };

    match (id, quiz) {
        (Some(id), Some(quiz)) if quiz.is_complete() => {
            let name = quiz.participant().map(|p| p.name.as_str());
            info!(participant = name.unwrap_or(""), "Showing completion page");
            let html = pages::done_page(name);
            state.sessions.remove(id).await;
            ([(header::SET_COOKIE, expired_cookie())], Html(html)).into_response()
        }
        (_, Some(quiz)) if quiz.current_target().is_some() => Redirect::to("/quiz").into_response(),
        _ => Html(pages::done_page(None)).into_response(),
    }
}
