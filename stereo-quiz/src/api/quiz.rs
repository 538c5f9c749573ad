//! Region pages of the quiz
//!
//! GET renders the current region; POST validates and saves it. A failed
//! attempt re-renders the same region with the error and leaves progress
//! where it was.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use stereo_common::quiz::{submit_region, QuizError};
use stereo_common::submission::FormFields;
use stereo_common::QuizState;
use tracing::{debug, warn};

use super::redirect_expired;
use crate::pages;
use crate::session::{session_id, SaveRejected};
use crate::AppState;

/// Build quiz routes
pub fn quiz_routes() -> Router<AppState> {
    Router::new().route("/quiz", get(show_region).post(submit))
}

fn render_region(state: &AppState, quiz: &QuizState, error: Option<&str>) -> Option<String> {
    let region = quiz.current_target()?;
    let items = state.definitions.items_for_region(region);
    debug!(region, items = items.len(), "Rendering region page");
    Some(pages::quiz_page(
        region,
        quiz.progress() + 1,
        quiz.total(),
        &items,
        error,
    ))
}

/// GET /quiz
async fn show_region(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let quiz = match session_id(&headers) {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };

    match quiz {
        Some(quiz) if quiz.is_complete() => Redirect::to("/done").into_response(),
        Some(quiz) => match render_region(&state, &quiz, None) {
            Some(html) => Html(html).into_response(),
            None => redirect_expired(),
        },
        None => redirect_expired(),
    }
}

/// POST /quiz
///
/// Only one save per session runs at a time. A repeated submit that arrives
/// while the first is still saving, or a replay of an already saved page,
/// is sent back to the current region without writing anything.
async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let Some(id) = session_id(&headers) else {
        return redirect_expired();
    };
    let slot = match state.sessions.begin_save(id).await {
        Ok(slot) => slot,
        Err(SaveRejected::Missing) => return redirect_expired(),
        Err(SaveRejected::Busy) => {
            warn!(session = %id, "Region save already in progress; ignoring repeated submit");
            return Redirect::to("/quiz").into_response();
        }
    };
    let quiz = slot.state();
    if quiz.is_complete() {
        return Redirect::to("/done").into_response();
    }

    let fields = FormFields::new(pairs);
    let saved_index = quiz.progress();

    match submit_region(&state.db, quiz, &fields).await {
        Ok(next) => {
            if !state.sessions.advance_if(id, saved_index, next.clone()).await {
                warn!(
                    session = %id,
                    saved_index,
                    "Session moved on during save; keeping the stored progress"
                );
            }
            if next.is_complete() {
                Redirect::to("/done").into_response()
            } else {
                Redirect::to("/quiz").into_response()
            }
        }
        Err(QuizError::NoActiveRegion) => redirect_expired(),
        Err(QuizError::StaleRegion { .. }) => Redirect::to("/quiz").into_response(),
        Err(e) => {
            let status = match e {
                QuizError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            match render_region(&state, quiz, Some(&e.to_string())) {
                Some(html) => (status, Html(html)).into_response(),
                None => redirect_expired(),
            }
        }
    }
}
