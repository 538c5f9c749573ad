//! Entry page: participant identity and target region selection

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use stereo_common::selection::{EntryForm, IdentityError};
use stereo_common::submission::FormFields;
use stereo_common::{Participant, QuizState};
use tracing::{info, warn};

use super::EXPIRED_NOTICE;
use crate::pages;
use crate::session::{expired_cookie, session_cookie, session_id};
use crate::AppState;

const NAME_FIELD: &str = "name";
const NATIVE_REGION_FIELD: &str = "native_region";
const AGE_FIELD: &str = "age";
const SEX_FIELD: &str = "sex";
const SELECTED_REGIONS_FIELD: &str = "selected_regions";

#[derive(Debug, Default, Deserialize)]
pub struct EntryQuery {
    pub notice: Option<String>,
}

/// Build entry page routes
pub fn entry_routes() -> Router<AppState> {
    Router::new().route("/", get(show_entry).post(start_quiz))
}

fn definitions_errors(state: &AppState) -> Vec<String> {
    if state.definitions.is_available() {
        Vec::new()
    } else {
        vec![IdentityError::DefinitionsUnavailable.to_string()]
    }
}

/// Drop whatever session the browser is holding
async fn clear_session(state: &AppState, headers: &HeaderMap) {
    if let Some(id) = session_id(headers) {
        if let Some(previous) = state.sessions.remove(id).await {
            info!(
                session = %id,
                progress = previous.progress(),
                "Session cleared"
            );
        }
    }
}

/// GET /
///
/// Shows the entry form and ends any session in progress.
async fn show_entry(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
    headers: HeaderMap,
) -> Response {
    clear_session(&state, &headers).await;

    let notice = match query.notice.as_deref() {
        Some(EXPIRED_NOTICE) => Some("Your session has expired or is invalid. Please start again."),
        _ => None,
    };

    let html = pages::entry_page(
        state.definitions.regions(),
        state.regions_per_participant,
        &definitions_errors(&state),
        notice,
        None,
    );

    ([(header::SET_COOKIE, expired_cookie())], Html(html)).into_response()
}

/// POST /
///
/// Validates identity and region choices; on success starts the quiz and
/// redirects to the first region.
async fn start_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    clear_session(&state, &headers).await;

    let fields = FormFields::new(pairs);
    let form = EntryForm {
        name: fields.get(NAME_FIELD).map(str::to_string),
        native_region: fields.get(NATIVE_REGION_FIELD).map(str::to_string),
        age: fields.get(AGE_FIELD).map(str::to_string),
        sex: fields.get(SEX_FIELD).map(str::to_string),
        selected_regions: fields.get_all(SELECTED_REGIONS_FIELD),
    };

    let (participant, targets) = match Participant::from_entry_form(
        &form,
        state.definitions.regions(),
        state.regions_per_participant,
    ) {
        Ok(accepted) => accepted,
        Err(errors) => {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            warn!("Entry form rejected: {}", messages.join(" | "));

            let status = if errors.contains(&IdentityError::DefinitionsUnavailable) {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            let html = pages::entry_page(
                state.definitions.regions(),
                state.regions_per_participant,
                &messages,
                None,
                Some(&form),
            );
            return (status, Html(html)).into_response();
        }
    };

    let quiz = QuizState::start(participant, targets, &mut rand::thread_rng());
    let id = state.sessions.create(quiz).await;
    info!(session = %id, "Session created");

    (
        [(header::SET_COOKIE, session_cookie(id))],
        Redirect::to("/quiz"),
    )
        .into_response()
}
