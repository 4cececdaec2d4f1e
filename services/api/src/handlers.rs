//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests against the
//! single training session. Every state-changing endpoint funnels through
//! `SessionEngine::dispatch` and answers with a full `SessionView` snapshot,
//! so the front end never has to merge partial updates. It uses `utoipa` doc
//! comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::sync::Arc;
use tracing::error;
use watai_core::catalog;
use watai_core::gateway::SpeechError;
use watai_core::nav::{EngineError, Event, ProfileKind, TurnInput};
use watai_core::session::SessionState;
use watai_core::store::LibraryExport;
use watai_core::survey;

use crate::{
    models::{
        AudioResponse, ErrorResponse, GuestParamsPayload, KindDto, ModePayload, NavigatePayload,
        RatingChangeView, SelectionView, SessionView, StaffParamsPayload, SurveyItemsView,
        SurveyPayload, SurveyView, TurnPayload, TurnView, WorldParamsPayload,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Upstream(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Upstream(message) => {
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Maps engine failures onto HTTP status codes: refusals of the state machine
/// are the client's problem, gateway trouble is the upstream's.
fn map_engine(err: EngineError) -> ApiError {
    match err {
        EngineError::MissingSelection { .. }
        | EngineError::IncompleteSurvey { .. }
        | EngineError::Speech(SpeechError::Disabled | SpeechError::Unrecognized(_)) => {
            ApiError::BadRequest(err.to_string())
        }
        EngineError::UnknownProfile { .. } => ApiError::NotFound(err.to_string()),
        EngineError::BadTransition(_) | EngineError::NoConversation => {
            ApiError::Conflict(err.to_string())
        }
        EngineError::Generation(_)
        | EngineError::Evaluation(_)
        | EngineError::Speech(SpeechError::Upstream(_)) => ApiError::Upstream(err.to_string()),
        EngineError::Store(_) => ApiError::InternalServerError(err.into()),
    }
}

fn busy() -> ApiError {
    ApiError::Conflict("a previous request is still being processed".to_string())
}

fn selection(state: &AppState, kind: ProfileKind, name: Option<&String>) -> Option<SelectionView> {
    name.map(|name| SelectionView {
        name: name.clone(),
        resolved: match kind {
            ProfileKind::World => state.library.find_world(name).is_some(),
            ProfileKind::Guest => state.library.find_guest(name).is_some(),
            ProfileKind::Staff => state.library.find_staff(name).is_some(),
        },
    })
}

/// Renders the canonical response body: the whole session, with the active
/// names checked against the library so the UI can flag dangling selections.
fn session_view(state: &AppState, session: &SessionState) -> Result<SessionView, ApiError> {
    Ok(SessionView {
        id: session.id,
        page: session.page.to_string(),
        role: session.role.to_string(),
        world: selection(state, ProfileKind::World, session.active.world.as_ref()),
        guest: selection(state, ProfileKind::Guest, session.active.guest.as_ref()),
        staff: selection(state, ProfileKind::Staff, session.active.staff.as_ref()),
        draft_world: session
            .drafts
            .world
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?,
        draft_guest: session
            .drafts
            .guest
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?,
        draft_staff: session
            .drafts
            .staff
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?,
        transcript: session.transcript.iter().map(TurnView::from).collect(),
        evaluation: session
            .evaluation
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?,
        rating_change: session.rating_change.map(RatingChangeView::from),
        pre_test: session.pre_test.as_ref().map(SurveyView::from),
        post_test: session.post_test.as_ref().map(SurveyView::from),
        pre_test_skipped: session.pre_test_skipped,
        has_pending_audio: session.pending_audio.is_pending(),
    })
}

/// Dispatches one event under an already-held session lock and renders the
/// resulting snapshot.
async fn run(
    state: &AppState,
    session: &mut SessionState,
    event: Event,
) -> Result<Json<SessionView>, ApiError> {
    state
        .engine
        .dispatch(session, event)
        .await
        .map_err(map_engine)?;
    Ok(Json(session_view(state, session)?))
}

/// Get the current session snapshot.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current session state", body = SessionView)
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session.lock().await;
    Ok(Json(session_view(&state, &session)?))
}

/// Move to another page from the dashboard or an editor.
#[utoipa::path(
    post,
    path = "/session/navigate",
    request_body = NavigatePayload,
    responses(
        (status = 200, description = "Moved to the requested page", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse)
    )
)]
pub async fn navigate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NavigatePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::Navigate(payload.target.into())).await
}

/// Step back one page.
#[utoipa::path(
    post,
    path = "/session/back",
    responses(
        (status = 200, description = "Moved back", body = SessionView),
        (status = 409, description = "Session is busy or there is no page to go back to", body = ErrorResponse)
    )
)]
pub async fn go_back(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::Back).await
}

/// Generate a full random scenario and jump straight to mode selection.
#[utoipa::path(
    post,
    path = "/session/quick-play",
    responses(
        (status = 200, description = "World, guest and staff generated and selected", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse),
        (status = 502, description = "Generation failed upstream", body = ErrorResponse)
    )
)]
pub async fn quick_play(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::QuickPlay).await
}

/// Choose the player role and enter the pre-test gate.
#[utoipa::path(
    post,
    path = "/session/mode",
    request_body = ModePayload,
    responses(
        (status = 200, description = "Role chosen", body = SessionView),
        (status = 400, description = "A world, guest or staff selection is missing", body = ErrorResponse),
        (status = 404, description = "An active selection no longer exists", body = ErrorResponse),
        (status = 409, description = "Session is busy", body = ErrorResponse)
    )
)]
pub async fn choose_mode(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ModePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::ChooseMode(payload.role.into())).await
}

/// Open the pre-conversation self-assessment.
#[utoipa::path(
    post,
    path = "/session/pre-test/take",
    responses(
        (status = 200, description = "Survey opened", body = SessionView),
        (status = 409, description = "Session is busy or not at the pre-test gate", body = ErrorResponse)
    )
)]
pub async fn take_pre_test(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::TakeTest).await
}

/// Skip the self-assessment and start the conversation immediately.
#[utoipa::path(
    post,
    path = "/session/pre-test/skip",
    responses(
        (status = 200, description = "Conversation started", body = SessionView),
        (status = 409, description = "Session is busy or not at the pre-test gate", body = ErrorResponse),
        (status = 502, description = "Speech synthesis failed upstream", body = ErrorResponse)
    )
)]
pub async fn skip_pre_test(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::SkipTest).await
}

/// Submit the pre-conversation survey answers and start the conversation.
#[utoipa::path(
    post,
    path = "/session/pre-test",
    request_body = SurveyPayload,
    responses(
        (status = 200, description = "Survey scored, conversation started", body = SessionView),
        (status = 400, description = "Wrong number of answers", body = ErrorResponse),
        (status = 409, description = "Session is busy or not on the survey page", body = ErrorResponse),
        (status = 502, description = "Speech synthesis failed upstream", body = ErrorResponse)
    )
)]
pub async fn submit_pre_test(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SurveyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::SubmitPreTest(payload.answers)).await
}

/// Submit one player turn, as text or a base64-encoded WAV recording.
#[utoipa::path(
    post,
    path = "/session/turn",
    request_body = TurnPayload,
    responses(
        (status = 200, description = "Turn exchanged", body = SessionView),
        (status = 400, description = "Bad audio payload or nothing recognizable was said", body = ErrorResponse),
        (status = 409, description = "Session is busy or not in a playable conversation", body = ErrorResponse),
        (status = 502, description = "A gateway failed upstream", body = ErrorResponse)
    )
)]
pub async fn submit_turn(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TurnPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let audio = payload
        .audio_b64
        .as_deref()
        .map(|encoded| BASE64.decode(encoded.trim()))
        .transpose()
        .map_err(|err| ApiError::BadRequest(format!("audio_b64 is not valid base64: {err}")))?;
    let input = TurnInput {
        text: payload.text,
        audio,
    };
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::SubmitTurn(input)).await
}

/// Advance the observer-mode script by one line.
#[utoipa::path(
    post,
    path = "/session/observer/next",
    responses(
        (status = 200, description = "Next scripted line produced", body = SessionView),
        (status = 409, description = "Session is busy or not observing", body = ErrorResponse),
        (status = 502, description = "The model failed upstream", body = ErrorResponse)
    )
)]
pub async fn observer_next(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::ObserverNext).await
}

/// Close the conversation and move to the evaluation page.
#[utoipa::path(
    post,
    path = "/session/end-chat",
    responses(
        (status = 200, description = "Conversation closed", body = SessionView),
        (status = 409, description = "Session is busy or no conversation is open", body = ErrorResponse)
    )
)]
pub async fn end_chat(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::EndChat).await
}

/// Run the performance evaluation over the finished transcript.
#[utoipa::path(
    post,
    path = "/session/evaluate",
    responses(
        (status = 200, description = "Evaluation ready, world rating updated", body = SessionView),
        (status = 409, description = "Session is busy or there is nothing to evaluate", body = ErrorResponse),
        (status = 502, description = "Evaluation failed upstream", body = ErrorResponse)
    )
)]
pub async fn evaluate(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::Evaluate).await
}

/// Submit the post-conversation survey answers.
#[utoipa::path(
    post,
    path = "/session/post-test",
    request_body = SurveyPayload,
    responses(
        (status = 200, description = "Survey scored", body = SessionView),
        (status = 400, description = "Wrong number of answers", body = ErrorResponse),
        (status = 409, description = "Session is busy or not on the evaluation page", body = ErrorResponse)
    )
)]
pub async fn submit_post_test(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SurveyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::SubmitPostTest(payload.answers)).await
}

/// Wipe the scenario and return to the dashboard.
#[utoipa::path(
    post,
    path = "/session/return",
    responses(
        (status = 200, description = "Back on the dashboard", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse)
    )
)]
pub async fn return_to_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::ReturnToDashboard).await
}

/// Collect the pending synthesized utterance, if any. Each clip is handed
/// out exactly once.
#[utoipa::path(
    get,
    path = "/session/audio",
    responses(
        (status = 200, description = "A synthesized clip", body = AudioResponse),
        (status = 204, description = "No audio is waiting")
    )
)]
pub async fn take_audio(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let mut session = state.session.lock().await;
    match session.pending_audio.take() {
        Some(clip) => {
            let body = AudioResponse {
                id: clip.id,
                voice: clip.voice,
                style: clip.style.as_azure().to_string(),
                media_type: "audio/wav".to_string(),
                audio_b64: BASE64.encode(&clip.data),
            };
            Ok((StatusCode::OK, Json(body)).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Generate a world profile from seed parameters into the editor draft.
#[utoipa::path(
    post,
    path = "/worlds/generate",
    request_body = WorldParamsPayload,
    responses(
        (status = 200, description = "Draft generated", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse),
        (status = 502, description = "Generation failed upstream", body = ErrorResponse)
    )
)]
pub async fn generate_world(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WorldParamsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::GenerateWorld(payload.into())).await
}

/// Generate a guest profile from seed parameters into the editor draft.
#[utoipa::path(
    post,
    path = "/guests/generate",
    request_body = GuestParamsPayload,
    responses(
        (status = 200, description = "Draft generated", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse),
        (status = 502, description = "Generation failed upstream", body = ErrorResponse)
    )
)]
pub async fn generate_guest(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GuestParamsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::GenerateGuest(payload.into())).await
}

/// Generate a staff profile from seed parameters into the editor draft.
#[utoipa::path(
    post,
    path = "/staff/generate",
    request_body = StaffParamsPayload,
    responses(
        (status = 200, description = "Draft generated", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse),
        (status = 502, description = "Generation failed upstream", body = ErrorResponse)
    )
)]
pub async fn generate_staff(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StaffParamsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::GenerateStaff(payload.into())).await
}

/// Persist the current editor draft and make it the active selection.
#[utoipa::path(
    post,
    path = "/session/draft/{kind}/save",
    params(
        ("kind" = KindDto, Path, description = "Which editor's draft")
    ),
    responses(
        (status = 200, description = "Draft saved and selected", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse)
    )
)]
pub async fn save_draft(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<KindDto>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::SaveDraft(kind.into())).await
}

/// Throw the current editor draft away.
#[utoipa::path(
    post,
    path = "/session/draft/{kind}/discard",
    params(
        ("kind" = KindDto, Path, description = "Which editor's draft")
    ),
    responses(
        (status = 200, description = "Draft discarded", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse)
    )
)]
pub async fn discard_draft(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<KindDto>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(&state, &mut session, Event::DiscardDraft(kind.into())).await
}

/// Make a stored profile the active selection for its slot.
#[utoipa::path(
    post,
    path = "/profiles/{kind}/{name}/activate",
    params(
        ("kind" = KindDto, Path, description = "Profile kind"),
        ("name" = String, Path, description = "Stored profile name")
    ),
    responses(
        (status = 200, description = "Profile selected", body = SessionView),
        (status = 404, description = "No stored profile under that name", body = ErrorResponse),
        (status = 409, description = "Session is busy", body = ErrorResponse)
    )
)]
pub async fn activate_profile(
    State(state): State<Arc<AppState>>,
    Path((kind, name)): Path<(KindDto, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(
        &state,
        &mut session,
        Event::Activate {
            kind: kind.into(),
            name,
        },
    )
    .await
}

/// Delete a stored profile. A matching active selection is cleared too.
#[utoipa::path(
    delete,
    path = "/profiles/{kind}/{name}",
    params(
        ("kind" = KindDto, Path, description = "Profile kind"),
        ("name" = String, Path, description = "Stored profile name")
    ),
    responses(
        (status = 200, description = "Profile deleted", body = SessionView),
        (status = 409, description = "Session is busy", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Path((kind, name)): Path<(KindDto, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.try_lock().map_err(|_| busy())?;
    run(
        &state,
        &mut session,
        Event::Delete {
            kind: kind.into(),
            name,
        },
    )
    .await
}

/// List all stored worlds, newest first.
#[utoipa::path(
    get,
    path = "/worlds",
    responses(
        (status = 200, description = "All stored world profiles")
    )
)]
pub async fn list_worlds(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.library.worlds())
}

/// List all stored guests, newest first.
#[utoipa::path(
    get,
    path = "/guests",
    responses(
        (status = 200, description = "All stored guest profiles")
    )
)]
pub async fn list_guests(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.library.guests())
}

/// List all stored staff, newest first.
#[utoipa::path(
    get,
    path = "/staff",
    responses(
        (status = 200, description = "All stored staff profiles")
    )
)]
pub async fn list_staff(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.library.staff())
}

/// List past play records, newest first.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "All play history entries")
    )
)]
pub async fn list_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.library.history())
}

/// Export the whole library as one JSON document.
#[utoipa::path(
    get,
    path = "/library/export",
    responses(
        (status = 200, description = "Worlds, guests, staff and history in one document")
    )
)]
pub async fn export_library(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.library.export())
}

/// Import a library document. Only the collections present in the document
/// are replaced; absent keys leave the stored files untouched.
#[utoipa::path(
    post,
    path = "/library/import",
    responses(
        (status = 200, description = "Library state after the import"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn import_library(
    State(state): State<Arc<AppState>>,
    Json(document): Json<LibraryExport>,
) -> Result<impl IntoResponse, ApiError> {
    state.library.import(document)?;
    Ok(Json(state.library.export()))
}

/// Roll random world seed parameters.
#[utoipa::path(
    get,
    path = "/catalog/world",
    responses(
        (status = 200, description = "Randomized world parameters", body = WorldParamsPayload)
    )
)]
pub async fn roll_world() -> Json<WorldParamsPayload> {
    Json(catalog::random_world_params().into())
}

/// Roll random guest seed parameters.
#[utoipa::path(
    get,
    path = "/catalog/guest",
    responses(
        (status = 200, description = "Randomized guest parameters", body = GuestParamsPayload)
    )
)]
pub async fn roll_guest() -> Json<GuestParamsPayload> {
    Json(catalog::random_guest_params().into())
}

/// Roll random staff seed parameters.
#[utoipa::path(
    get,
    path = "/catalog/staff",
    responses(
        (status = 200, description = "Randomized staff parameters", body = StaffParamsPayload)
    )
)]
pub async fn roll_staff() -> Json<StaffParamsPayload> {
    Json(catalog::random_staff_params().into())
}

/// The self-assessment statements, in display order.
#[utoipa::path(
    get,
    path = "/survey/items",
    responses(
        (status = 200, description = "Survey statements", body = SurveyItemsView)
    )
)]
pub async fn survey_items() -> Json<SurveyItemsView> {
    Json(SurveyItemsView {
        items: survey::ITEMS.iter().map(|item| item.to_string()).collect(),
    })
}
