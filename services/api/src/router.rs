//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        AudioResponse, ErrorResponse, GenderDto, GuestParamsPayload, KindDto, ModePayload,
        NavTargetDto, NavigatePayload, RatingChangeView, RoleDto, SelectionView, SessionView,
        StaffParamsPayload, SurveyItemsView, SurveyPayload, SurveyView, TurnPayload, TurnView,
        WorldParamsPayload,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_session,
        handlers::navigate,
        handlers::go_back,
        handlers::quick_play,
        handlers::choose_mode,
        handlers::take_pre_test,
        handlers::skip_pre_test,
        handlers::submit_pre_test,
        handlers::submit_turn,
        handlers::observer_next,
        handlers::end_chat,
        handlers::evaluate,
        handlers::submit_post_test,
        handlers::return_to_dashboard,
        handlers::take_audio,
        handlers::generate_world,
        handlers::generate_guest,
        handlers::generate_staff,
        handlers::save_draft,
        handlers::discard_draft,
        handlers::activate_profile,
        handlers::delete_profile,
        handlers::list_worlds,
        handlers::list_guests,
        handlers::list_staff,
        handlers::list_history,
        handlers::export_library,
        handlers::import_library,
        handlers::roll_world,
        handlers::roll_guest,
        handlers::roll_staff,
        handlers::survey_items,
    ),
    components(
        schemas(
            SessionView,
            SelectionView,
            TurnView,
            RatingChangeView,
            SurveyView,
            AudioResponse,
            SurveyItemsView,
            ErrorResponse,
            NavigatePayload,
            ModePayload,
            SurveyPayload,
            TurnPayload,
            WorldParamsPayload,
            GuestParamsPayload,
            StaffParamsPayload,
            NavTargetDto,
            RoleDto,
            KindDto,
            GenderDto
        )
    ),
    tags(
        (name = "WATAI API", description = "Hotel customer-service role-play training")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/session", get(handlers::get_session))
        .route("/session/navigate", post(handlers::navigate))
        .route("/session/back", post(handlers::go_back))
        .route("/session/quick-play", post(handlers::quick_play))
        .route("/session/mode", post(handlers::choose_mode))
        .route("/session/pre-test", post(handlers::submit_pre_test))
        .route("/session/pre-test/take", post(handlers::take_pre_test))
        .route("/session/pre-test/skip", post(handlers::skip_pre_test))
        .route("/session/turn", post(handlers::submit_turn))
        .route("/session/observer/next", post(handlers::observer_next))
        .route("/session/end-chat", post(handlers::end_chat))
        .route("/session/evaluate", post(handlers::evaluate))
        .route("/session/post-test", post(handlers::submit_post_test))
        .route("/session/return", post(handlers::return_to_dashboard))
        .route("/session/audio", get(handlers::take_audio))
        .route("/session/draft/{kind}/save", post(handlers::save_draft))
        .route(
            "/session/draft/{kind}/discard",
            post(handlers::discard_draft),
        )
        .route("/worlds", get(handlers::list_worlds))
        .route("/worlds/generate", post(handlers::generate_world))
        .route("/guests", get(handlers::list_guests))
        .route("/guests/generate", post(handlers::generate_guest))
        .route("/staff", get(handlers::list_staff))
        .route("/staff/generate", post(handlers::generate_staff))
        .route(
            "/profiles/{kind}/{name}/activate",
            post(handlers::activate_profile),
        )
        .route("/profiles/{kind}/{name}", delete(handlers::delete_profile))
        .route("/history", get(handlers::list_history))
        .route("/library/export", get(handlers::export_library))
        .route("/library/import", post(handlers::import_library))
        .route("/catalog/world", get(handlers::roll_world))
        .route("/catalog/guest", get(handlers::roll_guest))
        .route("/catalog/staff", get(handlers::roll_staff))
        .route("/survey/items", get(handlers::survey_items))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
