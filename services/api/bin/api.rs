//! Main Entrypoint for the WATAI API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Opening the profile library on disk.
//! 3. Initializing the generation, evaluation and speech gateways.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use watai_api::{
    config::{Config, GatewayProvider},
    router::create_router,
    state::AppState,
};
use watai_core::{
    gateway::{
        EvaluationGateway, GenerationGateway, SpeechGateway,
        azure::AzureSpeech,
        gemini::{GEMINI_OPENAI_BASE, GeminiGateway},
        mock::{MockEvaluation, MockGeneration, SilentSpeech},
    },
    nav::SessionEngine,
    session::SessionState,
    store::Library,
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Open the Profile Library ---
    let library = Arc::new(
        Library::open(config.data_dir.clone()).context("Failed to open the profile library")?,
    );
    info!(data_dir = %config.data_dir.display(), "Profile library ready.");

    // --- 4. Initialize Gateways ---
    let (generation, evaluation): (Arc<dyn GenerationGateway>, Arc<dyn EvaluationGateway>) =
        match &config.provider {
            GatewayProvider::Gemini => {
                info!("Using Gemini provider.");
                let api_key = config
                    .gemini_api_key
                    .as_ref()
                    .context("GEMINI_API_KEY must be set for the gemini provider")?;
                let openai_config = OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base(GEMINI_OPENAI_BASE);
                let gateway = Arc::new(GeminiGateway::new(
                    openai_config,
                    config.chat_model.clone(),
                ));
                (gateway.clone(), gateway)
            }
            GatewayProvider::Mock => {
                info!("Using offline mock provider.");
                (Arc::new(MockGeneration), Arc::new(MockEvaluation))
            }
        };

    let speech: Arc<dyn SpeechGateway> = match &config.azure_speech_key {
        Some(key) => {
            info!(region = %config.azure_speech_region, "Azure speech enabled.");
            Arc::new(AzureSpeech::new(
                key.clone(),
                config.azure_speech_region.clone(),
            ))
        }
        None => {
            info!("No speech key configured. Voice features are disabled.");
            Arc::new(SilentSpeech)
        }
    };

    let engine = Arc::new(SessionEngine::new(
        Arc::clone(&library),
        generation,
        evaluation,
        speech,
    ));

    let app_state = Arc::new(AppState {
        library,
        engine,
        session: Arc::new(Mutex::new(SessionState::new())),
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
