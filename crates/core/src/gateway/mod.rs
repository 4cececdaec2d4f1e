//! Upstream service boundaries.
//!
//! Three traits isolate the simulator from its providers: profile and
//! dialogue generation, post-session evaluation, and speech. Each has a
//! live implementation and an offline one, so the whole engine runs without
//! network credentials.

pub mod azure;
pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

use crate::catalog;
use crate::instruction;
use crate::profile::{self, Gender, Guest, PlayerRole, Staff, World};
use crate::review::Evaluation;
use crate::voice::SpeakStyle;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```(?:json|JSON)?").unwrap());
static BRACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Failure talking to a generation or evaluation model.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("model request failed: {0}")]
    Upstream(String),
    #[error("model returned an unusable payload: {reason}")]
    Malformed { reason: String },
}

/// Failure in the speech pipeline.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech request failed: {0}")]
    Upstream(String),
    #[error("speech was not recognized: {0}")]
    Unrecognized(String),
    #[error("speech support is not configured")]
    Disabled,
}

/// Strips markdown code fences the model sometimes wraps around JSON.
pub fn clean_payload(raw: &str) -> String {
    FENCE_RE.replace_all(raw, "").trim().to_string()
}

fn snippet(text: &str) -> String {
    let mut short: String = text.chars().take(80).collect();
    if short.len() < text.len() {
        short.push('…');
    }
    short
}

fn extract_value(raw: &str) -> Result<Value, GatewayError> {
    let cleaned = clean_payload(raw);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }
    // Chatty models prepend prose; salvage the outermost braces.
    if let Some(found) = BRACES_RE.find(&cleaned) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            return Ok(value);
        }
    }
    Err(GatewayError::Malformed {
        reason: format!("not valid JSON: {}", snippet(&cleaned)),
    })
}

/// Decodes one JSON object from raw model output into a profile type.
///
/// Tolerates code fences, surrounding prose, and a single-element array
/// wrapper. Anything that is not ultimately one object is [`GatewayError::Malformed`].
pub fn decode_profile<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, GatewayError> {
    let value = match extract_value(raw)? {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Err(GatewayError::Malformed {
                    reason: "empty array".to_string(),
                });
            }
            items.swap_remove(0)
        }
        value => value,
    };
    if !value.is_object() {
        return Err(GatewayError::Malformed {
            reason: format!("expected an object, got {}", snippet(&value.to_string())),
        });
    }
    serde_json::from_value(value).map_err(|err| GatewayError::Malformed {
        reason: err.to_string(),
    })
}

/// Seed parameters for world generation, rolled by [`catalog`] or edited by
/// hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub season: String,
    pub stars: f64,
    pub facilities: String,
    pub policy: String,
    pub condition: String,
    pub difficulty: String,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: String::new(),
            season: String::new(),
            stars: 3.5,
            facilities: String::new(),
            policy: String::new(),
            condition: String::new(),
            difficulty: String::new(),
        }
    }
}

/// Seed parameters for guest generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestParams {
    pub name: String,
    pub gender: Option<Gender>,
    pub job: String,
    pub age: String,
    pub booking_channel: String,
    pub date_context: String,
    pub incident: String,
    pub severity: u8,
    pub vip_level: String,
    pub initial_mood: String,
}

impl Default for GuestParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            gender: None,
            job: String::new(),
            age: String::new(),
            booking_channel: String::new(),
            date_context: instruction::DEFAULT_DATE_CONTEXT.to_string(),
            incident: String::new(),
            severity: 3,
            vip_level: String::new(),
            initial_mood: "普通 (Normal)".to_string(),
        }
    }
}

impl GuestParams {
    /// Initial anger for this guest, from complaint severity and mood plus
    /// the caller's jitter.
    pub fn seed_anger(&self, jitter: i8) -> u8 {
        profile::anger_seed(self.severity, &self.initial_mood, jitter)
    }
}

/// Seed parameters for staff generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffParams {
    pub name: String,
    pub gender: Gender,
    pub role: String,
    pub experience: String,
    pub weakness: String,
}

impl StaffParams {
    /// Fills in a gender-appropriate name when none was given.
    pub fn ensure_name(&mut self) {
        if self.name.trim().is_empty() {
            self.name = catalog::random_staff_name(self.gender);
        }
    }
}

/// Produces profiles and opens role-play conversations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Generates a full [`World`] from the given seed parameters.
    async fn generate_world(&self, params: &WorldParams) -> Result<World, GatewayError>;

    /// Generates a full [`Guest`], including a seeded initial anger level.
    async fn generate_guest(&self, params: &GuestParams) -> Result<Guest, GatewayError>;

    /// Generates a full [`Staff`] member.
    async fn generate_staff(&self, params: &StaffParams) -> Result<Staff, GatewayError>;

    /// Starts a stateful dialogue under the given system instruction.
    async fn open_conversation(
        &self,
        instruction: &str,
    ) -> Result<Box<dyn Conversation>, GatewayError>;
}

/// One in-progress dialogue. Implementations keep their own history.
#[async_trait]
pub trait Conversation: Send {
    async fn send(&mut self, message: &str) -> Result<String, GatewayError>;
}

/// Scores a finished transcript into an [`Evaluation`] document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvaluationGateway: Send + Sync {
    async fn evaluate(&self, transcript: &str, role: PlayerRole)
    -> Result<Evaluation, GatewayError>;
}

/// Text-to-speech and speech-to-text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechGateway: Send + Sync {
    /// Renders one utterance as audio. An empty result means "no clip".
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        style: SpeakStyle,
    ) -> Result<Vec<u8>, SpeechError>;

    /// Transcribes recorded player audio to text.
    async fn transcribe(&self, audio: &[u8]) -> Result<String, SpeechError>;
}
