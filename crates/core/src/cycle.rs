//! Conversation turns.
//!
//! The per-turn half of the engine: player input (typed or spoken) goes to
//! the model, the reply lands in the transcript, and a voice clip is queued
//! when synthesis is available. Observer mode replaces player input with a
//! scripted cue and splits the model's output into its two characters.

use std::hash::{DefaultHasher, Hash, Hasher};

use tracing::{debug, warn};

use crate::gateway::{SpeechError, clean_payload};
use crate::instruction;
use crate::nav::{EngineError, SessionEngine, TurnInput};
use crate::profile::PlayerRole;
use crate::session::{AudioClip, CastMember, Page, SessionState, Turn};
use crate::voice::{self, SpeakStyle};

fn digest(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Decodes one observer-script line, `{"role": ..., "content": ...}`.
/// Returns `None` for anything that should fall back to narration.
fn parse_cast_line(raw: &str) -> Option<(CastMember, String)> {
    let cleaned = clean_payload(raw);
    let value: serde_json::Value = serde_json::from_str(&cleaned).ok()?;
    let content = value.get("content")?.as_str()?.trim().to_string();
    if content.is_empty() {
        return None;
    }
    let role = value.get("role")?.as_str()?.to_lowercase();
    if role.contains("guest") || role.contains('客') {
        Some((CastMember::Guest, content))
    } else if role.contains("staff") || role.contains("スタッフ") || role.contains("従業員") {
        Some((CastMember::Staff, content))
    } else {
        None
    }
}

impl SessionEngine {
    /// One player turn. Typed text wins over audio; audio is transcribed
    /// first, with a digest check so the same recording is not replayed by
    /// an impatient client.
    pub(crate) async fn submit_turn(
        &self,
        state: &mut SessionState,
        input: TurnInput,
    ) -> Result<(), EngineError> {
        if state.page != Page::Chat || state.role == PlayerRole::Observer {
            return Err(EngineError::BadTransition(state.page));
        }

        let text = match (input.text, input.audio) {
            (Some(text), _) if !text.trim().is_empty() => text.trim().to_string(),
            (_, Some(audio)) if !audio.is_empty() => {
                let fingerprint = digest(&audio);
                if state.last_audio_digest == Some(fingerprint) {
                    debug!("same audio submitted twice, ignoring");
                    return Ok(());
                }
                let transcribed = self.speech.transcribe(&audio).await?;
                state.last_audio_digest = Some(fingerprint);
                transcribed.trim().to_string()
            }
            _ => return Ok(()),
        };
        if text.is_empty() {
            return Ok(());
        }

        let mut guard = self.conversation.lock().await;
        let Some(conversation) = guard.as_mut() else {
            return Err(EngineError::NoConversation);
        };

        // The player's line stays in the transcript even when the model
        // fails; the turn can then simply be retried.
        state.transcript.push(Turn::user(text.clone()));
        let reply = conversation
            .send(&text)
            .await
            .map_err(EngineError::Generation)?;
        drop(guard);

        state.transcript.push(Turn::assistant(reply.clone()));
        let voice_id = self.ai_speaker_voice(state);
        self.say(state, &reply, &voice_id).await;
        Ok(())
    }

    /// Advances the observer-mode script by one utterance.
    pub(crate) async fn observer_next(
        &self,
        state: &mut SessionState,
    ) -> Result<(), EngineError> {
        if state.page != Page::Chat || state.role != PlayerRole::Observer {
            return Err(EngineError::BadTransition(state.page));
        }

        let raw = {
            let mut guard = self.conversation.lock().await;
            let Some(conversation) = guard.as_mut() else {
                return Err(EngineError::NoConversation);
            };
            conversation
                .send(instruction::CONTINUE_CUE)
                .await
                .map_err(EngineError::Generation)?
        };

        match parse_cast_line(&raw) {
            Some((cast, content)) => {
                state.transcript.push(Turn::cast(cast, content.clone()));
                let voice_id = self.cast_voice(state, cast);
                self.say(state, &content, &voice_id).await;
            }
            None => {
                warn!("observer reply was not a script line, keeping it as narration");
                let cleaned = clean_payload(&raw);
                let text = if cleaned.is_empty() { raw } else { cleaned };
                state.transcript.push(Turn::assistant(text));
            }
        }
        Ok(())
    }

    /// Voice of whoever the model is playing opposite the player, looked up
    /// fresh so edits to the stored profile take effect mid-session.
    fn ai_speaker_voice(&self, state: &SessionState) -> String {
        let stored = match state.role {
            PlayerRole::Staff => state
                .active
                .guest
                .as_ref()
                .and_then(|name| self.library.find_guest(name))
                .and_then(|guest| guest.voice_id),
            PlayerRole::Guest => state
                .active
                .staff
                .as_ref()
                .and_then(|name| self.library.find_staff(name))
                .and_then(|staff| staff.voice_id),
            PlayerRole::Observer => None,
        };
        stored.unwrap_or_else(|| voice::FALLBACK_VOICE.to_string())
    }

    fn cast_voice(&self, state: &SessionState, cast: CastMember) -> String {
        let stored = match cast {
            CastMember::Guest => state
                .active
                .guest
                .as_ref()
                .and_then(|name| self.library.find_guest(name))
                .and_then(|guest| guest.voice_id),
            CastMember::Staff => state
                .active
                .staff
                .as_ref()
                .and_then(|name| self.library.find_staff(name))
                .and_then(|staff| staff.voice_id),
        };
        stored.unwrap_or_else(|| voice::FALLBACK_VOICE.to_string())
    }

    /// Queues a voice clip for the given text. Synthesis problems never fail
    /// the turn; the session just stays silent.
    pub(crate) async fn say(&self, state: &mut SessionState, text: &str, voice_id: &str) {
        let style = SpeakStyle::for_reply(text);
        match self.speech.synthesize(text, voice_id, style).await {
            Ok(data) if data.is_empty() => {}
            Ok(data) => state.pending_audio.put(AudioClip::new(voice_id, style, data)),
            Err(SpeechError::Disabled) => debug!("speech not configured, turn stays silent"),
            Err(err) => warn!(%err, "synthesis failed, continuing without audio"),
        }
    }
}
