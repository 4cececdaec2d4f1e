//! In-memory session state.
//!
//! One [`SessionState`] models everything the player sees: which page is
//! open, which profiles are active, the draft being edited, the running
//! transcript, survey results, and the one-shot audio mailbox. It holds no
//! I/O; the engine in [`crate::nav`] mutates it.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::profile::{Guest, PlayerRole, Staff, World};
use crate::rating::RatingChange;
use crate::review::Evaluation;
use crate::voice::SpeakStyle;

/// The page the session currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Dashboard,
    World,
    Guest,
    Staff,
    ModeSelect,
    PreTestGate,
    PreTest,
    Chat,
    Eval,
    History,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Page::Dashboard => "dashboard",
            Page::World => "world",
            Page::Guest => "guest",
            Page::Staff => "staff",
            Page::ModeSelect => "mode_select",
            Page::PreTestGate => "pre_test_gate",
            Page::PreTest => "pre_test",
            Page::Chat => "chat",
            Page::Eval => "eval",
            Page::History => "history",
        };
        write!(f, "{name}")
    }
}

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// In observer mode the assistant voices both characters; this says which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CastMember {
    Guest,
    Staff,
}

/// One utterance in the transcript.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub speaker: Speaker,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<CastMember>,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            cast: None,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            cast: None,
            text: text.into(),
        }
    }

    pub fn cast(cast: CastMember, text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            cast: Some(cast),
            text: text.into(),
        }
    }
}

/// One synthesized utterance waiting to be fetched.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub id: Uuid,
    pub voice: String,
    pub style: SpeakStyle,
    pub data: Vec<u8>,
}

impl AudioClip {
    pub fn new(voice: impl Into<String>, style: SpeakStyle, data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            voice: voice.into(),
            style,
            data,
        }
    }
}

/// Single-slot mailbox for synthesized audio. A new clip replaces any
/// unfetched one; fetching empties the slot.
#[derive(Debug, Default)]
pub struct AudioSlot(Option<AudioClip>);

impl AudioSlot {
    pub fn put(&mut self, clip: AudioClip) {
        self.0 = Some(clip);
    }

    pub fn take(&mut self) -> Option<AudioClip> {
        self.0.take()
    }

    pub fn is_pending(&self) -> bool {
        self.0.is_some()
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}

/// Names of the profiles selected for the next scenario.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    pub world: Option<String>,
    pub guest: Option<String>,
    pub staff: Option<String>,
}

/// Freshly generated profiles awaiting save or discard, one per editor.
#[derive(Debug, Default)]
pub struct Drafts {
    pub world: Option<World>,
    pub guest: Option<Guest>,
    pub staff: Option<Staff>,
}

/// A completed self-assessment.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyResult {
    pub answers: Vec<u8>,
    pub score: u8,
}

/// Everything one training session carries between requests.
#[derive(Debug)]
pub struct SessionState {
    pub id: Uuid,
    pub page: Page,
    pub role: PlayerRole,
    pub active: ActiveSet,
    pub drafts: Drafts,
    pub transcript: Vec<Turn>,
    pub evaluation: Option<Evaluation>,
    pub rating_change: Option<RatingChange>,
    pub pre_test: Option<SurveyResult>,
    pub post_test: Option<SurveyResult>,
    pub pre_test_skipped: bool,
    pub pending_audio: AudioSlot,
    pub last_audio_digest: Option<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            page: Page::Dashboard,
            role: PlayerRole::default(),
            active: ActiveSet::default(),
            drafts: Drafts::default(),
            transcript: Vec::new(),
            evaluation: None,
            rating_change: None,
            pre_test: None,
            post_test: None,
            pre_test_skipped: false,
            pending_audio: AudioSlot::default(),
            last_audio_digest: None,
        }
    }

    /// Wipes everything belonging to a previous run and locks in the role
    /// for the next one. Active selections and drafts survive.
    pub fn begin_scenario(&mut self, role: PlayerRole) {
        self.role = role;
        self.transcript.clear();
        self.evaluation = None;
        self.rating_change = None;
        self.pre_test = None;
        self.post_test = None;
        self.pre_test_skipped = false;
        self.pending_audio.clear();
        self.last_audio_digest = None;
    }

    /// Back to the dashboard with all per-run state dropped.
    pub fn reset_to_dashboard(&mut self) {
        self.page = Page::Dashboard;
        self.transcript.clear();
        self.evaluation = None;
        self.rating_change = None;
        self.pre_test = None;
        self.post_test = None;
        self.pre_test_skipped = false;
        self.pending_audio.clear();
        self.last_audio_digest = None;
    }

    /// Flattens the transcript into labeled lines for the evaluator, naming
    /// the player's side explicitly.
    pub fn render_transcript(&self) -> String {
        let mut lines = Vec::with_capacity(self.transcript.len());
        for turn in &self.transcript {
            let label = match (self.role, turn.speaker, turn.cast) {
                (PlayerRole::Observer, _, Some(CastMember::Guest)) => "お客様",
                (PlayerRole::Observer, _, Some(CastMember::Staff)) => "スタッフ",
                (PlayerRole::Observer, _, None) => "ナレーション",
                (PlayerRole::Staff, Speaker::User, _) => "スタッフ(プレイヤー)",
                (PlayerRole::Staff, Speaker::Assistant, _) => "お客様",
                (PlayerRole::Guest, Speaker::User, _) => "お客様(プレイヤー)",
                (PlayerRole::Guest, Speaker::Assistant, _) => "スタッフ",
            };
            lines.push(format!("{label}: {}", turn.text));
        }
        lines.join("\n")
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_slot_yields_each_clip_once() {
        let mut slot = AudioSlot::default();
        assert!(!slot.is_pending());
        slot.put(AudioClip::new("v", SpeakStyle::CustomerService, vec![1, 2]));
        assert!(slot.is_pending());
        assert!(slot.take().is_some());
        assert!(slot.take().is_none());

        // A newer clip replaces an unfetched one.
        slot.put(AudioClip::new("v", SpeakStyle::CustomerService, vec![1]));
        slot.put(AudioClip::new("v", SpeakStyle::Empathetic, vec![2]));
        let clip = slot.take().expect("clip");
        assert_eq!(clip.data, vec![2]);
    }

    #[test]
    fn test_begin_scenario_clears_run_state_keeps_selection() {
        let mut state = SessionState::new();
        state.active.world = Some("古都".to_string());
        state.transcript.push(Turn::user("こんにちは"));
        state.pre_test = Some(SurveyResult {
            answers: vec![50; 10],
            score: 50,
        });
        state.pre_test_skipped = true;
        state
            .pending_audio
            .put(AudioClip::new("v", SpeakStyle::CustomerService, vec![1]));

        state.begin_scenario(PlayerRole::Guest);
        assert_eq!(state.role, PlayerRole::Guest);
        assert!(state.transcript.is_empty());
        assert!(state.pre_test.is_none());
        assert!(!state.pre_test_skipped);
        assert!(!state.pending_audio.is_pending());
        assert_eq!(state.active.world.as_deref(), Some("古都"));
    }

    #[test]
    fn test_render_transcript_labels_follow_role() {
        let mut state = SessionState::new();
        state.role = PlayerRole::Staff;
        state.transcript.push(Turn::assistant("部屋が汚い!"));
        state.transcript.push(Turn::user("申し訳ございません。"));
        let rendered = state.render_transcript();
        assert_eq!(
            rendered,
            "お客様: 部屋が汚い!\nスタッフ(プレイヤー): 申し訳ございません。"
        );

        state.role = PlayerRole::Guest;
        assert!(state.render_transcript().starts_with("スタッフ: "));

        state.role = PlayerRole::Observer;
        state.transcript.clear();
        state.transcript.push(Turn::assistant("(客が現れる)"));
        state
            .transcript
            .push(Turn::cast(CastMember::Guest, "騒音がひどい!"));
        state
            .transcript
            .push(Turn::cast(CastMember::Staff, "申し訳ございません。"));
        let rendered = state.render_transcript();
        assert!(rendered.starts_with("ナレーション: "));
        assert!(rendered.contains("お客様: 騒音がひどい!"));
        assert!(rendered.contains("スタッフ: 申し訳ございません。"));
    }
}
