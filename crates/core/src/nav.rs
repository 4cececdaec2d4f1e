//! The session engine.
//!
//! Every player action is an [`Event`] dispatched against one
//! [`SessionState`]. The engine owns the gateways and the library handle,
//! keeps the single in-flight conversation, and is the only place page
//! transitions happen, so the reachable flow is auditable in one match.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::catalog;
use crate::gateway::{
    Conversation, EvaluationGateway, GatewayError, GenerationGateway, GuestParams, SpeechError,
    SpeechGateway, StaffParams, WorldParams,
};
use crate::instruction;
use crate::profile::{self, Guest, HistoryEntry, PlayerRole, Staff, World};
use crate::rating;
use crate::session::{Page, SessionState, SurveyResult, Turn};
use crate::store::{Library, StoreError};
use crate::survey;
use crate::voice;

/// Pages reachable directly from the navigation rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavTarget {
    Dashboard,
    World,
    Guest,
    Staff,
    ModeSelect,
    History,
}

impl NavTarget {
    pub fn page(self) -> Page {
        match self {
            NavTarget::Dashboard => Page::Dashboard,
            NavTarget::World => Page::World,
            NavTarget::Guest => Page::Guest,
            NavTarget::Staff => Page::Staff,
            NavTarget::ModeSelect => Page::ModeSelect,
            NavTarget::History => Page::History,
        }
    }
}

/// Which of the three profile collections an event addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    World,
    Guest,
    Staff,
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileKind::World => write!(f, "world"),
            ProfileKind::Guest => write!(f, "guest"),
            ProfileKind::Staff => write!(f, "staff"),
        }
    }
}

/// One player turn: typed text, recorded audio, or both (text wins).
#[derive(Debug, Default)]
pub struct TurnInput {
    pub text: Option<String>,
    pub audio: Option<Vec<u8>>,
}

/// Everything the player can do, across all pages.
#[derive(Debug)]
pub enum Event {
    Navigate(NavTarget),
    QuickPlay,
    GenerateWorld(WorldParams),
    GenerateGuest(GuestParams),
    GenerateStaff(StaffParams),
    SaveDraft(ProfileKind),
    DiscardDraft(ProfileKind),
    Activate { kind: ProfileKind, name: String },
    Delete { kind: ProfileKind, name: String },
    ChooseMode(PlayerRole),
    TakeTest,
    SkipTest,
    SubmitPreTest(Vec<u8>),
    SubmitTurn(TurnInput),
    ObserverNext,
    EndChat,
    Evaluate,
    SubmitPostTest(Vec<u8>),
    ReturnToDashboard,
    Back,
}

fn slots_label(world: bool, guest: bool, staff: bool) -> String {
    let mut missing = Vec::new();
    if world {
        missing.push("world");
    }
    if guest {
        missing.push("guest");
    }
    if staff {
        missing.push("staff");
    }
    missing.join(", ")
}

/// Engine-level failure. Gateway and store causes stay visible so callers
/// can map them onto transport status codes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("generation failed: {0}")]
    Generation(#[source] GatewayError),
    #[error("evaluation failed: {0}")]
    Evaluation(#[source] GatewayError),
    #[error(transparent)]
    Speech(#[from] SpeechError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no active selection for: {}", slots_label(*world, *guest, *staff))]
    MissingSelection {
        world: bool,
        guest: bool,
        staff: bool,
    },
    #[error("no {kind} profile named {name}")]
    UnknownProfile { kind: ProfileKind, name: String },
    #[error("action is not available on the {0} page")]
    BadTransition(Page),
    #[error("survey needs {expected} answers, got {got}")]
    IncompleteSurvey { expected: usize, got: usize },
    #[error("no conversation in progress")]
    NoConversation,
}

/// Owns the gateways and dispatches events against session state.
pub struct SessionEngine {
    pub(crate) library: Arc<Library>,
    pub(crate) generation: Arc<dyn GenerationGateway>,
    pub(crate) evaluation: Arc<dyn EvaluationGateway>,
    pub(crate) speech: Arc<dyn SpeechGateway>,
    pub(crate) conversation: Mutex<Option<Box<dyn Conversation>>>,
}

impl SessionEngine {
    pub fn new(
        library: Arc<Library>,
        generation: Arc<dyn GenerationGateway>,
        evaluation: Arc<dyn EvaluationGateway>,
        speech: Arc<dyn SpeechGateway>,
    ) -> Self {
        Self {
            library,
            generation,
            evaluation,
            speech,
            conversation: Mutex::new(None),
        }
    }

    #[instrument(name = "dispatch", skip_all, fields(page = %state.page))]
    pub async fn dispatch(
        &self,
        state: &mut SessionState,
        event: Event,
    ) -> Result<(), EngineError> {
        match event {
            Event::Navigate(target) => {
                state.page = target.page();
                Ok(())
            }
            Event::QuickPlay => self.quick_play(state).await,
            Event::GenerateWorld(params) => self.generate_world(state, params).await,
            Event::GenerateGuest(params) => self.generate_guest(state, params).await,
            Event::GenerateStaff(params) => self.generate_staff(state, params).await,
            Event::SaveDraft(kind) => self.save_draft(state, kind),
            Event::DiscardDraft(kind) => {
                match kind {
                    ProfileKind::World => state.drafts.world = None,
                    ProfileKind::Guest => state.drafts.guest = None,
                    ProfileKind::Staff => state.drafts.staff = None,
                }
                Ok(())
            }
            Event::Activate { kind, name } => self.activate(state, kind, &name),
            Event::Delete { kind, name } => self.delete(state, kind, &name),
            Event::ChooseMode(role) => self.choose_mode(state, role),
            Event::TakeTest => {
                if state.page != Page::PreTestGate {
                    return Err(EngineError::BadTransition(state.page));
                }
                state.page = Page::PreTest;
                Ok(())
            }
            Event::SkipTest => {
                if state.page != Page::PreTestGate {
                    return Err(EngineError::BadTransition(state.page));
                }
                state.pre_test_skipped = true;
                self.enter_chat(state).await
            }
            Event::SubmitPreTest(answers) => self.submit_pre_test(state, answers).await,
            Event::SubmitTurn(input) => self.submit_turn(state, input).await,
            Event::ObserverNext => self.observer_next(state).await,
            Event::EndChat => {
                if state.page != Page::Chat {
                    return Err(EngineError::BadTransition(state.page));
                }
                state.page = Page::Eval;
                Ok(())
            }
            Event::Evaluate => self.evaluate(state).await,
            Event::SubmitPostTest(answers) => self.submit_post_test(state, answers),
            Event::ReturnToDashboard => {
                *self.conversation.lock().await = None;
                state.reset_to_dashboard();
                Ok(())
            }
            Event::Back => Self::back(state),
        }
    }

    fn back(state: &mut SessionState) -> Result<(), EngineError> {
        state.page = match state.page {
            Page::Dashboard => Page::Dashboard,
            Page::World | Page::Guest | Page::Staff | Page::ModeSelect | Page::History => {
                Page::Dashboard
            }
            Page::PreTestGate => Page::ModeSelect,
            Page::PreTest => Page::PreTestGate,
            // Chat ends through EndChat, eval through ReturnToDashboard.
            Page::Chat | Page::Eval => return Err(EngineError::BadTransition(state.page)),
        };
        Ok(())
    }

    /// Generates and saves a full scenario in one step, then jumps straight
    /// to mode selection. Nothing is persisted unless all three profiles
    /// came back usable.
    async fn quick_play(&self, state: &mut SessionState) -> Result<(), EngineError> {
        let world = self
            .generation
            .generate_world(&catalog::random_world_params())
            .await
            .map_err(EngineError::Generation)?;

        let mut staff_params = catalog::random_staff_params();
        staff_params.ensure_name();
        let mut staff = self
            .generation
            .generate_staff(&staff_params)
            .await
            .map_err(EngineError::Generation)?;

        let mut guest = self
            .generation
            .generate_guest(&catalog::random_guest_params())
            .await
            .map_err(EngineError::Generation)?;

        if world.name.trim().is_empty()
            || guest.name.trim().is_empty()
            || staff.name.trim().is_empty()
        {
            return Err(EngineError::Generation(GatewayError::Malformed {
                reason: "generated profile has no name".to_string(),
            }));
        }

        if guest.voice_id.is_none() {
            guest.voice_id = Some(voice::pick(guest.gender));
        }
        if staff.voice_id.is_none() {
            staff.voice_id = Some(voice::pick(staff.gender));
        }

        let (world_name, guest_name, staff_name) =
            (world.name.clone(), guest.name.clone(), staff.name.clone());
        self.library.upsert_world(world)?;
        self.library.upsert_staff(staff)?;
        self.library.upsert_guest(guest)?;

        info!(world = %world_name, guest = %guest_name, staff = %staff_name, "quick play scenario ready");
        state.active.world = Some(world_name);
        state.active.guest = Some(guest_name);
        state.active.staff = Some(staff_name);
        state.page = Page::ModeSelect;
        Ok(())
    }

    async fn generate_world(
        &self,
        state: &mut SessionState,
        params: WorldParams,
    ) -> Result<(), EngineError> {
        let world = self
            .generation
            .generate_world(&params)
            .await
            .map_err(EngineError::Generation)?;
        state.drafts.world = Some(world);
        Ok(())
    }

    async fn generate_guest(
        &self,
        state: &mut SessionState,
        params: GuestParams,
    ) -> Result<(), EngineError> {
        let mut guest = self
            .generation
            .generate_guest(&params)
            .await
            .map_err(EngineError::Generation)?;
        if guest.voice_id.is_none() {
            guest.voice_id = Some(voice::pick(guest.gender));
        }
        state.drafts.guest = Some(guest);
        Ok(())
    }

    async fn generate_staff(
        &self,
        state: &mut SessionState,
        mut params: StaffParams,
    ) -> Result<(), EngineError> {
        params.ensure_name();
        let mut staff = self
            .generation
            .generate_staff(&params)
            .await
            .map_err(EngineError::Generation)?;
        if staff.voice_id.is_none() {
            staff.voice_id = Some(voice::pick(staff.gender));
        }
        state.drafts.staff = Some(staff);
        Ok(())
    }

    /// Persists the pending draft and makes it the active selection. With no
    /// draft, or a draft that has no name yet, this quietly does nothing; the
    /// draft stays for further editing.
    fn save_draft(&self, state: &mut SessionState, kind: ProfileKind) -> Result<(), EngineError> {
        match kind {
            ProfileKind::World => {
                let Some(world) = state.drafts.world.as_ref() else {
                    return Ok(());
                };
                if world.name.trim().is_empty() {
                    return Ok(());
                }
                let name = world.name.clone();
                self.library.upsert_world(world.clone())?;
                state.active.world = Some(name);
                state.drafts.world = None;
            }
            ProfileKind::Guest => {
                let Some(guest) = state.drafts.guest.as_ref() else {
                    return Ok(());
                };
                if guest.name.trim().is_empty() {
                    return Ok(());
                }
                let name = guest.name.clone();
                self.library.upsert_guest(guest.clone())?;
                state.active.guest = Some(name);
                state.drafts.guest = None;
            }
            ProfileKind::Staff => {
                let Some(staff) = state.drafts.staff.as_ref() else {
                    return Ok(());
                };
                if staff.name.trim().is_empty() {
                    return Ok(());
                }
                let name = staff.name.clone();
                self.library.upsert_staff(staff.clone())?;
                state.active.staff = Some(name);
                state.drafts.staff = None;
            }
        }
        Ok(())
    }

    fn activate(
        &self,
        state: &mut SessionState,
        kind: ProfileKind,
        name: &str,
    ) -> Result<(), EngineError> {
        let exists = match kind {
            ProfileKind::World => self.library.find_world(name).is_some(),
            ProfileKind::Guest => self.library.find_guest(name).is_some(),
            ProfileKind::Staff => self.library.find_staff(name).is_some(),
        };
        if !exists {
            return Err(EngineError::UnknownProfile {
                kind,
                name: name.to_string(),
            });
        }
        match kind {
            ProfileKind::World => state.active.world = Some(name.to_string()),
            ProfileKind::Guest => state.active.guest = Some(name.to_string()),
            ProfileKind::Staff => state.active.staff = Some(name.to_string()),
        }
        Ok(())
    }

    fn delete(
        &self,
        state: &mut SessionState,
        kind: ProfileKind,
        name: &str,
    ) -> Result<(), EngineError> {
        match kind {
            ProfileKind::World => self.library.delete_world(name)?,
            ProfileKind::Guest => self.library.delete_guest(name)?,
            ProfileKind::Staff => self.library.delete_staff(name)?,
        }
        let slot = match kind {
            ProfileKind::World => &mut state.active.world,
            ProfileKind::Guest => &mut state.active.guest,
            ProfileKind::Staff => &mut state.active.staff,
        };
        if slot.as_deref() == Some(name) {
            *slot = None;
        }
        info!(%kind, name, "deleted profile");
        Ok(())
    }

    fn active_names(state: &SessionState) -> Result<(String, String, String), EngineError> {
        match (&state.active.world, &state.active.guest, &state.active.staff) {
            (Some(world), Some(guest), Some(staff)) => {
                Ok((world.clone(), guest.clone(), staff.clone()))
            }
            (world, guest, staff) => Err(EngineError::MissingSelection {
                world: world.is_none(),
                guest: guest.is_none(),
                staff: staff.is_none(),
            }),
        }
    }

    fn resolve_profiles(&self, state: &SessionState) -> Result<(World, Guest, Staff), EngineError> {
        let (world_name, guest_name, staff_name) = Self::active_names(state)?;
        let world = self
            .library
            .find_world(&world_name)
            .ok_or(EngineError::UnknownProfile {
                kind: ProfileKind::World,
                name: world_name,
            })?;
        let guest = self
            .library
            .find_guest(&guest_name)
            .ok_or(EngineError::UnknownProfile {
                kind: ProfileKind::Guest,
                name: guest_name,
            })?;
        let staff = self
            .library
            .find_staff(&staff_name)
            .ok_or(EngineError::UnknownProfile {
                kind: ProfileKind::Staff,
                name: staff_name,
            })?;
        Ok((world, guest, staff))
    }

    /// Locks in the role for the next run. Requires all three selections to
    /// resolve against the library first.
    fn choose_mode(&self, state: &mut SessionState, role: PlayerRole) -> Result<(), EngineError> {
        self.resolve_profiles(state)?;
        state.begin_scenario(role);
        state.page = Page::PreTestGate;
        Ok(())
    }

    async fn submit_pre_test(
        &self,
        state: &mut SessionState,
        answers: Vec<u8>,
    ) -> Result<(), EngineError> {
        if state.page != Page::PreTest {
            return Err(EngineError::BadTransition(state.page));
        }
        let score = survey::score(&answers).ok_or(EngineError::IncompleteSurvey {
            expected: survey::ITEM_COUNT,
            got: answers.len(),
        })?;
        state.pre_test = Some(SurveyResult { answers, score });
        self.enter_chat(state).await
    }

    /// Builds the role-specific instruction, opens the conversation, and
    /// speaks the opening line.
    async fn enter_chat(&self, state: &mut SessionState) -> Result<(), EngineError> {
        let (world, guest, staff) = self.resolve_profiles(state)?;
        let prompt = match state.role {
            PlayerRole::Staff => {
                instruction::staff_mode(&world, &guest, instruction::DEFAULT_DATE_CONTEXT)
            }
            PlayerRole::Guest => {
                instruction::guest_mode(&world, &staff, instruction::DEFAULT_DATE_CONTEXT)
            }
            PlayerRole::Observer => instruction::observer(&world, &guest, &staff),
        };
        let conversation = self
            .generation
            .open_conversation(&prompt)
            .await
            .map_err(EngineError::Generation)?;
        *self.conversation.lock().await = Some(conversation);

        let opening = instruction::opening_line(state.role, &guest);
        state.transcript.push(Turn::assistant(opening.clone()));

        // The observer opening is narration; it gets no audio.
        match state.role {
            PlayerRole::Staff => {
                let voice = guest
                    .voice_id
                    .clone()
                    .unwrap_or_else(|| voice::FALLBACK_VOICE.to_string());
                self.say(state, &opening, &voice).await;
            }
            PlayerRole::Guest => {
                let voice = staff
                    .voice_id
                    .clone()
                    .unwrap_or_else(|| voice::FALLBACK_VOICE.to_string());
                self.say(state, &opening, &voice).await;
            }
            PlayerRole::Observer => {}
        }

        info!(role = %state.role, world = %world.name, "conversation opened");
        state.page = Page::Chat;
        Ok(())
    }

    /// Scores the finished transcript, archives it, and folds the guest's
    /// satisfaction into the world rating. Idempotent per run; the archive
    /// and rating steps happen only on the first success.
    async fn evaluate(&self, state: &mut SessionState) -> Result<(), EngineError> {
        if state.page != Page::Eval {
            return Err(EngineError::BadTransition(state.page));
        }
        if state.evaluation.is_some() {
            return Ok(());
        }
        if state.transcript.is_empty() {
            return Err(EngineError::NoConversation);
        }

        let transcript = state.render_transcript();
        let report = self
            .evaluation
            .evaluate(&transcript, state.role)
            .await
            .map_err(EngineError::Evaluation)?;
        state.evaluation = Some(report.clone());

        let (world_name, guest_name, staff_name) = match Self::active_names(state) {
            Ok(names) => names,
            Err(_) => (String::new(), String::new(), String::new()),
        };
        let entry = HistoryEntry {
            timestamp: Utc::now(),
            role: state.role,
            world: world_name.clone(),
            guest: guest_name,
            staff: staff_name,
            score: report.manager_review.score,
            satisfaction: report.guest_review.satisfaction.clone(),
            summary: profile::clip_summary(&report.manager_review.overall_comment),
            result: report.clone(),
        };
        self.library.append_history(entry)?;

        if world_name.is_empty() {
            warn!("no active world, skipping rating update");
        } else {
            let stars = rating::parse_stars(&report.guest_review.satisfaction);
            match self.library.update_world_rating(&world_name, stars)? {
                Some(change) => {
                    info!(world = %world_name, old = change.old, new = change.new, "world rating updated");
                    state.rating_change = Some(change);
                }
                None => warn!(world = %world_name, "active world vanished, rating not updated"),
            }
        }

        info!(score = report.manager_review.score, "session evaluated");
        Ok(())
    }

    fn submit_post_test(
        &self,
        state: &mut SessionState,
        answers: Vec<u8>,
    ) -> Result<(), EngineError> {
        if state.page != Page::Eval {
            return Err(EngineError::BadTransition(state.page));
        }
        let score = survey::score(&answers).ok_or(EngineError::IncompleteSurvey {
            expected: survey::ITEM_COUNT,
            got: answers.len(),
        })?;
        state.post_test = Some(SurveyResult { answers, score });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{MockEvaluation, MockGeneration, SilentSpeech};
    use crate::gateway::{
        MockEvaluationGateway, MockGenerationGateway, MockSpeechGateway,
    };
    use crate::review::Evaluation;
    use crate::voice::{FEMALE_VOICES, MALE_VOICES};
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    fn offline_engine() -> (SessionEngine, TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Arc::new(Library::open(dir.path()).expect("open"));
        let engine = SessionEngine::new(
            library,
            Arc::new(MockGeneration),
            Arc::new(MockEvaluation),
            Arc::new(SilentSpeech),
        );
        (engine, dir)
    }

    fn engine_with(
        generation: MockGenerationGateway,
        evaluation: MockEvaluationGateway,
    ) -> (SessionEngine, TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Arc::new(Library::open(dir.path()).expect("open"));
        let mut speech = MockSpeechGateway::new();
        speech.expect_synthesize().returning(|_, _, _| Ok(Vec::new()));
        let engine = SessionEngine::new(
            library,
            Arc::new(generation),
            Arc::new(evaluation),
            Arc::new(speech),
        );
        (engine, dir)
    }

    /// Seeds the library with one profile of each kind and marks them active.
    fn seeded_state(engine: &SessionEngine) -> SessionState {
        engine
            .library
            .upsert_world(World {
                name: "古都".to_string(),
                ..World::default()
            })
            .expect("world");
        engine
            .library
            .upsert_guest(Guest {
                name: "田中".to_string(),
                default_complaint: "部屋が汚い!".to_string(),
                ..Guest::default()
            })
            .expect("guest");
        engine
            .library
            .upsert_staff(Staff {
                name: "斎藤".to_string(),
                ..Staff::default()
            })
            .expect("staff");
        let mut state = SessionState::new();
        state.active.world = Some("古都".to_string());
        state.active.guest = Some("田中".to_string());
        state.active.staff = Some("斎藤".to_string());
        state
    }

    fn report_with_satisfaction(satisfaction: &str) -> Evaluation {
        let mut report = Evaluation::default();
        report.manager_review.score = 90;
        report.manager_review.overall_comment = "よく対応できました。".to_string();
        report.guest_review.satisfaction = satisfaction.to_string();
        report
    }

    #[tokio::test]
    async fn test_navigate_sets_page() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        engine
            .dispatch(&mut state, Event::Navigate(NavTarget::History))
            .await
            .expect("navigate");
        assert_eq!(state.page, Page::History);
    }

    #[tokio::test]
    async fn test_choose_mode_reports_each_missing_slot() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        state.page = Page::ModeSelect;
        state.active.guest = Some("田中".to_string());

        let err = engine
            .dispatch(&mut state, Event::ChooseMode(PlayerRole::Staff))
            .await
            .expect_err("must fail");
        match &err {
            EngineError::MissingSelection {
                world,
                guest,
                staff,
            } => {
                assert!(*world);
                assert!(!*guest);
                assert!(*staff);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("world"));
        assert!(message.contains("staff"));
        assert!(!message.contains("guest"));
        // The failed attempt must not move the page.
        assert_eq!(state.page, Page::ModeSelect);
    }

    #[tokio::test]
    async fn test_quick_play_fills_library_and_selection() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        engine
            .dispatch(&mut state, Event::QuickPlay)
            .await
            .expect("quick play");

        assert_eq!(state.page, Page::ModeSelect);
        assert!(state.active.world.is_some());
        assert!(state.active.guest.is_some());
        assert!(state.active.staff.is_some());
        assert_eq!(engine.library.worlds().len(), 1);
        assert_eq!(engine.library.guests().len(), 1);
        assert_eq!(engine.library.staff().len(), 1);

        let guest_name = state.active.guest.clone().expect("guest name");
        let guest = engine.library.find_guest(&guest_name).expect("stored");
        let voice = guest.voice_id.expect("voice assigned");
        assert!(
            MALE_VOICES.contains(&voice.as_str()) || FEMALE_VOICES.contains(&voice.as_str())
        );
    }

    #[tokio::test]
    async fn test_quick_play_failure_persists_nothing() {
        let mut generation = MockGenerationGateway::new();
        generation
            .expect_generate_world()
            .returning(|_| Ok(World::default()));
        generation
            .expect_generate_staff()
            .returning(|_| Err(GatewayError::Upstream("timeout".to_string())));
        let (engine, _dir) = engine_with(generation, MockEvaluationGateway::new());

        let mut state = SessionState::new();
        let err = engine
            .dispatch(&mut state, Event::QuickPlay)
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("timeout"));
        assert_eq!(state.page, Page::Dashboard);
        assert!(state.active.world.is_none());
        assert!(engine.library.worlds().is_empty());
        assert!(engine.library.staff().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_draft_and_page_alone() {
        let mut generation = MockGenerationGateway::new();
        generation
            .expect_generate_world()
            .returning(|_| Err(GatewayError::Upstream("timeout".to_string())));
        let (engine, _dir) = engine_with(generation, MockEvaluationGateway::new());

        let mut state = SessionState::new();
        state.page = Page::World;
        let err = engine
            .dispatch(&mut state, Event::GenerateWorld(WorldParams::default()))
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::Generation(_)));
        assert!(state.drafts.world.is_none());
        assert_eq!(state.page, Page::World);
    }

    #[tokio::test]
    async fn test_save_draft_persists_activates_and_clears() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        state.page = Page::World;
        engine
            .dispatch(&mut state, Event::GenerateWorld(WorldParams::default()))
            .await
            .expect("generate");
        assert!(state.drafts.world.is_some());

        engine
            .dispatch(&mut state, Event::SaveDraft(ProfileKind::World))
            .await
            .expect("save");
        assert!(state.drafts.world.is_none());
        let active = state.active.world.clone().expect("active world");
        assert!(engine.library.find_world(&active).is_some());
    }

    #[tokio::test]
    async fn test_save_unnamed_draft_keeps_draft() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        state.drafts.guest = Some(Guest::default());

        engine
            .dispatch(&mut state, Event::SaveDraft(ProfileKind::Guest))
            .await
            .expect("save is a no-op");
        assert!(state.drafts.guest.is_some());
        assert!(state.active.guest.is_none());
        assert!(engine.library.guests().is_empty());
    }

    #[tokio::test]
    async fn test_discard_draft_drops_it() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        state.drafts.staff = Some(Staff::default());
        engine
            .dispatch(&mut state, Event::DiscardDraft(ProfileKind::Staff))
            .await
            .expect("discard");
        assert!(state.drafts.staff.is_none());
    }

    #[tokio::test]
    async fn test_activate_unknown_profile_fails() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        let err = engine
            .dispatch(
                &mut state,
                Event::Activate {
                    kind: ProfileKind::World,
                    name: "蜃気楼".to_string(),
                },
            )
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::UnknownProfile { .. }));
        assert!(state.active.world.is_none());
    }

    #[tokio::test]
    async fn test_delete_active_profile_clears_slot() {
        let (engine, _dir) = offline_engine();
        let mut state = seeded_state(&engine);
        engine
            .dispatch(
                &mut state,
                Event::Delete {
                    kind: ProfileKind::Guest,
                    name: "田中".to_string(),
                },
            )
            .await
            .expect("delete");
        assert!(state.active.guest.is_none());
        assert!(engine.library.find_guest("田中").is_none());
        // Other slots untouched.
        assert!(state.active.world.is_some());
    }

    #[tokio::test]
    async fn test_mode_flow_skip_test_opens_chat_with_complaint() {
        let (engine, _dir) = offline_engine();
        let mut state = seeded_state(&engine);
        state.page = Page::ModeSelect;

        engine
            .dispatch(&mut state, Event::ChooseMode(PlayerRole::Staff))
            .await
            .expect("choose");
        assert_eq!(state.page, Page::PreTestGate);

        engine
            .dispatch(&mut state, Event::SkipTest)
            .await
            .expect("skip");
        assert_eq!(state.page, Page::Chat);
        assert!(state.pre_test_skipped);
        assert!(state.pre_test.is_none());
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript[0].text, "部屋が汚い!");
    }

    #[tokio::test]
    async fn test_pre_test_scores_and_opens_chat() {
        let (engine, _dir) = offline_engine();
        let mut state = seeded_state(&engine);
        state.page = Page::ModeSelect;
        engine
            .dispatch(&mut state, Event::ChooseMode(PlayerRole::Staff))
            .await
            .expect("choose");
        engine
            .dispatch(&mut state, Event::TakeTest)
            .await
            .expect("take");
        assert_eq!(state.page, Page::PreTest);

        let err = engine
            .dispatch(&mut state, Event::SubmitPreTest(vec![80; 7]))
            .await
            .expect_err("short survey");
        assert!(matches!(
            err,
            EngineError::IncompleteSurvey {
                expected: 10,
                got: 7
            }
        ));
        assert_eq!(state.page, Page::PreTest);

        engine
            .dispatch(&mut state, Event::SubmitPreTest(vec![80; 10]))
            .await
            .expect("submit");
        let result = state.pre_test.clone().expect("scored");
        assert_eq!(result.score, 80);
        assert_eq!(state.page, Page::Chat);
    }

    #[tokio::test]
    async fn test_evaluate_archives_rates_and_is_idempotent() {
        let mut evaluation = MockEvaluationGateway::new();
        evaluation
            .expect_evaluate()
            .times(1)
            .returning(|_, _| Ok(report_with_satisfaction("5/5")));
        let (engine, _dir) = engine_with(MockGenerationGateway::new(), evaluation);

        let mut state = seeded_state(&engine);
        state.role = PlayerRole::Staff;
        state.page = Page::Eval;
        state.transcript.push(Turn::assistant("部屋が汚い!"));
        state.transcript.push(Turn::user("申し訳ございません。"));

        engine
            .dispatch(&mut state, Event::Evaluate)
            .await
            .expect("evaluate");
        let report = state.evaluation.as_ref().expect("report");
        assert_eq!(report.manager_review.score, 90);

        let history = engine.library.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].world, "古都");
        assert_eq!(history[0].summary, "よく対応できました。");

        let change = state.rating_change.expect("rating change");
        assert_abs_diff_eq!(change.new, 3.18, epsilon = 1e-9);
        let world = engine.library.find_world("古都").expect("world");
        assert_eq!(world.rating_count, Some(11));

        // Second evaluate is a no-op; times(1) above also enforces it.
        engine
            .dispatch(&mut state, Event::Evaluate)
            .await
            .expect("idempotent");
        assert_eq!(engine.library.history().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluation_failure_is_retryable() {
        let mut evaluation = MockEvaluationGateway::new();
        let mut attempts = 0;
        evaluation.expect_evaluate().times(2).returning(move |_, _| {
            attempts += 1;
            if attempts == 1 {
                Err(GatewayError::Upstream("timeout".to_string()))
            } else {
                Ok(report_with_satisfaction("★★★☆☆"))
            }
        });
        let (engine, _dir) = engine_with(MockGenerationGateway::new(), evaluation);

        let mut state = seeded_state(&engine);
        state.page = Page::Eval;
        state.transcript.push(Turn::user("こんにちは"));

        let err = engine
            .dispatch(&mut state, Event::Evaluate)
            .await
            .expect_err("first try fails");
        assert!(matches!(err, EngineError::Evaluation(_)));
        assert!(state.evaluation.is_none());
        assert!(engine.library.history().is_empty());
        assert_eq!(state.page, Page::Eval);

        engine
            .dispatch(&mut state, Event::Evaluate)
            .await
            .expect("retry succeeds");
        assert!(state.evaluation.is_some());
        assert_eq!(engine.library.history().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_without_transcript_is_refused() {
        let (engine, _dir) = offline_engine();
        let mut state = seeded_state(&engine);
        state.page = Page::Eval;
        let err = engine
            .dispatch(&mut state, Event::Evaluate)
            .await
            .expect_err("no conversation");
        assert!(matches!(err, EngineError::NoConversation));
    }

    #[tokio::test]
    async fn test_post_test_only_on_eval_page() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        let err = engine
            .dispatch(&mut state, Event::SubmitPostTest(vec![90; 10]))
            .await
            .expect_err("wrong page");
        assert!(matches!(err, EngineError::BadTransition(Page::Dashboard)));

        state.page = Page::Eval;
        engine
            .dispatch(&mut state, Event::SubmitPostTest(vec![90; 10]))
            .await
            .expect("submit");
        assert_eq!(state.post_test.as_ref().expect("scored").score, 90);
    }

    #[tokio::test]
    async fn test_return_to_dashboard_clears_run() {
        let (engine, _dir) = offline_engine();
        let mut state = seeded_state(&engine);
        state.page = Page::ModeSelect;
        engine
            .dispatch(&mut state, Event::ChooseMode(PlayerRole::Staff))
            .await
            .expect("choose");
        engine
            .dispatch(&mut state, Event::SkipTest)
            .await
            .expect("skip");
        assert!(engine.conversation.lock().await.is_some());

        engine
            .dispatch(&mut state, Event::ReturnToDashboard)
            .await
            .expect("return");
        assert_eq!(state.page, Page::Dashboard);
        assert!(state.transcript.is_empty());
        assert!(engine.conversation.lock().await.is_none());
        // Selection survives for the next run.
        assert!(state.active.world.is_some());
    }

    #[tokio::test]
    async fn test_back_walks_the_gate_pages() {
        let (engine, _dir) = offline_engine();
        let mut state = SessionState::new();
        state.page = Page::PreTest;
        engine.dispatch(&mut state, Event::Back).await.expect("back");
        assert_eq!(state.page, Page::PreTestGate);
        engine.dispatch(&mut state, Event::Back).await.expect("back");
        assert_eq!(state.page, Page::ModeSelect);
        engine.dispatch(&mut state, Event::Back).await.expect("back");
        assert_eq!(state.page, Page::Dashboard);

        state.page = Page::Chat;
        let err = engine
            .dispatch(&mut state, Event::Back)
            .await
            .expect_err("chat has no back");
        assert!(matches!(err, EngineError::BadTransition(Page::Chat)));
    }
}
