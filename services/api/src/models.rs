//! API Models
//!
//! This module defines the request payloads and response views exposed over
//! HTTP, together with their OpenAPI schemas via `utoipa`. Conversions into
//! the engine's own types live next to each payload.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use watai_core::gateway::{GuestParams, StaffParams, WorldParams};
use watai_core::nav::{NavTarget, ProfileKind};
use watai_core::profile::{Gender, PlayerRole};
use watai_core::rating::RatingChange;
use watai_core::session::{CastMember, Speaker, SurveyResult, Turn};

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NavTargetDto {
    Dashboard,
    World,
    Guest,
    Staff,
    ModeSelect,
    History,
}

impl From<NavTargetDto> for NavTarget {
    fn from(dto: NavTargetDto) -> Self {
        match dto {
            NavTargetDto::Dashboard => NavTarget::Dashboard,
            NavTargetDto::World => NavTarget::World,
            NavTargetDto::Guest => NavTarget::Guest,
            NavTargetDto::Staff => NavTarget::Staff,
            NavTargetDto::ModeSelect => NavTarget::ModeSelect,
            NavTargetDto::History => NavTarget::History,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleDto {
    Staff,
    Guest,
    Observer,
}

impl From<RoleDto> for PlayerRole {
    fn from(dto: RoleDto) -> Self {
        match dto {
            RoleDto::Staff => PlayerRole::Staff,
            RoleDto::Guest => PlayerRole::Guest,
            RoleDto::Observer => PlayerRole::Observer,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KindDto {
    World,
    Guest,
    Staff,
}

impl From<KindDto> for ProfileKind {
    fn from(dto: KindDto) -> Self {
        match dto {
            KindDto::World => ProfileKind::World,
            KindDto::Guest => ProfileKind::Guest,
            KindDto::Staff => ProfileKind::Staff,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenderDto {
    Male,
    Female,
}

impl From<GenderDto> for Gender {
    fn from(dto: GenderDto) -> Self {
        match dto {
            GenderDto::Male => Gender::Male,
            GenderDto::Female => Gender::Female,
        }
    }
}

impl From<Gender> for GenderDto {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => GenderDto::Male,
            Gender::Female => GenderDto::Female,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct NavigatePayload {
    #[schema(example = "mode_select")]
    pub target: NavTargetDto,
}

#[derive(Deserialize, ToSchema)]
pub struct ModePayload {
    #[schema(example = "staff")]
    pub role: RoleDto,
}

#[derive(Deserialize, ToSchema)]
pub struct SurveyPayload {
    /// One 0-100 answer per survey item, in display order.
    pub answers: Vec<u8>,
}

#[derive(Deserialize, ToSchema)]
pub struct TurnPayload {
    /// Typed input. Takes precedence over audio when both are present.
    #[schema(example = "大変申し訳ございません。すぐに確認いたします。")]
    pub text: Option<String>,
    /// Base64-encoded WAV recording of the player's utterance.
    pub audio_b64: Option<String>,
}

/// Seed parameters for world generation, as rolled or hand-edited.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct WorldParamsPayload {
    #[schema(example = "グランドパレス東京")]
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

impl Default for WorldParamsPayload {
    fn default() -> Self {
        WorldParams::default().into()
    }
}

impl From<WorldParamsPayload> for WorldParams {
    fn from(dto: WorldParamsPayload) -> Self {
        WorldParams {
            name: dto.name,
            kind: dto.kind,
            season: dto.season,
            stars: dto.stars,
            facilities: dto.facilities,
            policy: dto.policy,
            condition: dto.condition,
            difficulty: dto.difficulty,
        }
    }
}

impl From<WorldParams> for WorldParamsPayload {
    fn from(params: WorldParams) -> Self {
        WorldParamsPayload {
            name: params.name,
            kind: params.kind,
            season: params.season,
            stars: params.stars,
            facilities: params.facilities,
            policy: params.policy,
            condition: params.condition,
            difficulty: params.difficulty,
        }
    }
}

/// Seed parameters for guest generation.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GuestParamsPayload {
    #[schema(example = "田中 一郎")]
    pub name: String,
    pub gender: Option<GenderDto>,
    pub job: String,
    pub age: String,
    pub booking_channel: String,
    pub date_context: String,
    pub incident: String,
    /// Complaint severity, 1 (mild) to 5 (severe).
    #[schema(minimum = 1, maximum = 5)]
    pub severity: u8,
    pub vip_level: String,
    pub initial_mood: String,
}

impl Default for GuestParamsPayload {
    fn default() -> Self {
        GuestParams::default().into()
    }
}

impl From<GuestParamsPayload> for GuestParams {
    fn from(dto: GuestParamsPayload) -> Self {
        GuestParams {
            name: dto.name,
            gender: dto.gender.map(Gender::from),
            job: dto.job,
            age: dto.age,
            booking_channel: dto.booking_channel,
            date_context: dto.date_context,
            incident: dto.incident,
            severity: dto.severity,
            vip_level: dto.vip_level,
            initial_mood: dto.initial_mood,
        }
    }
}

impl From<GuestParams> for GuestParamsPayload {
    fn from(params: GuestParams) -> Self {
        GuestParamsPayload {
            name: params.name,
            gender: params.gender.map(GenderDto::from),
            job: params.job,
            age: params.age,
            booking_channel: params.booking_channel,
            date_context: params.date_context,
            incident: params.incident,
            severity: params.severity,
            vip_level: params.vip_level,
            initial_mood: params.initial_mood,
        }
    }
}

/// Seed parameters for staff generation.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct StaffParamsPayload {
    #[schema(example = "斎藤 真由美")]
    pub name: String,
    pub gender: GenderDto,
    pub role: String,
    pub experience: String,
    pub weakness: String,
}

impl Default for StaffParamsPayload {
    fn default() -> Self {
        StaffParams::default().into()
    }
}

impl From<StaffParamsPayload> for StaffParams {
    fn from(dto: StaffParamsPayload) -> Self {
        StaffParams {
            name: dto.name,
            gender: dto.gender.into(),
            role: dto.role,
            experience: dto.experience,
            weakness: dto.weakness,
        }
    }
}

impl From<StaffParams> for StaffParamsPayload {
    fn from(params: StaffParams) -> Self {
        StaffParamsPayload {
            name: params.name,
            gender: params.gender.into(),
            role: params.role,
            experience: params.experience,
            weakness: params.weakness,
        }
    }
}

/// An active selection slot: the stored name plus whether it still resolves
/// against the library.
#[derive(Serialize, ToSchema)]
pub struct SelectionView {
    pub name: String,
    pub resolved: bool,
}

#[derive(Serialize, ToSchema)]
pub struct TurnView {
    #[schema(example = "assistant")]
    pub speaker: String,
    /// Present only in observer mode: which character spoke.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<String>,
    pub text: String,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        TurnView {
            speaker: match turn.speaker {
                Speaker::User => "user".to_string(),
                Speaker::Assistant => "assistant".to_string(),
            },
            cast: turn.cast.map(|cast| match cast {
                CastMember::Guest => "guest".to_string(),
                CastMember::Staff => "staff".to_string(),
            }),
            text: turn.text.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RatingChangeView {
    pub old: f64,
    pub new: f64,
    pub count: u32,
}

impl From<RatingChange> for RatingChangeView {
    fn from(change: RatingChange) -> Self {
        RatingChangeView {
            old: change.old,
            new: change.new,
            count: change.count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SurveyView {
    pub answers: Vec<u8>,
    pub score: u8,
}

impl From<&SurveyResult> for SurveyView {
    fn from(result: &SurveyResult) -> Self {
        SurveyView {
            answers: result.answers.clone(),
            score: result.score,
        }
    }
}

/// Snapshot of the whole session, returned by every state-changing endpoint.
#[derive(Serialize, ToSchema)]
pub struct SessionView {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(example = "dashboard")]
    pub page: String,
    #[schema(example = "staff")]
    pub role: String,
    pub world: Option<SelectionView>,
    pub guest: Option<SelectionView>,
    pub staff: Option<SelectionView>,
    #[schema(value_type = Option<Object>)]
    pub draft_world: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub draft_guest: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub draft_staff: Option<serde_json::Value>,
    pub transcript: Vec<TurnView>,
    #[schema(value_type = Option<Object>)]
    pub evaluation: Option<serde_json::Value>,
    pub rating_change: Option<RatingChangeView>,
    pub pre_test: Option<SurveyView>,
    pub post_test: Option<SurveyView>,
    pub pre_test_skipped: bool,
    pub has_pending_audio: bool,
}

/// One synthesized utterance, handed out exactly once.
#[derive(Serialize, ToSchema)]
pub struct AudioResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(example = "ja-JP-NanamiNeural")]
    pub voice: String,
    #[schema(example = "customerservice")]
    pub style: String,
    #[schema(example = "audio/wav")]
    pub media_type: String,
    pub audio_b64: String,
}

/// The ten self-assessment statements, in display order.
#[derive(Serialize, ToSchema)]
pub struct SurveyItemsView {
    pub items: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_target_dto_deserialization() {
        let dto: NavTargetDto = serde_json::from_str("\"mode_select\"").unwrap();
        let target = NavTarget::from(dto);
        assert_eq!(target, NavTarget::ModeSelect);

        let dto: NavTargetDto = serde_json::from_str("\"dashboard\"").unwrap();
        assert_eq!(NavTarget::from(dto), NavTarget::Dashboard);
    }

    #[test]
    fn test_role_and_kind_dtos_map_to_core() {
        let role: RoleDto = serde_json::from_str("\"observer\"").unwrap();
        assert_eq!(PlayerRole::from(role), PlayerRole::Observer);

        let kind: KindDto = serde_json::from_str("\"guest\"").unwrap();
        assert_eq!(ProfileKind::from(kind), ProfileKind::Guest);
    }

    #[test]
    fn test_world_params_payload_defaults_from_empty_object() {
        let payload: WorldParamsPayload = serde_json::from_str("{}").unwrap();
        let params = WorldParams::from(payload);
        assert_eq!(params.name, "");
        assert_eq!(params.stars, 3.5);
    }

    #[test]
    fn test_guest_params_payload_round_trip() {
        let json = r#"{"name": "田中 一郎", "gender": "male", "severity": 5}"#;
        let payload: GuestParamsPayload = serde_json::from_str(json).unwrap();
        let params = GuestParams::from(payload);
        assert_eq!(params.name, "田中 一郎");
        assert_eq!(params.gender, Some(Gender::Male));
        assert_eq!(params.severity, 5);
        // Unset fields fall back to the engine defaults.
        assert_eq!(params.initial_mood, "普通 (Normal)");
    }

    #[test]
    fn test_turn_view_maps_speaker_and_cast() {
        let view = TurnView::from(&Turn::user("こんにちは"));
        assert_eq!(view.speaker, "user");
        assert_eq!(view.cast, None);

        let view = TurnView::from(&Turn::cast(CastMember::Staff, "はい"));
        assert_eq!(view.speaker, "assistant");
        assert_eq!(view.cast.as_deref(), Some("staff"));
    }
}
