//! Profile records for the simulator: hotel worlds, guest personas, staff
//! personas and the history log of completed sessions.
//!
//! Every profile originates from a generative model, so the records are
//! deliberately permissive: each field the engine reads has a named default,
//! numeric fields tolerate strings, and list-valued text fields are folded
//! into a single string. A profile without a `name` is loadable but unsavable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use utoipa::ToSchema;

use crate::review::Evaluation;

/// Lower bound applied to a guest's anger when a persona is created.
pub const ANGER_FLOOR: u8 = 10;
/// Upper bound of the anger scale.
pub const ANGER_CEIL: u8 = 100;
/// Anger assumed when a generated persona omits the field.
pub const DEFAULT_ANGER: u8 = 50;

const SUMMARY_LIMIT: usize = 50;

/// Which side the player takes in a scenario. `Observer` watches an AI-vs-AI
/// dialogue instead of participating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    #[default]
    Staff,
    Guest,
    Observer,
}

impl fmt::Display for PlayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerRole::Staff => write!(f, "staff"),
            PlayerRole::Guest => write!(f, "guest"),
            PlayerRole::Observer => write!(f, "observer"),
        }
    }
}

/// Closed gender enumeration used to partition the synthesis voice pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    #[default]
    Female,
}

impl Gender {
    /// Collapses whatever gender text a model produced into the closed enum.
    ///
    /// Japanese markers are checked first (`男` / `女`), then the English
    /// words; "female" is tested before "male" because it contains it.
    /// Anything unrecognized defaults to female.
    pub fn normalize(raw: &str) -> Self {
        if raw.contains('男') {
            return Gender::Male;
        }
        if raw.contains('女') {
            return Gender::Female;
        }
        let lower = raw.to_lowercase();
        if lower.contains("female") {
            Gender::Female
        } else if lower.contains("male") {
            Gender::Male
        } else {
            Gender::Female
        }
    }

    /// Japanese label used in prompt text.
    pub fn label_jp(&self) -> &'static str {
        match self {
            Gender::Male => "男性",
            Gender::Female => "女性",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(raw) => Gender::normalize(&raw),
            _ => Gender::default(),
        })
    }
}

/// Entities addressable by unique name in the library.
pub trait Named {
    fn name(&self) -> &str;
}

fn flex_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f.round().max(0.0) as u32),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round().max(0.0) as u32),
        _ => None,
    }
}

fn flex_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(flex_f64))
}

fn de_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(flex_u32))
}

fn de_anger<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match flex_u32(&value) {
        Some(raw) => clamp_anger(raw),
        None => DEFAULT_ANGER,
    })
}

pub(crate) fn de_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(flex_u32(&value).unwrap_or(0).min(100))
}

fn de_flex_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn de_text_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("、"),
        _ => String::new(),
    })
}

fn default_anger() -> u8 {
    DEFAULT_ANGER
}

/// Clamps a raw anger value into the [`ANGER_FLOOR`]..=[`ANGER_CEIL`] band.
pub fn clamp_anger(raw: u32) -> u8 {
    raw.clamp(u32::from(ANGER_FLOOR), u32::from(ANGER_CEIL)) as u8
}

/// Seed anger for a new guest persona.
///
/// `severity` is the 1–5 incident severity chosen for generation; the mood
/// text nudges the result (fury up, calm down, drunk slightly up) and `jitter`
/// adds per-generation variance. The result always lands in [10, 100].
pub fn anger_seed(severity: u8, initial_mood: &str, jitter: i8) -> u8 {
    let mut anger = i32::from(severity) * 20;
    if initial_mood.contains("激怒") || initial_mood.contains("Furious") {
        anger += 30;
    }
    if initial_mood.contains("冷静") {
        anger -= 20;
    }
    if initial_mood.contains("泥酔") {
        anger += 10;
    }
    anger += i32::from(jitter);
    anger.clamp(i32::from(ANGER_FLOOR), i32::from(ANGER_CEIL)) as u8
}

/// Truncates free text to a display summary, safe on multi-byte characters.
pub fn clip_summary(text: &str) -> String {
    let mut summary: String = text.chars().take(SUMMARY_LIMIT).collect();
    if text.chars().count() > SUMMARY_LIMIT {
        summary.push('…');
    }
    summary
}

/// A hotel setting. `current_rating` and `rating_count` stay unset until the
/// first completed evaluation touches them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct World {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub season: String,
    #[serde(default)]
    pub policy: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default, deserialize_with = "de_text_or_list")]
    pub facilities: String,
    #[serde(default, deserialize_with = "de_text_or_list")]
    pub allowed_compensations: String,
    #[serde(default, deserialize_with = "de_text_or_list")]
    pub constraints: String,
    #[serde(default)]
    pub background_story: String,
    #[serde(
        default,
        deserialize_with = "de_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub stars: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_rating: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de_opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating_count: Option<u32>,
}

impl Named for World {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A customer persona. Immutable once persisted; anger evolves only inside a
/// live conversation, never written back.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Guest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default, deserialize_with = "de_flex_string")]
    pub age: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub initial_mood: String,
    #[serde(default = "default_anger", deserialize_with = "de_anger")]
    pub initial_anger: u8,
    #[serde(default, deserialize_with = "de_flex_string")]
    pub vip_level: String,
    #[serde(default)]
    pub specific_incident: String,
    #[serde(default)]
    pub default_complaint: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl Default for Guest {
    fn default() -> Self {
        Self {
            name: String::new(),
            gender: Gender::default(),
            age: String::new(),
            job: String::new(),
            personality: String::new(),
            initial_mood: String::new(),
            initial_anger: DEFAULT_ANGER,
            vip_level: String::new(),
            specific_incident: String::new(),
            default_complaint: String::new(),
            bio: String::new(),
            voice_id: None,
        }
    }
}

impl Named for Guest {
    fn name(&self) -> &str {
        &self.name
    }
}

/// An employee persona.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Staff {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl Named for Staff {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Record of one completed session. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub role: PlayerRole,
    #[serde(default)]
    pub world: String,
    #[serde(default)]
    pub guest: String,
    #[serde(default)]
    pub staff: String,
    #[serde(default, deserialize_with = "de_score")]
    pub score: u32,
    #[serde(default)]
    pub satisfaction: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub result: Evaluation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gender_normalize_japanese_markers() {
        assert_eq!(Gender::normalize("男性"), Gender::Male);
        assert_eq!(Gender::normalize("女性"), Gender::Female);
        assert_eq!(Gender::normalize("30代の男"), Gender::Male);
        // The male marker wins when both appear, matching first-match order.
        assert_eq!(Gender::normalize("男女"), Gender::Male);
    }

    #[test]
    fn test_gender_normalize_english_markers() {
        assert_eq!(Gender::normalize("Male"), Gender::Male);
        assert_eq!(Gender::normalize("FEMALE"), Gender::Female);
        // "female" contains "male"; the female check must run first.
        assert_eq!(Gender::normalize("female guest"), Gender::Female);
    }

    #[test]
    fn test_gender_normalize_defaults_to_female() {
        assert_eq!(Gender::normalize(""), Gender::Female);
        assert_eq!(Gender::normalize("unknown"), Gender::Female);
    }

    #[test]
    fn test_guest_decodes_untrusted_payload() {
        let guest: Guest = serde_json::from_value(json!({
            "name": "田中 一郎",
            "gender": "男性",
            "age": 52,
            "initial_anger": "120",
            "vip_level": 3
        }))
        .expect("permissive decode");

        assert_eq!(guest.name, "田中 一郎");
        assert_eq!(guest.gender, Gender::Male);
        assert_eq!(guest.age, "52");
        assert_eq!(guest.initial_anger, ANGER_CEIL);
        assert_eq!(guest.vip_level, "3");
        assert_eq!(guest.default_complaint, "");
        assert!(guest.voice_id.is_none());
    }

    #[test]
    fn test_guest_anger_clamped_low_and_defaulted() {
        let low: Guest = serde_json::from_value(json!({ "name": "a", "initial_anger": 2 }))
            .expect("decode");
        assert_eq!(low.initial_anger, ANGER_FLOOR);

        let missing: Guest = serde_json::from_value(json!({ "name": "a" })).expect("decode");
        assert_eq!(missing.initial_anger, DEFAULT_ANGER);

        let garbage: Guest =
            serde_json::from_value(json!({ "name": "a", "initial_anger": "かなり怒っている" }))
                .expect("decode");
        assert_eq!(garbage.initial_anger, DEFAULT_ANGER);
    }

    #[test]
    fn test_anger_seed_bands() {
        // Maximum severity plus fury saturates at the ceiling.
        assert_eq!(anger_seed(5, "激怒 (Furious)", 10), ANGER_CEIL);
        // Mild severity plus calm bottoms out at the floor.
        assert_eq!(anger_seed(1, "冷静 (Calm)", -10), ANGER_FLOOR);
        // Plain mood is severity * 20 plus jitter.
        assert_eq!(anger_seed(3, "普通 (Normal)", 0), 60);
        assert_eq!(anger_seed(3, "泥酔 (Drunk)", -5), 65);
    }

    #[test]
    fn test_world_tolerates_stars_as_string() {
        let world: World =
            serde_json::from_value(json!({ "name": "w", "stars": "4.5" })).expect("decode");
        assert_eq!(world.stars, Some(4.5));

        let odd: World =
            serde_json::from_value(json!({ "name": "w", "stars": "★5" })).expect("decode");
        assert_eq!(odd.stars, None);
    }

    #[test]
    fn test_world_folds_list_fields_into_text() {
        let world: World = serde_json::from_value(json!({
            "name": "山水閣",
            "facilities": ["温泉", "大浴場"],
            "allowed_compensations": "ドリンク券"
        }))
        .expect("decode");
        assert_eq!(world.facilities, "温泉、大浴場");
        assert_eq!(world.allowed_compensations, "ドリンク券");
    }

    #[test]
    fn test_world_type_key_round_trips() {
        let world = World {
            name: "グランド".to_string(),
            kind: "シティホテル".to_string(),
            ..World::default()
        };
        let value = serde_json::to_value(&world).expect("encode");
        assert_eq!(value["type"], "シティホテル");
        let back: World = serde_json::from_value(value).expect("decode");
        assert_eq!(back.kind, "シティホテル");
    }

    #[test]
    fn test_history_entry_decodes_with_defaults() {
        let entry: HistoryEntry =
            serde_json::from_value(json!({ "score": "85", "role": "observer" })).expect("decode");
        assert_eq!(entry.score, 85);
        assert_eq!(entry.role, PlayerRole::Observer);
        assert_eq!(entry.world, "");
        assert_eq!(entry.result.manager_review.score, 0);
    }

    #[test]
    fn test_clip_summary_is_char_safe() {
        let long = "あ".repeat(60);
        let clipped = clip_summary(&long);
        assert_eq!(clipped.chars().count(), 51);
        assert!(clipped.ends_with('…'));

        let short = "短いコメント";
        assert_eq!(clip_summary(short), short);
    }
}
