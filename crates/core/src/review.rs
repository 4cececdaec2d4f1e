//! The structured review returned by the Evaluation Gateway.
//!
//! Three sections: a manager's verdict, the five LEARN checks (Listen,
//! Empathize, Apologize, Resolve, Notify) and the guest's own reaction.
//! Models drop sections and mistype fields, so every field decodes through a
//! default — downstream code never dereferences an absent section.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::profile::de_score;

/// Satisfaction shown when the guest review is missing entirely.
pub const DEFAULT_SATISFACTION: &str = "★★★☆☆";

fn de_flex_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => {
            let lower = s.to_lowercase();
            lower == "true" || lower == "yes" || s == "○"
        }
        _ => false,
    })
}

fn default_overall_comment() -> String {
    "評価コメントを取得できませんでした。".to_string()
}

fn default_satisfaction() -> String {
    DEFAULT_SATISFACTION.to_string()
}

/// Full evaluation document for one completed conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Evaluation {
    #[serde(default)]
    pub manager_review: ManagerReview,
    #[serde(default)]
    pub learn_breakdown: LearnBreakdown,
    #[serde(default)]
    pub guest_review: GuestReview,
}

/// The duty manager's verdict on the player's handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ManagerReview {
    /// 0–100; out-of-range or unparseable input collapses to the bounds.
    #[serde(default, deserialize_with = "de_score")]
    pub score: u32,
    #[serde(default)]
    pub compliance: String,
    #[serde(default = "default_overall_comment")]
    pub overall_comment: String,
}

impl Default for ManagerReview {
    fn default() -> Self {
        Self {
            score: 0,
            compliance: String::new(),
            overall_comment: default_overall_comment(),
        }
    }
}

/// One pass/fail check of the LEARN rubric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LearnCheck {
    #[serde(default, deserialize_with = "de_flex_bool")]
    pub passed: bool,
    #[serde(default)]
    pub comment: String,
}

/// The five LEARN checks, serialized under the rubric's letter-prefixed keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LearnBreakdown {
    #[serde(default, rename = "L_listen")]
    pub listen: LearnCheck,
    #[serde(default, rename = "E_empathize")]
    pub empathize: LearnCheck,
    #[serde(default, rename = "A_apologize")]
    pub apologize: LearnCheck,
    #[serde(default, rename = "R_resolve")]
    pub resolve: LearnCheck,
    #[serde(default, rename = "N_notify")]
    pub notify: LearnCheck,
}

/// The guest's in-character reaction, including the free-text satisfaction
/// the rating update later parses stars out of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GuestReview {
    #[serde(default = "default_satisfaction")]
    pub satisfaction: String,
    #[serde(default)]
    pub emotional_journey: String,
    #[serde(default)]
    pub private_comment: String,
}

impl Default for GuestReview {
    fn default() -> Self {
        Self {
            satisfaction: default_satisfaction(),
            emotional_journey: String::new(),
            private_comment: String::new(),
        }
    }
}
