//! Azure neural voice assignment and speaking style.

use rand::seq::IndexedRandom;
use serde::Serialize;

use crate::profile::Gender;

pub const MALE_VOICES: [&str; 3] = [
    "ja-JP-KeitaNeural",
    "ja-JP-DaichiNeural",
    "ja-JP-NaokiNeural",
];

pub const FEMALE_VOICES: [&str; 3] = [
    "ja-JP-NanamiNeural",
    "ja-JP-AoiNeural",
    "ja-JP-ShioriNeural",
];

pub const FALLBACK_VOICE: &str = "ja-JP-NanamiNeural";

const APOLOGY_MARKERS: [&str; 3] = ["申し訳", "すみません", "お詫び"];

pub fn pool(gender: Gender) -> &'static [&'static str] {
    match gender {
        Gender::Male => &MALE_VOICES,
        Gender::Female => &FEMALE_VOICES,
    }
}

/// Picks a random voice from the gender's pool.
pub fn pick(gender: Gender) -> String {
    pool(gender)
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_VOICE)
        .to_string()
}

/// Expressive style passed to the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakStyle {
    CustomerService,
    Empathetic,
}

impl SpeakStyle {
    pub fn as_azure(self) -> &'static str {
        match self {
            Self::CustomerService => "customerservice",
            Self::Empathetic => "empathetic",
        }
    }

    /// A reply that apologizes is delivered empathetically; everything else
    /// keeps the service register.
    pub fn for_reply(text: &str) -> Self {
        if APOLOGY_MARKERS.iter().any(|marker| text.contains(marker)) {
            Self::Empathetic
        } else {
            Self::CustomerService
        }
    }
}
