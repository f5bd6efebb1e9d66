//! Offline content types

use serde::{Deserialize, Serialize};

/// What kind of offline content an item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Quiz,
    Fact,
    Joke,
    Challenge,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Quiz => write!(f, "quiz"),
            ContentType::Fact => write!(f, "fact"),
            ContentType::Joke => write!(f, "joke"),
            ContentType::Challenge => write!(f, "challenge"),
        }
    }
}

/// One piece of precomputed offline material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackContentItem {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub module: String,
    /// The text served to the learner
    pub payload: String,
    /// XP granted for engaging with it
    pub reward_value: u32,
}
