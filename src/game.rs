use serde::{Deserialize, Serialize};

/// One scraped game, built only once every field was extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub title: String,
    pub players: String,
    pub release: i32,
    pub tags: Vec<String>,
    pub age: String,
    pub time: String,
    pub category: String,
    pub publisher: String,
    pub description: String,
    /// Community complexity rating, 1 to 5.
    pub weight: f64,
}
