use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Flattened prompt record returned by the search endpoint.
///
/// The four dimension fields hold `", "`-joined distinct names and are `""`
/// when the prompt has no links in that dimension.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PromptView {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub rating: Option<f64>,
    pub rating_count: i32,
    pub soort: String,
    pub departments: String,
    pub functions: String,
    pub activities: String,
    pub applications: String,
}

/// Outcome of a rating submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingUpdate {
    pub new_rating: f64,
    pub new_count: i32,
}
