//! Request/response shapes for the match pipeline.
//!
//! `MatchResponse` and its nested types mirror the output schema embedded in
//! the prompt template — the two must stay in lockstep.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound match request.
///
/// Empty profile strings degrade output quality but are not rejected;
/// an empty `roster_subset` is.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub description: String,
    pub ideal_customer: Option<String>,
    #[serde(default)]
    pub roster_subset: Vec<RosterMember>,
}

/// A candidate referral partner. Only `id` is interpreted locally (for
/// cross-validation of recommendations); every other field is caller-defined
/// and round-trips into the prompt untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RosterMember {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Full match result as produced by the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchResponse {
    pub user_profile: UserProfileSummary,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<MatchNotes>,
}

/// Categorical profile fields inferred by the model — not computed locally.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserProfileSummary {
    pub detected_primary_category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_secondary_categories: Option<Vec<String>>,
    pub detected_industry_bucket: String,
    pub power_team_name: String,
    pub power_team_logic: String,
}

/// One ranked referral partner suggestion.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Recommendation {
    /// Must correspond to an `id` in the input roster.
    pub member_id: String,
    /// 1–100, higher means a stronger referral fit.
    pub match_score: f64,
    pub why_this_member: String,
    pub referral_angle: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchNotes {
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_info_question: Option<String>,
}

/// Model-reported confidence in its category detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}
