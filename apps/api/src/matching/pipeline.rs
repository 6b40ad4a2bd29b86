//! Match pipeline — orchestrates prompt rendering, the generation call, and
//! response validation.
//!
//! Flow: validate roster → render prompt → generate (bounded by timeout) →
//! strip fences → parse JSON → drop non-roster recommendations.
//! Linear, no state carried between requests.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{strip_json_fences, GenerationError, TextGenerator};
use crate::matching::models::{MatchRequest, MatchResponse};
use crate::matching::prompts::{MATCH_PROMPT_TEMPLATE, NOT_SPECIFIED};

/// Extra generation attempts when the model reply fails to parse as JSON.
/// Bounded — a model that keeps returning prose gets surfaced, not hammered.
const MAX_PARSE_RETRIES: u32 = 1;

/// Runs the full match pipeline against the given generator.
///
/// The timeout bounds each generation call; dropping the timed-out future
/// aborts the outbound request.
pub async fn run_match(
    generator: &dyn TextGenerator,
    upstream_timeout: Duration,
    request: MatchRequest,
) -> Result<MatchResponse, AppError> {
    if request.roster_subset.is_empty() {
        return Err(AppError::Validation(
            "roster_subset must be a non-empty array".to_string(),
        ));
    }

    let prompt = render_prompt(&request)?;

    let mut last_error: Option<AppError> = None;

    for attempt in 0..=MAX_PARSE_RETRIES {
        if attempt > 0 {
            warn!("Model reply failed to parse, retrying generation (attempt {attempt})");
        }

        let raw = match tokio::time::timeout(upstream_timeout, generator.generate(&prompt)).await {
            Err(_) => {
                return Err(AppError::UpstreamUnavailable(format!(
                    "generation timed out after {}s",
                    upstream_timeout.as_secs()
                )));
            }
            Ok(Err(e)) => return Err(map_generation_error(e)),
            Ok(Ok(text)) => text,
        };

        let sanitized = strip_json_fences(&raw).to_string();

        match serde_json::from_str::<MatchResponse>(&sanitized) {
            Ok(response) => {
                info!(
                    recommendations = response.recommendations.len(),
                    "Match generated for '{}'", request.user_name
                );
                return Ok(validate_member_ids(response, &request));
            }
            Err(e) => {
                last_error = Some(AppError::UpstreamMalformedOutput {
                    details: e.to_string(),
                    raw: Some(sanitized),
                });
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| AppError::Internal(anyhow::anyhow!("retry loop exited without error"))))
}

/// Interpolates the request into the prompt template.
/// Missing `ideal_customer` falls back to the "Not specified" sentinel.
fn render_prompt(request: &MatchRequest) -> Result<String, AppError> {
    let roster_json = serde_json::to_string(&request.roster_subset)
        .map_err(|e| AppError::Internal(e.into()))?;

    let ideal_customer = request
        .ideal_customer
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(NOT_SPECIFIED);

    Ok(MATCH_PROMPT_TEMPLATE
        .replace("{user_name}", &request.user_name)
        .replace("{business_name}", &request.business_name)
        .replace("{description}", &request.description)
        .replace("{ideal_customer}", ideal_customer)
        .replace("{roster_json}", &roster_json))
}

fn map_generation_error(e: GenerationError) -> AppError {
    match e {
        GenerationError::Http(e) => AppError::UpstreamUnavailable(e.to_string()),
        GenerationError::Api { status, message } => {
            AppError::UpstreamUnavailable(format!("Gemini API error {status}: {message}"))
        }
        GenerationError::EmptyContent => AppError::UpstreamMalformedOutput {
            details: "model returned no text content".to_string(),
            raw: None,
        },
    }
}

/// Drops recommendations whose `member_id` is not present in the input roster.
/// The prompt forbids invented ids; rows that carry one anyway are not
/// trustworthy enough to return. Skipped entirely when the caller's roster
/// schema carries no ids at all.
fn validate_member_ids(mut response: MatchResponse, request: &MatchRequest) -> MatchResponse {
    let roster_ids: HashSet<&str> = request
        .roster_subset
        .iter()
        .filter_map(|m| m.id.as_deref())
        .collect();

    if roster_ids.is_empty() {
        return response;
    }

    response.recommendations.retain(|rec| {
        let known = roster_ids.contains(rec.member_id.as_str());
        if !known {
            warn!(member_id = %rec.member_id, "Dropping recommendation for id not in roster");
        }
        known
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::models::RosterMember;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(60);

    /// Stub generator returning a fixed reply and counting invocations.
    struct StubGenerator {
        reply: String,
        calls: AtomicUsize,
    }

    impl StubGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    /// Stub generator that never resolves.
    struct HungGenerator;

    #[async_trait]
    impl TextGenerator for HungGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            std::future::pending().await
        }
    }

    fn member(id: &str, name: &str, category: &str) -> RosterMember {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "category": category
        }))
        .unwrap()
    }

    fn jane_request() -> MatchRequest {
        MatchRequest {
            user_name: "Jane".to_string(),
            business_name: "Acme Law".to_string(),
            description: "family law attorney".to_string(),
            ideal_customer: Some("divorcing parents".to_string()),
            roster_subset: vec![
                member("m1", "Bob", "Financial Advisor"),
                member("m2", "Sue", "Realtor"),
            ],
        }
    }

    fn two_recommendation_reply() -> String {
        serde_json::json!({
            "user_profile": {
                "detected_primary_category": "Family Law Attorney",
                "detected_industry_bucket": "Legal Services",
                "power_team_name": "Life Transitions Team",
                "power_team_logic": "Professionals serving families through divorce"
            },
            "recommendations": [
                {
                    "member_id": "m1",
                    "match_score": 92,
                    "why_this_member": "Divorcing clients need to untangle shared finances",
                    "referral_angle": "Refer clients starting asset division"
                },
                {
                    "member_id": "m2",
                    "match_score": 85,
                    "why_this_member": "Divorce often forces a home sale or purchase",
                    "referral_angle": "Refer clients listing the family home"
                }
            ],
            "notes": {
                "confidence": "high"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_fenced_json_reply_is_parsed_with_fences_removed() {
        let stub = StubGenerator::new(&format!("```json\n{}\n```", two_recommendation_reply()));
        let response = run_match(&stub, TIMEOUT, jane_request()).await.unwrap();

        assert_eq!(response.recommendations.len(), 2);
        assert_eq!(response.recommendations[0].member_id, "m1");
        assert_eq!(response.user_profile.power_team_name, "Life Transitions Team");
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scenario_jane_acme_law_returns_reply_unmodified() {
        let reply = two_recommendation_reply();
        let stub = StubGenerator::new(&reply);
        let response = run_match(&stub, TIMEOUT, jane_request()).await.unwrap();

        let expected: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(serde_json::to_value(&response).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_empty_roster_is_rejected_without_calling_generator() {
        let stub = StubGenerator::new(&two_recommendation_reply());
        let request = MatchRequest {
            roster_subset: vec![],
            ..jane_request()
        };

        let err = run_match(&stub, TIMEOUT, request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_json_reply_surfaces_malformed_output_with_raw_text() {
        let stub = StubGenerator::new("not json");
        let err = run_match(&stub, TIMEOUT, jane_request()).await.unwrap_err();

        match err {
            AppError::UpstreamMalformedOutput { raw, details } => {
                assert_eq!(raw.as_deref(), Some("not json"));
                assert!(!details.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // one retry on malformed output, then give up
        assert_eq!(stub.call_count(), 1 + MAX_PARSE_RETRIES as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_generator_times_out_as_unavailable() {
        let err = run_match(&HungGenerator, TIMEOUT, jane_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_invented_member_id_is_dropped() {
        let reply = serde_json::json!({
            "user_profile": {
                "detected_primary_category": "Family Law Attorney",
                "detected_industry_bucket": "Legal Services",
                "power_team_name": "Life Transitions Team",
                "power_team_logic": "Professionals serving families through divorce"
            },
            "recommendations": [
                {
                    "member_id": "m1",
                    "match_score": 92,
                    "why_this_member": "Real roster member",
                    "referral_angle": "Shared clients"
                },
                {
                    "member_id": "ghost-99",
                    "match_score": 88,
                    "why_this_member": "Invented by the model",
                    "referral_angle": "Does not exist"
                }
            ]
        })
        .to_string();

        let stub = StubGenerator::new(&reply);
        let response = run_match(&stub, TIMEOUT, jane_request()).await.unwrap();

        assert_eq!(response.recommendations.len(), 1);
        assert_eq!(response.recommendations[0].member_id, "m1");
    }

    #[tokio::test]
    async fn test_roster_without_ids_skips_cross_validation() {
        let mut request = jane_request();
        for member in &mut request.roster_subset {
            member.id = None;
        }

        let stub = StubGenerator::new(&two_recommendation_reply());
        let response = run_match(&stub, TIMEOUT, request).await.unwrap();
        assert_eq!(response.recommendations.len(), 2);
    }

    #[test]
    fn test_render_prompt_defaults_ideal_customer() {
        let request = MatchRequest {
            ideal_customer: None,
            ..jane_request()
        };
        let prompt = render_prompt(&request).unwrap();
        assert!(prompt.contains("Ideal Client: Not specified"));
        assert!(prompt.contains("Jane"));
        assert!(prompt.contains(r#""Financial Advisor""#));
    }

    #[test]
    fn test_render_prompt_interpolates_all_fields() {
        let prompt = render_prompt(&jane_request()).unwrap();
        assert!(prompt.contains("Name: Jane"));
        assert!(prompt.contains("Business: Acme Law"));
        assert!(prompt.contains("What they do: family law attorney"));
        assert!(prompt.contains("Ideal Client: divorcing parents"));
        assert!(prompt.contains(r#""id":"m2""#));
        // no unreplaced placeholders left behind
        assert!(!prompt.contains("{user_name}"));
        assert!(!prompt.contains("{roster_json}"));
    }
}
