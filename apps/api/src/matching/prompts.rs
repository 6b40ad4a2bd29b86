// Prompt constants for the match pipeline.
//
// The OUTPUT SCHEMA block is the versioned response contract: it must match
// `matching::models::MatchResponse` field for field, and changing it is a
// breaking change for every caller of /api/match.

/// Sentinel used when the caller omits `ideal_customer`.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Match prompt template. Replace `{user_name}`, `{business_name}`,
/// `{description}`, `{ideal_customer}`, `{roster_json}` before sending.
pub const MATCH_PROMPT_TEMPLATE: &str = r#"You are a BNI Power Team Mapper.

TASK:
1. Analyze the user's business description.
2. From the roster provided, select the top 6-10 members who would make the best referral partners (Power Team): complementary, non-competing businesses serving the same client type.
3. Rank them by referral potential and explain each connection.

RULES:
- Only use members from the roster below. Do NOT invent names, ids, or categories.
- "member_id" must exactly match an "id" from the roster.
- Respond with valid JSON only. Do NOT use markdown code fences. Do NOT include any text outside the JSON object.

USER PROFILE:
Name: {user_name}
Business: {business_name}
What they do: {description}
Ideal Client: {ideal_customer}

ROSTER CANDIDATES (JSON):
{roster_json}

OUTPUT SCHEMA (JSON Only):
{
  "user_profile": {
    "detected_primary_category": "string",
    "detected_secondary_categories": ["string"],
    "detected_industry_bucket": "string",
    "power_team_name": "string",
    "power_team_logic": "string"
  },
  "recommendations": [
    {
      "member_id": "string (must match input id)",
      "match_score": number (1-100),
      "why_this_member": "string",
      "referral_angle": "string"
    }
  ],
  "notes": {
    "confidence": "low | medium | high",
    "missing_info_question": "string or null"
  }
}"#;
