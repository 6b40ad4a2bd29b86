//! Match Request Handler — maps a business profile plus a candidate roster
//! into a ranked referral-partner recommendation list via Gemini.

pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
