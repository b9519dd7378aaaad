//! Four-tier tolerant parser for the embedded analytics string.
//!
//! The analytics sub-payload is generated by an upstream language model
//! and cannot be trusted to be valid JSON. Parsing therefore degrades
//! through four tiers, each attempted only when the previous one fails:
//!
//! 1. strict JSON parse;
//! 2. single-to-double quote swap, then strict parse (Python-repr dicts);
//! 3. the tolerant converter in [`crate::tolerant`] for fully unquoted
//!    dict-like text;
//! 4. a fixed-shape raw fallback preserving the original string.
//!
//! [`parse`] never fails: the worst input yields a tier-4 record tagged
//! `Raw`, so no call is ever lost to a parse failure, only degraded.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use voxlead_core::storage::lead_analytics::NewLeadAnalytics;

use crate::tolerant::repair_to_json;

/// Offset all demo booking times are normalized to (UTC+05:30).
const DEMO_BOOK_OFFSET_SECS: i32 = 5 * 3600 + 1800;

/// Total score ceiling under the low-engagement rule.
const ENGAGEMENT_CAP: i32 = 9;

/// Minimum conversation turns for an uncapped score.
const MIN_TURNS_FOR_FULL_SCORE: usize = 3;

/// Which parsing tier produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseTier {
    /// Input was already strict JSON.
    Strict,
    /// Strict JSON after swapping single quotes for double quotes.
    QuoteSwapped,
    /// Rewritten by the tolerant converter.
    Repaired,
    /// Unparseable; fixed-shape fallback with the original preserved.
    RawFallback,
}

/// Structured lead analytics extracted from one call.
///
/// Field layout mirrors the persisted row: five scored categories, the
/// capped total, CTA flags, contact extraction and the normalized demo
/// booking time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAnalytics {
    /// Tier that produced this record.
    pub tier: ParseTier,

    /// Intent level label (e.g. "High").
    pub intent_level: String,
    /// Intent score, 1-3; 0 when missing.
    pub intent_score: i32,
    /// Urgency level label.
    pub urgency_level: String,
    /// Urgency score.
    pub urgency_score: i32,
    /// Budget constraint label.
    pub budget_constraint: String,
    /// Budget score.
    pub budget_score: i32,
    /// Fit alignment label.
    pub fit_alignment: String,
    /// Fit score.
    pub fit_score: i32,
    /// Engagement health label.
    pub engagement_health: String,
    /// Engagement score.
    pub engagement_score: i32,

    /// Sum of the category scores (or the payload's own total when no
    /// category scores were present), capped by
    /// [`ParsedAnalytics::apply_engagement_cap`].
    pub total_score: i32,

    /// Cold, Warm, Hot; or Raw for the fallback tier.
    pub lead_status_tag: String,

    /// Pricing CTA fired.
    pub cta_pricing_clicked: bool,
    /// Demo CTA fired.
    pub cta_demo_clicked: bool,
    /// Follow-up CTA fired.
    pub cta_followup_clicked: bool,
    /// Sample CTA fired.
    pub cta_sample_clicked: bool,
    /// Conversation escalated to a human.
    pub cta_escalated_to_human: bool,

    /// Extracted caller name.
    pub extracted_name: Option<String>,
    /// Extracted caller email.
    pub extracted_email: Option<String>,
    /// Extracted company name.
    pub company_name: Option<String>,
    /// One-line dashboard notification.
    pub smart_notification: Option<String>,

    /// Demo booking time, normalized to UTC+05:30.
    pub demo_book_datetime: Option<DateTime<FixedOffset>>,

    /// Original analytics string, kept only for tier-4 fallback records.
    pub raw_analysis_data: Option<String>,
}

impl ParsedAnalytics {
    fn empty(tier: ParseTier) -> Self {
        Self {
            tier,
            intent_level: "Unknown".to_string(),
            intent_score: 0,
            urgency_level: "Unknown".to_string(),
            urgency_score: 0,
            budget_constraint: "Unknown".to_string(),
            budget_score: 0,
            fit_alignment: "Unknown".to_string(),
            fit_score: 0,
            engagement_health: "Unknown".to_string(),
            engagement_score: 0,
            total_score: 0,
            lead_status_tag: "Raw".to_string(),
            cta_pricing_clicked: false,
            cta_demo_clicked: false,
            cta_followup_clicked: false,
            cta_sample_clicked: false,
            cta_escalated_to_human: false,
            extracted_name: None,
            extracted_email: None,
            company_name: None,
            smart_notification: None,
            demo_book_datetime: None,
            raw_analysis_data: None,
        }
    }

    /// Applies the low-engagement score cap.
    ///
    /// The total is clipped to 9 when the conversation had fewer than 3
    /// turns or neither the demo nor the follow-up CTA fired, and the tag
    /// is recomputed from the clipped total. Tier-4 fallback records are
    /// left untouched; their out-of-band values stay tagged `Raw`, never
    /// clamped.
    pub fn apply_engagement_cap(&mut self, conversation_turns: usize) {
        if self.tier == ParseTier::RawFallback {
            return;
        }

        let low_engagement = conversation_turns < MIN_TURNS_FOR_FULL_SCORE
            || !(self.cta_demo_clicked || self.cta_followup_clicked);

        if low_engagement && self.total_score > ENGAGEMENT_CAP {
            self.total_score = ENGAGEMENT_CAP;
            self.lead_status_tag = lead_status_for(self.total_score).to_string();
        }
    }

    /// Converts into the storage input shape.
    pub fn to_record(&self) -> NewLeadAnalytics {
        NewLeadAnalytics {
            intent_level: self.intent_level.clone(),
            intent_score: self.intent_score,
            urgency_level: self.urgency_level.clone(),
            urgency_score: self.urgency_score,
            budget_constraint: self.budget_constraint.clone(),
            budget_score: self.budget_score,
            fit_alignment: self.fit_alignment.clone(),
            fit_score: self.fit_score,
            engagement_health: self.engagement_health.clone(),
            engagement_score: self.engagement_score,
            total_score: self.total_score,
            lead_status_tag: self.lead_status_tag.clone(),
            cta_pricing_clicked: self.cta_pricing_clicked,
            cta_demo_clicked: self.cta_demo_clicked,
            cta_followup_clicked: self.cta_followup_clicked,
            cta_sample_clicked: self.cta_sample_clicked,
            cta_escalated_to_human: self.cta_escalated_to_human,
            extracted_name: self.extracted_name.clone(),
            extracted_email: self.extracted_email.clone(),
            company_name: self.company_name.clone(),
            smart_notification: self.smart_notification.clone(),
            demo_book_datetime: self.demo_book_datetime.map(|dt| dt.with_timezone(&Utc)),
            raw_analysis_data: self.raw_analysis_data.clone(),
        }
    }
}

/// Parses an analytics string into a structured record.
///
/// Never fails. Tiers 1-3 are attempted in order; when all three fail the
/// result is a tier-4 record with every score at 0, every level Unknown,
/// the tag `Raw`, and the original string preserved.
pub fn parse(raw: &str) -> ParsedAnalytics {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if value.is_object() {
            return from_value(&value, ParseTier::Strict);
        }
    }

    let swapped = raw.replace('\'', "\"");
    if let Ok(value) = serde_json::from_str::<Value>(&swapped) {
        if value.is_object() {
            return from_value(&value, ParseTier::QuoteSwapped);
        }
    }

    if let Some(repaired) = repair_to_json(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            if value.is_object() {
                return from_value(&value, ParseTier::Repaired);
            }
        }
    }

    let mut fallback = ParsedAnalytics::empty(ParseTier::RawFallback);
    fallback.raw_analysis_data = Some(raw.to_string());
    fallback
}

/// Lead classification band for a total score.
///
/// Cold 5-8, Warm 9-11, Hot 12-15; totals below the Cold band are still
/// Cold.
pub fn lead_status_for(total_score: i32) -> &'static str {
    match total_score {
        12.. => "Hot",
        9..=11 => "Warm",
        _ => "Cold",
    }
}

fn from_value(value: &Value, tier: ParseTier) -> ParsedAnalytics {
    let mut parsed = ParsedAnalytics::empty(tier);

    parsed.intent_level = level(value, "intent_level");
    parsed.intent_score = score(value, "intent_score");
    parsed.urgency_level = level(value, "urgency_level");
    parsed.urgency_score = score(value, "urgency_score");
    parsed.budget_constraint = level(value, "budget_constraint");
    parsed.budget_score = score(value, "budget_score");
    parsed.fit_alignment = level(value, "fit_alignment");
    parsed.fit_score = score(value, "fit_score");
    parsed.engagement_health = level(value, "engagement_health");
    parsed.engagement_score = score(value, "engagement_score");

    let category_sum = parsed.intent_score
        + parsed.urgency_score
        + parsed.budget_score
        + parsed.fit_score
        + parsed.engagement_score;
    parsed.total_score = if category_sum > 0 { category_sum } else { score(value, "total_score") };

    parsed.lead_status_tag = text(value, "lead_status_tag")
        .unwrap_or_else(|| lead_status_for(parsed.total_score).to_string());

    parsed.cta_pricing_clicked = flag(value, "cta_pricing_clicked");
    parsed.cta_demo_clicked = flag(value, "cta_demo_clicked");
    parsed.cta_followup_clicked = flag(value, "cta_followup_clicked");
    parsed.cta_sample_clicked = flag(value, "cta_sample_clicked");
    parsed.cta_escalated_to_human = flag(value, "cta_escalated_to_human");

    // Extraction fields arrive nested under `extraction` in the new
    // payloads and flat at the top level in older ones.
    let extraction = value.get("extraction").filter(|v| v.is_object()).unwrap_or(value);
    parsed.extracted_name = text(extraction, "name");
    parsed.extracted_email = text(extraction, "email");
    parsed.company_name = text(extraction, "company_name");
    parsed.smart_notification = text(extraction, "smart_notification");

    parsed.demo_book_datetime =
        text(value, "demo_book_datetime").and_then(|s| normalize_demo_datetime(&s));

    parsed
}

/// Non-empty string field, `None` when absent or a different type.
fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "null" && *s != "None")
        .map(ToString::to_string)
}

/// Level label with an Unknown default.
fn level(value: &Value, key: &str) -> String {
    text(value, key).unwrap_or_else(|| "Unknown".to_string())
}

/// Integer score that tolerates number-as-string, defaulting to 0.
fn score(value: &Value, key: &str) -> i32 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) as i32,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Boolean flag that tolerates string spellings and 0/1 numbers.
fn flag(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim(), "true" | "True" | "yes" | "1"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Normalizes a demo booking value to a fixed UTC+05:30 timestamp.
///
/// Values with an explicit offset (or `Z`) are converted to +05:30;
/// values with no offset are assumed to already be +05:30 local time.
/// Ambiguous values, such as a bare date with no time, yield `None`
/// rather than a guessed time.
pub fn normalize_demo_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    let offset = FixedOffset::east_opt(DEMO_BOOK_OFFSET_SECS)?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&offset));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return offset.from_local_datetime(&naive).single();
        }
    }

    // A bare date is ambiguous; refuse to invent a time for it.
    if NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        return None;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_uses_tier_one() {
        let parsed = parse(r#"{"intent_level": "High", "intent_score": 3}"#);
        assert_eq!(parsed.tier, ParseTier::Strict);
        assert_eq!(parsed.intent_level, "High");
        assert_eq!(parsed.intent_score, 3);
    }

    #[test]
    fn single_quoted_dict_uses_tier_two() {
        let parsed = parse("{'total_score': 10, 'lead_status_tag': 'Warm'}");
        assert_eq!(parsed.tier, ParseTier::QuoteSwapped);
        assert_eq!(parsed.total_score, 10);
        assert_eq!(parsed.lead_status_tag, "Warm");
    }

    #[test]
    fn unquoted_dict_uses_tier_three() {
        let parsed = parse(
            "{intent_level: High, intent_score: 3, reasoning: {intent: Customer asked about pricing, plans}}",
        );
        assert_eq!(parsed.tier, ParseTier::Repaired);
        assert_eq!(parsed.intent_level, "High");
        assert_eq!(parsed.intent_score, 3);
        assert_eq!(parsed.total_score, 3);
    }

    #[test]
    fn garbage_uses_raw_fallback_and_never_panics() {
        let parsed = parse("not json at all {{{");
        assert_eq!(parsed.tier, ParseTier::RawFallback);
        assert_eq!(parsed.lead_status_tag, "Raw");
        assert_eq!(parsed.total_score, 0);
        assert_eq!(parsed.intent_level, "Unknown");
        assert_eq!(parsed.raw_analysis_data.as_deref(), Some("not json at all {{{"));
    }

    #[test]
    fn total_is_sum_of_category_scores() {
        let parsed = parse(
            r#"{"intent_score": 3, "urgency_score": 2, "budget_score": 3,
                "fit_score": 3, "engagement_score": 2, "total_score": 1}"#,
        );
        // Category sum wins over the payload's own claim.
        assert_eq!(parsed.total_score, 13);
    }

    #[test]
    fn python_literals_in_tier_three() {
        let parsed = parse("{cta_demo_clicked: True, cta_pricing_clicked: False, name: None}");
        assert_eq!(parsed.tier, ParseTier::Repaired);
        assert!(parsed.cta_demo_clicked);
        assert!(!parsed.cta_pricing_clicked);
        assert_eq!(parsed.extracted_name, None);
    }

    #[test]
    fn cap_applies_on_few_turns() {
        let mut parsed = parse(
            r#"{"intent_score": 3, "urgency_score": 2, "budget_score": 3,
                "fit_score": 3, "engagement_score": 2, "cta_demo_clicked": true}"#,
        );
        assert_eq!(parsed.total_score, 13);

        parsed.apply_engagement_cap(2);
        assert_eq!(parsed.total_score, 9);
        assert_eq!(parsed.lead_status_tag, "Warm");
    }

    #[test]
    fn cap_applies_without_demo_or_followup_cta() {
        let mut parsed = parse(
            r#"{"intent_score": 3, "urgency_score": 3, "budget_score": 3,
                "fit_score": 3, "engagement_score": 3}"#,
        );
        parsed.apply_engagement_cap(10);
        assert_eq!(parsed.total_score, 9);
        assert_eq!(parsed.lead_status_tag, "Warm");
    }

    #[test]
    fn no_cap_with_enough_turns_and_cta() {
        let mut parsed = parse(
            r#"{"intent_score": 3, "urgency_score": 3, "budget_score": 3,
                "fit_score": 3, "engagement_score": 3, "cta_followup_clicked": true}"#,
        );
        parsed.apply_engagement_cap(5);
        assert_eq!(parsed.total_score, 15);
        assert_eq!(parsed.lead_status_tag, "Hot");
    }

    #[test]
    fn cap_never_raises_a_low_score() {
        let mut parsed = parse(r#"{"intent_score": 2, "urgency_score": 1}"#);
        parsed.apply_engagement_cap(1);
        assert_eq!(parsed.total_score, 3);
    }

    #[test]
    fn raw_fallback_is_never_capped_or_reclassified() {
        let mut parsed = parse("####");
        parsed.apply_engagement_cap(0);
        assert_eq!(parsed.lead_status_tag, "Raw");
        assert_eq!(parsed.total_score, 0);
    }

    #[test]
    fn lead_status_bands() {
        assert_eq!(lead_status_for(0), "Cold");
        assert_eq!(lead_status_for(5), "Cold");
        assert_eq!(lead_status_for(8), "Cold");
        assert_eq!(lead_status_for(9), "Warm");
        assert_eq!(lead_status_for(11), "Warm");
        assert_eq!(lead_status_for(12), "Hot");
        assert_eq!(lead_status_for(15), "Hot");
    }

    #[test]
    fn extraction_nested_and_flat() {
        let nested = parse(
            r#"{"extraction": {"name": "Priya Sharma", "email": "priya@acme.in",
                "company_name": "Acme"}}"#,
        );
        assert_eq!(nested.extracted_name.as_deref(), Some("Priya Sharma"));
        assert_eq!(nested.extracted_email.as_deref(), Some("priya@acme.in"));
        assert_eq!(nested.company_name.as_deref(), Some("Acme"));

        let flat = parse(r#"{"name": "Priya Sharma", "email": "priya@acme.in"}"#);
        assert_eq!(flat.extracted_name.as_deref(), Some("Priya Sharma"));
    }

    #[test]
    fn demo_datetime_explicit_offset_converts_to_ist() {
        let dt = normalize_demo_datetime("2025-06-01T10:00:00Z").expect("parsed");
        assert_eq!(dt.offset().local_minus_utc(), DEMO_BOOK_OFFSET_SECS);
        assert_eq!(dt.to_rfc3339(), "2025-06-01T15:30:00+05:30");

        let dt = normalize_demo_datetime("2025-06-01T12:00:00+02:00").expect("parsed");
        assert_eq!(dt.to_rfc3339(), "2025-06-01T15:30:00+05:30");
    }

    #[test]
    fn demo_datetime_naive_assumed_ist() {
        let dt = normalize_demo_datetime("2025-06-01T15:30:00").expect("parsed");
        assert_eq!(dt.to_rfc3339(), "2025-06-01T15:30:00+05:30");

        let dt = normalize_demo_datetime("2025-06-01 15:30:00").expect("parsed");
        assert_eq!(dt.offset().local_minus_utc(), DEMO_BOOK_OFFSET_SECS);
    }

    #[test]
    fn demo_datetime_date_only_is_none() {
        assert_eq!(normalize_demo_datetime("2025-06-01"), None);
        assert_eq!(normalize_demo_datetime("next Tuesday"), None);
        assert_eq!(normalize_demo_datetime(""), None);
    }

    #[test]
    fn record_conversion_keeps_instant() {
        let parsed = parse(r#"{"demo_book_datetime": "2025-06-01T10:00:00Z"}"#);
        let record = parsed.to_record();
        let stored = record.demo_book_datetime.expect("datetime");
        assert_eq!(stored.to_rfc3339(), "2025-06-01T10:00:00+00:00");
    }
}
