//! Test data builders for webhook notifications.
//!
//! Provides builder patterns for provider notifications with configurable
//! properties and sensible defaults, covering both the legacy flat shape
//! and the new `data`-wrapped shape.

use serde_json::{json, Value};
use uuid::Uuid;
use voxlead_core::models::{Agent, AgentId, UserId};
use voxlead_ingest::signature::signed_payload_hmac_hex;

/// Which historical wire format to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// Flat fields at the document root.
    Legacy,
    /// Everything nested under a `data` wrapper.
    New,
}

/// Builder for provider webhook notifications.
pub struct NotificationBuilder {
    shape: WireShape,
    conversation_id: String,
    agent_provider_id: String,
    status: String,
    duration_seconds: i64,
    phone_number: Option<String>,
    transcript: Vec<(String, String, f64)>,
    analysis: Option<String>,
    start_time_unix_secs: Option<i64>,
}

impl NotificationBuilder {
    /// Creates a builder with sensible defaults in the new wire shape.
    pub fn new() -> Self {
        Self {
            shape: WireShape::New,
            conversation_id: format!("conv_{}", Uuid::new_v4().simple()),
            agent_provider_id: "agent_prov_test".to_string(),
            status: "done".to_string(),
            duration_seconds: 61,
            phone_number: Some("+15551230001".to_string()),
            transcript: vec![
                ("agent".to_string(), "Hello, how can I help?".to_string(), 0.0),
                ("user".to_string(), "Tell me about pricing.".to_string(), 4.2),
                ("agent".to_string(), "Happy to walk you through it.".to_string(), 9.7),
            ],
            analysis: None,
            start_time_unix_secs: Some(1_750_000_000),
        }
    }

    /// Switches the emitted wire shape.
    #[must_use]
    pub fn shape(mut self, shape: WireShape) -> Self {
        self.shape = shape;
        self
    }

    /// Sets the conversation id.
    #[must_use]
    pub fn conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = id.into();
        self
    }

    /// Sets the provider agent id.
    #[must_use]
    pub fn agent(mut self, id: impl Into<String>) -> Self {
        self.agent_provider_id = id.into();
        self
    }

    /// Sets the notification status string.
    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Sets the reported duration in seconds.
    #[must_use]
    pub fn duration_seconds(mut self, seconds: i64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Sets or clears the caller phone number.
    #[must_use]
    pub fn phone(mut self, phone: Option<&str>) -> Self {
        self.phone_number = phone.map(ToString::to_string);
        self
    }

    /// Replaces the transcript with the given `(role, message, secs)`
    /// turns.
    #[must_use]
    pub fn transcript(mut self, turns: &[(&str, &str, f64)]) -> Self {
        self.transcript =
            turns.iter().map(|(r, m, t)| (r.to_string(), m.to_string(), *t)).collect();
        self
    }

    /// Drops the transcript entirely.
    #[must_use]
    pub fn without_transcript(mut self) -> Self {
        self.transcript.clear();
        self
    }

    /// Embeds an analytics string.
    #[must_use]
    pub fn analysis(mut self, raw: impl Into<String>) -> Self {
        self.analysis = Some(raw.into());
        self
    }

    /// Builds the notification JSON tree.
    pub fn build(&self) -> Value {
        let transcript: Vec<Value> = self
            .transcript
            .iter()
            .map(|(role, message, secs)| {
                json!({"role": role, "message": message, "time_in_call_secs": secs})
            })
            .collect();

        match self.shape {
            WireShape::New => {
                let mut data = json!({
                    "conversation_id": self.conversation_id,
                    "agent_id": self.agent_provider_id,
                    "status": self.status,
                    "transcript": transcript,
                    "metadata": {
                        "call_duration_secs": self.duration_seconds,
                        "start_time_unix_secs": self.start_time_unix_secs,
                    },
                });
                if let Some(phone) = &self.phone_number {
                    data["metadata"]["phone_call"] = json!({"external_number": phone});
                }
                if let Some(analysis) = &self.analysis {
                    data["analysis"] =
                        json!({"data_collection_results": {"default": {"value": analysis}}});
                }
                json!({"type": "post_call_transcription", "data": data})
            },
            WireShape::Legacy => {
                let mut root = json!({
                    "conversation_id": self.conversation_id,
                    "agent_id": self.agent_provider_id,
                    "status": self.status,
                    "duration_seconds": self.duration_seconds,
                });
                if !transcript.is_empty() {
                    root["transcript"] = Value::Array(transcript);
                }
                if let Some(phone) = &self.phone_number {
                    root["phone_number"] = json!(phone);
                }
                if let Some(analysis) = &self.analysis {
                    root["analysis"] = json!({"value": analysis});
                }
                root
            },
        }
    }

    /// Builds the notification as request body bytes.
    pub fn body(&self) -> Vec<u8> {
        self.build().to_string().into_bytes()
    }
}

impl Default for NotificationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes a valid `t=...,v0=...` signature header for a body.
pub fn signed_header(body: &[u8], secret: &str, timestamp: i64) -> String {
    let digest = signed_payload_hmac_hex(body, &timestamp.to_string(), secret)
        .expect("test secret must key the MAC");
    format!("t={timestamp},v0={digest}")
}

/// A registered agent owned by a fresh user.
pub fn test_agent(provider_agent_id: &str) -> Agent {
    Agent {
        id: AgentId::new(),
        user_id: UserId::new(),
        provider_agent_id: provider_agent_id.to_string(),
        name: "Test Sales Agent".to_string(),
    }
}

/// A realistic well-formed analytics string in the unquoted dict style
/// the upstream model most often emits.
pub fn sample_analytics() -> &'static str {
    "{intent_level: High, intent_score: 3, urgency_level: Medium, urgency_score: 2, \
     budget_constraint: Flexible, budget_score: 3, fit_alignment: Strong, fit_score: 3, \
     engagement_health: Healthy, engagement_score: 2, cta_demo_clicked: True, \
     cta_pricing_clicked: True, cta_followup_clicked: False, cta_sample_clicked: False, \
     cta_escalated_to_human: False, name: Priya Sharma, email: priya@acme.example, \
     company_name: Acme Industries, smart_notification: Hot lead, wants a demo this week, \
     demo_book_datetime: 2025-06-12T15:30:00+05:30}"
}
