//! Contract with the natural-language answer service.
//!
//! The aggregator only renders the session data and the prompt; answering is
//! left to whatever implements [`AnswerService`].

mod render;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SessionError};
use crate::stats::SessionSummary;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question: String,
    pub session_data: Value,
}

impl AnswerRequest {
    pub fn new(summary: &SessionSummary, question: &str) -> Result<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        Ok(Self {
            question: question.to_string(),
            session_data: Value::Object(summary.to_metrics()),
        })
    }

    /// Prompt text combining the session data with the user's question.
    pub fn contextual_prompt(&self) -> String {
        let data = serde_json::to_string_pretty(&self.session_data)
            .unwrap_or_else(|_| self.session_data.to_string());
        format!(
            "You are analyzing real-time detection data from a video monitoring session.\n\n\
             Session Data:\n{data}\n\n\
             User Question: {}\n\n\
             Please provide a detailed, accurate answer based on the detection data provided.",
            self.question
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    pub confidence: String,
    pub timestamp: DateTime<Utc>,
}

pub trait AnswerService: Send + Sync {
    fn answer(&self, request: &AnswerRequest) -> anyhow::Result<Answer>;
}
