use super::prompts::prompt_for;
use crate::error::AnalysisError;
use crate::frame::CapturedFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Settled result of one analysis call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    Text(String),
    Error(String),
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Text(text) => Some(text),
            AnalysisOutcome::Error(_) => None,
        }
    }
}

impl From<Result<String, AnalysisError>> for AnalysisOutcome {
    fn from(result: Result<String, AnalysisError>) -> Self {
        match result {
            Ok(text) => AnalysisOutcome::Text(text),
            Err(e) => AnalysisOutcome::Error(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Succeeded | RequestStatus::Failed)
    }
}

/// One category's request within a batch
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub category: String,
    pub prompt: &'static str,
    pub frame: Arc<CapturedFrame>,
    pub status: RequestStatus,
    pub result: Option<AnalysisOutcome>,
}

impl AnalysisRequest {
    pub fn new(category: impl Into<String>, frame: Arc<CapturedFrame>) -> Self {
        let category = category.into();
        let prompt = prompt_for(&category);
        Self {
            category,
            prompt,
            frame,
            status: RequestStatus::Pending,
            result: None,
        }
    }

    pub fn mark_in_flight(&mut self) {
        self.status = RequestStatus::InFlight;
    }

    /// Record the terminal outcome
    pub fn settle(&mut self, outcome: AnalysisOutcome) {
        self.status = if outcome.is_success() {
            RequestStatus::Succeeded
        } else {
            RequestStatus::Failed
        };
        self.result = Some(outcome);
    }

    pub fn result_text(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.as_text())
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.result {
            Some(AnalysisOutcome::Error(message)) => Some(message),
            _ => None,
        }
    }
}

/// Every request of a batch in selection order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    pub requests: Vec<AnalysisRequest>,
}

impl BatchReport {
    pub fn get(&self, category: &str) -> Option<&AnalysisRequest> {
        self.requests.iter().find(|r| r.category == category)
    }

    pub fn succeeded(&self) -> usize {
        self.count(RequestStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(RequestStatus::Failed)
    }

    fn count(&self, status: RequestStatus) -> usize {
        self.requests.iter().filter(|r| r.status == status).count()
    }
}

/// Result of the single-prompt description
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleResult {
    Described(String),
    Failed(String),
}

impl From<SingleResult> for AnalysisOutcome {
    fn from(result: SingleResult) -> Self {
        match result {
            SingleResult::Described(text) => AnalysisOutcome::Text(text),
            SingleResult::Failed(message) => AnalysisOutcome::Error(message),
        }
    }
}
