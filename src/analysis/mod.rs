mod client;
mod correlation;
mod dispatcher;
pub mod prompts;
mod selection;
mod types;
#[cfg(test)]
mod tests;

pub use client::{AnalysisService, GenerativeClient};
pub use correlation::{BoardEntry, ResultBoard};
pub use dispatcher::AnalysisDispatcher;
pub use selection::CategorySelection;
pub use types::{AnalysisOutcome, AnalysisRequest, BatchReport, RequestStatus, SingleResult};
