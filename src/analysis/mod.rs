//! Narrative generation
//!
//! `remote` talks to a chat-completions endpoint; `orchestrator` wraps it
//! with the rule-based fallback so callers always get a narrative.

pub mod orchestrator;
pub mod remote;

pub use orchestrator::{AnalysisError, AnalysisOrchestrator, NarrativeOutcome, NarrativeResult};
pub use remote::{ChatCompletionsClient, RemoteError, RemoteModelClient};
