//! # Natural-Language Advisor
//!
//! LLM-backed insight and command interface. The rest of the crate only sees
//! the [`TextGenerator`] capability; which concrete backends are tried, and in
//! what order, is decided by a [`CandidateChain`].

pub mod command;
pub mod gemini;
pub mod insight;

pub use command::*;
pub use gemini::*;
pub use insight::*;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvisorError {
    /// Backend missing, unreachable, or returned nothing usable. Try the next one.
    #[error("advisor unavailable: {0}")]
    ServiceUnavailable(String),
    /// Credentials rejected or missing. Other backends share them, so stop.
    #[error("advisor auth error: {0}")]
    Auth(String),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AdvisorError>;

    fn name(&self) -> String {
        "generator".to_string()
    }
}

/// Prioritized backends, tried in order until one answers
#[derive(Clone, Default)]
pub struct CandidateChain {
    candidates: Vec<Arc<dyn TextGenerator>>,
}

impl CandidateChain {
    pub fn new(candidates: Vec<Arc<dyn TextGenerator>>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[async_trait]
impl TextGenerator for CandidateChain {
    async fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
        let mut last_error =
            AdvisorError::ServiceUnavailable("no compatible model backend".to_string());
        for candidate in &self.candidates {
            match candidate.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(AdvisorError::Auth(msg)) => return Err(AdvisorError::Auth(msg)),
                Err(e) => {
                    warn!(
                        backend = %candidate.name(),
                        error = %e,
                        "advisor backend failed, trying next"
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn name(&self) -> String {
        format!("chain[{}]", self.candidates.len())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted generator that counts its calls
    pub struct Scripted {
        pub reply: Result<String, AdvisorError>,
        pub calls: AtomicUsize,
    }

    impl Scripted {
        pub fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn err(e: AdvisorError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(e),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _prompt: &str) -> Result<String, AdvisorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }
}
