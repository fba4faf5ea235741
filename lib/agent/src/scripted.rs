//! A scripted agent for driving deterministic event sequences in tests.

use crate::core::{AgentCore, AgentRequest, AgentRunResult, ModelSource};
use crate::error::AgentError;
use crate::event::AgentEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use runforge_core::Usage;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What one scripted invocation does.
pub enum ScriptedAttempt {
    /// Emit the events, then succeed.
    Succeed {
        output: String,
        usage: Option<Usage>,
        duration_ms: Option<i64>,
        events: Vec<AgentEvent>,
    },
    /// Emit the events, then fail.
    Fail {
        message: String,
        events: Vec<AgentEvent>,
    },
    /// Block until the cancellation token is raised, then report abort.
    Hang,
}

/// An [`AgentCore`] whose invocations replay a queued script, one entry
/// per call. An exhausted script fails the call, so a test that loops
/// more than it scripted surfaces immediately.
pub struct ScriptedAgent {
    provider: String,
    model: String,
    model_source: ModelSource,
    script: Mutex<VecDeque<ScriptedAttempt>>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    /// Creates an agent reporting the given provider/model pair.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            model_source: ModelSource::Env,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Overrides the reported model source.
    #[must_use]
    pub fn with_source(mut self, source: ModelSource) -> Self {
        self.model_source = source;
        self
    }

    /// Queues a scripted invocation.
    pub fn enqueue(&self, attempt: ScriptedAttempt) {
        self.script.lock().push_back(attempt);
    }

    /// Queues a plain success with the given output.
    pub fn enqueue_success(&self, output: &str, usage: Option<Usage>, duration_ms: Option<i64>) {
        self.enqueue(ScriptedAttempt::Succeed {
            output: output.to_string(),
            usage,
            duration_ms,
            events: Vec::new(),
        });
    }

    /// Queues a plain failure with the given message.
    pub fn enqueue_failure(&self, message: &str) {
        self.enqueue(ScriptedAttempt::Fail {
            message: message.to_string(),
            events: Vec::new(),
        });
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentCore for ScriptedAgent {
    async fn run(
        &self,
        _request: AgentRequest,
        cancel: CancellationToken,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<AgentRunResult, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front();
        match step {
            Some(ScriptedAttempt::Succeed {
                output,
                usage,
                duration_ms,
                events: scripted,
            }) => {
                for event in scripted {
                    let _ = events.send(event);
                }
                Ok(AgentRunResult {
                    output,
                    provider: self.provider.clone(),
                    model: self.model.clone(),
                    model_source: self.model_source,
                    usage,
                    duration_ms,
                })
            }
            Some(ScriptedAttempt::Fail {
                message,
                events: scripted,
            }) => {
                for event in scripted {
                    let _ = events.send(event);
                }
                Err(AgentError::Failed { message })
            }
            Some(ScriptedAttempt::Hang) => {
                cancel.cancelled().await;
                Err(AgentError::Aborted)
            }
            None => Err(AgentError::Failed {
                message: "agent script exhausted".to_string(),
            }),
        }
    }
}
