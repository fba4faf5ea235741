//! The agent driver: owns one agent invocation per attempt.
//!
//! The driver forwards every agent event into the journal (in delivery
//! order), races the invocation against the attempt's cancellation
//! token and the phase-timeout budget, and synthesizes the
//! `model_resolved` status event after a successful call.

use crate::core::{AgentCore, AgentRequest, AgentRunResult};
use crate::error::AgentError;
use crate::event::AgentEventKind;
use crate::sink::EventSink;
use runforge_journal::{EventJournal, EventType};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Timeouts bounding the agent call. The plan/build split lives inside
/// the agent core; the driver enforces their sum as the overall budget.
#[derive(Debug, Clone)]
pub struct PhaseTimeouts {
    /// Budget for the planning phase.
    pub plan: Duration,
    /// Budget for the build phase.
    pub build: Duration,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self {
            plan: Duration::from_secs(60 * 60),
            build: Duration::from_secs(10 * 60 * 60),
        }
    }
}

impl PhaseTimeouts {
    /// The overall budget for one invocation.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.plan + self.build
    }
}

/// Drives one agent invocation per attempt.
pub struct AgentDriver {
    agent: Arc<dyn AgentCore>,
    timeouts: PhaseTimeouts,
}

impl AgentDriver {
    /// Creates a driver over the given agent core.
    #[must_use]
    pub fn new(agent: Arc<dyn AgentCore>, timeouts: PhaseTimeouts) -> Self {
        Self { agent, timeouts }
    }

    /// Runs the agent once.
    ///
    /// Events stream into the journal as they arrive; `status` payloads
    /// are also copied to `status_tap` when provided (the sandbox
    /// supervisor reconciles sandbox ids from them). When the token is
    /// raised, forwarding stops and the call is aborted.
    pub async fn run(
        &self,
        request: AgentRequest,
        cancel: CancellationToken,
        journal: Arc<dyn EventJournal>,
        status_tap: Option<mpsc::UnboundedSender<JsonValue>>,
    ) -> Result<AgentRunResult, AgentError> {
        let run_id = request.run_id;
        let sink = EventSink::spawn(Arc::clone(&journal), run_id);
        let sink_tx = sink.sender();
        let (tx, mut rx) = mpsc::unbounded_channel::<crate::event::AgentEvent>();

        let forward_cancel = cancel.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if forward_cancel.is_cancelled() {
                    break;
                }
                if event.kind == AgentEventKind::Status
                    && let Some(tap) = &status_tap
                {
                    let _ = tap.send(event.payload.clone());
                }
                let _ = sink_tx.send(event);
            }
        });

        let budget = self.timeouts.total();
        let agent_result = tokio::select! {
            () = cancel.cancelled() => Err(AgentError::Aborted),
            timed = tokio::time::timeout(budget, self.agent.run(request, cancel.clone(), tx)) => {
                match timed {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::TimedOut { after: budget }),
                }
            }
        };

        // The agent future (and its sender) is gone either way, so the
        // forward loop drains whatever was already delivered and exits.
        forward.await.ok();
        let flush_result = sink.flush().await;

        let result = agent_result?;
        flush_result.map_err(|e| AgentError::Failed {
            message: format!("event journal write failed: {e}"),
        })?;

        journal
            .append(
                run_id,
                EventType::Status,
                json!({
                    "status": "model_resolved",
                    "provider": result.provider,
                    "model": result.model,
                    "modelSource": result.model_source.as_str(),
                }),
            )
            .await
            .map_err(|e| AgentError::Failed {
                message: format!("event journal write failed: {e}"),
            })?;

        Ok(result)
    }
}
