//! Socket event parsing and per-job completion routing.
//!
//! One socket carries events for every job queued under this client id.
//! The [`CompletionRouter`] hands each terminal event to the waiter
//! registered for that job id and nobody else. Outcomes for jobs nobody is
//! waiting on yet are buffered, since a fast job can finish before the
//! caller gets around to waiting for it.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::GenerationError;

/// Outcomes kept for jobs with no registered waiter.
const EARLY_OUTCOME_LIMIT: usize = 32;

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// An image written by an output node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputImage {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_folder_type")]
    pub folder_type: String,
}

fn default_folder_type() -> String {
    "output".to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A node started; `node == None` means the whole job is done.
    Executing {
        prompt_id: String,
        node: Option<String>,
    },
    /// An output node finished.
    Executed {
        prompt_id: String,
        images: Vec<OutputImage>,
    },
    ExecutionError {
        prompt_id: String,
        message: String,
    },
    Interrupted {
        prompt_id: String,
    },
    /// Status, progress and anything else not tied to completion.
    Other(String),
}

impl EngineEvent {
    /// Parse one text frame. Frames that are not JSON events yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let raw: RawEvent = serde_json::from_str(text).ok()?;
        let prompt_id = || {
            raw.data
                .get("prompt_id")
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let event = match raw.kind.as_str() {
            "executing" => EngineEvent::Executing {
                prompt_id: prompt_id()?,
                node: raw.data.get("node").and_then(|n| match n {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
            },
            "executed" => EngineEvent::Executed {
                prompt_id: prompt_id()?,
                images: raw
                    .data
                    .pointer("/output/images")
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default(),
            },
            "execution_error" => EngineEvent::ExecutionError {
                prompt_id: prompt_id()?,
                message: describe_error(&raw.data),
            },
            "execution_interrupted" => EngineEvent::Interrupted {
                prompt_id: prompt_id()?,
            },
            other => EngineEvent::Other(other.to_string()),
        };
        Some(event)
    }

    pub fn prompt_id(&self) -> Option<&str> {
        match self {
            EngineEvent::Executing { prompt_id, .. }
            | EngineEvent::Executed { prompt_id, .. }
            | EngineEvent::ExecutionError { prompt_id, .. }
            | EngineEvent::Interrupted { prompt_id } => Some(prompt_id),
            EngineEvent::Other(_) => None,
        }
    }

    /// The terminal outcome this event carries, if any.
    fn into_outcome(self) -> Option<(String, JobOutcome)> {
        match self {
            EngineEvent::Executed { prompt_id, images } if !images.is_empty() => {
                Some((prompt_id, JobOutcome::Images(images)))
            }
            EngineEvent::Executing {
                prompt_id,
                node: None,
            } => Some((prompt_id, JobOutcome::Finished)),
            EngineEvent::ExecutionError { prompt_id, message } => {
                Some((prompt_id, JobOutcome::Failed(message)))
            }
            EngineEvent::Interrupted { prompt_id } => Some((
                prompt_id,
                JobOutcome::Failed("execution interrupted".to_string()),
            )),
            _ => None,
        }
    }
}

fn describe_error(data: &Value) -> String {
    let field = |key: &str| data.get(key).and_then(Value::as_str);
    match (field("node_type"), field("exception_message")) {
        (Some(node), Some(message)) => format!("{}: {}", node, message.trim()),
        (None, Some(message)) => message.trim().to_string(),
        _ => data.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// An output node reported images.
    Images(Vec<OutputImage>),
    /// The job ended without reporting images over the socket (e.g. every
    /// node was cached); outputs must be read from history.
    Finished,
    Failed(String),
}

#[derive(Default)]
struct RouterState {
    waiters: HashMap<String, oneshot::Sender<JobOutcome>>,
    early: VecDeque<(String, JobOutcome)>,
    /// Set while the socket is down; new waiters fail with this reason.
    closed: Option<String>,
}

/// Routes terminal job events to exactly one waiter per job id.
#[derive(Clone, Default)]
pub struct CompletionRouter {
    state: Arc<Mutex<RouterState>>,
}

impl CompletionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register interest in `job_id`. An outcome that already arrived is
    /// delivered immediately, as is a failure while the socket is closed.
    pub fn register(&self, job_id: &str) -> CompletionWaiter {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if let Some(pos) = state.early.iter().position(|(id, _)| id == job_id) {
            if let Some((_, outcome)) = state.early.remove(pos) {
                let _ = tx.send(outcome);
            }
        } else if let Some(reason) = &state.closed {
            log::warn!("Job {} registered after socket close: {}", job_id, reason);
            let _ = tx.send(JobOutcome::Failed(reason.clone()));
        } else {
            state.waiters.insert(job_id.to_string(), tx);
        }
        CompletionWaiter {
            job_id: job_id.to_string(),
            rx,
            router: self.clone(),
        }
    }

    /// Route one event. Non-terminal events are ignored.
    pub fn dispatch(&self, event: EngineEvent) {
        if let EngineEvent::Executing {
            prompt_id,
            node: Some(node),
        } = &event
        {
            log::trace!("Job {} executing node {}", prompt_id, node);
        }

        let Some((job_id, outcome)) = event.into_outcome() else {
            return;
        };

        let mut state = self.lock();
        if let Some(tx) = state.waiters.remove(&job_id) {
            // A dropped receiver means the waiter gave up; nothing to do.
            let _ = tx.send(outcome);
            return;
        }

        if state.early.len() >= EARLY_OUTCOME_LIMIT {
            state.early.pop_front();
        }
        state.early.push_back((job_id, outcome));
    }

    /// Parse and route one text frame from the socket.
    pub fn dispatch_text(&self, text: &str) {
        match EngineEvent::parse(text) {
            Some(event) => self.dispatch(event),
            None => log::debug!("Ignoring unparseable engine message"),
        }
    }

    /// Fail every registered waiter and every later registration until
    /// [`reopen`](Self::reopen). Called when the socket closes.
    pub fn fail_all(&self, reason: &str) {
        let waiters: Vec<_> = {
            let mut state = self.lock();
            state.closed = Some(reason.to_string());
            state.waiters.drain().collect()
        };
        for (job_id, tx) in waiters {
            log::warn!("Job {} abandoned: {}", job_id, reason);
            let _ = tx.send(JobOutcome::Failed(reason.to_string()));
        }
    }

    /// Accept waiters again after a new socket handshake.
    pub fn reopen(&self) {
        self.lock().closed = None;
    }

    /// Number of registered waiters.
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    fn unregister(&self, job_id: &str) {
        self.lock().waiters.remove(job_id);
    }
}

/// Waits for a single job's outcome. Dropping it unregisters the job.
pub struct CompletionWaiter {
    job_id: String,
    rx: oneshot::Receiver<JobOutcome>,
    router: CompletionRouter,
}

impl CompletionWaiter {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<JobOutcome, GenerationError> {
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, &mut self.rx)
                .await
                .map_err(|_| GenerationError::Timeout(limit.as_secs()))?,
            None => (&mut self.rx).await,
        };
        received.map_err(|_| {
            GenerationError::WebSocketError(format!(
                "connection dropped while waiting for job {}",
                self.job_id
            ))
        })
    }
}

impl Drop for CompletionWaiter {
    fn drop(&mut self) {
        self.router.unregister(&self.job_id);
    }
}
