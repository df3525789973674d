//! Shared helpers for the lifecycle tests.

#![allow(dead_code)]

use async_trait::async_trait;
use inkling_ai::{ContentGenerationClient, Continuation, GenerationError, GenerationRequest};
use inkling_core::{Config, CoordinatorEvent, Session};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};

pub type Reply = Result<Continuation, GenerationError>;

enum Step {
    Now(Reply),
    Gated(oneshot::Receiver<Reply>),
    Yielding(Reply, usize),
}

/// A client that answers from a script, in order.
///
/// Calls past the end of the script fail with an `Unknown` error.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a successful reply.
    pub fn then_ok(&self, text: &str) -> &Self {
        self.push(Step::Now(Ok(Continuation::from_service(text))))
    }

    /// Queues a failure.
    pub fn then_err(&self, error: GenerationError) -> &Self {
        self.push(Step::Now(Err(error)))
    }

    /// Queues a reply that yields to the runtime `polls` times first.
    pub fn then_slow(&self, reply: Reply, polls: usize) -> &Self {
        self.push(Step::Yielding(reply, polls))
    }

    /// Queues a reply that only arrives when the returned sender fires.
    pub fn then_gated(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.push(Step::Gated(rx));
        tx
    }

    fn push(&self, step: Step) -> &Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

struct Outstanding<'a>(&'a AtomicUsize);

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentGenerationClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn continue_text(&self, request: GenerationRequest) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);
        let _guard = Outstanding(&self.outstanding);

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Now(reply)) => reply,
            Some(Step::Yielding(reply, polls)) => {
                for _ in 0..polls {
                    tokio::task::yield_now().await;
                }
                reply
            }
            Some(Step::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(GenerationError::Unknown("gate dropped".into()))),
            None => Err(GenerationError::Unknown("script exhausted".into())),
        }
    }
}

/// Creates a session over `text` with the cursor at the end.
pub fn session(client: &Arc<ScriptedClient>, text: &str) -> Session {
    session_with(Config::default(), client, text)
}

pub fn session_with(config: Config, client: &Arc<ScriptedClient>, text: &str) -> Session {
    let client: Arc<dyn ContentGenerationClient> = client.clone();
    Session::with_text(config, client, text)
}

/// Collects every event received so far.
pub fn drain(rx: &mut broadcast::Receiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
