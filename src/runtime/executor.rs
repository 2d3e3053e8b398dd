//! Session runtime executor

use super::{Reply, RuntimeChannels, RuntimeMessage, SessionError, SessionEvent};
use crate::gateway::CompletionGateway;
use crate::session::{
    transition, Effect, Event, SessionContext, SessionState, SessionView, TransitionError,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// The generation a session is waiting on
struct InFlight {
    id: u64,
    token: CancellationToken,
    /// Caller whose action started the request
    reply: Option<Reply>,
}

pub struct SessionRuntime<G: CompletionGateway> {
    context: SessionContext,
    state: SessionState,
    created_at: DateTime<Utc>,
    gateway: G,
    rng: StdRng,
    tx: mpsc::Sender<RuntimeMessage>,
    rx: mpsc::Receiver<RuntimeMessage>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    idle_timeout: Duration,
    in_flight: Option<InFlight>,
    next_request_id: u64,
}

impl<G> SessionRuntime<G>
where
    G: CompletionGateway + Clone + 'static,
{
    pub fn new(context: SessionContext, gateway: G, channels: RuntimeChannels) -> Self {
        let state = SessionState::new(context.topic.id.clone());
        Self {
            context,
            state,
            created_at: Utc::now(),
            gateway,
            rng: StdRng::from_entropy(),
            tx: channels.tx,
            rx: channels.rx,
            broadcast_tx: channels.broadcast_tx,
            cancel: channels.cancel,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            in_flight: None,
            next_request_id: 0,
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn view(&self) -> SessionView {
        SessionView::new(&self.state, &self.context, self.created_at)
    }

    /// Process messages until the session is cancelled or idles out
    pub async fn run(mut self) {
        let session_id = self.context.session_id.clone();
        tracing::info!(session_id = %session_id, "Starting session runtime");

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                message = tokio::time::timeout(self.idle_timeout, self.rx.recv()) => {
                    match message {
                        Ok(Some(message)) => self.handle_message(message),
                        Ok(None) => break,
                        // A pending generation has its own timeout; keep waiting for it
                        Err(_) if self.in_flight.is_some() => {}
                        Err(_) => {
                            tracing::info!(session_id = %session_id, "Session idle, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown();
        tracing::info!(session_id = %session_id, "Session runtime stopped");
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
            if let Some(reply) = in_flight.reply {
                let _ = reply.send(Err(SessionError::SessionClosed));
            }
        }
    }

    fn handle_message(&mut self, message: RuntimeMessage) {
        match message {
            RuntimeMessage::Snapshot { reply } => {
                let _ = reply.send(self.view());
            }

            RuntimeMessage::Action { event, reply } => {
                let before = self.next_request_id;
                if let Err(e) = self.process_event(event) {
                    let _ = reply.send(Err(e.into()));
                    return;
                }
                // Hold the reply until the generation the action started resolves
                if self.next_request_id != before {
                    if let Some(in_flight) = self.in_flight.as_mut() {
                        in_flight.reply = Some(reply);
                        return;
                    }
                }
                let _ = reply.send(Ok(self.view()));
            }

            RuntimeMessage::Generation { request_id, event } => {
                let Some(in_flight) = self.in_flight.take_if(|f| f.id == request_id) else {
                    tracing::debug!(
                        session_id = %self.context.session_id,
                        request_id,
                        "Discarding stale generation result"
                    );
                    return;
                };

                let failure = match &event {
                    Event::GenerationFailed { kind, message } => {
                        Some(SessionError::GenerationFailure {
                            kind: *kind,
                            message: message.clone(),
                        })
                    }
                    _ => None,
                };

                let outcome = match self.process_event(event) {
                    Err(e) => {
                        self.release_pending(&e);
                        Err(e.into())
                    }
                    Ok(()) => failure.map_or_else(|| Ok(self.view()), Err),
                };
                if let Some(reply) = in_flight.reply {
                    let _ = reply.send(outcome);
                }
            }
        }
    }

    /// Clear a pending request whose result the state machine refused
    fn release_pending(&mut self, error: &TransitionError) {
        if self.in_flight.is_some() {
            return;
        }
        if let Some(pending) = self.state.pending.take() {
            tracing::warn!(
                session_id = %self.context.session_id,
                kind = %pending.kind(),
                error = %error,
                "Generation result rejected, releasing pending request"
            );
            self.state.last_error = Some(error.to_string());
            let _ = self.broadcast_tx.send(SessionEvent::StateChange {
                view: Box::new(self.view()),
            });
        }
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        // Effects may produce follow-up events; process them in a loop
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(
                        session_id = %self.context.session_id,
                        error = %e,
                        "Transition rejected"
                    );
                    let _ = self.broadcast_tx.send(SessionEvent::Error {
                        message: e.to_string(),
                    });
                    return Err(e);
                }
            };

            self.state = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect) {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::RequestCompletion { request } => {
                let request_id = self.next_request_id;
                self.next_request_id += 1;

                let token = self.cancel.child_token();
                self.in_flight = Some(InFlight {
                    id: request_id,
                    token: token.clone(),
                    reply: None,
                });

                let gateway = self.gateway.clone();
                let tx = self.tx.clone();
                let session_id = self.context.session_id.clone();

                tokio::spawn(async move {
                    tracing::debug!(session_id = %session_id, kind = %request.kind, "Requesting completion");

                    // Race the generation against session teardown
                    tokio::select! {
                        biased;

                        () = token.cancelled() => {
                            tracing::info!(session_id = %session_id, "Generation cancelled");
                        }

                        result = gateway.complete(&request) => {
                            let event = match result {
                                Ok(text) => Event::GenerationSucceeded {
                                    kind: request.kind,
                                    text,
                                },
                                Err(e) => Event::GenerationFailed {
                                    kind: request.kind,
                                    message: e.message,
                                },
                            };
                            let _ = tx.send(RuntimeMessage::Generation { request_id, event }).await;
                        }
                    }
                });

                None
            }

            Effect::SelectVerse { candidates } => {
                if candidates == 0 {
                    tracing::error!(session_id = %self.context.session_id, "Topic has no verses");
                    return None;
                }
                let index = self.rng.gen_range(0..candidates);
                tracing::info!(session_id = %self.context.session_id, index, "Verse selected");
                Some(Event::VerseSelected { index })
            }

            Effect::NotifyStateChange => {
                let _ = self.broadcast_tx.send(SessionEvent::StateChange {
                    view: Box::new(self.view()),
                });
                None
            }

            Effect::NotifyGenerationFailed { kind, message } => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    kind = %kind,
                    error = %message,
                    "Generation failed"
                );
                let _ = self.broadcast_tx.send(SessionEvent::Error {
                    message: format!("{kind} generation failed: {message}"),
                });
                None
            }

            Effect::NotifyComplete => {
                tracing::info!(session_id = %self.context.session_id, "Study complete");
                let _ = self.broadcast_tx.send(SessionEvent::Complete);
                None
            }
        }
    }
}
