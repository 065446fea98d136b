use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::backend::TextGenerator;
use crate::error::{BackendError, DispatchError};
use crate::metrics::{
    BACKEND_FAILURES, BACKEND_REQUESTS, BACKEND_TIMEOUTS, COMMANDS_TOTAL, RATE_LIMITED_TOTAL,
    UPDATES_TOTAL,
};
use crate::models::{ChatId, Command, InboundMessage};
use crate::rate_limit::Admission;
use crate::registry::SubscriberRegistry;
use crate::session::SessionStore;
use crate::telegram::Transport;

// Shorter free-text messages are bounced without touching the backend
pub const MIN_MESSAGE_CHARS: usize = 3;

pub mod replies {
    pub const WELCOME: &str = "Glad to see you here! Ask me anything.";
    pub const ALREADY_SUBSCRIBED: &str = "You are already in the system!";
    pub const DISCONNECTED: &str = "You are successfully disconnected!";
    pub const UNKNOWN_COMMAND: &str = "I don't know that command!";
    pub const TOO_SHORT: &str = "Your message is too short. Please send it again with a bit more detail.";
    pub const RATE_LIMITED: &str = "Too many requests. Please wait a minute before asking again.";
    pub const BUSY: &str = "The service is under heavy load right now. Please try again later.";
    pub const BACKEND_FAILED: &str = "Sorry, I could not generate an answer. Please try again.";
    pub const EMPTY_ANSWER: &str = "I have nothing to say to that. Try rephrasing your question.";
    pub const TRY_AGAIN_LATER: &str = "Something went wrong on our side. Please try again later.";
}

/// What happened to one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Subscribed,
    AlreadySubscribed,
    Unsubscribed,
    UnknownCommand,
    Unregistered,
    TooShort,
    Warned,
    Silenced,
    Answered,
    BackendTimeout,
    BackendFailed,
}

pub struct Dispatcher<R, G, T> {
    registry: Arc<R>,
    generator: Arc<G>,
    transport: Arc<T>,
    sessions: Arc<SessionStore>,
    backend_timeout: Duration,
}

impl<R, G, T> Dispatcher<R, G, T>
where
    R: SubscriberRegistry,
    G: TextGenerator,
    T: Transport,
{
    pub fn new(
        registry: Arc<R>,
        generator: Arc<G>,
        transport: Arc<T>,
        sessions: Arc<SessionStore>,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            generator,
            transport,
            sessions,
            backend_timeout,
        }
    }

    /// Consume updates until the channel closes, one task per update with at
    /// most `max_in_flight` running at once. Returns after in-flight tasks
    /// have drained.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundMessage>, max_in_flight: u32) {
        let max_in_flight = max_in_flight.max(1);
        let limiter = Arc::new(Semaphore::new(max_in_flight as usize));
        info!(max_in_flight, "dispatcher started");

        while let Some(msg) = rx.recv().await {
            let Ok(permit) = Arc::clone(&limiter).acquire_owned().await else {
                break;
            };
            let dispatcher = Arc::clone(&self);
            let span = info_span!("update", chat_id = msg.chat_id);

            tokio::spawn(
                async move {
                    match dispatcher.handle(msg).await {
                        Ok(outcome) => debug!(?outcome, "update handled"),
                        Err(e) => error!(error = %e, "update failed"),
                    }
                    drop(permit);
                }
                .instrument(span),
            );
        }

        // wait for every spawned handler to give its permit back
        let _ = limiter.acquire_many(max_in_flight).await;
        info!("dispatcher stopped");
    }

    /// Handle one update. Errors stay local to this update: a registry
    /// failure is answered with a "try again later" reply.
    pub async fn handle(&self, msg: InboundMessage) -> Result<Outcome, DispatchError> {
        UPDATES_TOTAL.inc();
        let chat_id = msg.chat_id;

        match self.process(msg).await {
            Err(DispatchError::Registry(e)) => {
                warn!(chat_id, error = %e, "subscriber store unavailable");
                if let Err(send_err) = self.transport.send(chat_id, replies::TRY_AGAIN_LATER).await {
                    warn!(chat_id, error = %send_err, "could not report store failure");
                }
                Err(DispatchError::Registry(e))
            }
            other => other,
        }
    }

    async fn process(&self, msg: InboundMessage) -> Result<Outcome, DispatchError> {
        let Some(text) = msg.text else {
            return Ok(Outcome::Ignored);
        };

        match msg.command {
            Some(command) => self.handle_command(msg.chat_id, command).await,
            None => self.handle_text(msg.chat_id, &text).await,
        }
    }

    async fn handle_command(&self, chat_id: ChatId, command: Command) -> Result<Outcome, DispatchError> {
        COMMANDS_TOTAL.inc();

        let (outcome, reply) = match command {
            Command::Subscribe => {
                if self.registry.exists(chat_id).await? {
                    (Outcome::AlreadySubscribed, replies::ALREADY_SUBSCRIBED)
                } else {
                    self.registry.insert(chat_id).await?;
                    (Outcome::Subscribed, replies::WELCOME)
                }
            }
            Command::Unsubscribe => {
                self.registry.delete(chat_id).await?;
                // the next free text has to pass the registration gate again
                self.sessions.remove(chat_id);
                (Outcome::Unsubscribed, replies::DISCONNECTED)
            }
            Command::Unknown(name) => {
                debug!(chat_id, command = %name, "unknown command");
                (Outcome::UnknownCommand, replies::UNKNOWN_COMMAND)
            }
        };

        self.transport.send(chat_id, reply).await?;
        Ok(outcome)
    }

    async fn handle_text(&self, chat_id: ChatId, text: &str) -> Result<Outcome, DispatchError> {
        // read before the gate, so an unsubscribe racing this message wins
        let epoch = self.sessions.epoch(chat_id);

        // Registration gates a conversation's first free text only
        if !self.sessions.contains(chat_id) && !self.registry.exists(chat_id).await? {
            debug!(chat_id, "dropping message from unregistered chat");
            return Ok(Outcome::Unregistered);
        }

        let text = text.trim();
        if text.chars().count() < MIN_MESSAGE_CHARS {
            self.transport.send(chat_id, replies::TOO_SHORT).await?;
            return Ok(Outcome::TooShort);
        }

        let Some(admission) = self.sessions.check_in(chat_id, epoch, Instant::now()) else {
            debug!(chat_id, "conversation closed while its message was in flight");
            return Ok(Outcome::Unregistered);
        };

        match admission {
            Admission::Allowed => {}
            Admission::Warn => {
                RATE_LIMITED_TOTAL.inc();
                info!(chat_id, "rate limited, warning sent");
                self.transport.send(chat_id, replies::RATE_LIMITED).await?;
                return Ok(Outcome::Warned);
            }
            Admission::Silenced => {
                RATE_LIMITED_TOTAL.inc();
                return Ok(Outcome::Silenced);
            }
        }

        BACKEND_REQUESTS.inc();
        let (outcome, reply) = match self.generator.generate(text, self.backend_timeout).await {
            Ok(answer) if answer.trim().is_empty() => (Outcome::Answered, replies::EMPTY_ANSWER.to_string()),
            Ok(answer) => (Outcome::Answered, answer),
            Err(BackendError::Timeout(after)) => {
                BACKEND_TIMEOUTS.inc();
                warn!(chat_id, ?after, "backend timed out");
                (Outcome::BackendTimeout, replies::BUSY.to_string())
            }
            Err(e) => {
                BACKEND_FAILURES.inc();
                warn!(chat_id, error = %e, "backend failed");
                (Outcome::BackendFailed, replies::BACKEND_FAILED.to_string())
            }
        };

        self.transport.send(chat_id, &reply).await?;
        Ok(outcome)
    }
}
