// in-memory stand-ins for the registry, backend and transport

use dashmap::{DashMap, DashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::TextGenerator;
use crate::error::{BackendError, RegistryError, TransportError};
use crate::models::{ChatId, Command, InboundMessage};
use crate::registry::SubscriberRegistry;
use crate::telegram::Transport;

pub fn text_msg(chat_id: ChatId, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id,
        text: Some(text.to_string()),
        command: None,
    }
}

pub fn command_msg(chat_id: ChatId, command: Command) -> InboundMessage {
    InboundMessage {
        chat_id,
        text: Some("/command".to_string()),
        command: Some(command),
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    ids: DashSet<ChatId>,
    pub failing: AtomicBool,
    exists_delay: Mutex<Option<Duration>>,
}

impl MemoryRegistry {
    pub fn with(ids: &[ChatId]) -> Self {
        let registry = Self::default();
        for id in ids {
            registry.ids.insert(*id);
        }
        registry
    }

    pub fn contains(&self, id: ChatId) -> bool {
        self.ids.contains(&id)
    }

    // `exists` answers from the set as it was, then stalls for `delay`
    pub fn slow_exists(&self, delay: Duration) {
        *self.exists_delay.lock().unwrap() = Some(delay);
    }

    fn check(&self) -> Result<(), RegistryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

impl SubscriberRegistry for MemoryRegistry {
    async fn insert(&self, id: ChatId) -> Result<(), RegistryError> {
        self.check()?;
        self.ids.insert(id);
        Ok(())
    }

    async fn delete(&self, id: ChatId) -> Result<(), RegistryError> {
        self.check()?;
        self.ids.remove(&id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ChatId>, RegistryError> {
        self.check()?;
        let mut ids: Vec<_> = self.ids.iter().map(|id| *id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn exists(&self, id: ChatId) -> Result<bool, RegistryError> {
        self.check()?;
        let found = self.ids.contains(&id);
        let delay = *self.exists_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(found)
    }
}

// Records every outbound message; sends to ids in `fail_for` error out
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ChatId, String)>>,
    fail_for: DashSet<ChatId>,
}

impl RecordingTransport {
    pub fn failing_for(ids: &[ChatId]) -> Self {
        let transport = Self::default();
        for id in ids {
            transport.fail_for.insert(*id);
        }
        transport
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == id)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError> {
        if self.fail_for.contains(&chat_id) {
            return Err(TransportError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Script {
    Echo,
    Timeout,
    Quota,
}

// Answers "answer: <prompt>" unless scripted to fail
pub struct ScriptedGenerator {
    pub calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    scripts: DashMap<String, Script>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            scripts: DashMap::new(),
        }
    }

    pub fn script(&self, prompt: &str, script: Script) {
        self.scripts.insert(prompt.to_string(), script);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let script = self
            .scripts
            .get(prompt)
            .map(|s| *s)
            .unwrap_or(Script::Echo);
        match script {
            Script::Echo => Ok(format!("answer: {prompt}")),
            Script::Timeout => Err(BackendError::Timeout(timeout)),
            Script::Quota => Err(BackendError::QuotaOrUpstream(
                "You exceeded your current quota".to_string(),
            )),
        }
    }
}
