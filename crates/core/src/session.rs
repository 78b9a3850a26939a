//! Keyed conversation store.
//!
//! Each key maps to one conversation guarded by its own async mutex, so two
//! runs can never mutate the same conversation at once while runs on
//! different keys proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use crate::message::Conversation;

pub type SharedConversation = Arc<Mutex<Conversation>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedConversation>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the conversation for `key`, creating it when absent.
    pub fn get_or_create(&self, key: &str, system_prompt: Option<&str>) -> SharedConversation {
        if let Some(existing) = self.get(key) {
            return existing;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                let conversation = match system_prompt {
                    Some(prompt) => Conversation::with_system_prompt(prompt),
                    None => Conversation::new(),
                };
                Arc::new(Mutex::new(conversation))
            })
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<SharedConversation> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Forget a conversation. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
