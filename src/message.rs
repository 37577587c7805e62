use std::sync::{PoisonError, RwLock};

/// Ordered log of human-readable status messages
///
/// Append-only until cleared. Shared between the hero service, which only
/// writes, and whatever presentation layer displays the messages.
#[derive(Debug, Default)]
pub struct MessageService {
  messages: RwLock<Vec<String>>,
}

impl MessageService {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a message to the end of the log
  pub fn add(&self, message: impl Into<String>) {
    let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);
    messages.push(message.into());
  }

  /// Drop every message
  pub fn clear(&self) {
    let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);
    *messages = Vec::new();
  }

  /// Snapshot of the log in insertion order
  pub fn messages(&self) -> Vec<String> {
    self
      .messages
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn len(&self) -> usize {
    self.messages.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
