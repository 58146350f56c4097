use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::adapter::{Adapter, AdapterConfig, DeliveryResult};
use crate::address::Address;
use crate::message::Email;

/// In-memory [`Adapter`] for development and testing.
///
/// Delivered emails are stored in a `Vec` behind a mutex. Clones share the
/// same mailbox. Nothing is sent anywhere and nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    sent: Arc<Mutex<Vec<Email<Address>>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every email delivered so far, oldest first.
    pub async fn sent(&self) -> Vec<Email<Address>> {
        self.sent.lock().await.clone()
    }

    /// Remove and return every delivered email.
    pub async fn take(&self) -> Vec<Email<Address>> {
        std::mem::take(&mut *self.sent.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sent.lock().await.is_empty()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn deliver(&self, email: &Email<Address>, _config: &AdapterConfig) -> DeliveryResult {
        let mut sent = self.sent.lock().await;
        sent.push(email.clone());
        Ok(json!({ "id": sent.len() }))
    }
}
