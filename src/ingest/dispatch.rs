use anyhow::Result;
use tokio::sync::mpsc;

use crate::ingest::types::DispatchedItem;

#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync {
    /// Hand one new item downstream. An error aborts the current cycle before
    /// the item is recorded, so it will be offered again next time.
    async fn dispatch(&self, item: DispatchedItem) -> Result<()>;
}

/// Forwards items into a bounded tokio channel.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<DispatchedItem>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::Sender<DispatchedItem>) -> Self {
        Self { tx }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<DispatchedItem>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait::async_trait]
impl Dispatcher for ChannelDispatcher {
    async fn dispatch(&self, item: DispatchedItem) -> Result<()> {
        self.tx
            .send(item)
            .await
            .map_err(|_| anyhow::anyhow!("dispatch channel closed"))
    }
}

// --- Test helper ---
pub struct MockDispatcher {
    pub items: parking_lot::Mutex<Vec<DispatchedItem>>,
    fail_on: Option<String>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self {
            items: parking_lot::Mutex::new(vec![]),
            fail_on: None,
        }
    }

    /// Rejects the item with this id (and records nothing for it).
    pub fn failing_on(id: &str) -> Self {
        Self {
            items: parking_lot::Mutex::new(vec![]),
            fail_on: Some(id.to_string()),
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.items
            .lock()
            .iter()
            .map(|i| i.id.clone())
            .collect()
    }
}

impl Default for MockDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Dispatcher for MockDispatcher {
    async fn dispatch(&self, item: DispatchedItem) -> Result<()> {
        if self.fail_on.as_deref() == Some(item.id.as_str()) {
            anyhow::bail!("downstream rejected {}", item.id);
        }
        self.items.lock().push(item);
        Ok(())
    }
}
