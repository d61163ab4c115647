// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ledger Block Tracker
//!
//! Holds the data hash of the most recent block observed on a channel.
//!
//! # Lifecycle
//! `Uninitialized` → `Subscribed` ⇄ `Reconnecting` → `Stopped`
//!
//! # Guarantees
//! - The latest value is replaced whole, never edited in place; readers
//!   always see a complete hash.
//! - Observed block numbers only move forward, across reconnects too. A
//!   redelivered or older event is dropped.
//! - While the subscription is down there is no latest value, so callers
//!   fall back to reading the chain head instead of a frozen hash.
//! - Once [`LedgerBlockTracker::stop`] returns, no further event is applied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use custody_kernel::types::{Block, BlockNumber};
use futures::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::errors::{CustodyError, CustodyResult};
use crate::ledger::{BlockEvents, LedgerClient, StartOffset};

const RESUBSCRIBE_BACKOFF_MIN: Duration = Duration::from_millis(100);
const RESUBSCRIBE_BACKOFF_MAX: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedBlock {
    pub number: BlockNumber,
    pub hash: Arc<[u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Subscribed,
    /// Subscription lost; resubscribing with backoff.
    Reconnecting,
    Stopped,
}

enum Lifecycle {
    Uninitialized,
    Subscribed(JoinHandle<()>),
    Stopped,
}

pub struct LedgerBlockTracker {
    channel: String,
    latest: Arc<watch::Sender<Option<ObservedBlock>>>,
    connected: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationToken,
}

impl LedgerBlockTracker {
    pub fn new(channel: impl Into<String>) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            channel: channel.into(),
            latest: Arc::new(latest),
            connected: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            cancel: CancellationToken::new(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn state(&self) -> TrackerState {
        match &*self.lifecycle.lock().await {
            Lifecycle::Uninitialized => TrackerState::Uninitialized,
            Lifecycle::Subscribed(_) if self.connected.load(Ordering::Acquire) => TrackerState::Subscribed,
            Lifecycle::Subscribed(_) => TrackerState::Reconnecting,
            Lifecycle::Stopped => TrackerState::Stopped,
        }
    }

    /// Open the block subscription and start applying events.
    ///
    /// If the event stream later ends, the tracker resubscribes from the
    /// block after the last one it accepted.
    pub async fn start(&self, ledger: Arc<dyn LedgerClient>, offset: StartOffset) -> CustodyResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Uninitialized) {
            return Err(CustodyError::InvalidInput(format!(
                "block tracker for {} already started",
                self.channel
            )));
        }

        let events = ledger.subscribe_blocks(offset).await?;
        tracing::info!("Block tracker subscribed to {} from {}", self.channel, offset);
        self.connected.store(true, Ordering::Release);

        let subscription = Subscription {
            channel: self.channel.clone(),
            ledger,
            offset,
            latest: self.latest.clone(),
            connected: self.connected.clone(),
            cancel: self.cancel.clone(),
        };
        *lifecycle = Lifecycle::Subscribed(tokio::spawn(subscription.run(events)));
        Ok(())
    }

    /// Unsubscribe and wait for the event task to exit.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.cancel.cancel();
        if let Lifecycle::Subscribed(handle) = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            if let Err(e) = handle.await {
                tracing::error!("Block tracker task for {} ended abnormally: {}", self.channel, e);
            }
        }
        self.connected.store(false, Ordering::Release);
        tracing::info!("Block tracker for {} stopped", self.channel);
    }

    pub fn latest(&self) -> Option<ObservedBlock> {
        self.latest.borrow().clone()
    }

    /// Hash of the latest observed block, or `InitializationPending`.
    pub fn current_block_hash(&self) -> CustodyResult<Vec<u8>> {
        self.latest
            .borrow()
            .as_ref()
            .map(|b| b.hash.to_vec())
            .ok_or(CustodyError::InitializationPending)
    }

    /// Like [`current_block_hash`](Self::current_block_hash) but waits up to
    /// `timeout` for an event. Still `InitializationPending` after that.
    pub async fn wait_for_block_hash(&self, timeout: Duration) -> CustodyResult<Vec<u8>> {
        let mut rx = self.latest.subscribe();
        let result = match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(observed)) => (*observed)
                .as_ref()
                .map(|b| b.hash.to_vec())
                .ok_or(CustodyError::InitializationPending),
            Ok(Err(_)) | Err(_) => Err(CustodyError::InitializationPending),
        };
        result
    }

    /// Receiver notified on every accepted block.
    pub fn watch(&self) -> watch::Receiver<Option<ObservedBlock>> {
        self.latest.subscribe()
    }
}

struct Subscription {
    channel: String,
    ledger: Arc<dyn LedgerClient>,
    offset: StartOffset,
    latest: Arc<watch::Sender<Option<ObservedBlock>>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Subscription {
    async fn run(self, mut events: BlockEvents) {
        let mut high_water: Option<BlockNumber> = None;

        loop {
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    event = events.next() => match event {
                        Some(Ok(block)) => {
                            observe(&self.latest, &mut high_water, block);
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Block tracker for {}: bad event: {}", self.channel, e);
                        }
                        None => break,
                    },
                }
            }

            self.latest.send_replace(None);
            self.connected.store(false, Ordering::Release);
            tracing::warn!(
                "Block tracker for {}: subscription ended after block {:?}",
                self.channel,
                high_water
            );

            match self.resubscribe(high_water).await {
                Some(next) => events = next,
                None => return,
            }
            self.connected.store(true, Ordering::Release);
        }
    }

    /// Retry `subscribe_blocks` with exponential backoff. `None` once cancelled.
    async fn resubscribe(&self, high_water: Option<BlockNumber>) -> Option<BlockEvents> {
        let from = match high_water {
            Some(n) => StartOffset::Block(n.saturating_add(1)),
            None => self.offset,
        };
        let mut backoff = RESUBSCRIBE_BACKOFF_MIN;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(backoff) => {}
            }

            match self.ledger.subscribe_blocks(from).await {
                Ok(events) => {
                    tracing::info!("Block tracker resubscribed to {} from {}", self.channel, from);
                    metrics::increment_counter!("custody_tracker_resubscribe_total");
                    return Some(events);
                }
                Err(e) => {
                    tracing::warn!(
                        "Block tracker for {}: resubscribe failed, retrying in {:?}: {}",
                        self.channel,
                        backoff,
                        e
                    );
                    backoff = (backoff * 2).min(RESUBSCRIBE_BACKOFF_MAX);
                }
            }
        }
    }
}

/// Apply one event. Returns false for a stale block.
fn observe(
    latest: &watch::Sender<Option<ObservedBlock>>,
    high_water: &mut Option<BlockNumber>,
    block: Block,
) -> bool {
    let number = block.number;
    if matches!(*high_water, Some(prev) if prev >= number) {
        tracing::debug!("Block tracker: dropped stale block {}", number);
        return false;
    }

    *high_water = Some(number);
    latest.send_replace(Some(ObservedBlock {
        number,
        hash: Arc::from(block.data_hash),
    }));

    tracing::debug!("Block tracker: observed block {}", number);
    metrics::increment_counter!("custody_tracker_blocks_observed_total");
    metrics::gauge!("custody_tracker_latest_block", number as f64);
    true
}
