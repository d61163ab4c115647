// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ledger client contract and ordered block retrieval.
//!
//! The ledger is treated as an append-only, ordered log of blocks. The
//! [`LedgerClient`] trait is the only way this crate talks to it; the HTTP
//! gateway in [`crate::network`] is one implementation, tests use in-memory
//! ones.

use std::fmt;
use std::ops::Range;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use custody_kernel::types::{Block, BlockNumber};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::errors::{CustodyError, CustodyResult};

/// Where a block subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartOffset {
    /// Next block committed after the subscription opens.
    Head,
    Block(BlockNumber),
}

impl FromStr for StartOffset {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("head") {
            return Ok(StartOffset::Head);
        }
        s.parse()
            .map(StartOffset::Block)
            .map_err(|_| CustodyError::InvalidInput(format!("invalid start offset {:?}", s)))
    }
}

impl fmt::Display for StartOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOffset::Head => write!(f, "head"),
            StartOffset::Block(n) => write!(f, "{}", n),
        }
    }
}

/// Live block events, in commit order.
pub type BlockEvents = Pin<Box<dyn Stream<Item = CustodyResult<Block>> + Send>>;

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit_transaction(&self, function: &str, args: &[u8]) -> CustodyResult<Vec<u8>>;

    async fn evaluate_transaction(&self, function: &str, args: &[u8]) -> CustodyResult<Vec<u8>>;

    async fn subscribe_blocks(&self, start: StartOffset) -> CustodyResult<BlockEvents>;

    async fn fetch_block_by_number(&self, number: BlockNumber) -> CustodyResult<Block>;

    async fn fetch_block_containing_tx(&self, tx_id: &str) -> CustodyResult<Block>;

    /// Number of committed blocks; the head block is `height - 1`.
    async fn chain_height(&self) -> CustodyResult<BlockNumber>;

    async fn chain_head(&self) -> CustodyResult<Block> {
        let height = self.chain_height().await?;
        if height == 0 {
            return Err(CustodyError::NotFound("chain head (empty ledger)".into()));
        }
        self.fetch_block_by_number(height - 1).await
    }

    /// Fetch `range` in ascending order. Implementations backed by an API
    /// with range queries should override this.
    async fn fetch_blocks(&self, range: Range<BlockNumber>) -> CustodyResult<Vec<Block>> {
        let mut blocks = Vec::with_capacity((range.end.saturating_sub(range.start)) as usize);
        for n in range {
            blocks.push(self.fetch_block_by_number(n).await?);
        }
        Ok(blocks)
    }
}

/// Stream the blocks of `range` strictly in ascending order.
///
/// Blocks are fetched `batch_size` at a time, each batch bounded by
/// `timeout`. A batch out of order or with a gap fails the stream with
/// [`CustodyError::UnexpectedBlock`], a short batch with `NotFound`; the
/// first error ends the stream.
pub fn ordered_blocks<'a>(
    ledger: &'a dyn LedgerClient,
    range: Range<BlockNumber>,
    batch_size: u64,
    timeout: Duration,
) -> impl Stream<Item = CustodyResult<Block>> + Send + 'a {
    let batch_size = batch_size.max(1);
    let end = range.end;

    stream::try_unfold(range.start, move |start| async move {
        if start >= end {
            return Ok(None);
        }
        let stop = start.saturating_add(batch_size).min(end);

        let batch = tokio::time::timeout(timeout, ledger.fetch_blocks(start..stop))
            .await
            .map_err(|_| CustodyError::Timeout {
                what: format!("fetching blocks {}..{}", start, stop),
                after: timeout,
            })??;

        let mut expected = start;
        for block in &batch {
            if block.number != expected {
                return Err(CustodyError::UnexpectedBlock {
                    expected,
                    got: block.number,
                });
            }
            expected += 1;
        }
        if expected != stop {
            return Err(CustodyError::NotFound(format!("block {}", expected)));
        }

        Ok(Some((stream::iter(batch.into_iter().map(Ok::<Block, CustodyError>)), stop)))
    })
    .try_flatten()
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_offset_parse() {
        assert_eq!("head".parse::<StartOffset>().unwrap(), StartOffset::Head);
        assert_eq!("HEAD".parse::<StartOffset>().unwrap(), StartOffset::Head);
        assert_eq!(" 42 ".parse::<StartOffset>().unwrap(), StartOffset::Block(42));
        assert!("latest".parse::<StartOffset>().is_err());
    }

    #[test]
    fn test_start_offset_display_roundtrip() {
        for offset in [StartOffset::Head, StartOffset::Block(7)] {
            assert_eq!(offset.to_string().parse::<StartOffset>().unwrap(), offset);
        }
    }
}
