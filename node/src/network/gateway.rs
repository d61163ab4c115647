// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::fmt::Display;
use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use custody_kernel::types::{Block, BlockNumber};
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::check_status;
use crate::errors::{CustodyError, CustodyResult};
use crate::ledger::{BlockEvents, LedgerClient, StartOffset};

const COLLABORATOR: &str = "ledger";

#[derive(Deserialize)]
struct HeightResponse {
    height: BlockNumber,
}

/// [`LedgerClient`] over the ledger's REST gateway.
#[derive(Debug, Clone)]
pub struct HttpLedgerGateway {
    base_url: Url,
    channel: String,
    chaincode: String,
    request_timeout: Duration,
    client: Client,
}

impl HttpLedgerGateway {
    pub fn new(url: &str, channel: &str, chaincode: &str, request_timeout: Duration) -> CustodyResult<Self> {
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| CustodyError::lookup(COLLABORATOR, e))?;
        let base_url = Url::parse(url)
            .map_err(|e| CustodyError::InvalidInput(format!("gateway url {:?}: {}", url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CustodyError::InvalidInput(format!("gateway url {:?} cannot carry a path", url)));
        }
        Ok(Self {
            base_url,
            channel: channel.to_string(),
            chaincode: chaincode.to_string(),
            request_timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/channels/<channel>/<segments..>`, each segment percent-encoded.
    fn channel_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push("channels")
                .push(&self.channel)
                .extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> CustodyResult<T> {
        let resp = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| request_error(e, what, self.request_timeout))?;
        let resp = check_status(resp, COLLABORATOR, what)?;
        resp.json()
            .await
            .map_err(|e| CustodyError::lookup(COLLABORATOR, format!("malformed {} response: {}", what, e)))
    }

    async fn invoke(&self, mode: &str, function: &str, args: &[u8]) -> CustodyResult<Vec<u8>> {
        let url = self.channel_url(&["chaincodes", &self.chaincode, "transactions", function, mode]);
        let what = format!("{} {}", mode, function);
        let resp = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(args.to_vec())
            .send()
            .await
            .map_err(|e| request_error(e, &what, self.request_timeout))?;
        let resp = check_status(resp, COLLABORATOR, &what)?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CustodyError::lookup(COLLABORATOR, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerGateway {
    async fn submit_transaction(&self, function: &str, args: &[u8]) -> CustodyResult<Vec<u8>> {
        self.invoke("submit", function, args).await
    }

    async fn evaluate_transaction(&self, function: &str, args: &[u8]) -> CustodyResult<Vec<u8>> {
        self.invoke("evaluate", function, args).await
    }

    async fn subscribe_blocks(&self, start: StartOffset) -> CustodyResult<BlockEvents> {
        let mut url = self.channel_url(&["blocks", "stream"]);
        url.query_pairs_mut().append_pair("start", &start.to_string());
        // No request timeout: the response body is the long-lived subscription.
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CustodyError::lookup(COLLABORATOR, e))?;
        let resp = check_status(resp, COLLABORATOR, "block subscription")?;
        Ok(ndjson_blocks(resp.bytes_stream()))
    }

    async fn fetch_block_by_number(&self, number: BlockNumber) -> CustodyResult<Block> {
        let url = self.channel_url(&["blocks", &number.to_string()]);
        self.get_json(url, &format!("block {}", number)).await
    }

    async fn fetch_block_containing_tx(&self, tx_id: &str) -> CustodyResult<Block> {
        let url = self.channel_url(&["transactions", tx_id, "block"]);
        self.get_json(url, &format!("transaction {}", tx_id)).await
    }

    async fn chain_height(&self) -> CustodyResult<BlockNumber> {
        let url = self.channel_url(&["height"]);
        let resp: HeightResponse = self.get_json(url, "chain height").await?;
        Ok(resp.height)
    }

    async fn fetch_blocks(&self, range: Range<BlockNumber>) -> CustodyResult<Vec<Block>> {
        let mut url = self.channel_url(&["blocks"]);
        url.query_pairs_mut()
            .append_pair("from", &range.start.to_string())
            .append_pair("to", &range.end.to_string());
        self.get_json(url, &format!("blocks {}..{}", range.start, range.end))
            .await
    }
}

fn request_error(e: reqwest::Error, what: &str, after: Duration) -> CustodyError {
    if e.is_timeout() {
        CustodyError::Timeout {
            what: what.to_string(),
            after,
        }
    } else {
        CustodyError::lookup(COLLABORATOR, e)
    }
}

/// Decode a newline-delimited JSON body into block events.
fn ndjson_blocks<S, B, E>(chunks: S) -> BlockEvents
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let chunks = chunks.boxed();

    stream::unfold((chunks, Vec::new()), |(mut chunks, mut buffer)| async move {
        loop {
            if let Some(idx) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=idx).collect();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let event = serde_json::from_slice::<Block>(&line).map_err(|e| {
                    CustodyError::lookup(COLLABORATOR, format!("malformed block event: {}", e))
                });
                return Some((event, (chunks, buffer)));
            }

            match chunks.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(CustodyError::lookup(COLLABORATOR, e)), (chunks, buffer))),
                None => return None,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> + Send + 'static {
        let owned: Vec<Result<Vec<u8>, String>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn test_ndjson_events_split_across_chunks() {
        let events = ndjson_blocks(chunks(&[
            "{\"number\":7,\"data_hash\":\"ab",
            "cd\"}\n\n{\"number\":8,",
            "\"data_hash\":\"ef\"}\n",
        ]));
        let blocks: Vec<Block> = events.map(|e| e.unwrap()).collect().await;
        assert_eq!(blocks, vec![Block::new(7, vec![0xab, 0xcd]), Block::new(8, vec![0xef])]);
    }

    #[tokio::test]
    async fn test_ndjson_malformed_line_is_lookup_failure() {
        let mut events = ndjson_blocks(chunks(&["{\"number\":\"seven\"}\n"]));
        let err = events.next().await.unwrap().unwrap_err();
        assert!(err.is_lookup_failure());
        assert!(events.next().await.is_none());
    }

    #[test]
    fn test_channel_urls() {
        let gw = HttpLedgerGateway::new("http://gw:7080/", "mychannel", "supplychain-cc", Duration::from_secs(1)).unwrap();
        assert_eq!(gw.base_url().as_str(), "http://gw:7080/");
        assert_eq!(gw.channel_url(&["height"]).as_str(), "http://gw:7080/channels/mychannel/height");

        let nested = HttpLedgerGateway::new("http://gw:7080/api/", "mychannel", "cc", Duration::from_secs(1)).unwrap();
        assert_eq!(nested.channel_url(&["height"]).as_str(), "http://gw:7080/api/channels/mychannel/height");
    }

    #[test]
    fn test_transaction_id_stays_one_path_segment() {
        let gw = HttpLedgerGateway::new("http://gw:7080", "mychannel", "cc", Duration::from_secs(1)).unwrap();
        let url = gw.channel_url(&["transactions", "a/b?c#d", "block"]);
        assert_eq!(url.path(), "/channels/mychannel/transactions/a%2Fb%3Fc%23d/block");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_opaque_gateway_url_is_rejected() {
        let err = HttpLedgerGateway::new("mailto:ops@example.com", "mychannel", "cc", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, CustodyError::InvalidInput(_)));
    }
}
