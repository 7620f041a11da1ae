//! Cosmos SDK REST (gRPC-gateway) implementation of [`ChainReader`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::api::ChainReader;
use crate::config::RateLimitConfig;
use crate::constants::TX_QUERY_PAGE_LIMIT;
use crate::errors::{DropError, DropResult};
use crate::rpc::rate_limiter::RpcRateLimiter;
use crate::types::{Address, Amount, TxLog, TxLookup};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RATE_LIMITED_BACKOFF_MS: u64 = 1_000;

/// Cosmos encodes 64-bit integers as JSON strings.
fn int_from_str_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(i64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct LatestBlockResponse {
    block: BlockBody,
}

#[derive(Debug, Deserialize)]
struct BlockBody {
    header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    #[serde(deserialize_with = "int_from_str_or_number")]
    height: i64,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    txhash: String,
    #[serde(default, deserialize_with = "int_from_str_or_number")]
    height: i64,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    logs: Vec<TxLog>,
}

impl From<TxResponse> for TxLookup {
    fn from(tx: TxResponse) -> Self {
        TxLookup {
            txhash: tx.txhash,
            height: tx.height,
            code: tx.code,
            raw_log: tx.raw_log,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TxsByEventResponse {
    #[serde(default)]
    tx_responses: Vec<TxResponse>,
    #[serde(default)]
    pagination: Option<PageResponse>,
    /// Top-level count used by SDK 0.47+, where `pagination` is null.
    #[serde(default, deserialize_with = "int_from_str_or_number")]
    total: i64,
}

impl TxsByEventResponse {
    fn total(&self) -> Option<u64> {
        let total = match &self.pagination {
            Some(page) if page.total > 0 => page.total,
            _ => self.total,
        };
        (total > 0).then_some(total as u64)
    }
}

/// Keep paging while the reported total is not reached, or while pages come back full.
fn has_more_pages(fetched: u64, offset: u64, total: Option<u64>) -> bool {
    if fetched == 0 {
        return false;
    }
    fetched >= TX_QUERY_PAGE_LIMIT || total.is_some_and(|total| offset < total)
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default, deserialize_with = "int_from_str_or_number")]
    total: i64,
}

#[derive(Debug, Deserialize)]
struct GetTxResponse {
    tx_response: Option<TxResponse>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Option<CoinResponse>,
}

#[derive(Debug, Deserialize)]
struct CoinResponse {
    amount: Amount,
}

/// Chain reader backed by the REST gateway of a full node.
pub struct RestChainReader {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RpcRateLimiter>,
}

impl RestChainReader {
    pub fn new(endpoint: &str, rate_limit: RateLimitConfig) -> DropResult<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(DropError::invalid_config("endpoint must not be empty"));
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: endpoint.to_string(),
            limiter: Arc::new(RpcRateLimiter::new(rate_limit)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    /// GET `path`; a 404 is an [`DropError::Rpc`] error.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> DropResult<T> {
        let value = self.get_json_optional(path, query).await?;
        value.ok_or_else(|| DropError::Rpc {
            status: StatusCode::NOT_FOUND.as_u16(),
            message: format!("{} not found", path),
        })
    }

    /// GET `path`, returning `None` on 404.
    async fn get_json_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> DropResult<Option<T>> {
        self.limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::trace!(url = %url, "REST query");
        let response = self.http.get(&url).query(query).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DropError::RateLimited {
                retry_after_ms: RATE_LIMITED_BACKOFF_MS,
            });
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DropError::Rpc {
                status: status.as_u16(),
                message: body,
            });
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| DropError::UnexpectedResponse(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl ChainReader for RestChainReader {
    async fn current_height(&self) -> DropResult<i64> {
        let path = "/cosmos/base/tendermint/v1beta1/blocks/latest";
        let latest: LatestBlockResponse = self.get_json(path, &[]).await?;
        Ok(latest.block.header.height)
    }

    async fn block_tx_logs(&self, height: i64) -> DropResult<Vec<TxLog>> {
        let path = "/cosmos/tx/v1beta1/txs";
        let mut logs = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let query = [
                ("events", format!("tx.height={}", height)),
                ("pagination.limit", TX_QUERY_PAGE_LIMIT.to_string()),
                ("pagination.offset", offset.to_string()),
                ("pagination.count_total", "true".to_string()),
                ("order_by", "ORDER_BY_ASC".to_string()),
            ];
            let page: TxsByEventResponse = self.get_json(path, &query).await?;
            let total = page.total();

            let fetched = page.tx_responses.len() as u64;
            for tx in page.tx_responses {
                if tx.code != 0 {
                    tracing::trace!(height, txhash = %tx.txhash, code = tx.code, "Skipping failed tx");
                    continue;
                }
                logs.extend(tx.logs);
            }

            offset += fetched;
            if !has_more_pages(fetched, offset, total) {
                break;
            }
        }

        Ok(logs)
    }

    async fn account_balance(&self, address: &Address, denom: &str) -> DropResult<Amount> {
        let path = format!("/cosmos/bank/v1beta1/balances/{}/by_denom", address);
        let response: BalanceResponse = self
            .get_json(&path, &[("denom", denom.to_string())])
            .await?;

        Ok(response.balance.map_or(Amount::ZERO, |coin| coin.amount))
    }

    async fn tx_by_hash(&self, hash: &str) -> DropResult<TxLookup> {
        let path = format!("/cosmos/tx/v1beta1/txs/{}", hash);
        let response: Option<GetTxResponse> = self.get_json_optional(&path, &[]).await?;

        Ok(response
            .and_then(|r| r.tx_response)
            .map(TxLookup::from)
            .unwrap_or_default())
    }
}
