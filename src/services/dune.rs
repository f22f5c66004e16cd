use futures::future::join_all;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::types::models::RawDuneRow;

pub const API_KEY_HEADER: &str = "X-Dune-API-Key";

#[derive(Error, Debug)]
pub enum DuneError {
    #[error("Dune API key is not configured")]
    MissingApiKey,
    #[error("Invalid Dune URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Dune API error: {status} - {body}")]
    Status { status: StatusCode, body: String },
}

/// Every query the comprehensive dashboard reads, in fan-out order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuneQuery {
    ProtocolActivity,
    UserAnalytics,
    DexComparison,
    StakingAnalytics,
    DexMetrics,
    UserBehavior,
    TransactionAnalysis,
    NetworkStats,
    ProtocolMetrics,
    TokenBalances,
    DexTradingVolume,
    ActivityPatterns,
    NetworkOverview,
    AllTimeTransactions,
    BlockTimes,
}

impl DuneQuery {
    pub const ALL: [DuneQuery; 15] = [
        DuneQuery::ProtocolActivity,
        DuneQuery::UserAnalytics,
        DuneQuery::DexComparison,
        DuneQuery::StakingAnalytics,
        DuneQuery::DexMetrics,
        DuneQuery::UserBehavior,
        DuneQuery::TransactionAnalysis,
        DuneQuery::NetworkStats,
        DuneQuery::ProtocolMetrics,
        DuneQuery::TokenBalances,
        DuneQuery::DexTradingVolume,
        DuneQuery::ActivityPatterns,
        DuneQuery::NetworkOverview,
        DuneQuery::AllTimeTransactions,
        DuneQuery::BlockTimes,
    ];

    pub fn id(self) -> u64 {
        match self {
            DuneQuery::ProtocolActivity => 5699127,
            DuneQuery::UserAnalytics => 4045225,
            DuneQuery::DexComparison => 3431742,
            DuneQuery::StakingAnalytics => 5091227,
            DuneQuery::DexMetrics => 3442811,
            DuneQuery::UserBehavior => 4045138,
            DuneQuery::TransactionAnalysis => 4045024,
            DuneQuery::NetworkStats => 3468810,
            DuneQuery::ProtocolMetrics => 3468830,
            DuneQuery::TokenBalances => 5699610,
            DuneQuery::DexTradingVolume => 5699630,
            DuneQuery::ActivityPatterns => 5699668,
            DuneQuery::NetworkOverview => 5699670,
            DuneQuery::AllTimeTransactions => 5699671,
            DuneQuery::BlockTimes => 5699672,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DuneQuery::ProtocolActivity => "PROTOCOL_ACTIVITY",
            DuneQuery::UserAnalytics => "USER_ANALYTICS",
            DuneQuery::DexComparison => "DEX_COMPARISON",
            DuneQuery::StakingAnalytics => "STAKING_ANALYTICS",
            DuneQuery::DexMetrics => "DEX_METRICS",
            DuneQuery::UserBehavior => "USER_BEHAVIOR",
            DuneQuery::TransactionAnalysis => "TRANSACTION_ANALYSIS",
            DuneQuery::NetworkStats => "NETWORK_STATS",
            DuneQuery::ProtocolMetrics => "PROTOCOL_METRICS",
            DuneQuery::TokenBalances => "TOKEN_BALANCES",
            DuneQuery::DexTradingVolume => "DEX_TRADING_VOLUME",
            DuneQuery::ActivityPatterns => "ACTIVITY_PATTERNS",
            DuneQuery::NetworkOverview => "NETWORK_OVERVIEW",
            DuneQuery::AllTimeTransactions => "ALL_TIME_TRANSACTIONS",
            DuneQuery::BlockTimes => "BLOCK_TIMES",
        }
    }
}

#[derive(Deserialize)]
struct QueryResultsResponse {
    result: Option<QueryResult>,
}

#[derive(Deserialize)]
struct QueryResult {
    rows: Option<Vec<RawDuneRow>>,
}

/// Rows of every query after the fan-out settled. A failed query holds no rows.
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    pub protocol_activity: Vec<RawDuneRow>,
    pub user_analytics: Vec<RawDuneRow>,
    pub dex_comparison: Vec<RawDuneRow>,
    pub staking_analytics: Vec<RawDuneRow>,
    pub dex_metrics: Vec<RawDuneRow>,
    pub user_behavior: Vec<RawDuneRow>,
    pub transaction_analysis: Vec<RawDuneRow>,
    pub network_stats: Vec<RawDuneRow>,
    pub protocol_metrics: Vec<RawDuneRow>,
    pub token_balances: Vec<RawDuneRow>,
    pub dex_trading_volume: Vec<RawDuneRow>,
    pub activity_patterns: Vec<RawDuneRow>,
    pub network_overview: Vec<RawDuneRow>,
    pub all_time_transactions: Vec<RawDuneRow>,
    pub block_times: Vec<RawDuneRow>,
    /// Number of queries that completed without error.
    pub succeeded: usize,
}

impl SourceRows {
    pub fn slot_mut(&mut self, query: DuneQuery) -> &mut Vec<RawDuneRow> {
        match query {
            DuneQuery::ProtocolActivity => &mut self.protocol_activity,
            DuneQuery::UserAnalytics => &mut self.user_analytics,
            DuneQuery::DexComparison => &mut self.dex_comparison,
            DuneQuery::StakingAnalytics => &mut self.staking_analytics,
            DuneQuery::DexMetrics => &mut self.dex_metrics,
            DuneQuery::UserBehavior => &mut self.user_behavior,
            DuneQuery::TransactionAnalysis => &mut self.transaction_analysis,
            DuneQuery::NetworkStats => &mut self.network_stats,
            DuneQuery::ProtocolMetrics => &mut self.protocol_metrics,
            DuneQuery::TokenBalances => &mut self.token_balances,
            DuneQuery::DexTradingVolume => &mut self.dex_trading_volume,
            DuneQuery::ActivityPatterns => &mut self.activity_patterns,
            DuneQuery::NetworkOverview => &mut self.network_overview,
            DuneQuery::AllTimeTransactions => &mut self.all_time_transactions,
            DuneQuery::BlockTimes => &mut self.block_times,
        }
    }

    /// Fold settled fetch results into per-source rows; errors become empty sources.
    pub fn from_settled<I>(settled: I) -> Self
    where
        I: IntoIterator<Item = (DuneQuery, Result<Vec<RawDuneRow>, DuneError>)>,
    {
        let mut sources = SourceRows::default();
        for (query, result) in settled {
            match result {
                Ok(rows) => {
                    tracing::debug!("Query {} ({}) returned {} rows", query.name(), query.id(), rows.len());
                    sources.succeeded += 1;
                    *sources.slot_mut(query) = rows;
                }
                Err(e) => {
                    tracing::error!("Query {} ({}) failed: {}", query.name(), query.id(), e);
                }
            }
        }
        sources
    }
}

#[derive(Clone)]
pub struct DuneClient {
    client: Client,
    api_url: Url,
    api_key: Option<String>,
}

impl DuneClient {
    pub fn new(api_url: &str, api_key: Option<String>) -> Result<Self, DuneError> {
        let api_url = Url::parse(api_url).map_err(|e| DuneError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            client: Client::new(),
            api_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn results_url(&self, query_id: u64) -> Url {
        let mut url = self.api_url.clone();
        url.set_path(&format!("/api/v1/query/{}/results", query_id));
        url
    }

    pub async fn fetch_query_rows(&self, query_id: u64) -> Result<Vec<RawDuneRow>, DuneError> {
        let api_key = self.api_key.as_deref().ok_or(DuneError::MissingApiKey)?;

        let response = self
            .client
            .get(self.results_url(query_id))
            .header(API_KEY_HEADER, api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(DuneError::Status { status, body });
        }

        let data: QueryResultsResponse = response.json().await?;
        Ok(data.result.and_then(|r| r.rows).unwrap_or_default())
    }

    /// Issue every catalogue query at once and wait for all of them. Individual
    /// failures are kept per query and never cancel the siblings.
    pub async fn fetch_all(&self) -> Vec<(DuneQuery, Result<Vec<RawDuneRow>, DuneError>)> {
        let futures = DuneQuery::ALL.iter().map(|query| async move {
            (*query, self.fetch_query_rows(query.id()).await)
        });
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn catalogue_ids_are_unique() {
        let mut ids: Vec<u64> = DuneQuery::ALL.iter().map(|q| q.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), DuneQuery::ALL.len());
    }

    #[tokio::test]
    async fn fetches_rows_with_api_key() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/query/5699127/results")
                .header(API_KEY_HEADER, "secret");
            then.status(200).header("content-type", "application/json").json_body(json!({
                "result": { "rows": [{ "total_transactions": "1200" }] }
            }));
        });

        let client = DuneClient::new(&server.base_url(), Some("secret".to_string())).unwrap();
        let rows = client.fetch_query_rows(5699127).await.unwrap();

        mock.assert();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["total_transactions"], json!("1200"));
    }

    #[tokio::test]
    async fn missing_result_is_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/query/1/results");
            then.status(200).json_body(json!({ "state": "QUERY_STATE_PENDING" }));
        });

        let client = DuneClient::new(&server.base_url(), Some("k".to_string())).unwrap();
        assert!(client.fetch_query_rows(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/query/2/results");
            then.status(429).body("slow down");
        });

        let client = DuneClient::new(&server.base_url(), Some("k".to_string())).unwrap();
        match client.fetch_query_rows(2).await {
            Err(DuneError::Status { status, body }) => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_key_is_treated_as_missing() {
        let client = DuneClient::new("http://127.0.0.1:9", Some("  ".to_string())).unwrap();
        assert!(!client.has_api_key());
        assert!(matches!(client.fetch_query_rows(1).await, Err(DuneError::MissingApiKey)));
    }

    #[test]
    fn settled_failures_become_empty_sources() {
        let mut row = RawDuneRow::new();
        row.insert("n_sig".to_string(), json!(10));

        let sources = SourceRows::from_settled(vec![
            (DuneQuery::ProtocolActivity, Err(DuneError::MissingApiKey)),
            (DuneQuery::UserBehavior, Ok(vec![row])),
        ]);

        assert_eq!(sources.succeeded, 1);
        assert!(sources.protocol_activity.is_empty());
        assert_eq!(sources.user_behavior.len(), 1);
    }
}
