use std::any::Any;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use crate::services::dune::{DuneQuery, SourceRows};
use crate::services::report::assemble;
use super::error::ApiError;
use super::state::AppState;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    }
}

pub async fn get_comprehensive_metrics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.dune.has_api_key() {
        tracing::warn!("DUNE_API_KEY_TOKEN is not set, refusing to query Dune");
        return Err(ApiError::MissingApiKey);
    }

    tracing::info!("Fetching comprehensive metrics from {} Dune queries", DuneQuery::ALL.len());
    let sources = SourceRows::from_settled(state.dune.fetch_all().await);

    // Extraction and assembly are pure CPU work over every row set.
    let query_url_base = state.config.query_url_base.clone();
    let report = tokio::task::spawn_blocking(move || assemble(&sources, Utc::now(), &query_url_base))
        .await
        .map_err(|e| {
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            tracing::error!("Error compiling comprehensive metrics: {}", message);
            ApiError::Internal(message)
        })?;

    Ok((
        [(header::CACHE_CONTROL, state.config.cache_control())],
        Json(report),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::routes::create_router;
    use crate::api::state::AppState;
    use crate::config::Config;
    use crate::services::dune::{DuneClient, DuneQuery, API_KEY_HEADER};

    fn state_for(server_url: &str, api_key: Option<&str>) -> AppState {
        let config = Config {
            dune_api_key: api_key.map(str::to_string),
            dune_api_url: server_url.to_string(),
            query_url_base: "https://dune.com/queries".to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            cache_max_age_secs: 300,
            cache_stale_while_revalidate_secs: 600,
        };
        AppState {
            dune: Arc::new(DuneClient::new(&config.dune_api_url, config.dune_api_key.clone()).unwrap()),
            config: Arc::new(config),
        }
    }

    async fn call(state: AppState) -> (StatusCode, Option<String>, Value) {
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/metrics/comprehensive")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let cache_control = response
            .headers()
            .get("cache-control")
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, cache_control, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_key_returns_503_without_upstream_calls() {
        let server = MockServer::start();
        let any_query = server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({ "result": { "rows": [] } }));
        });

        let (status, _, body) = call(state_for(&server.base_url(), None)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Configuration Error");
        assert_eq!(body["message"], "DUNE_API_KEY_TOKEN environment variable is not configured");
        assert_eq!(body["configurationRequired"], true);
        assert_eq!(
            body["instructions"],
            "Please add DUNE_API_KEY_TOKEN to your environment variables"
        );
        assert_eq!(any_query.hits(), 0);
    }

    #[tokio::test]
    async fn failed_query_degrades_to_empty_source() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(GET)
                .path(format!("/api/v1/query/{}/results", DuneQuery::ProtocolActivity.id()));
            then.status(500).body("boom");
        });
        let user_behavior = server.mock(|when, then| {
            when.method(GET)
                .path(format!("/api/v1/query/{}/results", DuneQuery::UserBehavior.id()))
                .header(API_KEY_HEADER, "key");
            then.status(200).json_body(json!({
                "result": { "rows": [{ "daily_active_user": 5000, "n_sig": 42000, "n_txn": 30000 }] }
            }));
        });
        let dex_comparison = server.mock(|when, then| {
            when.method(GET)
                .path(format!("/api/v1/query/{}/results", DuneQuery::DexComparison.id()));
            then.status(200).json_body(json!({
                "result": { "rows": [{ "daily_active_addresses": 125000, "daily_transactions": "900000" }] }
            }));
        });
        let transaction_analysis = server.mock(|when, then| {
            when.method(GET)
                .path(format!("/api/v1/query/{}/results", DuneQuery::TransactionAnalysis.id()));
            then.status(200).json_body(json!({
                "result": { "rows": [{ "max_tps_15_blocks": 12500 }] }
            }));
        });
        let others = server.mock(|when, then| {
            when.method(GET).path_contains("/api/v1/query/");
            then.status(200).json_body(json!({ "result": { "rows": [] } }));
        });

        let (status, cache_control, body) = call(state_for(&server.base_url(), Some("key"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            cache_control.as_deref(),
            Some("public, s-maxage=300, stale-while-revalidate=600")
        );
        failing.assert();
        user_behavior.assert();
        dex_comparison.assert();
        transaction_analysis.assert();
        assert_eq!(others.hits(), DuneQuery::ALL.len() - 4);

        assert_eq!(body["metrics"]["totalTransactions"], 0);
        assert_eq!(body["metrics"]["totalSignatures"], 42000);
        assert_eq!(body["metrics"]["dailyActiveAddresses"], 125000);
        assert_eq!(body["metrics"]["dailyTransactions"], 900000);
        assert_eq!(body["metrics"]["maxTPS"], 12500);
        assert_eq!(body["dataSource"], "dune_analytics_comprehensive");
        assert_eq!(body["dataDepth"]["queriesSucceeded"], DuneQuery::ALL.len() - 1);

        let rows = body["tableData"].as_array().unwrap();
        assert!(rows.iter().any(|r| r["name"] == "Total Network Signatures" && r["value"] == "42.0K"));
        assert!(rows.iter().any(|r| r["name"] == "Daily Active Addresses (24h)" && r["value"] == "125.0K"));
        assert!(rows.iter().any(|r| r["name"] == "Max TPS (15 blocks)" && r["value"] == "12500 TPS"));
        assert!(rows.iter().all(|r| r["change"] == "-"));
    }
}
