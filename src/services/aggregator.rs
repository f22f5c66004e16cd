use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::dune::SourceRows;
use crate::services::extract::{self, NetworkOverview, MAX_ACTIVITY_PATTERNS};
use crate::services::safe_math::saturating_sum;
use crate::types::models::{
    dash_if_none, HourlyActivity, ProtocolMetric, RawDuneRow, StakePosition, TokenHolding,
};

/// Everything the extractors produce for one request, plus the simple totals
/// computed straight from them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    pub total_transactions: i64,
    #[serde(rename = "totalAccounts")]
    pub unique_users: i64,
    #[serde(skip)]
    pub avg_success_rate: f64,
    #[serde(skip)]
    pub avg_gas_price: f64,

    #[serde(serialize_with = "dash_if_none")]
    pub all_time_transaction_count: Option<i64>,
    #[serde(serialize_with = "dash_if_none")]
    pub network_lifetime_days: Option<i64>,
    #[serde(serialize_with = "dash_if_none")]
    pub avg_block_time: Option<f64>,
    #[serde(serialize_with = "dash_if_none")]
    pub avg_finality_time: Option<f64>,
    #[serde(serialize_with = "dash_if_none")]
    pub network_reliability_score: Option<f64>,

    pub daily_active_addresses: i64,
    pub daily_transactions: i64,
    #[serde(rename = "dailyGasFeesAPT")]
    pub daily_gas_fees_apt: f64,
    #[serde(rename = "dailyGasFeesUSD")]
    pub daily_gas_fees_usd: f64,
    #[serde(rename = "netGasAPT")]
    pub net_gas_apt: f64,

    pub recent_transaction_count: i64,
    #[serde(rename = "recentGasFeesAPT")]
    pub recent_gas_fees_apt: f64,
    pub avg_gas_fee_per_tx: f64,

    pub behavior_daily_active_users: i64,
    pub total_signatures: i64,
    pub behavior_transactions: i64,
    #[serde(rename = "maxTPS")]
    pub max_tps: i64,

    pub protocol_breakdown: Vec<ProtocolMetric>,
    pub extended_protocol_data: Vec<ProtocolMetric>,
    pub total_protocol_transactions: i64,
    pub total_protocol_gas: f64,
    pub total_extended_transactions: i64,
    pub total_extended_gas: f64,
    pub total_protocols: usize,

    #[serde(rename = "totalTVL")]
    pub total_tvl: f64,
    #[serde(skip)]
    pub liquid_staking_tvl: f64,
    #[serde(skip)]
    pub staking_positions: Vec<StakePosition>,

    pub total_token_holders: usize,
    pub total_token_value: f64,
    pub top_token_holdings: Vec<TokenHolding>,
    #[serde(skip)]
    pub token_balances: Vec<f64>,

    pub total_swap_events: usize,
    pub unique_swappers: usize,
    pub swap_volume_24h: usize,
    #[serde(skip)]
    pub liquidity_providers: usize,
    #[serde(skip)]
    pub swaps_by_hour: BTreeMap<u32, usize>,
    #[serde(skip)]
    pub swap_sample: Vec<RawDuneRow>,

    pub hourly_transactions: i64,
    pub hourly_users: i64,
    pub hourly_gas: f64,
    pub hourly_failed_txns: i64,
    pub peak_hourly_transactions: i64,
    pub peak_hourly_users: i64,
    #[serde(serialize_with = "dash_if_none")]
    pub peak_hour: Option<String>,
    pub average_hourly_transactions: f64,
    pub activity_patterns: Vec<HourlyActivity>,
    #[serde(skip)]
    pub hourly_activity: Vec<HourlyActivity>,

    pub network_overview: NetworkOverview,
}

pub fn aggregate(sources: &SourceRows, now: DateTime<Utc>) -> AggregatedMetrics {
    let core = extract::extract_protocol_activity(&sources.protocol_activity);
    let gas = extract::extract_user_analytics(&sources.user_analytics);
    let daily = extract::extract_dex_comparison(&sources.dex_comparison);
    let staking = extract::extract_staking(&sources.staking_analytics);
    let recent = extract::extract_dex_metrics(&sources.dex_metrics);
    let behavior = extract::extract_user_behavior(&sources.user_behavior);
    let performance = extract::extract_transaction_analysis(&sources.transaction_analysis);
    let protocol_breakdown = extract::extract_protocol_breakdown(&sources.network_stats);
    let extended_protocol_data = extract::extract_protocol_breakdown(&sources.protocol_metrics);
    let tokens = extract::extract_token_balances(&sources.token_balances);
    let swaps = extract::extract_swaps(&sources.dex_trading_volume, now);
    let activity = extract::extract_activity_patterns(&sources.activity_patterns);
    let network_overview = extract::extract_network_overview(&sources.network_overview);
    let all_time = extract::extract_all_time_transactions(&sources.all_time_transactions);
    let block = extract::extract_block_times(&sources.block_times);

    // Protocol rows are a subset of network activity, never more than the total.
    let breakdown_transactions =
        saturating_sum(protocol_breakdown.iter().map(|p| p.transaction_count));
    let total_protocol_transactions = breakdown_transactions.min(core.total_transactions);
    let total_protocol_gas = protocol_breakdown.iter().map(|p| p.gas_total).sum();

    // Extended data may cover a different window, so it stays out of the totals above.
    let total_extended_transactions =
        saturating_sum(extended_protocol_data.iter().map(|p| p.transaction_count));
    let total_extended_gas = extended_protocol_data.iter().map(|p| p.gas_total).sum();

    let total_protocols = protocol_breakdown.len()
        + extended_protocol_data.len()
        + behavior.row_count
        + performance.row_count;

    let activity_patterns = activity
        .hours
        .iter()
        .take(MAX_ACTIVITY_PATTERNS)
        .cloned()
        .collect();

    AggregatedMetrics {
        total_transactions: core.total_transactions,
        unique_users: core.unique_users,
        avg_success_rate: core.avg_success_rate,
        avg_gas_price: core.avg_gas_price,

        all_time_transaction_count: all_time.all_time_transaction_count,
        network_lifetime_days: all_time.network_lifetime_days,
        avg_block_time: block.avg_block_time,
        avg_finality_time: block.avg_finality_time,
        network_reliability_score: block.network_reliability_score,

        daily_active_addresses: daily.daily_active_addresses,
        daily_transactions: daily.daily_transactions,
        daily_gas_fees_apt: gas.daily_gas_fees_apt,
        daily_gas_fees_usd: gas.daily_gas_fees_usd,
        net_gas_apt: gas.net_gas_apt,

        recent_transaction_count: recent.recent_transaction_count,
        recent_gas_fees_apt: recent.recent_gas_fees_apt,
        avg_gas_fee_per_tx: recent.avg_gas_fee_per_tx,

        behavior_daily_active_users: behavior.behavior_daily_active_users,
        total_signatures: behavior.total_signatures,
        behavior_transactions: behavior.behavior_transactions,
        max_tps: performance.max_tps,

        protocol_breakdown,
        extended_protocol_data,
        total_protocol_transactions,
        total_protocol_gas,
        total_extended_transactions,
        total_extended_gas,
        total_protocols,

        total_tvl: staking.total_tvl,
        liquid_staking_tvl: staking.liquid_staking_tvl,
        staking_positions: staking.positions,

        total_token_holders: tokens.total_token_holders,
        total_token_value: tokens.total_token_value,
        top_token_holdings: tokens.top_token_holdings,
        token_balances: tokens.balances,

        total_swap_events: swaps.total_swap_events,
        unique_swappers: swaps.unique_swappers,
        swap_volume_24h: swaps.swap_volume_24h,
        liquidity_providers: swaps.liquidity_providers,
        swaps_by_hour: swaps.swaps_by_hour,
        swap_sample: swaps.sample,

        hourly_transactions: activity.hourly_transactions,
        hourly_users: activity.hourly_users,
        hourly_gas: activity.hourly_gas,
        hourly_failed_txns: activity.hourly_failed_txns,
        peak_hourly_transactions: activity.peak_hourly_transactions,
        peak_hourly_users: activity.peak_hourly_users,
        peak_hour: activity.peak_hour,
        average_hourly_transactions: activity.average_hourly_transactions,
        activity_patterns,
        hourly_activity: activity.hours,

        network_overview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: serde_json::Value) -> Vec<RawDuneRow> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn protocol_totals_are_capped_by_network_total() {
        let sources = SourceRows {
            protocol_activity: rows(json!([{ "total_transactions": 1500 }])),
            network_stats: rows(json!([
                { "count_transactions": 1000, "sum_gas_octa": 100000000 },
                { "count_transactions": 900, "sum_gas_octa": 50000000 }
            ])),
            protocol_metrics: rows(json!([{ "count_transactions": 77, "sum_gas_octa": 0 }])),
            ..Default::default()
        };
        let metrics = aggregate(&sources, Utc::now());

        assert_eq!(metrics.total_protocol_transactions, 1500);
        assert_eq!(metrics.total_protocol_gas, 1.5);
        assert_eq!(metrics.total_extended_transactions, 77);
        assert_eq!(metrics.total_protocols, 3);
    }

    #[test]
    fn activity_patterns_are_capped_to_a_day() {
        let hours: Vec<serde_json::Value> =
            (0..30).map(|h| json!({ "hour": h, "transactions": h })).collect();
        let sources = SourceRows {
            activity_patterns: rows(serde_json::Value::Array(hours)),
            ..Default::default()
        };
        let metrics = aggregate(&sources, Utc::now());

        assert_eq!(metrics.activity_patterns.len(), MAX_ACTIVITY_PATTERNS);
        assert_eq!(metrics.hourly_activity.len(), 30);
        assert_eq!(metrics.peak_hourly_transactions, 29);
    }

    #[test]
    fn absent_optional_metrics_serialize_as_dash() {
        let value = serde_json::to_value(aggregate(&SourceRows::default(), Utc::now())).unwrap();

        assert_eq!(value["allTimeTransactionCount"], json!("-"));
        assert_eq!(value["avgBlockTime"], json!("-"));
        assert_eq!(value["totalTransactions"], json!(0));
        assert_eq!(value["maxTPS"], json!(0));
        assert!(value.get("tokenBalances").is_none());
    }
}
