//! One pure extractor per analytics query. Each reads the loosely typed rows of
//! its own query and returns a typed aggregate; an empty row set always yields
//! a zero-valued aggregate.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::services::protocols::get_protocol_name;
use crate::services::safe_math::{
    cell_text, is_truthy, safe_average, safe_parse_float, safe_parse_int,
};
use crate::services::table::format_metric_value;
use crate::types::models::{
    HourlyActivity, ProtocolMetric, RawDuneRow, StakePosition, TokenHolding,
};

pub const OCTA_PER_APT: f64 = 1e8;
pub const TOP_PROTOCOLS: usize = 5;
pub const TOP_TOKEN_HOLDERS: usize = 10;
pub const MAX_ACTIVITY_PATTERNS: usize = 24;
pub const SAMPLE_SWAPS: usize = 10;

fn field<'a>(row: Option<&'a RawDuneRow>, key: &str) -> Option<&'a Value> {
    row.and_then(|r| r.get(key))
}

/// First truthy cell among `keys`, else the last key's cell (`a || b || c`).
fn first_truthy<'a>(row: &'a RawDuneRow, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .map(|k| row.get(*k))
        .find(|v| is_truthy(*v))
        .unwrap_or_else(|| keys.last().and_then(|k| row.get(*k)))
}

/// Present only when the cell is truthy and still non-zero once parsed, so a
/// string such as `"0.0"` counts as absent.
fn optional_int(row: Option<&RawDuneRow>, key: &str) -> Option<i64> {
    let value = field(row, key);
    is_truthy(value)
        .then(|| safe_parse_int(value, 0))
        .filter(|v| *v != 0)
}

fn optional_float(row: Option<&RawDuneRow>, key: &str) -> Option<f64> {
    let value = field(row, key);
    is_truthy(value)
        .then(|| safe_parse_float(value, 0.0))
        .filter(|v| *v != 0.0)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreMetrics {
    pub total_transactions: i64,
    pub unique_users: i64,
    pub avg_success_rate: f64,
    pub avg_gas_price: f64,
}

pub fn extract_protocol_activity(rows: &[RawDuneRow]) -> CoreMetrics {
    let row = rows.first();
    CoreMetrics {
        total_transactions: safe_parse_int(field(row, "total_transactions"), 0),
        unique_users: safe_parse_int(field(row, "unique_senders"), 0),
        avg_success_rate: safe_parse_float(field(row, "success_rate"), 0.0),
        avg_gas_price: safe_parse_float(field(row, "avg_gas_cost"), 0.0),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GasFeeMetrics {
    pub daily_gas_fees_apt: f64,
    pub daily_gas_fees_usd: f64,
    pub net_gas_apt: f64,
}

pub fn extract_user_analytics(rows: &[RawDuneRow]) -> GasFeeMetrics {
    let row = rows.first();
    GasFeeMetrics {
        daily_gas_fees_apt: safe_parse_float(field(row, "gas_fee_apt"), 0.0),
        daily_gas_fees_usd: safe_parse_float(field(row, "gas_fee_usd"), 0.0),
        net_gas_apt: safe_parse_float(field(row, "net_gas_apt"), 0.0),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyActivity {
    pub daily_active_addresses: i64,
    pub daily_transactions: i64,
}

pub fn extract_dex_comparison(rows: &[RawDuneRow]) -> DailyActivity {
    let row = rows.first();
    DailyActivity {
        daily_active_addresses: safe_parse_int(field(row, "daily_active_addresses"), 0),
        daily_transactions: safe_parse_int(field(row, "daily_transactions"), 0),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StakingMetrics {
    pub total_tvl: f64,
    pub liquid_staking_tvl: f64,
    pub positions: Vec<StakePosition>,
}

pub fn extract_staking(rows: &[RawDuneRow]) -> StakingMetrics {
    let total_tvl = rows
        .iter()
        .map(|r| safe_parse_float(first_truthy(r, &["tvl", "total_value", "balance"]), 0.0))
        .sum();

    let positions: Vec<StakePosition> = rows
        .iter()
        .map(|r| {
            let validator = first_truthy(r, &["validator", "pool_address"])
                .filter(|v| is_truthy(Some(*v)))
                .map(|v| cell_text(Some(v)))
                .unwrap_or_else(|| "Unknown".to_string());
            StakePosition {
                validator,
                amount: safe_parse_float(first_truthy(r, &["balance", "amount"]), 0.0),
            }
        })
        .collect();

    StakingMetrics {
        total_tvl,
        liquid_staking_tvl: positions.iter().map(|p| p.amount).sum(),
        positions,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentDexActivity {
    pub recent_transaction_count: i64,
    pub recent_gas_fees_apt: f64,
    pub avg_gas_fee_per_tx: f64,
}

pub fn extract_dex_metrics(rows: &[RawDuneRow]) -> RecentDexActivity {
    let row = rows.first();
    RecentDexActivity {
        recent_transaction_count: safe_parse_int(field(row, "transaction_count"), 0),
        recent_gas_fees_apt: safe_parse_float(field(row, "sum_gas_fees_apt"), 0.0),
        avg_gas_fee_per_tx: safe_parse_float(field(row, "avg_gas_fee_per_transaction_octa"), 0.0),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserBehavior {
    pub behavior_daily_active_users: i64,
    pub total_signatures: i64,
    pub behavior_transactions: i64,
    pub row_count: usize,
}

pub fn extract_user_behavior(rows: &[RawDuneRow]) -> UserBehavior {
    let row = rows.first();
    UserBehavior {
        behavior_daily_active_users: safe_parse_int(field(row, "daily_active_user"), 0),
        total_signatures: safe_parse_int(field(row, "n_sig"), 0),
        behavior_transactions: safe_parse_int(field(row, "n_txn"), 0),
        row_count: rows.len(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPerformance {
    pub max_tps: i64,
    pub row_count: usize,
}

pub fn extract_transaction_analysis(rows: &[RawDuneRow]) -> TransactionPerformance {
    TransactionPerformance {
        max_tps: safe_parse_int(field(rows.first(), "max_tps_15_blocks"), 0),
        row_count: rows.len(),
    }
}

/// Top protocols by module address. Used for both the network-stats and the
/// protocol-metrics queries, which share a column layout.
pub fn extract_protocol_breakdown(rows: &[RawDuneRow]) -> Vec<ProtocolMetric> {
    rows.iter()
        .take(TOP_PROTOCOLS)
        .map(|item| {
            let address = cell_text(item.get("entry_function_module_address"));
            let protocol_name = get_protocol_name(&address);
            if !address.is_empty() {
                tracing::debug!(
                    "Protocol address mapping: {}... -> {}",
                    address.chars().take(10).collect::<String>(),
                    protocol_name
                );
            }

            ProtocolMetric {
                protocol_name: protocol_name.to_string(),
                module_address: address,
                sender_count: safe_parse_int(item.get("count_sender_addresses"), 0),
                signer_count: safe_parse_int(item.get("count_signer_addresses"), 0),
                transaction_count: safe_parse_int(item.get("count_transactions"), 0).max(0),
                gas_total: (safe_parse_int(item.get("sum_gas_octa"), 0) as f64 / OCTA_PER_APT)
                    .max(0.0),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMetrics {
    pub total_token_holders: usize,
    pub total_token_value: f64,
    pub top_token_holdings: Vec<TokenHolding>,
    /// Every balance in source order, for distribution statistics.
    pub balances: Vec<f64>,
}

pub fn extract_token_balances(rows: &[RawDuneRow]) -> TokenMetrics {
    let balances: Vec<f64> = rows
        .iter()
        .map(|r| safe_parse_float(r.get("balance"), 0.0))
        .collect();

    let top_token_holdings = rows
        .iter()
        .zip(&balances)
        .take(TOP_TOKEN_HOLDERS)
        .map(|(item, balance)| TokenHolding {
            holder: cell_text(item.get("holder")),
            token_type: cell_text(item.get("token_type")),
            balance: *balance,
            formatted_balance: format_metric_value(*balance),
        })
        .collect();

    TokenMetrics {
        total_token_holders: rows.len(),
        total_token_value: balances.iter().sum(),
        top_token_holdings,
        balances,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwapMetrics {
    pub total_swap_events: usize,
    pub unique_swappers: usize,
    pub swap_volume_24h: usize,
    pub liquidity_providers: usize,
    /// Swap counts keyed by UTC hour of day.
    pub swaps_by_hour: BTreeMap<u32, usize>,
    pub sample: Vec<RawDuneRow>,
}

/// Dune renders timestamps as `2024-05-01 12:00:00.000 UTC`; RFC 3339 and epoch
/// milliseconds show up in some queries too.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            let naive = s.strip_suffix(" UTC").unwrap_or(s);
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
                .map(|dt| dt.and_utc())
        }
        _ => None,
    }
}

fn distinct_non_empty<I>(values: I) -> usize
where
    I: Iterator<Item = String>,
{
    values.filter(|v| !v.is_empty()).collect::<HashSet<_>>().len()
}

pub fn extract_swaps(rows: &[RawDuneRow], now: DateTime<Utc>) -> SwapMetrics {
    let day_ago = now - Duration::hours(24);

    let mut swaps_by_hour = BTreeMap::new();
    let mut swap_volume_24h = 0;
    for row in rows {
        if let Some(at) = parse_timestamp(first_truthy(row, &["block_time", "timestamp"])) {
            *swaps_by_hour.entry(at.hour()).or_insert(0) += 1;
            if at > day_ago {
                swap_volume_24h += 1;
            }
        }
    }

    SwapMetrics {
        total_swap_events: rows.len(),
        unique_swappers: distinct_non_empty(
            rows.iter().map(|r| cell_text(first_truthy(r, &["sender", "user"]))),
        ),
        swap_volume_24h,
        liquidity_providers: distinct_non_empty(
            rows.iter()
                .map(|r| cell_text(first_truthy(r, &["sender", "liquidity_provider"]))),
        ),
        swaps_by_hour,
        sample: rows.iter().take(SAMPLE_SWAPS).cloned().collect(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityMetrics {
    pub hourly_transactions: i64,
    pub hourly_users: i64,
    pub hourly_gas: f64,
    pub hourly_failed_txns: i64,
    pub peak_hour: Option<String>,
    pub peak_hourly_transactions: i64,
    pub peak_hourly_users: i64,
    pub average_hourly_transactions: f64,
    pub hours: Vec<HourlyActivity>,
}

fn hourly_activity(row: &RawDuneRow) -> HourlyActivity {
    HourlyActivity {
        hour: cell_text(row.get("hour")),
        transactions: safe_parse_int(row.get("transactions"), 0),
        users: safe_parse_int(first_truthy(row, &["users", "unique_users"]), 0),
        gas: safe_parse_float(row.get("gas"), 0.0),
        failed_transactions: safe_parse_int(
            first_truthy(row, &["failed_transactions", "failed_txns"]),
            0,
        ),
        avg_gas_price: safe_parse_float(row.get("avg_gas_price"), 0.0),
    }
}

pub fn extract_activity_patterns(rows: &[RawDuneRow]) -> ActivityMetrics {
    let hours: Vec<HourlyActivity> = rows.iter().map(hourly_activity).collect();

    // Strictly-greater keeps the earliest row on ties.
    let peak = hours.iter().fold(None::<&HourlyActivity>, |peak, current| match peak {
        Some(p) if current.transactions <= p.transactions => Some(p),
        _ => Some(current),
    });

    let latest = hours.first();
    let transactions: Vec<f64> = hours.iter().map(|h| h.transactions as f64).collect();

    ActivityMetrics {
        hourly_transactions: latest.map(|h| h.transactions).unwrap_or(0),
        hourly_users: latest.map(|h| h.users).unwrap_or(0),
        hourly_gas: latest.map(|h| h.gas).unwrap_or(0.0),
        hourly_failed_txns: latest.map(|h| h.failed_transactions).unwrap_or(0),
        peak_hour: peak.map(|h| h.hour.clone()),
        peak_hourly_transactions: peak.map(|h| h.transactions).unwrap_or(0),
        peak_hourly_users: peak.map(|h| h.users).unwrap_or(0),
        average_hourly_transactions: safe_average(&transactions, 0.0),
        hours,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOverview {
    pub row_count: usize,
    pub summary: Option<RawDuneRow>,
}

pub fn extract_network_overview(rows: &[RawDuneRow]) -> NetworkOverview {
    NetworkOverview {
        row_count: rows.len(),
        summary: rows.first().cloned(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllTimeMetrics {
    pub all_time_transaction_count: Option<i64>,
    pub network_lifetime_days: Option<i64>,
}

pub fn extract_all_time_transactions(rows: &[RawDuneRow]) -> AllTimeMetrics {
    let row = rows.first();
    AllTimeMetrics {
        all_time_transaction_count: optional_int(row, "total_all_time_transactions"),
        network_lifetime_days: optional_int(row, "network_age_days"),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockTiming {
    pub avg_block_time: Option<f64>,
    pub avg_finality_time: Option<f64>,
    pub network_reliability_score: Option<f64>,
}

pub fn extract_block_times(rows: &[RawDuneRow]) -> BlockTiming {
    let row = rows.first();
    BlockTiming {
        avg_block_time: optional_float(row, "avg_block_time_seconds"),
        avg_finality_time: optional_float(row, "avg_finality_time_seconds"),
        network_reliability_score: optional_float(row, "network_reliability_pct"),
    }
}
