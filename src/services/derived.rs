//! Cross-source indicators. Every function here is pure over `AggregatedMetrics`
//! and every ratio goes through `safe_divide`, so no field can end up NaN or
//! infinite.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::services::aggregator::AggregatedMetrics;
use crate::services::protocols::UNKNOWN_PROTOCOL;
use crate::services::safe_math::{safe_average, safe_divide, saturating_sum};
use crate::types::models::{empty_if_none, HourlyActivity, ProtocolMetric, RawDuneRow, TokenHolding};

pub const WHALE_BALANCE: f64 = 1_000_000.0;
pub const HIGH_CONGESTION_GAS_PRICE: f64 = 0.0005;
pub const MEDIUM_CONGESTION_GAS_PRICE: f64 = 0.0002;
pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const SECONDS_PER_HOUR: f64 = 3_600.0;
pub const HOURS_PER_DAY: f64 = 24.0;
pub const ASSUMED_BLOCK_SECONDS: f64 = 4.0;

const TOP_CONCENTRATION_PROTOCOLS: usize = 3;
const TOP_PEAK_HOURS: usize = 5;
const TOP_STRESS_HOURS: usize = 3;
const TOP_WHALE_HOLDERS: usize = 5;
const WHALE_CONCENTRATION_HOLDERS: usize = 10;
const STAKING_DISTRIBUTION_ROWS: usize = 10;
const ENGAGEMENT_HOURS: usize = 12;

fn pct(numerator: f64, denominator: f64) -> f64 {
    safe_divide(numerator, denominator, 0.0) * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProtocolRating {
    Major,
    Significant,
    Emerging,
}

/// Network congestion bucket for an average gas price in APT.
pub fn congestion_tier(avg_gas_price: f64) -> Tier {
    if avg_gas_price > HIGH_CONGESTION_GAS_PRICE {
        Tier::High
    } else if avg_gas_price > MEDIUM_CONGESTION_GAS_PRICE {
        Tier::Medium
    } else {
        Tier::Low
    }
}

/// Gini coefficient of a set of balances: 0 is perfectly equal, values near 1
/// mean one holder owns nearly everything.
pub fn calculate_gini_coefficient(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let total: f64 = sorted.iter().sum();
    if total == 0.0 {
        return 0.0;
    }

    let gini_sum: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (2.0 * (i as f64 + 1.0) - n - 1.0) * v)
        .sum();

    safe_divide(gini_sum, n * total, 0.0).abs()
}

fn total_transactions(protocols: &[ProtocolMetric]) -> i64 {
    saturating_sum(protocols.iter().map(|p| p.transaction_count))
}

fn total_gas(protocols: &[ProtocolMetric]) -> f64 {
    protocols.iter().map(|p| p.gas_total).sum()
}

/// `1 - sqrt(Σ share²)` over transaction shares. Not the textbook HHI: the
/// square root keeps a single-protocol ecosystem at 0 but does not scale
/// linearly with the number of equal participants.
pub fn diversification_index(protocols: &[ProtocolMetric]) -> f64 {
    let total = total_transactions(protocols) as f64;
    if protocols.is_empty() || total <= 0.0 {
        return 0.0;
    }

    let sum_of_squares: f64 = protocols
        .iter()
        .map(|p| safe_divide(p.transaction_count as f64, total, 0.0).powi(2))
        .sum();
    1.0 - sum_of_squares.sqrt()
}

/// Σ over ordered pairs of distinct protocols of `min(senders) / max(senders)`.
pub fn protocol_synergy(protocols: &[ProtocolMetric]) -> f64 {
    let mut sum = 0.0;
    for a in protocols {
        for b in protocols {
            if a.module_address == b.module_address {
                continue;
            }
            let low = a.sender_count.min(b.sender_count) as f64;
            let high = a.sender_count.max(b.sender_count) as f64;
            sum += safe_divide(low, high, 0.0);
        }
    }
    sum
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolEfficiency {
    pub protocol: String,
    pub gas_per_transaction: f64,
    pub users_per_transaction: f64,
    pub avg_gas_per_user: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDominance {
    pub top_protocol: String,
    pub top_protocol_share: i64,
    pub total_protocol_volume: i64,
    pub concentration_ratio: f64,
    pub protocol_efficiency: Vec<ProtocolEfficiency>,
}

pub fn protocol_dominance(protocols: &[ProtocolMetric]) -> ProtocolDominance {
    let total = total_transactions(protocols);
    let top_three = total_transactions(
        &protocols[..protocols.len().min(TOP_CONCENTRATION_PROTOCOLS)],
    );

    ProtocolDominance {
        top_protocol: protocols
            .first()
            .map(|p| p.protocol_name.clone())
            .unwrap_or_else(|| UNKNOWN_PROTOCOL.to_string()),
        top_protocol_share: protocols.first().map(|p| p.transaction_count).unwrap_or(0),
        total_protocol_volume: total,
        concentration_ratio: pct(top_three as f64, total as f64),
        protocol_efficiency: protocols
            .iter()
            .map(|p| ProtocolEfficiency {
                protocol: p.protocol_name.clone(),
                gas_per_transaction: safe_divide(p.gas_total, p.transaction_count as f64, 0.0),
                users_per_transaction: safe_divide(
                    p.transaction_count as f64,
                    p.sender_count as f64,
                    0.0,
                ),
                avg_gas_per_user: safe_divide(p.gas_total, p.sender_count as f64, 0.0),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasRank {
    pub rank: usize,
    pub protocol: String,
    pub gas_share: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEconomics {
    pub total_network_gas_consumed: f64,
    pub avg_gas_efficiency: f64,
    pub protocol_gas_ranking: Vec<GasRank>,
    pub gas_concentration: f64,
}

pub fn gas_economics(protocols: &[ProtocolMetric]) -> GasEconomics {
    let gas = total_gas(protocols);
    let mut by_gas: Vec<&ProtocolMetric> = protocols.iter().collect();
    by_gas.sort_by(|a, b| b.gas_total.total_cmp(&a.gas_total));

    GasEconomics {
        total_network_gas_consumed: gas,
        avg_gas_efficiency: safe_divide(gas, total_transactions(protocols) as f64, 0.0),
        gas_concentration: pct(by_gas.first().map(|p| p.gas_total).unwrap_or(0.0), gas),
        protocol_gas_ranking: by_gas
            .iter()
            .enumerate()
            .map(|(i, p)| GasRank {
                rank: i + 1,
                protocol: p.protocol_name.clone(),
                gas_share: p.gas_total,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedProtocolAnalytics {
    pub protocol_dominance: ProtocolDominance,
    pub gas_economics: GasEconomics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEngagement {
    pub avg_transactions_per_user: f64,
    pub avg_signatures_per_user: f64,
    pub user_activity_ratio: f64,
    pub power_user_threshold: i64,
    pub estimated_power_users: i64,
}

pub fn user_engagement(m: &AggregatedMetrics) -> UserEngagement {
    let users = m.unique_users as f64;
    let avg_transactions = safe_divide(m.total_transactions as f64, users, 0.0);

    UserEngagement {
        avg_transactions_per_user: avg_transactions,
        avg_signatures_per_user: safe_divide(m.total_signatures as f64, users, 0.0),
        user_activity_ratio: pct(m.behavior_daily_active_users as f64, users),
        // 3x the average, top 10% of users assumed to be power users.
        power_user_threshold: (avg_transactions * 3.0).ceil() as i64,
        estimated_power_users: (users * 0.1).ceil() as i64,
    }
}

fn failure_rate(hour: &HourlyActivity) -> f64 {
    let attempted = if hour.transactions == 0 { 1 } else { hour.transactions };
    pct(hour.failed_transactions as f64, attempted as f64)
}

fn sorted_by_transactions(hours: &[HourlyActivity]) -> Vec<&HourlyActivity> {
    let mut sorted: Vec<&HourlyActivity> = hours.iter().collect();
    sorted.sort_by(|a, b| b.transactions.cmp(&a.transactions));
    sorted
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakHour {
    pub hour: String,
    pub transactions: i64,
    pub users: i64,
    pub failure_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatterns {
    pub peak_to_peak_variation: f64,
    pub network_utilization: f64,
    pub avg_transactions_per_hour: f64,
    pub peak_hour_analysis: Vec<PeakHour>,
}

pub fn transaction_patterns(m: &AggregatedMetrics) -> TransactionPatterns {
    let current = m.hourly_transactions as f64;
    let peak = m.peak_hourly_transactions as f64;

    TransactionPatterns {
        peak_to_peak_variation: pct(peak - current, current),
        network_utilization: pct(current, peak),
        avg_transactions_per_hour: m.average_hourly_transactions,
        peak_hour_analysis: sorted_by_transactions(&m.hourly_activity)
            .into_iter()
            .take(TOP_PEAK_HOURS)
            .map(|h| PeakHour {
                hour: h.hour.clone(),
                transactions: h.transactions,
                users: h.users,
                failure_rate: failure_rate(h),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedUserAnalytics {
    pub user_engagement: UserEngagement,
    pub transaction_patterns: TransactionPatterns,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDistribution {
    pub total_token_value: f64,
    pub avg_holding_size: f64,
    pub concentration_index: f64,
    pub large_holders: usize,
    pub whale_holdings: f64,
}

pub fn token_distribution(balances: &[f64]) -> TokenDistribution {
    let total: f64 = balances.iter().sum();
    let whales: Vec<f64> = balances.iter().copied().filter(|b| *b > WHALE_BALANCE).collect();

    TokenDistribution {
        total_token_value: total,
        avg_holding_size: safe_divide(total, balances.len() as f64, 0.0),
        concentration_index: balances.first().map(|b| pct(*b, total)).unwrap_or(0.0),
        large_holders: whales.len(),
        whale_holdings: whales.iter().sum(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityAnalysis {
    pub total_swap_events: usize,
    pub avg_swaps_per_hour: f64,
    pub liquidity_providers: usize,
    pub swap_distribution: BTreeMap<u32, usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedTokenEconomics {
    pub token_distribution: TokenDistribution,
    pub liquidity_analysis: LiquidityAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    #[serde(rename = "theoreticalMaxTPS")]
    pub theoretical_max_tps: i64,
    pub current_utilization: f64,
    pub network_efficiency: f64,
    pub scalability_index: f64,
    pub congestion_indicator: Tier,
}

/// Share of the demonstrated peak TPS that the average daily load uses.
pub fn current_utilization(daily_transactions: i64, max_tps: i64) -> f64 {
    pct(daily_transactions as f64 / SECONDS_PER_DAY, max_tps as f64)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourStress {
    pub hour: String,
    pub stress: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalAnalysis {
    pub daily_growth: f64,
    pub user_growth: f64,
    pub gas_efficiency_trend: f64,
    pub network_stress: Vec<HourStress>,
}

pub fn temporal_analysis(m: &AggregatedMetrics) -> TemporalAnalysis {
    let mut network_stress: Vec<HourStress> = m
        .hourly_activity
        .iter()
        .map(|h| HourStress {
            hour: h.hour.clone(),
            stress: safe_divide(h.transactions as f64, m.max_tps as f64, 0.0) * failure_rate(h),
        })
        .collect();
    network_stress.sort_by(|a, b| b.stress.total_cmp(&a.stress));
    network_stress.truncate(TOP_STRESS_HOURS);

    TemporalAnalysis {
        daily_growth: pct(
            m.daily_transactions as f64 - m.recent_transaction_count as f64,
            m.recent_transaction_count as f64,
        ),
        user_growth: pct(
            m.daily_active_addresses as f64 - m.behavior_daily_active_users as f64,
            m.behavior_daily_active_users as f64,
        ),
        gas_efficiency_trend: safe_divide(m.daily_gas_fees_apt, m.daily_transactions as f64, 0.0),
        network_stress,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedNetworkAnalytics {
    pub performance_metrics: PerformanceMetrics,
    pub temporal_analysis: TemporalAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolStability {
    pub protocol: String,
    pub stability_score: f64,
    pub market_share: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossProtocolIntelligence {
    pub total_protocol_ecosystem: usize,
    pub protocol_synergy: f64,
    pub diversification_index: f64,
    pub protocol_stability: Vec<ProtocolStability>,
}

pub fn cross_protocol_intelligence(m: &AggregatedMetrics) -> CrossProtocolIntelligence {
    let protocols = &m.protocol_breakdown;
    let total = total_transactions(protocols) as f64;

    let mut protocol_stability: Vec<ProtocolStability> = protocols
        .iter()
        .map(|p| ProtocolStability {
            protocol: p.protocol_name.clone(),
            // Higher means more distinct users per transaction.
            stability_score: pct(p.sender_count as f64, p.transaction_count as f64),
            market_share: pct(p.transaction_count as f64, total),
        })
        .collect();
    protocol_stability.sort_by(|a, b| b.stability_score.total_cmp(&a.stability_score));

    CrossProtocolIntelligence {
        total_protocol_ecosystem: protocols.len() + m.extended_protocol_data.len(),
        protocol_synergy: protocol_synergy(protocols),
        diversification_index: diversification_index(protocols),
        protocol_stability,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeShare {
    pub validator: String,
    pub amount: f64,
    pub share: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DefiTvlMetrics {
    #[serde(rename_all = "camelCase")]
    Staking {
        #[serde(rename = "estimatedTVL")]
        estimated_tvl: f64,
        #[serde(rename = "liquidStakingTVL")]
        liquid_staking_tvl: f64,
        staking_participation: usize,
        avg_stake_size: f64,
        staking_distribution: Vec<StakeShare>,
    },
    #[serde(rename_all = "camelCase")]
    GasProxy {
        #[serde(rename = "estimatedTVL")]
        estimated_tvl: f64,
        note: &'static str,
        protocol_value_proxy: f64,
    },
}

pub fn defi_tvl_metrics(m: &AggregatedMetrics) -> DefiTvlMetrics {
    if m.staking_positions.is_empty() {
        return DefiTvlMetrics::GasProxy {
            estimated_tvl: 0.0,
            note: "Staking data temporarily unavailable - using protocol gas consumption as proxy",
            // Rough economic activity estimate.
            protocol_value_proxy: total_gas(&m.protocol_breakdown) * 100.0,
        };
    }

    DefiTvlMetrics::Staking {
        estimated_tvl: m.total_tvl,
        liquid_staking_tvl: m.liquid_staking_tvl,
        staking_participation: m.staking_positions.len(),
        avg_stake_size: safe_divide(m.total_tvl, m.staking_positions.len() as f64, 0.0),
        staking_distribution: m
            .staking_positions
            .iter()
            .take(STAKING_DISTRIBUTION_ROWS)
            .map(|s| StakeShare {
                validator: s.validator.clone(),
                amount: s.amount,
                share: pct(s.amount, m.total_tvl),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionAnalysis {
    pub gini_coefficient: f64,
    pub top1_percent: usize,
    pub top10_percent: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WhaleAnalytics {
    #[serde(rename_all = "camelCase")]
    Available {
        total_large_holders: usize,
        whale_concentration: f64,
        top_holders: Vec<TokenHolding>,
        distribution_analysis: DistributionAnalysis,
    },
    Pending { note: &'static str },
}

pub fn whale_analytics(m: &AggregatedMetrics) -> WhaleAnalytics {
    let balances = &m.token_balances;
    if balances.is_empty() {
        return WhaleAnalytics::Pending {
            note: "Token balance data being processed",
        };
    }

    let total: f64 = balances.iter().sum();
    let top: f64 = balances.iter().take(WHALE_CONCENTRATION_HOLDERS).sum();
    let n = balances.len() as f64;

    WhaleAnalytics::Available {
        total_large_holders: balances.iter().filter(|b| **b > WHALE_BALANCE).count(),
        whale_concentration: pct(top, total),
        top_holders: m.top_token_holdings.iter().take(TOP_WHALE_HOLDERS).cloned().collect(),
        distribution_analysis: DistributionAnalysis {
            gini_coefficient: calculate_gini_coefficient(balances),
            top1_percent: (n * 0.01).ceil() as usize,
            top10_percent: (n * 0.1).ceil() as usize,
        },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyEngagement {
    pub hour: String,
    pub engagement_score: f64,
    pub activity_rating: Tier,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortAnalytics {
    pub activity_consistency: f64,
    pub user_retention_proxy: f64,
    pub hourly_user_engagement: Vec<HourlyEngagement>,
}

pub fn activity_rating(transactions: f64, average: f64) -> Tier {
    if transactions > average * 1.2 {
        Tier::High
    } else if transactions > average * 0.8 {
        Tier::Medium
    } else {
        Tier::Low
    }
}

pub fn cohort_analytics(m: &AggregatedMetrics) -> Option<CohortAnalytics> {
    let hours = &m.hourly_activity;
    if hours.is_empty() {
        return None;
    }

    let n = hours.len() as f64;
    let total = saturating_sum(hours.iter().map(|h| h.transactions));
    let active_hours = hours.iter().filter(|h| h.users > 0).count();

    Some(CohortAnalytics {
        activity_consistency: pct(total as f64, n * m.peak_hourly_transactions as f64),
        user_retention_proxy: pct(active_hours as f64, n),
        hourly_user_engagement: hours
            .iter()
            .take(ENGAGEMENT_HOURS)
            .map(|h| HourlyEngagement {
                hour: h.hour.clone(),
                engagement_score: safe_divide(
                    h.transactions as f64,
                    h.users.max(1) as f64,
                    0.0,
                ),
                activity_rating: activity_rating(
                    h.transactions as f64,
                    m.average_hourly_transactions,
                ),
            })
            .collect(),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueShare {
    pub protocol: String,
    pub revenue: f64,
    pub market_share: f64,
    pub efficiency: f64,
    pub user_value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopRevenueProtocol {
    pub name: String,
    pub revenue: f64,
    pub transactions: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolRevenues {
    pub total_ecosystem_revenue: f64,
    pub revenue_distribution: Vec<RevenueShare>,
    pub top_revenue_protocols: Vec<TopRevenueProtocol>,
}

pub fn protocol_revenues(protocols: &[ProtocolMetric]) -> ProtocolRevenues {
    let gas = total_gas(protocols);

    let mut revenue_distribution: Vec<RevenueShare> = protocols
        .iter()
        .map(|p| RevenueShare {
            protocol: p.protocol_name.clone(),
            revenue: p.gas_total,
            market_share: pct(p.gas_total, gas),
            efficiency: safe_divide(p.gas_total, p.transaction_count as f64, 0.0),
            user_value: safe_divide(p.gas_total, p.sender_count as f64, 0.0),
        })
        .collect();
    revenue_distribution.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

    let mut by_revenue: Vec<&ProtocolMetric> = protocols.iter().collect();
    by_revenue.sort_by(|a, b| b.gas_total.total_cmp(&a.gas_total));

    ProtocolRevenues {
        total_ecosystem_revenue: gas,
        revenue_distribution,
        top_revenue_protocols: by_revenue
            .into_iter()
            .take(TOP_CONCENTRATION_PROTOCOLS)
            .map(|p| TopRevenueProtocol {
                name: p.protocol_name.clone(),
                revenue: p.gas_total,
                transactions: p.transaction_count,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossProtocolFlows {
    pub protocol_overlap_index: f64,
    pub ecosystem_connectivity: f64,
}

pub fn cross_protocol_flows(protocols: &[ProtocolMetric]) -> CrossProtocolFlows {
    let n = protocols.len() as f64;
    let max_senders = protocols.iter().map(|p| p.sender_count).max().unwrap_or(0);
    let total_senders = saturating_sum(protocols.iter().map(|p| p.sender_count));

    CrossProtocolFlows {
        protocol_overlap_index: safe_divide(protocol_synergy(protocols), n * (n - 1.0), 0.0),
        ecosystem_connectivity: if protocols.len() > 1 {
            safe_divide(total_senders as f64, max_senders as f64, 0.0)
        } else {
            0.0
        },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasVolatility {
    pub avg_gas_price: f64,
    pub gas_spread: f64,
    pub high_gas_periods: usize,
    pub mev_opportunity_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MevAnalytics {
    #[serde(serialize_with = "empty_if_none")]
    pub gas_volatility: Option<GasVolatility>,
}

pub fn mev_analytics(m: &AggregatedMetrics) -> MevAnalytics {
    let hours = &m.hourly_activity;
    if hours.is_empty() {
        return MevAnalytics { gas_volatility: None };
    }

    let prices: Vec<f64> = hours.iter().map(|h| h.avg_gas_price).collect();
    let max = prices.iter().copied().fold(f64::MIN, f64::max);
    let min = prices.iter().copied().fold(f64::MAX, f64::min);
    let elevated = prices.iter().filter(|p| **p > m.avg_gas_price * 1.2).count();

    MevAnalytics {
        gas_volatility: Some(GasVolatility {
            avg_gas_price: safe_average(&prices, 0.0),
            gas_spread: max - min,
            high_gas_periods: prices.iter().filter(|p| **p > m.avg_gas_price * 1.5).count(),
            mev_opportunity_score: pct(elevated as f64, prices.len() as f64),
        }),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDetail {
    pub name: String,
    pub dominance_index: f64,
    pub user_concentration: f64,
    pub gas_efficiency: f64,
    pub network_impact: f64,
    pub activity_rating: ProtocolRating,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EcosystemPosition {
    pub user_base: i64,
    pub transaction_volume: i64,
    pub economic_weight: f64,
    pub market_position: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSpecificMetrics {
    pub top_protocol_details: Vec<ProtocolDetail>,
    pub protocol_ecosystem_map: BTreeMap<String, EcosystemPosition>,
}

pub fn protocol_rating(transaction_count: i64, network_transactions: i64) -> ProtocolRating {
    let count = transaction_count as f64;
    let total = network_transactions as f64;
    if count > total * 0.1 {
        ProtocolRating::Major
    } else if count > total * 0.01 {
        ProtocolRating::Significant
    } else {
        ProtocolRating::Emerging
    }
}

pub fn protocol_specific_metrics(m: &AggregatedMetrics) -> ProtocolSpecificMetrics {
    let protocols = &m.protocol_breakdown;
    let network = m.total_transactions as f64;

    let top_protocol_details = protocols
        .iter()
        .map(|p| {
            let tx_share = safe_divide(p.transaction_count as f64, network, 0.0);
            ProtocolDetail {
                name: p.protocol_name.clone(),
                dominance_index: tx_share * 100.0,
                user_concentration: safe_divide(
                    p.transaction_count as f64,
                    p.sender_count as f64,
                    0.0,
                ),
                gas_efficiency: safe_divide(p.gas_total, p.transaction_count as f64, 0.0),
                network_impact: tx_share * safe_divide(p.gas_total, m.total_protocol_gas, 0.0),
                activity_rating: protocol_rating(p.transaction_count, m.total_transactions),
            }
        })
        .collect();

    let mut protocol_ecosystem_map = BTreeMap::new();
    for p in protocols {
        let market_position = protocols
            .iter()
            .position(|other| other.module_address == p.module_address)
            .map(|i| i + 1)
            .unwrap_or(0);
        protocol_ecosystem_map.insert(
            p.protocol_name.clone(),
            EcosystemPosition {
                user_base: p.sender_count,
                transaction_volume: p.transaction_count,
                economic_weight: p.gas_total,
                market_position,
            },
        );
    }

    ProtocolSpecificMetrics {
        top_protocol_details,
        protocol_ecosystem_map,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFlow {
    pub avg_block_utilization: f64,
    pub transaction_density: f64,
    pub network_throughput_ratio: f64,
    pub peak_load_factor: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LiquidityMetrics {
    #[serde(rename_all = "camelCase")]
    Available {
        swap_frequency: f64,
        liquidity_efficiency: f64,
        market_depth: &'static str,
        trading_patterns: Vec<RawDuneRow>,
    },
    Pending { note: &'static str },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMicrostructure {
    pub transaction_flow: TransactionFlow,
    pub liquidity_metrics: LiquidityMetrics,
}

pub fn market_microstructure(m: &AggregatedMetrics) -> MarketMicrostructure {
    let daily = m.daily_transactions as f64;
    let max_tps = m.max_tps as f64;

    let liquidity_metrics = if m.total_swap_events > 0 {
        LiquidityMetrics::Available {
            swap_frequency: m.total_swap_events as f64 / HOURS_PER_DAY,
            liquidity_efficiency: safe_divide(
                m.unique_swappers as f64,
                m.total_swap_events.max(1) as f64,
                0.0,
            ),
            market_depth: "Calculated from swap events",
            trading_patterns: m.swap_sample.clone(),
        }
    } else {
        LiquidityMetrics::Pending {
            note: "DEX trading data being processed",
        }
    };

    MarketMicrostructure {
        transaction_flow: TransactionFlow {
            avg_block_utilization: pct(daily, SECONDS_PER_DAY / ASSUMED_BLOCK_SECONDS),
            transaction_density: safe_divide(daily, m.daily_active_addresses as f64, 0.0),
            network_throughput_ratio: pct(daily, max_tps * SECONDS_PER_DAY),
            peak_load_factor: pct(m.peak_hourly_transactions as f64, max_tps * SECONDS_PER_HOUR),
        },
        liquidity_metrics,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EcosystemDiversity {
    pub total_protocols_identified: usize,
    pub ecosystem_diversity: f64,
    pub dominance_ratio: f64,
}

pub fn ecosystem_diversity(protocols: &[ProtocolMetric]) -> EcosystemDiversity {
    EcosystemDiversity {
        total_protocols_identified: protocols.len(),
        ecosystem_diversity: diversification_index(protocols),
        dominance_ratio: protocols
            .first()
            .map(|p| pct(p.transaction_count as f64, total_transactions(protocols) as f64))
            .unwrap_or(0.0),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub enhanced_protocol_analytics: EnhancedProtocolAnalytics,
    pub enhanced_user_analytics: EnhancedUserAnalytics,
    pub enhanced_token_economics: EnhancedTokenEconomics,
    pub enhanced_network_analytics: EnhancedNetworkAnalytics,
    pub cross_protocol_intelligence: CrossProtocolIntelligence,
    pub defi_tvl_metrics: DefiTvlMetrics,
    pub whale_analytics: WhaleAnalytics,
    #[serde(serialize_with = "empty_if_none")]
    pub cohort_analytics: Option<CohortAnalytics>,
    pub protocol_revenues: ProtocolRevenues,
    pub cross_protocol_flows: CrossProtocolFlows,
    pub mev_analytics: MevAnalytics,
    pub protocol_specific_metrics: ProtocolSpecificMetrics,
    pub market_microstructure: MarketMicrostructure,
    pub ecosystem_diversity: EcosystemDiversity,
}

pub fn derive(m: &AggregatedMetrics) -> DerivedMetrics {
    let protocols = &m.protocol_breakdown;

    DerivedMetrics {
        enhanced_protocol_analytics: EnhancedProtocolAnalytics {
            protocol_dominance: protocol_dominance(protocols),
            gas_economics: gas_economics(protocols),
        },
        enhanced_user_analytics: EnhancedUserAnalytics {
            user_engagement: user_engagement(m),
            transaction_patterns: transaction_patterns(m),
        },
        enhanced_token_economics: EnhancedTokenEconomics {
            token_distribution: token_distribution(&m.token_balances),
            liquidity_analysis: LiquidityAnalysis {
                total_swap_events: m.total_swap_events,
                avg_swaps_per_hour: m.total_swap_events as f64 / HOURS_PER_DAY,
                liquidity_providers: m.liquidity_providers,
                swap_distribution: m.swaps_by_hour.clone(),
            },
        },
        enhanced_network_analytics: EnhancedNetworkAnalytics {
            performance_metrics: PerformanceMetrics {
                theoretical_max_tps: m.max_tps,
                current_utilization: current_utilization(m.daily_transactions, m.max_tps),
                network_efficiency: m.avg_success_rate,
                // Effective TPS once failed transactions are discounted.
                scalability_index: m.max_tps as f64 * m.avg_success_rate / 100.0,
                congestion_indicator: congestion_tier(m.avg_gas_price),
            },
            temporal_analysis: temporal_analysis(m),
        },
        cross_protocol_intelligence: cross_protocol_intelligence(m),
        defi_tvl_metrics: defi_tvl_metrics(m),
        whale_analytics: whale_analytics(m),
        cohort_analytics: cohort_analytics(m),
        protocol_revenues: protocol_revenues(protocols),
        cross_protocol_flows: cross_protocol_flows(protocols),
        mev_analytics: mev_analytics(m),
        protocol_specific_metrics: protocol_specific_metrics(m),
        market_microstructure: market_microstructure(m),
        ecosystem_diversity: ecosystem_diversity(protocols),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol(address: &str, senders: i64, transactions: i64, gas: f64) -> ProtocolMetric {
        ProtocolMetric {
            module_address: address.to_string(),
            protocol_name: format!("P{}", address),
            sender_count: senders,
            signer_count: senders,
            transaction_count: transactions,
            gas_total: gas,
        }
    }

    fn hour(label: &str, transactions: i64, users: i64, failed: i64, gas_price: f64) -> HourlyActivity {
        HourlyActivity {
            hour: label.to_string(),
            transactions,
            users,
            gas: 0.0,
            failed_transactions: failed,
            avg_gas_price: gas_price,
        }
    }

    #[test]
    fn gini_edge_cases() {
        assert_eq!(calculate_gini_coefficient(&[]), 0.0);
        assert_eq!(calculate_gini_coefficient(&[0.0, 0.0]), 0.0);
        assert!(calculate_gini_coefficient(&[5.0, 5.0, 5.0]).abs() < 1e-12);
        assert!((calculate_gini_coefficient(&[0.0, 0.0, 0.0, 100.0]) - 0.75).abs() < 1e-12);
        // Input order does not matter.
        assert!((calculate_gini_coefficient(&[100.0, 0.0, 0.0, 0.0]) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn congestion_tiers() {
        assert_eq!(congestion_tier(0.0), Tier::Low);
        assert_eq!(congestion_tier(0.0002), Tier::Low);
        assert_eq!(congestion_tier(0.0003), Tier::Medium);
        assert_eq!(congestion_tier(0.0006), Tier::High);
    }

    #[test]
    fn diversification_follows_custom_formula() {
        assert_eq!(diversification_index(&[]), 0.0);
        assert_eq!(diversification_index(&[protocol("a", 1, 100, 0.0)]), 0.0);

        let even = [protocol("a", 1, 50, 0.0), protocol("b", 1, 50, 0.0)];
        assert!((diversification_index(&even) - (1.0 - 0.5f64.sqrt())).abs() < 1e-12);

        let zero = [protocol("a", 1, 0, 0.0), protocol("b", 1, 0, 0.0)];
        assert_eq!(diversification_index(&zero), 0.0);
    }

    #[test]
    fn synergy_sums_ordered_pairs() {
        let protocols = [
            protocol("a", 100, 10, 0.0),
            protocol("b", 50, 10, 0.0),
            protocol("c", 0, 10, 0.0),
        ];
        // (a,b)+(b,a) = 1.0, pairs with zero senders contribute 0 both ways.
        assert!((protocol_synergy(&protocols) - 1.0).abs() < 1e-12);

        let flows = cross_protocol_flows(&protocols);
        assert!((flows.protocol_overlap_index - 1.0 / 6.0).abs() < 1e-12);
        assert!((flows.ecosystem_connectivity - 1.5).abs() < 1e-12);
    }

    #[test]
    fn synergy_skips_same_address() {
        let protocols = [protocol("a", 10, 1, 0.0), protocol("a", 10, 1, 0.0)];
        assert_eq!(protocol_synergy(&protocols), 0.0);
    }

    #[test]
    fn dominance_and_gas_economics() {
        let protocols = [
            protocol("a", 10, 600, 1.0),
            protocol("b", 10, 200, 3.0),
            protocol("c", 10, 100, 0.5),
            protocol("d", 10, 100, 0.5),
        ];
        let dominance = protocol_dominance(&protocols);
        assert_eq!(dominance.top_protocol, "Pa");
        assert_eq!(dominance.total_protocol_volume, 1000);
        assert!((dominance.concentration_ratio - 90.0).abs() < 1e-9);

        let gas = gas_economics(&protocols);
        assert_eq!(gas.protocol_gas_ranking[0].protocol, "Pb");
        assert_eq!(gas.protocol_gas_ranking[0].rank, 1);
        assert!((gas.gas_concentration - 60.0).abs() < 1e-9);
        assert!((gas.avg_gas_efficiency - 0.005).abs() < 1e-12);
    }

    #[test]
    fn top_revenue_protocols_rank_by_gas() {
        let protocols = vec![
            protocol("a", 10, 100, 0.1),
            protocol("b", 10, 100, 0.2),
            protocol("c", 10, 100, 0.3),
            protocol("d", 10, 100, 50.0),
        ];
        let revenues = protocol_revenues(&protocols);

        let names: Vec<&str> = revenues
            .top_revenue_protocols
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, ["Pd", "Pc", "Pb"]);
        assert_eq!(revenues.top_revenue_protocols[0].revenue, 50.0);
        assert_eq!(revenues.revenue_distribution[0].protocol, "Pd");
    }

    #[test]
    fn empty_metrics_derive_without_failures() {
        let m = AggregatedMetrics::default();
        let derived = derive(&m);

        assert!(cohort_analytics(&m).is_none());
        assert!(matches!(derived.whale_analytics, WhaleAnalytics::Pending { .. }));
        assert!(matches!(derived.defi_tvl_metrics, DefiTvlMetrics::GasProxy { .. }));
        assert_eq!(derived.enhanced_protocol_analytics.protocol_dominance.top_protocol, "Unknown");
        assert_eq!(derived.cross_protocol_flows.protocol_overlap_index, 0.0);
        assert_eq!(derived.enhanced_network_analytics.performance_metrics.current_utilization, 0.0);

        let json = serde_json::to_value(&derived).unwrap();
        assert_eq!(json["whaleAnalytics"]["note"], "Token balance data being processed");
        assert_eq!(json["cohortAnalytics"], serde_json::json!({}));
        assert_eq!(json["mevAnalytics"]["gasVolatility"], serde_json::json!({}));
    }

    #[test]
    fn whale_analytics_uses_balances() {
        let m = AggregatedMetrics {
            token_balances: vec![2_000_000.0, 1_500_000.0, 500.0, 0.0],
            ..Default::default()
        };
        match whale_analytics(&m) {
            WhaleAnalytics::Available {
                total_large_holders,
                whale_concentration,
                distribution_analysis,
                ..
            } => {
                assert_eq!(total_large_holders, 2);
                assert!((whale_concentration - 100.0).abs() < 1e-9);
                assert_eq!(distribution_analysis.top1_percent, 1);
                assert_eq!(distribution_analysis.top10_percent, 1);
                assert!(distribution_analysis.gini_coefficient > 0.4);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn hourly_derivations() {
        let m = AggregatedMetrics {
            max_tps: 100,
            avg_gas_price: 0.0001,
            hourly_transactions: 100,
            peak_hourly_transactions: 400,
            average_hourly_transactions: 200.0,
            hourly_activity: vec![
                hour("0", 100, 10, 10, 0.0001),
                hour("1", 400, 0, 0, 0.0002),
                hour("2", 100, 5, 50, 0.00013),
            ],
            ..Default::default()
        };

        let patterns = transaction_patterns(&m);
        assert!((patterns.peak_to_peak_variation - 300.0).abs() < 1e-9);
        assert!((patterns.network_utilization - 25.0).abs() < 1e-9);
        assert_eq!(patterns.peak_hour_analysis[0].hour, "1");

        let cohort = cohort_analytics(&m).unwrap();
        assert!((cohort.activity_consistency - 50.0).abs() < 1e-9);
        assert!((cohort.user_retention_proxy - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(cohort.hourly_user_engagement[1].activity_rating, Tier::High);
        assert_eq!(cohort.hourly_user_engagement[0].activity_rating, Tier::Low);

        let temporal = temporal_analysis(&m);
        assert_eq!(temporal.network_stress[0].hour, "2");

        let mev = mev_analytics(&m).gas_volatility.unwrap();
        assert_eq!(mev.high_gas_periods, 1);
        assert!((mev.mev_opportunity_score - 200.0 / 3.0).abs() < 1e-9);
        assert!((mev.gas_spread - 0.0001).abs() < 1e-12);
    }

    #[test]
    fn protocol_ratings_follow_network_share() {
        assert_eq!(protocol_rating(200, 1000), ProtocolRating::Major);
        assert_eq!(protocol_rating(50, 1000), ProtocolRating::Significant);
        assert_eq!(protocol_rating(5, 1000), ProtocolRating::Emerging);
    }
}
