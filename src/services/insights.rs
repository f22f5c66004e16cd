//! Scores the snapshot against fixed operating thresholds and explains the
//! result in plain language for the dashboard.

use serde::Serialize;

use crate::services::aggregator::AggregatedMetrics;
use crate::services::derived::{current_utilization, DerivedMetrics};
use crate::services::safe_math::{safe_average, safe_divide, to_fixed};

pub const HIGH_SUCCESS_RATE: f64 = 95.0;
pub const GOOD_SUCCESS_RATE: f64 = 85.0;
pub const MIN_ACCEPTABLE_SUCCESS_RATE: f64 = 75.0;

pub const HIGH_ENGAGEMENT: f64 = 0.6;
pub const MEDIUM_ENGAGEMENT: f64 = 0.4;
pub const LOW_ENGAGEMENT: f64 = 0.2;

pub const LOW_UTILIZATION: f64 = 30.0;
pub const HIGH_UTILIZATION: f64 = 80.0;
pub const CONGESTION_THRESHOLD: f64 = 90.0;

pub const HIGH_CONCENTRATION: f64 = 80.0;
pub const MEDIUM_CONCENTRATION: f64 = 60.0;

pub const HIGH_ECONOMIC_ACTIVITY_USD: f64 = 50_000.0;
pub const MEDIUM_ECONOMIC_ACTIVITY_USD: f64 = 10_000.0;

const EXCELLENT_SCORE: f64 = 85.0;
const GOOD_SCORE: f64 = 75.0;
const FAIR_SCORE: f64 = 50.0;

pub const HIGH_TPS: f64 = 1_000.0;
pub const MEDIUM_TPS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Insufficient Data")]
    InsufficientData,
}

impl HealthStatus {
    fn from_score(score: f64) -> Self {
        if score >= EXCELLENT_SCORE {
            HealthStatus::Excellent
        } else if score >= GOOD_SCORE {
            HealthStatus::Good
        } else if score >= FAIR_SCORE {
            HealthStatus::Fair
        } else {
            HealthStatus::Poor
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub metric: &'static str,
    pub value: f64,
    pub score: f64,
    pub significance: Significance,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EcosystemHealth {
    pub overall_score: f64,
    pub status: HealthStatus,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub category: &'static str,
    pub priority: Significance,
    pub action: &'static str,
    pub context: String,
}

/// Health checks run only for inputs that actually carry data; a zero input
/// means its source query returned nothing.
pub fn analyze_network_health(m: &AggregatedMetrics, derived: &DerivedMetrics) -> EcosystemHealth {
    let checks = [
        success_rate_insight(m.avg_success_rate),
        engagement_insight(m.behavior_daily_active_users, m.unique_users),
        utilization_insight(m.daily_transactions, m.max_tps),
        concentration_insight(
            derived
                .enhanced_protocol_analytics
                .protocol_dominance
                .concentration_ratio,
        ),
        economic_insight(m.daily_gas_fees_usd),
        throughput_insight(m.max_tps),
    ];
    let insights: Vec<Insight> = checks.into_iter().flatten().collect();

    if insights.is_empty() {
        return EcosystemHealth {
            overall_score: 0.0,
            status: HealthStatus::InsufficientData,
            insights,
        };
    }

    let scores: Vec<f64> = insights.iter().map(|i| i.score).collect();
    let overall_score = safe_average(&scores, 0.0);

    EcosystemHealth {
        overall_score,
        status: HealthStatus::from_score(overall_score),
        insights,
    }
}

pub fn recommendations(health: &EcosystemHealth) -> Vec<Recommendation> {
    health
        .insights
        .iter()
        .filter_map(|insight| {
            insight.recommendation.map(|action| Recommendation {
                category: insight.metric,
                priority: insight.significance,
                action,
                context: insight.context.clone(),
            })
        })
        .collect()
}

fn success_rate_insight(rate: f64) -> Option<Insight> {
    if rate <= 0.0 {
        return None;
    }

    let (score, significance, recommendation) = if rate >= HIGH_SUCCESS_RATE {
        (100.0, Significance::Low, None)
    } else if rate >= GOOD_SUCCESS_RATE {
        (75.0, Significance::Medium, None)
    } else if rate >= MIN_ACCEPTABLE_SUCCESS_RATE {
        (50.0, Significance::High, Some("Investigate the most common transaction abort codes"))
    } else {
        (
            25.0,
            Significance::Critical,
            Some("Review failing contract calls and gas estimation across major protocols"),
        )
    };

    Some(Insight {
        metric: "Transaction Success Rate",
        value: rate,
        score,
        significance,
        context: format!("{}% of transactions executed successfully", to_fixed(rate, 1)),
        recommendation,
    })
}

fn engagement_insight(daily_users: i64, unique_users: i64) -> Option<Insight> {
    if daily_users <= 0 || unique_users <= 0 {
        return None;
    }

    let ratio = safe_divide(daily_users as f64, unique_users as f64, 0.0);
    let (score, significance, recommendation) = if ratio >= HIGH_ENGAGEMENT {
        (100.0, Significance::Low, None)
    } else if ratio >= MEDIUM_ENGAGEMENT {
        (75.0, Significance::Low, None)
    } else if ratio >= LOW_ENGAGEMENT {
        (50.0, Significance::Medium, Some("Focus on retention of returning users"))
    } else {
        (
            25.0,
            Significance::High,
            Some("Most accounts are dormant; incentivize repeat activity"),
        )
    };

    Some(Insight {
        metric: "User Engagement",
        value: ratio,
        score,
        significance,
        context: format!(
            "{} of {} known users were active in the last day",
            daily_users, unique_users
        ),
        recommendation,
    })
}

fn utilization_insight(daily_transactions: i64, max_tps: i64) -> Option<Insight> {
    if daily_transactions <= 0 || max_tps <= 0 {
        return None;
    }

    let utilization = current_utilization(daily_transactions, max_tps);
    let (score, significance, recommendation) = if utilization > CONGESTION_THRESHOLD {
        (
            40.0,
            Significance::Critical,
            Some("Network is near capacity; expect rising gas prices"),
        )
    } else if utilization > HIGH_UTILIZATION {
        (70.0, Significance::High, Some("Monitor capacity as load approaches demonstrated peak"))
    } else if utilization < LOW_UTILIZATION {
        (80.0, Significance::Low, None)
    } else {
        (100.0, Significance::Low, None)
    };

    Some(Insight {
        metric: "Network Utilization",
        value: utilization,
        score,
        significance,
        context: format!(
            "Average load is {}% of the {} TPS peak",
            to_fixed(utilization, 2),
            max_tps
        ),
        recommendation,
    })
}

fn concentration_insight(concentration: f64) -> Option<Insight> {
    if concentration <= 0.0 {
        return None;
    }

    let (score, significance, recommendation) = if concentration > HIGH_CONCENTRATION {
        (
            40.0,
            Significance::High,
            Some("Activity depends on a few protocols; diversification would reduce risk"),
        )
    } else if concentration > MEDIUM_CONCENTRATION {
        (70.0, Significance::Medium, None)
    } else {
        (100.0, Significance::Low, None)
    };

    Some(Insight {
        metric: "Protocol Concentration",
        value: concentration,
        score,
        significance,
        context: format!(
            "Top three protocols carry {}% of identified protocol transactions",
            to_fixed(concentration, 1)
        ),
        recommendation,
    })
}

fn economic_insight(daily_gas_usd: f64) -> Option<Insight> {
    if daily_gas_usd <= 0.0 {
        return None;
    }

    let (score, significance, recommendation) = if daily_gas_usd >= HIGH_ECONOMIC_ACTIVITY_USD {
        (100.0, Significance::Low, None)
    } else if daily_gas_usd >= MEDIUM_ECONOMIC_ACTIVITY_USD {
        (75.0, Significance::Low, None)
    } else {
        (50.0, Significance::Medium, Some("Fee revenue is low; track DeFi volume growth"))
    };

    Some(Insight {
        metric: "Economic Activity",
        value: daily_gas_usd,
        score,
        significance,
        context: format!("${} in gas fees over the last day", to_fixed(daily_gas_usd, 0)),
        recommendation,
    })
}

fn throughput_insight(max_tps: i64) -> Option<Insight> {
    if max_tps <= 0 {
        return None;
    }

    let tps = max_tps as f64;
    let (score, significance) = if tps >= HIGH_TPS {
        (100.0, Significance::Low)
    } else if tps >= MEDIUM_TPS {
        (75.0, Significance::Low)
    } else {
        (50.0, Significance::Medium)
    };

    Some(Insight {
        metric: "Throughput",
        value: tps,
        score,
        significance,
        context: format!("Peak of {} TPS over 15 blocks", max_tps),
        recommendation: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::derived::derive;

    #[test]
    fn no_data_means_insufficient() {
        let m = AggregatedMetrics::default();
        let health = analyze_network_health(&m, &derive(&m));

        assert_eq!(health.status, HealthStatus::InsufficientData);
        assert_eq!(health.overall_score, 0.0);
        assert!(recommendations(&health).is_empty());
    }

    #[test]
    fn healthy_network_scores_excellent() {
        let m = AggregatedMetrics {
            avg_success_rate: 99.0,
            behavior_daily_active_users: 700,
            unique_users: 1_000,
            daily_gas_fees_usd: 60_000.0,
            max_tps: 5_000,
            daily_transactions: 100_000_000,
            ..Default::default()
        };
        let health = analyze_network_health(&m, &derive(&m));

        assert_eq!(health.insights.len(), 5);
        assert_eq!(health.status, HealthStatus::Excellent);
        assert!(recommendations(&health).is_empty());
    }

    #[test]
    fn weak_metrics_produce_recommendations() {
        let m = AggregatedMetrics {
            avg_success_rate: 60.0,
            behavior_daily_active_users: 10,
            unique_users: 1_000,
            daily_gas_fees_usd: 500.0,
            ..Default::default()
        };
        let health = analyze_network_health(&m, &derive(&m));
        let recs = recommendations(&health);

        assert_eq!(health.status, HealthStatus::Poor);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].category, "Transaction Success Rate");
        assert_eq!(recs[0].priority, Significance::Critical);
    }

    #[test]
    fn utilization_tiers() {
        // 86_400 tx/day at 1 TPS peak is exactly 100%.
        let congested = utilization_insight(86_400, 1).unwrap();
        assert_eq!(congested.significance, Significance::Critical);

        let idle = utilization_insight(86_400, 100).unwrap();
        assert_eq!(idle.score, 80.0);
        assert!(utilization_insight(0, 100).is_none());
    }
}
