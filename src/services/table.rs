use crate::services::aggregator::AggregatedMetrics;
use crate::services::dune::DuneQuery;
use crate::services::safe_math::to_fixed;
use crate::types::models::{TableRow, NOT_AVAILABLE};

/// Values that mean "no data" once formatted; rows showing them are dropped.
const EMPTY_VALUES: [&str; 5] = ["0", "0.000000", "$0", "0 APT", "0 TPS"];

/// Compact human form: `1.2B`, `3.4M`, `5.6K`, otherwise a rounded integer.
pub fn format_metric_value(value: f64) -> String {
    if value >= 1e9 {
        format!("{}B", to_fixed(value / 1e9, 1))
    } else if value >= 1e6 {
        format!("{}M", to_fixed(value / 1e6, 1))
    } else if value >= 1e3 {
        format!("{}K", to_fixed(value / 1e3, 1))
    } else {
        to_fixed(value, 0)
    }
}

pub fn dune_query_url(base: &str, query_id: u64) -> String {
    format!("{}/{}", base.trim_end_matches('/'), query_id)
}

struct RowBuilder<'a> {
    query_url_base: &'a str,
    rows: Vec<TableRow>,
}

impl<'a> RowBuilder<'a> {
    fn push(&mut self, name: &str, value: String, category: &str, source: DuneQuery) {
        self.push_with_secondary(name, value, category, source, None);
    }

    fn push_with_secondary(
        &mut self,
        name: &str,
        value: String,
        category: &str,
        source: DuneQuery,
        secondary_value: Option<String>,
    ) {
        self.rows.push(TableRow {
            name: name.to_string(),
            value,
            change: NOT_AVAILABLE.to_string(),
            category: category.to_string(),
            query_url: dune_query_url(self.query_url_base, source.id()),
            query_id: source.id(),
            secondary_value,
        });
    }
}

/// Presentation rows for the dashboard table, filtered and sorted by
/// `(category, name)`.
pub fn build_table_rows(m: &AggregatedMetrics, query_url_base: &str) -> Vec<TableRow> {
    let mut b = RowBuilder {
        query_url_base,
        rows: Vec::new(),
    };

    if let Some(count) = m.all_time_transaction_count {
        b.push(
            "All-Time Total Transactions",
            format_metric_value(count as f64),
            "Network Activity",
            DuneQuery::AllTimeTransactions,
        );
    }

    b.push(
        "Daily Active Addresses (24h)",
        format_metric_value(m.daily_active_addresses as f64),
        "User Activity",
        DuneQuery::DexComparison,
    );

    if m.max_tps > 0 {
        b.push(
            "Max TPS (15 blocks)",
            format!("{} TPS", m.max_tps),
            "Network Performance",
            DuneQuery::TransactionAnalysis,
        );
    }

    b.push(
        "Transaction Success Rate",
        format!("{}%", to_fixed(m.avg_success_rate, 1)),
        "Network Performance",
        DuneQuery::ProtocolActivity,
    );

    if m.total_signatures > 0 {
        b.push(
            "Total Network Signatures",
            format_metric_value(m.total_signatures as f64),
            "Network Performance",
            DuneQuery::UserBehavior,
        );
    }

    let net_gas = (m.net_gas_apt > 0.0)
        .then(|| format!("{} APT", format_metric_value(m.net_gas_apt)));
    b.push_with_secondary(
        "Daily Gas Fees",
        format!("${}", format_metric_value(m.daily_gas_fees_usd)),
        "Network Activity",
        DuneQuery::UserAnalytics,
        net_gas,
    );

    if m.avg_gas_price > 0.0 {
        b.push(
            "Average Gas Cost (APT)",
            to_fixed(m.avg_gas_price, 6),
            "Network Performance",
            DuneQuery::ProtocolActivity,
        );
    }

    if let Some(block_time) = m.avg_block_time.filter(|t| *t > 0.0) {
        b.push(
            "Average Block Time",
            format!("{}s", to_fixed(block_time, 2)),
            "Network Performance",
            DuneQuery::BlockTimes,
        );
    }

    if let Some(finality) = m
        .avg_finality_time
        .filter(|t| *t > 0.0 && Some(*t) != m.avg_block_time)
    {
        b.push(
            "Transaction Finality Time",
            format!("{}s", to_fixed(finality, 2)),
            "Network Performance",
            DuneQuery::BlockTimes,
        );
    }

    if let Some(reliability) = m
        .network_reliability_score
        .filter(|r| *r != m.avg_success_rate)
    {
        b.push(
            "Enhanced Network Reliability",
            format!("{}%", to_fixed(reliability, 1)),
            "Network Performance",
            DuneQuery::BlockTimes,
        );
    }

    if m.total_swap_events > 0 {
        b.push(
            "Total Swap Events",
            format_metric_value(m.total_swap_events as f64),
            "DEX Analytics",
            DuneQuery::DexTradingVolume,
        );
    }

    if m.unique_swappers > 0 {
        b.push(
            "Unique Traders",
            format_metric_value(m.unique_swappers as f64),
            "DEX Analytics",
            DuneQuery::DexTradingVolume,
        );
    }

    if m.peak_hourly_transactions > 0 {
        b.push(
            "Peak Hour Transaction Volume",
            format_metric_value(m.peak_hourly_transactions as f64),
            "Network Activity",
            DuneQuery::ActivityPatterns,
        );
    }

    if m.peak_hourly_users > 0 {
        b.push(
            "Peak Hour Active Users",
            format_metric_value(m.peak_hourly_users as f64),
            "User Activity",
            DuneQuery::ActivityPatterns,
        );
    }

    // Only shown while the identified protocols stay a plausible subset of the network.
    if m.total_protocol_gas > 0.0
        && (m.total_protocol_transactions as f64) < m.total_transactions as f64 * 0.8
    {
        b.push(
            "Identified Protocol Activity",
            format!(
                "{} txns ({} APT gas)",
                format_metric_value(m.total_protocol_transactions as f64),
                format_metric_value(m.total_protocol_gas)
            ),
            "Protocol Analytics",
            DuneQuery::NetworkStats,
        );
    }

    if m.hourly_failed_txns > 0 {
        b.push(
            "Hourly Failed Transactions",
            format_metric_value(m.hourly_failed_txns as f64),
            "Network Performance",
            DuneQuery::ActivityPatterns,
        );
    }

    if m.average_hourly_transactions > 0.0 {
        b.push(
            "Average Hourly Transactions",
            format_metric_value(m.average_hourly_transactions),
            "Network Activity",
            DuneQuery::ActivityPatterns,
        );
    }

    if let Some(days) = m.network_lifetime_days.filter(|d| *d > 0) {
        b.push(
            "Network Age (Days)",
            format!("{} days", days),
            "Network Performance",
            DuneQuery::AllTimeTransactions,
        );
    }

    finalize_rows(b.rows)
}

/// Drop empty-valued rows and order by `(category, name)`.
pub fn finalize_rows(rows: Vec<TableRow>) -> Vec<TableRow> {
    let mut rows: Vec<TableRow> = rows
        .into_iter()
        .filter(|row| !EMPTY_VALUES.contains(&row.value.as_str()))
        .collect();
    rows.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
    rows
}
