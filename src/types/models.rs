use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// One result row of an analytics query: column name to scalar.
pub type RawDuneRow = Map<String, Value>;

/// Placeholder shown wherever a metric has no data behind it.
pub const NOT_AVAILABLE: &str = "-";

/// Serialize `None` as `"-"` so the dashboard can tell "not available" from zero.
pub fn dash_if_none<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_str(NOT_AVAILABLE),
    }
}

/// Serialize `None` as an empty object for sections that are objects when present.
pub fn empty_if_none<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMetric {
    pub module_address: String,
    pub protocol_name: String,
    pub sender_count: i64,
    pub signer_count: i64,
    pub transaction_count: i64,
    /// Gas in APT (octa / 1e8).
    pub gas_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub holder: String,
    pub token_type: String,
    pub balance: f64,
    pub formatted_balance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyActivity {
    pub hour: String,
    pub transactions: i64,
    pub users: i64,
    pub gas: f64,
    pub failed_transactions: i64,
    pub avg_gas_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakePosition {
    pub validator: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub name: String,
    pub value: String,
    pub change: String,
    pub category: String,
    pub query_url: String,
    pub query_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Cell {
        #[serde(serialize_with = "dash_if_none")]
        value: Option<f64>,
    }

    #[derive(Serialize)]
    struct Section {
        #[serde(serialize_with = "empty_if_none")]
        value: Option<Cell>,
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(serde_json::to_value(Cell { value: None }).unwrap(), json!({ "value": "-" }));
        assert_eq!(
            serde_json::to_value(Cell { value: Some(1.5) }).unwrap(),
            json!({ "value": 1.5 })
        );
    }

    #[test]
    fn missing_sections_render_as_empty_objects() {
        assert_eq!(serde_json::to_value(Section { value: None }).unwrap(), json!({ "value": {} }));
        assert_eq!(
            serde_json::to_value(Section { value: Some(Cell { value: Some(2.0) }) }).unwrap(),
            json!({ "value": { "value": 2.0 } })
        );
    }
}
