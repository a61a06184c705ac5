//! Wire types for the Gamma and CLOB public APIs
//!
//! Gamma is inconsistent about list-shaped fields: `outcomes`,
//! `clobTokenIds` and `outcomePrices` arrive either as native JSON arrays or
//! as JSON-encoded strings depending on the endpoint. [`FlexList`] absorbs
//! both shapes; anything else decodes to empty, and candidates with empty
//! required fields are discarded upstream.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// List field tolerating `["a","b"]`, `"[\"a\",\"b\"]"` and garbage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlexList(pub Vec<String>);

impl<'de> Deserialize<'de> for FlexList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(FlexList(decode_string_list(&value)))
    }
}

fn decode_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(stringify_item).collect(),
        // JSON-encoded string: decode once, then read structurally.
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items.iter().map(stringify_item).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn stringify_item(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Token entry in the `tokens` array of a market payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketToken {
    #[serde(default)]
    pub token_id: String,
    #[serde(default)]
    pub outcome: String,
}

/// One market as returned by Gamma `/events` or `/markets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default, alias = "condition_id")]
    pub condition_id: String,
    #[serde(default)]
    pub slug: Option<String>,
    /// Populated by some endpoints; preferred when present.
    #[serde(default)]
    pub tokens: Vec<MarketToken>,
    /// Fallback: token IDs positionally matched against `outcomes`.
    #[serde(default)]
    pub clob_token_ids: FlexList,
    #[serde(default)]
    pub outcomes: FlexList,
    /// Settled markets quote the winning side at 1.
    #[serde(default)]
    pub outcome_prices: FlexList,
}

/// Event wrapper from Gamma `/events`; events bundle their markets.
#[derive(Debug, Clone, Deserialize)]
pub struct GammaEvent {
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

/// Best-quote response from the CLOB `/price` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceResponse {
    pub price: String,
}
