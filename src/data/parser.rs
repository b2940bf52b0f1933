use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::{debug, warn};

pub const NOT_AVAILABLE: &str = "N/A";

/// One equity row from an NSE index snapshot, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub symbol: String,
    pub price: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub week_high: f64,
    pub week_low: f64,
    pub year_high: f64,
    pub year_low: f64,
    pub p_change: f64,
    pub per_change_30d: f64,
    pub per_change_365d: f64,
    pub ffmc: f64,
    pub industry: String,
    pub company_name: String,
}

impl StockRecord {
    fn from_json(symbol: String, node: &Value) -> Self {
        let meta = node.get("meta");
        Self {
            symbol,
            price: number_or_zero(node.get("lastPrice")),
            day_high: number_or_zero(node.get("dayHigh")),
            day_low: number_or_zero(node.get("dayLow")),
            week_high: number_or_zero(node.get("nearWKH")),
            week_low: number_or_zero(node.get("nearWKL")),
            year_high: number_or_zero(node.get("yearHigh")),
            year_low: number_or_zero(node.get("yearLow")),
            p_change: number_or_zero(node.get("pChange")),
            per_change_30d: number_or_zero(node.get("perChange30d")),
            per_change_365d: number_or_zero(node.get("perChange365d")),
            ffmc: number_or_zero(node.get("ffmc")),
            industry: text_or_na(meta.and_then(|m| m.get("industry"))),
            company_name: text_or_na(meta.and_then(|m| m.get("companyName"))),
        }
    }
}

// NSE occasionally ships numbers as strings ("812.50"), those still count
fn number_or_zero(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn text_or_na(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn symbol_of(node: &Value) -> Option<String> {
    match node.get("symbol")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct ResponseParser;

impl ResponseParser {
    /// Turn an `equity-stockIndices` body into records.
    ///
    /// Never fails: anything that doesn't look like `{"data": [...]}` is
    /// logged and yields `None`. A well-formed but empty `data` array is
    /// `Some(vec![])`. Rows without a symbol are skipped; duplicates are
    /// kept in source order.
    pub fn parse(body: &str) -> Option<Vec<StockRecord>> {
        let root: Value = match serde_json::from_str(body) {
            Ok(root) => root,
            Err(e) => {
                warn!("NSE response is not valid JSON: {}", e);
                return None;
            }
        };

        let data = match root.as_object().and_then(|obj| obj.get("data")) {
            Some(data) => data,
            None => {
                warn!("JSON invalid or missing 'data'");
                return None;
            }
        };

        let rows = match data.as_array() {
            Some(rows) => rows,
            None => {
                warn!("'data' in NSE response is not an array");
                return None;
            }
        };

        let records: Vec<StockRecord> = rows
            .iter()
            .filter_map(|node| symbol_of(node).map(|symbol| StockRecord::from_json(symbol, node)))
            .collect();

        let skipped = rows.len() - records.len();
        if skipped > 0 {
            debug!("Skipped {} rows without a symbol", skipped);
        }

        Some(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_record_with_defaults() {
        let body = r#"{"data":[{"symbol":"SBIN","lastPrice":812.5,"meta":{"industry":"Banks","companyName":"State Bank of India"}}]}"#;
        let records = ResponseParser::parse(body).unwrap();

        assert_eq!(records.len(), 1);
        let sbin = &records[0];
        assert_eq!(sbin.symbol, "SBIN");
        assert_eq!(sbin.price, 812.5);
        assert_eq!(sbin.day_high, 0.0);
        assert_eq!(sbin.ffmc, 0.0);
        assert_eq!(sbin.industry, "Banks");
        assert_eq!(sbin.company_name, "State Bank of India");
    }

    #[test]
    fn test_parse_maps_every_field() {
        let body = r#"{"data":[{
            "symbol":"INFY","lastPrice":1500.25,"dayHigh":1510,"dayLow":1490.5,
            "yearHigh":1700,"yearLow":1200,"nearWKH":11.7,"nearWKL":-25.02,
            "pChange":1.25,"perChange30d":-3.5,"perChange365d":18.2,"ffmc":512345.67,
            "meta":{"industry":"IT","companyName":"Infosys Limited"}
        }]}"#;
        let records = ResponseParser::parse(body).unwrap();

        assert_eq!(records, vec![StockRecord {
            symbol: "INFY".to_string(),
            price: 1500.25,
            day_high: 1510.0,
            day_low: 1490.5,
            week_high: 11.7,
            week_low: -25.02,
            year_high: 1700.0,
            year_low: 1200.0,
            p_change: 1.25,
            per_change_30d: -3.5,
            per_change_365d: 18.2,
            ffmc: 512345.67,
            industry: "IT".to_string(),
            company_name: "Infosys Limited".to_string(),
        }]);
    }

    #[test]
    fn test_missing_and_mistyped_fields_fall_back() {
        let body = r#"{"data":[{"symbol":"TCS","lastPrice":"3500.5","dayHigh":null,"dayLow":true,"yearHigh":"-","meta":{"industry":42}}]}"#;
        let records = ResponseParser::parse(body).unwrap();

        assert_eq!(records.len(), 1);
        let tcs = &records[0];
        assert_eq!(tcs.price, 3500.5);
        assert_eq!(tcs.day_high, 0.0);
        assert_eq!(tcs.day_low, 0.0);
        assert_eq!(tcs.year_high, 0.0);
        assert_eq!(tcs.industry, NOT_AVAILABLE);
        assert_eq!(tcs.company_name, NOT_AVAILABLE);
    }

    #[test]
    fn test_rows_without_symbol_are_skipped() {
        assert_eq!(ResponseParser::parse(r#"{"data":[{"lastPrice":100}]}"#), Some(vec![]));

        let body = r#"{"data":[{"symbol":"A"},{"lastPrice":1},{"symbol":""},{"symbol":null},{"symbol":true},{"symbol":{"id":1}},{"symbol":"B"},{"symbol":500}]}"#;
        let symbols: Vec<String> = ResponseParser::parse(body).unwrap().into_iter().map(|r| r.symbol).collect();
        assert_eq!(symbols, vec!["A", "B", "500"]);
    }

    #[test]
    fn test_duplicates_keep_order_and_multiplicity() {
        let body = r#"{"data":[
            {"symbol":"NIFTY 500","lastPrice":22000},
            {"symbol":"RELIANCE","lastPrice":2900},
            {"symbol":"NIFTY 500","lastPrice":22001}
        ]}"#;
        let records = ResponseParser::parse(body).unwrap();

        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NIFTY 500", "RELIANCE", "NIFTY 500"]);
        assert_eq!(records[0].price, 22000.0);
        assert_eq!(records[2].price, 22001.0);
    }

    #[test]
    fn test_bodies_without_data_array_are_rejected() {
        for body in [
            "",
            "not json",
            "[]",
            "42",
            r#"{"name":"NIFTY 500"}"#,
            r#"{"data":{"symbol":"SBIN"}}"#,
            r#"{"data":null}"#,
            r#"{"data":"SBIN"}"#,
        ] {
            assert_eq!(ResponseParser::parse(body), None, "body {:?}", body);
        }
    }

    #[test]
    fn test_empty_data_array_is_a_valid_snapshot() {
        assert_eq!(ResponseParser::parse(r#"{"data":[]}"#), Some(vec![]));
    }

    #[test]
    fn test_record_serializes_for_frontend() {
        let records = ResponseParser::parse(r#"{"data":[{"symbol":"SBIN","pChange":1.5,"perChange30d":2.0}]}"#).unwrap();
        let json = serde_json::to_value(&records[0]).unwrap();

        assert_eq!(json["symbol"], "SBIN");
        assert_eq!(json["pChange"], 1.5);
        assert_eq!(json["perChange30d"], 2.0);
        assert_eq!(json["perChange365d"], 0.0);
        assert_eq!(json["companyName"], "N/A");
        assert!(json.get("weekHigh").is_some());
    }
}
