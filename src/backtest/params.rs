//! Parameter table rows and their conversion to strategy parameters

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Name of the row carrying the starting cash
pub const CASH: &str = "Cash";

const DEFAULT_CASH: f64 = 1.0;

/// Parameter conversion errors
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Invalid cash value {0:?}")]
    InvalidCash(String),
    #[error("Invalid value {value:?} for parameter {name}: {source}")]
    InvalidValue {
        name: String,
        value: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One row of the parameter table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRow {
    #[serde(rename = "Parameter")]
    pub parameter: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

impl ParamRow {
    pub fn new(parameter: impl Into<String>, value: Value) -> Self {
        Self {
            parameter: parameter.into(),
            value,
        }
    }

    /// Table cell for an engine parameter; maps and lists are shown as JSON text
    pub fn from_param(name: &str, value: Value) -> Self {
        let value = match value {
            Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
            other => other,
        };
        Self::new(name, value)
    }

    pub fn cash(cash: Decimal) -> Self {
        let value = if cash.fract().is_zero() {
            i64::try_from(cash).map(Value::from).ok()
        } else {
            None
        };
        let value = value.unwrap_or_else(|| Value::String(cash.normalize().to_string()));
        Self::new(CASH, value)
    }

    /// The cell as typed by the user; strings are kept verbatim
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Table rows as `name -> text`, the form a click collects
pub fn stringify_rows(rows: &[ParamRow]) -> BTreeMap<String, String> {
    rows.iter()
        .map(|row| (row.parameter.clone(), row.value_text()))
        .collect()
}

/// Split collected rows into starting cash and JSON-typed strategy parameters
///
/// `Cash` defaults to 1 when absent; every other value is parsed as JSON, so
/// `"12"` becomes the integer 12.
pub fn build_param_map(table: &BTreeMap<String, String>) -> Result<(Decimal, Map<String, Value>), ParamError> {
    let cash = match table.get(CASH) {
        None => Decimal::from_f64(DEFAULT_CASH).unwrap_or(Decimal::ONE),
        Some(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Decimal::from_f64)
            .ok_or_else(|| ParamError::InvalidCash(text.clone()))?,
    };

    let mut params = Map::new();
    for (name, text) in table.iter().filter(|(name, _)| name.as_str() != CASH) {
        let value = serde_json::from_str(text).map_err(|source| ParamError::InvalidValue {
            name: name.clone(),
            value: text.clone(),
            source,
        })?;
        params.insert(name.clone(), value);
    }
    Ok((cash, params))
}
