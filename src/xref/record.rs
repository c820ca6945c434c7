use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A generic field→value record as read from any source.
pub type RawRow = Map<String, Value>;

/// Which pair of fields carries the OE and YV values for a given source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub oe_field: String,
    pub yv_field: String,
}

impl FieldMapping {
    pub fn new(oe_field: impl Into<String>, yv_field: impl Into<String>) -> Self {
        Self {
            oe_field: oe_field.into(),
            yv_field: yv_field.into(),
        }
    }

    /// `orjNo`/`yvNo`, used by the remote sheet service and reference sheets.
    pub fn orj_no() -> Self {
        Self::new("orjNo", "yvNo")
    }

    /// `OE`/`YV`, used by the cache snapshot.
    pub fn oe_yv() -> Self {
        Self::new("OE", "YV")
    }

    pub fn describe(&self) -> String {
        format!("{}/{}", self.oe_field, self.yv_field)
    }
}

/// Text form of a scalar cell. Arrays, objects, null, and empty strings have
/// no usable text.
pub fn field_text(row: &RawRow, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub fn row_from_pairs<'a, I>(pairs: I) -> RawRow
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
