use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::fmt;

use crate::error::ViewError;

/// A single cell value in a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl CellValue {
    /// Convert a JSON value into a cell. `null` has no cell representation.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(CellValue::Bool(*b)),
            JsonValue::Number(n) => Some(CellValue::Number(n.clone())),
            JsonValue::String(s) => Some(CellValue::Text(s.clone())),
            // Nested values keep their JSON text
            other => Some(CellValue::Text(other.to_string())),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            // MySQL booleans arrive as 0/1
            CellValue::Number(n) => n.as_i64().map(|i| i != 0),
            CellValue::Text(_) => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => match n.as_f64() {
                // 3.0 renders as "3" and 1e20 in full, the way the browser
                // stringified them; from 1e21 on it switches to exponent form
                Some(x) if n.is_f64() && x.fract() == 0.0 && x.abs() < 1e21 => {
                    write!(f, "{}", x + 0.0)
                }
                _ => write!(f, "{}", n),
            },
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Number(Number::from(i))
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Number(Number::from(i))
    }
}

impl From<u64> for CellValue {
    fn from(i: u64) -> Self {
        CellValue::Number(Number::from(i))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// One record of a table: ordered column → value pairs plus a stable id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    id: String,
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cells: Vec::new(),
        }
    }

    /// Builder-style cell insertion; a repeated column replaces the old value
    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.cells.push((column, value)),
        }
        self
    }

    /// Build a row from a JSON object, taking the identifier from `id_field`.
    ///
    /// The id field also stays in the cells so it can be filtered and sorted
    /// like any other column.
    pub fn from_json(value: &JsonValue, id_field: &str) -> Result<Self, ViewError> {
        let object = value
            .as_object()
            .ok_or_else(|| ViewError::parse(format!("expected a JSON object, got {}", value)))?;
        Self::from_map(object, id_field)
    }

    pub fn from_map(object: &Map<String, JsonValue>, id_field: &str) -> Result<Self, ViewError> {
        let id = object
            .get(id_field)
            .and_then(CellValue::from_json)
            .ok_or_else(|| ViewError::parse(format!("row is missing its '{}' field", id_field)))?
            .to_string();

        let cells = object
            .iter()
            .filter_map(|(key, value)| CellValue::from_json(value).map(|cell| (key.clone(), cell)))
            .collect();

        Ok(Self { id, cells })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// String form of a cell; a missing column reads as the empty string
    pub fn text(&self, column: &str) -> String {
        self.get(column).map(ToString::to_string).unwrap_or_default()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn cells(&self) -> &[(String, CellValue)] {
        &self.cells
    }
}

/// Columns in first-seen order across `rows`
pub fn column_names(rows: &[Row]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !names.iter().any(|n| n == column) {
                names.push(column.to_string());
            }
        }
    }
    names
}

/// Rows held by a view plus the total the source reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<Row>,
    pub total: usize,
}

impl Dataset {
    pub fn new(rows: Vec<Row>, total: usize) -> Self {
        Self { rows, total }
    }

    /// Dataset for sources that return everything at once
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let total = rows.len();
        Self { rows, total }
    }

    /// Decode a JSON array of objects
    pub fn from_json_rows(values: &[JsonValue], id_field: &str, total: Option<usize>) -> Result<Self, ViewError> {
        let rows = values
            .iter()
            .map(|value| Row::from_json(value, id_field))
            .collect::<Result<Vec<_>, _>>()?;
        let total = total.unwrap_or(rows.len());
        Ok(Self { rows, total })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_from_json_keeps_payload_order() {
        let row = Row::from_json(
            &json!({"id": 7, "email": "a@x.com", "role": "user", "is_active": true}),
            "id",
        )
        .unwrap();

        assert_eq!(row.id(), "7");
        let columns: Vec<&str> = row.columns().collect();
        assert_eq!(columns, vec!["id", "email", "role", "is_active"]);
        assert_eq!(row.text("is_active"), "true");
    }

    #[test]
    fn test_null_cells_are_missing() {
        let row = Row::from_json(&json!({"id": 1, "user_id": null}), "id").unwrap();
        assert!(row.get("user_id").is_none());
        assert_eq!(row.text("user_id"), "");
    }

    #[test]
    fn test_missing_id_is_parse_error() {
        let err = Row::from_json(&json!({"name": "report.pdf"}), "id").unwrap_err();
        assert!(matches!(err, ViewError::Parse { .. }));

        let err = Row::from_json(&json!(["not", "an", "object"]), "id").unwrap_err();
        assert!(matches!(err, ViewError::Parse { .. }));
    }

    #[test]
    fn test_number_display_matches_browser_stringify() {
        assert_eq!(CellValue::from_json(&json!(10)).unwrap().to_string(), "10");
        assert_eq!(CellValue::from_json(&json!(2.5)).unwrap().to_string(), "2.5");
        assert_eq!(CellValue::from_json(&json!(3.0)).unwrap().to_string(), "3");
    }

    #[test]
    fn test_large_whole_floats_print_without_exponent() {
        let shown = |v: f64| CellValue::from_json(&json!(v)).unwrap().to_string();
        assert_eq!(shown(1e15), "1000000000000000");
        assert_eq!(shown(-2.5e16), "-25000000000000000");
        assert_eq!(shown(1e20), "100000000000000000000");
        assert_eq!(shown(-0.0), "0");
    }

    #[test]
    fn test_as_bool_accepts_tinyint() {
        assert_eq!(CellValue::from(1).as_bool(), Some(true));
        assert_eq!(CellValue::from(0).as_bool(), Some(false));
        assert_eq!(CellValue::from("yes").as_bool(), None);
    }

    #[test]
    fn test_column_names_first_seen_order() {
        let dataset = Dataset::from_rows(vec![
            Row::new("1").with("id", 1).with("name", "a"),
            Row::new("2").with("id", 2).with("owner", "b"),
        ]);
        assert_eq!(dataset.total, 2);
        assert_eq!(column_names(&dataset.rows), vec!["id", "name", "owner"]);
    }
}
