//! Tabular data loading for `dataframe` tags: CSV files and JSON APIs.

use crate::context::scalar_text;
use crate::error::NodeError;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

pub const USER_AGENT: &str = "docweave";

/// Column names plus string cells, one inner vector per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn truncate(&mut self, max_rows: usize) {
        self.rows.truncate(max_rows);
    }

    /// Builds a table from the `data` field of an API response.
    ///
    /// Accepts a list of records (columns in first-seen key order), a list of
    /// lists (columns numbered from 0) or a mapping of column → values.
    pub fn from_json(data: &Value) -> Self {
        match data {
            Value::Array(items) => from_json_rows(items),
            Value::Object(columns) => {
                let names: Vec<String> = columns.keys().cloned().collect();
                let height = columns
                    .values()
                    .map(|values| match values {
                        Value::Array(items) => items.len(),
                        _ => 1,
                    })
                    .max()
                    .unwrap_or(0);
                let rows = (0..height)
                    .map(|row| {
                        columns
                            .values()
                            .map(|values| match values {
                                Value::Array(items) => items.get(row).map(cell_text).unwrap_or_default(),
                                scalar => cell_text(scalar),
                            })
                            .collect()
                    })
                    .collect();
                Self::new(names, rows)
            }
            _ => Self::default(),
        }
    }
}

fn from_json_rows(items: &[Value]) -> DataTable {
    if items.iter().all(Value::is_array) {
        let width = items
            .iter()
            .filter_map(Value::as_array)
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        let columns = (0..width).map(|idx| idx.to_string()).collect();
        let rows = items
            .iter()
            .filter_map(Value::as_array)
            .map(|row| {
                (0..width)
                    .map(|idx| row.get(idx).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        return DataTable::new(columns, rows);
    }

    let mut columns: Vec<String> = Vec::new();
    for record in items.iter().filter_map(Value::as_object) {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    let rows = items
        .iter()
        .filter_map(Value::as_object)
        .map(|record| {
            columns
                .iter()
                .map(|name| record.get(name).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    DataTable::new(columns, rows)
}

/// Cell text; null, empty strings and `false` render blank.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        other => scalar_text(other),
    }
}

/// Loader used by the `dataframe` handler. Implementations are shared across workers.
pub trait DataSource: Send + Sync {
    fn load_csv(&self, path: &Path) -> Result<DataTable, NodeError>;

    /// POSTs `params` as JSON. A non-200 status or a body without `data` is an empty table.
    fn load_api(
        &self,
        url: &str,
        params: &Value,
        headers: &[(String, String)],
    ) -> Result<DataTable, NodeError>;
}

/// CSV files from disk and JSON APIs over blocking HTTP with a bounded
/// timeout and no retries.
pub struct DefaultDataSource {
    timeout: Duration,
    client: OnceLock<Result<Client, String>>,
}

impl DefaultDataSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&Client, NodeError> {
        self.client
            .get_or_init(|| {
                Client::builder()
                    .user_agent(USER_AGENT)
                    .timeout(self.timeout)
                    .build()
                    .map_err(|err| err.to_string())
            })
            .as_ref()
            .map_err(|err| NodeError::DataSource(format!("http client unavailable: {err}")))
    }
}

impl DataSource for DefaultDataSource {
    fn load_csv(&self, path: &Path) -> Result<DataTable, NodeError> {
        if !path.is_file() {
            return Err(NodeError::DataSource(format!(
                "file not found: {}",
                path.display()
            )));
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|err| NodeError::DataSource(format!("{}: {err}", path.display())))?;
        let columns: Vec<String> = reader
            .headers()
            .map_err(|err| NodeError::DataSource(format!("{}: {err}", path.display())))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|err| NodeError::DataSource(format!("{}: {err}", path.display())))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }
        Ok(DataTable::new(columns, rows))
    }

    fn load_api(
        &self,
        url: &str,
        params: &Value,
        headers: &[(String, String)],
    ) -> Result<DataTable, NodeError> {
        let mut request = self.client()?.post(url).json(params);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send()
            .map_err(|err| NodeError::DataSource(format!("{url}: {err}")))?;
        if response.status() != StatusCode::OK {
            tracing::debug!(url, status = %response.status(), "api returned non-200, treating as empty");
            return Ok(DataTable::default());
        }
        let body: Value = response
            .json()
            .map_err(|err| NodeError::DataSource(format!("{url}: invalid json body: {err}")))?;
        Ok(body
            .get("data")
            .map(DataTable::from_json)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn records_keep_first_seen_column_order() {
        let table = DataTable::from_json(&json!([
            {"region": "north", "sales": 10},
            {"region": "south", "sales": null, "note": "late"}
        ]));
        assert_eq!(table.columns, vec!["region", "sales", "note"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["north".to_string(), "10".to_string(), String::new()],
                vec!["south".to_string(), String::new(), "late".to_string()],
            ]
        );
    }

    #[test]
    fn column_mapping_is_zipped_into_rows() {
        let table = DataTable::from_json(&json!({"a": [1, 2], "b": ["x"]}));
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["1".to_string(), "x".to_string()],
                vec!["2".to_string(), String::new()],
            ]
        );
        assert!(DataTable::from_json(&json!("nope")).is_empty());
    }

    #[test]
    fn csv_file_loads_header_and_rows() {
        let mut file = tempfile::NamedTempFile::new().expect("temp");
        writeln!(file, "name,qty\nbolt,4\nnut").expect("write");
        let source = DefaultDataSource::new(Duration::from_secs(1));
        let table = source.load_csv(file.path()).expect("load");
        assert_eq!(table.columns, vec!["name", "qty"]);
        assert_eq!(table.rows[1], vec!["nut".to_string(), String::new()]);
    }

    #[test]
    fn missing_csv_is_a_data_source_error() {
        let source = DefaultDataSource::new(Duration::from_secs(1));
        let err = source
            .load_csv(Path::new("no/such/table.csv"))
            .expect_err("missing");
        assert!(matches!(err, NodeError::DataSource(_)));
    }
}
