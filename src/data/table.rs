//! Tabular container for raw and engineered property data.
//!
//! [`Table`] stores named columns over a fixed row count. Columns are either
//! numeric (`f64`, with `NaN` marking a missing cell) or categorical
//! (`Option<String>`, with `None` marking a missing cell). The fit/transform
//! pipeline resolves columns against a fixed schema, so column iteration
//! order never matters; storage is a `BTreeMap` for deterministic debugging.

use std::collections::BTreeMap;

/// A single raw attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Cat(String),
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Cat(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Cat(v)
    }
}

/// One property described as a partial attribute mapping.
///
/// Records arrive normalized from upstream (fixed schema, defaults applied,
/// numeric ranges pre-validated); fields may still be absent.
#[derive(Debug, Clone, Default)]
pub struct PropertyRecord {
    fields: BTreeMap<String, Value>,
}

impl PropertyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

/// A named column of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric values; `NaN` marks a missing cell.
    Num(Vec<f64>),
    /// Categorical values; `None` marks a missing cell.
    Cat(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Num(v) => v.len(),
            Column::Cat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column-major table of mixed numeric and categorical data.
#[derive(Debug, Clone, Default)]
pub struct Table {
    n_rows: usize,
    columns: BTreeMap<String, Column>,
}

impl Table {
    /// Create an empty table with a fixed row count.
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            n_rows,
            columns: BTreeMap::new(),
        }
    }

    /// Build a table from property records.
    ///
    /// The column set is the union of all record fields. A column is numeric
    /// when every present value is numeric; otherwise it is categorical and
    /// numeric values are rendered as strings.
    pub fn from_records(records: &[PropertyRecord]) -> Self {
        let mut names: Vec<&String> = Vec::new();
        for record in records {
            for (name, _) in record.iter() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let mut table = Table::with_rows(records.len());
        for name in names {
            let all_numeric = records
                .iter()
                .filter_map(|r| r.get(name))
                .all(|v| matches!(v, Value::Num(_)));

            if all_numeric {
                let values = records
                    .iter()
                    .map(|r| match r.get(name) {
                        Some(Value::Num(x)) => *x,
                        _ => f64::NAN,
                    })
                    .collect();
                table.insert_num(name.clone(), values);
            } else {
                let values = records
                    .iter()
                    .map(|r| match r.get(name) {
                        Some(Value::Cat(s)) => Some(s.clone()),
                        Some(Value::Num(x)) => Some(format!("{x}")),
                        None => None,
                    })
                    .collect();
                table.insert_cat(name.clone(), values);
            }
        }
        table
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Numeric column values, if the column exists and is numeric.
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name) {
            Some(Column::Num(v)) => Some(v),
            _ => None,
        }
    }

    /// Categorical column values, if the column exists and is categorical.
    pub fn categorical(&self, name: &str) -> Option<&[Option<String>]> {
        match self.columns.get(name) {
            Some(Column::Cat(v)) => Some(v),
            _ => None,
        }
    }

    /// Insert a numeric column.
    ///
    /// # Panics
    ///
    /// Panics if the column length does not match the table's row count.
    pub fn insert_num(&mut self, name: impl Into<String>, values: Vec<f64>) {
        assert_eq!(values.len(), self.n_rows, "column length must match row count");
        self.columns.insert(name.into(), Column::Num(values));
    }

    /// Insert a categorical column.
    ///
    /// # Panics
    ///
    /// Panics if the column length does not match the table's row count.
    pub fn insert_cat(&mut self, name: impl Into<String>, values: Vec<Option<String>>) {
        assert_eq!(values.len(), self.n_rows, "column length must match row count");
        self.columns.insert(name.into(), Column::Cat(values));
    }

    /// Remove a column, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<Column> {
        self.columns.remove(name)
    }

    /// Copy of this table without the named column.
    pub fn without(&self, name: &str) -> Table {
        let mut copy = self.clone();
        copy.remove(name);
        copy
    }

    /// Iterate over column names.
    pub fn column_names(&self) -> impl Iterator<Item = &String> {
        self.columns.keys()
    }

    /// New table containing only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let mut out = Table::with_rows(rows.len());
        for (name, column) in &self.columns {
            match column {
                Column::Num(v) => {
                    out.insert_num(name.clone(), rows.iter().map(|&r| v[r]).collect())
                }
                Column::Cat(v) => {
                    out.insert_cat(name.clone(), rows.iter().map(|&r| v[r].clone()).collect())
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_records_infers_column_types() {
        let records = vec![
            PropertyRecord::new()
                .with("GrLivArea", 1500.0)
                .with("Neighborhood", "NAmes"),
            PropertyRecord::new().with("GrLivArea", 2000.0),
        ];
        let table = Table::from_records(&records);

        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.numeric("GrLivArea"), Some(&[1500.0, 2000.0][..]));

        let hood = table.categorical("Neighborhood").unwrap();
        assert_eq!(hood[0].as_deref(), Some("NAmes"));
        assert_eq!(hood[1], None);
    }

    #[test]
    fn missing_numeric_becomes_nan() {
        let records = vec![
            PropertyRecord::new().with("LotArea", 9000.0),
            PropertyRecord::new().with("YearBuilt", 1990.0),
        ];
        let table = Table::from_records(&records);
        let lot = table.numeric("LotArea").unwrap();
        assert!(lot[1].is_nan());
    }

    #[test]
    fn select_rows_reorders() {
        let mut table = Table::with_rows(3);
        table.insert_num("a", vec![1.0, 2.0, 3.0]);
        let picked = table.select_rows(&[2, 0]);
        assert_eq!(picked.numeric("a"), Some(&[3.0, 1.0][..]));
    }
}
