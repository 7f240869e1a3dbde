//! CSV ingest for training tables.
//!
//! Turns a Kaggle-style property CSV into a [`Table`]: every column whose
//! non-missing cells all parse as numbers becomes numeric, everything else
//! categorical. The cells `""` and `"NA"` mark missing values in both cases.
//! The `Id` column is bookkeeping, not signal, and is dropped on ingest.

use std::fs::File;
use std::path::Path;

use crate::data::Table;
use crate::error::{Result, ValuationError};

/// Column name dropped on ingest.
const ID_COLUMN: &str = "Id";

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell == "NA"
}

/// Load a CSV file into a [`Table`].
///
/// Fails with [`ValuationError::Persistence`] on I/O or parse errors and with
/// [`ValuationError::EmptyDataset`] when the file holds no data rows.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ValuationError::persistence(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ValuationError::persistence(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| ValuationError::persistence(path, e))?;
        for (idx, cell) in record.iter().enumerate() {
            if idx < cells.len() {
                let value = if is_missing(cell) { None } else { Some(cell.to_string()) };
                cells[idx].push(value);
            }
        }
    }

    let n_rows = cells.first().map_or(0, Vec::len);
    if n_rows == 0 {
        return Err(ValuationError::EmptyDataset);
    }

    let mut table = Table::with_rows(n_rows);
    for (name, column) in headers.into_iter().zip(cells) {
        if name == ID_COLUMN {
            continue;
        }
        let numeric = column
            .iter()
            .flatten()
            .all(|cell| cell.parse::<f64>().is_ok());
        if numeric {
            let values = column
                .into_iter()
                .map(|cell| match cell {
                    Some(s) => s.parse::<f64>().unwrap_or(f64::NAN),
                    None => f64::NAN,
                })
                .collect();
            table.insert_num(name, values);
        } else {
            table.insert_cat(name, column);
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_mixed_columns_and_drops_id() {
        let file = write_csv(
            "Id,GrLivArea,Neighborhood,SalePrice\n\
             1,1500,NAmes,200000\n\
             2,NA,OldTown,150000\n",
        );
        let table = load_csv(file.path()).unwrap();

        assert!(!table.contains("Id"));
        assert_eq!(table.n_rows(), 2);

        let area = table.numeric("GrLivArea").unwrap();
        assert_eq!(area[0], 1500.0);
        assert!(area[1].is_nan());

        let hood = table.categorical("Neighborhood").unwrap();
        assert_eq!(hood[1].as_deref(), Some("OldTown"));
    }

    #[test]
    fn empty_file_is_an_error() {
        let file = write_csv("Id,GrLivArea\n");
        assert!(matches!(
            load_csv(file.path()),
            Err(ValuationError::EmptyDataset)
        ));
    }

    #[test]
    fn missing_file_is_a_persistence_error() {
        assert!(matches!(
            load_csv("/definitely/not/here.csv"),
            Err(ValuationError::Persistence { .. })
        ));
    }
}
