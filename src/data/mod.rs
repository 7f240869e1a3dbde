//! Data handling: tabular containers and CSV ingest.

mod io;
mod table;

pub use io::load_csv;
pub use table::{Column, PropertyRecord, Table, Value};
