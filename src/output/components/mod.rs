mod catalog_table;
mod summary;

pub use catalog_table::{CatalogColumns, CatalogTable};
pub use summary::SummaryPanel;
