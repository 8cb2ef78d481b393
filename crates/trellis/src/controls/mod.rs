//! Leaf controls: list values, decimal cells, and the search panel with its
//! filter dialog.

mod decimal_cell;
mod filters;
mod list_value;
mod search;

pub use decimal_cell::DecimalCell;
pub use filters::{FieldEditor, FilterField, Filters};
pub use list_value::ListValue;
pub use search::SearchPanel;
