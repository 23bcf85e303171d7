//! Configuration for the item graph.
//!
//! A single YAML file (`.item-graph/config.yaml`) plus environment overrides:
//! - `ITEM_GRAPH_DB_PATH` - Database path
//! - `ITEM_GRAPH_ID_LENGTH` - Random ID suffix length
//!
//! Individual fields are addressed by dotted name through [`ConfigKey`].

mod keys;
mod types;

pub use keys::{ConfigKey, ConfigValue};
pub use types::*;
