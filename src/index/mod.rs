#![forbid(unsafe_code)]

//! Lookup structures built from the graph at startup.

mod category;

pub use category::{CategoryIndex, CategoryKind, IndexHandle, IndexStats};
