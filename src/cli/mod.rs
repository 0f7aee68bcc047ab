#![forbid(unsafe_code)]

//! Command-line support shared by the `gamegraph` binary and its tests.

/// CSV import and export of catalogs.
///
/// Converts between `items.csv` / `interactions.csv` and a
/// [`crate::dataset::Dataset`].
pub mod import_export;
