use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use crate::dataset::{Dataset, UserRecord};
use crate::error::{GraphError, Result};
use crate::model::Item;

/// Column layout of `items.csv`. Lookups are case-insensitive.
pub const ITEM_COLUMNS: [&str; 7] = [
    "id",
    "name",
    "release_year",
    "genres",
    "platforms",
    "developers",
    "is_multiplayer",
];

/// Column layout of `interactions.csv`.
pub const INTERACTION_COLUMNS: [&str; 3] = ["user", "relation", "target"];

/// Input files for a CSV import.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// `items.csv`: one row per item; list columns are pipe-separated.
    pub items: PathBuf,
    /// Optional `interactions.csv`: `user,relation,target` rows where relation
    /// is `likes`, `played` or `friends`.
    pub interactions: Option<PathBuf>,
}

/// Output files for a CSV export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Optional output path for items.
    pub items_out: Option<PathBuf>,
    /// Optional output path for interactions.
    pub interactions_out: Option<PathBuf>,
}

/// Summary statistics from an import operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Item rows read.
    pub items_imported: u64,
    /// Interaction rows read.
    pub interactions_imported: u64,
    /// Distinct users referenced by interactions.
    pub users: u64,
}

/// Summary statistics from an export operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Item rows written.
    pub items_exported: u64,
    /// Interaction rows written.
    pub interactions_exported: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Likes,
    Played,
    Friends,
}

impl Relation {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "likes" | "like" => Some(Relation::Likes),
            "played" | "play" => Some(Relation::Played),
            "friends" | "friend" | "friends_with" => Some(Relation::Friends),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Relation::Likes => "likes",
            Relation::Played => "played",
            Relation::Friends => "friends",
        }
    }
}

/// Reads the CSV files into a validated [`Dataset`].
///
/// Users are created on first reference in `interactions.csv`, including the
/// targets of `friends` rows.
pub fn run_import(cfg: &ImportConfig) -> Result<(Dataset, ImportSummary)> {
    let mut summary = ImportSummary::default();
    let mut dataset = Dataset {
        items: import_items(&cfg.items)?,
        users: Vec::new(),
    };
    summary.items_imported = dataset.items.len() as u64;

    if let Some(path) = &cfg.interactions {
        let (users, rows) = import_interactions(path)?;
        summary.interactions_imported = rows;
        summary.users = users.len() as u64;
        dataset.users = users.into_values().collect();
    }

    dataset.validate()?;
    Ok((dataset, summary))
}

/// Writes `dataset` to the requested CSV files.
pub fn run_export(dataset: &Dataset, cfg: &ExportConfig) -> Result<ExportSummary> {
    if cfg.items_out.is_none() && cfg.interactions_out.is_none() {
        return Err(GraphError::InvalidArgument(
            "export requires an items and/or interactions output path".into(),
        ));
    }
    let mut summary = ExportSummary::default();
    if let Some(path) = &cfg.items_out {
        summary.items_exported = export_items(dataset, path)?;
    }
    if let Some(path) = &cfg.interactions_out {
        summary.interactions_exported = export_interactions(dataset, path)?;
    }
    Ok(summary)
}

fn import_items(path: &Path) -> Result<Vec<Item>> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_index = find_column(&headers, "id")?;
    let name_index = find_column(&headers, "name")?;
    let optional = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let year_index = optional("release_year");
    let genre_index = optional("genres");
    let platform_index = optional("platforms");
    let developer_index = optional("developers");
    let multiplayer_index = optional("is_multiplayer");

    let mut items = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let id = get_required(&record, id_index, "id")?;
        let name = get_required(&record, name_index, "name")?;
        let mut item = Item::new(id, name);
        if let Some(raw) = year_index.and_then(|idx| non_empty(&record, idx)) {
            item.release_year = raw.parse().map_err(|_| {
                GraphError::InvalidDataset(format!(
                    "row {}: release_year '{raw}' is not an integer",
                    line + 2
                ))
            })?;
        }
        if let Some(raw) = multiplayer_index.and_then(|idx| non_empty(&record, idx)) {
            item.is_multiplayer = parse_bool(raw).ok_or_else(|| {
                GraphError::InvalidDataset(format!(
                    "row {}: is_multiplayer '{raw}' is not a boolean",
                    line + 2
                ))
            })?;
        }
        item.genres = list_column(&record, genre_index);
        item.platforms = list_column(&record, platform_index);
        item.developers = list_column(&record, developer_index);
        items.push(item);
    }
    debug!(path = %path.display(), items = items.len(), "items imported");
    Ok(items)
}

fn import_interactions(path: &Path) -> Result<(BTreeMap<String, UserRecord>, u64)> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let user_index = find_column(&headers, "user")?;
    let relation_index = find_column(&headers, "relation")?;
    let target_index = find_column(&headers, "target")?;

    let mut users: BTreeMap<String, UserRecord> = BTreeMap::new();
    let mut rows = 0u64;
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let user = get_required(&record, user_index, "user")?;
        let raw_relation = get_required(&record, relation_index, "relation")?;
        let target = get_required(&record, target_index, "target")?;
        let relation = Relation::parse(raw_relation).ok_or_else(|| {
            GraphError::InvalidDataset(format!(
                "row {}: unknown relation '{raw_relation}'",
                line + 2
            ))
        })?;

        let entry = users
            .entry(user.to_owned())
            .or_insert_with(|| UserRecord::new(user));
        match relation {
            Relation::Likes => entry.likes.insert(target.to_owned()),
            Relation::Played => entry.played.insert(target.to_owned()),
            Relation::Friends => entry.friends.insert(target.to_owned()),
        };
        if relation == Relation::Friends {
            users
                .entry(target.to_owned())
                .or_insert_with(|| UserRecord::new(target));
        }
        rows += 1;
    }
    debug!(path = %path.display(), rows, users = users.len(), "interactions imported");
    Ok((users, rows))
}

fn export_items(dataset: &Dataset, path: &Path) -> Result<u64> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(ITEM_COLUMNS)?;
    for item in &dataset.items {
        writer.write_record([
            item.id.clone(),
            item.name.clone(),
            item.release_year.to_string(),
            join_list(&item.genres),
            join_list(&item.platforms),
            join_list(&item.developers),
            item.is_multiplayer.to_string(),
        ])?;
    }
    writer.flush().map_err(|err| GraphError::io(path, err))?;
    Ok(dataset.items.len() as u64)
}

fn export_interactions(dataset: &Dataset, path: &Path) -> Result<u64> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(INTERACTION_COLUMNS)?;
    let mut rows = 0u64;
    for user in &dataset.users {
        for (relation, targets) in [
            (Relation::Likes, &user.likes),
            (Relation::Played, &user.played),
            (Relation::Friends, &user.friends),
        ] {
            for target in targets {
                writer.write_record([user.id.as_str(), relation.as_str(), target.as_str()])?;
                rows += 1;
            }
        }
    }
    writer.flush().map_err(|err| GraphError::io(path, err))?;
    Ok(rows)
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| GraphError::InvalidDataset(format!("column '{name}' not found")))
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str> {
    non_empty(record, idx)
        .ok_or_else(|| GraphError::InvalidDataset(format!("missing value for column '{name}'")))
}

fn non_empty(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn list_column(record: &StringRecord, idx: Option<usize>) -> BTreeSet<String> {
    idx.and_then(|idx| record.get(idx))
        .map(parse_list)
        .unwrap_or_default()
}

fn parse_list(raw: &str) -> BTreeSet<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_list(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join("|")
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write csv");
        path
    }

    #[test]
    fn imports_items_and_interactions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let items = write(
            dir.path(),
            "items.csv",
            "ID,Name,Release_Year,Genres,Platforms,Developers,Is_Multiplayer\n\
             a,Alpha,1998,RPG|Action,PC,,false\n\
             b,Beta,,RPG, ,Studio,yes\n",
        );
        let interactions = write(
            dir.path(),
            "interactions.csv",
            "user,relation,target\nu1,likes,a\nu1,PLAYED,b\nu1,friends,u2\n",
        );
        let (dataset, summary) = run_import(&ImportConfig {
            items,
            interactions: Some(interactions),
        })
        .expect("import");

        assert_eq!(summary.items_imported, 2);
        assert_eq!(summary.interactions_imported, 3);
        assert_eq!(summary.users, 2);
        let alpha = &dataset.items[0];
        assert_eq!(alpha.release_year, 1998);
        assert_eq!(alpha.genres.len(), 2);
        assert!(alpha.developers.is_empty());
        let beta = &dataset.items[1];
        assert!(beta.is_multiplayer);
        assert!(beta.platforms.is_empty());
        assert_eq!(dataset.users[0].played.len(), 1);
    }

    #[test]
    fn unknown_relations_name_the_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let items = write(dir.path(), "items.csv", "id,name\na,Alpha\n");
        let interactions = write(
            dir.path(),
            "interactions.csv",
            "user,relation,target\nu1,likes,a\nu1,rated,a\n",
        );
        let err = run_import(&ImportConfig {
            items,
            interactions: Some(interactions),
        })
        .expect_err("bad relation");
        assert!(err.to_string().contains("row 3"), "{err}");
    }

    #[test]
    fn export_then_import_preserves_the_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut alpha = Item::new("a", "Alpha");
        alpha.genres.insert("RPG".into());
        alpha.platforms.extend(["PC".to_string(), "Xbox".to_string()]);
        let mut user = UserRecord::new("u1");
        user.likes.insert("a".into());
        let dataset = Dataset {
            items: vec![alpha],
            users: vec![user],
        };

        let items_out = dir.path().join("items.csv");
        let interactions_out = dir.path().join("interactions.csv");
        let summary = run_export(
            &dataset,
            &ExportConfig {
                items_out: Some(items_out.clone()),
                interactions_out: Some(interactions_out.clone()),
            },
        )
        .expect("export");
        assert_eq!(summary.interactions_exported, 1);

        let (reloaded, _) = run_import(&ImportConfig {
            items: items_out,
            interactions: Some(interactions_out),
        })
        .expect("import");
        assert_eq!(reloaded.items[0].platforms, dataset.items[0].platforms);
        assert_eq!(reloaded.users, dataset.users);
    }

    #[test]
    fn export_needs_a_target() {
        let err = run_export(
            &Dataset::default(),
            &ExportConfig {
                items_out: None,
                interactions_out: None,
            },
        )
        .expect_err("no outputs");
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }
}
