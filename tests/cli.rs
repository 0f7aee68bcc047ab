mod common;

use std::fs;

use assert_cmd::Command;
use common::{preference_dataset, similarity_dataset};
use gamegraph::Dataset;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(dataset: &Dataset) -> Self {
        let dir = tempfile::tempdir().unwrap();
        dataset.save(&dir.path().join("games.json")).unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("gamegraph").unwrap();
        cmd.env_remove("GAMEGRAPH_DATA")
            .env_remove("GAMEGRAPH_LOG")
            .arg("--config")
            .arg(self.path("config.toml"))
            .arg("--theme")
            .arg("plain");
        cmd
    }

    fn with_data(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--data").arg(self.path("games.json"));
        cmd
    }
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn by_game_prints_a_numbered_ranking() {
    let ws = Workspace::new(&similarity_dataset());
    let output = ws.with_data().args(["by-game", "a"]).output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("1. Beta [b] score 2"), "{text}");
    assert!(text.contains("2. Gamma [c] score 1"), "{text}");
}

#[test]
fn json_output_uses_wire_field_names() {
    let ws = Workspace::new(&similarity_dataset());
    let output = ws
        .with_data()
        .args(["--format", "json", "by-game", "a", "--max", "1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        value,
        serde_json::json!([{"gameId": "b", "gameName": "Beta", "score": 2, "type": "PERSONAL"}])
    );
}

#[test]
fn quiet_mode_prints_tab_separated_rows() {
    let ws = Workspace::new(&preference_dataset());
    let output = ws
        .with_data()
        .args(["--quiet", "by-user", "u"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "e\t3\n");
}

#[test]
fn negative_limits_print_nothing() {
    let ws = Workspace::new(&similarity_dataset());
    let output = ws
        .with_data()
        .args(["--format", "json", "by-game", "a", "-n", "-2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "[]");
}

#[test]
fn import_then_recommend() {
    let ws = Workspace::new(&Dataset::default());
    let items = ws.path("items.csv");
    let interactions = ws.path("interactions.csv");
    fs::write(
        &items,
        "id,name,release_year,genres,platforms,developers,is_multiplayer\n\
         a,Alpha,1998,RPG,PC,Northwind,false\n\
         d,Delta,2001,RPG,Xbox,,false\n\
         e,Echo,2004,RPG,PC,,true\n",
    )
    .unwrap();
    fs::write(&interactions, "user,relation,target\nu,likes,a\n").unwrap();
    let dataset_out = ws.path("imported/games.json");

    let mut import = ws.cmd();
    import
        .arg("import")
        .arg("--items")
        .arg(&items)
        .arg("--interactions")
        .arg(&interactions)
        .arg("--output")
        .arg(&dataset_out)
        .assert()
        .success();

    let loaded = Dataset::load(&dataset_out).unwrap();
    assert_eq!(loaded.items.len(), 3);
    assert_eq!(loaded.users.len(), 1);

    let output = ws
        .cmd()
        .arg("--data")
        .arg(&dataset_out)
        .args(["--quiet", "by-user", "u"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "e\t3\n");
}

#[test]
fn export_writes_csv_files() {
    let ws = Workspace::new(&preference_dataset());
    let items_out = ws.path("items-out.csv");
    let interactions_out = ws.path("interactions-out.csv");
    ws.with_data()
        .arg("export")
        .arg("--items-out")
        .arg(&items_out)
        .arg("--interactions-out")
        .arg(&interactions_out)
        .assert()
        .success();

    let items = fs::read_to_string(&items_out).unwrap();
    assert!(items.starts_with("id,name,release_year"), "{items}");
    assert_eq!(items.lines().count(), 6);
    let interactions = fs::read_to_string(&interactions_out).unwrap();
    assert!(interactions.contains("u,likes,a"), "{interactions}");
    assert!(interactions.contains("v,played,a"), "{interactions}");
}

#[test]
fn short_searches_fail() {
    let ws = Workspace::new(&similarity_dataset());
    let output = ws.with_data().args(["search", "a"]).output().unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("at least 2 characters"));

    let output = ws
        .with_data()
        .args(["--format", "json", "search", "eta"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
}

#[test]
fn show_reports_missing_items() {
    let ws = Workspace::new(&similarity_dataset());
    let output = ws.with_data().args(["show", "nope"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("game 'nope' not found"));

    let output = ws.with_data().args(["show", "a"]).output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Northwind"));
}

#[test]
fn health_and_index_commands() {
    let ws = Workspace::new(&similarity_dataset());
    let output = ws
        .with_data()
        .args(["--format", "json", "health"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "healthy");

    let output = ws
        .with_data()
        .args(["--format", "json", "index", "--rebuild"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["entries"], 9);
}

#[test]
fn empty_catalog_still_serves_degraded() {
    let ws = Workspace::new(&Dataset::default());
    let output = ws
        .with_data()
        .args(["--format", "json", "health"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "degraded");
}

#[test]
fn completions_are_generated() {
    let ws = Workspace::new(&Dataset::default());
    let output = ws.cmd().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("gamegraph"));
}

#[test]
fn missing_dataset_is_reported() {
    let ws = Workspace::new(&Dataset::default());
    let output = ws.cmd().args(["by-game", "a"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no dataset given"));
}

#[test]
fn bad_log_filters_are_rejected() {
    let ws = Workspace::new(&similarity_dataset());
    let output = ws
        .with_data()
        .args(["--log", "gamegraph=loud", "by-game", "a"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn config_dataset_is_used_without_data_flag() {
    let ws = Workspace::new(&similarity_dataset());
    let config = format!(
        "[data]\ndataset = {:?}\n",
        ws.path("games.json").display().to_string()
    );
    fs::write(ws.path("config.toml"), config).unwrap();
    let output = ws
        .cmd()
        .args(["--quiet", "by-game", "a", "-n", "1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "b\t2\n");
}
