//! Command-line front end for the game recommender.
#![forbid(unsafe_code)]

mod ui;

use std::collections::BTreeSet;
use std::error::Error;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use gamegraph::{
    cli::import_export::{run_export, run_import, ExportConfig, ImportConfig},
    config::AppConfig,
    health::{Check, HealthReport},
    server::{self, ServerOptions},
    telemetry, Dataset, IndexStats, Item, RecommendationService,
};
use time::format_description::well_known::Rfc3339;

use crate::ui::{format_duration, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "gamegraph",
    version,
    about = "Game recommendations over a property graph",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "GAMEGRAPH_DATA",
        value_name = "FILE",
        help = "Dataset JSON file (overrides [data].dataset)"
    )]
    data: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "GAMEGRAPH_CONFIG",
        value_name = "FILE",
        help = "Configuration file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, value_enum, default_value_t = ThemeArg::Auto)]
    theme: ThemeArg,

    #[arg(short, long, global = true, help = "Plain, minimal output")]
    quiet: bool,

    #[arg(
        long,
        global = true,
        env = "GAMEGRAPH_LOG",
        value_name = "FILTER",
        help = "Log filter such as `warn` or `gamegraph=debug`"
    )]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Items similar to a seed item")]
    ByGame {
        #[arg(value_name = "GAME_ID")]
        game_id: String,
        #[command(flatten)]
        limit: LimitArgs,
    },

    #[command(about = "Items matching a user's preferred genres and platforms")]
    ByUser {
        #[arg(value_name = "USER_ID")]
        user_id: String,
        #[command(flatten)]
        limit: LimitArgs,
    },

    #[command(about = "Items liked by a user's friends")]
    ByFriends {
        #[arg(value_name = "USER_ID")]
        user_id: String,
        #[command(flatten)]
        limit: LimitArgs,
    },

    #[command(about = "Items liked by users with overlapping likes")]
    SimilarUsers {
        #[arg(value_name = "USER_ID")]
        user_id: String,
        #[command(flatten)]
        limit: LimitArgs,
    },

    #[command(about = "Search items by name")]
    Search {
        #[arg(value_name = "TEXT")]
        query: String,
    },

    #[command(about = "Show one item with its categories")]
    Show {
        #[arg(value_name = "GAME_ID")]
        game_id: String,
    },

    #[command(about = "Check the store and the category index")]
    Health,

    #[command(about = "Show category index statistics")]
    Index {
        #[arg(long, help = "Rebuild the snapshot before reporting")]
        rebuild: bool,
    },

    #[command(about = "Convert items.csv / interactions.csv into a dataset file")]
    Import(ImportCmd),

    #[command(about = "Write the dataset out as CSV files")]
    Export(ExportCmd),

    #[command(about = "Serve the HTTP API")]
    Serve(ServeCmd),

    #[command(about = "Print shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct LimitArgs {
    #[arg(
        short = 'n',
        long = "max",
        value_name = "N",
        allow_negative_numbers = true,
        help = "Maximum results (negative values mean none; default from config)"
    )]
    max: Option<i64>,
}

impl LimitArgs {
    fn resolve(&self, service: &RecommendationService) -> usize {
        service.max_results(
            self.max
                .map(|n| usize::try_from(n.max(0)).unwrap_or(usize::MAX)),
        )
    }
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(long, value_name = "FILE", help = "CSV file containing items")]
    items: PathBuf,

    #[arg(long, value_name = "FILE", help = "CSV file containing user interactions")]
    interactions: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE", help = "Dataset JSON to write")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ExportCmd {
    #[arg(long, value_name = "FILE", help = "Destination for items")]
    items_out: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Destination for interactions")]
    interactions_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeCmd {
    #[arg(long, value_name = "ADDR", help = "Interface to bind (default from config)")]
    host: Option<IpAddr>,

    #[arg(long, help = "Port to bind (default from config)")]
    port: Option<u16>,

    #[arg(
        long = "allow-origin",
        value_name = "ORIGIN",
        help = "Allowed CORS origin; repeat for several (default from config)"
    )]
    allow_origins: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let default_filter = match cli.command {
        Command::Serve(_) => "info",
        _ => "warn",
    };
    let filter = cli.log.as_deref().unwrap_or(default_filter);
    telemetry::parse_filter(filter)?;
    telemetry::install_tracing_subscriber(filter);

    let ui = Ui::new(cli.theme.into(), cli.quiet);
    let config = AppConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "gamegraph", &mut io::stdout());
        }
        Command::Import(cmd) => {
            let task = ui.task(format!("Importing {}", cmd.items.display()));
            let (dataset, summary) = run_import(&ImportConfig {
                items: cmd.items.clone(),
                interactions: cmd.interactions.clone(),
            })?;
            dataset.save(&cmd.output)?;
            let elapsed = task.finish();
            ui.success(&format!(
                "Imported {} items, {} users and {} interactions into {} in {}",
                summary.items_imported,
                summary.users,
                summary.interactions_imported,
                cmd.output.display(),
                format_duration(elapsed)
            ));
        }
        Command::Export(cmd) => {
            let dataset = Dataset::load(&dataset_path(&cli, &config)?)?;
            let summary = run_export(
                &dataset,
                &ExportConfig {
                    items_out: cmd.items_out.clone(),
                    interactions_out: cmd.interactions_out.clone(),
                },
            )?;
            ui.success(&format!(
                "Exported {} items and {} interactions",
                summary.items_exported, summary.interactions_exported
            ));
        }
        Command::Serve(cmd) => {
            let service = open_service(&cli, &config, &ui)?;
            let host = match cmd.host {
                Some(host) => host,
                None => config.server.socket_addr()?.ip(),
            };
            let options = ServerOptions {
                addr: SocketAddr::new(host, cmd.port.unwrap_or(config.server.port)),
                allow_origins: if cmd.allow_origins.is_empty() {
                    config.server.allow_origins.clone()
                } else {
                    cmd.allow_origins.clone()
                },
            };
            ui.info(&format!("Listening on http://{}", options.addr));
            if let Err(err) = server::serve(service, options).await {
                eprintln!("server terminated: {err}");
                return Err(Box::new(err));
            }
        }
        command => {
            let service = open_service(&cli, &config, &ui)?;
            run_query(command, &service, cli.format, &ui)?;
        }
    }

    Ok(())
}

fn run_query(
    command: &Command,
    service: &RecommendationService,
    format: OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::ByGame { game_id, limit } => {
            let recs = service.recommend_by_item(game_id, limit.resolve(service))?;
            emit(format, &recs, || {
                ui.ranking(&format!("Similar to {game_id}"), &recs)
            })?;
        }
        Command::ByUser { user_id, limit } => {
            let recs = service.recommend_by_user(user_id, limit.resolve(service))?;
            emit(format, &recs, || {
                ui.ranking(&format!("Picks for {user_id}"), &recs)
            })?;
        }
        Command::ByFriends { user_id, limit } => {
            let recs = service.recommend_by_friends(user_id, limit.resolve(service))?;
            emit(format, &recs, || {
                ui.ranking(&format!("Liked by friends of {user_id}"), &recs)
            })?;
        }
        Command::SimilarUsers { user_id, limit } => {
            let recs = service.recommend_by_similar_users(user_id, limit.resolve(service))?;
            emit(format, &recs, || {
                ui.ranking(&format!("Liked by users similar to {user_id}"), &recs)
            })?;
        }
        Command::Search { query } => {
            let hits = service.search(query)?;
            emit(format, &hits, || {
                ui.list(
                    &format!("Matches for '{query}'"),
                    hits.iter().map(|hit| match hit.release_year {
                        Some(year) if year > 0 => format!("{} [{}] ({year})", hit.name, hit.id),
                        _ => format!("{} [{}]", hit.name, hit.id),
                    }),
                )
            })?;
        }
        Command::Show { game_id } => match service.fetch_item(game_id)? {
            Some(item) => emit(format, &item, || print_item(ui, &item))?,
            None => return Err(format!("game '{game_id}' not found").into()),
        },
        Command::Health => {
            let report = service.health();
            emit(format, &report, || print_health(ui, &report))?;
            if !report.is_serving() {
                std::process::exit(2);
            }
        }
        Command::Index { rebuild } => {
            let stats = if *rebuild {
                service.rebuild_index()?
            } else {
                service.index_stats()
            };
            emit(format, &stats, || print_index(ui, &stats))?;
        }
        Command::Import(_)
        | Command::Export(_)
        | Command::Serve(_)
        | Command::Completions { .. } => {}
    }
    Ok(())
}

fn dataset_path(cli: &Cli, config: &AppConfig) -> Result<PathBuf, Box<dyn Error>> {
    cli.data
        .clone()
        .or_else(|| config.data.dataset.clone())
        .ok_or_else(|| "no dataset given: pass --data or set [data].dataset in the config".into())
}

fn open_service(
    cli: &Cli,
    config: &AppConfig,
    ui: &Ui,
) -> Result<RecommendationService, Box<dyn Error>> {
    let path = dataset_path(cli, config)?;
    let task = ui.task(format!("Loading {}", display_name(&path)));
    let dataset = Dataset::load(&path)?;
    let service = RecommendationService::from_dataset(&dataset, config.recommender.clone())?;
    task.finish();
    Ok(service)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn joined(values: &BTreeSet<String>) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn print_item(ui: &Ui, item: &Item) {
    let year = if item.release_year > 0 {
        item.release_year.to_string()
    } else {
        "-".to_string()
    };
    ui.section(
        &item.name,
        [
            ("id", item.id.clone()),
            ("released", year),
            ("multiplayer", item.is_multiplayer.to_string()),
            ("genres", joined(&item.genres)),
            ("platforms", joined(&item.platforms)),
            ("developers", joined(&item.developers)),
        ],
    );
}

fn print_health(ui: &Ui, report: &HealthReport) {
    let rows: Vec<(&str, String)> = report
        .checks
        .iter()
        .map(|check| match check {
            Check::Store { source, healthy } => ("store", status_text(*healthy, source)),
            Check::IndexAge {
                seconds,
                threshold,
                healthy,
            } => (
                "index age",
                status_text(*healthy, &format!("{seconds}s (limit {threshold}s)")),
            ),
            Check::IndexPopulated { entries, healthy } => (
                "index entries",
                status_text(*healthy, &entries.to_string()),
            ),
        })
        .collect();
    ui.section(&format!("Health: {:?}", report.status).to_lowercase(), rows);
    if !report.is_healthy() {
        ui.warn("some checks failed");
    }
}

fn status_text(healthy: bool, detail: &str) -> String {
    format!("{} {detail}", if healthy { "ok" } else { "FAIL" })
}

fn print_index(ui: &Ui, stats: &IndexStats) {
    let built_at = stats
        .built_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| stats.built_at.to_string());
    ui.section(
        "Category index",
        [
            ("genres", stats.genres.to_string()),
            ("platforms", stats.platforms.to_string()),
            ("developers", stats.developers.to_string()),
            ("entries", stats.entries.to_string()),
            ("built at", built_at),
        ],
    );
}
