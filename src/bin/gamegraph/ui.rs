//! Terminal rendering for the `gamegraph` binary.

use std::fmt::Display;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use gamegraph::Recommendation;
use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// What a piece of output is, so the palette can colour it.
#[derive(Clone, Copy, Debug)]
enum Role {
    Heading,
    Label,
    Title,
    Rank,
    Score,
    Note,
    Done,
    Alert,
}

#[derive(Clone, Copy)]
struct Palette {
    accent: Color,
    text: Color,
    muted: Color,
    good: Color,
    bad: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Option<Self> {
        match theme {
            Theme::Plain => None,
            Theme::Light => Some(Self {
                accent: Color::Blue,
                text: Color::Black,
                muted: Color::Purple,
                good: Color::Green,
                bad: Color::Red,
            }),
            Theme::Dark | Theme::Auto => Some(Self {
                accent: Color::LightBlue,
                text: Color::White,
                muted: Color::LightCyan,
                good: Color::LightGreen,
                bad: Color::Yellow,
            }),
        }
    }

    fn style(&self, role: Role) -> Style {
        match role {
            Role::Heading | Role::Label => Style::new().fg(self.accent).bold(),
            Role::Title => Style::new().fg(self.text),
            Role::Rank => Style::new().fg(self.accent),
            Role::Score | Role::Note => Style::new().fg(self.muted),
            Role::Done => Style::new().fg(self.good).bold(),
            Role::Alert => Style::new().fg(self.bad).bold(),
        }
    }
}

pub struct Ui {
    palette: Option<Palette>,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let colour = !quiet && std::io::stdout().is_terminal();
        #[cfg(windows)]
        if colour {
            let _ = nu_ansi_term::enable_ansi_support();
        }
        Self {
            palette: Palette::for_theme(theme).filter(|_| colour),
            quiet,
        }
    }

    fn paint(&self, role: Role, text: impl Display) -> String {
        match &self.palette {
            Some(palette) => palette.style(role).paint(text.to_string()).to_string(),
            None => text.to_string(),
        }
    }

    /// Aligned `key: value` block under a heading. Empty blocks print nothing.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        let Some(width) = rows.iter().map(|(key, _)| key.len()).max() else {
            return;
        };
        self.heading(title);
        for (key, value) in rows {
            let label = format!("{key:>width$}:");
            println!("  {} {}", self.paint(Role::Label, label), self.paint(Role::Title, value));
        }
    }

    /// Numbered listing, best first. Quiet mode prints `id<TAB>score` lines.
    pub fn ranking(&self, title: &str, recommendations: &[Recommendation]) {
        if recommendations.is_empty() {
            self.info("no recommendations");
            return;
        }
        if self.quiet {
            for rec in recommendations {
                println!("{}\t{}", rec.item_id, rec.score);
            }
            return;
        }

        self.heading(title);
        let width = recommendations.len().to_string().len();
        for (position, rec) in recommendations.iter().enumerate() {
            println!(
                "  {} {} [{}] {}",
                self.paint(Role::Rank, format!("{:>width$}.", position + 1)),
                self.paint(Role::Title, &rec.item_name),
                rec.item_id,
                self.paint(Role::Score, format!("score {}", rec.score)),
            );
        }
    }

    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            self.info("no matches");
            return;
        }
        self.heading(title);
        for entry in entries {
            println!("  {} {entry}", self.paint(Role::Rank, "-"));
        }
    }

    pub fn info(&self, message: &str) {
        self.status(Role::Note, "·", message);
    }

    pub fn success(&self, message: &str) {
        self.status(Role::Done, "ok", message);
    }

    /// Warnings go to stderr so structured stdout stays parseable.
    pub fn warn(&self, message: &str) {
        if self.quiet {
            eprintln!("{message}");
        } else {
            eprintln!("{} {message}", self.paint(Role::Alert, "warning:"));
        }
    }

    /// Spinner on stderr while `label` runs; silent in quiet mode.
    pub fn task(&self, label: impl Into<String>) -> TaskGuard<'_> {
        let label = label.into();
        let spinner = (!self.quiet).then(|| {
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let pb = ProgressBar::new_spinner().with_style(style);
            pb.set_message(label.clone());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        TaskGuard {
            ui: self,
            label,
            started: Instant::now(),
            spinner,
            done: false,
        }
    }

    fn status(&self, role: Role, tag: &str, message: &str) {
        if self.quiet {
            println!("{message}");
        } else {
            println!("{} {message}", self.paint(role, tag));
        }
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else {
            println!("{}", self.paint(Role::Heading, title));
        }
    }
}

/// Running task; reports a failure when dropped without [`TaskGuard::finish`].
pub struct TaskGuard<'a> {
    ui: &'a Ui,
    label: String,
    started: Instant,
    spinner: Option<ProgressBar>,
    done: bool,
}

impl TaskGuard<'_> {
    pub fn finish(mut self) -> Duration {
        self.done = true;
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        self.started.elapsed()
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        let message = format!(
            "{} failed after {}",
            self.label,
            format_duration(self.started.elapsed())
        );
        self.ui.warn(&message);
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.2}s")
    } else {
        format!("{}ms", duration.as_millis())
    }
}
