use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod calendar;
mod dashboard;
mod error;
mod funnel;
mod loader;
mod models;
mod report;
mod roster;
mod runrate;
mod throughput;

use dashboard::Dashboard;
use funnel::{PersonFilter, TerminalStages};
use roster::Roster;

#[derive(Parser)]
#[command(name = "sales-dashboard")]
#[command(about = "Run-rate, throughput and funnel tables from a sales opportunity export", long_about = None)]
struct Cli {
    /// Treat this date (YYYY-MM-DD) as today instead of the local date
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Upload {
    /// Opportunities exported from the CRM (.xlsx workbook or .csv)
    #[arg(long, alias = "csv")]
    file: PathBuf,

    /// Print JSON instead of markdown tables
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct Selection {
    /// Limit the funnel to one opportunity owner ("all" for everyone)
    #[arg(long)]
    person: Option<String>,

    /// Stage to treat as closed; repeat for several. Without it the two
    /// highest-volume stages are treated as closed.
    #[arg(long = "terminal-stage")]
    terminal_stages: Vec<String>,
}

impl Selection {
    fn everyone() -> Self {
        Self {
            person: None,
            terminal_stages: Vec::new(),
        }
    }

    fn filter(&self) -> PersonFilter {
        PersonFilter::from_selection(self.person.as_deref())
    }

    fn terminal(&self) -> TerminalStages {
        if self.terminal_stages.is_empty() {
            TerminalStages::default()
        } else {
            TerminalStages::named(self.terminal_stages.iter().cloned())
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    DownPayment,
    FinalPayment,
}

#[derive(Subcommand)]
enum Commands {
    /// Cumulative weekly payment counts for the trailing eight quarters
    Runrate {
        #[command(flatten)]
        upload: Upload,
        #[arg(long, value_enum, default_value_t = Kind::DownPayment)]
        kind: Kind,
    },
    /// Monthly down payments per ramped FTE
    Throughput {
        #[command(flatten)]
        upload: Upload,
    },
    /// Stage funnel, active opportunities and seasonality
    Funnel {
        #[command(flatten)]
        upload: Upload,
        #[command(flatten)]
        selection: Selection,
    },
    /// List the team roster with ramp status
    Roster {
        #[arg(long)]
        json: bool,
    },
    /// Write every dashboard table to a file
    Report {
        #[command(flatten)]
        upload: Upload,
        #[command(flatten)]
        selection: Selection,
        /// Output path; defaults to dashboard.md, or dashboard.json with --json
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let roster = Roster::builtin().context("built-in roster is malformed")?;

    match cli.command {
        Commands::Runrate { upload, kind } => {
            let dashboard = compute(&upload.file, &roster, today, &Selection::everyone())?;
            let runrate = match kind {
                Kind::DownPayment => &dashboard.down_payment_runrate,
                Kind::FinalPayment => &dashboard.final_payment_runrate,
            };
            if upload.json {
                print_json(runrate)?;
            } else {
                print!("{}", report::render_runrate(runrate));
            }
        }
        Commands::Throughput { upload } => {
            let dashboard = compute(&upload.file, &roster, today, &Selection::everyone())?;
            if upload.json {
                print_json(&dashboard.throughput)?;
            } else {
                print!("{}", report::render_throughput(&dashboard.throughput));
            }
        }
        Commands::Funnel { upload, selection } => {
            let dashboard = compute(&upload.file, &roster, today, &selection)?;
            if upload.json {
                print_json(&dashboard.funnel)?;
            } else {
                print!("{}", report::render_funnel(&dashboard.funnel));
            }
        }
        Commands::Roster { json } => {
            if json {
                print_json(&roster.members())?;
            } else {
                print!("{}", report::render_roster(&roster, today));
            }
        }
        Commands::Report {
            upload,
            selection,
            out,
        } => {
            let dashboard = compute(&upload.file, &roster, today, &selection)?;
            let out = report_path(out, upload.json);
            let contents = if upload.json {
                serde_json::to_string_pretty(&dashboard)?
            } else {
                report::render_markdown(&dashboard)
            };
            std::fs::write(&out, contents)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn compute(
    file: &Path,
    roster: &Roster,
    today: NaiveDate,
    selection: &Selection,
) -> anyhow::Result<Dashboard> {
    let loaded = loader::load_path(file)
        .with_context(|| format!("failed to load opportunities from {}", file.display()))?;
    if loaded.summary.rows_skipped > 0 {
        warn!(
            skipped = loaded.summary.rows_skipped,
            kept = loaded.summary.rows_kept,
            "some opportunity rows were left out of the dashboard"
        );
    }
    Ok(Dashboard::compute(
        &loaded.opportunities,
        roster,
        today,
        &selection.filter(),
        &selection.terminal(),
    ))
}

fn report_path(out: Option<PathBuf>, json: bool) -> PathBuf {
    out.unwrap_or_else(|| {
        if json {
            PathBuf::from("dashboard.json")
        } else {
            PathBuf::from("dashboard.md")
        }
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_report_defaults_to_json_file() {
        assert_eq!(report_path(None, true), PathBuf::from("dashboard.json"));
        assert_eq!(report_path(None, false), PathBuf::from("dashboard.md"));
    }

    #[test]
    fn explicit_report_path_wins() {
        let out = PathBuf::from("reports/weekly.json");
        assert_eq!(report_path(Some(out.clone()), false), out);
    }

    #[test]
    fn report_command_parses_without_out() {
        let cli = Cli::try_parse_from([
            "sales-dashboard",
            "report",
            "--file",
            "opportunities.xlsx",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Report { upload, out, .. } => {
                assert!(upload.json);
                assert_eq!(report_path(out, upload.json), PathBuf::from("dashboard.json"));
            }
            _ => panic!("expected the report command"),
        }
    }
}
