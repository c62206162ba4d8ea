//! Spendlog command-line entry point

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use spendlog_codec::{parse_amount, parse_date, parse_time};
use spendlog_config::{Config, ConfigError};
use spendlog_core::{
    detect, CoreError, DetectOptions, Ingestor, LedgerRecord, LedgerStore, RecordPatch, SummaryEngine,
    SummaryKind,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "spendlog")]
#[command(author = "Spendlog Contributors")]
#[command(version = "0.1.0")]
#[command(about = "A small personal ledger with summaries and recurring-charge hints", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "spendlog.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a commented default configuration file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Record one entry
    Add {
        #[arg(short = 'c', long)]
        category: String,
        #[arg(short = 'p', long)]
        product: String,
        #[arg(short = 'a', long, value_parser = amount_arg, allow_hyphen_values = true)]
        amount: Decimal,
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        #[arg(long, value_parser = time_arg)]
        time: Option<NaiveTime>,
        #[arg(short = 'r', long)]
        remark: Option<String>,
    },
    /// List entries, oldest first
    List {
        #[arg(long, value_parser = date_arg)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = date_arg)]
        end: Option<NaiveDate>,
    },
    /// Change fields of every entry matching an id
    Update {
        id: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        product: Option<String>,
        #[arg(long, value_parser = amount_arg, allow_hyphen_values = true)]
        amount: Option<Decimal>,
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        #[arg(long, value_parser = time_arg)]
        time: Option<NaiveTime>,
        #[arg(long)]
        remark: Option<String>,
    },
    /// Remove every entry matching an id (date, date_category or date_category_product)
    Delete { id: String },
    /// Import rows from a CSV file laid out like the ledger table
    Import { file: PathBuf },
    /// Export all entries as CSV
    Export { file: PathBuf },
    /// Per-category totals
    Summary {
        #[arg(short, long, default_value = "expenditure")]
        kind: String,
        #[arg(short, long, default_value = "month")]
        period: String,
        #[arg(long, value_parser = date_arg)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = date_arg)]
        end: Option<NaiveDate>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Income against expenditure
    Overview {
        #[arg(short, long, default_value = "month")]
        period: String,
        #[arg(long, value_parser = date_arg)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = date_arg)]
        end: Option<NaiveDate>,
    },
    /// Recurring charges expected within the horizon
    Periodic {
        #[arg(long)]
        horizon: Option<i64>,
    },
    /// Structure a free-text description and record it
    Ingest {
        #[arg(required = true)]
        text: Vec<String>,
        /// Show the structured entry without storing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Ask the completion endpoint for advice on this period
    Advise {
        #[arg(short, long, default_value = "month")]
        period: String,
    },
}

fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("expected yyyy-MM-dd, got '{}'", s))
}

fn time_arg(s: &str) -> Result<NaiveTime, String> {
    parse_time(s).ok_or_else(|| format!("expected HH:mm, got '{}'", s))
}

fn amount_arg(s: &str) -> Result<Decimal, String> {
    parse_amount(s).ok_or_else(|| format!("not an amount: '{}'", s))
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", report(&e));
            ExitCode::FAILURE
        }
    }
}

/// Render a failure with its code and suggestions when it carries them
fn report(error: &anyhow::Error) -> String {
    if let Some(core) = error.downcast_ref::<CoreError>() {
        format!("{}: {}", core.severity(), core.to_details())
    } else if let Some(config) = error.downcast_ref::<ConfigError>() {
        format!("{}: {}", config.severity(), config.to_details())
    } else {
        format!("error: {:#}", error)
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if let Command::Init { force } = args.command {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        return init_config(&args.config, force);
    }

    let config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str()))
        .init();
    if !args.config.exists() {
        log::warn!("{} not found, using defaults", args.config.display());
    }
    log::debug!("data directory: {}", config.data.path.display());

    let store = LedgerStore::from_config(&config);
    let today = spendlog_core::time::today();

    match args.command {
        Command::Init { .. } => Ok(()),
        Command::Add {
            category,
            product,
            amount,
            date,
            time,
            remark,
        } => {
            let now = spendlog_core::time::now_minute();
            let record = LedgerRecord::new(
                category,
                product,
                amount,
                date.unwrap_or(now.date()),
                time.unwrap_or(now.time()),
                remark,
            );
            store.append(&record)?;
            println!("added {}", record.id());
            Ok(())
        }
        Command::List { start, end } => {
            let records = match (start, end) {
                (None, None) => {
                    let mut all = store.read_all()?;
                    all.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
                    all
                }
                (start, end) => store.read_range(
                    start.unwrap_or(NaiveDate::MIN),
                    end.unwrap_or(today),
                )?,
            };
            for record in &records {
                println!("{}", record);
            }
            log::info!("{} entries", records.len());
            Ok(())
        }
        Command::Update {
            id,
            category,
            product,
            amount,
            date,
            time,
            remark,
        } => {
            let patch = RecordPatch {
                category,
                product,
                amount,
                date,
                time,
                remark,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to update; pass at least one field");
            }
            let count = store.update(&id, &patch)?;
            println!("updated {} entries", count);
            Ok(())
        }
        Command::Delete { id } => {
            let count = store.delete(&id)?;
            println!("deleted {} entries", count);
            Ok(())
        }
        Command::Import { file } => {
            let report = store.import_file(&file)?;
            println!(
                "imported {}, skipped {}",
                report.entries_imported, report.entries_skipped
            );
            Ok(())
        }
        Command::Export { file } => {
            let count = store.export_tabular(&file)?;
            println!("exported {} entries to {}", count, file.display());
            Ok(())
        }
        Command::Summary {
            kind,
            period,
            start,
            end,
            json,
        } => {
            let kind: SummaryKind = kind.parse().map_err(anyhow::Error::msg)?;
            let records = store.read_all()?;
            let summary = SummaryEngine::new(&config.categories)
                .summarize(&records, kind, Some(&period), start, end, today)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{} {}: {}", summary.kind, summary.description, summary.total.normalize());
                for category in &summary.categories {
                    println!(
                        "  {:<8} {:>10} {:>6}%  ({})",
                        category.category,
                        category.amount.normalize(),
                        category.percentage,
                        category.count
                    );
                }
            }
            Ok(())
        }
        Command::Overview { period, start, end } => {
            let records = store.read_all()?;
            let overview = SummaryEngine::new(&config.categories)
                .overview(&records, Some(&period), start, end, today)?;
            println!("{}", overview.description);
            println!("  income      {:>10}", overview.income.normalize());
            println!("  expenditure {:>10}", overview.expenditure.normalize());
            println!("  net         {:>10}", overview.net.normalize());
            Ok(())
        }
        Command::Periodic { horizon } => {
            let mut options = DetectOptions::from(&config.periodic);
            if let Some(days) = horizon {
                options.horizon_days = days;
            }
            let records = store.read_all()?;
            let candidates = detect(&records, today, &options);
            if candidates.is_empty() {
                println!("no recurring charges due in the next {} days", options.horizon_days);
            }
            for c in &candidates {
                println!(
                    "{} in {:>2} days  {:<6} {:<12} {:>10}  every {} days ({} seen)",
                    c.next_date,
                    c.days_until_next,
                    c.category,
                    c.product,
                    c.amount.normalize(),
                    c.interval_days,
                    c.occurrences
                );
            }
            Ok(())
        }
        Command::Ingest { text, dry_run } => {
            let text = text.join(" ");
            let ingestor = Ingestor::from_config(&config.completion)?;
            let rt = Runtime::new()?;
            let record = rt.block_on(ingestor.structure_from_text(&text))?;
            println!("{}", record);
            if !dry_run {
                store.append(&record)?;
                println!("added {}", record.id());
            }
            Ok(())
        }
        Command::Advise { period } => {
            let records = store.read_all()?;
            let summary = SummaryEngine::new(&config.categories).summarize(
                &records,
                SummaryKind::Expenditure,
                Some(&period),
                None,
                None,
                today,
            )?;
            let upcoming = detect(&records, today, &DetectOptions::from(&config.periodic));
            let ingestor = Ingestor::from_config(&config.completion)?;
            let rt = Runtime::new()?;
            let advice = rt.block_on(ingestor.advise(&summary, &upcoming))?;
            println!("{}", advice);
            Ok(())
        }
    }
}

fn init_config(path: &PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    std::fs::write(path, Config::generate_default())
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote default configuration to {}", path.display());
    Ok(())
}
