use bp_core::*;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bp")]
#[command(about = "Blood pressure measurement journal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use a specific config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guided three-reading measurement session (default)
    Measure,

    /// List saved records in chronological order
    History,

    /// Export saved records to CSV
    Export {
        /// Output file (defaults to records.csv in the data directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    bp_core::logging::init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Measure) | None => cmd_measure(data_dir, &config),
        Some(Commands::History) => cmd_history(&data_dir),
        Some(Commands::Export { out }) => cmd_export(&data_dir, out),
    }
}

fn records_path(data_dir: &Path) -> PathBuf {
    data_dir.join("records.jsonl")
}

fn cmd_measure(data_dir: PathBuf, config: &Config) -> Result<()> {
    std::fs::create_dir_all(&data_dir)?;

    let timers = TimerService::new(SystemClock, FileTimerStore::new(data_dir.join("timers.json")));
    let store = JsonlRecordStore::new(records_path(&data_dir));
    let mut workflow = Workflow::new(timers, store, &config.protocol);
    workflow.resume()?;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  BLOOD PRESSURE MEASUREMENT             │");
    println!("╰─────────────────────────────────────────╯");

    loop {
        match workflow.stage().clone() {
            Stage::PrepQuestion => {
                println!("\nDid you rest for {} minutes before measuring?", config.protocol.prep_seconds / 60);
                println!("  'y' + Enter if you already rested");
                println!("  anything else to start a rest countdown");
                print!("> ");
                io::stdout().flush()?;

                match prompt_line()?.to_lowercase().as_str() {
                    "y" | "yes" => workflow.confirm_rested(),
                    _ => workflow.start_rest()?,
                }
            }

            Stage::PrepWait { remaining } => {
                print!("\r  Rest: {}   ", format_clock(remaining));
                io::stdout().flush()?;
                thread::sleep(Duration::from_secs(1));
                workflow.tick()?;
                if !matches!(workflow.stage(), Stage::PrepWait { .. }) {
                    println!("\n  Rest complete - starting measurements.");
                }
            }

            Stage::Measuring { index, cooldown: 0 } => {
                if workflow.has_pending_save() {
                    println!("\n{}", workflow.status().unwrap_or(""));
                    println!("Press Enter to retry saving");
                    prompt_line()?;
                    workflow.save_measurement()?;
                    continue;
                }

                println!("\nReading {} of 3", index + 1);
                workflow.set_field(Field::Systolic, prompt_value("Systolic")?);
                workflow.set_field(Field::Diastolic, prompt_value("Diastolic")?);
                workflow.set_field(Field::Pulse, prompt_value("Pulse")?);

                workflow.save_measurement()?;
                if let Some(error) = workflow.error() {
                    println!("  {}", error);
                }
            }

            Stage::Measuring { cooldown, .. } => {
                print!("\r  Next reading in {}   ", format_clock(cooldown));
                io::stdout().flush()?;
                thread::sleep(Duration::from_secs(1));
                workflow.tick()?;
                if matches!(workflow.stage(), Stage::Measuring { cooldown: 0, .. }) {
                    println!();
                }
            }

            Stage::Done { record } => {
                println!("\n╭─────────────────────────────────────────╮");
                println!("│  AVERAGE OF THREE READINGS              │");
                println!("╰─────────────────────────────────────────╯");
                println!();
                println!("  Systolic:  {}", record.systolic);
                println!("  Diastolic: {}", record.diastolic);
                println!("  Pulse:     {}", record.pulse);
                println!();
                println!("  Taken at {}", record.timestamp.format("%Y-%m-%d %H:%M"));
                if let Some(status) = workflow.status() {
                    println!("\n{}", status);
                }
                break;
            }
        }
    }

    workflow.teardown();
    Ok(())
}

fn cmd_history(data_dir: &Path) -> Result<()> {
    let records = read_records(&records_path(data_dir))?;

    if records.is_empty() {
        println!("No records yet.");
        return Ok(());
    }

    println!("Saved records ({}):", records.len());
    for record in records {
        let id = record.id.map(|id| id.to_string()).unwrap_or_default();
        println!(
            "  {}  {:>3}/{:<3}  pulse {:>3}  (#{})",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.systolic,
            record.diastolic,
            record.pulse,
            id
        );
    }
    Ok(())
}

fn cmd_export(data_dir: &Path, out: Option<PathBuf>) -> Result<()> {
    let records = read_records(&records_path(data_dir))?;
    let csv_path = out.unwrap_or_else(|| data_dir.join("records.csv"));

    let count = records_to_csv(&records, &csv_path)?;
    println!("✓ Exported {} records", count);
    println!("  CSV: {}", csv_path.display());
    Ok(())
}

fn prompt_value(label: &str) -> Result<String> {
    print!("  {}: ", label);
    io::stdout().flush()?;
    prompt_line()
}

fn prompt_line() -> Result<String> {
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input)?;
    if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input").into());
    }
    Ok(input.trim().to_string())
}
