use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use clinic_core::{schedule, CoreConfig};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic operations core CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bookable slot calendar for a date
    Slots {
        /// Calendar date (YYYY-MM-DD)
        date: String,
    },
    /// Print the weekly operating pattern
    Hours,
    /// Print the fee schedule
    Fees,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = CoreConfig::default();

    match cli.command {
        Some(Commands::Slots { date }) => {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| format!("invalid date: {date} (expected YYYY-MM-DD)"))?;

            let slots = schedule::generate(date, config.schedule());
            if slots.is_empty() {
                println!("{date}: closed (weekly closure day)");
            } else {
                println!("{date}: {} bookable slots", slots.len());
                for slot in slots {
                    println!("  {}", slot.format("%H:%M"));
                }
            }
        }
        Some(Commands::Hours) => {
            let schedule = config.schedule();
            println!(
                "Ordinary days: {} - {} (break {} - {})",
                schedule.open().format("%H:%M"),
                schedule.close().format("%H:%M"),
                schedule.break_start().format("%H:%M"),
                schedule.break_end().format("%H:%M"),
            );
            println!(
                "{:?}: {} - {}",
                schedule.partial_weekday(),
                schedule.open().format("%H:%M"),
                schedule.partial_close().format("%H:%M"),
            );
            println!("{:?}: closed", schedule.closure_weekday());
            println!("Capacity per slot: {}", config.slot_capacity());
        }
        Some(Commands::Fees) => {
            let fees = config.fees();
            println!("Consultation: {} KRW", fees.consultation_fee());
            println!("Diagnostic test: {} KRW", fees.test_fee());
        }
        None => {
            println!("Use 'clinic --help' for commands");
        }
    }

    Ok(())
}
