use std::error::Error;
use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use log::{error, info};
use parkwatch::configuration::{Config, ConfigArgs};
use parkwatch::controller::Controller;
use parkwatch::session_management::{LiveEntry, SessionStore};

#[derive(Parser)]
#[command(name = "parkwatch")]
#[command(version)]
#[command(about = "Parking session tracker: register entries, bill exits")]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the web interface
    Serve,
    /// Register a vehicle entering the lot
    Open { plate: String },
    /// List parked vehicles with their running fee
    List,
    /// List parked vehicles whose plate contains TERM
    Search { term: Option<String> },
    /// Show one parked vehicle
    Show { plate: String },
    /// Correct the plate of a parked vehicle
    Rename { old: String, new: String },
    /// Show what closing a session would charge
    Preview { plate: String },
    /// Bill and remove a session
    Close {
        plate: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::load(&args.config)?;
    info!("Configuration imported successfully");
    let controller = Controller::new(config)?;

    if let Command::Serve = args.command {
        controller.run().await?;
        return Ok(());
    }

    let store = controller.store();
    let mut store = store
        .lock()
        .map_err(|_| "session store lock poisoned")?;
    execute(&mut store, args.command)
}

fn execute(store: &mut SessionStore, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Serve => {}
        Command::Open { plate } => {
            let session = store.open_session(&plate)?;
            println!(
                "{} entered on {} at {}",
                session.plate,
                session.entry_date_label(),
                session.entry_clock_label()
            );
        }
        Command::List => print_entries(&store.live_view()?),
        Command::Search { term } => {
            let now = chrono::Utc::now();
            print_entries(&store.live_search_at(term.as_deref().unwrap_or(""), now)?)
        }
        Command::Show { plate } => {
            let entry = store.live_entry_at(&plate, chrono::Utc::now())?;
            print_entries(std::slice::from_ref(&entry));
        }
        Command::Rename { old, new } => {
            let session = store.rename_plate(&old, &new)?;
            println!("Session renamed to {}", session.plate);
        }
        Command::Preview { plate } => {
            println!("{}", store.preview_close(&plate)?);
        }
        Command::Close { plate, yes } => {
            if yes {
                println!("{}", store.close_session(&plate)?);
                return Ok(());
            }
            println!("{}", store.preview_close(&plate)?);
            if confirm("Close this session?")? {
                store.commit_close(&plate)?;
                println!("Session closed");
            } else {
                println!("Nothing changed");
            }
        }
    }
    Ok(())
}

fn print_entries(entries: &[LiveEntry]) {
    if entries.is_empty() {
        println!("No vehicles parked");
        return;
    }
    println!(
        "{:<10} {:<11} {:<6} {:<34} {:>10}",
        "PLATE", "DATE", "ENTRY", "STAY", "AMOUNT"
    );
    for entry in entries {
        println!(
            "{:<10} {:<11} {:<6} {:<34} {:>10.2}",
            entry.session.plate.as_str(),
            entry.session.entry_date_label(),
            entry.session.entry_clock_label(),
            entry.duration.to_string(),
            entry.amount
        );
    }
}

fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkwatch::storage::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_parse_close_with_yes() {
        let args = Args::try_parse_from(["parkwatch", "--storage-backend", "memory", "close", "abc1234", "--yes"])
            .unwrap_or_else(|e| panic!("{}", e));
        assert!(matches!(args.command, Command::Close { ref plate, yes: true } if plate == "abc1234"));
    }

    #[test]
    fn test_execute_open_rename_close() {
        let mut store = SessionStore::new(Arc::new(MemoryStorage::new()));
        execute(&mut store, Command::Open { plate: "abc1234".into() }).unwrap();
        execute(
            &mut store,
            Command::Rename { old: "ABC-1234".into(), new: "xyz9876".into() },
        )
        .unwrap();
        execute(&mut store, Command::Close { plate: "XYZ-9876".into(), yes: true }).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(execute(&mut store, Command::Show { plate: "XYZ-9876".into() }).is_err());
    }
}
