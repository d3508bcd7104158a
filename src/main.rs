// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use redemption_tracker::{
    config, AppConfig, Card, CardRepository, JsonFileStore, SystemClock,
};

/// Credit card redemption tracker
#[derive(Parser)]
#[command(name = "redemption-tracker", version, about)]
struct Cli {
    #[command(flatten)]
    app: AppConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print every card, its redemptions and totals
    List,
    /// Run the period reset / year rollover once
    Reset,
    /// Mark a redemption as claimed for the current period
    Check {
        /// Card id or name
        card: String,
        /// Redemption id or name
        redemption: String,
    },
    /// Clear a redemption's claim for the current period
    Uncheck {
        /// Card id or name
        card: String,
        /// Redemption id or name
        redemption: String,
    },
    /// Interactive terminal UI (default)
    Ui,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Ui);

    // The TUI owns the terminal; only log for the plain commands.
    if !matches!(command, Command::Ui) {
        config::init_logging(&cli.app)?;
    }

    let store = Arc::new(JsonFileStore::new(&cli.app.data_file));
    let repo = Arc::new(CardRepository::open(store, Arc::new(SystemClock)));

    match command {
        Command::List => run_list(&repo),
        Command::Reset => run_reset(&repo),
        Command::Check { card, redemption } => run_set_checked(&repo, &card, &redemption, true)?,
        Command::Uncheck { card, redemption } => {
            run_set_checked(&repo, &card, &redemption, false)?
        }
        Command::Ui => run_ui_mode(repo)?,
    }

    Ok(())
}

fn run_list(repo: &CardRepository) {
    let cards = repo.list_cards();
    if cards.is_empty() {
        println!("No credit cards yet.");
        return;
    }

    for card in &cards {
        println!("\n{} ({})  [{}]", card.name, card.description, card.id);
        println!("  This year: ${:.2}", card.current_year_total);
        for (year, total) in &card.yearly_reimbursement_summaries {
            println!("  {}: ${:.2}", year, total);
        }
        for r in &card.redemptions {
            println!(
                "  [{}] {:<30} ${:>8.2}  {:<9}  claimed {}x  [{}]",
                if r.checked { "x" } else { " " },
                r.name,
                r.amount,
                r.frequency.as_str(),
                r.completed_count(),
                r.id
            );
        }
    }

    println!(
        "\nTotal reimbursements this year: ${:.2}",
        repo.current_year_reimbursement_total()
    );
}

fn run_reset(repo: &CardRepository) {
    let outcome = repo.run_reset();
    if outcome.changed {
        println!(
            "Reset applied: {} unchecked, archived years {:?}",
            outcome.unchecked, outcome.archived_years
        );
    } else {
        println!("Nothing to reset.");
    }
}

fn run_set_checked(
    repo: &CardRepository,
    card: &str,
    redemption: &str,
    checked: bool,
) -> Result<()> {
    let cards = repo.list_cards();
    let Some((card_id, redemption_id)) = resolve(&cards, card, redemption) else {
        bail!("no redemption '{}' on card '{}'", redemption, card);
    };

    match repo.set_redemption_checked(&card_id, &redemption_id, checked) {
        Some(r) => println!(
            "{} {} (claimed {}x this year)",
            if r.checked { "Checked" } else { "Unchecked" },
            r.name,
            r.completed_count()
        ),
        None => bail!("redemption disappeared while updating"),
    }
    Ok(())
}

/// Match a card and one of its redemptions by id, or by name ignoring case
fn resolve(cards: &[Card], card: &str, redemption: &str) -> Option<(String, String)> {
    let card = cards
        .iter()
        .find(|c| c.id == card || c.name.eq_ignore_ascii_case(card))?;
    let redemption = card
        .redemptions
        .iter()
        .find(|r| r.id == redemption || r.name.eq_ignore_ascii_case(redemption))?;
    Some((card.id.clone(), redemption.id.clone()))
}

#[cfg(feature = "tui")]
fn run_ui_mode(repo: Arc<CardRepository>) -> Result<()> {
    let mut app = ui::App::new(repo);
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_repo: Arc<CardRepository>) -> Result<()> {
    eprintln!("TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: redemption-tracker list");
    std::process::exit(1);
}
