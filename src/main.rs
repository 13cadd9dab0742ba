// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

// Use library instead of local modules
use expense_tracker::{
    import_csv, parse_submission, AppConfig, DashboardView, SqliteStore, SubmissionPipeline,
    TrackerError,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    init_logging(command.is_none());

    let config = AppConfig::load()?;
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    let pipeline = SubmissionPipeline::new(store, config)?;

    match command {
        Some("add") => run_add(&pipeline, &args[2..]),
        Some("delete") => run_delete(&pipeline, &args[2..]),
        Some("list") => run_list(&pipeline),
        Some("import") => run_import(&pipeline, &args[2..]),
        Some(other) => {
            eprintln!("❌ Unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
        // UI mode (default)
        None => run_ui_mode(pipeline),
    }
}

/// Logs go to stderr. The TUI owns the terminal, so it only logs when asked.
fn init_logging(tui: bool) {
    if tui && env::var_os("RUST_LOG").is_none() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("   expense-tracker                       open the dashboard");
    eprintln!("   expense-tracker add <amount> <description...>");
    eprintln!("   expense-tracker delete <id>");
    eprintln!("   expense-tracker list");
    eprintln!("   expense-tracker import <file.csv>");
}

fn run_add(pipeline: &SubmissionPipeline<SqliteStore>, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        print_usage();
        std::process::exit(2);
    }

    let description = args[1..].join(" ");
    let submission = match parse_submission(&args[0], &description) {
        Ok(submission) => submission,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(2);
        }
    };

    let outcome = pipeline.handle_submission(submission.amount, &submission.description)?;

    println!(
        "✓ Recorded #{}: {:.2} {}",
        outcome.expense.id, outcome.expense.amount, outcome.expense.description
    );
    let icon = if outcome.budget.is_breach() { "🚨" } else { "✅" };
    println!("{} {}", icon, outcome.message);

    print_dashboard(&pipeline.dashboard(None)?);
    Ok(())
}

fn run_delete(pipeline: &SubmissionPipeline<SqliteStore>, args: &[String]) -> Result<()> {
    let raw = args.first().map(String::as_str).unwrap_or_default();
    let id: i64 = match raw.parse() {
        Ok(id) => id,
        Err(_) => {
            eprintln!("❌ Expense id must be an integer, got {:?}", raw);
            std::process::exit(2);
        }
    };

    match pipeline.delete_expense(id) {
        Ok(()) => println!("✓ Deleted expense #{}", id),
        Err(TrackerError::NotFound(id)) => {
            eprintln!("❌ Expense #{} not found", id);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    print_dashboard(&pipeline.dashboard(None)?);
    Ok(())
}

fn run_list(pipeline: &SubmissionPipeline<SqliteStore>) -> Result<()> {
    print_dashboard(&pipeline.dashboard(None)?);
    Ok(())
}

fn run_import(pipeline: &SubmissionPipeline<SqliteStore>, args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        print_usage();
        std::process::exit(2);
    };

    println!("📂 Importing {}...", path);
    let report = import_csv(pipeline.store(), Path::new(path))?;

    println!("✓ Imported: {} expenses", report.imported.len());
    if !report.rejected.is_empty() {
        println!("⚠️  Rejected: {} rows", report.rejected.len());
        for (line, reason) in &report.rejected {
            println!("   line {}: {}", line, reason);
        }
    }

    let count = pipeline.store().count()?;
    println!("✓ Database contains {} expenses", count);
    Ok(())
}

fn print_dashboard(view: &DashboardView) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print_total("Today", view.daily_total, view.thresholds.daily);
    print_total("This week", view.weekly_total, view.thresholds.weekly);
    print_total("This month", view.monthly_total, view.thresholds.monthly);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if view.expenses.is_empty() {
        println!("No expenses recorded yet.");
        return;
    }

    for expense in &view.expenses {
        println!(
            "#{:<5} {}  {:>10.2}  {}",
            expense.id,
            expense.created_at.format("%Y-%m-%d %H:%M"),
            expense.amount,
            expense.description
        );
    }
}

fn print_total(label: &str, total: f64, budget: f64) {
    let icon = if total > budget { "🚨" } else { "✓" };
    println!("{} {:<11} {:>10.2} / {:.2}", icon, label, total, budget);
}

#[cfg(feature = "tui")]
fn run_ui_mode(pipeline: SubmissionPipeline<SqliteStore>) -> Result<()> {
    println!("🖥️  Loading Expense Tracker UI...\n");

    let mut app = ui::App::new(pipeline)?;
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_pipeline: SubmissionPipeline<SqliteStore>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin expense-server --features server");
    std::process::exit(1);
}
