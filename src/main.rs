//! CLI entry point for the model-portfolio order generator.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use log::info;

use mp_rebalancer::audit::{self, AuditLog};
use mp_rebalancer::config::Config;
use mp_rebalancer::error::{Error, Result};
use mp_rebalancer::model::ModelPortfolioSet;
use mp_rebalancer::orders::OrderBatch;
use mp_rebalancer::rebalance::{self, Scenario, WithdrawalStrategy};
use mp_rebalancer::snapshot::PositionSnapshot;
use mp_rebalancer::ticket;

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Model-portfolio order generator: deposits, withdrawals, rebalancing")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Allocate a new deposit across a model portfolio
    Deposit {
        /// Account the orders are for
        account: String,
        /// Model portfolio id (e.g. B301)
        portfolio: String,
        /// Deposit amount in base currency
        #[arg(long)]
        amount: f64,
        /// Base currency of the account
        #[arg(long, default_value = "USD")]
        currency: String,
        #[command(flatten)]
        output: OutputOpts,
    },

    /// Raise cash by selling existing positions
    Withdraw {
        account: String,
        /// Model portfolio id (recorded in the audit trail)
        portfolio: String,
        /// Position snapshot JSON exported by the position provider
        #[arg(long)]
        snapshot: PathBuf,
        /// Withdrawal amount in base currency
        #[arg(long)]
        amount: f64,
        /// Sell largest positions first instead of proportionally
        #[arg(long)]
        largest_first: bool,
        #[command(flatten)]
        output: OutputOpts,
    },

    /// Rebalance an account toward its model portfolio
    Rebalance {
        account: String,
        /// Model portfolio id to target
        portfolio: String,
        /// Position snapshot JSON exported by the position provider
        #[arg(long)]
        snapshot: PathBuf,
        /// Target total portfolio value in base currency
        #[arg(long)]
        target: f64,
        /// Minimum trade amount; smaller residual adjustments are dropped
        #[arg(long)]
        min_trade: Option<f64>,
        #[command(flatten)]
        output: OutputOpts,
    },

    /// List model portfolios from the master file
    List,
}

#[derive(Args)]
struct OutputOpts {
    /// Output ticket CSV path. Default: generated name under output.dir
    #[arg(long)]
    output: Option<PathBuf>,

    /// Show the plan without writing a ticket
    #[arg(long)]
    dry_run: bool,

    /// Skip confirmation prompt (for automation/cron)
    #[arg(long)]
    force: bool,
}

fn to_cents(usd: f64) -> i64 {
    (usd * 100.0).round() as i64
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let models = match ModelPortfolioSet::load(Path::new(&config.model.path)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error loading model portfolios: {e}");
            process::exit(1);
        }
    };
    info!(
        "Loaded {} model portfolios from {}",
        models.len(),
        config.model.path
    );

    let result = match cli.command {
        Command::Deposit {
            account,
            portfolio,
            amount,
            currency,
            output,
        } => run_deposit(&config, &models, &account, &portfolio, amount, &currency, &output),
        Command::Withdraw {
            account,
            portfolio,
            snapshot,
            amount,
            largest_first,
            output,
        } => run_withdraw(
            &config,
            &models,
            &account,
            &portfolio,
            &snapshot,
            amount,
            largest_first,
            &output,
        ),
        Command::Rebalance {
            account,
            portfolio,
            snapshot,
            target,
            min_trade,
            output,
        } => run_rebalance(
            &config,
            &models,
            &account,
            &portfolio,
            &snapshot,
            target,
            min_trade,
            &output,
        ),
        Command::List => run_list(&models),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_deposit(
    config: &Config,
    models: &ModelPortfolioSet,
    account: &str,
    portfolio_id: &str,
    amount: f64,
    currency: &str,
    output: &OutputOpts,
) -> Result<()> {
    // Deposits allocate fresh cash; no current positions are needed.
    let snapshot =
        PositionSnapshot::normalized(account, currency, Vec::new(), 0, chrono::Utc::now())?;

    let scenario = Scenario::Deposit {
        amount_cents: to_cents(amount),
    };
    finish_run(
        config, "Deposit", account, portfolio_id, &snapshot, models, scenario, output, false,
    )
}

#[allow(clippy::too_many_arguments)]
fn run_withdraw(
    config: &Config,
    models: &ModelPortfolioSet,
    account: &str,
    portfolio_id: &str,
    snapshot_path: &Path,
    amount: f64,
    largest_first: bool,
    output: &OutputOpts,
) -> Result<()> {
    let snapshot = load_snapshot_for(snapshot_path, account)?;
    let strategy = if largest_first {
        WithdrawalStrategy::LargestFirst
    } else {
        WithdrawalStrategy::Proportional
    };
    let scenario = Scenario::Withdrawal {
        amount_cents: to_cents(amount),
        strategy,
    };
    finish_run(
        config, "Withdrawal", account, portfolio_id, &snapshot, models, scenario, output, true,
    )
}

#[allow(clippy::too_many_arguments)]
fn run_rebalance(
    config: &Config,
    models: &ModelPortfolioSet,
    account: &str,
    portfolio_id: &str,
    snapshot_path: &Path,
    target: f64,
    min_trade: Option<f64>,
    output: &OutputOpts,
) -> Result<()> {
    let snapshot = load_snapshot_for(snapshot_path, account)?;
    let min_trade_cents = min_trade.map(to_cents).unwrap_or(config.min_trade_cents());
    let scenario = Scenario::Rebalance {
        target_total_cents: to_cents(target),
        min_trade_cents,
    };
    finish_run(
        config, "Rebalance", account, portfolio_id, &snapshot, models, scenario, output, true,
    )
}

fn run_list(models: &ModelPortfolioSet) -> Result<()> {
    println!("MODEL PORTFOLIOS:");
    println!(
        "  {:10} {:20} {:>8} {:>12}  {}",
        "ID", "Bucket", "Holdings", "Total", "Effective"
    );
    for id in models.portfolio_ids() {
        let portfolio = models.lookup(id)?;
        let symbols: Vec<&str> = portfolio
            .holdings
            .iter()
            .map(|h| h.symbol.as_str())
            .collect();
        println!(
            "  {:10} {:20} {:>8} {:>11.2}%  {}  ({})",
            portfolio.portfolio_id,
            portfolio.bucket_name,
            portfolio.holdings.len(),
            portfolio.total_weight(),
            portfolio.effective_date,
            symbols.join(", "),
        );
    }
    Ok(())
}

/// Load a snapshot and check it belongs to the requested account.
fn load_snapshot_for(path: &Path, account: &str) -> Result<PositionSnapshot> {
    let snapshot = PositionSnapshot::load(path)?;
    if snapshot.account_id != account {
        return Err(Error::Snapshot(format!(
            "snapshot is for account {}, not {account}",
            snapshot.account_id
        )));
    }
    Ok(snapshot)
}

/// Shared tail of every generating command: compute, display, confirm, write.
#[allow(clippy::too_many_arguments)]
fn finish_run(
    config: &Config,
    kind: &str,
    account: &str,
    portfolio_id: &str,
    snapshot: &PositionSnapshot,
    models: &ModelPortfolioSet,
    scenario: Scenario,
    output: &OutputOpts,
    show_positions: bool,
) -> Result<()> {
    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, kind, account, Some(portfolio_id))?;

    if show_positions {
        audit::log_snapshot(&mut audit, snapshot)?;
        display_current_positions(snapshot);
    }

    let model = models.lookup(portfolio_id)?;
    let orders = rebalance::compute_orders(snapshot, model, scenario)?;

    if orders.is_empty() {
        println!("\nNo orders needed, portfolio already matches target.");
        audit.log_simple("no_orders_needed")?;
        return Ok(());
    }

    let ts = orders[0].ts;
    let batch = OrderBatch::new(OrderBatch::named_for(kind, account, portfolio_id, ts), orders);

    display_plan(&batch);
    print!("\n{}", batch.summary());
    audit::log_orders_generated(&mut audit, &batch)?;

    if output.dry_run {
        println!("\n[DRY RUN] No ticket written.");
        return Ok(());
    }

    let path = output.output.clone().unwrap_or_else(|| {
        Path::new(&config.output.dir).join(format!(
            "orders_{}_{account}_{portfolio_id}_{}.csv",
            kind.to_lowercase(),
            ts.format("%Y%m%d_%H%M%S"),
        ))
    });

    if !output.force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Write {} orders to {}?",
                batch.orders.len(),
                path.display()
            ))
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;

        if !confirmed {
            println!("Aborted.");
            audit.log("user_confirmed", serde_json::json!({"approved": false}))?;
            return Ok(());
        }
        audit.log("user_confirmed", serde_json::json!({"approved": true}))?;
    }

    ticket::write_ticket(&path, &batch.orders)?;
    audit::log_ticket_written(&mut audit, &path, batch.orders.len())?;
    println!("\n{} orders written to {}", batch.orders.len(), path.display());

    Ok(())
}

fn display_current_positions(snapshot: &PositionSnapshot) {
    let total = snapshot.total_cents();
    println!(
        "Account {} ({}): ${:.2} total, ${:.2} cash",
        snapshot.account_id,
        snapshot.base_currency,
        total as f64 / 100.0,
        snapshot.cash_cents as f64 / 100.0,
    );

    if snapshot.positions().is_empty() {
        println!("No positions.");
        return;
    }

    println!("CURRENT PORTFOLIO:");
    for pos in snapshot.positions() {
        let weight = if total > 0 {
            pos.market_value_cents as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        println!(
            "  {:8} {:>10.2} = ${:>12.2}  ({:.1}%)",
            pos.symbol,
            pos.quantity,
            pos.market_value_cents as f64 / 100.0,
            weight,
        );
    }
}

fn display_plan(batch: &OrderBatch) {
    println!("\nORDERS:");
    println!(
        "  {:>3}  {:6} {:8} {:>12} {:5}  {}",
        "#", "Action", "Symbol", "Amount", "Type", "Note"
    );
    for (i, order) in batch.orders.iter().enumerate() {
        println!(
            "  {:>3}  {:6} {:8} ${:>11.2} {:5}  {}",
            i + 1,
            format!("{}", order.action),
            order.symbol,
            order.amount_cents as f64 / 100.0,
            format!("{}", order.order_type),
            order.note,
        );
    }
}
