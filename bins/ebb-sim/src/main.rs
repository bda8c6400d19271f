//! ebb-sim: drive an in-memory Ebb ledger from the command line.
//!
//! `curve` prints the weekly voting power of a single lock. `run` replays a
//! JSON scenario of lock, reward and exit operations against a fresh ledger
//! and prints reports as it goes.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ebb_core::constants::{UNIT, WEEK};
use ebb_core::time::epoch_start;
use ebb_core::types::{Address, PositionId, TxContext};
use ebb_escrow::EscrowSummary;
use ebb_ledger::{Ledger, LedgerConfig};

/// Seconds per simulated block.
const BLOCK_TIME: u64 = 12;

/// Vote-escrow ledger simulator.
#[derive(Parser, Debug)]
#[command(name = "ebb-sim", version, about = "Simulate vote-escrow locks and epoch rewards")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "EBB_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the voting power of one lock week by week.
    Curve(CurveArgs),
    /// Replay a JSON scenario file.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct CurveArgs {
    /// Locked amount in whole tokens.
    #[arg(short, long, default_value_t = 1_000)]
    amount: u64,

    /// Lock duration in weeks.
    #[arg(short, long, default_value_t = 52)]
    weeks: u64,

    /// Make the lock permanent right after creating it.
    #[arg(long)]
    permanent: bool,

    /// Lock date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    start: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Scenario file.
    scenario: PathBuf,

    /// Ledger config file (JSON). `EBB_*` environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the final escrow snapshot (bincode) to this path.
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Print every emitted event as a JSON line.
    #[arg(long)]
    events: bool,

    /// Stop at the first failing step instead of logging and continuing.
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Curve(args) => curve(args),
        Commands::Run(args) => run(args),
    }
}

// ---------------------------------------------------------------------------
// curve
// ---------------------------------------------------------------------------

fn curve(args: CurveArgs) -> Result<()> {
    let start = match args.start {
        Some(date) => date
            .and_hms_opt(0, 0, 0)
            .context("invalid start date")?
            .and_utc(),
        None => Utc::now(),
    };
    let now = unix(start)?;

    let config = LedgerConfig::default().apply_env()?;
    let token = config.token;
    let holder = Address::from_label("holder");
    let mut ledger = Ledger::in_memory(config)?;
    let amount = tokens(args.amount);
    ledger.bank_mut().mint(&token, &holder, amount)?;

    let ctx = context(holder, now);
    let id = ledger.create_lock(&ctx, amount, args.weeks * WEEK)?;
    if args.permanent {
        ledger.lock_permanent(&ctx, id)?;
    }
    let end = ledger.escrow().locked(id).end;
    info!(id, end, permanent = args.permanent, "lock created");

    println!("{:<12} {:>24}", "date", "voting power");
    let last = if args.permanent { now + args.weeks * WEEK } else { end };
    let mut t = now;
    loop {
        println!("{:<12} {:>24}", date_of(t), format_units(ledger.voting_power_at(id, t)));
        if t >= last {
            break;
        }
        t = (epoch_start(t) + WEEK).min(last);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// A replayable sequence of ledger operations.
#[derive(Deserialize, Debug)]
struct Scenario {
    /// Timestamp of step offset 0. Defaults to the start of the current week.
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    steps: Vec<Step>,
}

#[derive(Deserialize, Debug)]
struct Step {
    /// Seconds after the scenario start. Must not decrease.
    #[serde(default)]
    at: u64,
    /// Convenience offset in weeks, added to `at`.
    #[serde(default)]
    week: u64,
    action: Action,
}

/// One ledger operation. Amounts are whole tokens; actors and tokens are
/// labels or `0x` addresses.
#[derive(Deserialize, Debug)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Action {
    Mint { who: String, token: Option<String>, amount: u64 },
    CreateLock { who: String, amount: u64, weeks: u64, to: Option<String> },
    IncreaseAmount { who: String, id: PositionId, amount: u64 },
    DepositFor { who: String, id: PositionId, amount: u64 },
    IncreaseUnlockTime { who: String, id: PositionId, weeks: u64 },
    LockPermanent { who: String, id: PositionId },
    UnlockPermanent { who: String, id: PositionId },
    Withdraw { who: String, id: PositionId },
    EarlyWithdraw { who: String, id: PositionId },
    Merge { who: String, from: PositionId, to: PositionId },
    Split { who: String, id: PositionId, amount: u64 },
    ToggleSplit { account: Option<String>, allowed: bool },
    SetPenalty { bps: u64 },
    Transfer { who: String, to: String, id: PositionId },
    Notify { who: String, token: String, amount: u64 },
    Claim { who: String, token: String, id: PositionId },
    SetReceiver { who: String, id: PositionId, receiver: String },
    Checkpoint,
    Report { #[serde(default)] ids: Vec<PositionId> },
}

#[derive(Serialize)]
struct Report {
    at: String,
    summary: EscrowSummary,
    positions: Vec<PositionReport>,
}

#[derive(Serialize)]
struct PositionReport {
    id: PositionId,
    owner: Option<Address>,
    amount: i128,
    end: u64,
    permanent: bool,
    voting_power: String,
}

fn run(args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    }
    .apply_env()?;

    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", args.scenario.display()))?;
    let start = match scenario.start {
        Some(start) => unix(start)?,
        None => epoch_start(unix(Utc::now())?),
    };

    let mut ledger = Ledger::in_memory(config)?;
    info!(steps = scenario.steps.len(), start, "replaying scenario");

    for (index, step) in scenario.steps.iter().enumerate() {
        let t = start + step.at + step.week * WEEK;
        debug!(index, t, action = ?step.action, "step");
        if let Err(e) = apply(&mut ledger, &step.action, t) {
            if args.strict {
                return Err(e.context(format!("step {index}")));
            }
            warn!(index, error = %e, "step failed");
            println!("step {index}: failed: {e:#}");
        }
        for event in ledger.drain_events() {
            if args.events {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    if let Some(path) = &args.save_state {
        save_state(&ledger, path)?;
    }
    Ok(())
}

fn apply(ledger: &mut Ledger, action: &Action, t: u64) -> Result<()> {
    let admin = ledger.escrow().config().admin;
    match action {
        Action::Mint { who, token, amount } => {
            let token = match token {
                Some(label) => address(label)?,
                None => ledger.escrow().token(),
            };
            ledger.bank_mut().mint(&token, &address(who)?, tokens(*amount))?;
        }
        Action::CreateLock { who, amount, weeks, to } => {
            let ctx = context(address(who)?, t);
            let to = match to {
                Some(to) => address(to)?,
                None => ctx.sender,
            };
            let id = ledger.create_lock_for(&ctx, tokens(*amount), weeks * WEEK, to)?;
            println!("{}: {who} locked {amount} for {weeks} weeks as position {id}", date_of(t));
        }
        Action::IncreaseAmount { who, id, amount } => {
            ledger.increase_amount(&context(address(who)?, t), *id, tokens(*amount))?;
        }
        Action::DepositFor { who, id, amount } => {
            ledger.deposit_for(&context(address(who)?, t), *id, tokens(*amount))?;
        }
        Action::IncreaseUnlockTime { who, id, weeks } => {
            ledger.increase_unlock_time(&context(address(who)?, t), *id, weeks * WEEK)?;
        }
        Action::LockPermanent { who, id } => {
            ledger.lock_permanent(&context(address(who)?, t), *id)?;
        }
        Action::UnlockPermanent { who, id } => {
            ledger.unlock_permanent(&context(address(who)?, t), *id)?;
        }
        Action::Withdraw { who, id } => {
            let paid = ledger.withdraw(&context(address(who)?, t), *id)?;
            println!("{}: {who} withdrew {} from position {id}", date_of(t), format_units(paid));
        }
        Action::EarlyWithdraw { who, id } => {
            let (paid, penalty) = ledger.early_withdraw(&context(address(who)?, t), *id)?;
            println!(
                "{}: {who} withdrew {} early from position {id}, penalty {}",
                date_of(t),
                format_units(paid),
                format_units(penalty)
            );
        }
        Action::Merge { who, from, to } => {
            ledger.merge(&context(address(who)?, t), *from, *to)?;
        }
        Action::Split { who, id, amount } => {
            let (a, b) = ledger.split(&context(address(who)?, t), *id, tokens(*amount))?;
            println!("{}: {who} split position {id} into {a} and {b}", date_of(t));
        }
        Action::ToggleSplit { account, allowed } => {
            let account = match account {
                Some(a) => address(a)?,
                None => Address::ZERO,
            };
            ledger.toggle_split(&context(admin, t), account, *allowed)?;
        }
        Action::SetPenalty { bps } => {
            ledger.set_penalty_bps(&context(admin, t), *bps)?;
        }
        Action::Transfer { who, to, id } => {
            let ctx = context(address(who)?, t);
            ledger.transfer_from(&ctx, ctx.sender, address(to)?, *id)?;
        }
        Action::Notify { who, token, amount } => {
            ledger.notify_reward(&context(address(who)?, t), address(token)?, tokens(*amount))?;
        }
        Action::Claim { who, token, id } => {
            let paid = ledger.claim(&context(address(who)?, t), address(token)?, *id, t)?;
            println!(
                "{}: {who} claimed {} {token} for position {id}",
                date_of(t),
                format_units(paid)
            );
        }
        Action::SetReceiver { who, id, receiver } => {
            ledger.set_reward_receiver(&context(address(who)?, t), *id, address(receiver)?)?;
        }
        Action::Checkpoint => {
            ledger.checkpoint(&context(admin, t))?;
        }
        Action::Report { ids } => {
            let report = report(ledger, ids, t);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn report(ledger: &Ledger, ids: &[PositionId], t: u64) -> Report {
    let escrow = ledger.escrow();
    let ids: Vec<PositionId> = if ids.is_empty() {
        (1..escrow.next_id()).filter(|id| escrow.owner_of(*id).is_some()).collect()
    } else {
        ids.to_vec()
    };
    let positions = ids
        .into_iter()
        .map(|id| {
            let lock = escrow.locked(id);
            PositionReport {
                id,
                owner: escrow.owner_of(id),
                amount: lock.amount,
                end: lock.end,
                permanent: lock.is_permanent,
                voting_power: format_units(escrow.voting_power_at(id, t)),
            }
        })
        .collect();
    Report {
        at: date_of(t),
        summary: escrow.summary(t),
        positions,
    }
}

fn save_state(ledger: &Ledger, path: &Path) -> Result<()> {
    let bytes = ledger.escrow().snapshot()?;
    std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "escrow state saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// A label such as `alice`, or a `0x` address.
fn address(name: &str) -> Result<Address> {
    if name.starts_with("0x") {
        return name.parse().map_err(anyhow::Error::msg);
    }
    if name.is_empty() {
        bail!("empty actor name");
    }
    Ok(Address::from_label(name))
}

fn context(sender: Address, t: u64) -> TxContext {
    TxContext::new(sender, t, t / BLOCK_TIME)
}

fn tokens(whole: u64) -> u128 {
    u128::from(whole) * UNIT as u128
}

fn unix(at: DateTime<Utc>) -> Result<u64> {
    u64::try_from(at.timestamp()).context("timestamp before 1970")
}

fn date_of(t: u64) -> String {
    i64::try_from(t)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map_or_else(|| t.to_string(), |d| d.format("%Y-%m-%d").to_string())
}

/// Base units as a decimal with four fractional digits.
fn format_units(amount: u128) -> String {
    let unit = UNIT as u128;
    let frac = amount % unit / (unit / 10_000);
    format!("{}.{frac:04}", amount / unit)
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text. `RUST_LOG` takes precedence over the level.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
