//! Operator CLI over the checkpoint manager.
//!
//! Shell-level drivers call `waypoint check` before starting an item's next
//! phase, `waypoint sync` after each phase, and `waypoint settle` once the
//! run ends.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use waypoint::core::invariants::validate_invariants;
use waypoint::core::phase::Phase;
use waypoint::exit_codes;
use waypoint::io::config::{CONFIG_FILE, WaypointConfig, load_config, write_config};
use waypoint::io::sidecar::decode_sidecar;
use waypoint::logging;
use waypoint::manager::CheckpointManager;

#[derive(Parser)]
#[command(
    name = "waypoint",
    version,
    about = "Phase tracking and checkpoint recovery for multi-phase work items"
)]
struct Cli {
    /// Config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Emit debug diagnostics on stderr (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ItemArgs {
    /// Work item identifier.
    #[arg(long)]
    item: String,

    /// Working directory (defaults to `<runs_dir>/<item>`).
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default `waypoint.toml`.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the reconciled checkpoint as JSON without saving it.
    Inspect(ItemArgs),
    /// Reconcile the checkpoint with its working directory and save it.
    Sync(ItemArgs),
    /// Print the phase and resume guidance; the exit code says whether to resume.
    Check(ItemArgs),
    /// Print the final status of a run; a completed item's checkpoint is removed.
    Settle {
        #[command(flatten)]
        item: ItemArgs,

        /// The run's output passed validation.
        #[arg(long)]
        validated: bool,
    },
    /// Delete the checkpoint sidecar.
    Clear(ItemArgs),
    /// List resumable items, most advanced first.
    Pending,
    /// Strictly decode the sidecar and check record invariants.
    Validate(ItemArgs),
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(if cli.verbose { "waypoint=debug" } else { "warn" });

    let config = cli.config.as_path();
    match cli.command {
        Command::Init { force } => cmd_init(config, force),
        Command::Inspect(args) => cmd_inspect(&manager(config)?, &args),
        Command::Sync(args) => cmd_sync(&manager(config)?, &args),
        Command::Check(args) => cmd_check(&manager(config)?, &args),
        Command::Settle { item, validated } => cmd_settle(&manager(config)?, &item, validated),
        Command::Clear(args) => cmd_clear(&manager(config)?, &args),
        Command::Pending => cmd_pending(&manager(config)?),
        Command::Validate(args) => cmd_validate(&manager(config)?, &args),
    }
}

fn manager(config: &Path) -> Result<CheckpointManager> {
    let cfg = load_config(config)?;
    Ok(CheckpointManager::from_config(&cfg))
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(path, &WaypointConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_inspect(manager: &CheckpointManager, args: &ItemArgs) -> Result<i32> {
    let checkpoint = manager.load(&working_dir(manager, args), &args.item)?;
    let payload = serde_json::to_string_pretty(&checkpoint).context("serialize checkpoint")?;
    println!("{payload}");
    Ok(exit_codes::OK)
}

fn cmd_sync(manager: &CheckpointManager, args: &ItemArgs) -> Result<i32> {
    let dir = working_dir(manager, args);
    let checkpoint = manager.load(&dir, &args.item)?;
    manager.save(&dir, &checkpoint)?;
    println!("{}", checkpoint.phase());
    Ok(exit_codes::OK)
}

fn cmd_check(manager: &CheckpointManager, args: &ItemArgs) -> Result<i32> {
    let checkpoint = manager.load(&working_dir(manager, args), &args.item)?;
    println!("{}", checkpoint.phase());
    let instructions = manager.get_resume_instructions(&checkpoint);
    if !instructions.is_empty() {
        println!("{instructions}");
    }
    Ok(check_exit_code(checkpoint.phase()))
}

fn cmd_settle(manager: &CheckpointManager, args: &ItemArgs, validated: bool) -> Result<i32> {
    let status = manager.settle_item(&working_dir(manager, args), &args.item, validated)?;
    println!("{status}");
    Ok(exit_codes::OK)
}

fn cmd_clear(manager: &CheckpointManager, args: &ItemArgs) -> Result<i32> {
    manager.delete(&working_dir(manager, args))?;
    Ok(exit_codes::OK)
}

fn cmd_pending(manager: &CheckpointManager) -> Result<i32> {
    for item in manager.resumable_items()? {
        println!("{}\t{}", item.item_id, item.phase);
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(manager: &CheckpointManager, args: &ItemArgs) -> Result<i32> {
    let path = manager.get_checkpoint_path(&working_dir(manager, args));
    let checkpoint = decode_sidecar(&path)?;
    if checkpoint.item_id() != args.item {
        bail!(
            "{} belongs to item '{}', not '{}'",
            path.display(),
            checkpoint.item_id(),
            args.item
        );
    }
    let errors = validate_invariants(&checkpoint);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(exit_codes::OK)
}

fn working_dir(manager: &CheckpointManager, args: &ItemArgs) -> PathBuf {
    args.dir
        .clone()
        .unwrap_or_else(|| manager.run_dir(&args.item))
}

fn check_exit_code(phase: Phase) -> i32 {
    match phase {
        Phase::Init => exit_codes::NOTHING_TO_RESUME,
        Phase::Complete => exit_codes::COMPLETE,
        _ => exit_codes::OK,
    }
}
