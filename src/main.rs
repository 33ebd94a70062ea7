use anyhow::Result;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use starmirror::config::parse_accounts;
use starmirror::sync::{create_sync_engine, EXIT_OK};
use starmirror::{Config, PageSize, SyncResult, SyncSummary};

/// Exit status for configuration and startup errors
const EXIT_CONFIG_ERROR: i32 = 2;

/// Flags that also accept the single-dash spelling (`-users=a,b`)
const LEGACY_FLAGS: [&str; 3] = ["users", "output", "maxrepo"];

#[derive(Parser, Debug)]
#[command(name = "starmirror")]
#[command(about = "Mirror the starred repositories of GitHub accounts to local disk")]
#[command(version)]
struct Cli {
    /// User or organisation comma separated list
    #[arg(long)]
    users: Option<String>,

    /// Local folder to save repositories [default: repos]
    #[arg(long)]
    output: Option<String>,

    /// Repositories per listing page, 1-100 [default: 100]
    #[arg(long)]
    maxrepo: Option<String>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List what would be cloned without cloning anything
    #[arg(long)]
    dry_run: bool,

    /// Clones to run at once within a page
    #[arg(long)]
    parallel: Option<usize>,

    /// Retries for a failed listing request
    #[arg(long)]
    retries: Option<usize>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args_os()));

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_CONFIG_ERROR
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli)?;

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(EXIT_OK);
    }

    init_logging(cli.verbose, &config.logging.level);
    info!("Starting starmirror v{}", env!("CARGO_PKG_VERSION"));

    if config.accounts.is_empty() {
        warn!("No accounts to mirror; pass --users <name>[,<name>...]");
        return Ok(EXIT_OK);
    }

    let engine = create_sync_engine(&config)?.with_dry_run(cli.dry_run);

    let summary = engine.run(&config.accounts).await;
    print_summary(&summary, cli.dry_run);

    Ok(summary.exit_code())
}

/// Rewrite `-users`, `-output` and `-maxrepo` to their double-dash form
fn normalize_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;

    args.into_iter()
        .enumerate()
        .map(|(position, arg)| {
            if position == 0 || passthrough {
                return arg;
            }
            if arg == "--" {
                passthrough = true;
                return arg;
            }

            let rewritten = arg.to_str().and_then(|text| {
                let rest = text.strip_prefix('-')?;
                let name = rest.split('=').next()?;
                LEGACY_FLAGS
                    .contains(&name)
                    .then(|| OsString::from(format!("-{}", text)))
            });

            rewritten.unwrap_or(arg)
        })
        .collect()
}

/// Initialize logging; RUST_LOG wins, then --verbose, then the configured level
fn init_logging(verbose: bool, level: &str) {
    let default_level = if verbose { "debug" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Command-line flags take precedence over the config file
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(users) = &cli.users {
        config.accounts = parse_accounts(users);
    } else {
        let listed = config.accounts.join(",");
        config.accounts = parse_accounts(&listed);
    }

    if let Some(output) = &cli.output {
        config.output_directory = output.clone();
        config.expand_paths()?;
    }

    if let Some(maxrepo) = &cli.maxrepo {
        config.listing.per_page = PageSize::parse_lenient(maxrepo).get();
    }

    if let Some(parallel) = cli.parallel {
        config.mirror.max_parallel = parallel.max(1);
    }

    if let Some(retries) = cli.retries {
        config.retry.max_retries = retries;
    }

    Ok(())
}

fn print_summary(summary: &SyncSummary, dry_run: bool) {
    println!();
    if dry_run {
        println!("🔍 Dry run complete");
    } else {
        println!("🎉 Mirroring complete");
    }
    println!("   📊 Accounts: {}", summary.accounts.len());
    println!("   📁 Repositories: {}", summary.total_repositories);
    if dry_run {
        println!("   📥 Would clone: {}", summary.would_clone);
    } else {
        println!("   📥 Cloned: {}", summary.cloned);
    }
    println!("   ⏭️  Already mirrored: {}", summary.already_mirrored);
    println!("   📖 Wikis mirrored: {}", summary.wikis_mirrored);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⚠️  Aborted accounts: {}", summary.aborted_accounts);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed > 0 {
        println!("\n🔍 Failed repositories:");
        for report in summary.failures() {
            if let SyncResult::Failed { error, .. } = &report.result {
                println!("   ❌ {}: {}", report.full_name, error);
            }
        }
    }

    for account in summary.accounts.iter().filter(|a| a.aborted()) {
        println!(
            "   ⚠️  {}: {}",
            account.account,
            account.error.as_deref().unwrap_or("enumeration aborted")
        );
    }
}
