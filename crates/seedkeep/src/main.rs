//! seedkeep - Deterministic secrets from long-lived master seeds
//!
//! Commands:
//! - value [ACCOUNT] [FIELD]: Print a field, or discover the account from the window title
//! - identity NAME [CHALLENGE]: Challenge-response with a partner sharing a seed
//! - find TEXT: Accounts whose name or alias contains TEXT
//! - search TEXT: Accounts whose name, aliases or plain fields contain TEXT
//! - accounts: List all accounts
//! - new FILE: Create a new account file with a fresh master seed
//! - init: Create identity, settings and the first account file

use anyhow::Result;
use clap::{Parser, Subcommand};
use seedkeep::setup::{initialize, new_accounts_file};
use seedkeep::{Account, Generator, ObservedData, Settings, SystemClock, TerminalChooser};
use seedkeep_core::{format, Paths};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seedkeep")]
#[command(about = "Deterministic secrets from long-lived master seeds")]
#[command(version)]
#[command(after_help = r#"ACCOUNT FILES:
    YAML files listed under accounts_files in ~/.config/seedkeep/config.yaml.
    Names ending in .age are encrypted with age to the configured recipients.

SECURITY:
    - Generated values are derived from the master seed, never stored
    - identity only ever prints a challenge and a response, never the seed"#)]
struct Cli {
    /// Log every account tried during discovery
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: ~/.config/seedkeep/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an account field, or discover the account and print its script
    Value {
        /// Account name or alias (omit to discover from the window title)
        account: Option<String>,
        /// Field name (default: the default_field setting)
        field: Option<String>,
        /// Window title to recognize instead of the active window
        #[arg(long)]
        title: Option<String>,
        /// Don't print trailing newline (useful for piping)
        #[arg(short = 'n')]
        no_newline: bool,
    },

    /// Answer or issue a challenge for a partner sharing a master seed
    Identity {
        /// Identifier of the account file holding the shared seed
        name: String,
        /// Challenge received (omit to issue a new one)
        challenge: Option<String>,
    },

    /// List accounts whose name or alias contains TEXT
    Find {
        text: String,
        #[arg(long)]
        json: bool,
    },

    /// List accounts whose name, aliases or plain fields contain TEXT
    Search {
        text: String,
        #[arg(long)]
        json: bool,
    },

    /// List all accounts and the file whose seed each uses
    Accounts {
        #[arg(long)]
        json: bool,
    },

    /// Create a new account file with a fresh master seed
    New {
        /// File name, relative to the settings directory (.age to encrypt)
        file: String,
    },

    /// Create identity key, settings and the first account file
    Init,
}

#[derive(Serialize)]
struct AccountSummary<'a> {
    name: &'a str,
    aliases: &'a [String],
    file: &'a str,
    seed_owner: Option<&'a str>,
}

impl<'a> From<&'a Account> for AccountSummary<'a> {
    fn from(account: &'a Account) -> Self {
        Self {
            name: account.name(),
            aliases: account.aliases(),
            file: account.declared_in(),
            seed_owner: account.seed_owner(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = Paths::new();
    let settings_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let settings = Settings::load_from(&settings_path)?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_level(cli.verbose, &settings))),
        )
        .with_writer(std::io::stderr)
        .init();

    let verbose = cli.verbose || settings.verbose;
    match cli.command {
        Commands::Value {
            account,
            field,
            title,
            no_newline,
        } => cmd_value(
            &Generator::load(settings)?,
            account.as_deref(),
            field.as_deref(),
            title.as_deref(),
            no_newline,
            verbose,
        ),
        Commands::Identity { name, challenge } => {
            cmd_identity(&Generator::load(settings)?, &name, challenge.as_deref())
        }
        Commands::Find { text, json } => {
            let generator = Generator::load(settings)?;
            let found: Vec<&Account> = generator.find_accounts(&text).collect();
            print_accounts(found, json)
        }
        Commands::Search { text, json } => {
            let generator = Generator::load(settings)?;
            let found: Vec<&Account> = generator.search_accounts(&text).collect();
            print_accounts(found, json)
        }
        Commands::Accounts { json } => cmd_accounts(&Generator::load(settings)?, json),
        Commands::New { file } => cmd_new(settings, &settings_path, &file),
        Commands::Init => cmd_init(&settings_path, &paths.config),
    }
}

/// Fallback filter when RUST_LOG is unset; `-v` or `verbose: true` shows discovery progress
fn default_log_level(cli_verbose: bool, settings: &Settings) -> &'static str {
    if cli_verbose || settings.verbose {
        "info"
    } else {
        "warn"
    }
}

/// Print a field value, or the expanded script of a discovered account
fn cmd_value(
    generator: &Generator,
    account: Option<&str>,
    field: Option<&str>,
    title: Option<&str>,
    no_newline: bool,
    verbose: bool,
) -> Result<()> {
    let output = match account {
        Some(name) => {
            let account = generator.get_account(name)?;
            let field = field.unwrap_or(generator.settings().default_field.as_str());
            generator.get_value(account, field)?
        }
        None => {
            let data = ObservedData::capture(title);
            let mut chooser = TerminalChooser::new();
            match generator.discover_account(&data, &mut chooser, verbose)? {
                Some(found) => {
                    let account = generator.get_account(&found.account)?;
                    generator.expand_script(account, &found.script)?
                }
                None => {
                    eprintln!("No account selected");
                    return Ok(());
                }
            }
        }
    };

    if no_newline {
        print!("{}", output);
    } else {
        println!("{}", output);
    }

    Ok(())
}

/// Challenge-response
fn cmd_identity(generator: &Generator, name: &str, challenge: Option<&str>) -> Result<()> {
    let result = generator.challenge_response(name, challenge, &SystemClock)?;
    println!("challenge: {}", result.challenge);
    println!("response: {}", result.response);
    Ok(())
}

fn cmd_accounts(generator: &Generator, json: bool) -> Result<()> {
    let accounts: Vec<&Account> = generator.all_accounts().collect();
    print_accounts(accounts, json)?;

    if !json {
        if let Some(updated) = generator.seeds().most_recently_updated() {
            println!();
            println!("Account files last changed {}", format::relative_time(updated));
        }
    }

    Ok(())
}

fn print_accounts(accounts: Vec<&Account>, json: bool) -> Result<()> {
    if json {
        let summaries: Vec<AccountSummary> = accounts.iter().map(|a| (*a).into()).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if accounts.is_empty() {
        println!("No matching accounts.");
        return Ok(());
    }

    for account in accounts {
        let aliases = if account.aliases().is_empty() {
            String::new()
        } else {
            format!(" (aka {})", account.aliases().join(", "))
        };
        let owner = account.seed_owner().unwrap_or("-");
        println!("  {}{}  [{}]", account.name(), aliases, owner);
    }

    Ok(())
}

/// Create a new account file
fn cmd_new(mut settings: Settings, settings_path: &Path, file: &str) -> Result<()> {
    let path = new_accounts_file(&mut settings, settings_path, file)?;
    println!("success: Created {}", path.display());
    println!("Add accounts to it, it is already listed in {}", settings_path.display());
    Ok(())
}

/// Initialize identity, settings and the first account file
fn cmd_init(settings_path: &Path, settings_dir: &Path) -> Result<()> {
    let done = initialize(settings_path, settings_dir)?;

    if done.settings_created {
        println!("success: Created {}", settings_path.display());
    }
    if let Some(key) = done.public_key {
        println!("Your public key (account files are encrypted to it):");
        println!("  {}", key);
    }
    match done.accounts_file {
        Some(path) => println!("success: Created {}", path.display()),
        None => println!("warning: Already initialized"),
    }

    Ok(())
}
