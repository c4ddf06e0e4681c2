//! Creating settings and account files

use crate::config::Settings;
use crate::derive::random_seed;
use crate::error::SeedkeepError;
use crate::source::{generate_identity, SourceFile};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Length of freshly generated master seeds
pub const MASTER_SEED_LENGTH: usize = 72;

/// Default name of the first account file
pub const DEFAULT_ACCOUNTS_FILE: &str = "accounts.yaml.age";

/// Initial contents of a new account file
pub fn accounts_file_template(master_seed: &str) -> String {
    format!(
        r#"# seedkeep account file
#
# Every generated field of the accounts below is derived from this seed.
# Do not change it once accounts are in use.
master_seed: "{}"

accounts: []
# Example:
#  - name: example
#    aliases: [ex]
#    fields:
#      username: me
#      passcode:
#        passphrase:
#          words: 4
#    discovery:
#      - url: ["https://example.com/login"]
#        script: "{{username}}{{tab}}{{passcode}}{{return}}"
"#,
        master_seed
    )
}

/// Create an account file with a fresh seed and register it in the settings
///
/// Refuses to overwrite an existing file, and requires recipients for
/// encrypted files. The settings file is rewritten with the new entry last,
/// so the order of existing files is kept.
pub fn new_accounts_file(
    settings: &mut Settings,
    settings_path: &Path,
    filename: &str,
) -> Result<PathBuf> {
    let path = settings.resolve(filename);
    let source = SourceFile::new(&path);
    if source.exists() {
        bail!(SeedkeepError::Exists(path));
    }
    if source.is_encrypted() && settings.recipients.is_empty() {
        bail!(SeedkeepError::Config(
            "recipients are required for encrypted account files".to_string()
        ));
    }

    let seed = random_seed(MASTER_SEED_LENGTH);
    info!("creating accounts file {}", path.display());
    source.create(&accounts_file_template(&seed), &settings.recipients)?;

    settings.accounts_files.push(filename.to_string());
    settings.validate()?;
    settings.save_to(settings_path)?;

    Ok(path)
}

/// What `initialize` created
#[derive(Debug, Default)]
pub struct Initialized {
    pub public_key: Option<String>,
    pub settings_created: bool,
    pub accounts_file: Option<PathBuf>,
}

/// Create the identity, settings and first account file when missing
pub fn initialize(settings_path: &Path, settings_dir: &Path) -> Result<Initialized> {
    let mut done = Initialized::default();

    let mut settings = if settings_path.exists() {
        Settings::load_from(settings_path)?
    } else {
        done.settings_created = true;
        Settings::in_dir(settings_dir)
    };

    if settings.recipients.is_empty() {
        let public_key = generate_identity(&settings.identity_path())?;
        info!("identity public key {}", public_key);
        settings.recipients.push(public_key.clone());
        done.public_key = Some(public_key);
    }

    if settings.accounts_files.is_empty() {
        let path = new_accounts_file(&mut settings, settings_path, DEFAULT_ACCOUNTS_FILE)?;
        done.accounts_file = Some(path);
    } else {
        settings.save_to(settings_path)?;
    }

    Ok(done)
}
