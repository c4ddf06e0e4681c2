//! The password generator session
//!
//! Loads every configured account file once, in order: each file's master
//! seed goes into the seed registry, its accounts into the account store,
//! and every account not yet owned by a file is given to it. After that the
//! session is read-only; discovery, value lookup and challenge-response all
//! borrow it.

use crate::account::{Account, AccountStore, Field};
use crate::archive::{check_archive, ArchiveStatus};
use crate::challenge::{self, ChallengeResponse, Clock};
use crate::chooser::Chooser;
use crate::config::Settings;
use crate::discover::{self, Discovery};
use crate::error::SeedkeepError;
use crate::registry::SeedRegistry;
use crate::source::SourceFile;
use crate::title::ObservedData;
use anyhow::{bail, Result};
use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::{debug, info};

pub struct Generator {
    settings: Settings,
    seeds: SeedRegistry,
    accounts: AccountStore,
    archive: ArchiveStatus,
}

impl Generator {
    /// Load the account files named in the settings
    pub fn load(settings: Settings) -> Result<Self> {
        let identity = settings.identity_path();
        let mut seeds = SeedRegistry::new();
        let mut accounts = AccountStore::new();

        for path in settings.accounts_paths() {
            let source = SourceFile::new(&path);
            let file_id = source.identifier();
            debug!("loading {} as {}", path.display(), file_id);

            seeds.touch(source.mtime()?);
            let contents = source.open(&identity)?;
            if let Some(seed) = contents.master_seed.as_deref() {
                seeds.insert(&file_id, seed);
            }

            accounts.extend(&file_id, contents.accounts)?;
            let claimed = accounts.assign_seeds(&file_id);
            debug!("{} owns {} accounts", file_id, claimed);
        }
        info!(
            "loaded {} accounts and {} master seeds",
            accounts.len(),
            seeds.len()
        );

        let archive = check_archive(
            settings.archive_path().as_deref(),
            seeds.most_recently_updated(),
            settings.archive_stale,
        );

        Ok(Self {
            settings,
            seeds,
            accounts,
            archive,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn seeds(&self) -> &SeedRegistry {
        &self.seeds
    }

    pub fn archive_status(&self) -> ArchiveStatus {
        self.archive
    }

    fn require_accounts_files(&self) -> Result<()> {
        if self.settings.accounts_files.is_empty() {
            bail!(SeedkeepError::Config(
                "no accounts files configured, run 'seedkeep init'".to_string()
            ));
        }
        Ok(())
    }

    /// Every account, in declaration order
    pub fn all_accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    /// Accounts whose name or an alias contains `target`
    pub fn find_accounts<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Account> {
        self.all_accounts().filter(move |a| a.id_contains(target))
    }

    /// Accounts whose name, aliases or plain fields contain `target`
    pub fn search_accounts<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Account> {
        self.all_accounts()
            .filter(move |a| a.account_contains(target))
    }

    pub fn get_account(&self, name: &str) -> Result<&Account> {
        if name.trim().is_empty() {
            bail!(SeedkeepError::Config("no account specified.".to_string()));
        }
        match self.accounts.get(name) {
            Some(account) => Ok(account),
            None => bail!(SeedkeepError::UnknownAccount(name.to_string())),
        }
    }

    /// Value of an account field, deriving it when it is generated
    pub fn get_value(&self, account: &Account, field: &str) -> Result<String> {
        self.require_accounts_files()?;

        match account.field(field) {
            Some(Field::Plain(value)) => Ok(value.clone()),
            Some(Field::Generated(kind)) => {
                let master_seed = self.master_seed_for(account)?;
                Ok(kind.generate(&[master_seed, account.account_seed(), field]))
            }
            None => bail!(SeedkeepError::NotFound(format!(
                "{}: no field named {}",
                account.name(),
                field
            ))),
        }
    }

    fn master_seed_for(&self, account: &Account) -> Result<&str> {
        let Some(owner) = account.seed_owner() else {
            bail!(SeedkeepError::Config(format!(
                "{}: not assigned to any account file",
                account.name()
            )));
        };
        match self.seeds.get(owner) {
            Some(seed) => Ok(seed),
            None => bail!(SeedkeepError::Config(format!(
                "{}: {} has no master seed",
                account.name(),
                owner
            ))),
        }
    }

    /// Replace `{field}`, `{tab}` and `{return}` in a script
    pub fn expand_script(&self, account: &Account, script: &str) -> Result<String> {
        static FIELD: OnceLock<Regex> = OnceLock::new();
        let re = FIELD.get_or_init(|| Regex::new(r"\{([\w-]+)\}").expect("field pattern compiles"));

        let mut error = None;
        let expanded = re.replace_all(script, |caps: &Captures| match &caps[1] {
            "tab" => "\t".to_string(),
            "return" => "\n".to_string(),
            name => match self.get_value(account, name) {
                Ok(value) => value,
                Err(e) => {
                    error.get_or_insert(e);
                    String::new()
                }
            },
        });

        match error {
            Some(e) => Err(e),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Identify the account for observed data
    ///
    /// `Ok(None)` means the user cancelled the choice between several matches.
    pub fn discover_account(
        &self,
        data: &ObservedData,
        chooser: &mut dyn Chooser,
        verbose: bool,
    ) -> Result<Option<Discovery>> {
        self.require_accounts_files()?;
        let verbose = verbose || self.settings.verbose;
        discover::discover(
            &self.accounts,
            data,
            &self.settings.default_field,
            chooser,
            verbose,
        )
    }

    /// Generate a response to a challenge from the partner sharing `name`'s seed
    pub fn challenge_response(
        &self,
        name: &str,
        challenge: Option<&str>,
        clock: &dyn Clock,
    ) -> Result<ChallengeResponse> {
        self.require_accounts_files()?;
        challenge::respond(&self.seeds, name, challenge, clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::SystemClock;
    use crate::derive::SecretKind;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct NeverChoose;

    impl Chooser for NeverChoose {
        fn choose(&mut self, _prompt: &str, _labels: &[String]) -> Result<Option<String>> {
            panic!("chooser should not be consulted");
        }
    }

    const PERSONAL: &str = r#"
master_seed: personal-seed
accounts:
  - name: bank
    aliases: [chase]
    fields:
      username: alice
      passcode:
        password:
          length: 16
    discovery:
      - url: ["https://bank.example.com/login"]
        script: "{username}{tab}{passcode}{return}"
  - name: mail
    fields:
      email: alice@example.com
      passcode:
        passphrase: {}
"#;

    const SHARED: &str = r#"
master_seed: shared-seed
accounts:
  - name: team-wiki
    fields:
      passcode:
        pin:
          length: 6
    discovery:
      - host: [wiki.example.com]
"#;

    const NO_SEED: &str = r#"
accounts:
  - name: kiosk
    fields:
      passcode:
        pin: {}
"#;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn session(files: &[(&str, &str)]) -> (Generator, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::in_dir(temp.path());
        for (name, content) in files {
            write(temp.path(), name, content);
            settings.accounts_files.push(name.to_string());
        }
        (Generator::load(settings).unwrap(), temp)
    }

    #[test]
    fn test_load_assigns_owners() {
        let (gen, _temp) = session(&[
            ("personal.yaml", PERSONAL),
            ("shared.yaml", SHARED),
            ("kiosk.yaml", NO_SEED),
        ]);

        assert_eq!(gen.seeds().identifiers(), vec!["personal", "shared"]);
        assert_eq!(gen.get_account("bank").unwrap().seed_owner(), Some("personal"));
        assert_eq!(gen.get_account("team-wiki").unwrap().seed_owner(), Some("shared"));
        assert_eq!(gen.get_account("kiosk").unwrap().seed_owner(), Some("kiosk"));
        assert!(gen.seeds().most_recently_updated().is_some());
        assert_eq!(gen.archive_status(), ArchiveStatus::NotConfigured);
    }

    #[test]
    fn test_first_file_wins_for_identifier() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("other")).unwrap();
        write(temp.path(), "team.yaml", "master_seed: first\n");
        write(&temp.path().join("other"), "team.yaml", "master_seed: second\n");

        let mut settings = Settings::in_dir(temp.path());
        settings.accounts_files = vec!["team.yaml".to_string(), "other/team.yaml".to_string()];
        let gen = Generator::load(settings).unwrap();
        assert_eq!(gen.seeds().get("team"), Some("first"));
    }

    #[test]
    fn test_dotted_names_keep_own_seeds() {
        let (gen, _temp) = session(&[
            ("team.v1.yaml", "master_seed: first\naccounts:\n  - name: old-wiki\n"),
            ("team.v2.yaml", "master_seed: second\naccounts:\n  - name: new-wiki\n"),
        ]);

        assert_eq!(gen.seeds().identifiers(), vec!["team.v1", "team.v2"]);
        assert_eq!(gen.seeds().get("team.v1"), Some("first"));
        assert_eq!(gen.seeds().get("team.v2"), Some("second"));
        assert_eq!(gen.get_account("new-wiki").unwrap().seed_owner(), Some("team.v2"));

        let v1 = gen.challenge_response("team.v1", Some("c"), &SystemClock).unwrap();
        let v2 = gen.challenge_response("team.v2", Some("c"), &SystemClock).unwrap();
        assert_ne!(v1.response, v2.response);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::in_dir(temp.path());
        settings.accounts_files.push("gone.yaml".to_string());
        let err = Generator::load(settings).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Io { .. })
        ));
    }

    #[test]
    fn test_duplicate_account_across_files() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.yaml", "accounts:\n  - name: bank\n");
        write(temp.path(), "b.yaml", "accounts:\n  - name: bank\n");
        let mut settings = Settings::in_dir(temp.path());
        settings.accounts_files = vec!["a.yaml".to_string(), "b.yaml".to_string()];
        let err = Generator::load(settings).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Config(_))
        ));
    }

    #[test]
    fn test_values_are_stable() {
        let (gen, _temp) = session(&[("personal.yaml", PERSONAL)]);
        let bank = gen.get_account("chase").unwrap();

        assert_eq!(gen.get_value(bank, "username").unwrap(), "alice");
        let passcode = gen.get_value(bank, "passcode").unwrap();
        assert_eq!(passcode.len(), 16);
        assert_eq!(
            passcode,
            SecretKind::Password {
                length: 16,
                alphabet: None
            }
            .generate(&["personal-seed", "bank", "passcode"])
        );

        let (again, _temp2) = session(&[("personal.yaml", PERSONAL)]);
        let bank2 = again.get_account("bank").unwrap();
        assert_eq!(again.get_value(bank2, "passcode").unwrap(), passcode);
    }

    #[test]
    fn test_value_without_seed() {
        let (gen, _temp) = session(&[("kiosk.yaml", NO_SEED)]);
        let kiosk = gen.get_account("kiosk").unwrap();
        let err = gen.get_value(kiosk, "passcode").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_account_and_field() {
        let (gen, _temp) = session(&[("personal.yaml", PERSONAL)]);
        assert!(matches!(
            gen.get_account("nope").unwrap_err().downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::UnknownAccount(_))
        ));
        let mail = gen.get_account("mail").unwrap();
        assert!(matches!(
            gen.get_value(mail, "pin").unwrap_err().downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::NotFound(_))
        ));
    }

    #[test]
    fn test_expand_script() {
        let (gen, _temp) = session(&[("personal.yaml", PERSONAL)]);
        let bank = gen.get_account("bank").unwrap();
        let passcode = gen.get_value(bank, "passcode").unwrap();

        let typed = gen
            .expand_script(bank, "{username}{tab}{passcode}{return}")
            .unwrap();
        assert_eq!(typed, format!("alice\t{}\n", passcode));
        assert!(gen.expand_script(bank, "{nope}").is_err());
    }

    #[test]
    fn test_discovery_from_title() {
        let (gen, _temp) = session(&[("personal.yaml", PERSONAL), ("shared.yaml", SHARED)]);
        let data = ObservedData::from_title("Sign in - https://bank.example.com/login - Firefox");

        let found = gen
            .discover_account(&data, &mut NeverChoose, false)
            .unwrap()
            .unwrap();
        assert_eq!(found.account, "bank");
        assert_eq!(found.script, "{username}{tab}{passcode}{return}");

        let wiki = ObservedData::from_title("Home - https://wiki.example.com/ - Firefox");
        let found = gen
            .discover_account(&wiki, &mut NeverChoose, true)
            .unwrap()
            .unwrap();
        assert_eq!(found.account, "team-wiki");
        assert_eq!(found.script, "{passcode}");
    }

    #[test]
    fn test_find_and_search() {
        let (gen, _temp) = session(&[("personal.yaml", PERSONAL), ("shared.yaml", SHARED)]);
        let found: Vec<_> = gen.find_accounts("a").map(|a| a.name()).collect();
        assert_eq!(found, vec!["bank", "mail", "team-wiki"]);

        let found: Vec<_> = gen.find_accounts("example").map(|a| a.name()).collect();
        assert!(found.is_empty());
        let found: Vec<_> = gen.search_accounts("example").map(|a| a.name()).collect();
        assert_eq!(found, vec!["mail"]);
    }

    #[test]
    fn test_challenge_response_through_session() {
        let (gen, _temp) = session(&[("personal.yaml", PERSONAL), ("shared.yaml", SHARED)]);
        let a = gen
            .challenge_response("shared", Some("fixed"), &SystemClock)
            .unwrap();
        let b = gen
            .challenge_response("shared", Some("fixed"), &SystemClock)
            .unwrap();
        assert_eq!(a, b);
        assert!(gen
            .challenge_response("personal-ish", Some("fixed"), &SystemClock)
            .is_err());
    }

    #[test]
    fn test_no_accounts_files_configured() {
        let temp = TempDir::new().unwrap();
        let gen = Generator::load(Settings::in_dir(temp.path())).unwrap();
        let err = gen
            .challenge_response("anyone", Some("c"), &SystemClock)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Config(_))
        ));
        assert!(gen
            .discover_account(&ObservedData::default(), &mut NeverChoose, false)
            .is_err());
    }
}
