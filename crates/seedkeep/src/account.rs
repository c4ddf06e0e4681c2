//! Accounts and the account store
//!
//! Accounts are declared in account files. Each one lists plain fields
//! (username, email, ...) and generated fields whose values are derived
//! from the master seed of the file that owns the account.

use crate::derive::SecretKind;
use crate::error::SeedkeepError;
use crate::recognize::RecognitionRule;
use anyhow::{bail, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// An account as declared in an account file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Replaces the name as derivation seed, so renaming keeps secrets stable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,

    #[serde(default)]
    pub fields: BTreeMap<String, Field>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discovery: Vec<RecognitionRule>,
}

/// A field value: literal text or a secret generated from seeds
///
/// Plain values may be written as any YAML scalar; `pin: 1234` reads as "1234".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Plain(#[serde(deserialize_with = "scalar_string")] String),
    Generated(SecretKind),
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct ScalarVisitor;

    impl<'de> Visitor<'de> for ScalarVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, number or boolean")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}

/// An account in the store, with the file it was assigned to
#[derive(Debug, Clone)]
pub struct Account {
    spec: AccountSpec,
    declared_in: String,
    seed_owner: Option<String>,
}

impl Account {
    pub fn new(spec: AccountSpec, declared_in: impl Into<String>) -> Self {
        Self {
            spec,
            declared_in: declared_in.into(),
            seed_owner: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.spec.aliases
    }

    /// Identifier of the file that declared this account
    pub fn declared_in(&self) -> &str {
        &self.declared_in
    }

    /// Identifier of the file whose master seed this account uses
    pub fn seed_owner(&self) -> Option<&str> {
        self.seed_owner.as_deref()
    }

    /// Seed naming this account in derivations
    pub fn account_seed(&self) -> &str {
        self.spec.seed.as_deref().unwrap_or(&self.spec.name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.spec.fields.get(name)
    }

    pub fn rules(&self) -> &[RecognitionRule] {
        &self.spec.discovery
    }

    /// Name or any alias equals `name`, ignoring case
    pub fn is_called(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.names().any(|n| n.to_lowercase() == name)
    }

    /// Name or any alias contains `text`, ignoring case
    pub fn id_contains(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.names().any(|n| n.to_lowercase().contains(&text))
    }

    /// Like `id_contains`, but also looks inside plain field values
    pub fn account_contains(&self, text: &str) -> bool {
        if self.id_contains(text) {
            return true;
        }
        let text = text.to_lowercase();
        self.spec.fields.values().any(|f| match f {
            Field::Plain(value) => value.to_lowercase().contains(&text),
            Field::Generated(_) => false,
        })
    }

    fn names(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.spec.name).chain(self.spec.aliases.iter())
    }

    /// Assign the seed owner unless one is already set; returns whether it changed
    fn claim(&mut self, file_id: &str) -> bool {
        if self.seed_owner.is_some() {
            return false;
        }
        self.seed_owner = Some(file_id.to_string());
        true
    }
}

/// Ordered collection of every declared account
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: Vec<Account>,
    /// lowercased name or alias -> index
    index: HashMap<String, usize>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add accounts declared in one file, validating their rules
    ///
    /// Names and aliases must be unique across all files.
    pub fn extend(&mut self, file_id: &str, specs: Vec<AccountSpec>) -> Result<()> {
        for spec in specs {
            if spec.name.trim().is_empty() {
                bail!(SeedkeepError::Config(format!(
                    "{}: account with an empty name",
                    file_id
                )));
            }
            for rule in &spec.discovery {
                rule.validate().map_err(|e| {
                    SeedkeepError::Config(format!("{}: account {}: {}", file_id, spec.name, e))
                })?;
            }

            let position = self.accounts.len();
            let account = Account::new(spec, file_id);
            for name in account.names() {
                let key = name.to_lowercase();
                if let Some(&existing) = self.index.get(&key) {
                    let other = &self.accounts[existing];
                    bail!(SeedkeepError::Config(format!(
                        "duplicate account name '{}' in {} (already declared by {} in {})",
                        name,
                        file_id,
                        other.name(),
                        other.declared_in()
                    )));
                }
            }
            for name in account.names() {
                self.index.insert(name.to_lowercase(), position);
            }
            self.accounts.push(account);
        }
        Ok(())
    }

    /// Give every account without a seed owner to `file_id`
    ///
    /// Already assigned accounts are left alone, so running this once per
    /// loaded file, in load order, gives each account to the first file
    /// processed after it was declared, and running it again changes nothing.
    /// Returns how many accounts this pass claimed.
    pub fn assign_seeds(&mut self, file_id: &str) -> usize {
        let mut claimed = 0;
        for account in &mut self.accounts {
            if account.claim(file_id) {
                debug!("{} uses the seed of {}", account.name(), file_id);
                claimed += 1;
            }
        }
        claimed
    }

    /// Look up by name or alias, ignoring case
    pub fn get(&self, name: &str) -> Option<&Account> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.accounts[i])
    }

    /// Every account, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
