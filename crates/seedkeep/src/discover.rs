//! Account discovery
//!
//! Sweeps every account's recognition rules over observed data. Identical
//! (account, script) results are reported once, however many rules found
//! them. One match is returned directly; several go to the chooser.

use crate::account::AccountStore;
use crate::chooser::Chooser;
use crate::error::SeedkeepError;
use crate::title::ObservedData;
use anyhow::{bail, Result};
use std::collections::HashSet;
use tracing::{debug, info};

/// An account recognized for the observed data, with the script to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub account: String,
    pub script: String,
}

/// Deduplicated matches in discovery order, each under a unique label
#[derive(Debug, Default)]
pub struct Matches {
    entries: Vec<(String, Discovery)>,
    seen: HashSet<(String, String)>,
}

impl Matches {
    /// Record a match unless the same account already produced this script
    fn add(&mut self, account: &str, key: Option<&str>, script: String) -> bool {
        if !self.seen.insert((account.to_string(), script.clone())) {
            return false;
        }
        let ident = match key {
            Some(key) => format!("{} ({})", account, key),
            None => account.to_string(),
        };
        let label = format!("{}: {}", self.entries.len(), ident);
        info!("{} matches", label);
        self.entries.push((
            label,
            Discovery {
                account: account.to_string(),
                script,
            },
        ));
        true
    }

    /// Labels sorted for display
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.entries.iter().map(|(l, _)| l.clone()).collect();
        labels.sort();
        labels
    }

    pub fn get(&self, label: &str) -> Option<&Discovery> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, d)| d)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluate every rule of every account, in store order
pub fn collect_matches(
    accounts: &AccountStore,
    data: &ObservedData,
    default_field: &str,
    verbose: bool,
) -> Matches {
    let mut matches = Matches::default();
    for account in accounts.iter() {
        let name = account.name();
        if verbose {
            info!("Trying: {}", name);
        } else {
            debug!("Trying: {}", name);
        }
        for rule in account.rules() {
            if let Some(found) = rule.recognize(data, default_field) {
                matches.add(name, found.key.as_deref(), found.script);
            }
        }
    }
    matches
}

/// Find the account for observed data
///
/// Returns `Ok(None)` when several accounts matched and the chooser was
/// cancelled; no match is ever picked without confirmation.
pub fn discover(
    accounts: &AccountStore,
    data: &ObservedData,
    default_field: &str,
    chooser: &mut dyn Chooser,
    verbose: bool,
) -> Result<Option<Discovery>> {
    info!("Account Discovery ...");
    let matches = collect_matches(accounts, data, default_field, verbose);

    match matches.len() {
        0 => bail!(SeedkeepError::NotFound(
            "cannot find appropriate account.".to_string()
        )),
        1 => Ok(matches.entries.into_iter().next().map(|(_, d)| d)),
        _ => {
            let labels = matches.labels();
            match chooser.choose("Choose Secret", &labels)? {
                Some(choice) => {
                    info!("user selects {}", choice);
                    match matches.get(&choice) {
                        Some(found) => Ok(Some(found.clone())),
                        None => bail!(SeedkeepError::NotFound(format!(
                            "{}: not one of the offered choices",
                            choice
                        ))),
                    }
                }
                None => {
                    info!("selection cancelled");
                    Ok(None)
                }
            }
        }
    }
}
