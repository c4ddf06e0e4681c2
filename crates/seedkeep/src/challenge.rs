//! Challenge-response identification
//!
//! Two parties holding the same master seed prove it to each other without
//! sending it: one side sends a challenge, both derive
//! `derive([shared seed, challenge])` and compare. Either side may issue the
//! challenge. Without one, a challenge is derived from the current time.

use crate::derive::derive;
use crate::error::SeedkeepError;
use crate::registry::SeedRegistry;
use anyhow::{bail, Result};
use chrono::Utc;
use seedkeep_core::format::conjoin;

/// Source of the current time for fresh challenges
pub trait Clock {
    /// Current UTC time as an ISO-8601 string
    fn now_utc(&self) -> String;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> String {
        Utc::now().to_rfc3339()
    }
}

/// A challenge and the response this side expects for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    pub challenge: String,
    pub response: String,
}

/// Answer (or issue) a challenge for the partner sharing `partner`'s seed
///
/// `partner` is the identifier of the account file holding the shared seed.
/// An empty challenge counts as none.
pub fn respond(
    seeds: &SeedRegistry,
    partner: &str,
    challenge: Option<&str>,
    clock: &dyn Clock,
) -> Result<ChallengeResponse> {
    let challenge = match challenge.filter(|c| !c.is_empty()) {
        Some(given) => given.to_string(),
        None => derive(&[clock.now_utc()]),
    };

    let Some(shared_seed) = seeds.get(partner) else {
        bail!(SeedkeepError::UnknownPartner {
            name: partner.to_string(),
            choices: conjoin(&seeds.identifiers()),
        });
    };

    let response = derive(&[shared_seed, challenge.as_str()]);
    Ok(ChallengeResponse {
        challenge,
        response,
    })
}
