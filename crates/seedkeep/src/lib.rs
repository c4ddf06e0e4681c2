//! seedkeep - Deterministic secrets from long-lived master seeds
//!
//! "Remember one seed, recover every password."
//!
//! Account files declare accounts and, optionally, a master seed shared by
//! every account in the file. Generated fields are derived from the seed,
//! the account and the field name, so nothing but the seed needs keeping.
//!
//! On top of that:
//! - discovery: recognize which account a window title or URL belongs to
//! - challenge-response: prove to a partner holding the same seed that you
//!   have it, without sending it
//!
//! Account files may be age-encrypted (X25519 + ChaCha20-Poly1305).

pub mod account;
pub mod archive;
pub mod challenge;
pub mod chooser;
pub mod config;
pub mod derive;
pub mod discover;
pub mod error;
pub mod generator;
pub mod recognize;
pub mod registry;
pub mod setup;
pub mod source;
pub mod title;

pub use account::{Account, AccountSpec, AccountStore, Field};
pub use challenge::{ChallengeResponse, Clock, SystemClock};
pub use chooser::{Chooser, TerminalChooser};
pub use config::Settings;
pub use derive::{derive, SecretKind};
pub use discover::Discovery;
pub use error::SeedkeepError;
pub use generator::Generator;
pub use recognize::{Matcher, RecognitionRule};
pub use registry::SeedRegistry;
pub use title::ObservedData;
