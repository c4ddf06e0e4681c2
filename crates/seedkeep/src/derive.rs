//! Derivation primitive
//!
//! Turns an ordered list of seed strings into a reproducible secret. The
//! seeds are hashed with SHA-512 and the digest is consumed as a stream of
//! 16-bit indices into a word list or alphabet. Nothing here is random
//! except `random_seed`, which only manufactures new master seeds.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

/// Words used for passphrases
const WORDS: &[&str] = &[
    "acid", "acorn", "actor", "adobe", "agent", "alarm", "album", "alley", "amber", "anchor",
    "angle", "ankle", "apple", "apron", "arena", "armor", "arrow", "aspen", "atlas", "attic",
    "badge", "bagel", "baker", "bamboo", "banjo", "barn", "basil", "beach", "beard", "bench",
    "berry", "bison", "blade", "blaze", "bloom", "board", "bonus", "boot", "brick", "bridge",
    "brook", "brush", "bucket", "bugle", "cabin", "cable", "camel", "candle", "canoe", "canyon",
    "cargo", "carpet", "cedar", "chalk", "charm", "cherry", "chess", "chimney", "cider", "cinder",
    "clay", "cliff", "clock", "cloud", "clover", "cobalt", "comet", "coral", "cotton", "crane",
    "crater", "creek", "crown", "cupola", "daisy", "dart", "delta", "denim", "desert", "dial",
    "diner", "dingo", "dock", "dome", "donkey", "dragon", "drum", "dune", "eagle", "easel",
    "echo", "elbow", "elm", "ember", "engine", "falcon", "fable", "feather", "fern", "ferry",
    "fiddle", "field", "fig", "flame", "flint", "flute", "forest", "fossil", "fox", "frost",
    "gable", "garden", "garlic", "gecko", "geyser", "ginger", "glacier", "globe", "goose", "granite",
    "grape", "gravel", "grove", "guitar", "gull", "hammer", "harbor", "harp", "hazel", "helmet",
    "heron", "hickory", "honey", "hornet", "husky", "igloo", "index", "iris", "island", "ivory",
    "jacket", "jasmine", "jelly", "jigsaw", "juniper", "kayak", "kernel", "kettle", "kiwi", "koala",
    "ladder", "lagoon", "lantern", "larch", "lemon", "lever", "lilac", "linen", "lizard", "lobster",
    "locket", "lotus", "lumber", "magnet", "mango", "maple", "marble", "meadow", "melon", "mesa",
    "meteor", "mint", "mitten", "moose", "mortar", "moss", "muffin", "nectar", "needle", "nickel",
    "nutmeg", "oasis", "ocean", "olive", "onion", "orbit", "orchid", "otter", "oyster", "paddle",
    "panda", "paper", "parrot", "pebble", "pepper", "piano", "pilot", "pine", "planet", "plum",
    "pocket", "pond", "poplar", "prairie", "prism", "puffin", "quail", "quartz", "quill", "rabbit",
    "radar", "raft", "raven", "reef", "ribbon", "ridge", "river", "robin", "rocket", "saddle",
    "salmon", "satin", "scarf", "shell", "silver", "sketch", "slate", "sparrow", "spruce", "stone",
    "summit", "sunset", "tablet", "thistle", "thunder", "timber", "tulip", "tundra", "turtle", "umber",
    "valley", "velvet", "violet", "walnut", "willow", "yarrow",
];

const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DIGITS: &str = "0123456789";

fn default_words() -> usize {
    4
}

fn default_password_length() -> usize {
    12
}

fn default_pin_length() -> usize {
    4
}

/// How a generated account field turns its seeds into text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretKind {
    /// Space separated words
    Passphrase {
        #[serde(default = "default_words")]
        words: usize,
    },
    /// Characters drawn from an alphabet (alphanumeric unless given)
    Password {
        #[serde(default = "default_password_length")]
        length: usize,
        #[serde(default)]
        alphabet: Option<String>,
    },
    /// Decimal digits
    Pin {
        #[serde(default = "default_pin_length")]
        length: usize,
    },
}

impl Default for SecretKind {
    fn default() -> Self {
        SecretKind::Passphrase {
            words: default_words(),
        }
    }
}

impl SecretKind {
    /// Generate the secret for an ordered list of seeds
    pub fn generate<S: AsRef<str>>(&self, seeds: &[S]) -> String {
        let mut indices = IndexStream::new(seeds);
        match self {
            SecretKind::Passphrase { words } => (0..*words)
                .map(|_| WORDS[indices.next_index(WORDS.len())])
                .collect::<Vec<_>>()
                .join(" "),
            SecretKind::Password { length, alphabet } => {
                let alphabet: Vec<char> = alphabet
                    .as_deref()
                    .filter(|a| !a.is_empty())
                    .unwrap_or(ALPHANUMERIC)
                    .chars()
                    .collect();
                pick(&mut indices, &alphabet, *length)
            }
            SecretKind::Pin { length } => {
                let digits: Vec<char> = DIGITS.chars().collect();
                pick(&mut indices, &digits, *length)
            }
        }
    }
}

fn pick(indices: &mut IndexStream, alphabet: &[char], length: usize) -> String {
    (0..length)
        .map(|_| alphabet[indices.next_index(alphabet.len())])
        .collect()
}

/// The default derivation: a four word passphrase
pub fn derive<S: AsRef<str>>(seeds: &[S]) -> String {
    SecretKind::default().generate(seeds)
}

/// A fresh alphanumeric master seed from the OS-seeded thread RNG
pub fn random_seed(length: usize) -> String {
    let alphabet: Vec<char> = ALPHANUMERIC.chars().collect();
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// Endless stream of indices drawn from the seeds' digest
struct IndexStream {
    digest: Vec<u8>,
    pos: usize,
}

impl IndexStream {
    fn new<S: AsRef<str>>(seeds: &[S]) -> Self {
        let mut hasher = Sha512::new();
        for seed in seeds {
            hasher.update(seed.as_ref().as_bytes());
            // separator keeps ["ab", "c"] and ["a", "bc"] apart
            hasher.update([0u8]);
        }
        Self {
            digest: hasher.finalize().to_vec(),
            pos: 0,
        }
    }

    fn next_index(&mut self, modulus: usize) -> usize {
        if self.pos + 2 > self.digest.len() {
            self.digest = Sha512::digest(&self.digest).to_vec();
            self.pos = 0;
        }
        let value = u16::from_be_bytes([self.digest[self.pos], self.digest[self.pos + 1]]);
        self.pos += 2;
        value as usize % modulus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive(&["s3cr3t-seed-alice", "fixed-challenge-123"]);
        let b = derive(&["s3cr3t-seed-alice", "fixed-challenge-123"]);
        assert_eq!(a, b);
        assert_eq!(a.split(' ').count(), 4);
    }

    #[test]
    fn test_seed_boundaries_matter() {
        assert_ne!(derive(&["ab", "c"]), derive(&["a", "bc"]));
        assert_ne!(derive(&["seed", "one"]), derive(&["seed", "two"]));
    }

    #[test]
    fn test_password_length_and_alphabet() {
        let kind = SecretKind::Password {
            length: 20,
            alphabet: Some("xyz".to_string()),
        };
        let pw = kind.generate(&["seed"]);
        assert_eq!(pw.chars().count(), 20);
        assert!(pw.chars().all(|c| "xyz".contains(c)));
    }

    #[test]
    fn test_long_secret_rehashes() {
        let kind = SecretKind::Pin { length: 100 };
        let pin = kind.generate(&["seed"]);
        assert_eq!(pin.len(), 100);
        assert!(pin.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_kind_from_yaml() {
        let kind: SecretKind = serde_yaml::from_str("password:\n  length: 8\n").unwrap();
        assert_eq!(
            kind,
            SecretKind::Password {
                length: 8,
                alphabet: None
            }
        );
        let kind: SecretKind = serde_yaml::from_str("passphrase: {}\n").unwrap();
        assert_eq!(kind, SecretKind::default());
    }

    #[test]
    fn test_random_seed() {
        let a = random_seed(64);
        let b = random_seed(64);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
