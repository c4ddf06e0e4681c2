//! Account source files
//!
//! An account file is YAML, optionally age-encrypted (X25519 +
//! ChaCha20-Poly1305) when its name ends in `.age`. Encrypted files are
//! opened with the user's identity key and written ASCII-armored to one or
//! more recipients.

use crate::account::AccountSpec;
use crate::error::SeedkeepError;
use age::armor::{ArmoredReader, ArmoredWriter, Format};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension marking an encrypted account file
pub const ENCRYPTED_EXTENSION: &str = "age";

/// Typed contents of an account file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsFile {
    /// Seed shared by every account declared in this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_seed: Option<String>,

    #[serde(default)]
    pub accounts: Vec<AccountSpec>,
}

/// An account file on disk
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stable identifier: the file stem, ignoring a trailing `.age`
    ///
    /// `work.yaml.age` and `work.yaml` are both `work`; `team.v2.yaml` is `team.v2`.
    pub fn identifier(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let suffix = format!(".{}", ENCRYPTED_EXTENSION);
        let plain = name.strip_suffix(suffix.as_str()).unwrap_or(name.as_str());
        Path::new(plain)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| plain.to_string())
    }

    pub fn is_encrypted(&self) -> bool {
        self.path.extension().and_then(|e| e.to_str()) == Some(ENCRYPTED_EXTENSION)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Last modification time
    pub fn mtime(&self) -> Result<DateTime<Utc>> {
        let modified = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| SeedkeepError::Io {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        Ok(DateTime::<Utc>::from(modified))
    }

    /// Read, decrypt if needed, and parse the file
    pub fn open(&self, identity_path: &Path) -> Result<AccountsFile> {
        let text = self.read_text(identity_path)?;
        serde_yaml::from_str(&text).map_err(|e| {
            SeedkeepError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn read_text(&self, identity_path: &Path) -> Result<String> {
        let raw = fs::read(&self.path).map_err(|e| SeedkeepError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        if !self.is_encrypted() {
            return String::from_utf8(raw)
                .with_context(|| format!("{} is not valid UTF-8", self.path.display()));
        }

        debug!("decrypting {}", self.path.display());
        let identities = load_identities(identity_path).map_err(|e| SeedkeepError::Decryption {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let decrypted = decrypt(&raw, &identities).map_err(|message| SeedkeepError::Decryption {
            path: self.path.clone(),
            message,
        })?;

        String::from_utf8(decrypted)
            .with_context(|| format!("{} is not valid UTF-8", self.path.display()))
    }

    /// Write a new file, encrypting to `recipients` when the name ends in `.age`
    ///
    /// Never overwrites an existing file.
    pub fn create(&self, content: &str, recipients: &[String]) -> Result<()> {
        if self.path.exists() {
            bail!(SeedkeepError::Exists(self.path.clone()));
        }

        let bytes = if self.is_encrypted() {
            if recipients.is_empty() {
                bail!(SeedkeepError::Config(format!(
                    "{}: recipients are required for encrypted files",
                    self.path.display()
                )));
            }
            encrypt(content.as_bytes(), recipients)?
        } else {
            content.as_bytes().to_vec()
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        file.write_all(&bytes)?;
        restrict_permissions(&self.path)?;

        Ok(())
    }
}

/// Load x25519 identities, one per line, skipping comments
fn load_identities(path: &Path) -> Result<Vec<age::x25519::Identity>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read identity key {}", path.display()))?;

    let identities = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            l.parse::<age::x25519::Identity>()
                .map_err(|e| anyhow::anyhow!("Failed to parse identity: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    if identities.is_empty() {
        bail!("no identities in {}", path.display());
    }
    Ok(identities)
}

fn decrypt(encrypted: &[u8], identities: &[age::x25519::Identity]) -> std::result::Result<Vec<u8>, String> {
    let decryptor = match age::Decryptor::new(ArmoredReader::new(encrypted))
        .map_err(|e| e.to_string())?
    {
        age::Decryptor::Recipients(d) => d,
        _ => return Err("unexpected passphrase encryption".to_string()),
    };

    let mut decrypted = vec![];
    let mut reader = decryptor
        .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
        .map_err(|e| e.to_string())?;
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| e.to_string())?;

    Ok(decrypted)
}

fn encrypt(plaintext: &[u8], recipients: &[String]) -> Result<Vec<u8>> {
    let recipients = recipients
        .iter()
        .map(|r| {
            r.parse::<age::x25519::Recipient>()
                .map(|r| Box::new(r) as Box<dyn age::Recipient + Send>)
                .map_err(|e| SeedkeepError::Encryption(format!("recipient '{}': {}", r, e)))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let encryptor = age::Encryptor::with_recipients(recipients)
        .ok_or_else(|| SeedkeepError::Encryption("no recipients".to_string()))?;

    let mut encrypted = vec![];
    let armored = ArmoredWriter::wrap_output(&mut encrypted, Format::AsciiArmor)
        .map_err(|e| SeedkeepError::Encryption(e.to_string()))?;
    let mut writer = encryptor
        .wrap_output(armored)
        .map_err(|e| SeedkeepError::Encryption(e.to_string()))?;
    writer
        .write_all(plaintext)
        .map_err(|e| SeedkeepError::Encryption(e.to_string()))?;
    writer
        .finish()
        .and_then(|armored| armored.finish())
        .map_err(|e| SeedkeepError::Encryption(e.to_string()))?;

    Ok(encrypted)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Generate an identity key file, returning its public key
pub fn generate_identity(path: &Path) -> Result<String> {
    use age::secrecy::ExposeSecret;

    if path.exists() {
        let identities = load_identities(path)?;
        return Ok(identities[0].to_public().to_string());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let identity = age::x25519::Identity::generate();
    let mut file = File::create(path)?;
    writeln!(file, "# public key: {}", identity.to_public())?;
    writeln!(file, "{}", identity.to_string().expose_secret())?;
    restrict_permissions(path)?;

    Ok(identity.to_public().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PLAIN: &str = "master_seed: abc123\naccounts:\n  - name: github\n";

    #[test]
    fn test_identifier() {
        assert_eq!(SourceFile::new("/x/work.yaml.age").identifier(), "work");
        assert_eq!(SourceFile::new("/x/work.yaml").identifier(), "work");
        assert_eq!(SourceFile::new("/x/work").identifier(), "work");
        assert_eq!(SourceFile::new("/x/work.age").identifier(), "work");
        assert_eq!(SourceFile::new("/x/team.v2.yaml").identifier(), "team.v2");
        assert_eq!(SourceFile::new("/x/team.v2.yaml.age").identifier(), "team.v2");
        assert!(SourceFile::new("/x/work.yaml.age").is_encrypted());
        assert!(!SourceFile::new("/x/work.yaml").is_encrypted());
    }

    #[test]
    fn test_plain_create_and_open() {
        let temp = TempDir::new().unwrap();
        let source = SourceFile::new(temp.path().join("accounts.yaml"));
        source.create(PLAIN, &[]).unwrap();

        let contents = source.open(&temp.path().join("missing.key")).unwrap();
        assert_eq!(contents.master_seed.as_deref(), Some("abc123"));
        assert_eq!(contents.accounts.len(), 1);
        assert_eq!(contents.accounts[0].name, "github");
    }

    #[test]
    fn test_create_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let source = SourceFile::new(temp.path().join("accounts.yaml"));
        source.create(PLAIN, &[]).unwrap();

        let err = source.create(PLAIN, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Exists(_))
        ));
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let temp = TempDir::new().unwrap();
        let key = temp.path().join("keys").join("identity.key");
        let public = generate_identity(&key).unwrap();
        assert!(public.starts_with("age1"));
        assert_eq!(generate_identity(&key).unwrap(), public);

        let path = temp.path().join("shared.yaml.age");
        let source = SourceFile::new(&path);
        source.create(PLAIN, &[public]).unwrap();

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.starts_with("-----BEGIN AGE ENCRYPTED FILE-----"));
        assert!(!on_disk.contains("abc123"));

        let contents = source.open(&key).unwrap();
        assert_eq!(contents.master_seed.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_encrypted_requires_recipients() {
        let temp = TempDir::new().unwrap();
        let source = SourceFile::new(temp.path().join("shared.yaml.age"));
        let err = source.create(PLAIN, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Config(_))
        ));
        assert!(!source.exists());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let source = SourceFile::new(temp.path().join("nope.yaml"));
        let err = source.open(temp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Io { .. })
        ));
    }

    #[test]
    fn test_wrong_identity_is_decryption_error() {
        let temp = TempDir::new().unwrap();
        let ours = generate_identity(&temp.path().join("ours.key")).unwrap();
        generate_identity(&temp.path().join("theirs.key")).unwrap();

        let source = SourceFile::new(temp.path().join("shared.yaml.age"));
        source.create(PLAIN, &[ours]).unwrap();

        let err = source.open(&temp.path().join("theirs.key")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Decryption { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let source = SourceFile::new(temp.path().join("bad.yaml"));
        source.create("accounts: [ {name: ", &[]).unwrap();
        let err = source.open(temp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedkeepError>(),
            Some(SeedkeepError::Parse { .. })
        ));
    }
}
