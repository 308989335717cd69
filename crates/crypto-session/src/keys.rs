//! Server RSA keypair management

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, RSA_MODULUS_BITS};

/// Default key directory, relative to the working directory
pub const DEFAULT_KEY_DIR: &str = "keys";

pub const PUBLIC_KEY_FILE: &str = "server_pub.pem";
pub const PRIVATE_KEY_FILE: &str = "server_priv.pem";

/// Key manager configuration
#[derive(Debug, Clone)]
pub struct KeyConfig {
    /// Directory holding both PEM files
    pub key_dir: PathBuf,
    /// RSA modulus size in bits (minimum 3072)
    pub modulus_bits: usize,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from(DEFAULT_KEY_DIR),
            modulus_bits: RSA_MODULUS_BITS,
        }
    }
}

/// Owner of the server's long-lived RSA keypair.
///
/// Built once at startup and shared by handle. The keypair is generated on
/// first use if either file is missing, then loaded unchanged on every call.
/// The parsed private key is cached until the files are regenerated.
pub struct KeyManager {
    key_dir: PathBuf,
    public_path: PathBuf,
    private_path: PathBuf,
    modulus_bits: usize,
    /// Parsed private key; the lock also serializes generation so
    /// concurrent first calls produce one keypair
    private: Mutex<Option<Arc<RsaPrivateKey>>>,
}

impl KeyManager {
    pub fn new(config: KeyConfig) -> CryptoResult<Self> {
        if config.modulus_bits < RSA_MODULUS_BITS {
            return Err(CryptoError::Configuration(format!(
                "RSA modulus of {} bits is below the {} bit minimum",
                config.modulus_bits, RSA_MODULUS_BITS
            )));
        }

        Ok(Self {
            public_path: config.key_dir.join(PUBLIC_KEY_FILE),
            private_path: config.key_dir.join(PRIVATE_KEY_FILE),
            key_dir: config.key_dir,
            modulus_bits: config.modulus_bits,
            private: Mutex::new(None),
        })
    }

    /// Create a manager around an existing keypair, writing it to `key_dir`.
    ///
    /// Refuses to replace key files already present there.
    pub fn with_keypair(config: KeyConfig, public_pem: &str, private_pem: &str) -> CryptoResult<Self> {
        let manager = Self::new(config)?;
        if manager.public_path.exists() || manager.private_path.exists() {
            return Err(CryptoError::Configuration(format!(
                "key files already present in {}",
                manager.key_dir.display()
            )));
        }

        let private = parse_private(private_pem)?;
        let public = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| CryptoError::Configuration(format!("invalid public key: {}", e)))?;
        if RsaPublicKey::from(&private) != public {
            return Err(CryptoError::Configuration(
                "public key does not match private key".into(),
            ));
        }
        if public.size() * 8 < RSA_MODULUS_BITS {
            return Err(CryptoError::Configuration(format!(
                "RSA modulus of {} bits is below the {} bit minimum",
                public.size() * 8,
                RSA_MODULUS_BITS
            )));
        }

        {
            let mut cached = manager.private.lock();
            manager.store_pair(public_pem, private_pem)?;
            *cached = Some(Arc::new(private));
        }

        Ok(manager)
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    /// Make sure both key files exist, generating a fresh keypair if not
    pub fn ensure_keys(&self) -> CryptoResult<()> {
        let mut cached = self.private.lock();
        self.ensure_files(&mut cached)
    }

    fn ensure_files(&self, cached: &mut Option<Arc<RsaPrivateKey>>) -> CryptoResult<()> {
        if self.public_path.is_file() && self.private_path.is_file() {
            return Ok(());
        }
        *cached = None;
        fs::create_dir_all(&self.key_dir).map_err(storage_error("create key directory"))?;

        info!(
            bits = self.modulus_bits,
            dir = %self.key_dir.display(),
            "Generating server keypair"
        );
        let (public_pem, private_pem) = generate_pem_pair(self.modulus_bits)?;
        self.store_pair(&public_pem, &private_pem)?;

        info!("Server keypair written");
        Ok(())
    }

    /// PEM-encoded (SPKI) public key
    pub fn public_key_pem(&self) -> CryptoResult<String> {
        self.ensure_keys()?;
        fs::read_to_string(&self.public_path).map_err(storage_error("read public key"))
    }

    /// Parsed private key; never leaves this crate
    pub(crate) fn private_key(&self) -> CryptoResult<Arc<RsaPrivateKey>> {
        let mut cached = self.private.lock();
        self.ensure_files(&mut cached)?;
        if let Some(private) = cached.as_ref() {
            return Ok(private.clone());
        }

        let pem = Zeroizing::new(
            fs::read_to_string(&self.private_path).map_err(storage_error("read private key"))?,
        );
        let private = Arc::new(parse_private(&pem)?);
        debug!("Loaded server private key");
        *cached = Some(private.clone());
        Ok(private)
    }

    /// RSA-OAEP(SHA-256) decrypt a wrapped session key.
    ///
    /// Key storage problems surface as `Configuration`; anything wrong with
    /// the blob itself as `Decryption`.
    pub(crate) fn unwrap_key(&self, wrapped: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let private = self.private_key()?;
        private
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), wrapped)
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }

    fn store_pair(&self, public_pem: &str, private_pem: &str) -> CryptoResult<()> {
        fs::create_dir_all(&self.key_dir).map_err(storage_error("create key directory"))?;
        write_atomic(&self.private_path, private_pem.as_bytes(), true)
            .map_err(storage_error("write private key"))?;
        write_atomic(&self.public_path, public_pem.as_bytes(), false)
            .map_err(storage_error("write public key"))?;
        Ok(())
    }
}

/// Generate an RSA keypair as (SPKI public PEM, PKCS#8 private PEM)
pub fn generate_pem_pair(bits: usize) -> CryptoResult<(String, Zeroizing<String>)> {
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::Configuration(format!("key generation failed: {}", e)))?;
    let public = RsaPublicKey::from(&private);

    let private_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Configuration(format!("private key encoding failed: {}", e)))?;
    let public_pem = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Configuration(format!("public key encoding failed: {}", e)))?;

    Ok((public_pem, private_pem))
}

fn parse_private(pem: &str) -> CryptoResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| CryptoError::Configuration(format!("invalid private key: {}", e)))
}

fn storage_error(action: &'static str) -> impl Fn(io::Error) -> CryptoError {
    move |e| CryptoError::Configuration(format!("failed to {}: {}", action, e))
}

/// Write through a temp file and rename, so readers never see a partial key
fn write_atomic(path: &Path, contents: &[u8], owner_only: bool) -> io::Result<()> {
    let tmp = path.with_extension("pem.tmp");

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if owner_only {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    // `mode` only applies on creation; tighten a leftover temp file as well
    #[cfg(unix)]
    if owner_only {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp, path)
}
