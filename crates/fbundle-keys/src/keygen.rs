//! Generate signing key pairs.

use crate::{KeyAlgorithm, KeyError, KeyResult, PrivateKey};
use ed25519_dalek::SigningKey;
use pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const RSA_KEY_BITS: usize = 2048;

/// Encoded forms of a freshly generated key pair.
pub struct KeyPairFiles {
    pub algorithm: KeyAlgorithm,
    /// Unencrypted PKCS#8 PEM.
    pub private_pem: String,
    /// SubjectPublicKeyInfo PEM.
    pub public_pem: String,
    /// OpenSSH public key line.
    pub openssh_public: String,
    pub fingerprint: String,
}

/// Where [`KeyPairFiles::write`] put each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub private_key: PathBuf,
    pub public_pem: PathBuf,
    pub openssh_public: PathBuf,
}

/// Generate a new Ed25519 or RSA-2048 key pair.
pub fn generate_key_pair(algorithm: KeyAlgorithm) -> KeyResult<KeyPairFiles> {
    let mut rng = rand::thread_rng();

    let (private_key, private_pem) = match algorithm {
        KeyAlgorithm::Ed25519 => {
            let key = SigningKey::generate(&mut rng);
            let pem = key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| KeyError::SigningFailed(format!("cannot encode private key: {e}")))?;
            (PrivateKey::Ed25519(key), pem.as_str().to_owned())
        }
        KeyAlgorithm::Rsa => {
            let key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
                .map_err(|e| KeyError::SigningFailed(format!("RSA key generation failed: {e}")))?;
            let pem = key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| KeyError::SigningFailed(format!("cannot encode private key: {e}")))?;
            (PrivateKey::Rsa(Box::new(key)), pem.as_str().to_owned())
        }
    };

    let public_key = private_key.public_key();
    Ok(KeyPairFiles {
        algorithm,
        private_pem,
        public_pem: public_key.to_spki_pem()?,
        openssh_public: public_key.to_openssh(None)?,
        fingerprint: public_key.fingerprint()?,
    })
}

impl KeyPairFiles {
    /// Write `<name>.pem`, `<name>.pub.pem` and `<name>.pub` into `dir`.
    ///
    /// Existing files are never overwritten. The private key is created with
    /// mode 0600 on Unix.
    pub fn write(&self, dir: &Path, name: &str) -> KeyResult<KeyPairPaths> {
        let paths = KeyPairPaths {
            private_key: dir.join(format!("{name}.pem")),
            public_pem: dir.join(format!("{name}.pub.pem")),
            openssh_public: dir.join(format!("{name}.pub")),
        };

        for path in [&paths.private_key, &paths.public_pem, &paths.openssh_public] {
            if path.exists() {
                return Err(KeyError::Conflict(format!(
                    "{} already exists",
                    path.display()
                )));
            }
        }

        fs::create_dir_all(dir)?;
        fs::write(&paths.private_key, self.private_pem.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&paths.private_key, fs::Permissions::from_mode(0o600))?;
        }

        fs::write(&paths.public_pem, self.public_pem.as_bytes())?;
        fs::write(&paths.openssh_public, format!("{} {name}\n", self.openssh_public))?;

        info!(
            algorithm = %self.algorithm,
            fingerprint = %self.fingerprint,
            path = %paths.private_key.display(),
            "generated signing key pair"
        );
        Ok(paths)
    }
}
