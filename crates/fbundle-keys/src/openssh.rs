//! OpenSSH public key lines (`ssh-ed25519 AAAA... comment`).

use crate::{KeyError, KeyResult, PublicKey};
use ed25519_dalek::VerifyingKey;
use rsa::RsaPublicKey;
use ssh_key::public::{Ed25519PublicKey, KeyData, RsaPublicKey as SshRsaPublicKey};
use ssh_key::HashAlg;

pub(crate) fn parse_public_key(line: &str) -> KeyResult<PublicKey> {
    let parsed = ssh_key::PublicKey::from_openssh(line.trim())
        .map_err(|e| KeyError::MalformedKey(format!("OpenSSH public key: {e}")))?;

    match parsed.key_data() {
        KeyData::Ed25519(key) => VerifyingKey::try_from(key)
            .map(PublicKey::Ed25519)
            .map_err(|e| KeyError::MalformedKey(format!("Ed25519 public key: {e}"))),
        KeyData::Rsa(key) => RsaPublicKey::try_from(key)
            .map(|key| PublicKey::Rsa(Box::new(key)))
            .map_err(|e| KeyError::MalformedKey(format!("RSA public key: {e}"))),
        other => Err(KeyError::UnsupportedKey(format!(
            "OpenSSH key type {}",
            other.algorithm()
        ))),
    }
}

fn key_data(key: &PublicKey) -> KeyResult<KeyData> {
    match key {
        PublicKey::Ed25519(key) => Ok(KeyData::from(Ed25519PublicKey::from(key))),
        PublicKey::Rsa(key) => SshRsaPublicKey::try_from(key.as_ref())
            .map(KeyData::from)
            .map_err(|e| KeyError::MalformedKey(format!("RSA public key: {e}"))),
    }
}

pub(crate) fn encode_public_key(key: &PublicKey, comment: Option<&str>) -> KeyResult<String> {
    let comment = comment.unwrap_or_default();
    ssh_key::PublicKey::new(key_data(key)?, comment)
        .to_openssh()
        .map_err(|e| KeyError::MalformedKey(format!("cannot encode OpenSSH key: {e}")))
}

/// SHA-256 digest of the OpenSSH wire encoding of the key.
pub(crate) fn wire_digest(key: &PublicKey) -> KeyResult<Vec<u8>> {
    Ok(key_data(key)?
        .fingerprint(HashAlg::Sha256)
        .as_bytes()
        .to_vec())
}
