//! Key loading and signature primitives.
//!
//! The key type is decided once, when the key is loaded, from the algorithm
//! OID of its PKCS#8 / SubjectPublicKeyInfo encoding (or the key type of an
//! OpenSSH public key line). Ed25519 signs the payload directly; RSA signs
//! with PKCS#1 v1.5 padding over the SHA-256 digest of the payload.

use crate::openssh;
use crate::{KeyError, KeyResult};
use ed25519_dalek::{
    Signature as Ed25519Signature, SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
};
use fbundle_core::{SHA256_PREFIX, checksum_of_bytes};
use pkcs8::der::{Document, SecretDocument};
use pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding, ObjectIdentifier,
    PrivateKeyInfo,
};
use rsa::pkcs1v15;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use spki::SubjectPublicKeyInfoRef;
use std::fmt;
use std::fs;
use std::path::Path;

const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// Supported signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    Ed25519,
    Rsa,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Ed25519 => write!(f, "Ed25519"),
            KeyAlgorithm::Rsa => write!(f, "RSA"),
        }
    }
}

/// A loaded signing key.
pub enum PrivateKey {
    Ed25519(Ed25519SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

impl PrivateKey {
    /// Load an unencrypted PKCS#8 `PRIVATE KEY` PEM block.
    pub fn from_pem(pem: &str) -> KeyResult<Self> {
        let document = decode_private_pem(pem)?;
        let der = document.as_bytes();

        match private_key_oid(der)? {
            oid if oid == ED25519_OID => Ed25519SigningKey::from_pkcs8_der(der)
                .map(Self::Ed25519)
                .map_err(|e| KeyError::MalformedKey(format!("Ed25519 private key: {e}"))),
            oid if oid == RSA_ENCRYPTION_OID => RsaPrivateKey::from_pkcs8_der(der)
                .map(|key| Self::Rsa(Box::new(key)))
                .map_err(|e| KeyError::MalformedKey(format!("RSA private key: {e}"))),
            oid => Err(KeyError::UnsupportedKey(format!(
                "private key algorithm {oid}; only Ed25519 and RSA keys can sign bundles"
            ))),
        }
    }

    pub fn from_file(path: &Path) -> KeyResult<Self> {
        let pem = fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PrivateKey::Rsa(_) => KeyAlgorithm::Rsa,
        }
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            PrivateKey::Rsa(key) => PublicKey::Rsa(Box::new(key.to_public_key())),
        }
    }

    /// Sign `message` with the scheme of this key's algorithm.
    pub fn sign(&self, message: &[u8]) -> KeyResult<Vec<u8>> {
        match self {
            PrivateKey::Ed25519(key) => {
                use ed25519_dalek::Signer;
                Ok(key.sign(message).to_bytes().to_vec())
            }
            PrivateKey::Rsa(key) => {
                use rsa::signature::{SignatureEncoding, Signer};
                let signing_key = pkcs1v15::SigningKey::<Sha256>::new(key.as_ref().clone());
                signing_key
                    .try_sign(message)
                    .map(|signature| signature.to_vec())
                    .map_err(|e| KeyError::SigningFailed(e.to_string()))
            }
        }
    }
}

/// A loaded verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(Ed25519VerifyingKey),
    Rsa(Box<RsaPublicKey>),
}

impl PublicKey {
    /// Load a public key from SPKI PEM, SPKI DER or an OpenSSH public key line.
    pub fn from_bytes(bytes: &[u8]) -> KeyResult<Self> {
        let text = std::str::from_utf8(bytes).map(str::trim_start);

        match text {
            Ok(text) if text.starts_with("-----BEGIN") => {
                let (label, document) = Document::from_pem(text)
                    .map_err(|e| KeyError::MalformedKey(format!("invalid PEM: {e}")))?;
                if label != "PUBLIC KEY" {
                    return Err(KeyError::UnsupportedKey(format!(
                        "expected a 'PUBLIC KEY' PEM block, found '{label}'"
                    )));
                }
                Self::from_spki_der(document.as_bytes())
            }
            Ok(text) if text.starts_with("ssh-") => openssh::parse_public_key(text),
            _ => Self::from_spki_der(bytes),
        }
    }

    pub fn from_file(path: &Path) -> KeyResult<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Load a DER-encoded SubjectPublicKeyInfo.
    pub fn from_spki_der(der: &[u8]) -> KeyResult<Self> {
        let info = SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| KeyError::UnsupportedKey(format!("not a public key: {e}")))?;

        match info.algorithm.oid {
            oid if oid == ED25519_OID => Ed25519VerifyingKey::from_public_key_der(der)
                .map(Self::Ed25519)
                .map_err(|e| KeyError::MalformedKey(format!("Ed25519 public key: {e}"))),
            oid if oid == RSA_ENCRYPTION_OID => RsaPublicKey::from_public_key_der(der)
                .map(|key| Self::Rsa(Box::new(key)))
                .map_err(|e| KeyError::MalformedKey(format!("RSA public key: {e}"))),
            oid => Err(KeyError::UnsupportedKey(format!(
                "public key algorithm {oid}"
            ))),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
        }
    }

    pub fn to_spki_der(&self) -> KeyResult<Vec<u8>> {
        let document = match self {
            PublicKey::Ed25519(key) => key.to_public_key_der(),
            PublicKey::Rsa(key) => key.to_public_key_der(),
        }
        .map_err(|e| KeyError::MalformedKey(format!("cannot encode public key: {e}")))?;

        Ok(document.as_bytes().to_vec())
    }

    pub fn to_spki_pem(&self) -> KeyResult<String> {
        match self {
            PublicKey::Ed25519(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::Rsa(key) => key.to_public_key_pem(LineEnding::LF),
        }
        .map_err(|e| KeyError::MalformedKey(format!("cannot encode public key: {e}")))
    }

    /// OpenSSH `authorized_keys` style line.
    pub fn to_openssh(&self, comment: Option<&str>) -> KeyResult<String> {
        openssh::encode_public_key(self, comment)
    }

    /// `sha256:` fingerprint of the SubjectPublicKeyInfo DER encoding.
    pub fn fingerprint(&self) -> KeyResult<String> {
        Ok(checksum_of_bytes(&self.to_spki_der()?))
    }

    /// `sha256:` hash of the OpenSSH wire-format key blob.
    pub fn openssh_fingerprint(&self) -> KeyResult<String> {
        Ok(format!(
            "{SHA256_PREFIX}{}",
            hex::encode(openssh::wire_digest(self)?)
        ))
    }

    /// Check `signature` over `message`.
    ///
    /// A signature that does not match, including one of the wrong length, is
    /// [`KeyError::InvalidSignature`].
    pub fn verify(&self, signature: &[u8], message: &[u8]) -> KeyResult<()> {
        match self {
            PublicKey::Ed25519(key) => {
                use ed25519_dalek::Verifier;
                let signature = Ed25519Signature::from_slice(signature)
                    .map_err(|_| KeyError::InvalidSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| KeyError::InvalidSignature)
            }
            PublicKey::Rsa(key) => {
                use rsa::signature::Verifier;
                let signature = pkcs1v15::Signature::try_from(signature)
                    .map_err(|_| KeyError::InvalidSignature)?;
                pkcs1v15::VerifyingKey::<Sha256>::new(key.as_ref().clone())
                    .verify(message, &signature)
                    .map_err(|_| KeyError::InvalidSignature)
            }
        }
    }
}

/// Identify the algorithm of PKCS#8 private key PEM bytes.
pub fn detect_algorithm(private_key_pem: &[u8]) -> KeyResult<KeyAlgorithm> {
    let pem = std::str::from_utf8(private_key_pem)
        .map_err(|_| KeyError::UnsupportedKey("private key is not PEM text".to_string()))?;
    let document = decode_private_pem(pem)?;

    match private_key_oid(document.as_bytes())? {
        oid if oid == ED25519_OID => Ok(KeyAlgorithm::Ed25519),
        oid if oid == RSA_ENCRYPTION_OID => Ok(KeyAlgorithm::Rsa),
        oid => Err(KeyError::UnsupportedKey(format!(
            "private key algorithm {oid}"
        ))),
    }
}

/// `sha256:` fingerprint of public key bytes in any supported format.
///
/// The hash is taken over the SubjectPublicKeyInfo DER of the decoded key, so
/// the PEM, DER and OpenSSH forms of one key share a fingerprint.
pub fn fingerprint(public_key_bytes: &[u8]) -> KeyResult<String> {
    PublicKey::from_bytes(public_key_bytes)?.fingerprint()
}

/// Sign a canonical payload.
pub fn sign(canonical: &[u8], key: &PrivateKey) -> KeyResult<Vec<u8>> {
    key.sign(canonical)
}

/// Verify a signature over a canonical payload.
pub fn verify(signature: &[u8], canonical: &[u8], key: &PublicKey) -> KeyResult<()> {
    key.verify(signature, canonical)
}

fn decode_private_pem(pem: &str) -> KeyResult<SecretDocument> {
    let (label, document) = SecretDocument::from_pem(pem.trim_start())
        .map_err(|e| KeyError::UnsupportedKey(format!("not a PEM private key: {e}")))?;

    if label != "PRIVATE KEY" {
        return Err(KeyError::UnsupportedKey(format!(
            "expected an unencrypted PKCS#8 'PRIVATE KEY' block, found '{label}'"
        )));
    }
    Ok(document)
}

fn private_key_oid(der: &[u8]) -> KeyResult<ObjectIdentifier> {
    let info = PrivateKeyInfo::try_from(der)
        .map_err(|e| KeyError::MalformedKey(format!("invalid PKCS#8 structure: {e}")))?;
    Ok(info.algorithm.oid)
}

#[cfg(test)]
#[path = "signing/signing_tests.rs"]
mod signing_tests;
