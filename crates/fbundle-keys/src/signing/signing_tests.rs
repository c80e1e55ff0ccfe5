#![allow(non_snake_case)]

use super::*;
use crate::{KeyPairFiles, generate_key_pair};
use std::sync::OnceLock;
use test_case::test_case;

const CANONICAL: &[u8] = b"bin/libfoo.x86_64-linux.gcc-libstdc++-2.39-cxx11_abi.so:sha256:aa\nfoo_src.zip:sha256:bb";

fn key_pair(algorithm: KeyAlgorithm) -> &'static KeyPairFiles {
    static ED25519: OnceLock<KeyPairFiles> = OnceLock::new();
    static RSA: OnceLock<KeyPairFiles> = OnceLock::new();

    let cell = match algorithm {
        KeyAlgorithm::Ed25519 => &ED25519,
        KeyAlgorithm::Rsa => &RSA,
    };
    cell.get_or_init(|| generate_key_pair(algorithm).unwrap())
}

// ============================================================================
// Algorithm detection
// ============================================================================

#[test_case(KeyAlgorithm::Ed25519)]
#[test_case(KeyAlgorithm::Rsa)]
fn detect_algorithm___generated_key___matches_algorithm(algorithm: KeyAlgorithm) {
    let pair = key_pair(algorithm);

    assert_eq!(detect_algorithm(pair.private_pem.as_bytes()).unwrap(), algorithm);
    assert_eq!(PrivateKey::from_pem(&pair.private_pem).unwrap().algorithm(), algorithm);
}

#[test]
fn detect_algorithm___public_key_pem___is_unsupported() {
    let pair = key_pair(KeyAlgorithm::Ed25519);

    let result = detect_algorithm(pair.public_pem.as_bytes());

    assert!(matches!(result, Err(KeyError::UnsupportedKey(_))));
}

#[test]
fn detect_algorithm___garbage___is_unsupported() {
    let result = detect_algorithm(b"not a key at all");

    assert!(matches!(result, Err(KeyError::UnsupportedKey(_))));
}

#[test]
fn PrivateKey___debug___does_not_print_key_material() {
    let key = PrivateKey::from_pem(&key_pair(KeyAlgorithm::Ed25519).private_pem).unwrap();

    let debug = format!("{key:?}");

    assert!(debug.contains("Ed25519"));
    assert!(!debug.contains("secret"));
}

// ============================================================================
// Sign / verify
// ============================================================================

#[test_case(KeyAlgorithm::Ed25519)]
#[test_case(KeyAlgorithm::Rsa)]
fn sign___then_verify___round_trips(algorithm: KeyAlgorithm) {
    let pair = key_pair(algorithm);
    let private_key = PrivateKey::from_pem(&pair.private_pem).unwrap();
    let public_key = PublicKey::from_bytes(pair.public_pem.as_bytes()).unwrap();

    let signature = sign(CANONICAL, &private_key).unwrap();

    verify(&signature, CANONICAL, &public_key).unwrap();
}

#[test_case(KeyAlgorithm::Ed25519)]
#[test_case(KeyAlgorithm::Rsa)]
fn verify___modified_payload___is_invalid_signature(algorithm: KeyAlgorithm) {
    let pair = key_pair(algorithm);
    let private_key = PrivateKey::from_pem(&pair.private_pem).unwrap();
    let signature = sign(CANONICAL, &private_key).unwrap();
    let mut tampered = CANONICAL.to_vec();
    tampered[0] ^= 0x01;

    let result = verify(&signature, &tampered, &private_key.public_key());

    assert!(matches!(result, Err(KeyError::InvalidSignature)));
}

#[test_case(KeyAlgorithm::Ed25519)]
#[test_case(KeyAlgorithm::Rsa)]
fn verify___truncated_signature___is_invalid_signature(algorithm: KeyAlgorithm) {
    let pair = key_pair(algorithm);
    let private_key = PrivateKey::from_pem(&pair.private_pem).unwrap();
    let signature = sign(CANONICAL, &private_key).unwrap();

    let result = verify(&signature[..10], CANONICAL, &private_key.public_key());

    assert!(matches!(result, Err(KeyError::InvalidSignature)));
}

#[test]
fn verify___other_key___is_invalid_signature() {
    let signer = PrivateKey::from_pem(&key_pair(KeyAlgorithm::Ed25519).private_pem).unwrap();
    let other = generate_key_pair(KeyAlgorithm::Ed25519).unwrap();
    let other_public = PublicKey::from_bytes(other.public_pem.as_bytes()).unwrap();
    let signature = sign(CANONICAL, &signer).unwrap();

    let result = verify(&signature, CANONICAL, &other_public);

    assert!(matches!(result, Err(KeyError::InvalidSignature)));
}

#[test]
fn sign___ed25519___is_deterministic_64_bytes() {
    let key = PrivateKey::from_pem(&key_pair(KeyAlgorithm::Ed25519).private_pem).unwrap();

    let first = sign(CANONICAL, &key).unwrap();
    let second = sign(CANONICAL, &key).unwrap();

    assert_eq!(first.len(), 64);
    assert_eq!(first, second);
}

#[test]
fn sign___rsa_2048___produces_256_byte_signature() {
    let key = PrivateKey::from_pem(&key_pair(KeyAlgorithm::Rsa).private_pem).unwrap();

    let signature = sign(CANONICAL, &key).unwrap();

    assert_eq!(signature.len(), 256);
}

// ============================================================================
// Fingerprints and public key formats
// ============================================================================

#[test_case(KeyAlgorithm::Ed25519)]
#[test_case(KeyAlgorithm::Rsa)]
fn fingerprint___pem_der_and_openssh___agree(algorithm: KeyAlgorithm) {
    let pair = key_pair(algorithm);
    let public_key = PublicKey::from_bytes(pair.public_pem.as_bytes()).unwrap();
    let der = public_key.to_spki_der().unwrap();

    let from_pem = fingerprint(pair.public_pem.as_bytes()).unwrap();
    let from_der = fingerprint(&der).unwrap();
    let from_openssh = fingerprint(pair.openssh_public.as_bytes()).unwrap();

    assert_eq!(from_pem, pair.fingerprint);
    assert_eq!(from_der, pair.fingerprint);
    assert_eq!(from_openssh, pair.fingerprint);
}

#[test]
fn fingerprint___is_hash_of_spki_der_not_pem_text() {
    let pair = key_pair(KeyAlgorithm::Ed25519);
    let der = PublicKey::from_bytes(pair.public_pem.as_bytes())
        .unwrap()
        .to_spki_der()
        .unwrap();

    let fp = fingerprint(pair.public_pem.as_bytes()).unwrap();

    assert_eq!(fp, checksum_of_bytes(&der));
    assert_ne!(fp, checksum_of_bytes(pair.public_pem.as_bytes()));
    assert!(fbundle_core::is_checksum(&fp));
}

#[test_case(KeyAlgorithm::Ed25519)]
#[test_case(KeyAlgorithm::Rsa)]
fn PublicKey___openssh_round_trip___preserves_key(algorithm: KeyAlgorithm) {
    let pair = key_pair(algorithm);
    let public_key = PublicKey::from_bytes(pair.public_pem.as_bytes()).unwrap();

    let line = public_key.to_openssh(Some("me@example")).unwrap();

    assert_eq!(PublicKey::from_bytes(line.as_bytes()).unwrap(), public_key);
    let openssh_fingerprint = public_key.openssh_fingerprint().unwrap();
    assert!(fbundle_core::is_checksum(&openssh_fingerprint));
    assert_ne!(openssh_fingerprint, pair.fingerprint);
}

#[test]
fn PublicKey___private_key_pem___is_rejected() {
    let pair = key_pair(KeyAlgorithm::Ed25519);

    let result = PublicKey::from_bytes(pair.private_pem.as_bytes());

    assert!(matches!(result, Err(KeyError::UnsupportedKey(_))));
}

#[test]
fn PublicKey___garbage_bytes___is_unsupported() {
    let result = PublicKey::from_bytes(&[0x01, 0x02, 0x03]);

    assert!(matches!(result, Err(KeyError::UnsupportedKey(_))));
}
