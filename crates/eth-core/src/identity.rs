use std::fmt;

use alloy_primitives::{Address, B256};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::address::pubkey_to_address;
use crate::error::EthError;

/// A secp256k1 signing key together with its derived address.
///
/// The key is never serialized, displayed or logged. `Debug` prints only the
/// address. `SigningKey` zeroizes its scalar on drop.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
    address: Address,
}

impl Identity {
    /// Loads an identity from raw 32-byte secret key material.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, EthError> {
        if secret.len() != 32 {
            return Err(EthError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {}",
                secret.len()
            )));
        }
        let signing_key = SigningKey::from_slice(secret)
            .map_err(|_| EthError::InvalidPrivateKey("scalar is zero or out of range".into()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Loads an identity from a hex-encoded secret key, with or without `0x`.
    pub fn from_hex(secret_hex: &str) -> Result<Self, EthError> {
        let trimmed = secret_hex.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|_| EthError::InvalidPrivateKey("key is not valid hex".into()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Generates a fresh random identity from the OS RNG.
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = pubkey_to_address(signing_key.verifying_key());
        Self { signing_key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Signs a 32-byte digest, returning `(r, s, y_parity)`.
    pub fn sign_prehash(&self, digest: &B256) -> Result<(B256, B256, bool), EthError> {
        let (signature, recovery_id): (Signature, RecoveryId) = self
            .signing_key
            .sign_prehash(digest.as_slice())
            .map_err(|e| EthError::SigningError(e.to_string()))?;

        let r = B256::from_slice(&signature.r().to_bytes());
        let s = B256::from_slice(&signature.s().to_bytes());
        Ok((r, s, recovery_id.is_y_odd()))
    }

    /// Signs `message` with EIP-191 `personal_sign`.
    ///
    /// Returns the 65-byte signature `r || s || v` with `v` in {27, 28}.
    pub fn sign_message(&self, message: &[u8]) -> Result<[u8; 65], EthError> {
        let (r, s, odd) = self.sign_prehash(&hash_message(message))?;

        let mut sig = [0u8; 65];
        sig[..32].copy_from_slice(r.as_slice());
        sig[32..64].copy_from_slice(s.as_slice());
        sig[64] = odd as u8 + 27;
        Ok(sig)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// EIP-191 hash: `keccak256("\x19Ethereum Signed Message:\n" || len || message)`.
pub fn hash_message(message: &[u8]) -> B256 {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    B256::from_slice(&hasher.finalize())
}

/// Recovers the signer of a 32-byte digest from `(r, s, y_parity)`.
pub fn recover_prehash(digest: &B256, r: &B256, s: &B256, y_odd: bool) -> Result<Address, EthError> {
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(r.as_slice());
    rs[32..].copy_from_slice(s.as_slice());

    let signature = Signature::from_slice(&rs)
        .map_err(|e| EthError::SigningError(format!("malformed signature: {e}")))?;
    let recovery_id = RecoveryId::new(y_odd, false);

    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
        .map_err(|e| EthError::SigningError(format!("signer recovery failed: {e}")))?;
    Ok(pubkey_to_address(&key))
}

/// Recovers the address that produced an EIP-191 `signature` over `message`.
///
/// Accepts `v` as 27/28 or 0/1.
pub fn recover_message_signer(message: &[u8], signature: &[u8]) -> Result<Address, EthError> {
    if signature.len() != 65 {
        return Err(EthError::SigningError(format!(
            "expected 65-byte signature, got {}",
            signature.len()
        )));
    }
    let y_odd = match signature[64] {
        0 | 27 => false,
        1 | 28 => true,
        v => return Err(EthError::SigningError(format!("invalid recovery byte {v}"))),
    };

    recover_prehash(
        &hash_message(message),
        &B256::from_slice(&signature[..32]),
        &B256::from_slice(&signature[32..64]),
        y_odd,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::checksum_address;

    /// Well-known test private key (DO NOT use on mainnet).
    const TEST_PRIVKEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn from_hex_derives_known_address() {
        let id = Identity::from_hex(TEST_PRIVKEY).unwrap();
        assert_eq!(
            checksum_address(&id.address()),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn from_hex_without_prefix() {
        let a = Identity::from_hex(TEST_PRIVKEY).unwrap();
        let b = Identity::from_hex(&TEST_PRIVKEY[2..]).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn invalid_keys_rejected() {
        assert!(Identity::from_bytes(&[0u8; 32]).is_err());
        assert!(Identity::from_bytes(&[1u8; 31]).is_err());
        assert!(Identity::from_bytes(&[0xff; 32]).is_err());
        assert!(Identity::from_hex("0xnothex").is_err());
    }

    #[test]
    fn key_material_not_in_error_text() {
        let err = Identity::from_hex("zz01").unwrap_err();
        assert!(!err.to_string().contains("zz01"));
    }

    #[test]
    fn debug_redacts_key() {
        let id = Identity::from_hex(TEST_PRIVKEY).unwrap();
        let debug = format!("{id:?}");
        assert!(debug.contains("address"));
        assert!(!debug.to_lowercase().contains("signing_key"));
        assert!(!debug.contains("0000000000000000000000000000000000000000000000000000000000000001"));
    }

    #[test]
    fn random_identities_differ() {
        assert_ne!(Identity::random().address(), Identity::random().address());
    }

    #[test]
    fn sign_message_has_v_27_or_28() {
        let id = Identity::from_hex(TEST_PRIVKEY).unwrap();
        let sig = id.sign_message(b"hello").unwrap();
        assert!(sig[64] == 27 || sig[64] == 28);
    }

    #[test]
    fn sign_message_recovers_signer() {
        let id = Identity::from_hex(TEST_PRIVKEY).unwrap();
        let sig = id.sign_message(b"Hello, Ethereum!").unwrap();
        assert_eq!(recover_message_signer(b"Hello, Ethereum!", &sig).unwrap(), id.address());
    }

    #[test]
    fn recover_different_message_gives_different_address() {
        let id = Identity::from_hex(TEST_PRIVKEY).unwrap();
        let sig = id.sign_message(b"original").unwrap();
        let recovered = recover_message_signer(b"tampered", &sig);
        assert!(recovered.map(|a| a != id.address()).unwrap_or(true));
    }

    #[test]
    fn recover_rejects_bad_lengths_and_v() {
        assert!(recover_message_signer(b"x", &[0u8; 64]).is_err());
        let id = Identity::from_hex(TEST_PRIVKEY).unwrap();
        let mut sig = id.sign_message(b"x").unwrap();
        sig[64] = 5;
        assert!(recover_message_signer(b"x", &sig).is_err());
    }

    #[test]
    fn hash_message_matches_known_vector() {
        // keccak256("\x19Ethereum Signed Message:\n11hello world")
        assert_eq!(
            hex::encode(hash_message(b"hello world")),
            "d9eba16ed0ecae432b71fe008c98cc872bb4cc214d3220a36f365326cf807d68"
        );
    }
}
