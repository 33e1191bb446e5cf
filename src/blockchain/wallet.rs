//! Keys, key storage and transaction digest signing.
//!
//! # Security
//! - Private keys are loaded from WIF strings or the `TUSC_WIF` environment variable
//! - Keys are never logged or serialized except through explicit `to_wif`
//! - Persistent (sqlite) key stores live outside this crate behind [`KeyStore`]

use alloy::primitives::B256;
use alloy::signers::local::PrivateKeySigner;
use dashmap::DashMap;
use k256::ecdsa::hazmat::SignPrimitive;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Error, Write};
use std::str::FromStr;
use std::sync::Arc;

use crate::blockchain::types::{ChainError, ChainResult};
use crate::protocol::encoding::ChainEncode;

/// Environment variable holding comma separated WIF keys.
pub const WIF_ENV_VAR: &str = "TUSC_WIF";

/// Length of a base58 encoded compressed key plus checksum.
const PUBKEY_BASE58_LEN: usize = 50;

const WIF_VERSION: u8 = 0x80;

/// Nonce retries before giving up on a canonical signature.
const MAX_SIGNING_ATTEMPTS: u32 = 1024;

/// Header byte offset of a compressed-key compact signature.
const COMPACT_HEADER: u8 = 27 + 4;

/// True if the node accepts the `r || s` pair: neither half may have its
/// top bit set or start with a zero byte it does not need.
pub fn is_canonical(rs: &[u8; 64]) -> bool {
    let half_ok = |b: &[u8]| b[0] & 0x80 == 0 && !(b[0] == 0 && b[1] & 0x80 == 0);
    half_ok(&rs[..32]) && half_ok(&rs[32..])
}

fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// Compressed secp256k1 public key with its chain address prefix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    prefix: String,
    key: [u8; 33],
}

impl PublicKey {
    pub fn from_compressed(key: [u8; 33], prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            key,
        }
    }

    /// Parse a key and require a specific prefix.
    pub fn parse_with_prefix(s: &str, prefix: &str) -> ChainResult<Self> {
        let key: PublicKey = s.parse()?;
        if key.prefix != prefix {
            return Err(ChainError::malformed(format!(
                "public key prefix '{}' does not match '{}'",
                key.prefix, prefix
            )));
        }
        Ok(key)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.key
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut data = self.key.to_vec();
        data.extend_from_slice(&ripemd160(&self.key)[..4]);
        write!(f, "{}{}", self.prefix, bs58::encode(data).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl FromStr for PublicKey {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() <= PUBKEY_BASE58_LEN || !s.is_char_boundary(s.len() - PUBKEY_BASE58_LEN) {
            return Err(ChainError::malformed(format!("invalid public key '{}'", s)));
        }
        let (prefix, encoded) = s.split_at(s.len() - PUBKEY_BASE58_LEN);
        if !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ChainError::malformed(format!("invalid public key prefix '{}'", prefix)));
        }
        let data = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ChainError::malformed(format!("invalid public key '{}': {}", s, e)))?;
        if data.len() != 37 {
            return Err(ChainError::malformed(format!("invalid public key length in '{}'", s)));
        }
        let (key, checksum) = data.split_at(33);
        if ripemd160(key)[..4] != *checksum {
            return Err(ChainError::malformed(format!("public key checksum mismatch '{}'", s)));
        }
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(key);
        Ok(Self::from_compressed(bytes, prefix))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ChainEncode for PublicKey {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        w.write_all(&self.key)?;
        Ok(self.key.len())
    }
}

/// secp256k1 private key.
#[derive(Clone)]
pub struct PrivateKey {
    signer: PrivateKeySigner,
}

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; 32]) -> ChainResult<Self> {
        let signer = PrivateKeySigner::from_bytes(&B256::from(bytes))
            .map_err(|e| ChainError::Wallet(format!("Invalid private key: {}", e)))?;
        Ok(Self { signer })
    }

    /// Import a key in Wallet Import Format.
    pub fn from_wif(wif: &str) -> ChainResult<Self> {
        let data = bs58::decode(wif.trim())
            .into_vec()
            .map_err(|e| ChainError::Wallet(format!("Invalid private key format: {}", e)))?;
        if data.len() != 37 || data[0] != WIF_VERSION {
            return Err(ChainError::Wallet("Invalid private key format: bad WIF payload".to_string()));
        }
        let (payload, checksum) = data.split_at(33);
        if sha256(&sha256(payload))[..4] != *checksum {
            return Err(ChainError::Wallet("Invalid private key format: checksum mismatch".to_string()));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&payload[1..]);
        Self::from_bytes(key)
    }

    pub fn to_wif(&self) -> String {
        let mut data = vec![WIF_VERSION];
        data.extend_from_slice(self.signer.to_bytes().as_slice());
        let checksum = sha256(&sha256(&data));
        data.extend_from_slice(&checksum[..4]);
        bs58::encode(data).into_string()
    }

    pub fn public_key(&self, prefix: &str) -> PublicKey {
        let point = self.signer.credential().verifying_key().to_encoded_point(true);
        let mut key = [0u8; 33];
        key.copy_from_slice(point.as_bytes());
        PublicKey::from_compressed(key, prefix)
    }

    /// Sign a 32-byte digest, returning the 65-byte compact form
    /// `[27 + 4 + recovery_id, r, s]`.
    ///
    /// The first attempt is plain RFC 6979. Non-canonical results are
    /// re-signed with a counter mixed into the nonce, so the output is
    /// still deterministic per key and digest.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> ChainResult<[u8; 65]> {
        let signing_key = self.signer.credential();
        let secret: &k256::Scalar = signing_key.as_nonzero_scalar().as_ref();
        let prehash = k256::FieldBytes::clone_from_slice(digest);

        for attempt in 0..MAX_SIGNING_ATTEMPTS {
            let extra = if attempt == 0 {
                Vec::new()
            } else {
                sha256(&[&digest[..], &attempt.to_be_bytes()[..]].concat()).to_vec()
            };
            let (signature, _) = secret
                .try_sign_prehashed_rfc6979::<Sha256>(&prehash, &extra)
                .map_err(|e| ChainError::Wallet(format!("Signing failed: {}", e)))?;

            let mut rs = [0u8; 64];
            rs.copy_from_slice(&signature.to_bytes());
            if !is_canonical(&rs) {
                continue;
            }
            let recovery_id =
                RecoveryId::trial_recovery_from_prehash(signing_key.verifying_key(), digest, &signature)
                    .map_err(|e| ChainError::Wallet(format!("Signing failed: {}", e)))?;

            let mut compact = [0u8; 65];
            compact[0] = COMPACT_HEADER + recovery_id.to_byte();
            compact[1..].copy_from_slice(&rs);
            return Ok(compact);
        }
        Err(ChainError::Wallet("Signing failed: no canonical signature found".to_string()))
    }
}

impl PublicKey {
    /// Recover the key that produced a compact signature over `digest`.
    pub fn recover(digest: &[u8; 32], signature: &[u8; 65], prefix: &str) -> ChainResult<Self> {
        let bad = |e: k256::ecdsa::Error| ChainError::InvalidSignature(e.to_string());
        let recovery_id = signature[0]
            .checked_sub(COMPACT_HEADER)
            .and_then(RecoveryId::from_byte)
            .ok_or_else(|| ChainError::InvalidSignature("bad header byte".to_string()))?;
        let rs = Signature::from_slice(&signature[1..]).map_err(bad)?;
        let key = VerifyingKey::recover_from_prehash(digest, &rs, recovery_id).map_err(bad)?;

        let point = key.to_encoded_point(true);
        let mut compressed = [0u8; 33];
        compressed.copy_from_slice(point.as_bytes());
        Ok(Self::from_compressed(compressed, prefix))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Source of private keys for signing.
pub trait KeyStore: Send + Sync {
    /// Private key for `public_key`, or `MissingKey`.
    fn get_private_key(&self, public_key: &PublicKey) -> ChainResult<PrivateKey>;

    /// Store a key and return its public key.
    fn add_private_key(&self, key: PrivateKey) -> ChainResult<PublicKey>;

    /// All public keys held.
    fn public_keys(&self) -> Vec<PublicKey>;
}

/// Unencrypted key store kept in process memory.
#[derive(Debug)]
pub struct InMemoryKeyStore {
    prefix: String,
    keys: DashMap<PublicKey, PrivateKey>,
}

impl InMemoryKeyStore {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            keys: DashMap::new(),
        }
    }
}

impl KeyStore for InMemoryKeyStore {
    fn get_private_key(&self, public_key: &PublicKey) -> ChainResult<PrivateKey> {
        self.keys
            .get(public_key)
            .map(|r| r.value().clone())
            .ok_or_else(|| ChainError::MissingKey(public_key.to_string()))
    }

    fn add_private_key(&self, key: PrivateKey) -> ChainResult<PublicKey> {
        let public_key = key.public_key(&self.prefix);
        self.keys.insert(public_key.clone(), key);
        Ok(public_key)
    }

    fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.iter().map(|r| r.key().clone()).collect()
    }
}

/// Wallet facade over a key store.
#[derive(Clone)]
pub struct Wallet {
    store: Arc<dyn KeyStore>,
    prefix: String,
}

impl Wallet {
    /// Wallet backed by an in-memory store.
    pub fn in_memory(prefix: &str) -> Self {
        Self::with_store(Arc::new(InMemoryKeyStore::new(prefix)), prefix)
    }

    pub fn with_store(store: Arc<dyn KeyStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
        }
    }

    /// Load keys from `TUSC_WIF` into an in-memory wallet.
    pub fn from_env(prefix: &str) -> ChainResult<Self> {
        let wifs = std::env::var(WIF_ENV_VAR).map_err(|_| {
            ChainError::Wallet(format!("Environment variable {} not set", WIF_ENV_VAR))
        })?;

        let wallet = Self::in_memory(prefix);
        for wif in wifs.split(',').filter(|w| !w.trim().is_empty()) {
            wallet.add_private_key(wif)?;
        }
        Ok(wallet)
    }

    /// Import a WIF key, returning its public key.
    pub fn add_private_key(&self, wif: &str) -> ChainResult<PublicKey> {
        let key = PrivateKey::from_wif(wif)?;
        let public_key = self.store.add_private_key(key)?;
        tracing::info!(public_key = %public_key, "Key added to wallet");
        Ok(public_key)
    }

    pub fn get_private_key(&self, public_key: &PublicKey) -> ChainResult<PrivateKey> {
        self.store.get_private_key(public_key)
    }

    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.store.public_keys()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("prefix", &self.prefix)
            .field("keys", &self.store.public_keys().len())
            .finish()
    }
}
