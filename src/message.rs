//! Plain-text messages signed with an account's memo key.
//!
//! The signed payload is the trimmed message followed by the metadata lines
//! (`account`, `memokey`, `block`, `timestamp`). Its sha256 digest is signed
//! and the result is wrapped in the armored form:
//!
//! ```text
//! -----BEGIN TUSC SIGNED MESSAGE-----
//! <message>
//! -----BEGIN META-----
//! account=<name>
//! memokey=<public key>
//! block=<head block number>
//! timestamp=<head block time>
//! -----BEGIN SIGNATURE-----
//! <hex compact signature>
//! -----END TUSC SIGNED MESSAGE-----
//! ```

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{ChainError, ChainResult};
use crate::blockchain::wallet::PublicKey;
use crate::objects::Account;

pub const MESSAGE_BEGIN: &str = "-----BEGIN TUSC SIGNED MESSAGE-----";
pub const META_BEGIN: &str = "-----BEGIN META-----";
pub const SIGNATURE_BEGIN: &str = "-----BEGIN SIGNATURE-----";
pub const MESSAGE_END: &str = "-----END TUSC SIGNED MESSAGE-----";

const MESSAGE_SPLIT: [&str; 4] = [MESSAGE_BEGIN, META_BEGIN, SIGNATURE_BEGIN, MESSAGE_END];

/// Chain context recorded alongside a signed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    pub account: String,
    pub memokey: String,
    pub block: String,
    pub timestamp: String,
}

impl MessageMeta {
    fn from_lines(text: &str) -> ChainResult<Self> {
        let mut account = None;
        let mut memokey = None;
        let mut block = None;
        let mut timestamp = None;
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim_start();
            if key.is_empty() || key.contains(char::is_whitespace) {
                continue;
            }
            let value = Some(value.trim_end_matches('\r').to_string());
            match key {
                "account" => account = value,
                "memokey" => memokey = value,
                "block" => block = value,
                "timestamp" => timestamp = value,
                _ => {}
            }
        }
        let missing = |field: &str| ChainError::malformed(format!("signed message lacks '{}' in meta", field));
        Ok(Self {
            account: account.ok_or_else(|| missing("account"))?,
            memokey: memokey.ok_or_else(|| missing("memokey"))?,
            block: block.ok_or_else(|| missing("block"))?,
            timestamp: timestamp.ok_or_else(|| missing("timestamp"))?,
        })
    }
}

fn signed_payload(message: &str, meta: &MessageMeta) -> [u8; 32] {
    let payload = format!(
        "{}\naccount={}\nmemokey={}\nblock={}\ntimestamp={}",
        message, meta.account, meta.memokey, meta.block, meta.timestamp
    );
    Sha256::digest(payload.as_bytes()).into()
}

/// A message together with its metadata and signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    message: String,
    meta: MessageMeta,
    signature: String,
}

impl SignedMessage {
    /// Split an armored message into its parts without checking the signature.
    pub fn parse(text: &str) -> ChainResult<Self> {
        let mut parts = vec![text];
        for marker in MESSAGE_SPLIT {
            parts = parts.into_iter().flat_map(|part| part.split(marker)).collect();
        }
        parts.retain(|part| !part.trim().is_empty());
        if parts.len() < 3 {
            return Err(ChainError::malformed("incorrect number of signed message parts"));
        }

        Ok(Self {
            message: parts[0].trim().to_string(),
            meta: MessageMeta::from_lines(parts[1])?,
            signature: parts[2].trim().to_string(),
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn meta(&self) -> &MessageMeta {
        &self.meta
    }

    /// Hex encoded compact signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Key that produced the signature.
    pub fn signer_key(&self, prefix: &str) -> ChainResult<PublicKey> {
        let bytes = hex::decode(&self.signature)
            .map_err(|e| ChainError::InvalidSignature(format!("signature is not hex: {}", e)))?;
        let signature: [u8; 65] = bytes
            .try_into()
            .map_err(|_| ChainError::InvalidSignature("signature must be 65 bytes".to_string()))?;
        PublicKey::recover(&signed_payload(&self.message, &self.meta), &signature, prefix)
    }
}

impl fmt::Display for SignedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", MESSAGE_BEGIN)?;
        writeln!(f, "{}", self.message)?;
        writeln!(f, "{}", META_BEGIN)?;
        writeln!(f, "account={}", self.meta.account)?;
        writeln!(f, "memokey={}", self.meta.memokey)?;
        writeln!(f, "block={}", self.meta.block)?;
        writeln!(f, "timestamp={}", self.meta.timestamp)?;
        writeln!(f, "{}", SIGNATURE_BEGIN)?;
        writeln!(f, "{}", self.signature)?;
        write!(f, "{}", MESSAGE_END)
    }
}

/// Signs and verifies messages against accounts on chain.
#[derive(Debug, Clone)]
pub struct Message {
    text: String,
    instance: BlockchainInstance,
}

impl Message {
    pub fn new(text: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        Ok(Self {
            text: text.to_string(),
            instance: BlockchainInstance::resolve(instance)?,
        })
    }

    /// Sign the message with the memo key of `account`.
    ///
    /// The memo key's private key must be in the instance wallet.
    pub async fn sign(&self, account: &str) -> ChainResult<SignedMessage> {
        let account = Account::new(account, Some(&self.instance)).await?;
        let memokey = account
            .memo_key()
            .ok_or_else(|| ChainError::malformed(format!("account {} has no memo key", account.name())))?;
        let public_key: PublicKey = memokey.parse()?;
        let private_key = self.instance.wallet().get_private_key(&public_key)?;

        let info = self.instance.rpc().get_dynamic_global_properties().await?;
        let block = info
            .get("head_block_number")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::Rpc("dynamic global properties lack head_block_number".to_string()))?;
        let timestamp = info
            .get("time")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::Rpc("dynamic global properties lack time".to_string()))?;

        let message = self.text.trim().to_string();
        let meta = MessageMeta {
            account: account.name().to_string(),
            memokey: memokey.to_string(),
            block: block.to_string(),
            timestamp: timestamp.to_string(),
        };
        let signature = private_key.sign_digest(&signed_payload(&message, &meta))?;

        tracing::debug!(account = %meta.account, block, "Message signed");
        Ok(SignedMessage {
            message,
            meta,
            signature: hex::encode(signature),
        })
    }

    /// Check an armored message against the signer's current memo key.
    pub async fn verify(&self) -> ChainResult<SignedMessage> {
        let signed = SignedMessage::parse(&self.text)?;
        let meta = signed.meta();

        let account = Account::new(&meta.account, Some(&self.instance)).await?;
        if account.memo_key() != Some(meta.memokey.as_str()) {
            return Err(ChainError::InvalidSignature(format!(
                "memo key of {} on chain differs from {}",
                account.name(),
                meta.memokey
            )));
        }

        let signer = signed.signer_key(&self.instance.chain().prefix)?;
        if signer.to_string() != meta.memokey {
            return Err(ChainError::InvalidSignature(format!(
                "message was not signed by {}",
                meta.memokey
            )));
        }
        Ok(signed)
    }
}
