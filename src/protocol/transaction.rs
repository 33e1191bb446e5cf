//! Signed transaction envelope.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Error, Write};

use crate::blockchain::types::{ChainError, ChainResult};
use crate::blockchain::wallet::PrivateKey;
use crate::protocol::encoding::{serialize, ChainEncode, Extensions};
use crate::protocol::operations::Operation;
use crate::protocol::types::TimePointSec;

/// A transaction as broadcast to the node.
///
/// Signatures are hex-encoded 65-byte compact signatures over
/// `sha256(chain_id || binary(tx))`, where the binary form excludes the
/// signatures themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: TimePointSec,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub extensions: Extensions,
    #[serde(default)]
    pub signatures: Vec<String>,
}

impl SignedTransaction {
    pub fn new(
        ref_block_num: u16,
        ref_block_prefix: u32,
        expiration: TimePointSec,
        operations: Vec<Operation>,
    ) -> Self {
        Self {
            ref_block_num,
            ref_block_prefix,
            expiration,
            operations,
            extensions: Extensions,
            signatures: Vec::new(),
        }
    }

    /// Reference block fields from a head block number and id.
    ///
    /// The prefix is bytes 4..8 of the block id read little-endian.
    pub fn ref_block(head_block_number: u64, head_block_id: &str) -> ChainResult<(u16, u32)> {
        let id = hex::decode(head_block_id)
            .map_err(|e| ChainError::malformed(format!("invalid block id '{}': {}", head_block_id, e)))?;
        let prefix: [u8; 4] = id
            .get(4..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| ChainError::malformed(format!("block id too short: {}", head_block_id)))?;
        Ok(((head_block_number & 0xffff) as u16, u32::from_le_bytes(prefix)))
    }

    /// Digest signed by each key.
    pub fn digest(&self, chain_id: &str) -> ChainResult<[u8; 32]> {
        let chain = hex::decode(chain_id)
            .map_err(|e| ChainError::malformed(format!("invalid chain id '{}': {}", chain_id, e)))?;
        let mut hasher = Sha256::new();
        hasher.update(&chain);
        hasher.update(serialize(self)?);
        Ok(hasher.finalize().into())
    }

    /// Transaction id: the first 20 bytes of `sha256(binary(tx))`, hex.
    pub fn id(&self) -> ChainResult<String> {
        let hash = Sha256::digest(serialize(self)?);
        Ok(hex::encode(&hash[..20]))
    }

    /// Append one signature per key. Existing signatures are kept.
    pub fn sign(&mut self, keys: &[PrivateKey], chain_id: &str) -> ChainResult<()> {
        let digest = self.digest(chain_id)?;
        for key in keys {
            let signature = hex::encode(key.sign_digest(&digest)?);
            if !self.signatures.contains(&signature) {
                self.signatures.push(signature);
            }
        }
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }
}

impl ChainEncode for SignedTransaction {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        Ok(self.ref_block_num.encode(w)?
            + self.ref_block_prefix.encode(w)?
            + self.expiration.encode(w)?
            + self.operations.encode(w)?
            + self.extensions.encode(w)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::TEST_CHAIN_ID;
    use crate::blockchain::types::ObjectId;
    use crate::protocol::operations::Transfer;
    use crate::protocol::types::AssetAmount;

    const WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";

    fn sample() -> SignedTransaction {
        let op = Transfer::new(
            ObjectId::protocol(2, 0),
            ObjectId::protocol(2, 1),
            AssetAmount::new(1, ObjectId::protocol(3, 0)),
        );
        SignedTransaction::new(34294, 3707022213, TimePointSec(1_444_745_544), vec![op.into()])
    }

    #[test]
    fn test_ref_block() {
        assert!(SignedTransaction::ref_block(1, "000185f6856e7cdc0").is_err());
        assert!(SignedTransaction::ref_block(1, "000185f6").is_err());

        let (num, prefix) =
            SignedTransaction::ref_block(0x0001_85f6, "000185f6856e7cdc00000000000000000000000000").unwrap();
        assert_eq!(num, 0x85f6);
        assert_eq!(prefix, u32::from_le_bytes([0x85, 0x6e, 0x7c, 0xdc]));
    }

    #[test]
    fn test_binary_excludes_signatures() {
        let mut tx = sample();
        let unsigned = serialize(&tx).unwrap();
        assert_eq!(&unsigned[..2], &34294u16.to_le_bytes());
        assert_eq!(&unsigned[2..6], &3707022213u32.to_le_bytes());
        assert_eq!(&unsigned[6..10], &1_444_745_544u32.to_le_bytes());
        assert_eq!(unsigned[10], 1);

        let key = PrivateKey::from_wif(WIF).unwrap();
        tx.sign(&[key], TEST_CHAIN_ID).unwrap();
        assert_eq!(serialize(&tx).unwrap(), unsigned);
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.signatures[0].len(), 130);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = PrivateKey::from_wif(WIF).unwrap();
        let mut a = sample();
        let mut b = sample();
        a.sign(&[key.clone()], TEST_CHAIN_ID).unwrap();
        b.sign(&[key.clone(), key], TEST_CHAIN_ID).unwrap();
        assert_eq!(a.signatures, b.signatures);
        assert!(a.is_signed());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["ref_block_num"], 34294);
        assert_eq!(json["expiration"], "2015-10-13T14:12:24");
        assert_eq!(json["operations"][0][0], 0);
        assert_eq!(json["signatures"], serde_json::json!([]));
        assert_eq!(sample().id().unwrap().len(), 40);
    }

    #[test]
    fn test_digest_depends_on_chain() {
        let tx = sample();
        assert_ne!(tx.digest(TEST_CHAIN_ID).unwrap(), tx.digest(&"00".repeat(32)).unwrap());
        assert!(tx.digest("zz").is_err());
    }
}
