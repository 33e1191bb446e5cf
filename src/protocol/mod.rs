//! Wire types: binary encoding, operations and transactions.

pub mod encoding;
pub mod operations;
pub mod transaction;
pub mod types;

pub use encoding::{serialize, ChainEncode, Extensions};
pub use operations::{
    LimitOrderCancel, LimitOrderCreate, Operation, OperationKind, ProposalCreate, ProposalUpdate,
    ProposedOperation, Transfer,
};
pub use transaction::SignedTransaction;
pub use types::{AssetAmount, Memo, TimePointSec};
