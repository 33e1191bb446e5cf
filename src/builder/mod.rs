//! Transaction and proposal builders.

pub mod proposal;
pub mod transaction;

pub use proposal::ProposalBuilder;
pub use transaction::{ProposalHandle, TransactionBuilder};
