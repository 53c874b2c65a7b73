//! Shared types for the oracle node.
//!
//! Every other crate in the workspace speaks in terms of these types: ledger
//! addresses, raw and decoded contract events, chain-head records, the job
//! requests handed to the job pipeline, and fulfillment receipts.

pub mod address;
pub mod events;
pub mod fulfillment;
pub mod head;
pub mod pipeline;

pub use address::*;
pub use events::*;
pub use fulfillment::*;
pub use head::*;
pub use pipeline::*;
