//! Audit table records and their lifecycle queries.
//!
//! The batch audit tables live in the warehouse ODS schema and are shared
//! with every other load process, so the queries here stay byte-compatible
//! with what the rest of the platform expects to find in them.

pub mod batch;
pub mod batch_detail;

pub use batch::Batch;
pub use batch_detail::{BatchDetail, DetailClose, NewBatchDetail};
