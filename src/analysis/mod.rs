//! Report computation.
//!
//! The aggregator builds the receiving-only reports, the storage module
//! reconciles receiving against movement, and views derives the filtered
//! tables and chart series shown to the reader.

pub mod aggregator;
pub mod storage;
pub mod views;

pub use aggregator::*;
pub use storage::*;
pub use views::*;
