//! Dispatch-core: the command dispatcher and catalogue garbage
//! collector at the heart of an automatic file-distribution daemon
//! (spec.md §1-§2).

pub mod config;
pub mod deletelog;
pub mod dispatch;
pub mod error;
pub mod gc;
pub mod lifecycle;
pub mod pipe;
pub mod shared;
pub mod sort;
pub mod types;
pub mod worker;
