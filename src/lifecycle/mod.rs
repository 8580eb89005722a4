//! Component H: process lifecycle — start-up wait barriers, the
//! shutdown signal listener, the end-of-process notifier, and the two
//! exit codes (spec.md §2, §4.3, §6).

pub mod barriers;
pub mod exitcodes;
pub mod notify;
pub mod signals;
