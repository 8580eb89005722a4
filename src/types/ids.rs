//! Plain index types used as cross-references between tables.
//!
//! Per the design notes in `SPEC_FULL.md` §9: cross-references between
//! tables are modeled as copyable index newtypes, never as borrowed
//! references, because any one table's compaction requires revisiting
//! every other table's references to it.

use std::fmt;

macro_rules! index_type {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
        pub struct $name(pub usize);

        impl $name {
            pub const fn new(v: usize) -> Self {
                Self(v)
            }

            pub fn get(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self(v)
            }
        }
    };
}

index_type!(FsaPos);
index_type!(FraPos);
index_type!(CachePos);
index_type!(JidPos);
index_type!(DirPos);
index_type!(MaskId);
index_type!(DirConfigId);

/// Job identifier: a 32-bit value rendered as lowercase hex in file
/// names (`ALTERNATE_FILE.<hex id>`, message-directory file names).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u32);

impl JobId {
    pub fn parse_hex(s: &str) -> Option<Self> {
        u32::from_str_radix(s, 16).ok().map(Self)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Sentinel process id used for queue entries awaiting a worker.
pub const PENDING: i32 = 0;
