//! Dedup index path computation: per-job `STORE`/`CRC` directories used
//! by upstream workers to suppress duplicate deliveries, garbage
//! collected here when the owning directory/job is removed (spec.md
//! §3, §GLOSSARY).

use std::path::{Path, PathBuf};

use crate::types::ids::DirPos;

pub struct DedupPaths {
    pub store: PathBuf,
    pub crc: PathBuf,
}

impl DedupPaths {
    pub fn for_dir(file_dir: &Path, dir_id: DirPos) -> Self {
        Self {
            store: file_dir.join("STORE").join(dir_id.get().to_string()),
            crc: file_dir.join("CRC").join(dir_id.get().to_string()),
        }
    }
}
