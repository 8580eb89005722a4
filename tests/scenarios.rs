//! End-to-end scenario tests exercising the dispatcher and garbage
//! collector through their public API, one test per named case
//! (host kill, partial single-file delete, terminal single-file
//! delete, retrieve-from-dir, stale-job GC, heap-sort property).
//!
//! These duplicate the assertions already made by the unit tests next
//! to each module, but drive the crate the way a caller outside the
//! crate would: through `dispatch_core::{dispatch, gc, sort}` only, with
//! no access to module-private helpers.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use dispatch_core::dispatch::Dispatcher;
use dispatch_core::deletelog::DeleteLog;
use dispatch_core::gc::{GcContext, GcParams, JobLoader};
use dispatch_core::pipe::protocol::Command;
use dispatch_core::shared::layout::{expected_size, Header, CURRENT_VERSION, DIR_ERROR_SET, FETCH_JOB};
use dispatch_core::shared::table::Record;
use dispatch_core::types::catalogue::{
    DirConfigRecord, DirConfigTable, DirNameRecord, DirNameTable, FileMaskRecord, FileMaskTable,
    PasswordRecord, PasswordTable,
};
use dispatch_core::types::connection::ConnectionTable;
use dispatch_core::types::fra::{DirStatus, Fra};
use dispatch_core::types::fsa::{Fsa, HostStatus};
use dispatch_core::types::ids::{JobId, PENDING};
use dispatch_core::types::jid::{JobCatalogue, JobRecord};
use dispatch_core::types::mdb::{CacheEntry, MessageCache};
use dispatch_core::types::queue::{Queue, QueueEntry};
use dispatch_core::sort::heapsort_desc;
use dispatch_core::worker::GlobalCounters;

fn make_table<R: Record>(dir: &Path, name: &str, records: &[R]) -> PathBuf {
    let path = dir.join(name);
    let mut f = File::create(&path).unwrap();
    let header = Header::new(records.len() as u32, CURRENT_VERSION);
    let mut buf = vec![0u8; expected_size(records.len() as u32, R::SIZE) as usize];
    header.write(&mut buf[..Header::SIZE]);
    for (i, r) in records.iter().enumerate() {
        let off = Header::SIZE + i * R::SIZE;
        r.write(&mut buf[off..off + R::SIZE]);
    }
    f.write_all(&buf).unwrap();
    path
}

/// Scenario 1: deleting all jobs for a host kills its live workers,
/// compacts their queue entries, and hard-resets the host's counters.
#[test]
fn host_kill_removes_jobs_and_resets_host() {
    let dir = tempfile::tempdir().unwrap();
    let file_dir = dir.path().join("files");
    std::fs::create_dir_all(&file_dir).unwrap();

    let host = HostStatus {
        host_alias: "hostA".into(),
        total_file_count: 2,
        active_transfers: 1,
        allowed_transfers: 2,
        ..Default::default()
    };
    let fsa_path = make_table(dir.path(), "fsa", &[host]);
    let cache_path = make_table(
        dir.path(),
        "mdb",
        &[CacheEntry {
            host_name: "hostA".into(),
            ..Default::default()
        }],
    );
    let queue_path = make_table(
        dir.path(),
        "queue",
        &[QueueEntry {
            msg_name: "5a/0/6012a_0001_0/".into(),
            pos: 0,
            pid: PENDING,
            connect_pos: -1,
            ..Default::default()
        }],
    );
    let fra_path = make_table(dir.path(), "fra", &Vec::<DirStatus>::new());

    let mut fsa: Fsa = Fsa::attach(&fsa_path).unwrap();
    let mut fra: Fra = Fra::attach(&fra_path).unwrap();
    let cache: MessageCache = MessageCache::attach(&cache_path).unwrap();
    let mut queue: Queue = Queue::attach(&queue_path).unwrap();
    let mut connections = ConnectionTable::default();
    let mut counters = GlobalCounters::default();
    let mut log_buf = Vec::new();
    let mut deletelog = DeleteLog::new(&mut log_buf);

    Dispatcher {
        queue: &mut queue,
        fsa: &mut fsa,
        fra: &mut fra,
        cache: &cache,
        connections: &mut connections,
        counters: &mut counters,
        deletelog: &mut deletelog,
        file_dir: &file_dir,
    }
    .apply(Command::DeleteAllJobsFromHost {
        host_alias: "hostA".into(),
    });

    assert_eq!(queue.count(), 0);
    assert_eq!(fsa.get(0).total_file_count, 0);
    assert_eq!(fsa.get(0).active_transfers, 0);
}

/// Scenario 2: removing one of several files of a pending job
/// decrements the job's remaining-file counters without removing it.
#[test]
fn single_file_delete_partial_keeps_queue_entry() {
    let dir = tempfile::tempdir().unwrap();
    let file_dir = dir.path().join("files");
    let staging = file_dir.join("5a/0/6012a_0001_0/");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(staging.join("data.bin"), vec![0u8; 10_000]).unwrap();

    let fsa_path = make_table(
        dir.path(),
        "fsa",
        &[HostStatus {
            host_alias: "hostA".into(),
            total_file_count: 1,
            total_file_size: 10_000,
            jobs_queued: 5,
            ..Default::default()
        }],
    );
    let cache_path = make_table(
        dir.path(),
        "mdb",
        &[CacheEntry {
            host_name: "hostA".into(),
            ..Default::default()
        }],
    );
    let queue_path = make_table(
        dir.path(),
        "queue",
        &[QueueEntry {
            msg_name: "5a/0/6012a_0001_0/".into(),
            pos: 0,
            pid: PENDING,
            connect_pos: -1,
            files_to_send: 3,
            file_size_to_send: 30_000,
            ..Default::default()
        }],
    );
    let fra_path = make_table(dir.path(), "fra", &Vec::<DirStatus>::new());

    let mut fsa: Fsa = Fsa::attach(&fsa_path).unwrap();
    let mut fra: Fra = Fra::attach(&fra_path).unwrap();
    let cache: MessageCache = MessageCache::attach(&cache_path).unwrap();
    let mut queue: Queue = Queue::attach(&queue_path).unwrap();
    let mut connections = ConnectionTable::default();
    let mut counters = GlobalCounters::default();
    let mut log_buf = Vec::new();
    let mut deletelog = DeleteLog::new(&mut log_buf);

    Dispatcher {
        queue: &mut queue,
        fsa: &mut fsa,
        fra: &mut fra,
        cache: &cache,
        connections: &mut connections,
        counters: &mut counters,
        deletelog: &mut deletelog,
        file_dir: &file_dir,
    }
    .apply(Command::DeleteSingleFile {
        msg_name: "5a/0/6012a_0001_0/".into(),
        file_name: "data.bin".into(),
    });

    assert_eq!(queue.count(), 1);
    assert_eq!(queue.get(0).files_to_send, 2);
    let host = fsa.get(0);
    assert_eq!(host.total_file_size, 0);
    assert_eq!(host.jobs_queued, 5);
    assert!(!log_buf.is_empty());
}

/// Scenario 3: removing the last file of a pending job drops its
/// remaining-file count to zero and the entry is compacted away.
#[test]
fn single_file_delete_terminal_removes_queue_entry() {
    let dir = tempfile::tempdir().unwrap();
    let file_dir = dir.path().join("files");
    let staging = file_dir.join("5a/0/6012a_0001_0/");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(staging.join("only.bin"), vec![0u8; 500]).unwrap();

    let fsa_path = make_table(
        dir.path(),
        "fsa",
        &[HostStatus {
            host_alias: "hostA".into(),
            total_file_count: 1,
            total_file_size: 500,
            jobs_queued: 2,
            ..Default::default()
        }],
    );
    let cache_path = make_table(
        dir.path(),
        "mdb",
        &[CacheEntry {
            host_name: "hostA".into(),
            ..Default::default()
        }],
    );
    let queue_path = make_table(
        dir.path(),
        "queue",
        &[QueueEntry {
            msg_name: "5a/0/6012a_0001_0/".into(),
            pos: 0,
            pid: PENDING,
            connect_pos: -1,
            files_to_send: 1,
            file_size_to_send: 500,
            ..Default::default()
        }],
    );
    let fra_path = make_table(dir.path(), "fra", &Vec::<DirStatus>::new());

    let mut fsa: Fsa = Fsa::attach(&fsa_path).unwrap();
    let mut fra: Fra = Fra::attach(&fra_path).unwrap();
    let cache: MessageCache = MessageCache::attach(&cache_path).unwrap();
    let mut queue: Queue = Queue::attach(&queue_path).unwrap();
    let mut connections = ConnectionTable::default();
    let mut counters = GlobalCounters::default();
    let mut log_buf = Vec::new();
    let mut deletelog = DeleteLog::new(&mut log_buf);

    Dispatcher {
        queue: &mut queue,
        fsa: &mut fsa,
        fra: &mut fra,
        cache: &cache,
        connections: &mut connections,
        counters: &mut counters,
        deletelog: &mut deletelog,
        file_dir: &file_dir,
    }
    .apply(Command::DeleteSingleFile {
        msg_name: "5a/0/6012a_0001_0/".into(),
        file_name: "only.bin".into(),
    });

    assert_eq!(queue.count(), 0);
    let host = fsa.get(0);
    assert_eq!(host.total_file_count, 0);
    assert_eq!(host.total_file_size, 0);
    assert_eq!(host.jobs_queued, 1);
    assert!(!staging.join("only.bin").exists());
}

/// Scenario 4: draining a directory's fetch queue tears down every
/// entry (active and pending alike) and resets the directory's status.
#[test]
fn retrieve_from_dir_drains_queue_and_resets_status() {
    let dir = tempfile::tempdir().unwrap();
    let file_dir = dir.path().join("files");
    std::fs::create_dir_all(&file_dir).unwrap();

    let fra_path = make_table(
        dir.path(),
        "fra",
        &[DirStatus {
            dir_alias: "in/feed".into(),
            error_counter: 3,
            dir_flag: DIR_ERROR_SET,
            queued: 3,
            next_check_time: 1_700_000_000,
            ..Default::default()
        }],
    );
    let queue_path = make_table(
        dir.path(),
        "queue",
        &[
            QueueEntry {
                msg_name: "5a/0/6012a_0001_0/".into(),
                pos: 0,
                pid: 77,
                connect_pos: -1,
                special_flag: FETCH_JOB,
                ..Default::default()
            },
            QueueEntry {
                msg_name: "5b/0/6012a_0002_0/".into(),
                pos: 0,
                pid: PENDING,
                connect_pos: -1,
                special_flag: FETCH_JOB,
                ..Default::default()
            },
            QueueEntry {
                msg_name: "5c/0/6012a_0003_0/".into(),
                pos: 0,
                pid: PENDING,
                connect_pos: -1,
                special_flag: FETCH_JOB,
                ..Default::default()
            },
        ],
    );
    let fsa_path = make_table(dir.path(), "fsa", &Vec::<HostStatus>::new());
    let cache_path = make_table(dir.path(), "mdb", &Vec::<CacheEntry>::new());

    let mut fsa: Fsa = Fsa::attach(&fsa_path).unwrap();
    let mut fra: Fra = Fra::attach(&fra_path).unwrap();
    let cache: MessageCache = MessageCache::attach(&cache_path).unwrap();
    let mut queue: Queue = Queue::attach(&queue_path).unwrap();
    let mut connections = ConnectionTable::default();
    let mut counters = GlobalCounters::default();
    let mut log_buf = Vec::new();
    let mut deletelog = DeleteLog::new(&mut log_buf);

    Dispatcher {
        queue: &mut queue,
        fsa: &mut fsa,
        fra: &mut fra,
        cache: &cache,
        connections: &mut connections,
        counters: &mut counters,
        deletelog: &mut deletelog,
        file_dir: &file_dir,
    }
    .apply(Command::DeleteRetrievesFromDir {
        dir_alias: "in/feed".into(),
    });

    assert_eq!(queue.count(), 0);
    let status = fra.get(0);
    assert_eq!(status.queued, 0);
    assert_eq!(status.error_counter, 0);
    assert!(!status.error_set());
}

struct NoopLoader;
impl JobLoader for NoopLoader {
    fn load(&mut self, _job_id: JobId) -> Option<CacheEntry> {
        None
    }
}

fn set_mtime(path: &Path, secs: u64) {
    let f = File::options().write(true).open(path).unwrap();
    f.set_modified(std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs))
        .unwrap();
}

/// Scenario 5: a start-up garbage-collection pass removes a stale job
/// and the catalogue entries no longer referenced by anything else,
/// compacting positional references in the surviving records.
#[test]
fn gc_removes_stale_job_and_unreferenced_catalogue_entries() {
    let dir = tempfile::tempdir().unwrap();
    let message_dir = dir.path().join("messages");
    let file_dir = dir.path().join("files");
    std::fs::create_dir_all(&message_dir).unwrap();
    std::fs::create_dir_all(&file_dir).unwrap();

    let stale_file = message_dir.join("deadbeef");
    std::fs::write(&stale_file, b"x").unwrap();
    set_mtime(&stale_file, 1_000_000);

    let cache_path = make_table(
        dir.path(),
        "mdb",
        &[CacheEntry {
            job_id: 0xdeadbeef,
            host_name: "hostA".into(),
            fsa_pos: 0,
            last_transfer_time: 1_000_000,
            in_current_fsa: false,
            ..Default::default()
        }],
    );

    let jid_path = make_table(
        dir.path(),
        "jid",
        &[
            JobRecord {
                job_id: 0xdeadbeef,
                dir_id_pos: 0,
                file_mask_id: 0,
                dir_config_id: 0,
                recipient: "ftp://alice:pw@host.example/incoming".into(),
            },
            JobRecord {
                job_id: 1,
                dir_id_pos: 1,
                file_mask_id: 1,
                dir_config_id: 1,
                recipient: "ftp://bob:pw@otherhost/incoming".into(),
            },
        ],
    );

    let dir_path = make_table(
        dir.path(),
        "dirnames",
        &[
            DirNameRecord { dir_name: "dir0".into() },
            DirNameRecord { dir_name: "dir1".into() },
        ],
    );
    let mask_path = make_table(
        dir.path(),
        "masks",
        &[
            FileMaskRecord { pattern: "*.old".into() },
            FileMaskRecord { pattern: "*.new".into() },
        ],
    );
    let pwb_path = make_table(
        dir.path(),
        "pwb",
        &[
            PasswordRecord {
                credential_key: "alice@host.example".into(),
                password: "pw".into(),
            },
            PasswordRecord {
                credential_key: "bob@otherhost".into(),
                password: "pw".into(),
            },
        ],
    );
    let dc_path = make_table(
        dir.path(),
        "dc",
        &[
            DirConfigRecord { name: "cfg0".into() },
            DirConfigRecord { name: "cfg1".into() },
        ],
    );
    let fsa_path = make_table(
        dir.path(),
        "fsa",
        &[HostStatus {
            host_alias: "hostA".into(),
            ..Default::default()
        }],
    );
    let queue_path = make_table(dir.path(), "queue", &Vec::<QueueEntry>::new());

    let mut queue: Queue = Queue::attach(&queue_path).unwrap();
    let mut cache: MessageCache = MessageCache::attach(&cache_path).unwrap();
    let mut fsa: Fsa = Fsa::attach(&fsa_path).unwrap();
    let mut jid: JobCatalogue = JobCatalogue::attach(&jid_path).unwrap();
    let mut dir_names: DirNameTable = DirNameTable::attach(&dir_path).unwrap();
    let mut file_masks: FileMaskTable = FileMaskTable::attach(&mask_path).unwrap();
    let mut passwords: PasswordTable = PasswordTable::attach(&pwb_path).unwrap();
    let mut dir_configs: DirConfigTable = DirConfigTable::attach(&dc_path).unwrap();
    let mut connections = ConnectionTable::default();
    let mut counters = GlobalCounters::default();
    let mut log_buf = Vec::new();
    let mut deletelog = DeleteLog::new(&mut log_buf);

    let report = GcContext {
        queue: &mut queue,
        cache: &mut cache,
        fsa: &mut fsa,
        jid: &mut jid,
        dir_names: &mut dir_names,
        file_masks: &mut file_masks,
        passwords: &mut passwords,
        dir_configs: &mut dir_configs,
        connections: &mut connections,
        counters: &mut counters,
        deletelog: &mut deletelog,
        message_dir: &message_dir,
        file_dir: &file_dir,
    }
    .run(
        &[],
        &mut NoopLoader,
        GcParams {
            now: 2_000_000,
            switch_file_time_secs: 1,
            max_output_log_files: 1,
        },
    );

    assert_eq!(report.jobs_removed, 1);
    assert_eq!(jid.count(), 1);
    assert_eq!(jid.get(0).job_id, 1);
    assert!(!stale_file.exists());
}

/// Scenario 6: heap sort of job-catalogue positions produces a
/// non-increasing permutation of the input, so removal can compact
/// from the tail forward without invalidating earlier indices.
#[test]
fn heapsort_desc_is_a_non_increasing_permutation() {
    let mut v = vec![5usize, 3, 9, 1, 9, 0, 42, 7];
    let mut expected = v.clone();
    heapsort_desc(&mut v);

    expected.sort_unstable();
    let mut sorted_input = expected;
    sorted_input.reverse();
    assert_eq!(v, sorted_input);

    for w in v.windows(2) {
        assert!(w[0] >= w[1]);
    }
}
