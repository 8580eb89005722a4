mod args;

use std::process::ExitCode;

use clap::Parser;
use tokio::select;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use args::Args;
use dispatch_core::config::Config;
use dispatch_core::deletelog::DeleteLog;
use dispatch_core::gc::{GcContext, GcParams};
use dispatch_core::lifecycle::{barriers, exitcodes, notify, signals};
use dispatch_core::pipe::{self, PipeEvent};
use dispatch_core::shared::layout::CATALOGUE_STRUCT_LOCK_OFFSET;
use dispatch_core::shared::lock::RangeLock;
use dispatch_core::types::catalogue::{DirConfigTable, DirNameTable, FileMaskTable, PasswordTable};
use dispatch_core::types::connection::ConnectionTable;
use dispatch_core::types::fra::Fra;
use dispatch_core::types::fsa::Fsa;
use dispatch_core::types::jid::JobCatalogue;
use dispatch_core::types::mdb::MessageCache;
use dispatch_core::types::queue::Queue;
use dispatch_core::worker::GlobalCounters;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt().with_max_level(Level::TRACE).init();
    } else {
        tracing_subscriber::fmt().json().init();
    }

    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(error) => {
            error!(%error, "failed to load configuration");
            return ExitCode::from(exitcodes::EXIT_INCORRECT as u8);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::from(exitcodes::EXIT_SUCCESS as u8),
        Err(error) => {
            error!(%error, "fatal error, exiting");
            ExitCode::from(exitcodes::EXIT_INCORRECT as u8)
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let mut queue: Queue = Queue::attach(config.queue_file())?;
    let mut cache: MessageCache = MessageCache::attach(config.cache_file())?;
    let mut fsa: Fsa = Fsa::attach(config.fsa_file())?;
    let mut fra: Fra = Fra::attach(config.fra_file())?;
    let mut jid: JobCatalogue = JobCatalogue::attach(config.jid_file())?;
    let mut dir_names: DirNameTable = DirNameTable::attach(config.dir_name_file())?;
    let mut file_masks: FileMaskTable = FileMaskTable::attach(config.file_mask_file())?;
    let mut passwords: PasswordTable = PasswordTable::attach(config.password_file())?;
    let mut dir_configs: DirConfigTable = DirConfigTable::attach(config.dir_config_file())?;
    let mut connections = ConnectionTable::default();
    let mut counters = GlobalCounters::default();

    info!("attached all persistent tables, waiting for configuration loader");
    barriers::wait_for_jid_writer(jid.region().bytes())?;

    // Cloned so the structure lock can outlive the `&mut jid` borrow
    // `GcContext` needs (`Region::try_clone_file`'s documented purpose).
    let jid_file = jid.region().try_clone_file()?;
    {
        let _struct_lock = RangeLock::acquire(&jid_file, CATALOGUE_STRUCT_LOCK_OFFSET, 1)?;

        let mut gc_delete_log = DeleteLog::new(notify::open_or_create_fifo(config.delete_log_fifo())?);

        // The external "current job list" and "external loader" named in
        // spec §4.2 phase 2 are owned by the configuration loader, a
        // separate process this crate does not implement; an empty list
        // and an always-absent loader are correct while that
        // collaborator has published nothing yet.
        let current_job_ids: Vec<dispatch_core::types::ids::JobId> = Vec::new();
        let mut loader = |_job_id: dispatch_core::types::ids::JobId| -> Option<dispatch_core::types::mdb::CacheEntry> { None };

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut gc = GcContext {
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
            deletelog: &mut gc_delete_log,
            message_dir: &config.message_dir(),
            file_dir: &config.file_dir,
        };
        let report = gc.run(
            &current_job_ids,
            &mut loader,
            GcParams {
                now,
                switch_file_time_secs: config.switch_file_time_secs,
                max_output_log_files: config.max_output_log_files,
            },
        );
        info!(?report, "start-up garbage collection complete");
    }

    let cancel = CancellationToken::new();
    signals::spawn_shutdown_listener(cancel.clone());

    notify::ensure_fifo_exists(config.delete_command_fifo())?;
    let pipe_reader = tokio::net::unix::pipe::OpenOptions::new()
        .open_receiver(config.delete_command_fifo())?;
    let mut frames = pipe::framed_read(pipe_reader);

    let (shutdown_hold, mut shutdown_wait) = mpsc::channel::<()>(1);
    let mut delete_log = DeleteLog::new(notify::open_or_create_fifo(config.delete_log_fifo())?);

    loop {
        let evt = select! {
            x = frames.next() => match x {
                None => {
                    info!("control pipe closed, exiting");
                    break;
                }
                Some(r) => r?,
            },
            _ = cancel.cancelled() => {
                info!("shutdown requested, exiting");
                break;
            }
        };

        let cmd = match evt {
            PipeEvent::Discarded => continue,
            PipeEvent::Command(cmd) => cmd,
        };

        let mut dispatcher = dispatch_core::dispatch::Dispatcher {
            queue: &mut queue,
            fsa: &mut fsa,
            fra: &mut fra,
            cache: &cache,
            connections: &mut connections,
            counters: &mut counters,
            deletelog: &mut delete_log,
            file_dir: &config.file_dir,
        };
        dispatcher.apply(cmd);
    }

    drop(shutdown_hold);
    let _ = shutdown_wait.recv().await;

    for region in [queue.region(), cache.region(), jid.region(), fsa.region()] {
        if let Err(error) = region.sync() {
            warn!(%error, "failed to sync table on shutdown");
        }
    }

    Ok(())
}
