use crate::command::Engine;
use crate::resp::{RespError, RespReader, RespValue};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Period of the background fsync task.
pub const FSYNC_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    Always,
    Everysec,
    No,
}

impl FsyncPolicy {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "always" => Some(FsyncPolicy::Always),
            "everysec" => Some(FsyncPolicy::Everysec),
            "no" => Some(FsyncPolicy::No),
            _ => None,
        }
    }
}

/// Append-only file of write commands.
///
/// Appends, periodic syncs and close are serialized by one mutex that is
/// independent of the store lock.
#[derive(Debug)]
pub struct Aof {
    file: Mutex<Option<File>>,
    fsync_policy: FsyncPolicy,
}

pub type SharedAof = Arc<Aof>;

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "AOF is closed")
}

impl Aof {
    /// Open or create the AOF file. Existing contents are kept.
    pub fn open(path: impl AsRef<Path>, policy: FsyncPolicy) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        Ok(Aof {
            file: Mutex::new(Some(file)),
            fsync_policy: policy,
        })
    }

    /// Append already-encoded bytes.
    pub async fn append(&self, data: &[u8]) -> io::Result<()> {
        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or_else(closed_error)?;
        file.write_all(data)?;

        if self.fsync_policy == FsyncPolicy::Always {
            file.sync_data()?;
        }

        Ok(())
    }

    /// Log a write command as the RESP array `[cmd_name, args...]`.
    pub async fn log_command(&self, cmd_name: &str, args: &[RespValue]) -> io::Result<()> {
        let mut items = Vec::with_capacity(1 + args.len());
        items.push(RespValue::bulk_string(cmd_name.as_bytes().to_vec()));
        items.extend(args.iter().cloned());
        self.append(&RespValue::array(items).serialize()).await
    }

    /// Force appended data to stable storage. A no-op once closed.
    pub async fn sync(&self) -> io::Result<()> {
        let guard = self.file.lock().await;
        match guard.as_ref() {
            Some(file) => file.sync_data(),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub async fn is_open(&self) -> bool {
        self.file.lock().await.is_some()
    }

    /// Sync and release the file handle. Later appends fail.
    pub async fn close(&self) -> io::Result<()> {
        let mut guard = self.file.lock().await;
        match guard.take() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }
}

/// Background task that syncs the AOF every `period` until `cancel` fires.
pub fn spawn_fsync_task(
    aof: SharedAof,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = cancel.cancelled() => {
                    debug!("AOF fsync task stopped");
                    return;
                }
            }
            if let Err(e) = aof.sync().await {
                warn!("AOF fsync failed: {e}");
            }
        }
    })
}

/// What a replay got through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Replay {
    /// Commands executed.
    pub commands: usize,
    /// Length of the file prefix made of complete records.
    pub valid_len: u64,
}

/// Replay an AOF file through `engine` to restore state.
///
/// A missing file replays nothing. A truncated or corrupt tail stops the
/// replay; everything before it stays applied and `valid_len` marks where
/// it starts.
pub async fn replay(path: impl AsRef<Path>, engine: &Engine) -> io::Result<Replay> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
        Err(e) => return Err(e),
    };

    let mut reader = RespReader::new(io::BufReader::new(file));
    let mut cmd_count = 0usize;

    loop {
        let value = match reader.read_value() {
            Ok(Some(v)) => v,
            Ok(None) => break,
            Err(RespError::Io(e)) => return Err(e),
            Err(e) => {
                warn!(
                    "AOF {} ends with an unreadable record after {cmd_count} commands: {e}",
                    path.display()
                );
                break;
            }
        };

        match &value {
            RespValue::Array(items) if !items.is_empty() => {}
            _ => continue,
        }

        if let RespValue::Error(msg) = engine.replay(value).await {
            warn!("AOF command rejected during replay: {msg}");
        }
        cmd_count += 1;
    }

    info!("AOF replayed {cmd_count} commands from {}", path.display());
    Ok(Replay {
        commands: cmd_count,
        valid_len: reader.position(),
    })
}

/// Cut the AOF back to its first `valid_len` bytes so that new appends
/// follow the last complete record. Returns true if a tail was removed.
pub fn truncate_tail(path: impl AsRef<Path>, valid_len: u64) -> io::Result<bool> {
    let path = path.as_ref();
    let file = match OpenOptions::new().write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let len = file.metadata()?.len();
    if len <= valid_len {
        return Ok(false);
    }

    warn!(
        "Truncating AOF {} from {len} to {valid_len} bytes, dropping an incomplete tail",
        path.display()
    );
    file.set_len(valid_len)?;
    file.sync_all()?;
    Ok(true)
}
