use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const ROTATE_AT: u64 = 5 << 20;
/// Tail retained by a rotation
const RETAIN: u64 = 1 << 20;

pub const LOG_FILE: &str = "chipet.log";

/// Cut a run log that grew past `ROTATE_AT` down to its last `RETAIN` bytes,
/// starting at a line boundary.
fn rotate(log_path: &Path) -> io::Result<()> {
    let len = match fs::metadata(log_path) {
        Ok(meta) if meta.len() > ROTATE_AT => meta.len(),
        _ => return Ok(()),
    };

    let mut tail = Vec::with_capacity(RETAIN as usize);
    {
        let mut log = File::open(log_path)?;
        log.seek(SeekFrom::Start(len - RETAIN))?;
        log.read_to_end(&mut tail)?;
    }
    let start = tail.iter().position(|&b| b == b'\n').map_or(0, |i| i + 1);

    let mut log = File::create(log_path)?;
    writeln!(log, "--- chipet.log rotated, earlier runs dropped ---")?;
    log.write_all(&tail[start..])
}

/// Hands every layer event a writer onto the same run log
#[derive(Clone)]
struct RunLog {
    file: Arc<Mutex<File>>,
}

struct RunLogWriter {
    file: Arc<Mutex<File>>,
}

impl RunLogWriter {
    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("run log lock poisoned"))?;
        f(&mut file)
    }
}

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for RunLog {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Initialize logging to stderr and, when a run directory is given, to
/// `{run_dir}/chipet.log`.
///
/// The run log is rotated by size: past 5MB only the last 1MB is kept.
/// `RUST_LOG` overrides `level`.
pub fn init_logging(run_dir: Option<&Path>, level: &str) -> color_eyre::Result<()> {
    let run_log = match run_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let log_path = dir.join(LOG_FILE);
            if let Err(e) = rotate(&log_path) {
                eprintln!("chipet: could not rotate {}: {e}", log_path.display());
            }
            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            Some((
                log_path,
                RunLog {
                    file: Arc::new(Mutex::new(file)),
                },
            ))
        }
        None => None,
    };

    let default_filter = format!("chipet={level},chipet_core=info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let file_layer = run_log.as_ref().map(|(_, writer)| {
        fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();

    if let Some((log_path, _)) = &run_log {
        tracing::info!("chipet logging initialized (log_path={})", log_path.display());
    }
    Ok(())
}
