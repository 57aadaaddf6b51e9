//! Rolling Logger
//!
//! File logger with size-based rotation and an in-memory circular buffer of
//! the most recent lines. Installs a `tracing-subscriber` fmt subscriber;
//! `log` records reach it through the tracing-log bridge.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Rotate once the active file grows past this many bytes
pub const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;
/// Lines kept in the circular buffer
pub const DEFAULT_BUFFER_LINES: usize = 500;

static LOGGER: OnceLock<RollingLog> = OnceLock::new();

/// Options for [`init_logger_with`]
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub max_file_bytes: u64,
    pub buffer_lines: usize,
    pub level: Level,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            buffer_lines: DEFAULT_BUFFER_LINES,
            level: Level::INFO,
        }
    }
}

struct LogFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    recent: VecDeque<String>,
    capacity: usize,
    partial: String,
}

impl LogFile {
    fn rotated_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".1");
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let rotated = self.rotated_path();
        if rotated.exists() {
            std::fs::remove_file(&rotated)?;
        }
        std::fs::rename(&self.path, &rotated)?;
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }

    fn append(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        self.remember(buf);
        Ok(())
    }

    fn remember(&mut self, buf: &[u8]) {
        self.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']).to_string();
            if self.recent.len() == self.capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(line);
        }
    }
}

/// Handle to a rolling log file. Cheap to clone; every clone writes to the
/// same file and buffer.
#[derive(Clone)]
pub struct RollingLog {
    inner: Arc<Mutex<LogFile>>,
}

impl RollingLog {
    /// Open (append) the log file at `path`
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, capacity: usize) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            inner: Arc::new(Mutex::new(LogFile {
                path,
                file,
                written,
                max_bytes: max_bytes.max(1),
                recent: VecDeque::with_capacity(capacity.max(1)),
                capacity: capacity.max(1),
                partial: String::new(),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LogFile> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append raw bytes, rotating first when the limit would be exceeded
    pub fn append(&self, buf: &[u8]) -> io::Result<()> {
        self.lock().append(buf)
    }

    /// Newest `n` complete lines, oldest first
    pub fn recent_lines(&self, n: usize) -> Vec<String> {
        let guard = self.lock();
        let skip = guard.recent.len().saturating_sub(n);
        guard.recent.iter().skip(skip).cloned().collect()
    }

    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }
}

/// `io::Write` adapter handed out to the fmt subscriber
pub struct RollingWriter {
    log: RollingLog,
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingLog {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RollingWriter { log: self.clone() }
    }
}

/// Initialize logging into `<log_dir>/<app_name>.log` with default options
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), String> {
    init_logger_with(log_dir, app_name, LoggerOptions::default())
}

/// Initialize logging with explicit rotation/buffer/level options.
///
/// Fails (without panicking) when called twice or when another global
/// subscriber is already installed.
pub fn init_logger_with(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    options: LoggerOptions,
) -> Result<(), String> {
    if LOGGER.get().is_some() {
        return Err("Logger already initialized".to_string());
    }

    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create log dir {}: {}", log_dir.display(), e))?;

    let log = RollingLog::open(
        log_dir.join(format!("{}.log", app_name)),
        options.max_file_bytes,
        options.buffer_lines,
    )
    .map_err(|e| format!("Failed to open log file: {}", e))?;

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(true)
        .with_max_level(options.level)
        .with_writer(log.clone())
        .try_init()
        .map_err(|e| format!("Failed to install subscriber: {}", e))?;

    LOGGER
        .set(log.clone())
        .map_err(|_| "Logger already initialized".to_string())?;

    let banner = format!(
        "=== {} started {} ===\n",
        app_name,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
    );
    log.append(banner.as_bytes()).map_err(|e| e.to_string())?;
    log::debug!("rolling logger ready at {}", log.path().display());
    Ok(())
}

/// Log one line at info level
pub fn info(message: &str) -> Result<(), String> {
    LOGGER.get().ok_or("Logger not initialized")?;
    tracing::info!("{}", message);
    Ok(())
}

/// Log one line at error level
pub fn error(message: &str) -> Result<(), String> {
    LOGGER.get().ok_or("Logger not initialized")?;
    tracing::error!("{}", message);
    Ok(())
}

/// Newest `n` lines written since initialization
pub fn recent_lines(n: usize) -> Vec<String> {
    LOGGER
        .get()
        .map(|log| log.recent_lines(n))
        .unwrap_or_default()
}
