//! Ring buffer behind the `log` facade. Hosts drain it between steps so the
//! core never writes to stdout or stderr itself.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, OnceLock};

pub const DEFAULT_CAPACITY: usize = 4096;

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: log::Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<5} {}] {}", self.level, self.target, self.message)
    }
}

pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    dropped: u64,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity, dropped: 0 }
    }

    /// Appends `entry`, evicting the oldest entry when full.
    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }

    pub fn drain(&mut self) -> Vec<LogEntry> {
        self.entries.drain(..).collect()
    }

    pub fn entries(&self) -> &VecDeque<LogEntry> { &self.entries }

    /// Entries evicted since the buffer was created or last cleared.
    pub fn dropped(&self) -> u64 { self.dropped }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

static LOG_BUFFER: OnceLock<Mutex<LogBuffer>> = OnceLock::new();

pub fn global_buffer() -> &'static Mutex<LogBuffer> {
    LOG_BUFFER.get_or_init(|| Mutex::new(LogBuffer::new(DEFAULT_CAPACITY)))
}

struct BufferLogger;

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        if let Ok(mut buf) = global_buffer().lock() {
            buf.push(entry);
        }
    }

    fn flush(&self) {}
}

static LOGGER: BufferLogger = BufferLogger;

/// Installs the buffer as the global logger. Fails if another logger is set.
pub fn init_logger(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

pub fn drain_logs() -> Vec<LogEntry> {
    global_buffer()
        .lock()
        .map(|mut buf| buf.drain())
        .unwrap_or_default()
}

pub fn clear_logs() {
    if let Ok(mut buf) = global_buffer().lock() {
        buf.clear();
    }
}
