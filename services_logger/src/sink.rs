//! Dual stdout/file sink with a line cap

use crate::LogEntry;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default cap on lines written to the log file
pub const DEFAULT_MAX_LOG_LINES: usize = 10_000;

/// Audit log sink
///
/// Every entry goes to the console. When a file is attached, entries also go
/// to the file until the line cap is reached.
///
/// # Examples
///
/// ```
/// use services_logger::{KernelLog, LogEntry};
///
/// let mut log = KernelLog::with_console(Vec::new());
/// log.emit(&LogEntry::info("OSS: hello"));
/// assert_eq!(log.console_lines(), 1);
/// ```
pub struct KernelLog {
    console: Box<dyn Write + Send>,
    file: Option<FileSink>,
    max_lines: usize,
    console_lines: usize,
}

struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    lines_written: usize,
    capped: bool,
}

impl KernelLog {
    /// Logs to stdout only
    pub fn stdout() -> Self {
        Self::with_console(io::stdout())
    }

    /// Logs to the given console writer only
    pub fn with_console(console: impl Write + Send + 'static) -> Self {
        Self {
            console: Box::new(console),
            file: None,
            max_lines: DEFAULT_MAX_LOG_LINES,
            console_lines: 0,
        }
    }

    /// Sets the file line cap
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Creates (truncating) the log file and attaches it
    pub fn attach_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        self.file = Some(FileSink {
            path,
            writer: BufWriter::new(file),
            lines_written: 0,
            capped: false,
        });
        Ok(())
    }

    /// Writes an entry to the console and the file
    pub fn emit(&mut self, entry: &LogEntry) {
        self.emit_to(entry, true);
    }

    /// Writes an entry to the console, and to the file only when `to_file`
    pub fn emit_to(&mut self, entry: &LogEntry, to_file: bool) {
        if let Some(source) = entry.source {
            tracing::trace!(%source, level = ?entry.level, to_file, "kernel log entry");
        }
        let text = entry.render();
        self.write_console(&text);
        if to_file {
            self.write_file(&text);
        }
    }

    /// Lines written to the file so far
    pub fn file_lines(&self) -> usize {
        self.file.as_ref().map_or(0, |file| file.lines_written)
    }

    /// Lines written to the console so far
    pub fn console_lines(&self) -> usize {
        self.console_lines
    }

    /// Whether the file has reached its cap
    pub fn is_capped(&self) -> bool {
        self.file.as_ref().is_some_and(|file| file.capped)
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path.as_path())
    }

    /// Flushes both sinks
    pub fn flush(&mut self) {
        let _ = self.console.flush();
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.writer.flush() {
                tracing::warn!(path = %file.path.display(), error = %err, "log file flush failed");
            }
        }
    }

    fn write_console(&mut self, text: &str) {
        // A closed stdout must not stop the kernel.
        if self.console.write_all(text.as_bytes()).is_ok() {
            self.console_lines += line_count(text);
        }
    }

    fn write_file(&mut self, text: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if file.capped {
            return;
        }
        let lines = line_count(text);
        if file.lines_written + lines > self.max_lines {
            file.capped = true;
            tracing::debug!(path = %file.path.display(), max_lines = self.max_lines, "log file cap reached");
            return;
        }
        match file.writer.write_all(text.as_bytes()) {
            Ok(()) => file.lines_written += lines,
            Err(err) => {
                tracing::warn!(path = %file.path.display(), error = %err, "log file write failed; disabling file");
                self.file = None;
            }
        }
    }
}

impl Drop for KernelLog {
    fn drop(&mut self) {
        self.flush();
    }
}

fn line_count(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_console_receives_everything() {
        let buf = SharedBuf::default();
        let mut log = KernelLog::with_console(buf.clone());
        log.emit(&LogEntry::info("one"));
        log.emit_to(&LogEntry::info("two"), false);
        assert_eq!(buf.text(), "one\ntwo\n");
        assert_eq!(log.console_lines(), 2);
    }

    #[test]
    fn test_file_respects_to_file_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oss.log");
        let mut log = KernelLog::with_console(io::sink());
        log.attach_file(&path).unwrap();

        log.emit(&LogEntry::info("kept"));
        log.emit_to(&LogEntry::info("console only"), false);
        log.flush();

        assert_eq!(fs::read_to_string(&path).unwrap(), "kept\n");
        assert_eq!(log.file_lines(), 1);
    }

    #[test]
    fn test_message_crossing_cap_is_dropped_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oss.log");
        let mut log = KernelLog::with_console(io::sink()).with_max_lines(3);
        log.attach_file(&path).unwrap();

        log.emit(&LogEntry::info("a\nb"));
        log.emit(&LogEntry::info("c\nd"));
        // Would fit on its own, but the file is already capped.
        log.emit(&LogEntry::info("e"));
        log.flush();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
        assert!(log.is_capped());
        assert_eq!(log.file_lines(), 2);
    }

    #[test]
    fn test_console_unaffected_by_cap() {
        let buf = SharedBuf::default();
        let dir = tempfile::tempdir().unwrap();
        let mut log = KernelLog::with_console(buf.clone()).with_max_lines(1);
        log.attach_file(dir.path().join("oss.log")).unwrap();

        for i in 0..5 {
            log.emit(&LogEntry::info(format!("line {i}")));
        }
        assert_eq!(log.console_lines(), 5);
        assert_eq!(log.file_lines(), 1);
    }

    #[test]
    fn test_attach_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oss.log");
        fs::write(&path, "stale\n").unwrap();

        let mut log = KernelLog::with_console(io::sink());
        log.attach_file(&path).unwrap();
        log.emit(&LogEntry::info("fresh"));
        drop(log);

        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_attach_file_bad_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = KernelLog::with_console(io::sink());
        assert!(log.attach_file(dir.path().join("missing/oss.log")).is_err());
        assert!(log.file_path().is_none());
    }
}
