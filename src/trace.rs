//! Protocol trace sink (`-d` flag).
//!
//! Distinct from `log`-based diagnostics: downstream tooling greps the
//! historical `#<class>L<line><dir> ...` line format, so this is a plain
//! append-only text file rather than a structured log target.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// Scanner-class trace line (`#02L<n>...`).
pub const CLASS_SCANNER: &str = "02";
/// LIB-class trace line (`#04L<n>...`).
pub const CLASS_LIB: &str = "04";

/// Direction marker for a transmitted/requested trace line.
pub const DIR_OUT: &str = ">";
/// Direction marker for a received/responded trace line.
pub const DIR_IN: &str = "<";

/// Append-only protocol trace file, enabled by `-d`.
///
/// Cheaply `Clone`able (an `Arc<Mutex<File>>` underneath) since the
/// scanner, LIB and DLSw/Null-Modem workers all append to the same file
/// concurrently, interleaved by class/line/direction rather than split
/// across per-worker files.
#[derive(Clone)]
pub struct Tracer {
    file: Arc<Mutex<File>>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Tracer {
    /// Open (truncating) the trace file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create trace file {}", path.display()))?;
        Ok(Self { file: Arc::new(Mutex::new(file)) })
    }

    /// Write one trace line: `#<class>L<line><dir> <body>`.
    pub fn line(&mut self, class: &str, line: u16, dir: &str, body: &str) {
        let mut file = self.file.lock().expect("trace file mutex poisoned");
        let _ = writeln!(file, "#{class}L{line}{dir} {body}");
        let _ = file.flush();
    }
}

/// Optional tracer: `None` when `-d` was not given.
pub type OptionalTracer = Option<Tracer>;

/// Write a trace line only if a tracer is present.
pub fn trace(tracer: &mut OptionalTracer, class: &str, line: u16, dir: &str, body: &str) {
    if let Some(t) = tracer {
        t.line(class, line, dir, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_expected_line_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.log");
        let mut tracer = Tracer::open(&path).unwrap();
        tracer.line(CLASS_SCANNER, 20, DIR_OUT, "7E C1 11 47 0F 7E");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "#02L20> 7E C1 11 47 0F 7E\n");
    }

    #[test]
    fn optional_trace_is_noop_when_absent() {
        let mut tracer: OptionalTracer = None;
        trace(&mut tracer, CLASS_LIB, 1, DIR_IN, "ignored");
    }
}
