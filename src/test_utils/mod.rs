//! Test utilities for rs-backup
//!
//! Shared helpers for the unit test modules: in-memory log sinks and
//! throwaway source trees.

#![cfg(test)]

use std::fs;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tempfile::TempDir;

use crate::logging::LogSinks;

/// Cloneable in-memory writer; every clone appends to the same buffer.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sinks that discard everything.
pub fn null_sinks() -> Arc<LogSinks> {
    Arc::new(LogSinks::from_writers(io::sink(), io::sink(), io::sink()))
}

/// Sinks recording into buffers, returned as `(sinks, info, warn, fatal)`.
pub fn buffered_sinks() -> (Arc<LogSinks>, SharedBuffer, SharedBuffer, SharedBuffer) {
    let info = SharedBuffer::default();
    let warn = SharedBuffer::default();
    let fatal = SharedBuffer::default();
    let sinks = LogSinks::from_writers(info.clone(), warn.clone(), fatal.clone());
    (Arc::new(sinks), info, warn, fatal)
}

/// A source root with two server directories:
///
/// ```text
/// web/index.html
/// web/static/app.js
/// web/static/empty/
/// db/dump.sql
/// ```
pub fn create_test_tree() -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let base = temp_dir.path();

    fs::create_dir_all(base.join("web/static/empty"))?;
    fs::create_dir_all(base.join("db"))?;

    fs::write(base.join("web/index.html"), b"<html><body>hello</body></html>")?;
    fs::write(base.join("web/static/app.js"), b"console.log('backup');\n".repeat(64))?;
    fs::write(base.join("db/dump.sql"), b"INSERT INTO t VALUES (1);\n".repeat(128))?;

    Ok(temp_dir)
}
