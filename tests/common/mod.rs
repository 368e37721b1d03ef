//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use flate2::read::GzDecoder;
use rust_backup::cloud::ObjectAcl;
use rust_backup::jobs::JobOptions;
use rust_backup::logging::LogSinks;
use tar::{Archive, EntryType};

/// Cloneable in-memory log writer.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Logs {
    pub sinks: Arc<LogSinks>,
    pub info: Captured,
    pub warn: Captured,
    pub fatal: Captured,
}

pub fn capture_logs() -> Logs {
    let (info, warn, fatal) = (Captured::default(), Captured::default(), Captured::default());
    let sinks = Arc::new(LogSinks::from_writers(info.clone(), warn.clone(), fatal.clone()));
    Logs { sinks, info, warn, fatal }
}

/// Small parts and chunks so modest trees span several of each.
pub fn options(acl: ObjectAcl) -> JobOptions {
    JobOptions {
        conduit_capacity: 4,
        chunk_size: 4 * 1024,
        part_size: 64 * 1024,
        acl,
        compression_level: 6,
        max_concurrent_jobs: 4,
    }
}

/// One unpacked archive entry.
#[derive(Debug)]
pub struct Unpacked {
    pub kind: EntryType,
    pub size: u64,
    pub data: Vec<u8>,
}

/// Decode a tar.gz object into `name -> entry`, names without trailing `/`.
pub fn unpack(object: &[u8]) -> BTreeMap<String, Unpacked> {
    let mut archive = Archive::new(GzDecoder::new(object));
    let mut entries = BTreeMap::new();
    for entry in archive.entries().expect("readable archive") {
        let mut entry = entry.expect("valid entry");
        let name = entry
            .path()
            .expect("entry path")
            .to_string_lossy()
            .trim_end_matches('/')
            .to_string();
        let kind = entry.header().entry_type();
        let size = entry.header().size().expect("entry size");
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("entry payload");
        entries.insert(name, Unpacked { kind, size, data });
    }
    entries
}

/// Deterministic incompressible-ish bytes.
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}
