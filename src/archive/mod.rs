//! Archive production.
//!
//! Walks a source tree and writes it as a gzip-compressed tar stream into a
//! conduit, one entry at a time, so the whole archive never exists in memory
//! or on disk.
//!
//! ## Entry layout
//!
//! Every entry is named `<basename(root)>/<relative path>` with `/` separators
//! regardless of host conventions. Directories end in `/`. The root directory
//! itself is not emitted.
//!
//! ```text
//! /srv/daemon/web            web/a.txt      regular, 4 bytes payload
//!   ├── a.txt         ──▶    web/sub/       directory, no payload
//!   └── sub/
//! ```

/// Entry naming and classification
pub mod entry;

/// Tree walker writing tar.gz into a conduit
pub mod producer;

pub use entry::{archive_name, root_name, EntryKind};
pub use producer::{ArchiveProducer, ArchiveSummary};
