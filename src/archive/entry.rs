use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};

/// Kind of filesystem entry as recorded in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
    Symlink,
    /// FIFOs and device nodes, stored as header-only entries
    Special,
    /// Sockets and anything tar has no entry type for
    Unsupported,
}

impl EntryKind {
    /// Classify without following symlinks; `metadata` must come from `symlink_metadata`.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::Regular
        } else if is_special(&file_type) {
            EntryKind::Special
        } else {
            EntryKind::Unsupported
        }
    }
}

#[cfg(unix)]
fn is_special(file_type: &std::fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    file_type.is_fifo() || file_type.is_char_device() || file_type.is_block_device()
}

#[cfg(not(unix))]
fn is_special(_file_type: &std::fs::FileType) -> bool {
    false
}

/// Final component of the root path, used as the stem of the object key
/// and in log records.
pub fn root_name(root: &Path) -> Option<String> {
    root.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// Name of an entry inside the archive: the root's final component joined
/// with the normal components of `relative`.
///
/// Names keep the file system's raw bytes. Directories end with `/`.
pub fn archive_name(root: &Path, relative: &Path, kind: EntryKind) -> PathBuf {
    let mut name = PathBuf::from(root.file_name().unwrap_or(root.as_os_str()));
    for component in relative.components() {
        if let Component::Normal(part) = component {
            name.push(part);
        }
    }
    if kind == EntryKind::Directory {
        name.push("");
    }
    name
}
