//! Global constants for the rs-backup application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Conduit and buffer size constants
/// Default size of one conduit chunk (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of chunks the conduit holds ahead of the uploader
pub const DEFAULT_CONDUIT_CAPACITY: usize = 16;

/// Default gzip compression level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

// Cloud storage constants
/// S3 minimum part size for multipart uploads (5MB)
pub const S3_MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default part size in megabytes
pub const DEFAULT_PART_SIZE_MB: usize = 5;

/// S3 maximum parts per upload
pub const S3_MAX_PARTS: i64 = 10000;

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Extension appended to the source directory name to form the object key
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Canned ACL for publicly readable objects
pub const ACL_PUBLIC_READ: &str = "public-read";

/// Canned ACL for private objects
pub const ACL_PRIVATE: &str = "private";

// Log sink constants
/// Default directory holding the persistent log sinks
pub const DEFAULT_LOG_DIR: &str = "./logs";

/// Informational sink file name
pub const INFO_LOG_FILE: &str = "info.txt";

/// Warning sink file name
pub const WARN_LOG_FILE: &str = "warn.txt";

/// Fatal sink file name
pub const FATAL_LOG_FILE: &str = "panic.txt";

// Environment variable names
pub const ENV_ACCESS_KEY: &str = "pb_key";
pub const ENV_SECRET_KEY: &str = "sh_key";
pub const ENV_BUCKET: &str = "bucket";
pub const ENV_ENDPOINT: &str = "endpoint";
pub const ENV_SOURCE_ROOT: &str = "daemon_path";
pub const ENV_PUBLIC_ACCESS: &str = "public_access";
pub const ENV_REGION: &str = "region";
pub const ENV_LOG_DIR: &str = "log_dir";

/// Dotenv file read from the working directory, if present
pub const DOTENV_FILE: &str = ".env";

// Error messages
pub const ERROR_FAILED_TO_CREATE_SESSION: &str = "Can't create a session with the API. Are the credentials correct?";
pub const ERROR_FAILED_TO_UPLOAD: &str = "Can't upload a backup to the bucket";
pub const ERROR_FAILED_TO_COMPRESS: &str = "Failed to compress a server folder";
pub const ERROR_FAILED_TO_READ_SOURCE_ROOT: &str = "Can't read the source root directory";
