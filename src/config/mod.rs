mod backup_config;
mod env_vars;

pub use backup_config::{BackupConfig, StorageConfig};

pub use env_vars::{expand_env_vars, expand_with, parse_flag};
