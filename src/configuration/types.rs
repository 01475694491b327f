use serde::Deserialize;

/// Where the session array is kept.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key in the storage directory.
    #[default]
    File,
    /// Process memory only; everything is lost on exit.
    Memory,
}
