pub mod config;
pub mod continuity;
pub mod cover;
pub mod events;
pub mod mapping;
pub mod naming;
pub mod process;
pub mod session;
pub mod sort_order;

use std::path::PathBuf;

use metadata::MetadataError;

pub use config::{
    config_path_from_env, load_or_create_config, resolve_path, save_config, ConfigError,
    RadishConfig, ShelfConfig,
};
pub use continuity::{resolve_continuity, Continuity, Infeasible, Position, Renumbering};
pub use cover::{install_cover, select_cover, CoverSelection, ImageFile};
pub use events::{parse_release_input, EventCalendar, ReleaseChoice, ReleaseDate};
pub use mapping::MappingStore;
pub use naming::{folder_name, format_label, TargetPath};
pub use session::{BatchReport, NormalizationSession, PlannedWrite, ReleasePlan, SourceBatch};
pub use sort_order::{
    BatchReconciliation, ConflictChoice, Reconciliation, SortOrderPrompt, SortOrderRegistry,
};

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Metadata(MetadataError),
    Json(serde_json::Error),
    Config(ConfigError),
    Events { line: usize, reason: &'static str },
    Command { program: String, status: Option<i32> },
    SourceMissing(PathBuf),
    UnsupportedImage(PathBuf),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Metadata(err) => write!(f, "metadata error: {}", err),
            LibraryError::Json(err) => write!(f, "json error: {}", err),
            LibraryError::Config(err) => write!(f, "config error: {}", err),
            LibraryError::Events { line, reason } => {
                write!(f, "event file line {}: {}", line, reason)
            }
            LibraryError::Command { program, status } => match status {
                Some(code) => write!(f, "command {:?} exited with status {}", program, code),
                None if program.is_empty() => write!(f, "empty command"),
                None => write!(f, "command {:?} was terminated", program),
            },
            LibraryError::SourceMissing(path) => {
                write!(f, "file/folder does not exist: {}", path.display())
            }
            LibraryError::UnsupportedImage(path) => {
                write!(f, "unsupported cover image: {}", path.display())
            }
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::Json(err)
    }
}

impl From<ConfigError> for LibraryError {
    fn from(err: ConfigError) -> Self {
        LibraryError::Config(err)
    }
}
