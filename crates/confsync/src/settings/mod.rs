pub mod entry;
pub mod loader;

pub use entry::{Construct, DestEntry, ObjectEntry, Params, SourceEntry};
pub use loader::{
    default_settings_paths, resolve_settings_path, Settings, SETTINGS_ENV_VAR,
    SETTINGS_FILE_NAME, SYSTEM_SETTINGS_PATH,
};
