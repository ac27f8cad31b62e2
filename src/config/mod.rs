pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{ServerConfig, SharedConfig, SETTINGS_FILE};
