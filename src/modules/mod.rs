pub mod config;
pub mod locale;
pub mod logger;

pub use config::{apply_env_overrides, load_app_config, ConfigError};
pub use locale::Locale;
pub use logger::init_logger;
