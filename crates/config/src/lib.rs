// Configuration loading

pub mod settings;

pub use settings::{
    ConfigError, DatabaseSettings, FetchSettings, ImageSettings, LogFormat, LogSettings, Settings,
};
