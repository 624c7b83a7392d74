pub mod data;
pub mod io;

pub use data::{path_display, BaseUrlSource, Config, API_URL_ENV_VAR};
pub use io::ConfigError;
