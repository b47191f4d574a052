pub mod data;
pub mod io;
pub mod printing;

pub use data::{path_display, Config, ConfigKey, BACKEND_URL_ENV};
pub use io::ConfigError;

#[cfg(test)]
pub mod tests;
