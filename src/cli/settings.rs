//! `config` subcommands.

use std::error::Error;
use std::fmt;

use crate::cli::{CliContext, ConfigAction};
use crate::core::config::{path_display, Config, ConfigKey};

/// Errors that can occur when modifying configuration settings.
#[derive(Debug, PartialEq, Eq)]
pub enum SettingError {
    /// The provided setting key is not recognized.
    UnknownKey(String),
    /// The value does not fit the key.
    InvalidValue { key: &'static str, reason: String },
}

impl SettingError {
    /// Print the error message to stderr with appropriate formatting.
    pub fn print(&self) {
        match self {
            SettingError::UnknownKey(key) => {
                eprintln!("❌ Unknown config key: {key}");
                let known: Vec<&str> = ConfigKey::ALL.iter().map(|key| key.name()).collect();
                eprintln!("   Known keys: {}", known.join(", "));
            }
            SettingError::InvalidValue { key, reason } => {
                eprintln!("❌ Invalid value for {key}: {reason}");
            }
        }
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            SettingError::InvalidValue { key, reason } => {
                write!(f, "Invalid value for {key}: {reason}")
            }
        }
    }
}

impl Error for SettingError {}

/// Applies a `set` or `unset` to `config` and returns the confirmation line.
pub(crate) fn apply_setting(
    config: &mut Config,
    action: &ConfigAction,
) -> Result<Option<String>, SettingError> {
    match action {
        ConfigAction::Set { key, value } => {
            let parsed =
                ConfigKey::parse(key).ok_or_else(|| SettingError::UnknownKey(key.clone()))?;
            config
                .set_value(parsed, value)
                .map_err(|reason| SettingError::InvalidValue {
                    key: parsed.name(),
                    reason,
                })?;
            Ok(Some(format!("✅ Set {} to: {}", parsed.name(), value.trim())))
        }
        ConfigAction::Unset { key } => {
            let parsed =
                ConfigKey::parse(key).ok_or_else(|| SettingError::UnknownKey(key.clone()))?;
            config.unset_value(parsed);
            Ok(Some(format!("✅ Unset {}", parsed.name())))
        }
        ConfigAction::Show | ConfigAction::Path => Ok(None),
    }
}

pub fn handle_config_command(
    context: &CliContext,
    action: ConfigAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        ConfigAction::Show => {
            context.config.print_all();
            println!("  (file: {})", path_display(&context.config_path));
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", context.config_path.display());
            Ok(())
        }
        ConfigAction::Set { .. } | ConfigAction::Unset { .. } => {
            let mut config = context.config.clone();
            match apply_setting(&mut config, &action) {
                Ok(message) => {
                    config.save_to_path(&context.config_path)?;
                    if let Some(message) = message {
                        println!("{message}");
                    }
                    Ok(())
                }
                Err(err) => {
                    err.print();
                    std::process::exit(1);
                }
            }
        }
    }
}
