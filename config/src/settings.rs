//! Application settings management

use crate::PathManager;
use serde::{Deserialize, Serialize};
use std::fs;

/// Default chat model when the settings file does not name one
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default system instruction for every chat turn
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful and friendly assistant.";

/// Application settings stored in settings.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Chat model id (e.g. "gemini-2.5-flash")
    pub default_model: Option<String>,
    /// Override for the system instruction sent with every turn
    pub system_instruction: Option<String>,
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = PathManager::settings_path() else {
            return Self::default();
        };

        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };

        toml::from_str(&content).unwrap_or_default()
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), String> {
        let path = PathManager::settings_path().ok_or("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }

    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn system_instruction(&self) -> &str {
        self.system_instruction
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.model(), DEFAULT_MODEL);
        assert_eq!(settings.system_instruction(), DEFAULT_SYSTEM_INSTRUCTION);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings {
            default_model: Some("gemini-2.5-pro".to_string()),
            system_instruction: Some("Answer in haiku.".to_string()),
        };
        assert_eq!(settings.model(), "gemini-2.5-pro");
        assert_eq!(settings.system_instruction(), "Answer in haiku.");
    }

    #[test]
    fn test_toml_roundtrip() {
        let settings = Settings {
            default_model: Some("gemini-2.5-flash".to_string()),
            system_instruction: None,
        };
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let back: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.default_model, settings.default_model);
        assert_eq!(back.system_instruction, None);
    }
}
