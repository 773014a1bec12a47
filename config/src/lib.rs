pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::{Settings, DEFAULT_MODEL, DEFAULT_SYSTEM_INSTRUCTION};

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Load environment variables from .env files.
/// First loads from ~/.env (home directory), then from ./.env (project directory).
/// Project directory values take precedence over home directory values.
/// Call this before reading the API key so env vars are available.
pub fn load_env_file() {
    if let Some(home) = dirs::home_dir() {
        let home_env_path = home.join(".env");
        dotenv::from_path(home_env_path).ok();
    }

    // Current directory last so its values win
    dotenv::dotenv().ok();
}

/// Read the API key from the environment, if present
pub fn api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}
