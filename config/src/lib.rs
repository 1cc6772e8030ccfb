use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScryConfig {
    pub database: DatabaseConfig,
    pub ai: AIConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AIConfig {
    /// Model identifier sent with every completion request.
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub url: String,
    /// Name of the environment variable holding the API key. The key
    /// itself never lives in the config file.
    pub api_key_env: String,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/postgres".to_string(),
        }
    }
}

impl ScryConfig {
    pub fn get_or_default() -> Self {
        let Ok(home_dir) = std::env::var("HOME") else {
            return ScryConfig::default();
        };

        let Ok(config_file) =
            std::fs::read_to_string(format!("{home_dir}/.config/scry/config.toml"))
        else {
            return ScryConfig::default();
        };
        toml::from_str(&config_file).unwrap_or_default()
    }

    /// Connection string for the database, with `DATABASE_URL` taking
    /// precedence over the config file.
    #[must_use]
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }
}
