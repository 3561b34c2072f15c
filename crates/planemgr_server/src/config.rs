use std::env;
use std::path::PathBuf;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 4000)
    pub port: u16,
    /// Working directory holding server state (default: ./srv)
    pub work_dir: PathBuf,
    /// Bearer token required on every /api/chart route; unset disables auth
    pub api_token: Option<String>,
    /// CORS allowed origins (comma-separated, `*` for any)
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let work_dir = PathBuf::from(env::var("WORKDIR").unwrap_or_else(|_| "./srv".to_string()));

        let api_token = env::var("API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            host,
            port,
            work_dir,
            api_token,
            cors_origins,
        })
    }

    /// Directory that chart repositories live in
    pub fn charts_dir(&self) -> PathBuf {
        self.work_dir.join("charts")
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "Invalid API_PORT environment variable"),
        }
    }
}

impl std::error::Error for ConfigError {}
