//! Server Configuration

/// Environment-driven server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Allowed CORS origins; empty means permissive
    pub cors_origins: Vec<String>,

    /// GitHub organization injected into backend tool calls
    pub organization: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".into(),
            cors_origins: Vec::new(),
            organization: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let organization = std::env::var("GITHUB_ORG").unwrap_or_default();

        Self {
            bind_addr,
            cors_origins,
            organization,
        }
    }
}
