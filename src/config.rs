use serde::Deserialize;

/// Default path of the JSON config file; override with `CONFIG_FILE`.
pub const DEFAULT_CONFIG_FILE: &str = "server_exporter.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_name: String,
    pub endpoint: String,
    pub app_token: String,
    pub app_secret: String,
    /// Default log level when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let settings: Settings = serde_json::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.server_name.is_empty(),
            "server_name must be non-empty"
        );
        anyhow::ensure!(!self.endpoint.is_empty(), "endpoint must be non-empty");
        anyhow::ensure!(
            self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://"),
            "endpoint must be an http(s) URL, got {}",
            self.endpoint
        );
        anyhow::ensure!(!self.app_token.is_empty(), "app_token must be non-empty");
        anyhow::ensure!(!self.app_secret.is_empty(), "app_secret must be non-empty");
        Ok(())
    }
}
