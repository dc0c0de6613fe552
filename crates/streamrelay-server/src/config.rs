use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use streamrelay_ai::{
    DEFAULT_MAX_INPUT_CHARS, DEFAULT_PERSONA_PROMPT, DEFAULT_TEMPERATURE, Provider, Relay,
    RelayConfig, UpstreamClient,
};

const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub provider: Provider,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub persona_prompt: String,
    pub max_input_chars: usize,
    pub temperature: f32,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    upstream: UpstreamSection,
    #[serde(default)]
    relay: RelaySection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct UpstreamSection {
    #[serde(default)]
    provider: Provider,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelaySection {
    #[serde(default = "default_persona")]
    persona_prompt: String,
    #[serde(default = "default_max_input_chars")]
    max_input_chars: usize,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_keep_alive_secs")]
    keep_alive_secs: u64,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            persona_prompt: default_persona(),
            max_input_chars: default_max_input_chars(),
            temperature: default_temperature(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_persona() -> String {
    DEFAULT_PERSONA_PROMPT.to_string()
}

fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        let lookup = |key: &str| env::var(key).ok();

        if let Some(file_config) = load_from_file()? {
            return Ok(Self::from_file(file_config, lookup));
        }

        Self::from_env(lookup)
    }

    fn from_file(file: FileConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let provider = file.upstream.provider;
        let api_key = file
            .upstream
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| resolve_api_key(provider, &lookup));

        Self {
            host: file.server.host,
            port: file.server.port,
            provider,
            api_key,
            model: file.upstream.model,
            base_url: file.upstream.base_url,
            persona_prompt: file.relay.persona_prompt,
            max_input_chars: file.relay.max_input_chars,
            temperature: file.relay.temperature,
            keep_alive_secs: file.relay.keep_alive_secs,
        }
    }

    fn from_env(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("STREAMRELAY_SERVER_HOST").unwrap_or_else(default_host);
        let port = lookup("STREAMRELAY_SERVER_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or_else(default_port);
        let provider = match lookup("STREAMRELAY_PROVIDER") {
            Some(value) => value
                .parse::<Provider>()
                .context("Invalid STREAMRELAY_PROVIDER")?,
            None => Provider::default(),
        };
        let max_input_chars = lookup("STREAMRELAY_MAX_INPUT_CHARS")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or_else(default_max_input_chars);
        let temperature = lookup("STREAMRELAY_TEMPERATURE")
            .and_then(|value| value.parse::<f32>().ok())
            .unwrap_or_else(default_temperature);

        Ok(Self {
            host,
            port,
            provider,
            api_key: resolve_api_key(provider, &lookup),
            model: lookup("STREAMRELAY_MODEL"),
            base_url: lookup("STREAMRELAY_BASE_URL"),
            persona_prompt: lookup("STREAMRELAY_PERSONA").unwrap_or_else(default_persona),
            max_input_chars,
            temperature,
            keep_alive_secs: default_keep_alive_secs(),
        })
    }

    /// Build the relay component described by this config
    pub fn build_relay(&self) -> anyhow::Result<Relay> {
        let mut upstream = UpstreamClient::new(self.provider.adapter())
            .context("Failed to build upstream HTTP client")?
            .with_temperature(self.temperature);
        if let Some(api_key) = &self.api_key {
            upstream = upstream.with_api_key(api_key.clone());
        }
        if let Some(model) = &self.model {
            upstream = upstream.with_model(model.clone());
        }
        if let Some(base_url) = &self.base_url {
            upstream = upstream.with_base_url(base_url.clone());
        }

        Ok(Relay::new(
            upstream,
            RelayConfig {
                persona_prompt: self.persona_prompt.clone(),
                max_input_chars: self.max_input_chars,
            },
        ))
    }
}

fn resolve_api_key(provider: Provider, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    lookup("STREAMRELAY_API_KEY")
        .or_else(|| lookup(provider.api_key_env()))
        .filter(|key| !key.trim().is_empty())
}

fn load_from_file() -> anyhow::Result<Option<FileConfig>> {
    let config_path = env::var("STREAMRELAY_SERVER_CONFIG").ok();
    let path = if let Some(path) = config_path {
        Some(path)
    } else if Path::new("server.toml").exists() {
        Some("server.toml".to_string())
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(None);
    };

    read_config_file(Path::new(&path)).map(Some)
}

fn read_config_file(path: &Path) -> anyhow::Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("Failed to read config {}: {}", path.display(), err))?;
    toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_defaults() {
        let config = ServerConfig::from_env(lookup_from(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.max_input_chars, 8000);
        assert!(config.api_key.is_none());
        assert!(config.model.is_none());
    }

    #[test]
    fn test_env_provider_key_fallback() {
        let config = ServerConfig::from_env(lookup_from(&[
            ("STREAMRELAY_PROVIDER", "gemini"),
            ("GEMINI_API_KEY", "g-key"),
            ("OPENAI_API_KEY", "o-key"),
            ("STREAMRELAY_SERVER_PORT", "not-a-port"),
        ]))
        .unwrap();

        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_env_explicit_key_wins() {
        let config = ServerConfig::from_env(lookup_from(&[
            ("STREAMRELAY_API_KEY", "explicit"),
            ("OPENAI_API_KEY", "o-key"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_env_unknown_provider_is_an_error() {
        let result = ServerConfig::from_env(lookup_from(&[("STREAMRELAY_PROVIDER", "nope")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
port = 9000

[upstream]
provider = "gemini"
model = "gemini-1.5-pro"

[relay]
persona_prompt = "Be brief."
max_input_chars = 100
"#
        )
        .unwrap();

        let parsed = read_config_file(file.path()).unwrap();
        let config = ServerConfig::from_file(parsed, lookup_from(&[("GEMINI_API_KEY", "g")]));

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(config.api_key.as_deref(), Some("g"));
        assert_eq!(config.persona_prompt, "Be brief.");
        assert_eq!(config.max_input_chars, 100);
        assert_eq!(config.keep_alive_secs, 15);
    }

    #[test]
    fn test_build_relay_without_key() {
        let config =
            ServerConfig::from_env(lookup_from(&[("STREAMRELAY_MODEL", "gpt-4o")])).unwrap();
        let relay = config.build_relay().unwrap();
        assert!(!relay.has_credential());
        assert_eq!(relay.upstream().model(), "gpt-4o");
    }
}
