//! Configuração do ALICIT carregada a partir de `alicit.toml`.
//!
//! A struct [`AlicitConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis `ALICIT_TOKEN` e `ALICIT_API_URL` têm precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::api::{ApiClient, DEFAULT_API_URL};
use crate::error::AlicitError;
use crate::watcher::WatcherConfig;

pub const CONFIG_FILE: &str = "alicit.toml";

/// Configuração de nível superior carregada de `alicit.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlicitConfig {
    /// URL base do backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Token de sessão enviado como `Authorization: Bearer`.
    #[serde(default)]
    pub token: Option<String>,

    /// Intervalo entre consultas de status, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Falhas de rede consecutivas toleradas durante o acompanhamento.
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,

    /// Timeout da consulta de status, em segundos.
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_max_poll_errors() -> u32 {
    3
}

fn default_status_timeout_secs() -> u64 {
    30
}

impl Default for AlicitConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_errors: default_max_poll_errors(),
            status_timeout_secs: default_status_timeout_secs(),
        }
    }
}

impl AlicitConfig {
    /// Carrega `alicit.toml` do diretório atual e aplica as variáveis de ambiente.
    pub fn load() -> Result<Self, AlicitError> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Lê um arquivo específico. Usa valores padrão se ele não existir.
    pub fn load_from(path: &Path) -> Result<Self, AlicitError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str::<AlicitConfig>(&contents)?;
        if config.poll_interval_secs == 0 {
            return Err(AlicitError::Config(
                "poll_interval_secs deve ser maior que zero".into(),
            ));
        }
        Ok(config)
    }

    /// Sobrescreve campos com variáveis de ambiente não vazias.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("ALICIT_TOKEN").filter(|t| !t.is_empty()) {
            self.token = Some(token);
        }
        if let Some(url) = lookup("ALICIT_API_URL").filter(|u| !u.is_empty()) {
            self.api_url = url;
        }
    }

    pub fn watcher(&self) -> WatcherConfig {
        WatcherConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_consecutive_errors: self.max_poll_errors,
        }
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    /// Cliente HTTP apontando para `api_url`, com o token configurado.
    pub fn client(&self) -> Result<ApiClient, AlicitError> {
        let client = ApiClient::new(self.api_url.as_str(), self.token.clone())?
            .with_status_timeout(self.status_timeout());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = AlicitConfig::default();
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.max_poll_errors, 3);
        assert_eq!(config.status_timeout(), Duration::from_secs(30));
        assert!(config.token.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_url = "https://api.alicit.com.br"
            max_poll_errors = 5
        "#;
        let config: AlicitConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_url, "https://api.alicit.com.br");
        assert_eq!(config.max_poll_errors, 5);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.watcher().max_consecutive_errors, 5);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token = \"abc\"\npoll_interval_secs = 2").unwrap();

        let config = AlicitConfig::load_from(file.path()).unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.watcher().interval, Duration::from_secs(2));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AlicitConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, AlicitConfig::default());
    }

    #[test]
    fn invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_secs = \"dez\"").unwrap();
        assert!(matches!(
            AlicitConfig::load_from(file.path()),
            Err(AlicitError::Toml(_))
        ));

        let mut zero = tempfile::NamedTempFile::new().unwrap();
        writeln!(zero, "poll_interval_secs = 0").unwrap();
        assert!(matches!(
            AlicitConfig::load_from(zero.path()),
            Err(AlicitError::Config(_))
        ));
    }

    #[test]
    fn builds_client_from_config() {
        let config = AlicitConfig {
            api_url: "http://backend:9000/".into(),
            ..Default::default()
        };
        assert_eq!(config.client().unwrap().base_url(), "http://backend:9000");
    }

    #[test]
    fn env_overrides_file() {
        let mut config = AlicitConfig {
            token: Some("do-arquivo".into()),
            ..Default::default()
        };
        config.apply_env(|name| match name {
            "ALICIT_TOKEN" => Some("do-ambiente".into()),
            "ALICIT_API_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.token.as_deref(), Some("do-ambiente"));
        assert_eq!(config.api_url, "http://localhost:8080");
    }
}
