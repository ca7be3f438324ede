//! Configuração do job carregada a partir de `data/job_config.json`.
//!
//! A struct [`JobConfig`] guarda as credenciais do Airtable e a marca
//! d'água (`last_run`, em segundos desde a época) da última execução
//! completa. Arquivos com extensão `.toml` são lidos e gravados em TOML;
//! qualquer outro caminho usa JSON.
//! A variável de ambiente `AIRTABLE_TOKEN` tem precedência sobre o arquivo.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::airtable::client::API_URL as AIRTABLE_API_URL;
use crate::airtable::types::{FIELD_CARRIER_PICKUP, FIELD_SHIP_DATE_DIFF};
use crate::error::ConfigError;
use crate::shipit::client::API_URL as SHIPIT_API_URL;

/// Caminho fixo usado quando nenhum `--config` é informado.
pub const DEFAULT_CONFIG_PATH: &str = "data/job_config.json";

/// Variável de ambiente que substitui o token do arquivo.
pub const TOKEN_ENV_VAR: &str = "AIRTABLE_TOKEN";

/// Qual resultado o job calcula e grava de volta no Airtable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobVariant {
    /// Grava o instante da coleta em "Carrier Pickup".
    #[default]
    CarrierPickup,
    /// Grava a diferença entre entrega e data solicitada em
    /// "Diff in Req'd vs Ship Date".
    DeliveryKpi,
}

impl JobVariant {
    /// Campo que fica vazio enquanto o registro não foi processado e que
    /// recebe o resultado calculado.
    pub fn status_field(&self) -> &'static str {
        match self {
            JobVariant::CarrierPickup => FIELD_CARRIER_PICKUP,
            JobVariant::DeliveryKpi => FIELD_SHIP_DATE_DIFF,
        }
    }
}

impl fmt::Display for JobVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobVariant::CarrierPickup => write!(f, "carrier_pickup"),
            JobVariant::DeliveryKpi => write!(f, "delivery_kpi"),
        }
    }
}

/// Configuração persistida do job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Identificador da base Airtable (`app...`).
    #[serde(alias = "airtable_base_id")]
    pub store_base_id: String,

    /// Token de acesso pessoal do Airtable.
    #[serde(alias = "airtable_token")]
    pub store_token: String,

    /// Marca d'água: início da última execução completa.
    #[serde(default, with = "chrono::serde::ts_seconds")]
    pub last_run: DateTime<Utc>,

    /// Variante do job.
    #[serde(default)]
    pub job: JobVariant,

    /// Registros por página ao listar o Airtable.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_store_base_url")]
    pub store_base_url: String,

    #[serde(default = "default_tracking_base_url")]
    pub tracking_base_url: String,

    // Token original do arquivo quando a variável de ambiente o substituiu,
    // para que `save` não grave o segredo do ambiente em disco.
    #[serde(skip)]
    file_token: Option<String>,
}

// Valor padrão para o tamanho de página: 5.
fn default_page_size() -> usize {
    5
}

fn default_store_base_url() -> String {
    AIRTABLE_API_URL.to_string()
}

fn default_tracking_base_url() -> String {
    SHIPIT_API_URL.to_string()
}

/// Formato do arquivo, decidido pela extensão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

impl JobConfig {
    /// Cria uma configuração com os valores padrão e marca d'água na época.
    #[cfg(test)]
    pub fn new(store_base_id: impl Into<String>, store_token: impl Into<String>) -> Self {
        Self {
            store_base_id: store_base_id.into(),
            store_token: store_token.into(),
            last_run: DateTime::<Utc>::default(),
            job: JobVariant::default(),
            page_size: default_page_size(),
            store_base_url: default_store_base_url(),
            tracking_base_url: default_tracking_base_url(),
            file_token: None,
        }
    }

    /// Carrega e valida a configuração de `path`, aplicando `AIRTABLE_TOKEN`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        config.apply_token_override(std::env::var(TOKEN_ENV_VAR).ok());
        config.validate()?;
        Ok(config)
    }

    /// Lê o arquivo sem overrides de ambiente nem validação.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, ConfigFormat::from_path(path))
    }

    fn parse(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config = match format {
            ConfigFormat::Json => serde_json::from_str(contents)?,
            ConfigFormat::Toml => toml::from_str(contents)?,
        };
        Ok(config)
    }

    /// Grava a configuração em `path`, no formato indicado pela extensão.
    ///
    /// Escreve primeiro num arquivo temporário ao lado e depois renomeia,
    /// para que uma falha no meio não corrompa a marca d'água anterior.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut persisted = self.clone();
        if let Some(token) = persisted.file_token.take() {
            persisted.store_token = token;
        }

        let contents = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::to_string_pretty(&persisted)?,
            ConfigFormat::Toml => toml::to_string(&persisted)?,
        };

        let tmp_path = tmp_path_for(path);
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp_path, contents).map_err(io_err)?;
        std::fs::rename(&tmp_path, path).map_err(io_err)?;
        Ok(())
    }

    /// Substitui o token do arquivo por `token`, se presente e não vazio.
    pub fn apply_token_override(&mut self, token: Option<String>) {
        match token {
            Some(token) if !token.is_empty() => {
                let original = std::mem::replace(&mut self.store_token, token);
                self.file_token.get_or_insert(original);
            }
            _ => {}
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_base_id.trim().is_empty() {
            return Err(ConfigError::Invalid("store_base_id must not be empty".into()));
        }
        if self.store_token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "store_token must not be empty (set it in the file or via {TOKEN_ENV_VAR})"
            )));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Avança a marca d'água para `run_started_at`, nunca para trás.
    /// Retorna `true` se o valor mudou.
    pub fn advance_watermark(&mut self, run_started_at: DateTime<Utc>) -> bool {
        if run_started_at > self.last_run {
            self.last_run = run_started_at;
            true
        } else {
            false
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
