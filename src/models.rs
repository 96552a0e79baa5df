//! Configuration Models
//!
//! ## Visão Geral
//! Este módulo define as estruturas de configuração do pipeline.
//! A configuração é um objeto explícito, carregado de um arquivo TOML e
//! entregue ao armazenamento na sua construção; nada é injetado em
//! variáveis de ambiente nem guardado em estado global.
//!
//! ## Boas Práticas
//! - **Encapsulamento**: Validações de integridade ocorrem no momento da carga.
//! - **Opacidade**: Opções do backend (ex: credenciais) são capturadas via
//!   `flatten` e repassadas ao armazenamento sem interpretação pelo núcleo.

use crate::errors::ProcessorError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Padrão padrão para os metadados de músicas.
pub const DEFAULT_SONG_DATA: &str = "song_data/A/A/A/*.json";

/// Padrão padrão para os logs de atividade.
pub const DEFAULT_LOG_DATA: &str = "log_data/2018/11/*.json";

/// Configuração do pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Raiz dos dados de entrada (ex: `data/`).
    pub input_root: String,

    /// Raiz onde as tabelas do modelo estrela são gravadas.
    pub output_root: String,

    /// Padrão glob, relativo a `input_root`, dos metadados de músicas.
    #[serde(default = "default_song_data")]
    pub song_data: String,

    /// Padrão glob, relativo a `input_root`, dos logs de atividade.
    #[serde(default = "default_log_data")]
    pub log_data: String,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Configuração consumida pelo colaborador de I/O.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub compression: Compression,

    /// Exibe a barra de progresso durante a leitura dos arquivos.
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,

    /// Opções opacas do backend (credenciais, endpoints).
    #[serde(flatten)]
    pub options: HashMap<String, String>,
}

/// Codec de compressão das partições Parquet.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            compression: Compression::default(),
            show_progress: default_show_progress(),
            options: HashMap::new(),
        }
    }
}

fn default_song_data() -> String {
    DEFAULT_SONG_DATA.to_string()
}

fn default_log_data() -> String {
    DEFAULT_LOG_DATA.to_string()
}

fn default_show_progress() -> bool {
    true
}

impl Config {
    /// Monta uma configuração com os padrões de entrada default.
    pub fn new(input_root: impl Into<String>, output_root: impl Into<String>) -> Self {
        Config {
            input_root: input_root.into(),
            output_root: output_root.into(),
            song_data: default_song_data(),
            log_data: default_log_data(),
            storage: StorageConfig::default(),
        }
    }

    /// Carrega e valida o arquivo de configuração TOML.
    ///
    /// # Erros
    /// Retorna `ProcessorError::Io` se o arquivo não for encontrado ou
    /// `ProcessorError::Config` se a estrutura for inválida.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProcessorError> {
        let content = fs::read_to_string(path).map_err(ProcessorError::Io)?;
        Self::from_toml(&content)
    }

    /// Interpreta e valida o conteúdo TOML.
    pub fn from_toml(content: &str) -> Result<Self, ProcessorError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ProcessorError::Config(format!("Erro no TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validação pós-carga (Fail-Fast).
    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.input_root.trim().is_empty() {
            return Err(ProcessorError::Config("input_root vazio".to_string()));
        }
        if self.output_root.trim().is_empty() {
            return Err(ProcessorError::Config("output_root vazio".to_string()));
        }
        for (name, pattern) in [("song_data", &self.song_data), ("log_data", &self.log_data)] {
            if pattern.trim().is_empty() {
                return Err(ProcessorError::Config(format!("'{}' sem padrão", name)));
            }
            if Path::new(pattern).is_absolute() {
                return Err(ProcessorError::Config(format!(
                    "'{}' deve ser relativo a input_root: {}",
                    name, pattern
                )));
            }
        }
        Ok(())
    }

    /// Padrão completo dos metadados de músicas.
    pub fn song_pattern(&self) -> String {
        self.join_pattern(&self.song_data)
    }

    /// Padrão completo dos logs de atividade.
    pub fn log_pattern(&self) -> String {
        self.join_pattern(&self.log_data)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_root)
    }

    /// Concatenação segura sem barras duplicadas.
    fn join_pattern(&self, pattern: &str) -> String {
        let base_trimmed = self.input_root.trim_end_matches('/');
        let path_trimmed = pattern.trim_start_matches('/');
        format!("{}/{}", base_trimmed, path_trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let config = Config::from_toml(
            r#"
            input_root = "data/"
            output_root = "out"
            "#,
        )
        .unwrap();

        assert_eq!(config.song_pattern(), "data/song_data/A/A/A/*.json");
        assert_eq!(config.log_pattern(), "data/log_data/2018/11/*.json");
        assert_eq!(config.storage.compression, Compression::Snappy);
        assert!(config.storage.show_progress);
        assert!(config.storage.options.is_empty());
    }

    #[test]
    fn storage_keeps_unknown_keys_as_opaque_options() {
        let config = Config::from_toml(
            r#"
            input_root = "s3a://bucket"
            output_root = "out"
            song_data = "song_data/*/*/*/*.json"

            [storage]
            compression = "zstd"
            show_progress = false
            access_key_id = "AKIA"
            secret_access_key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.song_pattern(), "s3a://bucket/song_data/*/*/*/*.json");
        assert_eq!(config.storage.compression, Compression::Zstd);
        assert!(!config.storage.show_progress);
        assert_eq!(config.storage.options.len(), 2);
        assert_eq!(config.storage.options["access_key_id"], "AKIA");
    }

    #[test]
    fn rejects_empty_roots_and_absolute_patterns() {
        let err = Config::from_toml("input_root = \"\"\noutput_root = \"out\"").unwrap_err();
        assert!(matches!(err, ProcessorError::Config(_)));

        let err = Config::from_toml(
            "input_root = \"data\"\noutput_root = \"out\"\nlog_data = \"/abs/*.json\"",
        )
        .unwrap_err();
        assert!(matches!(err, ProcessorError::Config(_)));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = Config::from_toml("input_root = ").unwrap_err();
        assert!(matches!(err, ProcessorError::Config(_)));
    }
}
