//! # Definição de Erros do Domínio de Processamento
//!
//! Este módulo centraliza as falhas possíveis durante a construção do
//! modelo estrela (extração, transformação e gravação das tabelas).
//!
//! # Error Handling Strategy
//! - **Tipagem:** Enums para tratamento exaustivo.
//! - **Fail-Fast:** Cada componente valida o seu próprio contrato de entrada;
//!   não há recuperação local nem emissão parcial de tabelas.
//! - **Extensibilidade:** Marcado como `non_exhaustive` para permitir evolução sem quebra de contrato.

use std::path::PathBuf;

/// Enumeração central de falhas do Processador.
#[derive(Debug)]
#[non_exhaustive]
pub enum ProcessorError {
    /// Nenhum arquivo corresponde ao padrão de entrada.
    InputNotFound { pattern: String },

    /// Campo obrigatório ausente em todos os registros de uma fonte,
    /// ou registro com formato incompatível.
    SchemaMismatch { dataset: String, reason: String },

    /// Campo `ts` não numérico, negativo ou fora do calendário.
    MalformedTimestamp { value: String },

    /// A tabela de dimensão exigida ainda não foi produzida.
    MissingDependency { table: String, path: PathBuf },

    /// Falhas no sistema de arquivos (permissão, disco cheio, arquivo inexistente).
    Io(std::io::Error),

    /// Encapsula `serde_json::Error`.
    Json(serde_json::Error),

    /// Erros originados na engine tabular.
    /// Armazenados como `String` para reduzir acoplamento direto.
    Parquet(String),

    /// Padrão glob inválido.
    Pattern(String),

    /// Configuração inválida ou incompleta.
    Config(String),
}
