//! Implementações de traits para os enums de erro do sistema
//!
//! Este módulo existe exclusivamente para desacoplar:
//! - definição de erros (enums)
//! - implementação de traits (`Display`, `Error`, `From`)

use std::error::Error as StdError;
use std::fmt;

use polars::prelude::PolarsError;

use crate::errors::ProcessorError;

/* ========================================================================== */
/* Display                                                                    */
/* ========================================================================== */

impl fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorError::InputNotFound { pattern } => {
                write!(f, "[Input] nenhum arquivo corresponde a '{}'", pattern)
            }

            ProcessorError::SchemaMismatch { dataset, reason } => {
                write!(f, "[Schema] {}: {}", dataset, reason)
            }

            ProcessorError::MalformedTimestamp { value } => {
                write!(f, "[Timestamp] valor de ts inválido: {}", value)
            }

            ProcessorError::MissingDependency { table, path } => {
                write!(
                    f,
                    "[Dependency] tabela '{}' ainda não produzida em {}",
                    table,
                    path.display()
                )
            }

            ProcessorError::Io(err) => {
                write!(f, "[I/O] {}", err)
            }

            ProcessorError::Json(err) => {
                write!(f, "[JSON] {}", err)
            }

            ProcessorError::Parquet(err) => {
                write!(f, "[Parquet] {}", err)
            }

            ProcessorError::Pattern(msg) => {
                write!(f, "[Glob] {}", msg)
            }

            ProcessorError::Config(msg) => {
                write!(f, "[Config] {}", msg)
            }
        }
    }
}

/* ========================================================================== */
/* std::error::Error                                                          */
/* ========================================================================== */

impl StdError for ProcessorError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ProcessorError::Io(err) => Some(err),
            ProcessorError::Json(err) => Some(err),
            _ => None,
        }
    }
}

/* ========================================================================== */
/* Conversions                                                                */
/* ========================================================================== */

impl From<std::io::Error> for ProcessorError {
    fn from(err: std::io::Error) -> Self {
        ProcessorError::Io(err)
    }
}

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Json(err)
    }
}

impl From<PolarsError> for ProcessorError {
    fn from(err: PolarsError) -> Self {
        ProcessorError::Parquet(err.to_string())
    }
}

impl From<glob::PatternError> for ProcessorError {
    fn from(err: glob::PatternError) -> Self {
        ProcessorError::Pattern(err.to_string())
    }
}

/* ========================================================================== */
/* Tests                                                                      */
/* ========================================================================== */

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn display_carries_category_prefix() {
        let err = ProcessorError::InputNotFound {
            pattern: "data/song_data/*.json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "[Input] nenhum arquivo corresponde a 'data/song_data/*.json'"
        );

        let err = ProcessorError::MissingDependency {
            table: "songs".to_string(),
            path: PathBuf::from("out/songs"),
        };
        assert!(err.to_string().starts_with("[Dependency] tabela 'songs'"));
    }

    #[test]
    fn io_errors_expose_their_source() {
        let err: ProcessorError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(err.source().is_some());

        let err = ProcessorError::MalformedTimestamp {
            value: "-1".to_string(),
        };
        assert!(err.source().is_none());
    }
}
