//! # Registros de Entrada e Linhas do Modelo Estrela
//!
//! As duas fontes de entrada são JSON de esquema frouxo: campos podem
//! faltar em registros individuais e alguns identificadores chegam ora
//! como texto, ora como número. Por isso todos os campos de entrada são
//! `Option` e a conversão é tolerante; apenas a ausência total de um
//! campo obrigatório em uma fonte é considerada erro de esquema.

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ProcessorError;

/// Campos exigidos nos metadados de músicas.
pub const SONG_REQUIRED_FIELDS: &[&str] = &[
    "song_id",
    "title",
    "artist_id",
    "artist_name",
    "year",
    "duration",
];

/// Campos exigidos nos logs de atividade.
pub const ACTIVITY_REQUIRED_FIELDS: &[&str] = &[
    "page",
    "ts",
    "userId",
    "firstName",
    "lastName",
    "gender",
    "level",
    "song",
    "artist",
    "length",
    "sessionId",
    "location",
    "userAgent",
];

/// Página que representa a reprodução de uma música.
pub const PLAY_PAGE: &str = "NextSong";

/* ========================================================================== */
/* Input                                                                      */
/* ========================================================================== */

/// Entrada de um arquivo de metadados de músicas.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SongRecord {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub year: Option<i64>,
    pub duration: Option<f64>,
}

/// Interação registrada no log de atividade.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub page: Option<String>,

    /// Epoch em milissegundos; validado apenas na decomposição temporal.
    #[serde(default)]
    pub ts: Value,

    #[serde(default, deserialize_with = "lenient::string")]
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl ActivityRecord {
    pub fn is_play(&self) -> bool {
        self.page.as_deref() == Some(PLAY_PAGE)
    }
}

/* ========================================================================== */
/* Output rows                                                                */
/* ========================================================================== */

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SongDim {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub year: Option<i64>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArtistDim {
    pub artist_id: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Um mesmo usuário pode aparecer em mais de uma linha quando o `level` muda.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UserDim {
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// Decomposição de calendário de um instante.
///
/// `weekday` segue a convenção 1 = domingo ... 7 = sábado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeDim {
    pub start_time: NaiveDateTime,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongPlayFact {
    pub start_time: NaiveDateTime,
    pub user_id: Option<String>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub year: i32,
    pub month: u32,
}

/* ========================================================================== */
/* Parsing                                                                    */
/* ========================================================================== */

/// Falha se algum campo obrigatório não aparecer em nenhum registro.
pub fn require_fields(
    dataset: &str,
    records: &[Value],
    required: &[&str],
) -> Result<(), ProcessorError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| {
            !records
                .iter()
                .any(|record| record.as_object().is_some_and(|obj| obj.contains_key(*field)))
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProcessorError::SchemaMismatch {
            dataset: dataset.to_string(),
            reason: format!("campos ausentes em todos os registros: {}", missing.join(", ")),
        })
    }
}

/// Converte os registros brutos no tipo da fonte, após validar o esquema.
pub fn parse_records<T>(
    dataset: &str,
    records: Vec<Value>,
    required: &[&str],
) -> Result<Vec<T>, ProcessorError>
where
    T: for<'de> Deserialize<'de>,
{
    require_fields(dataset, &records, required)?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value(record).map_err(|e| ProcessorError::SchemaMismatch {
                dataset: dataset.to_string(),
                reason: format!("registro {}: {}", index, e),
            })
        })
        .collect()
}

/// Deserializadores tolerantes a identificadores texto/número.
mod lenient {
    use serde::{Deserialize, Deserializer, de::Error};
    use serde_json::Value;

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "esperado texto ou número, recebido {}",
                other
            ))),
        }
    }

    /// Número de ponto flutuante sem parte fracionária (ex: `1969.0`).
    fn whole_number(f: f64) -> Option<i64> {
        let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
        (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
    }

    pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_number))
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("inteiro inválido: {}", n))),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("inteiro inválido: {:?}", s))),
            Some(other) => Err(D::Error::custom(format!(
                "esperado inteiro, recebido {}",
                other
            ))),
        }
    }
}
