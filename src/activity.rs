//! # Extração dos Logs de Atividade
//!
//! Filtra as reproduções (`page == "NextSong"`), deriva a dimensão de
//! usuários e decompõe o `ts` de cada reprodução em atributos de calendário.
//!
//! O instante é interpretado como epoch sem fuso horário (semântica
//! ingênua), com precisão de milissegundos. A numeração do dia da semana
//! segue 1 = domingo ... 7 = sábado.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use serde_json::Value;

use crate::dedup::drop_duplicates;
use crate::errors::ProcessorError;
use crate::records::{ActivityRecord, TimeDim, UserDim};

/// Reprodução com o `ts` já decomposto; candidata a linha da tabela fato.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedActivity {
    pub record: ActivityRecord,
    pub time: TimeDim,
}

/// Mantém apenas os registros de reprodução.
pub fn filter_plays(records: Vec<ActivityRecord>) -> Vec<ActivityRecord> {
    records.into_iter().filter(ActivityRecord::is_play).collect()
}

pub fn project_user(record: &ActivityRecord) -> UserDim {
    UserDim {
        user_id: record.user_id.clone(),
        first_name: record.first_name.clone(),
        last_name: record.last_name.clone(),
        gender: record.gender.clone(),
        level: record.level.clone(),
    }
}

/// Uma mudança de `level` gera uma segunda linha, não uma atualização.
pub fn extract_users(plays: &[ActivityRecord]) -> Vec<UserDim> {
    drop_duplicates(plays.iter().map(project_user))
}

/// Interpreta o `ts` bruto como epoch em milissegundos.
///
/// Aceita inteiros, números de ponto flutuante finitos (truncados) e
/// texto numérico; rejeita valores negativos e qualquer outro tipo.
pub fn parse_epoch_millis(ts: &Value) -> Result<i64, ProcessorError> {
    let malformed = || ProcessorError::MalformedTimestamp {
        value: ts.to_string(),
    };

    let millis = match ts {
        Value::Number(n) => match n.as_i64() {
            Some(ms) => ms,
            None => n.as_f64().and_then(truncate_millis).ok_or_else(malformed)?,
        },
        Value::String(s) => {
            let text = s.trim();
            match text.parse::<i64>() {
                Ok(ms) => ms,
                Err(_) => text
                    .parse::<f64>()
                    .ok()
                    .and_then(truncate_millis)
                    .ok_or_else(malformed)?,
            }
        }
        _ => return Err(malformed()),
    };

    if millis < 0 {
        return Err(malformed());
    }
    Ok(millis)
}

/// Epoch fracionário truncado para milissegundos inteiros; `None` se não
/// for finito, for negativo ou não couber em `i64`.
fn truncate_millis(f: f64) -> Option<i64> {
    if !f.is_finite() || f < 0.0 || f >= i64::MAX as f64 {
        return None;
    }
    Some(f.trunc() as i64)
}

/// Decompõe um epoch em milissegundos nos atributos de calendário.
///
/// Função pura: o mesmo `ts` sempre produz a mesma linha.
pub fn decompose(epoch_millis: i64) -> Result<TimeDim, ProcessorError> {
    let start_time: NaiveDateTime = DateTime::from_timestamp_millis(epoch_millis)
        .ok_or_else(|| ProcessorError::MalformedTimestamp {
            value: epoch_millis.to_string(),
        })?
        .naive_utc();

    Ok(TimeDim {
        start_time,
        hour: start_time.hour(),
        day: start_time.day(),
        week: start_time.iso_week().week(),
        month: start_time.month(),
        year: start_time.year(),
        weekday: start_time.weekday().number_from_sunday(),
    })
}

/// Decompõe o `ts` de cada reprodução, sem deduplicar.
pub fn decompose_plays(plays: Vec<ActivityRecord>) -> Result<Vec<TimedActivity>, ProcessorError> {
    plays
        .into_iter()
        .map(|record| {
            let time = decompose(parse_epoch_millis(&record.ts)?)?;
            Ok(TimedActivity { record, time })
        })
        .collect()
}

pub fn extract_time(plays: &[TimedActivity]) -> Vec<TimeDim> {
    drop_duplicates(plays.iter().map(|play| play.time))
}
