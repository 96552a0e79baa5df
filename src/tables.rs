//! # Mapeamento Linha ↔ DataFrame
//!
//! Cada tabela do modelo estrela declara o seu nome, as colunas de
//! particionamento e a conversão das suas linhas para um `DataFrame` do
//! Polars. As colunas de partição também ficam dentro dos arquivos.

use polars::prelude::*;

use crate::errors::ProcessorError;
use crate::records::{ArtistDim, SongDim, SongPlayFact, TimeDim, UserDim};

/// Tabela gravável pelo armazenamento.
pub trait Table: Sized {
    /// Nome da tabela, usado como diretório de saída.
    const NAME: &'static str;

    /// Colunas de particionamento, na ordem dos diretórios.
    const PARTITION_BY: &'static [&'static str] = &[];

    /// Valores das colunas de partição desta linha, na ordem de `PARTITION_BY`.
    fn partition_values(&self) -> Vec<Option<String>> {
        Vec::new()
    }

    fn to_frame(rows: &[Self]) -> PolarsResult<DataFrame>;
}

/// Tabela que pode ser relida do armazenamento.
pub trait ReadableTable: Table {
    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, ProcessorError>;
}

/* ========================================================================== */
/* Helpers                                                                    */
/* ========================================================================== */

fn strings<'a, T: 'a>(rows: &'a [T], f: impl Fn(&'a T) -> &'a Option<String>) -> Vec<Option<String>> {
    rows.iter().map(|row| f(row).clone()).collect()
}

/// Coluna `Datetime(ms)` a partir de epochs em milissegundos.
fn timestamps(name: &str, millis: impl Iterator<Item = i64>) -> PolarsResult<Column> {
    let millis: Vec<i64> = millis.collect();
    let series = Series::new(name.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(series.into())
}

fn read_strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let values = df
        .column(name)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

fn read_integers(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let values = series.i64()?.into_iter().collect();
    Ok(values)
}

fn read_floats(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

/* ========================================================================== */
/* Tables                                                                     */
/* ========================================================================== */

impl Table for SongDim {
    const NAME: &'static str = "songs";
    const PARTITION_BY: &'static [&'static str] = &["year", "artist_id"];

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![self.year.map(|y| y.to_string()), self.artist_id.clone()]
    }

    fn to_frame(rows: &[Self]) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Column::new("song_id".into(), strings(rows, |r| &r.song_id)),
            Column::new("title".into(), strings(rows, |r| &r.title)),
            Column::new("artist_id".into(), strings(rows, |r| &r.artist_id)),
            Column::new("artist_name".into(), strings(rows, |r| &r.artist_name)),
            Column::new("year".into(), rows.iter().map(|r| r.year).collect::<Vec<_>>()),
            Column::new("duration".into(), rows.iter().map(|r| r.duration).collect::<Vec<_>>()),
        ])
    }
}

impl ReadableTable for SongDim {
    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, ProcessorError> {
        let song_id = read_strings(df, "song_id")?;
        let title = read_strings(df, "title")?;
        let artist_id = read_strings(df, "artist_id")?;
        let artist_name = read_strings(df, "artist_name")?;
        let year = read_integers(df, "year")?;
        let duration = read_floats(df, "duration")?;

        let rows = song_id
            .into_iter()
            .zip(title)
            .zip(artist_id)
            .zip(artist_name)
            .zip(year)
            .zip(duration)
            .map(
                |(((((song_id, title), artist_id), artist_name), year), duration)| SongDim {
                    song_id,
                    title,
                    artist_id,
                    artist_name,
                    year,
                    duration,
                },
            )
            .collect();
        Ok(rows)
    }
}

impl Table for ArtistDim {
    const NAME: &'static str = "artists";

    fn to_frame(rows: &[Self]) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Column::new("artist_id".into(), strings(rows, |r| &r.artist_id)),
            Column::new("name".into(), strings(rows, |r| &r.name)),
            Column::new("location".into(), strings(rows, |r| &r.location)),
            Column::new("latitude".into(), rows.iter().map(|r| r.latitude).collect::<Vec<_>>()),
            Column::new("longitude".into(), rows.iter().map(|r| r.longitude).collect::<Vec<_>>()),
        ])
    }
}

impl Table for UserDim {
    const NAME: &'static str = "users";

    fn to_frame(rows: &[Self]) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Column::new("user_id".into(), strings(rows, |r| &r.user_id)),
            Column::new("first_name".into(), strings(rows, |r| &r.first_name)),
            Column::new("last_name".into(), strings(rows, |r| &r.last_name)),
            Column::new("gender".into(), strings(rows, |r| &r.gender)),
            Column::new("level".into(), strings(rows, |r| &r.level)),
        ])
    }
}

impl Table for TimeDim {
    const NAME: &'static str = "time";
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![Some(self.year.to_string()), Some(self.month.to_string())]
    }

    fn to_frame(rows: &[Self]) -> PolarsResult<DataFrame> {
        let part = |f: fn(&TimeDim) -> i32| rows.iter().map(f).collect::<Vec<i32>>();
        DataFrame::new(vec![
            timestamps("start_time", rows.iter().map(|r| r.start_time.and_utc().timestamp_millis()))?,
            Column::new("hour".into(), part(|r| r.hour as i32)),
            Column::new("day".into(), part(|r| r.day as i32)),
            Column::new("week".into(), part(|r| r.week as i32)),
            Column::new("month".into(), part(|r| r.month as i32)),
            Column::new("year".into(), part(|r| r.year)),
            Column::new("weekday".into(), part(|r| r.weekday as i32)),
        ])
    }
}

impl Table for SongPlayFact {
    const NAME: &'static str = "song_plays";
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn partition_values(&self) -> Vec<Option<String>> {
        vec![Some(self.year.to_string()), Some(self.month.to_string())]
    }

    fn to_frame(rows: &[Self]) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            timestamps("start_time", rows.iter().map(|r| r.start_time.and_utc().timestamp_millis()))?,
            Column::new("user_id".into(), strings(rows, |r| &r.user_id)),
            Column::new("level".into(), strings(rows, |r| &r.level)),
            Column::new("song_id".into(), strings(rows, |r| &r.song_id)),
            Column::new("artist_id".into(), strings(rows, |r| &r.artist_id)),
            Column::new("session_id".into(), rows.iter().map(|r| r.session_id).collect::<Vec<_>>()),
            Column::new("location".into(), strings(rows, |r| &r.location)),
            Column::new("user_agent".into(), strings(rows, |r| &r.user_agent)),
            Column::new("year".into(), rows.iter().map(|r| r.year).collect::<Vec<i32>>()),
            Column::new("month".into(), rows.iter().map(|r| r.month as i32).collect::<Vec<i32>>()),
        ])
    }
}
