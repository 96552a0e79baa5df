//! # Etapas do Pipeline
//!
//! 1. **Metadados de músicas** → `songs` e `artists`.
//! 2. **Logs de atividade** → `users`, `time` e `song_plays`; a resolução
//!    das reproduções relê a tabela `songs` publicada na etapa 1.
//!
//! Cada etapa calcula todas as suas tabelas antes de gravar a primeira, de
//! modo que uma falha de validação não deixa tabelas parciais visíveis.

use std::time::Instant;

use tracing::info;

use crate::activity::{decompose_plays, extract_time, extract_users, filter_plays};
use crate::errors::ProcessorError;
use crate::models::Config;
use crate::records::{
    ACTIVITY_REQUIRED_FIELDS, ActivityRecord, SONG_REQUIRED_FIELDS, SongDim, SongRecord,
    parse_records,
};
use crate::resolver::{ExactSongIndex, resolve_song_plays};
use crate::songs::extract_song_tables;
use crate::store::{TableStore, TableSummary};

/// Resultado da etapa de metadados de músicas.
#[derive(Debug, Clone)]
pub struct SongStageSummary {
    pub records: usize,
    pub songs: TableSummary,
    pub artists: TableSummary,
}

/// Resultado da etapa de logs de atividade.
#[derive(Debug, Clone)]
pub struct LogStageSummary {
    pub records: usize,
    pub plays: usize,
    pub users: TableSummary,
    pub time: TableSummary,
    pub song_plays: TableSummary,
    /// Reproduções resolvidas para uma música conhecida.
    pub matched: usize,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub song_stage: SongStageSummary,
    pub log_stage: LogStageSummary,
}

/// Lê os metadados de músicas e publica `songs` e `artists`.
pub fn process_song_data<S: TableStore>(
    store: &S,
    config: &Config,
) -> Result<SongStageSummary, ProcessorError> {
    let timer = Instant::now();

    let raw = store.read_records(&config.song_pattern())?;
    let records: Vec<SongRecord> = parse_records("song_data", raw, SONG_REQUIRED_FIELDS)?;
    let tables = extract_song_tables(&records);

    let songs = store.write_table(&tables.songs)?;
    let artists = store.write_table(&tables.artists)?;

    info!(
        records = records.len(),
        songs = songs.rows,
        artists = artists.rows,
        "Etapa de músicas concluída ({:.2?})",
        timer.elapsed()
    );

    Ok(SongStageSummary {
        records: records.len(),
        songs,
        artists,
    })
}

/// Lê os logs de atividade e publica `users`, `time` e `song_plays`.
///
/// # Erros
/// `MissingDependency` se `songs` ainda não tiver sido publicada.
pub fn process_log_data<S: TableStore>(
    store: &S,
    config: &Config,
) -> Result<LogStageSummary, ProcessorError> {
    let timer = Instant::now();

    let raw = store.read_records(&config.log_pattern())?;
    let records: Vec<ActivityRecord> = parse_records("log_data", raw, ACTIVITY_REQUIRED_FIELDS)?;
    let record_count = records.len();

    let plays = filter_plays(records);
    let users = extract_users(&plays);
    let plays = decompose_plays(plays)?;
    let time = extract_time(&plays);

    let songs: Vec<SongDim> = store.read_table()?;
    let index = ExactSongIndex::new(songs);
    let facts = resolve_song_plays(&plays, &index);
    let matched = facts.iter().filter(|f| f.song_id.is_some()).count();

    let users = store.write_table(&users)?;
    let time = store.write_table(&time)?;
    let song_plays = store.write_table(&facts)?;

    info!(
        records = record_count,
        plays = plays.len(),
        matched,
        "Etapa de logs concluída ({:.2?})",
        timer.elapsed()
    );

    Ok(LogStageSummary {
        records: record_count,
        plays: plays.len(),
        users,
        time,
        song_plays,
        matched,
    })
}

/// Executa as duas etapas na ordem exigida pela dependência de `songs`.
pub fn run<S: TableStore>(store: &S, config: &Config) -> Result<RunSummary, ProcessorError> {
    let song_stage = process_song_data(store, config)?;
    let log_stage = process_log_data(store, config)?;
    Ok(RunSummary {
        song_stage,
        log_stage,
    })
}
