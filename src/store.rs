//! # Armazenamento Tabular (JSON → Parquet particionado)
//!
//! ## Engenharia de Dados
//! Este módulo implementa o colaborador de I/O do pipeline:
//! - leitura de registros JSON (objeto único, NDJSON ou lista) a partir de
//!   padrões glob;
//! - gravação de tabelas em Parquet, particionadas em diretórios no estilo
//!   Hive (`coluna=valor/`), sempre em modo de sobrescrita total;
//! - releitura de tabelas já publicadas.
//!
//! ## Atomização
//! A tabela é escrita por completo num diretório de staging. A versão
//! anterior é renomeada para `.<tabela>.previous`, o staging assume o lugar
//! dela e só então a versão anterior é removida.
//! O marcador `_SUCCESS` identifica uma tabela publicada por completo.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use polars::io::SerReader;
use polars::prelude::StatisticsOptions;
use polars::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::ProcessorError;
use crate::models::{Compression, Config, StorageConfig};
use crate::tables::{ReadableTable, Table};

/// Marcador gravado por último em cada tabela publicada.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Diretório das partições com valor nulo ou vazio.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

const PART_FILE: &str = "part-00000.parquet";

/// Resultado da gravação de uma tabela.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub table: &'static str,
    pub rows: usize,
    pub partitions: usize,
    pub path: PathBuf,
}

/// Primitivas de leitura e gravação usadas pelas etapas do pipeline.
pub trait TableStore {
    /// Lê todos os registros JSON dos arquivos que casam com o padrão.
    fn read_records(&self, pattern: &str) -> Result<Vec<Value>, ProcessorError>;

    /// Substitui por completo o conteúdo da tabela `T::NAME`.
    fn write_table<T: Table + Clone>(&self, rows: &[T]) -> Result<TableSummary, ProcessorError>;

    /// Relê uma tabela publicada; falha com `MissingDependency` se ela não existir.
    fn read_table<T: ReadableTable>(&self) -> Result<Vec<T>, ProcessorError>;
}

/// Armazenamento Parquet no sistema de arquivos local.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    output_root: PathBuf,
    storage: StorageConfig,
}

impl ParquetStore {
    pub fn new(output_root: impl Into<PathBuf>, storage: StorageConfig) -> Self {
        if !storage.options.is_empty() {
            let mut keys: Vec<&String> = storage.options.keys().collect();
            keys.sort();
            debug!(?keys, "opções de backend recebidas");
        }
        ParquetStore {
            output_root: output_root.into(),
            storage,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.output_dir(), config.storage.clone())
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.output_root.join(table)
    }

    fn compression(&self) -> ParquetCompression {
        match self.storage.compression {
            Compression::Snappy => ParquetCompression::Snappy,
            Compression::Zstd => ParquetCompression::Zstd(None),
            Compression::Uncompressed => ParquetCompression::Uncompressed,
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.storage.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    /// Grava as partições no diretório de staging; retorna quantas foram criadas.
    fn write_partitions<T: Table + Clone>(
        &self,
        staging: &Path,
        rows: &[T],
    ) -> Result<usize, ProcessorError> {
        let mut groups: BTreeMap<Vec<Option<String>>, Vec<T>> = BTreeMap::new();
        for row in rows {
            groups.entry(row.partition_values()).or_default().push(row.clone());
        }
        if T::PARTITION_BY.is_empty() && groups.is_empty() {
            groups.insert(Vec::new(), Vec::new());
        }

        let partitions = groups.len();
        for (values, group) in groups {
            let dir = staging.join(partition_dir(T::PARTITION_BY, &values));
            fs::create_dir_all(&dir)?;

            let mut dataframe = T::to_frame(&group)?;
            self.write_parquet(&dir.join(PART_FILE), &mut dataframe)?;
            debug!(table = T::NAME, partition = %dir.display(), rows = group.len(), "partição gravada");
        }
        Ok(partitions)
    }

    /// Troca a tabela publicada pelo staging. A versão anterior só é
    /// removida depois que o staging assume o seu lugar; se a troca falhar,
    /// ela é restaurada.
    fn swap_into_place(&self, table: &str, staging: &Path, target: &Path) -> Result<(), ProcessorError> {
        let previous = self.output_root.join(format!(".{}.previous", table));
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }

        let had_previous = target.exists();
        if had_previous {
            fs::rename(target, &previous)?;
        }

        if let Err(e) = fs::rename(staging, target) {
            if had_previous {
                if let Err(restore) = fs::rename(&previous, target) {
                    warn!(table, error = %restore, "falha ao restaurar a versão anterior");
                }
            }
            return Err(ProcessorError::Io(e));
        }

        if had_previous {
            if let Err(cleanup) = fs::remove_dir_all(&previous) {
                warn!(table, error = %cleanup, "falha ao remover a versão anterior");
            }
        }
        Ok(())
    }

    fn write_parquet(&self, path: &Path, dataframe: &mut DataFrame) -> Result<(), ProcessorError> {
        let file_out = File::create(path).map_err(ProcessorError::Io)?;

        let stats_options = StatisticsOptions {
            min_value: true,
            max_value: true,
            null_count: true,
            distinct_count: false,
        };

        ParquetWriter::new(file_out)
            .with_compression(self.compression())
            .with_statistics(stats_options)
            .finish(dataframe)
            .map_err(|e| ProcessorError::Parquet(format!("Erro ao gravar Parquet: {}", e)))?;
        Ok(())
    }
}

impl TableStore for ParquetStore {
    fn read_records(&self, pattern: &str) -> Result<Vec<Value>, ProcessorError> {
        let paths = resolve_pattern(pattern)?;
        if paths.is_empty() {
            return Err(ProcessorError::InputNotFound {
                pattern: pattern.to_string(),
            });
        }

        let pb = self.progress_bar(paths.len());
        let mut records = Vec::new();
        for path in &paths {
            pb.set_message(path.display().to_string());
            records.extend(read_json_file(path)?);
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(pattern, files = paths.len(), records = records.len(), "registros lidos");
        Ok(records)
    }

    fn write_table<T: Table + Clone>(&self, rows: &[T]) -> Result<TableSummary, ProcessorError> {
        let target = self.table_path(T::NAME);
        let staging = self.output_root.join(format!(".{}.staging", T::NAME));

        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let partitions = match self.write_partitions(&staging, rows) {
            Ok(n) => n,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(table = T::NAME, error = %cleanup, "falha ao limpar staging");
                }
                return Err(e);
            }
        };
        File::create(staging.join(SUCCESS_MARKER))?;

        self.swap_into_place(T::NAME, &staging, &target)?;

        info!(table = T::NAME, rows = rows.len(), partitions, "tabela gravada");
        Ok(TableSummary {
            table: T::NAME,
            rows: rows.len(),
            partitions,
            path: target,
        })
    }

    fn read_table<T: ReadableTable>(&self) -> Result<Vec<T>, ProcessorError> {
        let target = self.table_path(T::NAME);
        if !target.join(SUCCESS_MARKER).is_file() {
            return Err(ProcessorError::MissingDependency {
                table: T::NAME.to_string(),
                path: target,
            });
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&target)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!("Erro ao percorrer {}: {}", T::NAME, e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            .collect();
        files.sort();

        let mut rows = Vec::new();
        for path in &files {
            let file = File::open(path)?;
            let dataframe = ParquetReader::new(file)
                .finish()
                .map_err(|e| ProcessorError::Parquet(format!("Falha ao ler {}: {}", path.display(), e)))?;
            rows.extend(T::from_frame(&dataframe)?);
        }

        debug!(table = T::NAME, files = files.len(), rows = rows.len(), "tabela relida");
        Ok(rows)
    }
}

/// Arquivos que casam com o padrão, em ordem determinística.
fn resolve_pattern(pattern: &str) -> Result<Vec<PathBuf>, ProcessorError> {
    let mut paths = Vec::new();
    for entry in glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => warn!("Erro ao ler entrada do glob: {}", e),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Lê um arquivo com um objeto, vários objetos (NDJSON) ou uma lista de objetos.
fn read_json_file(path: &Path) -> Result<Vec<Value>, ProcessorError> {
    let malformed = |reason: String| ProcessorError::SchemaMismatch {
        dataset: path.display().to_string(),
        reason,
    };

    let file = File::open(path).map_err(ProcessorError::Io)?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for value in serde_json::Deserializer::from_reader(reader).into_iter::<Value>() {
        let value = value.map_err(|e| malformed(format!("JSON inválido: {}", e)))?;
        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in items {
            if !item.is_object() {
                return Err(malformed(format!("registro não é um objeto: {}", item)));
            }
            records.push(item);
        }
    }
    Ok(records)
}

/// Caminho relativo da partição: `col=valor/col=valor`.
fn partition_dir(columns: &[&str], values: &[Option<String>]) -> PathBuf {
    columns
        .iter()
        .zip(values)
        .map(|(column, value)| {
            let value = match value.as_deref() {
                None | Some("") => DEFAULT_PARTITION.to_string(),
                Some(v) => escape_partition_value(v),
            };
            format!("{}={}", column, value)
        })
        .collect()
}

/// Escapa em `%XX` tudo o que não for alfanumérico ou `-_.~`.
fn escape_partition_value(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::decompose;
    use crate::records::{ArtistDim, SongDim, TimeDim};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ParquetStore {
        let storage = StorageConfig {
            show_progress: false,
            ..Default::default()
        };
        ParquetStore::new(dir.path().join("out"), storage)
    }

    fn song(id: &str, artist_id: &str, year: i64) -> SongDim {
        SongDim {
            song_id: Some(id.to_string()),
            title: Some(format!("title {id}")),
            artist_id: Some(artist_id.to_string()),
            artist_name: Some("Elena".to_string()),
            year: Some(year),
            duration: Some(269.58338),
        }
    }

    #[test]
    fn reads_single_objects_ndjson_and_arrays() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.json"), r#"{"song_id": "S1"}"#).unwrap();
        fs::write(input.join("b.json"), "{\"ts\": 1}\n{\"ts\": 2}\n").unwrap();
        fs::write(input.join("c.json"), r#"[{"x": 1}, {"x": 2}]"#).unwrap();
        fs::write(input.join("ignored.txt"), "not json").unwrap();

        let pattern = format!("{}/*.json", input.display());
        let records = store(&dir).read_records(&pattern).unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[0]["song_id"], "S1");
        assert_eq!(records[2]["ts"], 2);
    }

    #[test]
    fn no_matching_files_is_input_not_found() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/nothing/*.json", dir.path().display());

        let err = store(&dir).read_records(&pattern).unwrap_err();

        assert!(matches!(err, ProcessorError::InputNotFound { .. }));
    }

    #[test]
    fn non_object_records_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), "[1, 2]").unwrap();

        let pattern = format!("{}/*.json", dir.path().display());
        let err = store(&dir).read_records(&pattern).unwrap_err();

        assert!(matches!(err, ProcessorError::SchemaMismatch { .. }));
    }

    #[test]
    fn writes_hive_partitions_and_success_marker() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let rows = vec![song("S1", "AR1", 2000), song("S2", "AR1", 2000), song("S3", "AR2", 1999)];

        let summary = store.write_table(&rows).unwrap();

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.partitions, 2);
        let table = store.table_path("songs");
        assert!(table.join(SUCCESS_MARKER).is_file());
        assert!(table.join("year=2000/artist_id=AR1").join(PART_FILE).is_file());
        assert!(table.join("year=1999/artist_id=AR2").join(PART_FILE).is_file());
        assert!(!dir.path().join("out/.songs.staging").exists());
    }

    #[test]
    fn rewrite_replaces_previous_partitions() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.write_table(&[song("S1", "AR1", 2000)]).unwrap();
        store.write_table(&[song("S9", "AR9", 2010)]).unwrap();

        let table = store.table_path("songs");
        assert!(!table.join("year=2000").exists());
        let back: Vec<SongDim> = store.read_table().unwrap();
        assert_eq!(back, vec![song("S9", "AR9", 2010)]);
    }

    #[test]
    fn unpartitioned_table_is_written_flat() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let artists = vec![ArtistDim {
            artist_id: Some("AR1".to_string()),
            ..Default::default()
        }];

        let summary = store.write_table(&artists).unwrap();

        assert_eq!(summary.partitions, 1);
        assert!(store.table_path("artists").join(PART_FILE).is_file());
    }

    #[test]
    fn time_table_is_partitioned_by_year_and_month() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let rows: Vec<TimeDim> = vec![decompose(1541121934796).unwrap()];

        store.write_table(&rows).unwrap();

        assert!(store.table_path("time").join("year=2018/month=11").join(PART_FILE).is_file());
    }

    #[test]
    fn songs_round_trip_through_parquet() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut no_year = song("S2", "AR2", 0);
        no_year.year = None;
        let rows = vec![song("S1", "AR1", 2000), no_year];

        store.write_table(&rows).unwrap();
        let mut back: Vec<SongDim> = store.read_table().unwrap();
        back.sort_by(|a, b| a.song_id.cmp(&b.song_id));

        assert_eq!(back, rows);
        assert!(store
            .table_path("songs")
            .join(format!("year={DEFAULT_PARTITION}"))
            .is_dir());
    }

    #[test]
    fn reading_unpublished_table_is_missing_dependency() {
        let dir = TempDir::new().unwrap();

        let err = store(&dir).read_table::<SongDim>().unwrap_err();

        match err {
            ProcessorError::MissingDependency { table, .. } => assert_eq!(table, "songs"),
            other => panic!("erro inesperado: {other}"),
        }
    }

    #[test]
    fn failed_swap_keeps_previous_table() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.write_table(&[song("S1", "AR1", 2000)]).unwrap();

        let target = store.table_path("songs");
        let missing_staging = dir.path().join("out/.songs.never-written");
        let err = store
            .swap_into_place("songs", &missing_staging, &target)
            .unwrap_err();

        assert!(matches!(err, ProcessorError::Io(_)));
        assert!(target.join(SUCCESS_MARKER).is_file());
        assert!(!dir.path().join("out/.songs.previous").exists());
        let back: Vec<SongDim> = store.read_table().unwrap();
        assert_eq!(back, vec![song("S1", "AR1", 2000)]);
    }

    #[test]
    fn successful_swap_leaves_no_previous_copy() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.write_table(&[song("S1", "AR1", 2000)]).unwrap();
        store.write_table(&[song("S2", "AR2", 2001)]).unwrap();

        assert!(!dir.path().join("out/.songs.previous").exists());
        assert!(!dir.path().join("out/.songs.staging").exists());
    }

    #[test]
    fn partition_values_are_escaped() {
        assert_eq!(escape_partition_value("AR/1=x"), "AR%2F1%3Dx");
        assert_eq!(escape_partition_value("plain-id_1.0"), "plain-id_1.0");
        assert_eq!(escape_partition_value("a\nb c"), "a%0Ab%20c");
        assert_eq!(
            partition_dir(&["year", "artist_id"], &[Some("2000".to_string()), Some(String::new())]),
            PathBuf::from(format!("year=2000/artist_id={DEFAULT_PARTITION}"))
        );
    }
}
