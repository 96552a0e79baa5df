//! # Sparkify Lake
//!
//! Transforma metadados de músicas e logs de atividade (JSON de esquema
//! frouxo) num modelo estrela em Parquet: dimensões `songs`, `artists`,
//! `users` e `time`, e o fato `song_plays`.
//!
//! O núcleo são funções puras sobre coleções de linhas ([`songs`],
//! [`activity`], [`resolver`]); a leitura e a gravação ficam a cargo de um
//! [`store::TableStore`].

pub mod activity;
pub mod dedup;
pub mod errors;
mod impl_errors;
pub mod models;
pub mod pipeline;
pub mod records;
pub mod resolver;
pub mod songs;
pub mod store;
pub mod tables;

pub use errors::ProcessorError;
pub use models::Config;
pub use pipeline::{process_log_data, process_song_data, run};
pub use store::{ParquetStore, TableStore};
