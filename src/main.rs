//! # Sparkify Lake — Driver
//!
//! ## Visão Geral
//! Carrega a configuração, monta o armazenamento Parquet e executa as duas
//! etapas do pipeline na ordem exigida: metadados de músicas, depois logs
//! de atividade.
//!
//! ## Princípios de Engenharia
//! - **Fail-Fast**: qualquer erro aborta a execução; a decisão de repetir
//!   fica com quem chama o binário.
//! - **Observabilidade**: Logs estruturados com tempos de execução por etapa.

use std::env;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sparkify_lake::{Config, ParquetStore, process_log_data, process_song_data};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sparkify_lake=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let global_timer = Instant::now();

    info!("--- INICIANDO ETL PIPELINE ---");

    // Carrega configuração TOML (permite passar caminho via CLI)
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "pipeline.toml".to_string());

    let config = match Config::load_from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("Erro na carga de configuração '{}': {}", config_path, e);
            std::process::exit(1);
        }
    };

    let store = ParquetStore::from_config(&config);

    let songs = process_song_data(&store, &config)?;
    info!(
        "songs: {} linhas em {} partições | artists: {} linhas",
        songs.songs.rows, songs.songs.partitions, songs.artists.rows
    );

    let logs = process_log_data(&store, &config)?;
    info!(
        "users: {} | time: {} | song_plays: {} ({} resolvidas)",
        logs.users.rows, logs.time.rows, logs.song_plays.rows, logs.matched
    );

    info!(
        "Fim da execução; saída em {} ({:.2?})",
        config.output_root,
        global_timer.elapsed()
    );

    Ok(())
}
