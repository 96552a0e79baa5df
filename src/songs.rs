//! Extração das dimensões `songs` e `artists` a partir dos metadados de músicas.

use tracing::warn;

use crate::dedup::{drop_duplicates, duplicate_keys};
use crate::records::{ArtistDim, SongDim, SongRecord};

/// Dimensões derivadas de um conjunto de metadados de músicas.
#[derive(Debug, Clone, Default)]
pub struct SongTables {
    pub songs: Vec<SongDim>,
    pub artists: Vec<ArtistDim>,
}

pub fn project_song(record: &SongRecord) -> SongDim {
    SongDim {
        song_id: record.song_id.clone(),
        title: record.title.clone(),
        artist_id: record.artist_id.clone(),
        artist_name: record.artist_name.clone(),
        year: record.year,
        duration: record.duration,
    }
}

pub fn project_artist(record: &SongRecord) -> ArtistDim {
    ArtistDim {
        artist_id: record.artist_id.clone(),
        name: record.artist_name.clone(),
        location: record.artist_location.clone(),
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    }
}

/// Projeta e deduplica as duas dimensões de forma independente.
pub fn extract_song_tables(records: &[SongRecord]) -> SongTables {
    let songs = drop_duplicates(records.iter().map(project_song));
    let artists = drop_duplicates(records.iter().map(project_artist));

    let song_collisions = duplicate_keys(&songs, |s| s.song_id.clone());
    if !song_collisions.is_empty() {
        warn!(
            count = song_collisions.len(),
            sample = ?song_collisions.first(),
            "song_id repetido com atributos diferentes"
        );
    }

    let artist_collisions = duplicate_keys(&artists, |a| a.artist_id.clone());
    if !artist_collisions.is_empty() {
        warn!(
            count = artist_collisions.len(),
            sample = ?artist_collisions.first(),
            "artist_id repetido com atributos diferentes"
        );
    }

    SongTables { songs, artists }
}
