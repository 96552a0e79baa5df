//! # Resolução das Reproduções
//!
//! Os eventos de atividade não carregam identificador de música; a ligação
//! com `songs` é feita por valor: título, nome do artista e duração.
//!
//! ## Estratégia
//! - **Predicado isolado**: [`exact_match`] define a correspondência; a
//!   busca é feita por um [`SongMatcher`], trocável sem alterar a junção.
//! - **Broadcast**: a tabela `songs` (lado pequeno) é indexada em memória
//!   uma única vez e consultada por cada evento.
//! - **Left join**: todo evento gera exatamente uma linha fato; sem
//!   correspondência, `song_id` e `artist_id` ficam nulos.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::activity::TimedActivity;
use crate::dedup::float_identity;
use crate::records::{ActivityRecord, SongDim, SongPlayFact};

/// Igualdade exata nos três campos; valores nulos nunca correspondem.
pub fn exact_match(event: &ActivityRecord, song: &SongDim) -> bool {
    let title = matches!((&event.song, &song.title), (Some(a), Some(b)) if a == b);
    let artist = matches!((&event.artist, &song.artist_name), (Some(a), Some(b)) if a == b);
    let duration = matches!((event.length, song.duration), (Some(a), Some(b)) if a == b);
    title && artist && duration
}

/// Estratégia de busca das músicas candidatas para um evento.
pub trait SongMatcher {
    /// Músicas que satisfazem o predicado, na ordem da tabela `songs`.
    fn candidates(&self, event: &ActivityRecord) -> Vec<&SongDim>;
}

type MatchKey = (String, String, u64);

fn event_key(event: &ActivityRecord) -> Option<MatchKey> {
    let length = event.length.filter(|l| !l.is_nan());
    Some((
        event.song.clone()?,
        event.artist.clone()?,
        float_identity(length)?,
    ))
}

fn song_key(song: &SongDim) -> Option<MatchKey> {
    let duration = song.duration.filter(|d| !d.is_nan());
    Some((
        song.title.clone()?,
        song.artist_name.clone()?,
        float_identity(duration)?,
    ))
}

/// Índice hash de `songs` para o predicado [`exact_match`].
#[derive(Debug, Default)]
pub struct ExactSongIndex {
    songs: Vec<SongDim>,
    by_key: HashMap<MatchKey, Vec<usize>>,
}

impl ExactSongIndex {
    pub fn new(songs: Vec<SongDim>) -> Self {
        let mut by_key: HashMap<MatchKey, Vec<usize>> = HashMap::new();
        for (position, song) in songs.iter().enumerate() {
            if let Some(key) = song_key(song) {
                by_key.entry(key).or_default().push(position);
            }
        }
        debug!(songs = songs.len(), keys = by_key.len(), "índice de músicas construído");
        ExactSongIndex { songs, by_key }
    }
}

impl SongMatcher for ExactSongIndex {
    fn candidates(&self, event: &ActivityRecord) -> Vec<&SongDim> {
        let Some(positions) = event_key(event).and_then(|key| self.by_key.get(&key)) else {
            return Vec::new();
        };
        positions
            .iter()
            .map(|&position| &self.songs[position])
            .filter(|song| exact_match(event, *song))
            .collect()
    }
}

/// Varredura completa com um predicado arbitrário (ex: correspondência aproximada).
pub struct PredicateScan<F> {
    songs: Vec<SongDim>,
    predicate: F,
}

impl<F> PredicateScan<F>
where
    F: Fn(&ActivityRecord, &SongDim) -> bool,
{
    pub fn new(songs: Vec<SongDim>, predicate: F) -> Self {
        PredicateScan { songs, predicate }
    }
}

impl<F> SongMatcher for PredicateScan<F>
where
    F: Fn(&ActivityRecord, &SongDim) -> bool,
{
    fn candidates(&self, event: &ActivityRecord) -> Vec<&SongDim> {
        self.songs
            .iter()
            .filter(|song| (self.predicate)(event, *song))
            .collect()
    }
}

/// Monta a linha fato de um evento, com a música resolvida (se houver).
pub fn project_fact(play: &TimedActivity, song: Option<&SongDim>) -> SongPlayFact {
    let record = &play.record;
    SongPlayFact {
        start_time: play.time.start_time,
        user_id: record.user_id.clone(),
        level: record.level.clone(),
        song_id: song.and_then(|s| s.song_id.clone()),
        artist_id: song.and_then(|s| s.artist_id.clone()),
        session_id: record.session_id,
        location: record.location.clone(),
        user_agent: record.user_agent.clone(),
        year: play.time.year,
        month: play.time.month,
    }
}

/// Left join dos eventos com `songs`: uma linha fato por evento.
///
/// Quando mais de uma música satisfaz o predicado, a primeira na ordem da
/// tabela `songs` é usada, preservando a cardinalidade do lado dos eventos.
pub fn resolve_song_plays<M: SongMatcher>(plays: &[TimedActivity], matcher: &M) -> Vec<SongPlayFact> {
    let mut matched = 0usize;
    let mut ambiguous = 0usize;

    let facts: Vec<SongPlayFact> = plays
        .iter()
        .map(|play| {
            let candidates = matcher.candidates(&play.record);
            if let Some(first) = candidates.first() {
                matched += 1;
                let distinct = candidates
                    .iter()
                    .any(|c| c.song_id != first.song_id || c.artist_id != first.artist_id);
                if distinct {
                    ambiguous += 1;
                }
            }
            project_fact(play, candidates.first().copied())
        })
        .collect();

    if ambiguous > 0 {
        warn!(ambiguous, "eventos com mais de uma música correspondente; usada a primeira");
    }
    debug!(events = plays.len(), matched, "reproduções resolvidas");

    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::decompose;
    use serde_json::json;

    fn song(id: &str, title: &str, artist: &str, duration: f64) -> SongDim {
        SongDim {
            song_id: Some(id.to_string()),
            title: Some(title.to_string()),
            artist_id: Some(format!("AR-{id}")),
            artist_name: Some(artist.to_string()),
            year: Some(2008),
            duration: Some(duration),
        }
    }

    fn play(title: &str, artist: &str, length: f64, ts: i64) -> TimedActivity {
        TimedActivity {
            record: ActivityRecord {
                page: Some("NextSong".to_string()),
                ts: json!(ts),
                user_id: Some("26".to_string()),
                level: Some("free".to_string()),
                song: Some(title.to_string()),
                artist: Some(artist.to_string()),
                length: Some(length),
                session_id: Some(583),
                location: Some("San Jose-Sunnyvale-Santa Clara, CA".to_string()),
                user_agent: Some("Mozilla/5.0".to_string()),
                ..Default::default()
            },
            time: decompose(ts).unwrap(),
        }
    }

    #[test]
    fn unmatched_event_yields_null_song_and_artist() {
        let index = ExactSongIndex::new(vec![song("S1", "Other", "Elena", 269.58338)]);
        let plays = vec![play("Setanta matins", "Elena", 269.58338, 1541121934796)];

        let facts = resolve_song_plays(&plays, &index);

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].song_id, None);
        assert_eq!(facts[0].artist_id, None);
        assert_eq!(facts[0].start_time, decompose(1541121934796).unwrap().start_time);
        assert_eq!(facts[0].year, 2018);
        assert_eq!(facts[0].month, 11);
        assert_eq!(facts[0].session_id, Some(583));
    }

    #[test]
    fn matched_event_carries_song_keys() {
        let index = ExactSongIndex::new(vec![
            song("S1", "Setanta matins", "Elena", 269.58338),
            song("S2", "Setanta matins", "Elena", 100.0),
        ]);
        let plays = vec![play("Setanta matins", "Elena", 269.58338, 1541121934796)];

        let facts = resolve_song_plays(&plays, &index);

        assert_eq!(facts[0].song_id.as_deref(), Some("S1"));
        assert_eq!(facts[0].artist_id.as_deref(), Some("AR-S1"));
    }

    #[test]
    fn every_predicate_field_must_match_exactly() {
        let songs = vec![song("S1", "Setanta matins", "Elena", 269.58338)];
        let index = ExactSongIndex::new(songs);

        for event in [
            play("Setanta Matins", "Elena", 269.58338, 0),
            play("Setanta matins", "elena", 269.58338, 0),
            play("Setanta matins", "Elena", 269.5834, 0),
        ] {
            assert!(index.candidates(&event.record).is_empty());
        }
    }

    #[test]
    fn nulls_never_match() {
        let mut null_song = song("S1", "T", "A", 1.0);
        null_song.title = None;
        let mut event = play("T", "A", 1.0, 0);

        assert!(!exact_match(&event.record, &null_song));

        event.record.song = None;
        let index = ExactSongIndex::new(vec![null_song]);
        assert!(index.candidates(&event.record).is_empty());
    }

    #[test]
    fn ambiguous_matches_keep_cardinality() {
        let index = ExactSongIndex::new(vec![
            song("S1", "Intro", "The XX", 128.0),
            song("S2", "Intro", "The XX", 128.0),
        ]);
        let plays = vec![play("Intro", "The XX", 128.0, 0), play("Nope", "The XX", 1.0, 1)];

        let facts = resolve_song_plays(&plays, &index);

        assert_eq!(facts.len(), plays.len());
        assert_eq!(facts[0].song_id.as_deref(), Some("S1"));
        assert_eq!(facts[1].song_id, None);
    }

    #[test]
    fn predicate_scan_agrees_with_index_and_accepts_other_predicates() {
        let songs = vec![
            song("S1", "Intro", "The XX", 128.0),
            song("S2", "Crystalised", "The XX", 201.0),
        ];
        let plays = vec![
            play("Intro", "The XX", 128.0, 0),
            play("Crystalised", "The XX", 201.5, 1),
        ];

        let exact = resolve_song_plays(&plays, &ExactSongIndex::new(songs.clone()));
        let scanned = resolve_song_plays(&plays, &PredicateScan::new(songs.clone(), exact_match));
        assert_eq!(exact, scanned);

        let loose = PredicateScan::new(songs, |event: &ActivityRecord, song: &SongDim| {
            event.song == song.title
                && matches!((event.length, song.duration), (Some(a), Some(b)) if (a - b).abs() < 1.0)
        });
        let facts = resolve_song_plays(&plays, &loose);
        assert_eq!(facts[1].song_id.as_deref(), Some("S2"));
    }
}
