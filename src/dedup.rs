//! Remoção de linhas duplicadas por igualdade de todas as colunas.
//!
//! A igualdade é avaliada sobre a linha inteira, não sobre a chave: duas
//! linhas com a mesma chave e atributos diferentes sobrevivem ambas. As
//! colisões de chave são apenas reportadas via [`duplicate_keys`].

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::records::{ArtistDim, SongDim, TimeDim, UserDim};

/// Identidade de uma linha para fins de deduplicação.
pub trait RowIdentity {
    type Identity: Hash + Eq;

    fn identity(&self) -> Self::Identity;
}

/// Mantém a primeira ocorrência de cada linha, preservando a ordem de entrada.
pub fn drop_duplicates<T, I>(rows: I) -> Vec<T>
where
    T: RowIdentity,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.identity()))
        .collect()
}

/// Chaves que aparecem em mais de uma linha, na ordem da primeira ocorrência.
pub fn duplicate_keys<T, K, F>(rows: &[T], key: F) -> Vec<K>
where
    K: Hash + Eq + Clone,
    F: Fn(&T) -> Option<K>,
{
    let mut counts: HashMap<K, usize> = HashMap::new();
    let mut order = Vec::new();

    for k in rows.iter().filter_map(&key) {
        let count = counts.entry(k.clone()).or_insert(0);
        if *count == 0 {
            order.push(k);
        }
        *count += 1;
    }

    order.into_iter().filter(|k| counts[k] > 1).collect()
}

/// Bits de um `f64` com `-0.0` e NaN normalizados, para comparação por valor.
pub fn float_identity(value: Option<f64>) -> Option<u64> {
    value.map(|v| {
        if v.is_nan() {
            f64::NAN.to_bits()
        } else if v == 0.0 {
            0.0f64.to_bits()
        } else {
            v.to_bits()
        }
    })
}

impl RowIdentity for SongDim {
    type Identity = (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<i64>,
        Option<u64>,
    );

    fn identity(&self) -> Self::Identity {
        (
            self.song_id.clone(),
            self.title.clone(),
            self.artist_id.clone(),
            self.artist_name.clone(),
            self.year,
            float_identity(self.duration),
        )
    }
}

impl RowIdentity for ArtistDim {
    type Identity = (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<u64>,
        Option<u64>,
    );

    fn identity(&self) -> Self::Identity {
        (
            self.artist_id.clone(),
            self.name.clone(),
            self.location.clone(),
            float_identity(self.latitude),
            float_identity(self.longitude),
        )
    }
}

impl RowIdentity for UserDim {
    type Identity = UserDim;

    fn identity(&self) -> Self::Identity {
        self.clone()
    }
}

impl RowIdentity for TimeDim {
    type Identity = TimeDim;

    fn identity(&self) -> Self::Identity {
        *self
    }
}
