//! Play order computation
//!
//! Implements sequential order, pure random (Fisher-Yates) shuffle and a
//! weighted shuffle that spreads tracks of the same artist apart.
//!
//! Every strategy maps a track list to a permutation of its indices. The
//! playlist never reorders the tracks themselves.

use crate::types::Track;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Artist key for tracks without an artist tag
const UNKNOWN_ARTIST: &str = "unknown";

/// Default half-width of the spacing search window
pub const DEFAULT_WINDOW: usize = 5;

/// Permutation mapping play position to track list index
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayOrder(Vec<usize>);

impl PlayOrder {
    /// Identity order `[0, 1, ..., len - 1]`
    pub fn sequential(len: usize) -> Self {
        Self((0..len).collect())
    }

    /// Track list index at a play position
    pub fn get(&self, position: usize) -> Option<usize> {
        self.0.get(position).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Check that every index `0..len` appears exactly once
    pub fn is_permutation(&self, len: usize) -> bool {
        if self.0.len() != len {
            return false;
        }

        let mut seen = vec![false; len];
        for &index in &self.0 {
            if index >= len || seen[index] {
                return false;
            }
            seen[index] = true;
        }
        true
    }
}

impl From<Vec<usize>> for PlayOrder {
    fn from(order: Vec<usize>) -> Self {
        Self(order)
    }
}

impl From<PlayOrder> for Vec<usize> {
    fn from(order: PlayOrder) -> Self {
        order.0
    }
}

/// Strategy producing a play order for a track list
///
/// Implementations must return a permutation of `0..tracks.len()`.
/// Plain closures `Fn(&[Track]) -> Vec<usize>` implement this trait, so
/// callers can plug in their own ordering.
pub trait ShuffleStrategy: Send + Sync {
    fn order(&self, tracks: &[Track]) -> Vec<usize>;
}

impl<F> ShuffleStrategy for F
where
    F: Fn(&[Track]) -> Vec<usize> + Send + Sync,
{
    fn order(&self, tracks: &[Track]) -> Vec<usize> {
        self(tracks)
    }
}

/// Identity order
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl ShuffleStrategy for Sequential {
    fn order(&self, tracks: &[Track]) -> Vec<usize> {
        (0..tracks.len()).collect()
    }
}

/// Pure random shuffle using Fisher-Yates
///
/// Each track has equal probability of appearing at any position.
/// Can result in the same artist playing consecutively.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformShuffle;

impl UniformShuffle {
    /// Shuffle with a caller-provided random source
    pub fn order_with<R: Rng + ?Sized>(tracks: &[Track], rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..tracks.len()).collect();
        order.shuffle(rng);
        order
    }
}

impl ShuffleStrategy for UniformShuffle {
    fn order(&self, tracks: &[Track]) -> Vec<usize> {
        Self::order_with(tracks, &mut thread_rng())
    }
}

/// Limit function: total distinct artists -> remaining-artist threshold
pub type LimitFn = Arc<dyn Fn(usize) -> f64 + Send + Sync>;

/// Weighted shuffle that spreads artists apart
///
/// Algorithm:
/// 1. Group tracks by artist (missing artist -> "unknown")
/// 2. Weighted random order within each artist (higher score -> earlier)
/// 3. Round-robin across artists, reshuffling artist order every round
/// 4. Once fewer artists remain than the limit, insert each track at the
///    position in a local window farthest from the same artist, with +-1 jitter
///
/// The larger the limit, the more tracks go through the spacing search and
/// the slower the shuffle.
#[derive(Clone)]
pub struct WeightedArtistShuffle {
    limit: LimitFn,
    window: usize,
}

impl fmt::Debug for WeightedArtistShuffle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightedArtistShuffle")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl Default for WeightedArtistShuffle {
    fn default() -> Self {
        Self {
            limit: Arc::new(|artists| artists as f64 * 2.0 / 3.0),
            window: DEFAULT_WINDOW,
        }
    }
}

impl WeightedArtistShuffle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the remaining-artist threshold (default: two thirds of all artists)
    #[must_use]
    pub fn with_limit(mut self, limit: impl Fn(usize) -> f64 + Send + Sync + 'static) -> Self {
        self.limit = Arc::new(limit);
        self
    }

    /// Replace the spacing window half-width (default: 5)
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Shuffle with a caller-provided random source
    pub fn order_with<R: Rng + ?Sized>(&self, tracks: &[Track], rng: &mut R) -> Vec<usize> {
        if tracks.is_empty() {
            return Vec::new();
        }

        // Group by artist, remembering each track's group for distance checks
        let mut lookup: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<(usize, f64)>> = Vec::new();
        let mut artist_of = Vec::with_capacity(tracks.len());

        for (index, track) in tracks.iter().enumerate() {
            let key = track.artist.as_deref().unwrap_or(UNKNOWN_ARTIST);
            let group = *lookup.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[group].push((index, track.weight()));
            artist_of.push(group);
        }

        let mut queues: Vec<VecDeque<usize>> = groups
            .into_iter()
            .map(|entries| weighted_order(entries, rng).into())
            .collect();

        let total_artists = queues.len();
        let window = self.window.min(total_artists);
        let limit = (self.limit)(total_artists);

        let mut artists: Vec<usize> = (0..total_artists).collect();
        let mut result = Vec::with_capacity(tracks.len());
        let mut step = 0usize;

        while !artists.is_empty() {
            let slot = step % artists.len();
            step += 1;

            // New round: avoid a fixed artist sequence between rounds
            if slot == 0 {
                artists.shuffle(rng);
            }

            let artist = artists[slot];
            if let Some(index) = queues[artist].pop_front() {
                if (artists.len() as f64) < limit {
                    let best = best_insertion(&result, &artist_of, artist, window);
                    let jitter: i64 = rng.gen_range(-1..=1);
                    let target = (best as i64 + jitter).clamp(0, result.len() as i64) as usize;
                    result.insert(target, index);
                } else {
                    result.push(index);
                }
            }

            if queues[artist].is_empty() {
                artists.remove(slot);
            }
        }

        result
    }
}

impl ShuffleStrategy for WeightedArtistShuffle {
    fn order(&self, tracks: &[Track]) -> Vec<usize> {
        self.order_with(tracks, &mut thread_rng())
    }
}

/// Weighted sampling without replacement (Efraimidis-Spirakis keys)
fn weighted_order<R: Rng + ?Sized>(entries: Vec<(usize, f64)>, rng: &mut R) -> Vec<usize> {
    let mut keyed: Vec<(f64, usize)> = entries
        .into_iter()
        .map(|(index, weight)| {
            let u: f64 = rng.gen();
            (u.powf(1.0 / weight), index)
        })
        .collect();

    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    keyed.into_iter().map(|(_, index)| index).collect()
}

/// Insertion point near the tail maximizing distance to the same artist
///
/// Distances are measured as they will be after the insertion, so placed
/// entries at or after the candidate count one further away.
fn best_insertion(result: &[usize], artist_of: &[usize], artist: usize, window: usize) -> usize {
    let len = result.len();
    let mut best = len;
    let mut best_distance: Option<usize> = None;

    for candidate in len.saturating_sub(window)..=len {
        let lo = candidate.saturating_sub(window);
        let hi = (candidate + window).min(len);

        let nearest = (lo..hi)
            .filter(|&j| artist_of[result[j]] == artist)
            .map(|j| {
                if j < candidate {
                    candidate - j
                } else {
                    j + 1 - candidate
                }
            })
            .min()
            .unwrap_or(window + 1);

        if best_distance.map_or(true, |d| nearest > d) {
            best_distance = Some(nearest);
            best = candidate;
        }
    }

    best
}
