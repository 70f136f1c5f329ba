//! Target selection for a dispatched item
//!
//! Pure functions over the registry contents; the caller holds the registry
//! lock and performs delivery.

use contracts::FanoutStrategy;
use rand::Rng;

use crate::consumer::ConsumerEntry;

/// Consumers chosen for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    /// Nothing registered, the item is dropped
    Empty,
    /// Index into the registry
    One(usize),
    /// Every registered consumer
    All,
}

/// Apply `strategy` to the current registry contents.
pub(crate) fn select<T, R>(
    strategy: FanoutStrategy,
    entries: &[ConsumerEntry<T>],
    rng: &mut R,
) -> Selection
where
    R: Rng + ?Sized,
{
    if entries.is_empty() {
        return Selection::Empty;
    }

    match strategy {
        FanoutStrategy::All => Selection::All,
        FanoutStrategy::Single => Selection::One(rng.random_range(0..entries.len())),
        FanoutStrategy::Lru => lru_index(entries).map_or(Selection::Empty, Selection::One),
    }
}

/// Index of the least-recently-used entry.
///
/// Linear scan on every call; ties go to the earliest registry position.
pub(crate) fn lru_index<T>(entries: &[ConsumerEntry<T>]) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .min_by_key(|(_, entry)| entry.last_used())
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::{pair, Consumer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    fn entries(n: usize) -> (Vec<ConsumerEntry<u32>>, Vec<Consumer<u32>>) {
        let scope = CancellationToken::new();
        (0..n).map(|_| pair::<u32>(8, &scope)).unzip()
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        for strategy in FanoutStrategy::ALL {
            assert_eq!(
                select::<u32, _>(strategy, &[], &mut rng),
                Selection::Empty
            );
        }
    }

    #[test]
    fn test_all_selects_everyone() {
        let (entries, _consumers) = entries(3);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            select(FanoutStrategy::All, &entries, &mut rng),
            Selection::All
        );
    }

    #[test]
    fn test_single_stays_in_bounds_and_covers_all() {
        let (entries, _consumers) = entries(4);
        let mut rng = StdRng::seed_from_u64(42);
        let mut hits = [0usize; 4];

        for _ in 0..4000 {
            match select(FanoutStrategy::Single, &entries, &mut rng) {
                Selection::One(idx) => hits[idx] += 1,
                other => panic!("unexpected selection {other:?}"),
            }
        }

        // Uniform pick: each slot near 1000
        for count in hits {
            assert!((800..1200).contains(&count), "skewed pick: {hits:?}");
        }
    }

    #[test]
    fn test_lru_picks_oldest() {
        let (mut entries, _consumers) = entries(3);
        let base = Instant::now();
        entries[0].set_last_used(base + Duration::from_millis(30));
        entries[1].set_last_used(base + Duration::from_millis(10));
        entries[2].set_last_used(base + Duration::from_millis(20));

        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            select(FanoutStrategy::Lru, &entries, &mut rng),
            Selection::One(1)
        );
    }

    #[test]
    fn test_lru_ties_go_to_registry_order() {
        let (mut entries, _consumers) = entries(3);
        let base = Instant::now();
        entries[0].set_last_used(base + Duration::from_millis(5));
        entries[1].set_last_used(base);
        entries[2].set_last_used(base);

        assert_eq!(lru_index(&entries), Some(1));
    }

    #[test]
    fn test_lru_rotates_with_deliveries() {
        let (mut entries, _consumers) = entries(3);
        let base = Instant::now();
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.set_last_used(base + Duration::from_millis(i as u64));
        }

        let mut order = Vec::new();
        for round in 0..6u64 {
            let idx = lru_index(&entries).unwrap();
            order.push(idx);
            entries[idx].set_last_used(base + Duration::from_secs(1 + round));
        }

        assert_eq!(order, vec![0, 1, 2, 0, 1, 2]);
    }
}
