use seqimport::bio::{Nucleic, NucleicCounts};
use seqimport::processing::NucleicCounter;
use seqimport::utils::parallel::WorkerPool;
use std::sync::Arc;

fn tally(buffers: &[Vec<u8>]) -> NucleicCounts {
    let mut counts = NucleicCounts::new();
    for b in buffers.iter().flatten() {
        *counts.entry(Nucleic::from_internal(*b)).or_insert(0) += 1;
    }
    counts
}

/// Deterministic buffer with an uneven symbol distribution
fn skewed(len: usize, seed: usize) -> Vec<u8> {
    const ALPHABET: &[u8] = b"AAAACCGTTNRY";
    (0..len)
        .map(|i| ALPHABET[(i * 7 + seed) % ALPHABET.len()])
        .collect()
}

#[test]
fn test_counter_matches_manual_tally_across_threshold() {
    let pool = WorkerPool::new(4).unwrap();
    let counter = NucleicCounter::new(pool);

    // Sizes on both sides of the small buffer threshold
    let buffers: Vec<Vec<u8>> = [1, 50, 199, 200, 201, 1_000, 25_000]
        .iter()
        .enumerate()
        .map(|(seed, &len)| skewed(len, seed))
        .collect();

    for buffer in &buffers {
        counter.submit(Arc::from(buffer.clone()));
    }
    assert_eq!(counter.drain().unwrap(), tally(&buffers));
    assert_eq!(counter.pending(), 0);
}

#[test]
fn test_counter_used_from_inside_the_pool() {
    let pool = WorkerPool::new(2).unwrap();
    let inner = pool.clone();

    let counts = pool.install(move || {
        let counter = NucleicCounter::new(inner);
        for seed in 0..64 {
            counter.submit(Arc::from(skewed(300, seed)));
        }
        counter.drain()
    });

    let total: u64 = counts.unwrap().values().sum();
    assert_eq!(total, 64 * 300);
}
