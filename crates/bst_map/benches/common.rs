use std::hint::black_box;
use std::time::{Duration, Instant};

use bench::{apply_medium_runtime_config, apply_small_runtime_config};
use criterion::measurement::Measurement;
use criterion::{BenchmarkGroup, BenchmarkId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use bst_map::{AvlTreeMap, OrderedMap, RbTreeMap, Traversal};

const SIZES: [usize; 4] = [1_000, 10_000, 100_000, 400_000];
/// Fresh keys put, then removed again, per measured iteration.
const CHURN_BATCH: usize = 256;
const LOOKUPS_PER_ITER: usize = 512;
const LOOKUP_HIT_PERCENT: u32 = 50;
const MISSING_VALUE: u64 = u64::MAX;

/// Map of `size` entries with scattered keys; the key list comes back too.
fn populated<M>(size: usize, seed: u64) -> (M, Vec<u64>)
where
    M: OrderedMap<Key = u64, Value = u64>,
{
    let keys: Vec<u64> = (0..size as u64).map(|i| scatter(seed ^ i)).collect();
    let mut map = M::new();
    for &k in &keys {
        map.put(k, k.rotate_left(17));
    }
    (map, keys)
}

/// `put` a batch of absent keys, then `remove` all of them in random order.
/// The map is back at its starting size after every iteration.
pub fn bench_churn<M, T>(group: &mut BenchmarkGroup<'_, T>, label: &str)
where
    T: Measurement<Value = Duration>,
    M: OrderedMap<Key = u64, Value = u64>,
{
    for &size in &SIZES {
        apply_small_runtime_config(group);
        let seed = scatter(0xC4_0000 ^ size as u64);
        let (mut map, _) = populated::<M>(size, seed);

        group.bench_function(BenchmarkId::new(label, size), |bencher| {
            bencher.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for iter in 0..iters {
                    let mut rng = StdRng::seed_from_u64(seed ^ iter);
                    // Offsetting past `size` keeps the batch disjoint from
                    // the resident keys.
                    let first = size as u64 + iter * CHURN_BATCH as u64;
                    let mut batch: Vec<u64> = (first..first + CHURN_BATCH as u64)
                        .map(|i| scatter(seed ^ i))
                        .collect();
                    let start = Instant::now();
                    for &k in &batch {
                        map.put(k, k);
                    }
                    total += start.elapsed();

                    batch.shuffle(&mut rng);
                    let start = Instant::now();
                    for k in &batch {
                        black_box(map.remove(k));
                    }
                    total += start.elapsed();
                }
                debug_assert_eq!(map.len(), size);
                total
            })
        });
    }
}

/// `get_or_default` with a fixed share of hits on resident keys.
pub fn bench_lookup<M, T>(group: &mut BenchmarkGroup<'_, T>, label: &str)
where
    T: Measurement<Value = Duration>,
    M: OrderedMap<Key = u64, Value = u64>,
{
    for &size in &SIZES {
        apply_small_runtime_config(group);
        let seed = scatter(0x100C_0000 ^ size as u64);
        let (map, keys) = populated::<M>(size, seed);

        group.bench_function(BenchmarkId::new(label, size), |bencher| {
            bencher.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for iter in 0..iters {
                    let mut rng = StdRng::seed_from_u64(seed ^ iter);
                    let probes: Vec<u64> = (0..LOOKUPS_PER_ITER)
                        .map(|_| {
                            if rng.random_range(0..100) < LOOKUP_HIT_PERCENT {
                                keys[rng.random_range(0..keys.len())]
                            } else {
                                rng.random()
                            }
                        })
                        .collect();
                    let start = Instant::now();
                    for k in &probes {
                        black_box(map.get_or_default(k, MISSING_VALUE));
                    }
                    total += start.elapsed();
                }
                total
            })
        });
    }
}

/// `keys()` into a `BTreeSet` and `values()` into a `Vec`.
pub fn bench_collect<M, T>(group: &mut BenchmarkGroup<'_, T>, label: &str)
where
    T: Measurement<Value = Duration>,
    M: OrderedMap<Key = u64, Value = u64>,
{
    for &size in &SIZES {
        apply_medium_runtime_config(group);
        let (map, _) = populated::<M>(size, scatter(0xC011_0000 ^ size as u64));

        group.bench_function(BenchmarkId::new(format!("{label}/keys"), size), |bencher| {
            bencher.iter(|| black_box(map.keys()))
        });
        group.bench_function(BenchmarkId::new(format!("{label}/values"), size), |bencher| {
            bencher.iter(|| black_box(map.values()))
        });
    }
}

/// One full closure-driven walk per iteration, in each order.
pub fn bench_traverse<M, T>(group: &mut BenchmarkGroup<'_, T>, label: &str)
where
    T: Measurement<Value = Duration>,
    M: OrderedMap<Key = u64, Value = u64>,
{
    for &size in &SIZES {
        apply_medium_runtime_config(group);
        let (map, _) = populated::<M>(size, scatter(0x7A_0000 ^ size as u64));

        for order in [Traversal::Infix, Traversal::Prefix, Traversal::Postfix] {
            let id = BenchmarkId::new(format!("{label}/{order:?}"), size);
            group.bench_function(id, |bencher| {
                bencher.iter(|| {
                    let mut acc = 0_u64;
                    map.for_each(order, |k, v| acc = acc.wrapping_add(k ^ v));
                    black_box(acc)
                })
            });
        }
    }
}

/// splitmix64 finalizer.
fn scatter(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

macro_rules! for_both_engines {
    ($($all:ident => $bench:ident),* $(,)?) => {
        $(
            pub fn $all<T>(group: &mut BenchmarkGroup<'_, T>)
            where
                T: Measurement<Value = Duration>,
            {
                $bench::<AvlTreeMap<u64, u64>, _>(group, "avl");
                $bench::<RbTreeMap<u64, u64>, _>(group, "rb");
            }
        )*
    };
}

for_both_engines! {
    bench_all_churn => bench_churn,
    bench_all_lookup => bench_lookup,
    bench_all_collect => bench_collect,
    bench_all_traverse => bench_traverse,
}
