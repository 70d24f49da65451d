//! Seeded workload driver: runs a random mix of insert/find/erase against
//! `RbTree` and `std::collections::BTreeMap`, checks they agree, and reports
//! timings.
//!
//! Environment:
//! - `RB_TREE_OPS`   number of operations (default 200000)
//! - `RB_TREE_KEYS`  key range (default 50000)
//! - `RB_TREE_SEED`  rng seed (default 1)
//! - `RUST_LOG`      log level, e.g. `info` or `debug`

use std::collections::BTreeMap;
use std::process;
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rb_tree::{RbTree, TreeError};

struct Config {
    ops: usize,
    keys: u32,
    seed: u64,
}

fn env_or<T: FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring unparsable {}={:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    fn from_env() -> Self {
        Config {
            ops: env_or("RB_TREE_OPS", 200_000),
            keys: env_or::<u32>("RB_TREE_KEYS", 50_000).max(1),
            seed: env_or("RB_TREE_SEED", 1),
        }
    }
}

#[derive(Clone, Copy)]
enum Op {
    Insert(u32),
    Erase(u32),
    Find(u32),
}

fn workload(config: &Config) -> Vec<Op> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    (0..config.ops)
        .map(|_| {
            let key = rng.gen_range(0..config.keys);
            match rng.gen_range(0..10u8) {
                0..=4 => Op::Insert(key),
                5..=7 => Op::Erase(key),
                _ => Op::Find(key),
            }
        })
        .collect()
}

fn run_rb_tree(ops: &[Op]) -> (RbTree<u32>, usize, Duration) {
    let start = Instant::now();
    let mut tree = RbTree::new();
    let mut hits = 0;
    for op in ops {
        match *op {
            Op::Insert(key) => {
                tree.insert(key, false);
            }
            Op::Erase(key) => {
                let pos = tree.find(&key).position();
                tree.erase(pos);
            }
            Op::Find(key) => {
                if !tree.find(&key).is_end() {
                    hits += 1;
                }
            }
        }
    }
    (tree, hits, start.elapsed())
}

// Multiset reference: key -> occurrences.
fn run_std(ops: &[Op]) -> (BTreeMap<u32, usize>, usize, Duration) {
    let start = Instant::now();
    let mut map = BTreeMap::new();
    let mut hits = 0;
    for op in ops {
        match *op {
            Op::Insert(key) => *map.entry(key).or_insert(0) += 1,
            Op::Erase(key) => {
                if let Some(n) = map.get_mut(&key) {
                    *n -= 1;
                    if *n == 0 {
                        map.remove(&key);
                    }
                }
            }
            Op::Find(key) => {
                if map.contains_key(&key) {
                    hits += 1;
                }
            }
        }
    }
    (map, hits, start.elapsed())
}

#[cfg(any(debug_assertions, feature = "verify"))]
fn verify(tree: &RbTree<u32>) -> Result<(), TreeError> {
    tree.verify_bst().map(|_| ())
}

#[cfg(not(any(debug_assertions, feature = "verify")))]
fn verify(_tree: &RbTree<u32>) -> Result<(), TreeError> {
    Ok(())
}

fn main() {
    env_logger::init();
    let config = Config::from_env();
    info!(
        "running {} ops over {} keys with seed {}",
        config.ops, config.keys, config.seed
    );

    let ops = workload(&config);
    let (tree, tree_hits, tree_time) = run_rb_tree(&ops);
    let (map, std_hits, std_time) = run_std(&ops);

    let expected: Vec<u32> = map
        .iter()
        .flat_map(|(&k, &n)| std::iter::repeat(k).take(n))
        .collect();
    let ours: Vec<u32> = tree.iter().copied().collect();
    if ours != expected || tree_hits != std_hits {
        error!(
            "mismatch: len {} vs {}, hits {} vs {}",
            ours.len(),
            expected.len(),
            tree_hits,
            std_hits
        );
        process::exit(1);
    }
    if let Err(e) = verify(&tree) {
        error!("{}", e);
        process::exit(1);
    }

    info!("final size {}, {} lookups hit", tree.len(), tree_hits);
    println!("Our RbTree:    {:?}", tree_time);
    println!("Std BTreeMap:  {:?}", std_time);
}
