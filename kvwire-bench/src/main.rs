//! # Client Benchmark Harness
//!
//! Purpose: Replay a repeatable GET/SET workload through the client against
//! one server, a cluster or a replication set, and report throughput.
//!
//! ## Design Principles
//! 1. **Deterministic Workload**: Use a fixed PRNG seed for stable comparisons.
//! 2. **Allocation Control**: Pre-build keys/values to keep setup costs off the hot path.
//! 3. **Topology Agnostic**: The same loop runs over any `Topology`.
//!
//! Usage: `kvwire-bench [uri[,uri...]] [keys] [ops] [value_size] [replication]`

use std::env;
use std::hint::black_box;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::info;

use kvwire_client::{Client, ClientOptions, ConnectionParameters};

const DEFAULT_URI: &str = "tcp://127.0.0.1:6379";
const DEFAULT_KEY_COUNT: usize = 1 << 12;
const DEFAULT_OP_COUNT: usize = 100_000;
const DEFAULT_VALUE_SIZE: usize = 128;

struct BenchConfig {
    nodes: Vec<ConnectionParameters>,
    key_count: usize,
    op_count: usize,
    value_size: usize,
    replication: bool,
}

impl BenchConfig {
    fn from_args() -> Result<Self> {
        let mut args = env::args().skip(1);
        let uris = args.next().unwrap_or_else(|| DEFAULT_URI.to_string());
        let nodes = uris
            .split(',')
            .filter(|uri| !uri.is_empty())
            .map(|uri| uri.parse::<ConnectionParameters>().with_context(|| format!("parsing {uri}")))
            .collect::<Result<Vec<_>>>()?;
        if nodes.is_empty() {
            bail!("at least one server URI is required");
        }

        Ok(BenchConfig {
            nodes,
            key_count: parse_usize(args.next(), DEFAULT_KEY_COUNT).max(1),
            op_count: parse_usize(args.next(), DEFAULT_OP_COUNT),
            value_size: parse_usize(args.next(), DEFAULT_VALUE_SIZE),
            replication: args.next().is_some_and(|flag| flag == "replication"),
        })
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

/// Tiny deterministic PRNG so runs replay the same key sequence.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    let ops_per_sec = (ops as f64) / secs;
    let micros_per_op = (secs * 1e6) / (ops.max(1) as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {micros_per_op:.1} us/op)");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "kvwire=info".into()),
        )
        .init();

    let config = BenchConfig::from_args()?;
    let options = ClientOptions {
        replication: config.replication,
        ..Default::default()
    };
    let mut client = Client::with_options(config.nodes.clone(), options).context("building client")?;
    client.connect().context("connecting")?;
    info!(
        nodes = config.nodes.len(),
        keys = config.key_count,
        ops = config.op_count,
        value_size = config.value_size,
        "starting workload"
    );

    let keys: Vec<String> = (0..config.key_count).map(|idx| format!("bench:{idx:08}")).collect();
    let value = vec![b'x'; config.value_size];

    let start = Instant::now();
    for key in &keys {
        client.set(key, &value)?;
    }
    report("SET (load)", keys.len(), start.elapsed());

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let key = &keys[rng.next_index(keys.len())];
        black_box(client.get(key)?);
    }
    report("GET", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let key = &keys[rng.next_index(keys.len())];
        client.set(key, &value)?;
    }
    report("SET", config.op_count, start.elapsed());

    client.disconnect();
    Ok(())
}
