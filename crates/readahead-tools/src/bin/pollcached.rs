use clap::Parser;
use readahead_cache::{ReadAhead, ReadFunction};
use readahead_tools::common::{CacheArgs, TcpConnectionArgs, build_client, init_tracing, print_ranges};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "pollcached",
    about = "Poll ranges through the read-ahead cache, refreshing it every cycle"
)]
struct Args {
    #[command(flatten)]
    conn: TcpConnectionArgs,
    #[command(flatten)]
    cache: CacheArgs,
    /// Milliseconds between the start of two cycles.
    #[arg(long, default_value_t = 1000)]
    interval: u64,
    /// Stop after this many cycles; runs forever when omitted.
    #[arg(long)]
    cycles: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let client = build_client(&args.conn)?;
    let function = ReadFunction::from(args.cache.function);
    let interval = Duration::from_millis(args.interval);

    let mut cache = ReadAhead::new(client.unit(args.conn.unit_id), args.cache.readahead);
    let mut previous = cache.metrics_snapshot();
    let mut cycle = 0u64;
    while args.cycles.is_none_or(|limit| cycle < limit) {
        let started = Instant::now();
        cycle += 1;
        cache.clear();

        println!("cycle {cycle}");
        if let Err(err) = print_ranges(&mut cache, function, &args.cache.ranges) {
            warn!(cycle, error = %err, "poll cycle failed");
        }
        let totals = cache.metrics_snapshot();
        let delta = totals.since(&previous);
        previous = totals;
        info!(
            cycle,
            hits = delta.hits,
            misses = delta.misses,
            fetch_errors = delta.fetch_errors,
            windows = delta.windows,
            hits_total = totals.hits,
            misses_total = totals.misses,
            "poll cycle done"
        );

        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    Ok(())
}
