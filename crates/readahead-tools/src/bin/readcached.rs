use clap::Parser;
use readahead_cache::{ReadAhead, ReadFunction};
use readahead_tools::common::{CacheArgs, TcpConnectionArgs, build_client, init_tracing, print_ranges};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "readcached",
    about = "Read ranges once through the read-ahead cache"
)]
struct Args {
    #[command(flatten)]
    conn: TcpConnectionArgs,
    #[command(flatten)]
    cache: CacheArgs,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let client = build_client(&args.conn)?;
    let function = ReadFunction::from(args.cache.function);

    let mut cache = ReadAhead::new(client.unit(args.conn.unit_id), args.cache.readahead);
    print_ranges(&mut cache, function, &args.cache.ranges)?;

    let metrics = cache.metrics_snapshot();
    info!(
        hits = metrics.hits,
        misses = metrics.misses,
        windows = metrics.windows,
        "cache summary"
    );
    println!(
        "{} range(s), {} window fetch(es), {} request(s)",
        args.cache.ranges.len(),
        metrics.misses,
        client.metrics_snapshot().requests_total
    );
    Ok(())
}
