//! MBP-10 reconstructor.
//!
//! Replays an MBO event file through the order book and writes the MBP-10
//! snapshot stream to stdout. Diagnostics go to stderr so the output stays
//! pure CSV.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use mbp_core::{ActionEngine, OrderBook, SnapshotDiffer};
use mbp_csv::{CsvError, MboReader, SnapshotWriter};
use mbp_metrics::{LatencyHistogram, ReplayTimer};

const PROGRESS_INTERVAL: u64 = 100_000;

struct Config {
    input: PathBuf,
    debug: bool,
    max_events: u64,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Config, String> {
    let mut input: Option<PathBuf> = None;
    let mut debug = false;
    let mut max_events = u64::MAX;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--debug" => debug = true,
            "--max-events" => {
                let value = args.next().ok_or("--max-events requires a value")?;
                max_events = value
                    .parse()
                    .map_err(|_| format!("invalid --max-events value: {value}"))?;
            }
            _ => input = Some(PathBuf::from(arg)),
        }
    }

    let input = input.ok_or("no input file specified")?;
    Ok(Config {
        input,
        debug,
        max_events,
    })
}

fn print_usage() {
    eprintln!("Usage: mbp-reconstruct <input_mbo_file.csv>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --debug           Per-event trace on stderr");
    eprintln!("  --max-events N    Process only the first N events");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  mbp-reconstruct data/mbo.csv > output/mbp.csv");
}

fn main() -> ExitCode {
    let cfg = match parse_args(std::env::args().skip(1)) {
        Ok(cfg) => cfg,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let default_filter = if cfg.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .compact()
        .init();

    match run(&cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("reconstruction failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cfg: &Config) -> Result<(), CsvError> {
    info!(input = %cfg.input.display(), "starting MBP-10 reconstruction");

    let mut reader = MboReader::open(&cfg.input)?;
    let stdout = io::stdout();
    let mut writer = SnapshotWriter::new(BufWriter::new(stdout.lock()));
    writer.write_header()?;

    let mut book = OrderBook::new();
    let mut engine = ActionEngine::new();
    let mut differ = SnapshotDiffer::new();

    let timer = ReplayTimer::start();
    let mut latency = LatencyHistogram::new();
    let mut events: u64 = 0;

    while events < cfg.max_events {
        let Some(event) = reader.next_event() else {
            break;
        };
        events += 1;

        let t0 = timer.now_raw();
        if engine.process_event(&mut book, &event) {
            if let Some(snapshot) = differ.observe(&mut book, event.timestamp_ns) {
                writer.write_snapshot(snapshot)?;
            }
        }
        latency.record(timer.delta_ns(t0));

        if cfg.debug {
            debug!(
                action = %char::from(event.action.code()),
                side = ?event.side,
                price = event.price.as_raw(),
                size = event.size,
                order_id = event.order_id,
                "event"
            );
        }
        if events % PROGRESS_INTERVAL == 0 {
            info!(events, "processed");
        }
    }

    writer.flush()?;
    report(&reader, &writer, &book, &engine, &differ, &latency, &timer, events);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn report<W: Write>(
    reader: &MboReader,
    writer: &SnapshotWriter<W>,
    book: &OrderBook,
    engine: &ActionEngine,
    differ: &SnapshotDiffer,
    latency: &LatencyHistogram,
    timer: &ReplayTimer,
    events: u64,
) {
    let elapsed = timer.elapsed_secs();
    let rate = if elapsed > 0.0 {
        events as f64 / elapsed
    } else {
        0.0
    };

    info!(
        events,
        snapshots = writer.rows_written(),
        lines_skipped = reader.stats().lines_skipped,
        "replay complete in {:.3}s ({:.0} events/s)",
        elapsed,
        rate
    );
    info!(
        generated = differ.generated(),
        skipped = differ.skipped(),
        "snapshot compression {:.2}%",
        differ.compression_ratio() * 100.0
    );
    info!(
        active_orders = book.active_orders(),
        price_levels = book.price_levels(),
        orders_processed = book.orders_processed(),
        levels_created = book.levels_created(),
        "book state"
    );
    info!(
        pool_active = book.pool().active(),
        pool_capacity = book.pool().capacity(),
        pool_overflow = book.pool().overflow_allocs(),
        "pool usage"
    );

    let counters = engine.counters();
    info!(
        actions = engine.actions_processed(),
        trades_aggregated = engine.trades_aggregated(),
        errors = engine.errors_encountered(),
        adds = counters.adds,
        modifies = counters.modifies,
        cancels = counters.cancels,
        trades = counters.trades,
        fills = counters.fills,
        resets = counters.resets,
        noops = counters.noops,
        "action statistics"
    );
    info!("event latency: {}", latency.summary());
}
