use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tickdb::TickDb;
use tickdb::manager::{self, RandomWalk};
use tickdb::model::{DEFAULT_CAPACITY, DEFAULT_SYMBOLS, DEFAULT_TICK_SECS};
use tickdb::server::TickServer;
use tracing::{error, info};

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Comma-separated symbols to track
    #[clap(long, value_delimiter = ',', default_values_t = DEFAULT_SYMBOLS.map(String::from))]
    symbols: Vec<String>,

    /// Samples retained per symbol
    #[clap(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Seconds between ingestion ticks
    #[clap(long, default_value_t = DEFAULT_TICK_SECS)]
    tick_secs: u64,

    /// Seed for the mock price generator
    #[clap(long)]
    seed: Option<u64>,
}

impl Args {
    fn normalized_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for s in &self.symbols {
            let s = s.trim().to_uppercase();
            if !s.is_empty() && !out.contains(&s) {
                out.push(s);
            }
        }
        out
    }
}

fn main() {
    let args = Args::parse();

    let worker_threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

    tokio::runtime::Builder::new_multi_thread()
    .worker_threads(worker_threads)
    .enable_all()
    .build()
    .expect("Failed to build tokio runtime")
    .block_on(async_main(args));
}

async fn async_main(args: Args) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,tickdb=info");
    }
    tracing_subscriber::fmt()
    .with_target(false)
    .with_level(true)
    .init();

    let symbols = args.normalized_symbols();
    if symbols.is_empty() {
        error!("At least one symbol is required (--symbols).");
        std::process::exit(2);
    }
    if args.capacity == 0 || args.tick_secs == 0 {
        error!("--capacity and --tick-secs must both be at least 1.");
        std::process::exit(2);
    }
    let addr: SocketAddr = match args.addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid --addr '{}': {}", args.addr, e);
            std::process::exit(2);
        }
    };

    info!("--- TickDB ---");
    info!("Symbols:  {}", symbols.join(", "));
    info!("Capacity: {} samples/symbol", args.capacity);
    info!("Tick:     every {}s", args.tick_secs);

    let db = Arc::new(TickDb::new(symbols, args.capacity));

    let source = match args.seed {
        Some(seed) => RandomWalk::seeded(seed),
        None => RandomWalk::new(),
    };
    manager::start_ingest_thread(db.clone(), source, Duration::from_secs(args.tick_secs));

    let db_clone = db.clone();
    tokio::spawn(async move {
        let server = TickServer::new(db_clone);
        server.run(addr).await;
    });

    info!("Node is Ready.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down.");
}
