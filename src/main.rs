use carquery::config::Settings;
use carquery::executor::{
    run_in_process, run_participant, CoordinatorInput, FlushMode, SequentialExecutor,
    SharedEmitter, SharedMemoryExecutor, TimingSummary,
};
use carquery::network::{CoordinatorListener, TcpCommunicator};
use carquery::storage::{load_database, RecordStore};
use carquery::types::{Query, QueryError};
use carquery::parser::load_queries;
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Car inventory query engine
#[derive(Parser, Debug)]
#[command(name = "carquery")]
#[command(about = "Run SELECT/WHERE queries over a car inventory", long_about = None)]
struct Cli {
    /// Config file (default: ./carquery.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Inputs {
    /// Database file
    database: Option<PathBuf>,
    /// Query file
    queries: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Single-threaded, output in ascending ID order
    Sequential {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Thread pool over a snapshot of the store
    Shared {
        #[command(flatten)]
        inputs: Inputs,
        /// Worker threads
        threads: Option<usize>,
        /// Records claimed per work item
        #[arg(long)]
        chunk_rows: Option<usize>,
    },
    /// Partitioned run with every participant in this process
    Distributed {
        #[command(flatten)]
        inputs: Inputs,
        /// Number of participants
        #[arg(short = 'n', long)]
        ranks: Option<usize>,
        #[arg(long, value_enum)]
        flush: Option<FlushMode>,
        /// Per-message bound for transfers
        #[arg(long)]
        max_chunk_bytes: Option<usize>,
    },
    /// Rank 0 of a TCP run; loads the files and serves the workers
    Coordinator {
        #[command(flatten)]
        inputs: Inputs,
        /// Address to listen on
        #[arg(long)]
        listen: String,
        /// Total participants including the coordinator
        #[arg(long)]
        world_size: usize,
        #[arg(long, value_enum)]
        flush: Option<FlushMode>,
        #[arg(long)]
        max_chunk_bytes: Option<usize>,
    },
    /// Non-coordinating participant of a TCP run
    Worker {
        /// Coordinator address
        #[arg(long)]
        connect: String,
        #[arg(long)]
        rank: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Every strategy's timing summary counts from process entry
    let started = Instant::now();
    init_tracing();
    let cli = Cli::parse();

    match run(cli, started).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, started: Instant) -> Result<(), QueryError> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Sequential { inputs } => {
            inputs.apply(&mut settings);
            run_sequential(&settings, started)
        }
        Command::Shared {
            inputs,
            threads,
            chunk_rows,
        } => {
            inputs.apply(&mut settings);
            settings.threads = threads.unwrap_or(settings.threads);
            settings.chunk_rows = chunk_rows.unwrap_or(settings.chunk_rows);
            run_shared(&settings.normalized(), started)
        }
        Command::Distributed {
            inputs,
            ranks,
            flush,
            max_chunk_bytes,
        } => {
            inputs.apply(&mut settings);
            settings.ranks = ranks.unwrap_or(settings.ranks);
            settings.flush = flush.or(settings.flush);
            settings.max_chunk_bytes = max_chunk_bytes.unwrap_or(settings.max_chunk_bytes);
            run_distributed(&settings.normalized(), started).await
        }
        Command::Coordinator {
            inputs,
            listen,
            world_size,
            flush,
            max_chunk_bytes,
        } => {
            inputs.apply(&mut settings);
            settings.flush = flush.or(settings.flush);
            settings.max_chunk_bytes = max_chunk_bytes.unwrap_or(settings.max_chunk_bytes);
            run_coordinator(&settings, &listen, world_size, started).await
        }
        Command::Worker { connect, rank } => run_worker(&connect, rank).await,
    }
}

impl Inputs {
    fn apply(self, settings: &mut Settings) {
        if let Some(database) = self.database {
            settings.database = database;
        }
        if let Some(queries) = self.queries {
            settings.queries = queries;
        }
    }
}

fn load_inputs(database: &Path, queries: &Path) -> Result<(RecordStore, Vec<Query>), QueryError> {
    let store = load_database(database)?;
    let queries = load_queries(queries)?;
    Ok((store, queries))
}

fn stdout_emitter() -> SharedEmitter<BufWriter<io::Stdout>> {
    SharedEmitter::new(BufWriter::new(io::stdout()))
}

fn run_sequential(settings: &Settings, started: Instant) -> Result<(), QueryError> {
    let (store, queries) = load_inputs(&settings.database, &settings.queries)?;

    let mut out = BufWriter::new(io::stdout().lock());
    let stats = SequentialExecutor::run(&store, &queries, &mut out)?;
    info!("{} queries produced {} rows", stats.queries, stats.matches);

    let summary = TimingSummary::Sequential {
        elapsed: started.elapsed(),
    };
    write!(out, "{summary}")?;
    out.flush()?;
    Ok(())
}

fn run_shared(settings: &Settings, started: Instant) -> Result<(), QueryError> {
    let (store, queries) = load_inputs(&settings.database, &settings.queries)?;
    let executor = SharedMemoryExecutor::new(settings.threads, settings.chunk_rows)?;
    let emitter = stdout_emitter();

    let stats = executor.run(&store, &queries, &emitter)?;
    let elapsed = started.elapsed();
    info!(
        "{} queries produced {} rows ({} skipped)",
        stats.queries, stats.matches, stats.skipped
    );

    let summary = TimingSummary::SharedMemory {
        threads: executor.threads(),
        elapsed,
    };
    emitter.emit(summary.to_string().as_bytes())?;
    emitter.flush()?;
    Ok(())
}

async fn run_distributed(settings: &Settings, started: Instant) -> Result<(), QueryError> {
    let (store, queries) = load_inputs(&settings.database, &settings.queries)?;
    let input = CoordinatorInput {
        records: store.snapshot()?,
        queries,
        flush: settings.flush.unwrap_or(FlushMode::RankOrdered),
    };
    drop(store);

    let emitter = Arc::new(stdout_emitter());
    let report = run_in_process(
        input,
        settings.ranks,
        settings.max_chunk_bytes,
        Arc::clone(&emitter),
    )
    .await?;

    let summary = TimingSummary::Distributed {
        participants: report.participants,
        elapsed: started.elapsed(),
    };
    emitter.emit(summary.to_string().as_bytes())?;
    emitter.flush()?;
    Ok(())
}

async fn run_coordinator(
    settings: &Settings,
    listen: &str,
    world_size: usize,
    started: Instant,
) -> Result<(), QueryError> {
    let listener = CoordinatorListener::bind(listen).await?;
    let mut comm = listener.accept(world_size, settings.max_chunk_bytes).await?;

    // Workers are already waiting, so a load failure must still reach them
    let (input, load_error) = match load_inputs(&settings.database, &settings.queries)
        .and_then(|(store, queries)| Ok((store.snapshot()?, queries)))
    {
        Ok((records, queries)) => (
            Some(CoordinatorInput {
                records,
                queries,
                flush: settings.flush.unwrap_or(FlushMode::Gather),
            }),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    let emitter = stdout_emitter();
    let outcome = run_participant(&mut comm, input, &emitter).await;
    if let Some(e) = load_error {
        return Err(e);
    }
    let report = outcome?;

    let summary = TimingSummary::Distributed {
        participants: report.participants,
        elapsed: started.elapsed(),
    };
    emitter.emit(summary.to_string().as_bytes())?;
    emitter.flush()?;
    Ok(())
}

async fn run_worker(connect: &str, rank: usize) -> Result<(), QueryError> {
    let mut comm = TcpCommunicator::connect(connect, rank).await?;
    let emitter = stdout_emitter();
    let report = run_participant(&mut comm, None, &emitter).await?;
    emitter.flush()?;
    info!(
        "rank {} finished: {} records, {} matches over {} queries",
        report.rank, report.local_records, report.matches, report.queries
    );
    Ok(())
}
