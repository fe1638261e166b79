use clap::Parser;
use kdam::BarExt;
use tracing_subscriber::EnvFilter;
use vecsearch::{
    DataDir,
    RedbStore,
    cli::{Cli, Command},
    config::{Config, Mode},
    embedding::build_embedder,
    error::{Error, Result},
    ingestion,
    search,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("VECSEARCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);
    let config = Config::from_cli(&cli)?;

    let data_dir = DataDir::resolve(&config.vec_path)?;
    let embedder = build_embedder(config.embedder, config.model.as_deref());
    let store = RedbStore::open(&data_dir.store_db(), embedder)?;

    match config.command {
        Mode::Index => cmd_index(&config, &store),
        Mode::Search => cmd_search(&config, &store),
    }
}

fn cmd_index(config: &Config, store: &RedbStore) -> Result<()> {
    let Some(path) = config.data_path.as_deref() else {
        return Err(Error::Config("index requires --datapath".into()));
    };
    let reader = std::io::BufReader::new(std::fs::File::open(path)?);

    let mut bar = kdam::tqdm!(desc = "Indexing", unit = " docs");
    let summary =
        ingestion::ingest_with_progress(reader, store, config.max_docs, |n| {
            bar.update(n).ok();
        })?;
    bar.refresh().ok();
    eprintln!();

    eprintln!(
        "Indexed {} documents in {} batches from {}",
        summary.documents,
        summary.batches,
        path.display()
    );
    Ok(())
}

fn cmd_search(config: &Config, store: &RedbStore) -> Result<()> {
    let Some(query) = config.query.as_deref() else {
        return Err(Error::Config("search requires --query".into()));
    };

    let results =
        search::search(store, query, config.max_docs, config.num_terms)?;

    if config.json {
        println!("{}", search::format_json(&results, query)?);
    } else {
        print!("{}", search::format_human(&results));
    }
    Ok(())
}
