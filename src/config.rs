use std::path::PathBuf;

use crate::{
    cli::{Cli, Command},
    embedding::EmbedderKind,
    error::{Error, Result},
};

/// What a run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Index,
    Search,
}

/// Resolved, immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub command: Mode,
    pub vec_path: PathBuf,
    /// Source file; always set for [`Mode::Index`].
    pub data_path: Option<PathBuf>,
    /// Query text; always set for [`Mode::Search`].
    pub query: Option<String>,
    pub num_terms: usize,
    pub max_docs: usize,
    pub embedder: EmbedderKind,
    pub model: Option<String>,
    pub json: bool,
}

/// Default number of relevant terms shown per result.
pub const DEFAULT_NUM_TERMS: usize = 5;

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let (command, vec_path, data_path, query, num_terms, max_docs, json) =
            match &cli.command {
                Command::Index(args) => (
                    Mode::Index,
                    args.vecpath.clone(),
                    Some(args.datapath.clone()),
                    None,
                    DEFAULT_NUM_TERMS,
                    args.maxdocs,
                    false,
                ),
                Command::Search(args) => (
                    Mode::Search,
                    args.vecpath.clone(),
                    None,
                    Some(args.query.clone()),
                    args.numterms,
                    args.maxdocs,
                    args.json,
                ),
                Command::Completions(_) => {
                    return Err(Error::Config(
                        "completions do not take a run configuration".into(),
                    ));
                }
            };

        if cli.model.is_some() && cli.embedder != EmbedderKind::Colbert {
            tracing::warn!("--model only applies to the colbert embedder");
        }

        Ok(Self {
            command,
            vec_path,
            data_path,
            query,
            num_terms,
            max_docs,
            embedder: cli.embedder,
            model: cli.model.clone(),
            json,
        })
    }
}
