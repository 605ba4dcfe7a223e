use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use sci_engine::{EngineConfig, GameId, SciVersion, SignaturePolicy};

#[derive(Parser, Debug)]
#[command(
    about = "Builds the kernel table for an SCI game and replays kernel call traces",
    version
)]
pub struct Args {
    /// JSON engine configuration; the flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Game id used to select workarounds
    #[arg(long, value_enum)]
    pub game: Option<GameId>,

    /// Interpreter version of the game
    #[arg(long, value_enum)]
    pub sci_version: Option<SciVersion>,

    /// Fail kernel calls whose arguments do not match the signature
    #[arg(long, conflicts_with = "permissive")]
    pub strict: bool,

    /// Log signature mismatches and call the function anyway
    #[arg(long)]
    pub permissive: bool,

    /// Directory holding the vocabulary patch files
    #[arg(long)]
    pub resource_dir: Option<PathBuf>,

    /// Log every kernel call
    #[arg(long)]
    pub trace_calls: bool,

    /// Log calls to one kernel function or sub-function (`Prefix*` allowed);
    /// repeatable
    #[arg(long = "log-kernel", value_name = "NAME")]
    pub log_kernels: Vec<String>,

    /// Seed for kRandom
    #[arg(long)]
    pub seed: Option<u64>,

    /// Path to write the kernel table manifest as JSON
    #[arg(long)]
    pub kernel_json: Option<PathBuf>,

    /// Path to write the loaded name tables as JSON
    #[arg(long)]
    pub selectors_json: Option<PathBuf>,

    /// JSON call trace to replay against the kernel table
    #[arg(long)]
    pub run_trace: Option<PathBuf>,

    /// Path to write the trace report as JSON (requires --run-trace)
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Print every kernel function instead of the summary
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub struct RunArgs {
    pub config: EngineConfig,
    pub kernel_json: Option<PathBuf>,
    pub selectors_json: Option<PathBuf>,
    pub run_trace: Option<PathBuf>,
    pub report_json: Option<PathBuf>,
    pub verbose: bool,
}

pub fn parse() -> Result<RunArgs> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    fn into_command(self) -> Result<RunArgs> {
        if self.report_json.is_some() && self.run_trace.is_none() {
            bail!("--report-json requires --run-trace");
        }

        let mut config = match self.config.as_deref() {
            Some(path) => EngineConfig::from_json_file(path).context("loading engine config")?,
            None => {
                let Some(version) = self.sci_version else {
                    bail!("either --config or --sci-version is required");
                };
                EngineConfig::new(self.game.unwrap_or(GameId::Unknown), version)
            }
        };

        if let Some(game) = self.game {
            config.game = game;
        }
        if let Some(version) = self.sci_version {
            config.version = version;
        }
        if self.strict {
            config.signature_policy = Some(SignaturePolicy::Strict);
        } else if self.permissive {
            config.signature_policy = Some(SignaturePolicy::Permissive);
        }
        if self.resource_dir.is_some() {
            config.resource_dir = self.resource_dir;
        }
        config.trace_calls |= self.trace_calls;
        config.log_kernels.extend(self.log_kernels);
        if self.seed.is_some() {
            config.random_seed = self.seed;
        }

        Ok(RunArgs {
            config,
            kernel_json: self.kernel_json,
            selectors_json: self.selectors_json,
            run_trace: self.run_trace,
            report_json: self.report_json,
            verbose: self.verbose,
        })
    }
}
