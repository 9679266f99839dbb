use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use tracing::error;

mod commands;
mod logging;
mod pipeline;
mod settings;

use commands::{fit, ordered, run};
use settings::SimConfig;

#[derive(Parser, Debug)]
#[command(
    name = "cvm-sim",
    version,
    about = "Short-range-order free energies from the cluster variation method"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand.
#[derive(ClapArgs, Debug, Clone)]
pub struct GlobalArgs {
    /// Structure directory holding the cluster-expansion files.
    #[arg(long, short = 'd', global = true, default_value = ".")]
    pub workdir: PathBuf,
    /// YAML run configuration; command line flags take precedence.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Master seed for structure sampling and basin hopping.
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Log file, relative to the structure directory.
    #[arg(long, global = true, default_value = "log.out")]
    pub log: PathBuf,
    /// Also print log lines to the screen.
    #[arg(long, global = true)]
    pub toscreen: bool,
}

impl GlobalArgs {
    /// Loads the YAML configuration, if any, and applies the global overrides.
    pub fn load_config(&self) -> Result<SimConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.run.seed_policy.master_seed = seed;
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ordered state, temperature sweep and SRO correction fit.
    Run(run::RunArgs),
    /// Solve the zero-temperature ordered state only.
    Ordered(ordered::OrderedArgs),
    /// Refit the SRO correction from an existing result table.
    Fit(fit::FitArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let log_path = cli.global.workdir.join(&cli.global.log);
    logging::init(&log_path, cli.global.verbose, cli.global.toscreen)?;

    let result = match &cli.command {
        Command::Run(args) => run::run(&cli.global, args),
        Command::Ordered(args) => ordered::run(&cli.global, args),
        Command::Fit(args) => fit::run(&cli.global, args),
    };
    if let Err(err) = &result {
        error!(%err, "run aborted");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "cvm-sim", "-vv", "run", "--seed", "7", "--tmin", "300", "--toscreen",
        ])
        .unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.seed, Some(7));
        assert!(cli.global.toscreen);
        assert_eq!(cli.global.log, PathBuf::from("log.out"));
        match cli.command {
            Command::Run(args) => assert_eq!(args.tmin, Some(300.0)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn seed_flag_overrides_the_default_policy() {
        let cli = Cli::try_parse_from(["cvm-sim", "ordered", "--seed", "11"]).unwrap();
        let config = cli.global.load_config().unwrap();
        assert_eq!(config.run.seed_policy.master_seed, 11);

        let cli = Cli::try_parse_from(["cvm-sim", "ordered"]).unwrap();
        let config = cli.global.load_config().unwrap();
        assert_eq!(config.run.seed_policy.master_seed, cvm_core::DEFAULT_SEED);
    }

    #[test]
    fn fit_subcommand_takes_a_results_table() {
        let cli = Cli::try_parse_from([
            "cvm-sim",
            "fit",
            "--results",
            "out/result.csv",
            "--in-joules",
            "--coeff-out",
            "coeffs.out",
        ])
        .unwrap();
        match cli.command {
            Command::Fit(args) => {
                assert_eq!(args.results, Some(PathBuf::from("out/result.csv")));
                assert!(args.fit.in_joules);
                assert_eq!(args.fit.coeff_out, Some(PathBuf::from("coeffs.out")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
