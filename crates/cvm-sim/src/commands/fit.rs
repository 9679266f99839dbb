use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use cvm_cluster::ClusterFiles;
use cvm_opt::read_results_csv;
use tracing::info;

use crate::commands::args::FitFlags;
use crate::pipeline;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct FitArgs {
    /// Result table of an earlier sweep. Defaults to the configured output file.
    #[arg(long)]
    pub results: Option<PathBuf>,
    #[command(flatten)]
    pub fit: FitFlags,
}

pub fn run(global: &GlobalArgs, args: &FitArgs) -> Result<(), Box<dyn Error>> {
    let mut config = global.load_config()?;
    args.fit.apply(&mut config);
    let workdir = global.workdir.as_path();
    let output = &config.run.output;
    let results_path = match &args.results {
        Some(path) => ClusterFiles::resolve(workdir, path),
        None => output.path(workdir, &output.results_file),
    };

    let records = read_results_csv(&results_path)?;
    info!(
        results = %results_path.display(),
        temperatures = records.len(),
        "refitting SRO correction"
    );
    let sites = pipeline::structure_sites(workdir, &config)?;
    let result = pipeline::fit_records(&records, sites, workdir, &config)?;
    info!(expression = %result.expression(), "fit complete");
    Ok(())
}
