use std::error::Error;

use clap::Args;
use cvm_opt::FreeEnergyFunctional;
use tracing::info;

use crate::commands::args::FileArgs;
use crate::pipeline;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct OrderedArgs {
    #[command(flatten)]
    pub files: FileArgs,
}

pub fn run(global: &GlobalArgs, args: &OrderedArgs) -> Result<(), Box<dyn Error>> {
    let mut config = global.load_config()?;
    args.files.apply(&mut config);
    let workdir = global.workdir.as_path();

    pipeline::generate_clusters(workdir, &config);
    let corrdump = pipeline::correlation_tool(workdir, &config);
    let mut model = pipeline::load_model(workdir, &config, &corrdump)?;
    pipeline::solve_ordered(&mut model, workdir, &config)?;

    if let Some(ordered) = model.ordered_correlations() {
        let energy = FreeEnergyFunctional::new(&model, 0.0).energy(ordered);
        let per_atom = model.num_lattice_atoms().max(1) as f64;
        info!(energy = energy / per_atom, "ordered state energy (eV/atom)");
    }
    Ok(())
}
