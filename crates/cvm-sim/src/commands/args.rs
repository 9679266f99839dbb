use std::path::PathBuf;

use clap::Args;
use cvm_fit::CorrectionModel;

use crate::settings::SimConfig;

/// Input file and tool overrides, relative to the structure directory.
#[derive(Args, Debug, Clone, Default)]
pub struct FileArgs {
    /// Effective cluster interactions.
    #[arg(long)]
    pub eci: Option<PathBuf>,
    /// Probability-mapping matrix.
    #[arg(long)]
    pub vmat: Option<PathBuf>,
    /// Cluster description.
    #[arg(long)]
    pub clusters: Option<PathBuf>,
    /// Cluster multiplicities.
    #[arg(long)]
    pub clustermult: Option<PathBuf>,
    /// Configuration multiplicities.
    #[arg(long)]
    pub configmult: Option<PathBuf>,
    /// Configuration description.
    #[arg(long)]
    pub configs: Option<PathBuf>,
    /// Kikuchi-Barker coefficients.
    #[arg(long = "kb")]
    pub kikuchi_barker: Option<PathBuf>,
    /// Lattice file.
    #[arg(long)]
    pub lat: Option<PathBuf>,
    /// Maximal clusters, relative to the phase directory.
    #[arg(long)]
    pub maxclus: Option<PathBuf>,
    /// Input structure.
    #[arg(long = "str")]
    pub structure: Option<PathBuf>,
    /// `corrdump` executable.
    #[arg(long)]
    pub corrdump: Option<PathBuf>,
    /// `cvmclus` executable.
    #[arg(long)]
    pub cvmclus: Option<PathBuf>,
    /// Use the existing cluster files without running `cvmclus`.
    #[arg(long)]
    pub skip_cvmclus: bool,
}

impl FileArgs {
    pub fn apply(&self, config: &mut SimConfig) {
        let files = &mut config.files;
        let overrides = [
            (&self.eci, &mut files.eci),
            (&self.vmat, &mut files.vmatrix),
            (&self.clusters, &mut files.clusters),
            (&self.clustermult, &mut files.cluster_multiplicities),
            (&self.configmult, &mut files.config_multiplicities),
            (&self.configs, &mut files.configs),
            (&self.kikuchi_barker, &mut files.kikuchi_barker),
            (&self.lat, &mut files.lattice),
            (&self.maxclus, &mut files.maximal_clusters),
            (&self.structure, &mut files.structure),
            (&self.corrdump, &mut config.tools.corrdump),
            (&self.cvmclus, &mut config.tools.cvmclus),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
        if self.skip_cvmclus {
            config.tools.run_cvmclus = false;
        }
    }
}

/// Correction fit overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct FitFlags {
    /// Report the correction in J/mol instead of eV.
    #[arg(long)]
    pub in_joules: bool,
    /// Initial coefficients, relative to the structure directory.
    #[arg(long)]
    pub coeff_in: Option<PathBuf>,
    /// Fitted coefficients, relative to the output directory.
    #[arg(long)]
    pub coeff_out: Option<PathBuf>,
    /// Fit a polynomial in 1/T of this degree instead of the exponential form.
    #[arg(long)]
    pub inverse_degree: Option<usize>,
}

impl FitFlags {
    pub fn apply(&self, config: &mut SimConfig) {
        let fit = &mut config.fit;
        if self.in_joules {
            fit.in_joules = true;
        }
        if let Some(path) = &self.coeff_in {
            fit.coeff_in = path.clone();
        }
        if let Some(path) = &self.coeff_out {
            fit.coeff_out = path.clone();
        }
        if let Some(degree) = self.inverse_degree {
            fit.model = CorrectionModel::InversePolynomial { degree };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_given_files_are_replaced() {
        let mut config = SimConfig::default();
        let args = FileArgs {
            eci: Some(PathBuf::from("fitted_eci.out")),
            kikuchi_barker: Some(PathBuf::from("kb.out")),
            skip_cvmclus: true,
            ..FileArgs::default()
        };
        args.apply(&mut config);
        assert_eq!(config.files.eci, PathBuf::from("fitted_eci.out"));
        assert_eq!(config.files.kikuchi_barker, PathBuf::from("kb.out"));
        assert_eq!(config.files.vmatrix, PathBuf::from("vmat.out"));
        assert!(!config.tools.run_cvmclus);
    }

    #[test]
    fn inverse_degree_switches_the_model() {
        let mut config = SimConfig::default();
        FitFlags {
            inverse_degree: Some(3),
            ..FitFlags::default()
        }
        .apply(&mut config);
        assert_eq!(config.fit.model, CorrectionModel::InversePolynomial { degree: 3 });
        assert!(!config.fit.in_joules);
    }
}
