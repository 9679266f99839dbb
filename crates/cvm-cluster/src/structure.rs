use std::fs;
use std::path::Path;

use cvm_core::{CvmError, ErrorInfo, RngHandle};

use crate::io::read_required;

/// One occupied site: its coordinate tokens and the species on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// Coordinate tokens exactly as read.
    pub coordinates: Vec<String>,
    /// Species label (last token of the line).
    pub species: String,
}

/// An ATAT-style structure or lattice file (`str.in`, `lat.in`, `str_relax.out`).
///
/// The header is either 4 lines (the first line carries more than three
/// tokens) or 6 lines (coordinate system given as three vectors). Every
/// following non-blank line is a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicStructure {
    header: Vec<String>,
    sites: Vec<Site>,
}

impl AtomicStructure {
    /// Parses the structure text.
    pub fn parse(text: &str) -> Result<Self, CvmError> {
        let lines: Vec<&str> = text.lines().collect();
        let first = lines.first().ok_or_else(|| {
            CvmError::Parse(ErrorInfo::new("structure-empty", "structure file is empty"))
        })?;
        let header_len = if first.split_whitespace().count() > 3 { 4 } else { 6 };
        if lines.len() < header_len {
            return Err(CvmError::Parse(
                ErrorInfo::new(
                    "structure-header",
                    format!("expected a {header_len} line header, found {} lines", lines.len()),
                )
                .with_context("line", lines.len().to_string()),
            ));
        }
        let header = lines[..header_len]
            .iter()
            .map(|line| line.trim_end().to_string())
            .collect();
        let mut sites = Vec::new();
        for (offset, line) in lines[header_len..].iter().enumerate() {
            let mut tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            let Some(species) = tokens.pop() else {
                continue;
            };
            if tokens.is_empty() {
                return Err(CvmError::Parse(
                    ErrorInfo::new("structure-site", "site line has no coordinates")
                        .with_context("line", (header_len + offset + 1).to_string()),
                ));
            }
            sites.push(Site {
                coordinates: tokens,
                species,
            });
        }
        Ok(Self { header, sites })
    }

    /// Reads and parses a structure file.
    pub fn read(path: &Path) -> Result<Self, CvmError> {
        let text = read_required(path)?;
        Self::parse(&text).map_err(|err| match err {
            CvmError::Parse(info) => {
                CvmError::Parse(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    /// Writes the structure to `path`.
    pub fn write(&self, path: &Path) -> Result<(), CvmError> {
        fs::write(path, self.to_text()).map_err(|err| CvmError::io("structure-write", &err, path))
    }

    /// Renders the structure in the same layout it was read in.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }
        for site in &self.sites {
            out.push_str(&format!("{} {}\n", site.coordinates.join(" "), site.species));
        }
        out
    }

    /// Header lines.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Occupied sites in file order.
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Number of sites.
    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// Species in site order.
    pub fn species(&self) -> Vec<&str> {
        self.sites.iter().map(|site| site.species.as_str()).collect()
    }

    /// Returns a copy whose species are uniformly permuted over the sites.
    pub fn with_shuffled_species(&self, rng: &mut RngHandle) -> Self {
        let mut species: Vec<String> = self.sites.iter().map(|site| site.species.clone()).collect();
        rng.shuffle(&mut species);
        let sites = self
            .sites
            .iter()
            .zip(species)
            .map(|(site, species)| Site {
                coordinates: site.coordinates.clone(),
                species,
            })
            .collect();
        Self {
            header: self.header.clone(),
            sites,
        }
    }

    /// Returns a copy that takes its cell and coordinate-system header from
    /// `reference`. Used to rescale a relaxed SQS back onto the ideal lattice.
    pub fn with_header_of(&self, reference: &AtomicStructure) -> Self {
        Self {
            header: reference.header.clone(),
            sites: self.sites.clone(),
        }
    }
}
