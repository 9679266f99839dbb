use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use cvm_core::{CvmError, ErrorInfo};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// One record of `clusters.out`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Number of symmetry-equivalent copies per lattice site.
    pub multiplicity: u32,
    /// Largest pair distance inside the cluster.
    pub diameter: f64,
    /// Number of sites (0 = empty cluster, 1 = point).
    pub arity: u32,
}

/// Reads a required input file, mapping absence to [`CvmError::MissingInputFile`].
pub fn read_required(path: &Path) -> Result<String, CvmError> {
    fs::read_to_string(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            CvmError::MissingInputFile(
                ErrorInfo::new("input-missing", "required input file not found")
                    .with_context("path", path.display().to_string())
                    .with_hint("generate the cluster files with cvmclus"),
            )
        } else {
            CvmError::io("input-read", &err, path)
        }
    })
}

/// Reads an optional input file. Returns `None` when it does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>, CvmError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(CvmError::io("input-read", &err, path)),
    }
}

/// Parses `clusters.out` into cluster records.
pub fn parse_clusters(text: &str) -> Result<Vec<ClusterInfo>, CvmError> {
    let mut clusters = Vec::new();
    for block in blocks(text, 1) {
        if block.len() < 3 {
            return Err(parse_error(
                "clusters-short-block",
                "cluster block needs multiplicity, diameter and arity",
                block.first().map_or(0, |line| line.number),
            ));
        }
        clusters.push(ClusterInfo {
            multiplicity: parse_value(&block[0])?,
            diameter: parse_value(&block[1])?,
            arity: parse_value(&block[2])?,
        });
    }
    if clusters.is_empty() {
        return Err(parse_error("clusters-empty", "no cluster records found", 0));
    }
    Ok(clusters)
}

/// Parses a header line followed by one float per line (`eci.out`,
/// `clusmult.out`, `configkb.out`).
pub fn parse_column(text: &str) -> Result<Vec<f64>, CvmError> {
    numbered_lines(text)
        .skip(1)
        .filter(|line| !line.text.is_empty())
        .map(|line| parse_value::<f64>(&line))
        .collect()
}

/// Parses `configmult.out`: one block per configuration, each with a count
/// line followed by the sub-configuration multiplicities.
pub fn parse_config_multiplicities(text: &str) -> Result<Vec<Vec<f64>>, CvmError> {
    blocks_after_header(text, 1)
        .into_iter()
        .map(|block| {
            block
                .iter()
                .skip(1)
                .map(parse_value::<f64>)
                .collect::<Result<Vec<f64>, _>>()
        })
        .collect()
}

/// Parses `vmat.out` into one matrix per configuration block.
pub fn parse_vmatrix(text: &str) -> Result<Vec<DMatrix<f64>>, CvmError> {
    let mut matrices = Vec::new();
    for block in blocks_after_header(text, 1) {
        let shape = &block[0];
        let dims: Vec<usize> = shape
            .text
            .split_whitespace()
            .map(|token| {
                token.parse::<usize>().map_err(|err| {
                    parse_error("vmat-shape", err.to_string(), shape.number)
                })
            })
            .collect::<Result<_, _>>()?;
        let [rows, cols] = dims[..] else {
            return Err(parse_error(
                "vmat-shape",
                "expected `rows cols` at the start of the block",
                shape.number,
            ));
        };
        let body = &block[1..];
        if body.len() != rows {
            return Err(parse_error(
                "vmat-rows",
                format!("block declares {rows} rows but has {}", body.len()),
                shape.number,
            ));
        }
        let mut values = Vec::with_capacity(rows * cols);
        for line in body {
            let row: Vec<f64> = line
                .text
                .split_whitespace()
                .map(|token| parse_token(token, line.number))
                .collect::<Result<_, _>>()?;
            if row.len() != cols {
                return Err(parse_error(
                    "vmat-cols",
                    format!("row has {} entries, expected {cols}", row.len()),
                    line.number,
                ));
            }
            values.extend(row);
        }
        matrices.push(DMatrix::from_row_slice(rows, cols, &values));
    }
    Ok(matrices)
}

/// Parses `config.out` into the sub-cluster count of each configuration block.
pub fn parse_configs(text: &str) -> Result<Vec<usize>, CvmError> {
    blocks_after_header(text, 2)
        .into_iter()
        .map(|block| parse_value::<usize>(&block[0]))
        .collect()
}

#[derive(Debug, Clone)]
struct Line<'a> {
    number: usize,
    text: &'a str,
}

fn numbered_lines(text: &str) -> impl Iterator<Item = Line<'_>> {
    text.lines().enumerate().map(|(idx, raw)| Line {
        number: idx + 1,
        text: raw.trim(),
    })
}

/// Groups non-blank lines into blocks. A new block starts after at least
/// `separator` consecutive blank lines.
fn blocks(text: &str, separator: usize) -> Vec<Vec<Line<'_>>> {
    group(numbered_lines(text), separator)
}

fn blocks_after_header(text: &str, separator: usize) -> Vec<Vec<Line<'_>>> {
    group(numbered_lines(text).skip(1), separator)
}

fn group<'a>(lines: impl Iterator<Item = Line<'a>>, separator: usize) -> Vec<Vec<Line<'a>>> {
    let mut out: Vec<Vec<Line<'a>>> = Vec::new();
    let mut current: Vec<Line<'a>> = Vec::new();
    let mut blank_run = 0usize;
    for line in lines {
        if line.text.is_empty() {
            blank_run += 1;
            continue;
        }
        if blank_run >= separator && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        blank_run = 0;
        current.push(line);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn parse_value<T>(line: &Line<'_>) -> Result<T, CvmError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let token = line.text.split_whitespace().next().unwrap_or_default();
    parse_token(token, line.number)
}

fn parse_token<T>(token: &str, line: usize) -> Result<T, CvmError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    token
        .parse::<T>()
        .map_err(|err| parse_error("bad-number", format!("`{token}`: {err}"), line))
}

fn parse_error(code: &str, message: impl Into<String>, line: usize) -> CvmError {
    CvmError::Parse(ErrorInfo::new(code, message).with_context("line", line.to_string()))
}

/// Attaches the file path to parse errors raised by the functions above.
pub fn with_path<T>(result: Result<T, CvmError>, path: &Path) -> Result<T, CvmError> {
    result.map_err(|err| match err {
        CvmError::Parse(info) => {
            CvmError::Parse(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })
}
