//! MATLAB .mat loader for flow-estimation problems.
//!
//! Expects arrays `A` (m × n), `b` (m), `block_sizes`, `x_true` (n) and
//! optionally `N` (n × r). Files ending in `.gz` are decompressed first.
//! Only dense arrays are supported (matfile v0.5 skips sparse ones), so a
//! missing `N` falls back to the canonical block basis.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use matfile::{MatFile, NumericData};
use tracing::{debug, info};

use flowcv_core::linalg::sparse;
use flowcv_core::{block_basis, ProblemInstance};

/// Load a problem instance from a (possibly gzipped) .mat file.
pub fn load_problem<P: AsRef<Path>>(path: P) -> Result<ProblemInstance> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mat = if path.extension().map_or(false, |e| e == "gz") {
        let mut bytes = Vec::new();
        GzDecoder::new(file)
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to decompress {}", path.display()))?;
        MatFile::parse(Cursor::new(bytes))
    } else {
        MatFile::parse(BufReader::new(file))
    }
    .with_context(|| format!("Failed to parse MAT file {}", path.display()))?;

    let (m, n, a_triplets) = get_matrix(&mat, "A")?;
    let b = get_vector(&mat, "b")?;
    let block_sizes = parse_block_sizes(&get_vector(&mat, "block_sizes")?)?;
    let x_true = get_vector(&mat, "x_true")?;

    let basis = if mat.find_by_name("N").is_some() {
        let (rows, cols, triplets) = get_matrix(&mat, "N")?;
        sparse::from_triplets(rows, cols, triplets)
    } else {
        debug!("no N array, using canonical block basis");
        block_basis(&block_sizes)
    };

    info!(
        file = %path.display(),
        observations = m,
        routes = n,
        blocks = block_sizes.len(),
        reduced = basis.cols(),
        "loaded problem"
    );

    let a = sparse::from_triplets(m, n, a_triplets);
    ProblemInstance::new(a, b, basis, block_sizes, x_true).context("Inconsistent problem data")
}

/// Block sizes are stored as floating point; they must be positive integers.
fn parse_block_sizes(values: &[f64]) -> Result<Vec<usize>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if v.fract() != 0.0 || v < 1.0 {
                bail!("block_sizes[{}] = {} is not a positive integer", i, v);
            }
            Ok(v as usize)
        })
        .collect()
}

fn numeric_values(data: &NumericData, name: &str) -> Result<Vec<f64>> {
    let values = match data {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&x| x as f64).collect(),
    };
    if values.is_empty() {
        bail!("Empty array: {}", name);
    }
    Ok(values)
}

/// Extract a vector (any 1 × k or k × 1 array).
fn get_vector(mat: &MatFile, name: &str) -> Result<Vec<f64>> {
    let array = mat
        .find_by_name(name)
        .ok_or_else(|| anyhow::anyhow!("Missing array: {}", name))?;

    let shape = array.size();
    if shape.iter().filter(|&&d| d > 1).count() > 1 {
        bail!("Expected a vector for {}, got shape {:?}", name, shape);
    }
    numeric_values(array.data(), name)
}

/// Extract a dense matrix as triplets `(rows, cols, entries)`.
fn get_matrix(mat: &MatFile, name: &str) -> Result<(usize, usize, Vec<(usize, usize, f64)>)> {
    let array = mat.find_by_name(name).ok_or_else(|| {
        anyhow::anyhow!("Missing array: {} (note: sparse arrays not supported by matfile crate)", name)
    })?;

    let shape = array.size();
    if shape.len() != 2 {
        bail!("Expected 2D array for {}, got {}D", name, shape.len());
    }
    let (nrows, ncols) = (shape[0], shape[1]);
    let values = numeric_values(array.data(), name)?;
    if values.len() != nrows * ncols {
        bail!("Array {} has {} entries, expected {}", name, values.len(), nrows * ncols);
    }
    Ok((nrows, ncols, dense_to_triplets(&values, nrows, ncols)))
}

/// Column-major dense data to triplets, dropping zeros.
fn dense_to_triplets(values: &[f64], nrows: usize, ncols: usize) -> Vec<(usize, usize, f64)> {
    let mut triplets = Vec::new();
    for col in 0..ncols {
        for row in 0..nrows {
            let val = values[row + col * nrows];
            if val != 0.0 {
                triplets.push((row, col, val));
            }
        }
    }
    triplets
}
