// Embedding matrices as whitespace-separated text
//
// One row per line, values separated by spaces or tabs. This is the format
// written for node and element embeddings and read by the embedding probe.

use crate::error::{GraphError, Result};
use candle_core::{Device, Tensor};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Parse a whitespace-separated matrix into a 2-D `f32` tensor
pub fn parse_matrix_text(content: &str, path: &Path, device: &Device) -> Result<Tensor> {
    let mut rows: Vec<Vec<f32>> = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f32>().map_err(|e| GraphError::Parse {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    message: format!("{tok:?}: {e}"),
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(GraphError::Parse {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    message: format!("expected {} values, found {}", first.len(), row.len()),
                });
            }
        }
        rows.push(row);
    }
    let cols = rows.first().map_or(0, Vec::len);
    let shape = (rows.len(), cols);
    let values: Vec<f32> = rows.into_iter().flatten().collect();
    Ok(Tensor::from_vec(values, shape, device)?)
}

/// Read a whitespace-separated matrix file
pub fn read_matrix_text(path: &Path, device: &Device) -> Result<Tensor> {
    let content = fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
    parse_matrix_text(&content, path, device)
}

/// Write a 2-D tensor as space-separated text, one row per line
pub fn write_matrix_text(path: &Path, matrix: &Tensor) -> Result<()> {
    let rows = matrix.to_dtype(candle_core::DType::F32)?.to_vec2::<f32>()?;
    let file = File::create(path).map_err(|e| GraphError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{line}").map_err(|e| GraphError::io(path, e))?;
    }
    out.flush().map_err(|e| GraphError::io(path, e))
}
