// Losses and accuracy metrics
//
// Losses return scalar tensors on the autograd graph; accuracies are plain
// numbers read back from the device.

use crate::error::{EmbeddingError, Result};
use crate::gather::{gather_rows, index_tensor};
use candle_core::{DType, Tensor, D};

/// Mean binary cross-entropy on raw logits
///
/// Uses `max(x, 0) - x·y + ln(1 + e^{-|x|})`, which stays finite for large
/// logits of either sign. Empty input gives a zero loss.
pub fn bce_with_logits(logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
    if logits.dims() != labels.dims() {
        return Err(EmbeddingError::ShapeMismatch {
            op: "bce_with_logits",
            left: logits.dims().to_vec(),
            right: labels.dims().to_vec(),
        });
    }
    if logits.elem_count() == 0 {
        return Ok(Tensor::zeros((), DType::F32, logits.device())?);
    }
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    let loss = logits
        .relu()?
        .sub(&logits.mul(labels)?)?
        .add(&softplus)?;
    Ok(loss.mean_all()?)
}

/// Fraction of logits on the correct side of zero
pub fn binary_accuracy(logits: &Tensor, labels: &Tensor) -> Result<f32> {
    if logits.elem_count() == 0 {
        return Ok(0.0);
    }
    let predicted = logits.gt(0f32)?;
    let truth = labels.gt(0.5f32)?;
    Ok(predicted
        .eq(&truth)?
        .to_dtype(DType::F32)?
        .mean_all()?
        .to_scalar::<f32>()?)
}

fn selected_targets(logits: &Tensor, labels: &[usize], rows: &[usize]) -> Result<Tensor> {
    let (n, classes) = logits.dims2()?;
    if labels.len() != n {
        return Err(EmbeddingError::LengthMismatch {
            expected: n,
            got: labels.len(),
        });
    }
    let mut targets = Vec::with_capacity(rows.len());
    for &r in rows {
        let label = *labels
            .get(r)
            .ok_or(EmbeddingError::IndexOutOfRange { index: r, len: n })?;
        if label >= classes {
            return Err(EmbeddingError::InvalidLabel { label, classes });
        }
        targets.push(label);
    }
    index_tensor(&targets, logits.device())
}

/// Mean softmax cross-entropy over the selected rows
///
/// Rows not listed in `rows` contribute nothing, which is how node
/// classification restricts the loss to training nodes while the model
/// scores the whole graph.
pub fn cross_entropy(logits: &Tensor, labels: &[usize], rows: &[usize]) -> Result<Tensor> {
    let targets = selected_targets(logits, labels, rows)?;
    if rows.is_empty() {
        return Ok(Tensor::zeros((), DType::F32, logits.device())?);
    }
    let selected = gather_rows(logits, rows)?;
    Ok(candle_nn::loss::cross_entropy(&selected, &targets)?)
}

/// Fraction of selected rows whose argmax equals the label
pub fn argmax_accuracy(logits: &Tensor, labels: &[usize], rows: &[usize]) -> Result<f32> {
    let targets = selected_targets(logits, labels, rows)?;
    if rows.is_empty() {
        return Ok(0.0);
    }
    let predicted = gather_rows(logits, rows)?.argmax(D::Minus1)?;
    Ok(predicted
        .eq(&targets)?
        .to_dtype(DType::F32)?
        .mean_all()?
        .to_scalar::<f32>()?)
}
