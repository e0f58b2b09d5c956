// Row selection on 2-D tensors

use crate::error::{EmbeddingError, Result};
use candle_core::{Device, Tensor};

/// `u32` index tensor for `index_select`
pub fn index_tensor(ids: &[usize], device: &Device) -> Result<Tensor> {
    let ids: Vec<u32> = ids.iter().map(|&i| i as u32).collect();
    let len = ids.len();
    Ok(Tensor::from_vec(ids, len, device)?)
}

/// Rows `rows` of `table`, in order, repeats allowed
///
/// The result stays on the autograd graph, so gradients flow back into
/// the selected rows of `table`.
pub fn gather_rows(table: &Tensor, rows: &[usize]) -> Result<Tensor> {
    let len = table.dim(0)?;
    if let Some(&index) = rows.iter().find(|&&r| r >= len) {
        return Err(EmbeddingError::IndexOutOfRange { index, len });
    }
    let ids = index_tensor(rows, table.device())?;
    Ok(table.index_select(&ids, 0)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_repeats_rows() {
        let t = Tensor::new(&[[1f32, 2.], [3., 4.], [5., 6.]], &Device::Cpu).unwrap();
        let rows = gather_rows(&t, &[2, 0, 2]).unwrap();
        assert_eq!(
            rows.to_vec2::<f32>().unwrap(),
            vec![vec![5., 6.], vec![1., 2.], vec![5., 6.]]
        );
        assert!(matches!(
            gather_rows(&t, &[3]),
            Err(EmbeddingError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }
}
