// Train/test/validation node splits

use crate::error::{GraphError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Disjoint index sets covering `0..n`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splits {
    /// Training indices
    pub train: Vec<usize>,
    /// Test indices
    pub test: Vec<usize>,
    /// Validation indices
    pub val: Vec<usize>,
}

impl Splits {
    /// Shuffle `0..n` and cut it into train, test and validation parts
    ///
    /// The validation part receives whatever the train and test fractions
    /// leave over.
    pub fn random<R: Rng + ?Sized>(
        n: usize,
        train_frac: f64,
        test_frac: f64,
        rng: &mut R,
    ) -> Result<Self> {
        for (name, frac) in [("train", train_frac), ("test", test_frac)] {
            if !(0.0..=1.0).contains(&frac) {
                return Err(GraphError::InvalidSplit(format!(
                    "{name} fraction {frac} outside [0, 1]"
                )));
            }
        }
        if train_frac + test_frac > 1.0 {
            return Err(GraphError::InvalidSplit(format!(
                "train + test fractions exceed 1 ({})",
                train_frac + test_frac
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        let train_end = (n as f64 * train_frac) as usize;
        let test_end = (train_end + (n as f64 * test_frac) as usize).min(n);
        let val = order.split_off(test_end);
        let test = order.split_off(train_end);

        Ok(Self {
            train: order,
            test,
            val,
        })
    }

    /// Total number of indices
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len() + self.val.len()
    }

    /// True when every part is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
