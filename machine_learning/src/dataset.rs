use ndarray::{Array2, ArrayView2, Axis};

use crate::{MlErr, Result};

/// An in-memory dataset stored as flat rows, each one holding `x_size` features followed by
/// `y_size` targets.
#[derive(Clone, Debug)]
pub struct Dataset {
    x_size: usize,
    y_size: usize,
    data: Vec<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `data` - The flat samples.
    /// * `x_size` - The amount of features per sample.
    /// * `y_size` - The amount of targets per sample.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if `data` doesn't hold a whole number of rows.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row = x_size + y_size;

        if row == 0 || data.len() % row != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: data.len(),
                expected: data.len().next_multiple_of(row.max(1)),
            });
        }

        Ok(Self {
            x_size,
            y_size,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.row_size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    fn row_size(&self) -> usize {
        self.x_size + self.y_size
    }

    /// Views up to `amount` contiguous samples starting at `start`.
    ///
    /// # Returns
    /// The `(x, y)` views, which may be shorter than `amount` at the end of the dataset.
    pub fn rows(
        &self,
        start: usize,
        amount: usize,
    ) -> Result<(ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let len = self.len();
        if start >= len {
            return Err(MlErr::OutOfRange { index: start, len });
        }

        let end = (start + amount).min(len);
        let row = self.row_size();
        let full = ArrayView2::from_shape((end - start, row), &self.data[start * row..end * row])?;
        Ok(full.split_at(Axis(1), self.x_size))
    }

    /// Copies the samples at `indices`, in that order, into a new `(x, y)` pair.
    pub fn select(&self, indices: &[usize]) -> Result<(Array2<f32>, Array2<f32>)> {
        let len = self.len();
        let row = self.row_size();
        let mut x = Vec::with_capacity(indices.len() * self.x_size);
        let mut y = Vec::with_capacity(indices.len() * self.y_size);

        for &i in indices {
            if i >= len {
                return Err(MlErr::OutOfRange { index: i, len });
            }

            let (xi, yi) = self.data[i * row..(i + 1) * row].split_at(self.x_size);
            x.extend_from_slice(xi);
            y.extend_from_slice(yi);
        }

        let x = Array2::from_shape_vec((indices.len(), self.x_size), x)?;
        let y = Array2::from_shape_vec((indices.len(), self.y_size), y)?;
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn dataset() -> Dataset {
        Dataset::new(vec![1., 2., 10., 3., 4., 20., 5., 6., 30.], 2, 1).unwrap()
    }

    #[test]
    fn rows_split_features_and_targets() {
        let ds = dataset();
        let (x, y) = ds.rows(1, 5).unwrap();

        assert_eq!(ds.len(), 3);
        assert_eq!(x, array![[3., 4.], [5., 6.]]);
        assert_eq!(y, array![[20.], [30.]]);
    }

    #[test]
    fn select_follows_index_order() {
        let (x, y) = dataset().select(&[2, 0]).unwrap();
        assert_eq!(x, array![[5., 6.], [1., 2.]]);
        assert_eq!(y, array![[30.], [10.]]);
    }

    #[test]
    fn ragged_data_is_rejected() {
        assert!(Dataset::new(vec![1., 2., 3., 4.], 2, 1).is_err());
        assert!(matches!(
            dataset().select(&[3]),
            Err(MlErr::OutOfRange { index: 3, len: 3 })
        ));
    }
}
