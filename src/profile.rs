use image::GrayImage;

use crate::error::PipelineError;

/// Row-major intensity grid for one strip.
#[derive(Clone, Debug)]
pub struct IntensityGrid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy + Into<f64>> IntensityGrid<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self, PipelineError> {
        if height == 0 {
            return Err(PipelineError::InvalidGrid("grid height must be at least 1".into()));
        }
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| PipelineError::InvalidGrid("grid dimensions overflow".into()))?;
        if data.len() != expected {
            return Err(PipelineError::InvalidGrid(format!(
                "expected {expected} samples for {width}x{height}, received {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Mean of every column, accumulated in f64.
    pub fn column_profile(&self) -> Vec<f64> {
        let mut sums = vec![0.0f64; self.width];
        if self.width == 0 {
            return sums;
        }
        for row in self.data.chunks_exact(self.width) {
            for (acc, &value) in sums.iter_mut().zip(row) {
                *acc += value.into();
            }
        }
        let rows = self.height as f64;
        for acc in sums.iter_mut() {
            *acc /= rows;
        }
        sums
    }
}

impl IntensityGrid<u8> {
    pub fn from_luma(image: &GrayImage) -> Result<Self, PipelineError> {
        Self::new(
            image.width() as usize,
            image.height() as usize,
            image.as_raw().clone(),
        )
    }
}
