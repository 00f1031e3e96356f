use crate::common::{Error, Result};
use aligned_vec::{AVec, ConstAlign};
use std::ops::{Index, IndexMut};

const ALIGN: usize = 64;

/// Dense row-major 2-D buffer with 64-byte aligned storage.
///
/// Used for the label image, the border mask and the gradient field. The
/// alignment matters for the per-pixel sweeps that dominate a growth pass.
#[derive(Debug)]
pub struct Array2D<T> {
    pub data: AVec<T, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
}

impl<T> Array2D<T> {
    pub fn from_slice(data: &[T], width: usize, height: usize) -> Result<Self>
    where
        T: Clone,
    {
        if data.len() != width * height {
            return Err(Error::DimensionMismatch);
        }
        Ok(Self {
            width,
            height,
            data: AVec::from_slice(ALIGN, data),
        })
    }

    pub fn from_fill(value: T, width: usize, height: usize) -> Self
    where
        T: Clone + Copy,
    {
        let data: AVec<T, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, (0..width * height).map(|_| value));
        Self {
            width,
            height,
            data,
        }
    }

    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.data.fill(value)
    }

    #[inline(always)]
    pub fn get_row(&self, row: usize) -> &[T] {
        debug_assert!(row < self.height);
        &self.data[(self.width * row)..(self.width * row + self.width)]
    }

    #[inline(always)]
    pub fn get_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(self.width > x);
        debug_assert!(self.height > y);
        self.width * y + x
    }
}

impl<T> Index<(usize, usize)> for Array2D<T> {
    type Output = T;
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.data[self.get_index(x, y)]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2D<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        let idx = self.get_index(x, y);
        &mut self.data[idx]
    }
}
