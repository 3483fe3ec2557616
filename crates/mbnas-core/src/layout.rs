use crate::error::{Error, Result};
use crate::shape::Shape;

// Layout — how a tensor's logical indices map onto its storage buffer
//
// Block tensors are almost always fresh row-major buffers. The exception is
// the channel shuffle, which transposes the group axis of a 5-D view: that
// only swaps two strides, and the backend gathers the result into a new
// buffer by walking `strided_indices()`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Vec<usize>,
    offset: usize,
}

impl Layout {
    /// Row-major layout starting at the beginning of the buffer.
    pub fn contiguous(shape: Shape) -> Self {
        let strides = shape.stride_contiguous();
        Layout {
            shape,
            strides,
            offset: 0,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    /// True if reading the buffer front to back visits elements in logical
    /// order, i.e. the view can be reinterpreted without a copy.
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && self.strides == self.shape.stride_contiguous()
    }

    /// The same buffer seen with axes `a` and `b` exchanged.
    pub fn transpose(&self, a: usize, b: usize) -> Result<Layout> {
        let rank = self.shape.rank();
        if a >= rank || b >= rank {
            return Err(Error::DimOutOfRange {
                dim: a.max(b),
                rank,
            });
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.swap(a, b);
        strides.swap(a, b);
        Ok(Layout {
            shape: Shape::new(dims),
            strides,
            offset: self.offset,
        })
    }

    /// Buffer positions of every element, in logical (row-major) order.
    pub fn strided_indices(&self) -> StridedIter {
        StridedIter {
            index: vec![0; self.shape.rank()],
            dims: self.dims().to_vec(),
            strides: self.strides.clone(),
            position: self.offset,
            remaining: self.elem_count(),
        }
    }
}

/// Odometer over a layout's logical indices that tracks the matching buffer
/// position incrementally.
pub struct StridedIter {
    index: Vec<usize>,
    dims: Vec<usize>,
    strides: Vec<usize>,
    position: usize,
    remaining: usize,
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.position;
        self.remaining -= 1;
        if self.remaining > 0 {
            // Roll the innermost axis; on wrap, rewind it and carry outward.
            for axis in (0..self.dims.len()).rev() {
                self.index[axis] += 1;
                self.position += self.strides[axis];
                if self.index[axis] < self.dims[axis] {
                    break;
                }
                self.position -= self.strides[axis] * self.dims[axis];
                self.index[axis] = 0;
            }
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}
