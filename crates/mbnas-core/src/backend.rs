use std::fmt;

use crate::dtype::DType;
use crate::error::Result;
use crate::layout::Layout;
use crate::shape::Shape;

// Backend — where block tensors live and the few kernels they need
//
// A block forward pass reduces to: fill parameters (constants or random
// init), scale/shift buffers (init ranges, ReLU6), gather a strided view into
// a fresh buffer (channel shuffle), and read everything back to the host for
// convolution and batch-norm statistics. That is the whole contract.
//
// Every method that returns storage returns a contiguous buffer in the
// logical order of `layout`.

/// Device handle passed through block construction untouched.
pub trait BackendDevice: Clone + fmt::Debug + Send + Sync + 'static {
    /// Short device label, shown in tensor debug output.
    fn name(&self) -> String;
}

/// Flat element buffer owned by a backend.
pub trait BackendStorage: Clone + Send + Sync + 'static {
    fn dtype(&self) -> DType;

    /// Number of elements in the buffer (not the number a view addresses).
    fn elem_count(&self) -> usize;
}

pub trait Backend: Clone + Send + Sync + fmt::Debug + 'static {
    type Device: BackendDevice;
    type Storage: BackendStorage;

    // Parameter initialization

    /// Constant zeros (batch-norm shift, running mean).
    fn zeros(shape: &Shape, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Constant ones (batch-norm scale).
    fn ones(shape: &Shape, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Samples from U[0, 1); convolution init rescales them.
    fn rand_uniform(shape: &Shape, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Samples from N(0, 1).
    fn rand_normal(shape: &Shape, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Upload host values, converting them to `dtype`.
    fn from_f64_slice(data: &[f64], dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    // Element-wise kernels

    /// `x * mul + add` for every element addressed by `layout`.
    fn affine(input: &Self::Storage, layout: &Layout, mul: f64, add: f64) -> Result<Self::Storage>;

    /// `min(max(x, min), max)`; ReLU and ReLU6 are both clamps.
    fn clamp(input: &Self::Storage, layout: &Layout, min: f64, max: f64) -> Result<Self::Storage>;

    // Gathers

    /// Materialize a strided view, e.g. the transposed shuffle view.
    fn to_contiguous(input: &Self::Storage, layout: &Layout) -> Result<Self::Storage>;

    /// Read the elements addressed by `layout` back to the host.
    fn to_f64_vec(input: &Self::Storage, layout: &Layout) -> Result<Vec<f64>>;
}
