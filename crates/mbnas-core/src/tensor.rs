use std::sync::Arc;

use crate::backend::{Backend, BackendDevice};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::shape::Shape;

// Tensor — n-dimensional array handle
//
// Tensor<B> is a cheap-to-clone handle (Arc) around backend storage plus a
// Layout. Views (transpose, reshape of contiguous data) share the storage
// and only swap the layout; every computing op returns fresh contiguous
// storage. There is no autograd: blocks are built, run forward, and dropped.

struct TensorInner<B: Backend> {
    storage: Arc<B::Storage>,
    layout: Layout,
    dtype: DType,
    device: B::Device,
}

/// An n-dimensional array of numbers on a specific backend.
///
/// # Example
/// ```ignore
/// let x = Tensor::<CpuBackend>::randn((1, 16, 112, 112), DType::F32, &CpuDevice)?;
/// let y = x.relu()?.clamp(0.0, 6.0)?;
/// ```
pub struct Tensor<B: Backend> {
    inner: Arc<TensorInner<B>>,
}

impl<B: Backend> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        Tensor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, device={})",
            self.inner.layout.shape(),
            self.inner.dtype,
            self.inner.device.name(),
        )
    }
}

/// Geometry of one grouped convolution slice, shared by `im2col` and the
/// output-size check in `conv2d`.
#[derive(Debug, Clone, Copy)]
struct ConvGeometry {
    channels: usize,
    h: usize,
    w: usize,
    kernel: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
    h_out: usize,
    w_out: usize,
}

impl<B: Backend> Tensor<B> {
    /// Wrap existing storage in a tensor handle.
    pub fn from_storage(storage: B::Storage, layout: Layout, dtype: DType, device: B::Device) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                storage: Arc::new(storage),
                layout,
                dtype,
                device,
            }),
        }
    }

    /// Create a view sharing the same storage but with a different layout.
    fn view_with_layout(&self, layout: Layout) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                storage: Arc::clone(&self.inner.storage),
                layout,
                dtype: self.inner.dtype,
                device: self.inner.device.clone(),
            }),
        }
    }

    /// Wrap freshly computed contiguous storage with this tensor's dtype/device.
    fn with_contiguous_storage(&self, storage: B::Storage, shape: Shape) -> Self {
        Self::from_storage(
            storage,
            Layout::contiguous(shape),
            self.inner.dtype,
            self.inner.device.clone(),
        )
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        self.inner.layout.shape()
    }

    pub fn dims(&self) -> &[usize] {
        self.inner.layout.dims()
    }

    pub fn elem_count(&self) -> usize {
        self.inner.layout.elem_count()
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn device(&self) -> &B::Device {
        &self.inner.device
    }

    pub fn is_contiguous(&self) -> bool {
        self.inner.layout.is_contiguous()
    }

    /// The underlying backend storage (may be shared with other views).
    pub fn storage(&self) -> &B::Storage {
        &self.inner.storage
    }

    /// Dimensions of a 4-D `[N, C, H, W]` tensor, or a rank error naming `what`.
    pub fn dims4(&self, what: &str) -> Result<(usize, usize, usize, usize)> {
        match *self.dims() {
            [n, c, h, w] => Ok((n, c, h, w)),
            _ => Err(Error::msg(format!(
                "{what}: expected 4D input [N,C,H,W], got shape {}",
                self.shape()
            ))),
        }
    }

    // Creation

    pub fn zeros(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::zeros(&shape, dtype, device)?;
        Ok(Self::from_storage(storage, Layout::contiguous(shape), dtype, device.clone()))
    }

    pub fn ones(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::ones(&shape, dtype, device)?;
        Ok(Self::from_storage(storage, Layout::contiguous(shape), dtype, device.clone()))
    }

    /// Create a tensor from a flat slice of f64 values, converted to `dtype`.
    pub fn from_f64_slice(
        data: &[f64],
        shape: impl Into<Shape>,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        let storage = B::from_f64_slice(data, dtype, device)?;
        Ok(Self::from_storage(storage, Layout::contiguous(shape), dtype, device.clone()))
    }

    /// Random uniform values in [0, 1).
    pub fn rand(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::rand_uniform(&shape, dtype, device)?;
        Ok(Self::from_storage(storage, Layout::contiguous(shape), dtype, device.clone()))
    }

    /// Random normal values (mean=0, std=1).
    pub fn randn(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::rand_normal(&shape, dtype, device)?;
        Ok(Self::from_storage(storage, Layout::contiguous(shape), dtype, device.clone()))
    }

    // Shape manipulation

    /// Swap two dimensions (no data copy).
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        let layout = self.inner.layout.transpose(dim0, dim1)?;
        Ok(self.view_with_layout(layout))
    }

    /// Reshape to a shape with the same element count. Non-contiguous tensors
    /// are materialized first.
    pub fn reshape(&self, new_shape: impl Into<Shape>) -> Result<Self> {
        let new_shape = new_shape.into();
        let current_count = self.elem_count();
        let new_count = new_shape.elem_count();
        if current_count != new_count {
            return Err(Error::ReshapeElementMismatch {
                src: current_count,
                dst: new_count,
                dst_shape: new_shape,
            });
        }
        let tensor = self.contiguous()?;
        Ok(tensor.view_with_layout(Layout::contiguous(new_shape)))
    }

    /// Ensure the tensor is contiguous. Cheap clone when it already is.
    pub fn contiguous(&self) -> Result<Self> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        let storage = B::to_contiguous(&self.inner.storage, &self.inner.layout)?;
        Ok(self.with_contiguous_storage(storage, self.shape().clone()))
    }

    // Element-wise operations

    /// max(0, x)
    pub fn relu(&self) -> Result<Self> {
        self.clamp(0.0, f64::INFINITY)
    }

    /// result[i] = self[i] * mul + add
    pub fn affine(&self, mul: f64, add: f64) -> Result<Self> {
        let storage = B::affine(&self.inner.storage, &self.inner.layout, mul, add)?;
        Ok(self.with_contiguous_storage(storage, self.shape().clone()))
    }

    /// result[i] = clamp(self[i], min, max)
    pub fn clamp(&self, min: f64, max: f64) -> Result<Self> {
        if min > max {
            return Err(Error::msg(format!("clamp: min {min} > max {max}")));
        }
        let storage = B::clamp(&self.inner.storage, &self.inner.layout, min, max)?;
        Ok(self.with_contiguous_storage(storage, self.shape().clone()))
    }

    // Per-channel statistics (batch normalization support)

    /// Per-channel mean and biased variance of a `[N, C, H, W]` tensor,
    /// reduced over `(N, H, W)`.
    pub fn channel_stats(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let (n, c, h, w) = self.dims4("channel_stats")?;
        let plane = h * w;
        let count = n * plane;
        if count == 0 {
            return Err(Error::msg(format!(
                "channel_stats: no elements to reduce in shape {}",
                self.shape()
            )));
        }
        let data = self.to_f64_vec()?;

        let mut mean = vec![0.0f64; c];
        for ni in 0..n {
            for (ci, m) in mean.iter_mut().enumerate() {
                let start = (ni * c + ci) * plane;
                *m += data[start..start + plane].iter().sum::<f64>();
            }
        }
        mean.iter_mut().for_each(|m| *m /= count as f64);

        let mut var = vec![0.0f64; c];
        for ni in 0..n {
            for (ci, v) in var.iter_mut().enumerate() {
                let start = (ni * c + ci) * plane;
                *v += data[start..start + plane]
                    .iter()
                    .map(|x| (x - mean[ci]) * (x - mean[ci]))
                    .sum::<f64>();
            }
        }
        var.iter_mut().for_each(|v| *v /= count as f64);

        Ok((mean, var))
    }

    /// Per-channel affine transform of a `[N, C, H, W]` tensor:
    /// `y[n, c, h, w] = x[n, c, h, w] * scale[c] + shift[c]`.
    pub fn channel_affine(&self, scale: &[f64], shift: &[f64]) -> Result<Self> {
        let (n, c, h, w) = self.dims4("channel_affine")?;
        if scale.len() != c || shift.len() != c {
            return Err(Error::msg(format!(
                "channel_affine: expected {c} scale/shift values, got {}/{}",
                scale.len(),
                shift.len()
            )));
        }
        let plane = h * w;
        let mut data = self.to_f64_vec()?;
        for ni in 0..n {
            for ci in 0..c {
                let start = (ni * c + ci) * plane;
                for x in &mut data[start..start + plane] {
                    *x = *x * scale[ci] + shift[ci];
                }
            }
        }
        Self::from_f64_slice(&data, self.shape().clone(), self.dtype(), self.device())
    }

    // 2D Convolution

    /// Grouped 2D convolution.
    ///
    /// - `self` (input): `[N, C_in, H, W]`
    /// - `weight`:       `[C_out, C_in / groups, kH, kW]`
    /// - `bias`:         optional `[C_out]`
    ///
    /// Input and output channels are split into `groups` independent slices;
    /// output slice `g` only sees input slice `g`. `groups == C_in == C_out` is
    /// a depthwise convolution. Returns `[N, C_out, H_out, W_out]` with
    /// `H_out = (H + 2*pH - kH) / sH + 1`.
    pub fn conv2d(
        &self,
        weight: &Self,
        bias: Option<&Self>,
        stride: [usize; 2],
        padding: [usize; 2],
        groups: usize,
    ) -> Result<Self> {
        let (n, c_in, h, w) = self.dims4("conv2d input")?;
        let (c_out, wc_in, kh, kw) = weight.dims4("conv2d weight")?;

        if groups == 0 {
            crate::bail!("conv2d: groups must be at least 1");
        }
        if c_in % groups != 0 || c_out % groups != 0 {
            return Err(Error::msg(format!(
                "conv2d: in_channels {c_in} and out_channels {c_out} must be divisible by groups {groups}"
            )));
        }
        let cin_g = c_in / groups;
        let cout_g = c_out / groups;
        if wc_in != cin_g {
            return Err(Error::msg(format!(
                "conv2d: weight expects {wc_in} channels per group, input provides {cin_g}"
            )));
        }
        if stride.contains(&0) {
            crate::bail!("conv2d: stride must be at least 1, got {stride:?}");
        }
        let [sh, sw] = stride;
        let [ph, pw] = padding;
        if h + 2 * ph < kh || w + 2 * pw < kw {
            return Err(Error::msg(format!(
                "conv2d: kernel [{kh}, {kw}] larger than padded input [{}, {}]",
                h + 2 * ph,
                w + 2 * pw
            )));
        }
        if let Some(b) = bias {
            if b.elem_count() != c_out {
                return Err(Error::msg(format!(
                    "conv2d: bias has {} elements, expected {c_out}",
                    b.elem_count()
                )));
            }
        }

        let geom = ConvGeometry {
            channels: cin_g,
            h,
            w,
            kernel: [kh, kw],
            stride,
            padding,
            h_out: (h + 2 * ph - kh) / sh + 1,
            w_out: (w + 2 * pw - kw) / sw + 1,
        };

        let input_data = self.to_f64_vec()?;
        let weight_data = weight.to_f64_vec()?;
        let bias_data = bias.map(|b| b.to_f64_vec()).transpose()?;

        // Per sample and group:
        //   columns = im2col(input slice)   [cin_g * kH * kW, H_out * W_out]
        //   out     = weight slice × columns [cout_g, H_out * W_out]
        let col_rows = cin_g * kh * kw;
        let col_cols = geom.h_out * geom.w_out;
        let plane = h * w;
        let mut columns = vec![0.0f64; col_rows * col_cols];
        let mut output = vec![0.0f64; n * c_out * col_cols];

        for ni in 0..n {
            for g in 0..groups {
                let in_offset = (ni * c_in + g * cin_g) * plane;
                im2col(
                    &input_data[in_offset..in_offset + cin_g * plane],
                    &geom,
                    &mut columns,
                );

                let w_offset = g * cout_g * col_rows;
                let out_offset = (ni * c_out + g * cout_g) * col_cols;
                gemm(
                    &weight_data[w_offset..w_offset + cout_g * col_rows],
                    &columns,
                    &mut output[out_offset..out_offset + cout_g * col_cols],
                    cout_g,
                    col_cols,
                    col_rows,
                );
            }

            if let Some(ref bd) = bias_data {
                for (co, b) in bd.iter().enumerate() {
                    let row_start = (ni * c_out + co) * col_cols;
                    output[row_start..row_start + col_cols]
                        .iter_mut()
                        .for_each(|v| *v += b);
                }
            }
        }

        Self::from_f64_slice(
            &output,
            (n, c_out, geom.h_out, geom.w_out),
            self.dtype(),
            self.device(),
        )
    }

    // Data extraction

    /// All elements as a flat Vec<f64>, in logical (row-major) order.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        B::to_f64_vec(&self.inner.storage, &self.inner.layout)
    }
}

/// Unroll the sliding windows of one sample's channel slice `[C, H, W]` into
/// columns `[C * kH * kW, H_out * W_out]`; out-of-bounds taps read zero.
fn im2col(input: &[f64], geom: &ConvGeometry, columns: &mut [f64]) {
    let [kh, kw] = geom.kernel;
    let [sh, sw] = geom.stride;
    let [ph, pw] = geom.padding;
    let (h, w) = (geom.h as isize, geom.w as isize);
    let col_cols = geom.h_out * geom.w_out;

    for ci in 0..geom.channels {
        for ki in 0..kh {
            for kj in 0..kw {
                let row_offset = ((ci * kh + ki) * kw + kj) * col_cols;
                for oh in 0..geom.h_out {
                    let ih = (oh * sh + ki) as isize - ph as isize;
                    for ow in 0..geom.w_out {
                        let iw = (ow * sw + kj) as isize - pw as isize;
                        columns[row_offset + oh * geom.w_out + ow] =
                            if ih >= 0 && ih < h && iw >= 0 && iw < w {
                                input[(ci * geom.h + ih as usize) * geom.w + iw as usize]
                            } else {
                                0.0
                            };
                    }
                }
            }
        }
    }
}

/// C += A × B with A: [m, k], B: [k, n], C: [m, n], all row-major.
fn gemm(a: &[f64], b: &[f64], c: &mut [f64], m: usize, n: usize, k: usize) {
    for i in 0..m {
        let a_row = i * k;
        let c_row = i * n;
        for p in 0..k {
            let a_val = a[a_row + p];
            let b_row = p * n;
            for j in 0..n {
                c[c_row + j] += a_val * b[b_row + j];
            }
        }
    }
}
