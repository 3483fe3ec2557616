//! # mbnas-cpu
//!
//! Host backend for the mbnas tensor runtime.
//!
//! `CpuStorage` is an enum over `Vec<f32>` / `Vec<f64>`. Every op walks the
//! input through its layout's strided indices, so transposed views (the
//! channel-shuffle case) are handled without special paths.
//!
//! ```ignore
//! let x = CpuTensor::randn((1, 16, 112, 112), DType::F32, &CpuDevice)?;
//! ```

use rand::Rng;

use mbnas_core::backend::{Backend, BackendDevice, BackendStorage};
use mbnas_core::dtype::DType;
use mbnas_core::error::{Error, Result};
use mbnas_core::layout::Layout;
use mbnas_core::shape::Shape;
use mbnas_core::tensor::Tensor;

/// The host device. There is only one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuDevice;

impl BackendDevice for CpuDevice {
    fn name(&self) -> String {
        "cpu".to_string()
    }
}

/// Host storage, one variant per supported dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl CpuStorage {
    fn from_f64_iter(dtype: DType, values: impl Iterator<Item = f64>) -> Self {
        match dtype {
            DType::F32 => CpuStorage::F32(values.map(|v| v as f32).collect()),
            DType::F64 => CpuStorage::F64(values.collect()),
        }
    }

    fn filled(shape: &Shape, val: f64, dtype: DType) -> Self {
        let n = shape.elem_count();
        match dtype {
            DType::F32 => CpuStorage::F32(vec![val as f32; n]),
            DType::F64 => CpuStorage::F64(vec![val; n]),
        }
    }

    fn get_f64(&self, idx: usize) -> f64 {
        match self {
            CpuStorage::F32(v) => v[idx] as f64,
            CpuStorage::F64(v) => v[idx],
        }
    }

    /// Apply `f` to every element addressed by `layout`, in logical order,
    /// producing contiguous storage of the same dtype.
    fn map_strided(&self, layout: &Layout, f: impl Fn(f64) -> f64) -> Result<Self> {
        let max_idx = layout.strided_indices().max();
        if let Some(max_idx) = max_idx {
            if max_idx >= self.elem_count() {
                return Err(Error::msg(format!(
                    "layout addresses element {max_idx} of storage with {} elements",
                    self.elem_count()
                )));
            }
        }
        let values = layout.strided_indices().map(|i| f(self.get_f64(i)));
        Ok(Self::from_f64_iter(self.dtype(), values))
    }
}

impl BackendStorage for CpuStorage {
    fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F64(_) => DType::F64,
        }
    }

    fn elem_count(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F64(v) => v.len(),
        }
    }
}

/// CPU implementation of [`Backend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

/// Convenience alias: `CpuTensor::zeros(...)`.
pub type CpuTensor = Tensor<CpuBackend>;

impl Backend for CpuBackend {
    type Device = CpuDevice;
    type Storage = CpuStorage;

    fn zeros(shape: &Shape, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage::filled(shape, 0.0, dtype))
    }

    fn ones(shape: &Shape, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage::filled(shape, 1.0, dtype))
    }

    fn from_f64_slice(data: &[f64], dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage::from_f64_iter(dtype, data.iter().copied()))
    }

    fn rand_uniform(shape: &Shape, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        let mut rng = rand::thread_rng();
        let values = (0..shape.elem_count()).map(|_| rng.gen::<f64>());
        Ok(CpuStorage::from_f64_iter(dtype, values))
    }

    fn rand_normal(shape: &Shape, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        // Box-Muller: two uniforms → one standard normal sample.
        let mut rng = rand::thread_rng();
        let values = (0..shape.elem_count()).map(|_| {
            let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
            let u2: f64 = rng.gen();
            (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
        });
        Ok(CpuStorage::from_f64_iter(dtype, values))
    }

    fn affine(input: &CpuStorage, layout: &Layout, mul: f64, add: f64) -> Result<CpuStorage> {
        input.map_strided(layout, |x| x * mul + add)
    }

    fn clamp(input: &CpuStorage, layout: &Layout, min: f64, max: f64) -> Result<CpuStorage> {
        input.map_strided(layout, |x| x.clamp(min, max))
    }

    fn to_contiguous(input: &CpuStorage, layout: &Layout) -> Result<CpuStorage> {
        input.map_strided(layout, |x| x)
    }

    fn to_f64_vec(input: &CpuStorage, layout: &Layout) -> Result<Vec<f64>> {
        match input.map_strided(layout, |x| x)? {
            CpuStorage::F64(v) => Ok(v),
            CpuStorage::F32(v) => Ok(v.into_iter().map(|x| x as f64).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_approx(got: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(got.len(), expected.len(), "length mismatch");
        for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
            assert!((g - e).abs() < tol, "index {i}: got {g} expected {e}");
        }
    }

    #[test]
    fn test_debug_shows_device() -> Result<()> {
        assert_eq!(CpuDevice.name(), "cpu");
        let x = CpuTensor::zeros((2, 3), DType::F32, &CpuDevice)?;
        assert_eq!(format!("{x:?}"), "Tensor(shape=[2, 3], dtype=f32, device=cpu)");
        Ok(())
    }

    #[test]
    fn test_creation_and_dtype() -> Result<()> {
        let z = CpuTensor::zeros((2, 3), DType::F32, &CpuDevice)?;
        assert_eq!(z.dtype(), DType::F32);
        assert_eq!(z.storage().dtype(), DType::F32);
        assert_eq!(z.to_f64_vec()?, vec![0.0; 6]);

        let o = CpuTensor::ones((4,), DType::F64, &CpuDevice)?;
        assert_eq!(o.to_f64_vec()?, vec![1.0; 4]);
        Ok(())
    }

    #[test]
    fn test_from_slice_count_mismatch() {
        let r = CpuTensor::from_f64_slice(&[1.0, 2.0], (3,), DType::F64, &CpuDevice);
        assert!(matches!(r, Err(Error::ElementCountMismatch { .. })));
    }

    #[test]
    fn test_rand_ranges() -> Result<()> {
        let u = CpuTensor::rand((64,), DType::F64, &CpuDevice)?;
        assert!(u.to_f64_vec()?.iter().all(|&x| (0.0..1.0).contains(&x)));
        let n = CpuTensor::randn((64,), DType::F32, &CpuDevice)?;
        assert!(n.to_f64_vec()?.iter().all(|x| x.is_finite()));
        Ok(())
    }

    #[test]
    fn test_relu_is_open_clamp() -> Result<()> {
        let x = CpuTensor::from_f64_slice(&[-4.0, 0.0, 9.0, 1e9], (4,), DType::F64, &CpuDevice)?;
        assert_eq!(x.relu()?.to_f64_vec()?, vec![0.0, 0.0, 9.0, 1e9]);
        Ok(())
    }

    #[test]
    fn test_affine_and_clamp() -> Result<()> {
        let x = CpuTensor::from_f64_slice(&[-1.0, 2.0, 7.0], (3,), DType::F64, &CpuDevice)?;
        assert_eq!(x.affine(2.0, 1.0)?.to_f64_vec()?, vec![-1.0, 5.0, 15.0]);
        assert_eq!(x.clamp(0.0, 6.0)?.to_f64_vec()?, vec![0.0, 2.0, 6.0]);
        assert!(x.clamp(1.0, 0.0).is_err());
        Ok(())
    }

    #[test]
    fn test_transpose_then_contiguous() -> Result<()> {
        let x = CpuTensor::from_f64_slice(
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            (2, 3),
            DType::F64,
            &CpuDevice,
        )?;
        let t = x.transpose(0, 1)?;
        assert!(!t.is_contiguous());
        let c = t.contiguous()?;
        assert!(c.is_contiguous());
        assert_eq!(c.dims(), &[3, 2]);
        assert_eq!(c.to_f64_vec()?, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        Ok(())
    }

    #[test]
    fn test_reshape_mismatch() -> Result<()> {
        let x = CpuTensor::zeros((2, 3), DType::F32, &CpuDevice)?;
        assert!(matches!(
            x.reshape((4, 2)),
            Err(Error::ReshapeElementMismatch { .. })
        ));
        assert_eq!(x.reshape((3, 2))?.dims(), &[3, 2]);
        Ok(())
    }

    #[test]
    fn test_conv2d_identity_kernel() -> Result<()> {
        // 1x1 conv with weight 2.0 doubles the input.
        let x = CpuTensor::from_f64_slice(&[1.0, 2.0, 3.0, 4.0], (1, 1, 2, 2), DType::F64, &CpuDevice)?;
        let w = CpuTensor::from_f64_slice(&[2.0], (1, 1, 1, 1), DType::F64, &CpuDevice)?;
        let y = x.conv2d(&w, None, [1, 1], [0, 0], 1)?;
        assert_eq!(y.dims(), &[1, 1, 2, 2]);
        assert_vec_approx(&y.to_f64_vec()?, &[2.0, 4.0, 6.0, 8.0], 1e-12);
        Ok(())
    }

    #[test]
    fn test_conv2d_grouped_isolates_groups() -> Result<()> {
        // Two groups of one channel each: output channel g only sees input channel g.
        let x = CpuTensor::from_f64_slice(&[1.0, 10.0], (1, 2, 1, 1), DType::F64, &CpuDevice)?;
        let w = CpuTensor::from_f64_slice(&[3.0, 5.0], (2, 1, 1, 1), DType::F64, &CpuDevice)?;
        let b = CpuTensor::from_f64_slice(&[0.5, -0.5], (2,), DType::F64, &CpuDevice)?;
        let y = x.conv2d(&w, Some(&b), [1, 1], [0, 0], 2)?;
        assert_vec_approx(&y.to_f64_vec()?, &[3.5, 49.5], 1e-12);
        Ok(())
    }

    #[test]
    fn test_conv2d_depthwise_stride_padding() -> Result<()> {
        // 3x3 all-ones depthwise kernel, padding 1, stride 2 on a 4x4 plane of ones.
        let x = CpuTensor::ones((1, 2, 4, 4), DType::F64, &CpuDevice)?;
        let w = CpuTensor::ones((2, 1, 3, 3), DType::F64, &CpuDevice)?;
        let y = x.conv2d(&w, None, [2, 2], [1, 1], 2)?;
        assert_eq!(y.dims(), &[1, 2, 2, 2]);
        // Top-left window is clipped to 2x2 ones, the others see 3x3.
        assert_vec_approx(
            &y.to_f64_vec()?,
            &[4.0, 6.0, 6.0, 9.0, 4.0, 6.0, 6.0, 9.0],
            1e-12,
        );
        Ok(())
    }

    #[test]
    fn test_conv2d_rejects_indivisible_groups() -> Result<()> {
        let x = CpuTensor::zeros((1, 3, 4, 4), DType::F32, &CpuDevice)?;
        let w = CpuTensor::zeros((4, 1, 1, 1), DType::F32, &CpuDevice)?;
        assert!(x.conv2d(&w, None, [1, 1], [0, 0], 2).is_err());
        assert!(x.conv2d(&w, None, [1, 1], [0, 0], 0).is_err());
        Ok(())
    }

    #[test]
    fn test_channel_stats_and_affine() -> Result<()> {
        // Channel 0: [1, 3], channel 1: [10, 10]
        let x = CpuTensor::from_f64_slice(&[1.0, 3.0, 10.0, 10.0], (1, 2, 1, 2), DType::F64, &CpuDevice)?;
        let (mean, var) = x.channel_stats()?;
        assert_vec_approx(&mean, &[2.0, 10.0], 1e-12);
        assert_vec_approx(&var, &[1.0, 0.0], 1e-12);

        let y = x.channel_affine(&[2.0, 0.0], &[0.0, 1.0])?;
        assert_vec_approx(&y.to_f64_vec()?, &[2.0, 6.0, 1.0, 1.0], 1e-12);
        assert!(x.channel_affine(&[1.0], &[0.0]).is_err());
        Ok(())
    }
}
