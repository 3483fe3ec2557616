// BatchNorm2d — 2D Batch Normalization
//
// FORMULA (training mode):
//   x_hat = (x - mean_batch) / sqrt(var_batch + ε)
//   y = γ * x_hat + β
//
// mean_batch and var_batch are computed per channel over (N, H, W).
// Running statistics are exponential moving averages updated in training
// mode and used instead of batch statistics in eval mode:
//   running = (1 - momentum) * running + momentum * batch
//
// Both modes collapse into one per-channel affine transform:
//   scale[c] = γ[c] / sqrt(var[c] + ε)
//   shift[c] = β[c] - mean[c] * scale[c]

use std::cell::{Cell, RefCell};

use mbnas_core::backend::Backend;
use mbnas_core::dtype::DType;
use mbnas_core::error::{Error, Result};
use mbnas_core::shape::Shape;
use mbnas_core::tensor::Tensor;

use crate::module::Module;

/// 2D Batch Normalization layer keyed by channel count.
///
/// # Examples
/// ```ignore
/// let bn = BatchNorm2d::<CpuBackend>::new(160, 1e-5, 0.1, DType::F32, &dev)?;
/// let y = bn.forward(&x)?; // same shape as x
/// ```
pub struct BatchNorm2d<B: Backend> {
    /// Learnable scale (gamma): [C]
    weight: Tensor<B>,
    /// Learnable shift (beta): [C]
    bias: Tensor<B>,
    running_mean: RefCell<Vec<f64>>,
    running_var: RefCell<Vec<f64>>,
    num_features: usize,
    eps: f64,
    momentum: f64,
    training: Cell<bool>,
}

impl<B: Backend> BatchNorm2d<B> {
    /// Create a new BatchNorm2d layer with γ = 1, β = 0, running mean 0 and
    /// running variance 1.
    pub fn new(
        num_features: usize,
        eps: f64,
        momentum: f64,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        if eps.is_nan() || eps <= 0.0 {
            return Err(Error::msg(format!("BatchNorm2d: eps must be > 0, got {eps}")));
        }
        if !(0.0..=1.0).contains(&momentum) {
            return Err(Error::msg(format!(
                "BatchNorm2d: momentum must be in [0, 1], got {momentum}"
            )));
        }
        let weight = Tensor::<B>::ones(Shape::new(vec![num_features]), dtype, device)?;
        let bias = Tensor::<B>::zeros(Shape::new(vec![num_features]), dtype, device)?;

        Ok(BatchNorm2d {
            weight,
            bias,
            running_mean: RefCell::new(vec![0.0; num_features]),
            running_var: RefCell::new(vec![1.0; num_features]),
            num_features,
            eps,
            momentum,
            training: Cell::new(true),
        })
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn weight(&self) -> &Tensor<B> {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor<B> {
        &self.bias
    }

    /// Snapshot of the running mean.
    pub fn running_mean(&self) -> Vec<f64> {
        self.running_mean.borrow().clone()
    }

    /// Snapshot of the running variance.
    pub fn running_var(&self) -> Vec<f64> {
        self.running_var.borrow().clone()
    }

    fn apply_norm(&self, x: &Tensor<B>, mean: &[f64], var: &[f64]) -> Result<Tensor<B>> {
        let gamma = self.weight.to_f64_vec()?;
        let beta = self.bias.to_f64_vec()?;
        let scale: Vec<f64> = gamma
            .iter()
            .zip(var)
            .map(|(g, v)| g / (v + self.eps).sqrt())
            .collect();
        let shift: Vec<f64> = beta
            .iter()
            .zip(mean.iter().zip(&scale))
            .map(|(b, (m, s))| b - m * s)
            .collect();
        x.channel_affine(&scale, &shift)
    }
}

impl<B: Backend> Module<B> for BatchNorm2d<B> {
    /// Training: normalize with batch statistics and update running stats.
    /// Eval: normalize with running statistics.
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        let (_, c, _, _) = x.dims4("BatchNorm2d")?;
        if c != self.num_features {
            return Err(Error::msg(format!(
                "BatchNorm2d: expected {} channels, got {}",
                self.num_features, c
            )));
        }

        if self.training.get() {
            let (mean, var) = x.channel_stats()?;
            {
                let mut rm = self.running_mean.borrow_mut();
                let mut rv = self.running_var.borrow_mut();
                for ci in 0..c {
                    rm[ci] = (1.0 - self.momentum) * rm[ci] + self.momentum * mean[ci];
                    rv[ci] = (1.0 - self.momentum) * rv[ci] + self.momentum * var[ci];
                }
            }
            self.apply_norm(x, &mean, &var)
        } else {
            let rm = self.running_mean.borrow();
            let rv = self.running_var.borrow();
            self.apply_norm(x, &rm, &rv)
        }
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        vec![
            ("weight".to_string(), self.weight.clone()),
            ("bias".to_string(), self.bias.clone()),
        ]
    }

    fn set_training(&self, training: bool) {
        self.training.set(training);
    }

    fn is_training(&self) -> bool {
        self.training.get()
    }
}
