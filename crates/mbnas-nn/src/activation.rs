// Activation modules — thin wrappers that turn tensor ops into Modules so
// they can sit inside a Sequential.

use mbnas_core::backend::Backend;
use mbnas_core::error::Result;
use mbnas_core::tensor::Tensor;

use crate::module::Module;

/// ReLU activation: max(0, x)
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl<B: Backend> Module<B> for ReLU {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        x.relu()
    }
    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}

/// ReLU6 activation: min(max(0, x), 6)
///
/// The bounded nonlinearity used by MobileNetV2-style blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU6;

impl ReLU6 {
    pub const UPPER: f64 = 6.0;
}

impl<B: Backend> Module<B> for ReLU6 {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        x.clamp(0.0, Self::UPPER)
    }
    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}

/// Pass-through module: returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<B: Backend> Module<B> for Identity {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        Ok(x.clone())
    }
    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}
