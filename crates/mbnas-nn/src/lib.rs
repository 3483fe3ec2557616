//! # mbnas-nn
//!
//! Layers for the mbnas block runtime, following the [`Module`] trait
//! pattern (similar to PyTorch's `nn.Module`):
//!
//! 1. **Module trait** — every layer implements `forward()`
//! 2. **Conv2d** — grouped 2D convolution (pointwise, depthwise, dense)
//! 3. **BatchNorm2d** — per-channel normalization with running statistics
//! 4. **Activations** — ReLU, ReLU6, Identity
//! 5. **Sequential** — ordered container of boxed modules
//!
//! Modules are generic over `Backend`, so the same block definition works
//! on any backend implementing the trait.

pub mod activation;
pub mod batchnorm;
pub mod conv;
pub mod module;
pub mod sequential;

pub use activation::{Identity, ReLU, ReLU6};
pub use batchnorm::BatchNorm2d;
pub use conv::Conv2d;
pub use module::Module;
pub use sequential::Sequential;
