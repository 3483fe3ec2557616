//! # mbnas
//!
//! MobileNet-style building blocks for neural architecture search.
//!
//! A search space names its candidate operations with short strings, and
//! each concrete block placed in a network carries a canonical id:
//!
//! ```rust
//! use mbnas::prelude::*;
//!
//! # fn main() -> mbnas::Result<()> {
//! let factory = BlockFactory::factory("K3E10G2Block")?;
//! let block = factory.build::<CpuBackend>(112, 16, 32, 1, &BlockConfig::default(), &CpuDevice)?;
//! assert_eq!(block.block_id().as_deref(), Some("w112_i16_o32_s1_e10_k3_g2"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `mbnas-core` | Tensor, Shape, DType, Layout, Backend trait |
//! | `mbnas-cpu` | CPU backend |
//! | `mbnas-nn` | Layers (Conv2d, BatchNorm2d, ReLU6, Sequential) |
//! | `mbnas` | Block specs and ids, MobileBlock, SkipBlock, factories |
//!
//! ## Modules
//!
//! - [`block`] — specs, id codec, blocks, factories and the name registry
//! - [`config`] — numeric options applied when blocks are built
//! - [`error`] — parse and runtime errors

/// Re-export core types.
pub use mbnas_core::{
    backend::{Backend, BackendDevice, BackendStorage},
    DType, Layout, Shape, Tensor,
};

/// Re-export CPU backend.
pub use mbnas_cpu::{CpuBackend, CpuDevice, CpuStorage, CpuTensor};

/// Re-export layers.
pub mod nn {
    pub use mbnas_nn::*;
}

/// Block specs, ids, blocks and factories.
pub mod block;

/// Block construction options.
pub mod config;

/// Error type of the block core.
pub mod error;

pub use error::{Error, Result};

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::block::{
        channel_permutation, Block, BlockFactory, BlockFactoryRegistry, BlockId, BlockSpec,
        FactoryKind, IdMatch, MobileBlock, ShuffleBlock, ShuffleStage, SkipBlock,
    };
    pub use crate::config::{Activation, BlockConfig};
    pub use crate::nn::{BatchNorm2d, Conv2d, Identity, Module, ReLU, ReLU6, Sequential};
    pub use crate::{CpuBackend, CpuDevice, CpuTensor, DType, Shape, Tensor};
    pub use crate::{Error, Result};
}
