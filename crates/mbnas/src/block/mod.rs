// Block core: specs, ids, the block implementations and the factories that
// create them from names.
//
//   spec      — BlockSpec, the hyperparameters of a mobile block
//   id        — BlockId, the canonical text form of a spec
//   shuffle   — ShuffleBlock / ShuffleStage channel shuffle
//   mobile    — MobileBlock, the inverted residual block
//   skip      — SkipBlock, identity or projection shortcut
//   factory   — BlockFactory, a named family with shapes bound late
//   registry  — BlockFactoryRegistry, factory names to factories

pub mod factory;
pub mod id;
pub mod mobile;
pub mod registry;
pub mod shuffle;
pub mod skip;
pub mod spec;
mod stage;

pub use factory::{BlockFactory, FactoryKind};
pub use id::{BlockId, IdMatch};
pub use mobile::MobileBlock;
pub use registry::{BlockFactoryRegistry, FactoryCtor};
pub use shuffle::{channel_permutation, ShuffleBlock, ShuffleStage};
pub use skip::SkipBlock;
pub use spec::BlockSpec;

use mbnas_core::{Backend, Tensor};
use mbnas_nn::Module;

/// Any block a factory can produce.
pub enum Block<B: Backend> {
    Mobile(MobileBlock<B>),
    Skip(SkipBlock<B>),
}

impl<B: Backend> Block<B> {
    pub fn is_skip(&self) -> bool {
        matches!(self, Block::Skip(_))
    }

    pub fn as_mobile(&self) -> Option<&MobileBlock<B>> {
        match self {
            Block::Mobile(b) => Some(b),
            Block::Skip(_) => None,
        }
    }

    pub fn as_skip(&self) -> Option<&SkipBlock<B>> {
        match self {
            Block::Skip(b) => Some(b),
            Block::Mobile(_) => None,
        }
    }

    /// Canonical id of a mobile block. Skip blocks have none.
    pub fn block_id(&self) -> Option<String> {
        self.as_mobile().map(MobileBlock::block_id)
    }

    pub fn in_channels(&self) -> usize {
        match self {
            Block::Mobile(b) => b.in_channels(),
            Block::Skip(b) => b.in_channels(),
        }
    }

    pub fn out_channels(&self) -> usize {
        match self {
            Block::Mobile(b) => b.out_channels(),
            Block::Skip(b) => b.out_channels(),
        }
    }

    pub fn stride(&self) -> usize {
        match self {
            Block::Mobile(b) => b.stride(),
            Block::Skip(b) => b.stride(),
        }
    }
}

impl<B: Backend> Module<B> for Block<B> {
    fn forward(&self, x: &Tensor<B>) -> mbnas_core::Result<Tensor<B>> {
        match self {
            Block::Mobile(b) => b.forward(x),
            Block::Skip(b) => b.forward(x),
        }
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        match self {
            Block::Mobile(b) => b.parameters(),
            Block::Skip(b) => b.parameters(),
        }
    }

    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        match self {
            Block::Mobile(b) => b.named_parameters(),
            Block::Skip(b) => b.named_parameters(),
        }
    }

    fn set_training(&self, training: bool) {
        match self {
            Block::Mobile(b) => b.set_training(training),
            Block::Skip(b) => b.set_training(training),
        }
    }

    fn is_training(&self) -> bool {
        match self {
            Block::Mobile(b) => b.is_training(),
            Block::Skip(b) => b.is_training(),
        }
    }
}
