// BlockFactory — a named family of blocks with shapes bound late
//
// A search space lists candidate operations by name ("K3E6G1Block",
// "SkipBlock", ...) and only later, when a candidate is placed at a position
// in the network, supplies the resolution, channel counts and stride. The
// factory holds the name-derived hyperparameters until then.

use mbnas_core::Backend;

use super::mobile::MobileBlock;
use super::registry::BlockFactoryRegistry;
use super::skip::SkipBlock;
use super::spec::BlockSpec;
use super::Block;
use crate::config::BlockConfig;
use crate::error::Result;

/// Hyperparameters a factory name carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryKind {
    Mobile {
        kernel: usize,
        expansion: usize,
        groups: usize,
    },
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockFactory {
    block_name: String,
    kind: FactoryKind,
}

impl BlockFactory {
    /// Resolve `block_name` through the process-wide registry.
    ///
    /// ```ignore
    /// let factory = BlockFactory::factory("K3E10G2Block")?;
    /// let block = factory.build::<CpuBackend>(112, 16, 32, 1, &config, &CpuDevice)?;
    /// assert_eq!(block.block_id().as_deref(), Some("w112_i16_o32_s1_e10_k3_g2"));
    /// ```
    pub fn factory(block_name: &str) -> Result<Self> {
        BlockFactoryRegistry::global()?.resolve(block_name)
    }

    /// A factory with an explicit name, used by registry rules.
    pub fn new(block_name: impl Into<String>, kind: FactoryKind) -> Self {
        BlockFactory {
            block_name: block_name.into(),
            kind,
        }
    }

    /// Mobile factory under its canonical name, e.g. `K3E6G1Block`.
    pub fn mobile(kernel: usize, expansion: usize, groups: usize) -> Self {
        Self::new(
            format!("K{kernel}E{expansion}G{groups}Block"),
            FactoryKind::Mobile {
                kernel,
                expansion,
                groups,
            },
        )
    }

    pub fn skip() -> Self {
        Self::new("SkipBlock", FactoryKind::Skip)
    }

    /// The name this factory was resolved from.
    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    pub fn kind(&self) -> FactoryKind {
        self.kind
    }

    pub fn is_skip(&self) -> bool {
        self.kind == FactoryKind::Skip
    }

    /// The [`BlockSpec`] this factory would build at the given position. `None` for
    /// skip factories, which have no spec.
    pub fn spec(
        &self,
        input_size: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
    ) -> Option<BlockSpec> {
        match self.kind {
            FactoryKind::Mobile {
                kernel,
                expansion,
                groups,
            } => Some(BlockSpec::new(
                input_size,
                in_channels,
                out_channels,
                stride,
                expansion,
                kernel,
                groups,
            )),
            FactoryKind::Skip => None,
        }
    }

    /// Instantiate a block for the given position.
    pub fn build<B: Backend>(
        &self,
        input_size: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        config: &BlockConfig,
        device: &B::Device,
    ) -> Result<Block<B>> {
        match self.spec(input_size, in_channels, out_channels, stride) {
            Some(spec) => Ok(Block::Mobile(MobileBlock::new(spec, config, device)?)),
            None => Ok(Block::Skip(SkipBlock::new(
                input_size,
                in_channels,
                out_channels,
                stride,
                config,
                device,
            )?)),
        }
    }
}
