// MobileBlock — inverted residual block with optional channel shuffle
//
//   expand:    Conv2d(in → in·e, 1x1, groups) → BN → act
//   shuffle:   ShuffleBlock(groups) if groups > 1, otherwise a no-op
//   depthwise: Conv2d(in·e → in·e, k×k, stride, groups = in·e) → BN → act
//   project:   Conv2d(in·e → out, 1x1, groups) → BN
//
// The projection has no activation (linear bottleneck). There is no residual
// add inside the block; a search space that wants one pairs the block with a
// SkipBlock.

use mbnas_core::{Backend, Tensor};
use mbnas_nn::{Module, Sequential};
use tracing::debug;

use super::id::BlockId;
use super::shuffle::ShuffleStage;
use super::spec::BlockSpec;
use super::stage;
use crate::config::BlockConfig;
use crate::error::Result;

/// A MobileNetV2-style block built from a [`BlockSpec`].
pub struct MobileBlock<B: Backend> {
    spec: BlockSpec,
    expand: Sequential<B>,
    shuffle: ShuffleStage,
    depthwise: Sequential<B>,
    project: Sequential<B>,
}

impl<B: Backend> MobileBlock<B> {
    /// Build the four stages for `spec`.
    ///
    /// Fails if `groups` does not divide the input, inner and output channel
    /// counts, if stride or kernel are zero, or if the inner channel count
    /// overflows.
    pub fn new(spec: BlockSpec, config: &BlockConfig, device: &B::Device) -> Result<Self> {
        let inner = spec.inner_channels().ok_or_else(|| {
            mbnas_core::Error::msg(format!(
                "{spec}: in_channels * expansion overflows usize"
            ))
        })?;
        debug!(
            block_id = %spec,
            inner_channels = inner,
            activation = config.activation.name(),
            "building mobile block"
        );
        let expand = stage::conv_bn_act(
            spec.in_channels(),
            inner,
            1,
            1,
            spec.groups(),
            config,
            device,
        )?;
        let shuffle = ShuffleStage::for_groups(spec.groups());
        let depthwise = stage::conv_bn_act(
            inner,
            inner,
            spec.kernel(),
            spec.stride(),
            inner,
            config,
            device,
        )?;
        let project = stage::conv_bn(
            inner,
            spec.out_channels(),
            1,
            1,
            spec.groups(),
            config,
            device,
        )?;
        Ok(MobileBlock {
            spec,
            expand,
            shuffle,
            depthwise,
            project,
        })
    }

    /// Decode `block_id` and build the block it describes.
    ///
    /// Matching follows `config.id_match` (exact unless configured otherwise).
    pub fn factory(block_id: &str, config: &BlockConfig, device: &B::Device) -> Result<Self> {
        let spec = BlockId::decode_with(block_id, config.id_match)?;
        Self::new(spec, config, device)
    }

    /// Canonical id of this block.
    pub fn block_id(&self) -> String {
        BlockId::encode(&self.spec)
    }

    pub fn spec(&self) -> &BlockSpec {
        &self.spec
    }

    pub fn input_size(&self) -> usize {
        self.spec.input_size()
    }

    pub fn in_channels(&self) -> usize {
        self.spec.in_channels()
    }

    pub fn out_channels(&self) -> usize {
        self.spec.out_channels()
    }

    pub fn stride(&self) -> usize {
        self.spec.stride()
    }

    pub fn expansion(&self) -> usize {
        self.spec.expansion()
    }

    pub fn kernel(&self) -> usize {
        self.spec.kernel()
    }

    pub fn groups(&self) -> usize {
        self.spec.groups()
    }

    pub fn shuffle(&self) -> &ShuffleStage {
        &self.shuffle
    }

    pub fn has_shuffle(&self) -> bool {
        !self.shuffle.is_noop()
    }

    fn stages(&self) -> [(&'static str, &Sequential<B>); 3] {
        [
            ("expand", &self.expand),
            ("depthwise", &self.depthwise),
            ("project", &self.project),
        ]
    }
}

impl<B: Backend> Module<B> for MobileBlock<B> {
    fn forward(&self, x: &Tensor<B>) -> mbnas_core::Result<Tensor<B>> {
        let h = self.expand.forward(x)?;
        let h = self.shuffle.forward(&h)?;
        let h = self.depthwise.forward(&h)?;
        self.project.forward(&h)
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        self.stages()
            .into_iter()
            .flat_map(|(_, s)| s.parameters())
            .collect()
    }

    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        let mut named = Vec::new();
        for (stage, seq) in self.stages() {
            for (k, v) in seq.named_parameters() {
                named.push((format!("{stage}.{k}"), v));
            }
        }
        named
    }

    fn set_training(&self, training: bool) {
        for (_, seq) in self.stages() {
            seq.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.stages().iter().all(|(_, s)| s.is_training())
    }
}
