// Channel shuffle — interleave channels across convolution groups
//
// With grouped pointwise convolutions each group only ever sees its own slice
// of channels. Shuffling between the expansion and depthwise stages mixes
// them again:
//
//   [n, c, h, w] → [n, g, c/g, h, w] → transpose(1, 2) → [n, c, h, w]
//
// For c = 6, g = 2 the channel order becomes 0 3 1 4 2 5.

use mbnas_core::{bail, Backend, Result, Tensor};
use mbnas_nn::Module;
use tracing::trace;

/// Output-to-input channel map of a shuffle: `out[i] = in[perm[i]]`.
pub fn channel_permutation(channels: usize, groups: usize) -> Result<Vec<usize>> {
    if groups == 0 || channels % groups != 0 {
        bail!("channel shuffle: {channels} channels cannot be split into {groups} groups");
    }
    let per_group = channels / groups;
    Ok((0..channels)
        .map(|i| (i % groups) * per_group + i / groups)
        .collect())
}

/// Parameter-free channel shuffle over `groups` groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleBlock {
    groups: usize,
}

impl ShuffleBlock {
    pub fn new(groups: usize) -> Self {
        ShuffleBlock { groups }
    }

    pub fn groups(&self) -> usize {
        self.groups
    }
}

impl<B: Backend> Module<B> for ShuffleBlock {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        let (n, c, h, w) = x.dims4("ShuffleBlock")?;
        let g = self.groups;
        if g == 0 || c % g != 0 {
            bail!("ShuffleBlock: {c} channels cannot be split into {g} groups");
        }
        x.reshape((n, g, c / g, h, w))?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((n, c, h, w))
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}

/// The shuffle slot of a MobileBlock: a real shuffle only when the pointwise
/// convolutions are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleStage {
    NoOp,
    Shuffle(ShuffleBlock),
}

impl ShuffleStage {
    pub fn for_groups(groups: usize) -> Self {
        let stage = if groups > 1 {
            ShuffleStage::Shuffle(ShuffleBlock::new(groups))
        } else {
            ShuffleStage::NoOp
        };
        trace!(groups, ?stage, "selected shuffle stage");
        stage
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, ShuffleStage::NoOp)
    }
}

impl<B: Backend> Module<B> for ShuffleStage {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        match self {
            ShuffleStage::NoOp => Ok(x.clone()),
            ShuffleStage::Shuffle(block) => block.forward(x),
        }
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![]
    }
}
