use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::BlockId;
use crate::error::Error;

/// Hyperparameters of one MobileNet-style inverted residual block.
///
/// `input_size` is descriptive: it is carried in the block id so a search
/// space can tell blocks at different resolutions apart, but it never
/// constrains the tensors a block accepts.
///
/// `groups` has to divide `in_channels`, `inner_channels()` and
/// `out_channels`. That is checked when the convolutions are built, not here,
/// so any spec (even a degenerate one) round-trips through its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockSpec {
    input_size: usize,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    expansion: usize,
    kernel: usize,
    groups: usize,
}

impl BlockSpec {
    pub fn new(
        input_size: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expansion: usize,
        kernel: usize,
        groups: usize,
    ) -> Self {
        BlockSpec {
            input_size,
            in_channels,
            out_channels,
            stride,
            expansion,
            kernel,
            groups,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn expansion(&self) -> usize {
        self.expansion
    }

    pub fn kernel(&self) -> usize {
        self.kernel
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Channel count between the expansion and projection stages.
    ///
    /// `None` if `in_channels * expansion` does not fit in a `usize`; ids
    /// decode any digit run, so this can happen for a well-formed id.
    pub fn inner_channels(&self) -> Option<usize> {
        self.in_channels.checked_mul(self.expansion)
    }

    /// Zero padding of the depthwise convolution ("same" for odd kernels).
    pub fn padding(&self) -> usize {
        self.kernel / 2
    }

    /// Spatial size after the depthwise stage for an `input_size` input.
    ///
    /// `None` if the stride is zero or the kernel does not fit the padded input.
    pub fn output_size(&self) -> Option<usize> {
        if self.stride == 0 {
            return None;
        }
        let padded = self.input_size.checked_add(self.padding().checked_mul(2)?)?;
        let span = padded.checked_sub(self.kernel)?;
        Some(span / self.stride + 1)
    }

    /// Canonical block id, see [`BlockId`].
    pub fn block_id(&self) -> String {
        BlockId::encode(self)
    }
}

impl fmt::Display for BlockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BlockId::encode(self))
    }
}

impl FromStr for BlockSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockId::decode(s)
    }
}
