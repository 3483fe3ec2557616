// SkipBlock — the "no block" choice of a search space
//
// When shapes allow it the block is a pure identity. When the channel count
// or resolution changes, an identity is impossible, so the shortcut becomes
// a strided 1x1 projection:
//
//   Conv2d(in → out, 1x1, stride) → BN

use mbnas_core::{Backend, Tensor};
use mbnas_nn::{Identity, Module, Sequential};
use tracing::debug;

use super::stage;
use crate::config::BlockConfig;
use crate::error::Result;

pub struct SkipBlock<B: Backend> {
    input_size: usize,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    shortcut: Option<Sequential<B>>,
}

impl<B: Backend> SkipBlock<B> {
    pub fn new(
        input_size: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        config: &BlockConfig,
        device: &B::Device,
    ) -> Result<Self> {
        let shortcut = if in_channels == out_channels && stride == 1 {
            None
        } else {
            Some(stage::conv_bn(in_channels, out_channels, 1, stride, 1, config, device)?)
        };
        debug!(
            input_size,
            in_channels,
            out_channels,
            stride,
            identity = shortcut.is_none(),
            "building skip block"
        );
        Ok(SkipBlock {
            input_size,
            in_channels,
            out_channels,
            stride,
            shortcut,
        })
    }

    /// True when the block returns its input unchanged.
    pub fn is_identity(&self) -> bool {
        self.shortcut.is_none()
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
}

impl<B: Backend> Module<B> for SkipBlock<B> {
    fn forward(&self, x: &Tensor<B>) -> mbnas_core::Result<Tensor<B>> {
        match &self.shortcut {
            Some(projection) => projection.forward(x),
            None => Module::<B>::forward(&Identity, x),
        }
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        self.shortcut
            .as_ref()
            .map(|s| s.parameters())
            .unwrap_or_default()
    }

    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        let Some(shortcut) = &self.shortcut else {
            return Vec::new();
        };
        shortcut
            .named_parameters()
            .into_iter()
            .map(|(k, v)| (format!("shortcut.{k}"), v))
            .collect()
    }

    fn set_training(&self, training: bool) {
        if let Some(s) = &self.shortcut {
            s.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.shortcut.as_ref().map_or(true, |s| s.is_training())
    }
}
