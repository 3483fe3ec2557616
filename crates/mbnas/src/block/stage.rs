// Stage builders shared by MobileBlock and SkipBlock
//
// Every convolution in a block is bias-free and followed by batch norm; the
// norm's shift makes a conv bias redundant. Padding is always kernel / 2, so
// 1x1 convolutions are unpadded and odd kernels keep the spatial size at
// stride 1.

use mbnas_core::{Backend, Result};
use mbnas_nn::{BatchNorm2d, Conv2d, Module, ReLU, ReLU6, Sequential};

use crate::config::{Activation, BlockConfig};

/// `Conv2d(k, stride, groups, no bias) → BatchNorm2d(out)`.
pub(crate) fn conv_bn<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    groups: usize,
    config: &BlockConfig,
    device: &B::Device,
) -> Result<Sequential<B>> {
    let pad = kernel / 2;
    let conv = Conv2d::<B>::new(
        in_channels,
        out_channels,
        [kernel, kernel],
        [stride, stride],
        [pad, pad],
        groups,
        false,
        config.dtype,
        device,
    )?;
    let bn = BatchNorm2d::<B>::new(
        out_channels,
        config.bn_eps,
        config.bn_momentum,
        config.dtype,
        device,
    )?;
    let mut stage = Sequential::new();
    stage.push(conv);
    stage.push(bn);
    Ok(stage)
}

/// [`conv_bn`] followed by the configured activation.
pub(crate) fn conv_bn_act<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    groups: usize,
    config: &BlockConfig,
    device: &B::Device,
) -> Result<Sequential<B>> {
    let mut stage = conv_bn(in_channels, out_channels, kernel, stride, groups, config, device)?;
    stage.push_boxed(activation(config.activation));
    Ok(stage)
}

pub(crate) fn activation<B: Backend>(activation: Activation) -> Box<dyn Module<B>> {
    match activation {
        Activation::Relu6 => Box::new(ReLU6),
        Activation::Relu => Box::new(ReLU),
    }
}
