// Conv2d — grouped 2D convolution
//
// Applies learnable filters to an input [N, C_in, H, W], producing
// [N, C_out, H_out, W_out]. Channels are split into `groups` independent
// slices; `groups == C_in == C_out` gives a depthwise convolution, `groups == 1`
// a dense one.
//
// WEIGHT INITIALIZATION:
//
//   Kaiming (He) uniform: U(-k, k) where k = sqrt(1 / (C_in/groups * kH * kW)).
//
// PARAMETER SHAPES:
//
//   weight: [C_out, C_in / groups, kH, kW]
//   bias:   [C_out]                 (optional)
//
// OUTPUT SIZE FORMULA:
//
//   H_out = floor((H + 2*padding_h - kernel_h) / stride_h) + 1
//   W_out = floor((W + 2*padding_w - kernel_w) / stride_w) + 1

use mbnas_core::backend::Backend;
use mbnas_core::dtype::DType;
use mbnas_core::error::{Error, Result};
use mbnas_core::shape::Shape;
use mbnas_core::tensor::Tensor;

use crate::module::Module;

/// Grouped 2D convolutional layer.
///
/// # Examples
/// ```ignore
/// // 3x3 depthwise over 160 channels
/// let dw = Conv2d::<CpuBackend>::new(160, 160, [3, 3], [1, 1], [1, 1], 160, false, DType::F32, &dev)?;
/// let y = dw.forward(&x)?; // [N, 160, H, W]
/// ```
pub struct Conv2d<B: Backend> {
    /// Convolution filters: [C_out, C_in / groups, kH, kW]
    weight: Tensor<B>,
    /// Optional bias: [C_out]
    bias: Option<Tensor<B>>,
    in_channels: usize,
    out_channels: usize,
    kernel_size: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
    groups: usize,
}

impl<B: Backend> Conv2d<B> {
    /// Create a new Conv2d layer with Kaiming uniform initialization.
    ///
    /// # Arguments
    /// - `in_channels`:  number of input channels (C_in)
    /// - `out_channels`: number of output channels (C_out)
    /// - `kernel_size`:  `[kH, kW]`
    /// - `stride`:       `[sH, sW]`, each at least 1
    /// - `padding`:      `[pH, pW]` zero-padding added to both sides
    /// - `groups`:       must divide both `in_channels` and `out_channels`
    /// - `use_bias`:     whether to include an additive bias
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
        groups: usize,
        use_bias: bool,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        if groups == 0 || in_channels % groups != 0 || out_channels % groups != 0 {
            return Err(Error::msg(format!(
                "Conv2d: groups {groups} must divide in_channels {in_channels} and out_channels {out_channels}"
            )));
        }
        if stride.contains(&0) {
            return Err(Error::msg(format!(
                "Conv2d: stride must be at least 1, got {stride:?}"
            )));
        }
        if kernel_size.contains(&0) {
            return Err(Error::msg(format!(
                "Conv2d: kernel size must be at least 1, got {kernel_size:?}"
            )));
        }

        let [kh, kw] = kernel_size;
        let in_per_group = in_channels / groups;
        // The weight's element count must fit in a usize.
        let Some(fan_in) = in_per_group
            .checked_mul(kh)
            .and_then(|n| n.checked_mul(kw))
            .filter(|n| n.checked_mul(out_channels).is_some())
        else {
            return Err(Error::msg(format!(
                "Conv2d: weight [{out_channels}, {in_per_group}, {kh}, {kw}] is too large"
            )));
        };
        let k = (1.0 / fan_in.max(1) as f64).sqrt();

        let weight = Tensor::<B>::rand(
            Shape::new(vec![out_channels, in_per_group, kh, kw]),
            dtype,
            device,
        )?
        .affine(2.0 * k, -k)?;

        let bias = if use_bias {
            let b = Tensor::<B>::rand(Shape::new(vec![out_channels]), dtype, device)?
                .affine(2.0 * k, -k)?;
            Some(b)
        } else {
            None
        };

        Ok(Conv2d {
            weight,
            bias,
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            groups,
        })
    }

    /// Create a Conv2d from existing weight and bias tensors.
    ///
    /// `in_channels` is recovered as `weight.dims()[1] * groups`.
    pub fn from_tensors(
        weight: Tensor<B>,
        bias: Option<Tensor<B>>,
        stride: [usize; 2],
        padding: [usize; 2],
        groups: usize,
    ) -> Result<Self> {
        let (out_channels, in_per_group, kh, kw) = weight.dims4("Conv2d weight")?;
        if groups == 0 || out_channels % groups != 0 {
            return Err(Error::msg(format!(
                "Conv2d: groups {groups} must divide out_channels {out_channels}"
            )));
        }
        Ok(Conv2d {
            weight,
            bias,
            in_channels: in_per_group * groups,
            out_channels,
            kernel_size: [kh, kw],
            stride,
            padding,
            groups,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
    pub fn kernel_size(&self) -> [usize; 2] {
        self.kernel_size
    }
    pub fn stride(&self) -> [usize; 2] {
        self.stride
    }
    pub fn padding(&self) -> [usize; 2] {
        self.padding
    }
    pub fn groups(&self) -> usize {
        self.groups
    }
    pub fn weight(&self) -> &Tensor<B> {
        &self.weight
    }
    pub fn bias(&self) -> Option<&Tensor<B>> {
        self.bias.as_ref()
    }
}

impl<B: Backend> Module<B> for Conv2d<B> {
    /// Input:  `[N, C_in, H, W]`
    /// Output: `[N, C_out, H_out, W_out]`
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        x.conv2d(
            &self.weight,
            self.bias.as_ref(),
            self.stride,
            self.padding,
            self.groups,
        )
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        let mut params = vec![self.weight.clone()];
        if let Some(ref b) = self.bias {
            params.push(b.clone());
        }
        params
    }

    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        let mut named = vec![("weight".to_string(), self.weight.clone())];
        if let Some(ref b) = self.bias {
            named.push(("bias".to_string(), b.clone()));
        }
        named
    }
}
