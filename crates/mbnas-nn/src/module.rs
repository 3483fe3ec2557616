// Module — what every layer and block exposes to whoever assembles them
//
// Candidate blocks are run by calling `forward` on NCHW tensors and sized by
// counting `parameters`. Batch norm is the only layer whose output
// depends on train/eval mode, so the mode switch is a no-op by default and
// composites forward it to their children.

use mbnas_core::backend::Backend;
use mbnas_core::error::Result;
use mbnas_core::tensor::Tensor;

pub trait Module<B: Backend> {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>>;

    /// Learnable tensors, in the same order as `named_parameters`.
    fn parameters(&self) -> Vec<Tensor<B>>;

    /// Takes `&self`; stateful layers keep the flag in a `Cell`.
    fn set_training(&self, _training: bool) {}

    fn is_training(&self) -> bool {
        true
    }

    fn train(&self) {
        self.set_training(true);
    }

    fn eval(&self) {
        self.set_training(false);
    }

    /// Scalar count across all parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.elem_count()).sum()
    }

    /// Dotted names mirroring the module tree, e.g. `depthwise.0.weight`.
    /// Layers without parameters can rely on the default.
    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        self.parameters()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (i.to_string(), p))
            .collect()
    }
}
