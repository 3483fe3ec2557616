// Sequential — one block stage: conv, norm and optionally an activation
//
// MobileBlock's expand/depthwise/project stages and SkipBlock's projection
// shortcut are each a Sequential. A layer's parameters are exported under its
// position in the stage ("0.weight" for the conv, "1.weight"/"1.bias" for the
// norm), which is what gives block parameters their `expand.1.bias` names.

use mbnas_core::backend::Backend;
use mbnas_core::error::Result;
use mbnas_core::tensor::Tensor;

use crate::module::Module;

pub struct Sequential<B: Backend> {
    layers: Vec<Box<dyn Module<B>>>,
}

impl<B: Backend> Sequential<B> {
    pub fn new() -> Self {
        Sequential { layers: Vec::new() }
    }

    pub fn push<M: Module<B> + 'static>(&mut self, layer: M) {
        self.layers.push(Box::new(layer));
    }

    /// For layers chosen at runtime, e.g. the configured activation.
    pub fn push_boxed(&mut self, layer: Box<dyn Module<B>>) {
        self.layers.push(layer);
    }
}

impl<B: Backend> Default for Sequential<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Module<B> for Sequential<B> {
    fn forward(&self, x: &Tensor<B>) -> Result<Tensor<B>> {
        self.layers
            .iter()
            .try_fold(x.clone(), |h, layer| layer.forward(&h))
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    fn named_parameters(&self) -> Vec<(String, Tensor<B>)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer
                    .named_parameters()
                    .into_iter()
                    .map(move |(k, v)| (format!("{i}.{k}"), v))
            })
            .collect()
    }

    fn set_training(&self, training: bool) {
        self.layers.iter().for_each(|l| l.set_training(training));
    }

    // An empty stage has nothing that could be in eval mode.
    fn is_training(&self) -> bool {
        self.layers.iter().all(|l| l.is_training())
    }
}
