// BlockConfig — numeric options applied when a block's stages are built
//
// Block ids and factory names describe structure only; everything that is
// not structural (element type, normalization constants, which bounded
// activation to use, how strictly ids are matched) lives here so the same
// factory can be instantiated under different runtime settings.

use serde::{Deserialize, Serialize};

use mbnas_core::DType;

use crate::block::id::IdMatch;

/// Activation applied after the expansion and depthwise stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// min(max(0, x), 6)
    #[default]
    Relu6,
    /// max(0, x)
    Relu,
}

impl Activation {
    pub fn name(self) -> &'static str {
        match self {
            Activation::Relu6 => "relu6",
            Activation::Relu => "relu",
        }
    }
}

/// Options used when instantiating block stages.
///
/// ```ignore
/// let config = BlockConfig::default()
///     .with_dtype(DType::F64)
///     .with_activation(Activation::Relu);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    /// Element type of parameters (default: F32).
    pub dtype: DType,
    /// BatchNorm2d numerical stability constant (default: 1e-5).
    pub bn_eps: f64,
    /// BatchNorm2d running-statistics momentum (default: 0.1).
    pub bn_momentum: f64,
    /// Bounded activation after expansion and depthwise stages (default: ReLU6).
    pub activation: Activation,
    /// How `MobileBlock::factory` matches block ids (default: exact).
    pub id_match: IdMatch,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            dtype: DType::F32,
            bn_eps: 1e-5,
            bn_momentum: 0.1,
            activation: Activation::Relu6,
            id_match: IdMatch::Exact,
        }
    }
}

impl BlockConfig {
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_bn_eps(mut self, eps: f64) -> Self {
        self.bn_eps = eps;
        self
    }

    pub fn with_bn_momentum(mut self, momentum: f64) -> Self {
        self.bn_momentum = momentum;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_id_match(mut self, id_match: IdMatch) -> Self {
        self.id_match = id_match;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BlockConfig::default();
        assert_eq!(config.dtype, DType::F32);
        assert_eq!(config.activation, Activation::Relu6);
        assert_eq!(config.id_match, IdMatch::Exact);
        assert_eq!(config.bn_eps, 1e-5);
    }

    #[test]
    fn test_builder_chain() {
        let config = BlockConfig::default()
            .with_dtype(DType::F64)
            .with_bn_eps(1e-3)
            .with_bn_momentum(0.01)
            .with_activation(Activation::Relu)
            .with_id_match(IdMatch::Search);
        assert_eq!(config.dtype, DType::F64);
        assert_eq!(config.bn_eps, 1e-3);
        assert_eq!(config.bn_momentum, 0.01);
        assert_eq!(config.activation.name(), "relu");
        assert_eq!(config.id_match, IdMatch::Search);
    }
}
