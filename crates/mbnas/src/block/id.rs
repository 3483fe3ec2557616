// BlockId — canonical text form of a BlockSpec
//
//   w<input_size>_i<in>_o<out>_s<stride>_e<expansion>_k<kernel>_g<groups>
//
// e.g. `w112_i16_o32_s1_e10_k3_g2`. Encoding is plain formatting. Decoding
// lower-cases the input and matches it against a fixed pattern; by default
// the whole string must be an id, `IdMatch::Search` accepts the first id
// found anywhere in the text.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::spec::BlockSpec;
use crate::error::{Error, Result};

// ASCII [0-9], not \d: Unicode digits would match but fail `usize` parsing.
const ID_PATTERN: &str = r"w([0-9]+)_i([0-9]+)_o([0-9]+)_s([0-9]+)_e([0-9]+)_k([0-9]+)_g([0-9]+)";
const ID_PATTERN_EXACT: &str =
    r"^w([0-9]+)_i([0-9]+)_o([0-9]+)_s([0-9]+)_e([0-9]+)_k([0-9]+)_g([0-9]+)$";

/// How much of the input a block id has to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMatch {
    /// The whole input must be a block id.
    #[default]
    Exact,
    /// Use the first block id found in the input, ignoring surrounding text.
    Search,
}

/// Encoder/decoder for block ids.
pub struct BlockId;

impl BlockId {
    /// Canonical id of `spec`.
    pub fn encode(spec: &BlockSpec) -> String {
        format!(
            "w{}_i{}_o{}_s{}_e{}_k{}_g{}",
            spec.input_size(),
            spec.in_channels(),
            spec.out_channels(),
            spec.stride(),
            spec.expansion(),
            spec.kernel(),
            spec.groups()
        )
    }

    /// Decode a block id. The whole input must match (case-insensitive).
    pub fn decode(input: &str) -> Result<BlockSpec> {
        Self::decode_with(input, IdMatch::Exact)
    }

    /// Decode a block id using the given match mode.
    ///
    /// Errors carry the original input, not the lower-cased copy.
    pub fn decode_with(input: &str, mode: IdMatch) -> Result<BlockSpec> {
        let lowered = input.to_lowercase();
        let re = match mode {
            IdMatch::Exact => cached_regex(&EXACT_RE, ID_PATTERN_EXACT)?,
            IdMatch::Search => cached_regex(&SEARCH_RE, ID_PATTERN)?,
        };
        let caps = re.captures(&lowered).ok_or_else(|| Error::parse(input))?;

        if let Some(m) = caps.get(0) {
            if m.len() != lowered.len() {
                warn!(input, matched = m.as_str(), "block id surrounded by extra text");
            }
        }

        let mut fields = [0usize; 7];
        for (i, slot) in fields.iter_mut().enumerate() {
            *slot = caps
                .get(i + 1)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .ok_or_else(|| Error::parse(input))?;
        }
        let [input_size, in_channels, out_channels, stride, expansion, kernel, groups] = fields;
        Ok(BlockSpec::new(
            input_size,
            in_channels,
            out_channels,
            stride,
            expansion,
            kernel,
            groups,
        ))
    }
}

static EXACT_RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
static SEARCH_RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

/// Compile `pattern` once into `cell` and hand out the shared regex.
pub(crate) fn cached_regex(
    cell: &'static OnceLock<std::result::Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source: e.clone(),
        })
}
