// BlockFactoryRegistry — factory names to factories
//
// An ordered table of (name, regex, constructor) rules. Resolving a block
// name tries the rules in order and the first whose pattern matches and
// whose constructor accepts the captures wins. The builtin table knows two
// families:
//
//   K<kernel>E<expansion>G<groups>Block   → FactoryKind::Mobile
//   SkipBlock                             → FactoryKind::Skip
//
// Extra families (aliases used by older search spaces, say) are added with
// `with_rule` on a private registry; the global one is built once and never
// changes.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::debug;

use super::factory::{BlockFactory, FactoryKind};
use super::id::cached_regex;
use crate::error::{Error, Result};

const MOBILE_PATTERN: &str = r"^K([0-9]+)E([0-9]+)G([0-9]+)Block$";
const SKIP_PATTERN: &str = r"^SkipBlock$";

/// Turns the captures of a matching rule into a factory kind. Returning
/// `None` rejects the name (e.g. a number that does not fit in `usize`).
pub type FactoryCtor = fn(&Captures<'_>) -> Option<FactoryKind>;

struct FactoryRule {
    name: String,
    pattern: Regex,
    ctor: FactoryCtor,
}

pub struct BlockFactoryRegistry {
    rules: Vec<FactoryRule>,
}

static MOBILE_RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
static SKIP_RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

impl BlockFactoryRegistry {
    /// Registry with no rules at all.
    pub fn empty() -> Self {
        BlockFactoryRegistry { rules: Vec::new() }
    }

    /// Registry with the builtin mobile and skip rules.
    pub fn new() -> Result<Self> {
        let mut registry = Self::empty();
        registry.push_rule("mobile", cached_regex(&MOBILE_RE, MOBILE_PATTERN)?.clone(), mobile_rule);
        registry.push_rule("skip", cached_regex(&SKIP_RE, SKIP_PATTERN)?.clone(), skip_rule);
        Ok(registry)
    }

    /// The process-wide registry with the builtin rules.
    pub fn global() -> Result<&'static Self> {
        static GLOBAL: OnceLock<BlockFactoryRegistry> = OnceLock::new();
        if let Some(registry) = GLOBAL.get() {
            return Ok(registry);
        }
        let registry = Self::new()?;
        Ok(GLOBAL.get_or_init(|| registry))
    }

    /// Append a rule. Later rules only see names earlier rules rejected.
    pub fn with_rule(mut self, name: impl Into<String>, pattern: &str, ctor: FactoryCtor) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.push_rule(name, regex, ctor);
        Ok(self)
    }

    fn push_rule(&mut self, name: impl Into<String>, pattern: Regex, ctor: FactoryCtor) {
        self.rules.push(FactoryRule {
            name: name.into(),
            pattern,
            ctor,
        });
    }

    /// Find the factory for `block_name`.
    pub fn resolve(&self, block_name: &str) -> Result<BlockFactory> {
        for rule in &self.rules {
            let Some(caps) = rule.pattern.captures(block_name) else {
                continue;
            };
            if let Some(kind) = (rule.ctor)(&caps) {
                debug!(block_name, rule = %rule.name, ?kind, "resolved block factory");
                return Ok(BlockFactory::new(block_name, kind));
            }
        }
        Err(Error::parse(block_name))
    }

    /// Rule names in resolution order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }
}

fn capture_usize(caps: &Captures<'_>, i: usize) -> Option<usize> {
    caps.get(i)?.as_str().parse().ok()
}

fn mobile_rule(caps: &Captures<'_>) -> Option<FactoryKind> {
    Some(FactoryKind::Mobile {
        kernel: capture_usize(caps, 1)?,
        expansion: capture_usize(caps, 2)?,
        groups: capture_usize(caps, 3)?,
    })
}

fn skip_rule(_: &Captures<'_>) -> Option<FactoryKind> {
    Some(FactoryKind::Skip)
}
