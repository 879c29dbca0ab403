//! Engine configuration.

use crate::error::{PercolatorError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Which flavor of regular expression compilation to use for `regexp` conditions.
///
/// Both engines guarantee linear-time matching, so both reject lookaround and
/// backreferences; they only differ in how much the compiled program may grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegexEngine {
    /// Small compiled-size and nesting limits, suited to untrusted patterns.
    #[default]
    Safe,
    /// The regex crate's default limits.
    Native,
}

impl RegexEngine {
    const SAFE_SIZE_LIMIT: usize = 1 << 20;
    const SAFE_NEST_LIMIT: u32 = 64;

    pub(crate) fn compile(
        &self,
        pattern: &str,
        case_insensitive: bool,
        multi_line: bool,
        dot_matches_new_line: bool,
    ) -> std::result::Result<Regex, regex::Error> {
        let mut builder = RegexBuilder::new(pattern);
        builder
            .case_insensitive(case_insensitive)
            .multi_line(multi_line)
            .dot_matches_new_line(dot_matches_new_line);
        if let Self::Safe = self {
            builder
                .size_limit(Self::SAFE_SIZE_LIMIT)
                .dfa_size_limit(Self::SAFE_SIZE_LIMIT)
                .nest_limit(Self::SAFE_NEST_LIMIT);
        }
        builder.build()
    }
}

/// Configuration consumed by the canonicalizer and the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Maximum number of distinct leaf predicates a filter may contain.
    /// `0` disables the check.
    pub max_conditions: usize,
    pub regex_engine: RegexEngine,
    /// Seed of every filter, subfilter and condition identifier. Keeping it
    /// stable keeps identifiers stable across restarts.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_conditions: 16,
            regex_engine: RegexEngine::Safe,
            seed: 0x6b6f_6e63_6f72_6465,
        }
    }
}

impl Config {
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| PercolatorError::InvalidConfig(e.to_string()))
    }

    pub fn with_max_conditions(mut self, max_conditions: usize) -> Self {
        self.max_conditions = max_conditions;
        self
    }

    pub fn with_regex_engine(mut self, regex_engine: RegexEngine) -> Self {
        self.regex_engine = regex_engine;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
