// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use regex::Regex;

use crate::errors::Creation;

/// Decides whether a line continues a multiline event.
#[derive(Clone, Debug)]
pub struct Matcher {
    pattern: Regex,
    negate: bool,
}

impl Matcher {
    pub fn new(pattern: &str, negate: bool) -> Result<Self, Creation> {
        let compiled = Regex::new(pattern).map_err(|source| Creation::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Matcher {
            pattern: compiled,
            negate,
        })
    }

    /// A line continues when it matches the pattern, or when it does not and
    /// the matcher is negated.
    #[must_use]
    pub fn continues(&self, line: &str) -> bool {
        self.pattern.is_match(line) != self.negate
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    #[must_use]
    pub fn negate(&self) -> bool {
        self.negate
    }
}
