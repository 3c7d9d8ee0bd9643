// rundex - core/pattern.rs
//
// Ordered pattern classification. A PatternMatcher owns a fixed list of
// (regex, description) rules; names are tested against the rules in
// declaration order and the first hit wins. The rule list is never
// re-ordered after compilation.

use regex::Regex;

use crate::util::constants::MAX_REGEX_PATTERN_LENGTH;
use crate::util::error::DescriptorError;

/// A raw classification rule before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRule {
    /// Regex source text, matched against the file name or relative path.
    pub pattern: String,

    /// Human-readable description of files matching this rule.
    pub description: String,
}

impl PatternRule {
    pub fn new(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
        }
    }
}

/// A compiled rule: the regex plus its description.
#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    description: String,
}

/// Ordered first-match classifier over a set of pattern rules.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    rules: Vec<CompiledRule>,
}

impl PatternMatcher {
    /// Compiles every rule up front. Fails on the first invalid pattern,
    /// naming the offending source text; a matcher with a half-compiled
    /// rule list is never returned.
    ///
    /// `owner` labels the rule set (a product-type ID) in errors.
    pub fn compile(owner: &str, rules: &[PatternRule]) -> Result<Self, DescriptorError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.pattern.len() > MAX_REGEX_PATTERN_LENGTH {
                return Err(DescriptorError::RegexTooLong {
                    type_id: owner.to_string(),
                    length: rule.pattern.len(),
                    max_length: MAX_REGEX_PATTERN_LENGTH,
                });
            }
            let regex = Regex::new(&rule.pattern).map_err(|source| {
                DescriptorError::InvalidRegex {
                    type_id: owner.to_string(),
                    pattern: rule.pattern.clone(),
                    source,
                }
            })?;
            compiled.push(CompiledRule {
                regex,
                description: rule.description.clone(),
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Classifies `name`: tests rules in declaration order, returns the
    /// description of the first rule whose regex matches, or `None`.
    pub fn match_name(&self, name: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(name))
            .map(|rule| rule.description.as_str())
    }

    /// Number of rules in this matcher.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
