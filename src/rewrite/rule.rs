//! Literal find/replace rules and the rule tables deployed for Myriad.

use crate::error::{ConfigError, RuleError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SITE: &str = "https://myriad-game.com";
const IMAGE_FUNCTION: &str = "https://myriad-game.com/.netlify/functions/image";

/// Default preview image referenced by the static pages.
pub const OG_IMAGE: &str = "https://myriad-game.com/icon/og_image.png";
pub const OG_IMAGE_SQUARE: &str = "https://myriad-game.com/icon/og_image_square.png";
pub const OG_IMAGE_LANDSCAPE: &str = "https://myriad-game.com/icon/og_image_landscape.png";

const OG_URL_TAG: &str = r#"<meta property="og:url" content=""#;
const OG_IMAGE_ALT_TAG: &str = r#"<meta property="og:image:alt" content="Myriad game "#;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Identifier,
}

/// Replacement text with `{id}` placeholders.
///
/// `{{` and `}}` stand for literal braces. A `}` on its own is literal too.
/// `${...}` is an uninterpolated placeholder and is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a replacement template.
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' | '}' if chars.peek().map(|&(_, next)| next) == Some(c) => {
                    chars.next();
                    literal.push(c);
                }
                '{' => {
                    let rest = &source[offset + 1..];
                    let name = &rest[..rest.find('}').ok_or(RuleError::Unclosed(offset))?];

                    if literal.ends_with('$') {
                        return Err(RuleError::UnexpandedPlaceholder(name.to_string()));
                    }
                    if name != "id" {
                        return Err(RuleError::UnknownPlaceholder(name.to_string()));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Identifier);
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                    }
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Template of the form `{prefix}{id}{suffix}`.
    fn around_identifier(prefix: &str, suffix: &str) -> Self {
        let mut segments = vec![Segment::Literal(prefix.to_string()), Segment::Identifier];
        if !suffix.is_empty() {
            segments.push(Segment::Literal(suffix.to_string()));
        }
        Self {
            source: format!("{}{{id}}{}", escape_braces(prefix), escape_braces(suffix)),
            segments,
        }
    }

    /// Fill every placeholder with `id`, verbatim.
    pub fn expand(&self, id: &str) -> String {
        let mut out = String::with_capacity(self.source.len() + id.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Identifier => out.push_str(id),
            }
        }
        out
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

impl FromStr for Template {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Serialized form of a rule, as found in `OGPROXY_RULES`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub search: String,
    pub replace: String,
}

/// One literal find/replace step keyed by the request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleSpec", into = "RuleSpec")]
pub struct RewriteRule {
    search: String,
    replace: Template,
}

impl RewriteRule {
    /// Create a rule from a search literal and a replacement template.
    pub fn new(search: impl Into<String>, replace: &str) -> Result<Self, RuleError> {
        let search = search.into();
        if search.is_empty() {
            return Err(RuleError::EmptySearch);
        }
        Ok(Self {
            search,
            replace: Template::parse(replace)?,
        })
    }

    fn around_identifier(search: &str, prefix: &str, suffix: &str) -> Self {
        Self {
            search: search.to_string(),
            replace: Template::around_identifier(prefix, suffix),
        }
    }

    /// The literal this rule looks for.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// The replacement template.
    pub fn replacement(&self) -> &Template {
        &self.replace
    }

    /// Replace every occurrence of the search literal.
    ///
    /// Returns the new text and the number of replacements. The input is
    /// handed back untouched when the literal does not occur.
    pub fn apply(&self, text: String, id: &str) -> (String, usize) {
        let count = text.matches(self.search.as_str()).count();
        if count == 0 {
            return (text, 0);
        }
        (text.replace(&self.search, &self.replace.expand(id)), count)
    }
}

impl TryFrom<RuleSpec> for RewriteRule {
    type Error = RuleError;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        Self::new(spec.search, &spec.replace)
    }
}

impl From<RewriteRule> for RuleSpec {
    fn from(rule: RewriteRule) -> Self {
        RuleSpec {
            search: rule.search,
            replace: rule.replace.source,
        }
    }
}

/// Ordered rule table. Later rules see the output of earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<RewriteRule>,
}

impl RuleSet {
    /// Create a rule set from rules in application order.
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    /// Rules for `/game/<id>` pages: the default preview image becomes the
    /// image function rendering that game.
    pub fn game() -> Self {
        Self::new(vec![RewriteRule::around_identifier(
            OG_IMAGE,
            &format!("{}?game=", IMAGE_FUNCTION),
            "",
        )])
    }

    /// Rules for level pages: square and landscape previews sized for the
    /// image function, plus the `og:url` and `og:image:alt` tags.
    pub fn level() -> Self {
        Self::new(vec![
            RewriteRule::around_identifier(
                OG_IMAGE_SQUARE,
                &format!("{}?level=", IMAGE_FUNCTION),
                "&width=1080&height=1080",
            ),
            RewriteRule::around_identifier(
                OG_IMAGE_LANDSCAPE,
                &format!("{}?level=", IMAGE_FUNCTION),
                "&width=1200&height=630",
            ),
            RewriteRule::around_identifier(
                &format!("{}{}\"", OG_URL_TAG, SITE),
                &format!("{}{}/game/", OG_URL_TAG, SITE),
                "\"",
            ),
            RewriteRule::around_identifier(
                &format!("{}preview\"", OG_IMAGE_ALT_TAG),
                OG_IMAGE_ALT_TAG,
                " preview\"",
            ),
        ])
    }

    /// Look up a built-in rule set by name.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "game" => Ok(Self::game()),
            "level" => Ok(Self::level()),
            _ => Err(ConfigError::UnknownRuleSet(name.to_string())),
        }
    }

    /// Parse a JSON list of `{"search": ..., "replace": ...}` objects.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply every rule in order. Returns the text and the total number of replacements.
    pub fn apply(&self, text: &str, id: &str) -> (String, usize) {
        self.rules
            .iter()
            .fold((text.to_string(), 0), |(text, total), rule| {
                let (text, count) = rule.apply(text, id);
                (text, total + count)
            })
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over the rules in application order.
    pub fn iter(&self) -> impl Iterator<Item = &RewriteRule> {
        self.rules.iter()
    }
}
