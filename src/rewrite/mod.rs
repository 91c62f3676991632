//! Page rewriting: the rule table, identifier extraction and the passthrough rewriter.

pub mod handler;
pub mod identifier;
pub mod rule;

pub use handler::{
    next_fn, Next, NextFn, PassthroughRewriter, RewriteOutcome, DEFAULT_MAX_BODY_SIZE,
};
pub use identifier::IdentifierSource;
pub use rule::{RewriteRule, RuleSet, RuleSpec, Template};
