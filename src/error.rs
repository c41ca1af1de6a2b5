//! Error taxonomy, split by phase: assembling a net, compiling a query,
//! running a check.

use thiserror::Error;

/// Errors raised while a [`crate::net::NetBuilder`] turns declarations into
/// a checked net.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("unknown place '{0}'")]
    UnknownPlace(String),
    #[error("unknown transition '{0}'")]
    UnknownTransition(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown color type '{0}'")]
    UnknownColorType(String),
    #[error("color type '{0}' has no colors")]
    EmptyColorType(String),
    #[error("unknown color '{color}' in color type '{color_type}'")]
    UnknownColor { color_type: String, color: String },
    #[error("token arity does not match the color domain of place '{0}'")]
    ArityMismatch(String),
    #[error("place '{0}' declares an empty color domain")]
    EmptyDomain(String),
    #[error("duplicate name '{0}'")]
    DuplicateName(String),
    #[error("unsupported arc expression: {0}")]
    UnsupportedExpression(&'static str),
    #[error("guard compares sequences of different arity")]
    GuardArityMismatch,
    #[error("token count {0} does not fit in a signed count")]
    TooManyTokens(u64),
    /// The product of the variable domains of one transition overflows the
    /// binding index. The net is valid but cannot be checked exhaustively,
    /// so callers usually map this to an inconclusive verdict instead of
    /// treating it as a hard failure.
    #[error("transition '{0}' has too many bindings to enumerate")]
    TooManyBindings(String),
}

/// Errors raised after the net is built: query compilation, state decoding
/// and trace replay.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("query must be exactly one top-level EF or AG quantifier")]
    UnsupportedQuery,
    #[error("unknown place '{0}' in query")]
    UnknownPlace(String),
    #[error("unknown transition '{0}' in query")]
    UnknownTransition(String),
    #[error("state key does not decode to a marking")]
    UnknownEncoding,
    #[error("no recorded trace for the requested state")]
    InvalidTrace,
}
