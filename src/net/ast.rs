//! Declarative arc and guard expressions.
//!
//! Model files and the builder surface speak in these trees; nothing here is
//! executable. [`crate::net::NetBuilder::build`] lowers them into the
//! compiled forms in [`crate::net::arc`] and [`crate::net::guard`], resolving
//! names against the declared color types and variables.

use serde::{Deserialize, Serialize};

/// A single color position: a concrete color, a variable, or a cyclic
/// neighbour of either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorExpression {
    /// A named color of a named color type.
    Constant { color_type: String, color: String },
    Variable { name: String },
    /// The next color in the domain, wrapping at the end.
    Successor(Box<ColorExpression>),
    /// The previous color in the domain, wrapping at zero.
    Predecessor(Box<ColorExpression>),
    /// Every color of the named type. Arcs expand this into one token per
    /// color; guards reject it.
    All { color_type: String },
}

impl ColorExpression {
    pub fn var(name: &str) -> Self {
        ColorExpression::Variable { name: name.to_owned() }
    }

    pub fn color(color_type: &str, color: &str) -> Self {
        ColorExpression::Constant {
            color_type: color_type.to_owned(),
            color: color.to_owned(),
        }
    }
}

/// Multiset-valued expression labelling an arc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcExpression {
    /// One token colored by a single color expression.
    Single(ColorExpression),
    /// One token whose color is a tuple over a product domain.
    Tuple(Vec<ColorExpression>),
    /// `count` copies of the inner expression.
    NumberOf {
        count: u64,
        inner: Box<ArcExpression>,
    },
    Add(Vec<ArcExpression>),
    /// Token-game subtraction, clamped at zero per color sequence.
    Subtract {
        lhs: Box<ArcExpression>,
        rhs: Box<ArcExpression>,
    },
    ScalarProduct {
        scalar: u64,
        inner: Box<ArcExpression>,
    },
}

/// Boolean guard over a transition's variables. Comparisons wrap their
/// operands into the variable's cyclic domain before comparing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardExpression {
    And(Vec<GuardExpression>),
    Or(Vec<GuardExpression>),
    LessThan {
        lhs: ColorExpression,
        rhs: ColorExpression,
    },
    LessThanOrEqual {
        lhs: ColorExpression,
        rhs: ColorExpression,
    },
    /// Component-wise equality of two color sequences; a plain color is a
    /// sequence of length one. Both sides must have the same arity.
    Equality {
        lhs: Vec<ColorExpression>,
        rhs: Vec<ColorExpression>,
    },
    Inequality {
        lhs: Vec<ColorExpression>,
        rhs: Vec<ColorExpression>,
    },
}
