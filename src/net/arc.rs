//! Compiled arc expressions.
//!
//! Lowering turns the declarative tree into a closed algebra of five forms:
//! a constant multiset, a set of variable-parameterized token sequences, and
//! addition, clamped subtraction and scaling over those. Two rewrites run
//! after lowering: [`ArcExpression::lift_constants`] splits fully-constant
//! sequences out of variable collections, and
//! [`ArcExpression::fold_constants`] merges constant-only subtrees. A
//! subtraction whose right side is not constant never folds; markings can
//! dip below zero while such an arc fires, which the net records as a
//! property.
//!
//! The same compiled tree drives four consumers: firing (produce and
//! consume), enabledness (subset checks), binding pruning (per-variable
//! uses) and cardinality pruning (count bounds).

use crate::error::BuildError;
use crate::net::ast::{self, ColorExpression};
use crate::net::binding::{Binding, signed_wrap};
use crate::net::builder::SymbolTable;
use crate::net::ids::{Color, VariableId};
use crate::net::multiset::{ColorMultiset, ColorSequence, TokenCount};

use itertools::Itertools;

/// One tuple position of a parameterized token: either a concrete color
/// (offsets already folded) or a variable with a pending offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterizedColor {
    Constant(Color),
    Variable { variable: VariableId, offset: i64 },
}

impl ParameterizedColor {
    fn constant_value(self) -> Option<Color> {
        match self {
            ParameterizedColor::Constant(color) => Some(color),
            ParameterizedColor::Variable { .. } => None,
        }
    }

    fn resolve(self, binding: &Binding, domain: u32) -> Color {
        match self {
            ParameterizedColor::Constant(color) => color,
            ParameterizedColor::Variable { variable, offset } => {
                signed_wrap(i64::from(binding.value(variable)) + offset, domain)
            }
        }
    }
}

/// Token sequences that still mention variables: each sequence yields
/// `scale` tokens of the color obtained by resolving every position under
/// the current binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableTokens {
    pub sequences: Vec<Vec<ParameterizedColor>>,
    /// Color domain size per tuple position.
    pub domains: Vec<u32>,
    pub scale: TokenCount,
}

impl VariableTokens {
    fn resolve(&self, sequence: &[ParameterizedColor], binding: &Binding) -> ColorSequence {
        ColorSequence::new(
            sequence
                .iter()
                .zip(&self.domains)
                .map(|(color, &domain)| color.resolve(binding, domain)),
        )
    }

    fn eval(&self, binding: &Binding) -> ColorMultiset {
        let mut out = ColorMultiset::new();
        for sequence in &self.sequences {
            out.add_count(self.resolve(sequence, binding), self.scale);
        }
        out
    }
}

/// An arc expression lowered to the closed evaluation algebra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArcExpression {
    Constant(ColorMultiset),
    Variables(VariableTokens),
    Add(Box<ArcExpression>, Box<ArcExpression>),
    /// Clamped at zero per color sequence after evaluating both sides.
    Sub(Box<ArcExpression>, Box<ArcExpression>),
    Scale(Box<ArcExpression>, TokenCount),
}

/// One occurrence of a variable inside an arc's token tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VariableUse {
    pub position: usize,
    pub offset: i64,
}

impl ArcExpression {
    /// Lowers a declarative expression and runs both rewrites. This is the
    /// only entry point the builder uses.
    pub(crate) fn compile(
        expr: &ast::ArcExpression,
        symbols: &SymbolTable,
    ) -> Result<ArcExpression, BuildError> {
        Ok(lower(expr, symbols)?.lift_constants().fold_constants())
    }

    /// The multiset this arc moves under `binding`.
    pub fn eval(&self, binding: &Binding) -> ColorMultiset {
        match self {
            ArcExpression::Constant(multiset) => multiset.clone(),
            ArcExpression::Variables(tokens) => tokens.eval(binding),
            ArcExpression::Add(lhs, rhs) => {
                let mut out = lhs.eval(binding);
                out += &rhs.eval(binding);
                out
            }
            ArcExpression::Sub(lhs, rhs) => {
                let mut out = lhs.eval(binding);
                out -= &rhs.eval(binding);
                out.fix_negative();
                out
            }
            ArcExpression::Scale(inner, factor) => {
                let mut out = inner.eval(binding);
                out *= *factor;
                out
            }
        }
    }

    /// Adds this arc's tokens to `out` without materializing intermediate
    /// multisets for the additive forms.
    pub fn produce(&self, out: &mut ColorMultiset, binding: &Binding) {
        match self {
            ArcExpression::Constant(multiset) => *out += multiset,
            ArcExpression::Variables(tokens) => {
                for sequence in &tokens.sequences {
                    out.add_count(tokens.resolve(sequence, binding), tokens.scale);
                }
            }
            ArcExpression::Add(lhs, rhs) => {
                lhs.produce(out, binding);
                rhs.produce(out, binding);
            }
            other => *out += &other.eval(binding),
        }
    }

    /// Removes this arc's tokens from `out`, clamping at zero.
    pub fn consume(&self, out: &mut ColorMultiset, binding: &Binding) {
        match self {
            ArcExpression::Constant(multiset) => {
                *out -= multiset;
                out.fix_negative();
            }
            ArcExpression::Variables(tokens) => {
                for sequence in &tokens.sequences {
                    out.add_count(tokens.resolve(sequence, binding), -tokens.scale);
                }
                out.fix_negative();
            }
            ArcExpression::Add(lhs, rhs) => {
                lhs.consume(out, binding);
                rhs.consume(out, binding);
            }
            other => {
                *out -= &other.eval(binding);
                out.fix_negative();
            }
        }
    }

    /// Whether the marking holds at least this arc's tokens under `binding`.
    pub fn is_subset(&self, superset: &ColorMultiset, binding: &Binding) -> bool {
        match self {
            ArcExpression::Constant(multiset) => multiset.is_subset(superset),
            other => other.eval(binding).is_subset(superset),
        }
    }

    /// Lower bound on the total tokens this arc moves, over all bindings.
    /// A bound past `u64::MAX` stays saturated; no marking can cover it.
    pub fn minimal_count(&self) -> u64 {
        match self {
            ArcExpression::Constant(multiset) => multiset.total_count(),
            ArcExpression::Variables(tokens) => {
                (tokens.sequences.len() as u64).saturating_mul(tokens.scale.max(0) as u64)
            }
            ArcExpression::Add(lhs, rhs) => {
                lhs.minimal_count().saturating_add(rhs.minimal_count())
            }
            ArcExpression::Sub(lhs, rhs) => {
                lhs.minimal_count().saturating_sub(rhs.upper_bound())
            }
            ArcExpression::Scale(inner, factor) => {
                inner.minimal_count().saturating_mul((*factor).max(0) as u64)
            }
        }
    }

    /// Tokens this arc moves under every binding: the constant part of the
    /// expression. Variable tokens depend on the binding and contribute
    /// nothing; a subtraction with a non-constant right side could take
    /// anything, so it clears the bound.
    pub fn minimal_marking(&self) -> ColorMultiset {
        match self {
            ArcExpression::Constant(multiset) => multiset.clone(),
            ArcExpression::Variables(_) => ColorMultiset::new(),
            ArcExpression::Add(lhs, rhs) => {
                let mut out = lhs.minimal_marking();
                out += &rhs.minimal_marking();
                out
            }
            ArcExpression::Sub(lhs, rhs) => match rhs.as_ref() {
                ArcExpression::Constant(taken) => {
                    let mut out = lhs.minimal_marking();
                    out -= taken;
                    out.fix_negative();
                    out
                }
                _ => ColorMultiset::new(),
            },
            ArcExpression::Scale(inner, factor) => {
                let mut out = inner.minimal_marking();
                out *= *factor;
                out
            }
        }
    }

    /// Upper bound on the total tokens this arc moves, over all bindings.
    pub fn upper_bound(&self) -> u64 {
        match self {
            ArcExpression::Constant(multiset) => multiset.total_count(),
            ArcExpression::Variables(tokens) => {
                (tokens.sequences.len() as u64).saturating_mul(tokens.scale.max(0) as u64)
            }
            ArcExpression::Add(lhs, rhs) => lhs.upper_bound().saturating_add(rhs.upper_bound()),
            ArcExpression::Sub(lhs, _) => lhs.upper_bound(),
            ArcExpression::Scale(inner, factor) => {
                inner.upper_bound().saturating_mul((*factor).max(0) as u64)
            }
        }
    }

    /// Every variable the expression mentions, duplicates included.
    pub fn collect_variables(&self, out: &mut Vec<VariableId>) {
        match self {
            ArcExpression::Constant(_) => {}
            ArcExpression::Variables(tokens) => {
                for sequence in &tokens.sequences {
                    for color in sequence {
                        if let ParameterizedColor::Variable { variable, .. } = *color {
                            out.push(variable);
                        }
                    }
                }
            }
            ArcExpression::Add(lhs, rhs) | ArcExpression::Sub(lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            ArcExpression::Scale(inner, _) => inner.collect_variables(out),
        }
    }

    /// Tuple positions where `variable` constrains which tokens the arc can
    /// take. Subtractions contribute nothing: clamping means they never
    /// require a token to be present, so deriving a constraint from them
    /// could prune a valid binding.
    pub fn variable_uses(&self, variable: VariableId, out: &mut Vec<VariableUse>) {
        match self {
            ArcExpression::Constant(_) => {}
            ArcExpression::Variables(tokens) => {
                for sequence in &tokens.sequences {
                    for (position, color) in sequence.iter().enumerate() {
                        if let ParameterizedColor::Variable {
                            variable: used,
                            offset,
                        } = *color
                        {
                            if used == variable {
                                out.push(VariableUse { position, offset });
                            }
                        }
                    }
                }
            }
            ArcExpression::Add(lhs, rhs) => {
                lhs.variable_uses(variable, out);
                rhs.variable_uses(variable, out);
            }
            ArcExpression::Sub(..) => {}
            ArcExpression::Scale(inner, factor) => {
                if *factor > 0 {
                    inner.variable_uses(variable, out);
                }
            }
        }
    }

    /// Tuple arity of the tokens this expression moves, when it moves any.
    pub fn arity(&self) -> Option<usize> {
        match self {
            ArcExpression::Constant(multiset) => multiset
                .entries()
                .iter()
                .find(|(_, count)| *count > 0)
                .map(|(sequence, _)| sequence.arity()),
            ArcExpression::Variables(tokens) => Some(tokens.domains.len()),
            ArcExpression::Add(lhs, rhs) | ArcExpression::Sub(lhs, rhs) => {
                lhs.arity().or_else(|| rhs.arity())
            }
            ArcExpression::Scale(inner, _) => inner.arity(),
        }
    }

    /// Whether a clamped subtraction survived folding.
    pub fn contains_unfolded_subtraction(&self) -> bool {
        match self {
            ArcExpression::Constant(_) | ArcExpression::Variables(_) => false,
            ArcExpression::Sub(..) => true,
            ArcExpression::Add(lhs, rhs) => {
                lhs.contains_unfolded_subtraction() || rhs.contains_unfolded_subtraction()
            }
            ArcExpression::Scale(inner, _) => inner.contains_unfolded_subtraction(),
        }
    }

    /// Splits sequences without variables out of every [`VariableTokens`]
    /// node into a constant part, so folding can merge them.
    fn lift_constants(self) -> ArcExpression {
        match self {
            ArcExpression::Variables(tokens) => {
                let mut constant = ColorMultiset::new();
                let mut variable = Vec::new();
                for sequence in tokens.sequences {
                    if sequence.iter().any(|color| color.constant_value().is_none()) {
                        variable.push(sequence);
                    } else {
                        let resolved = ColorSequence::new(
                            sequence.iter().filter_map(|color| color.constant_value()),
                        );
                        constant.add_count(resolved, tokens.scale);
                    }
                }
                let remainder = VariableTokens {
                    sequences: variable,
                    domains: tokens.domains,
                    scale: tokens.scale,
                };
                match (constant.total_count() > 0, !remainder.sequences.is_empty()) {
                    (true, true) => ArcExpression::Add(
                        Box::new(ArcExpression::Constant(constant)),
                        Box::new(ArcExpression::Variables(remainder)),
                    ),
                    (true, false) => ArcExpression::Constant(constant),
                    (false, true) => ArcExpression::Variables(remainder),
                    (false, false) => ArcExpression::Constant(ColorMultiset::new()),
                }
            }
            ArcExpression::Add(lhs, rhs) => ArcExpression::Add(
                Box::new(lhs.lift_constants()),
                Box::new(rhs.lift_constants()),
            ),
            ArcExpression::Sub(lhs, rhs) => ArcExpression::Sub(
                Box::new(lhs.lift_constants()),
                Box::new(rhs.lift_constants()),
            ),
            ArcExpression::Scale(inner, factor) => {
                ArcExpression::Scale(Box::new(inner.lift_constants()), factor)
            }
            leaf => leaf,
        }
    }

    /// Bottom-up merge of constant-only subtrees. Running it twice yields
    /// the same tree as running it once.
    fn fold_constants(self) -> ArcExpression {
        match self {
            ArcExpression::Add(lhs, rhs) => {
                match (lhs.fold_constants(), rhs.fold_constants()) {
                    (ArcExpression::Constant(mut lhs), ArcExpression::Constant(rhs)) => {
                        lhs += &rhs;
                        ArcExpression::Constant(lhs)
                    }
                    (lhs, rhs) => ArcExpression::Add(Box::new(lhs), Box::new(rhs)),
                }
            }
            ArcExpression::Sub(lhs, rhs) => {
                match (lhs.fold_constants(), rhs.fold_constants()) {
                    (ArcExpression::Constant(mut lhs), ArcExpression::Constant(rhs)) => {
                        lhs -= &rhs;
                        lhs.fix_negative();
                        ArcExpression::Constant(lhs)
                    }
                    (lhs, rhs) => ArcExpression::Sub(Box::new(lhs), Box::new(rhs)),
                }
            }
            ArcExpression::Scale(inner, factor) => match inner.fold_constants() {
                ArcExpression::Constant(mut multiset) => {
                    multiset *= factor;
                    ArcExpression::Constant(multiset)
                }
                inner => ArcExpression::Scale(Box::new(inner), factor),
            },
            leaf => leaf,
        }
    }
}

fn lower(expr: &ast::ArcExpression, symbols: &SymbolTable) -> Result<ArcExpression, BuildError> {
    match expr {
        ast::ArcExpression::Single(color) => lower_tuple(std::slice::from_ref(color), symbols),
        ast::ArcExpression::Tuple(colors) => lower_tuple(colors, symbols),
        ast::ArcExpression::NumberOf { count, inner } => {
            scale_node(lower(inner, symbols)?, *count)
        }
        ast::ArcExpression::Add(children) => {
            let mut lowered = Vec::with_capacity(children.len());
            for child in children {
                lowered.push(lower(child, symbols)?);
            }
            let mut iter = lowered.into_iter();
            match iter.next() {
                None => Ok(ArcExpression::Constant(ColorMultiset::new())),
                Some(first) => Ok(iter.fold(first, |acc, next| {
                    ArcExpression::Add(Box::new(acc), Box::new(next))
                })),
            }
        }
        ast::ArcExpression::Subtract { lhs, rhs } => Ok(ArcExpression::Sub(
            Box::new(lower(lhs, symbols)?),
            Box::new(lower(rhs, symbols)?),
        )),
        ast::ArcExpression::ScalarProduct { scalar, inner } => {
            scale_node(lower(inner, symbols)?, *scalar)
        }
    }
}

fn scale_node(inner: ArcExpression, factor: u64) -> Result<ArcExpression, BuildError> {
    let factor = TokenCount::try_from(factor).map_err(|_| BuildError::TooManyTokens(factor))?;
    Ok(ArcExpression::Scale(Box::new(inner), factor))
}

fn lower_tuple(
    colors: &[ColorExpression],
    symbols: &SymbolTable,
) -> Result<ArcExpression, BuildError> {
    if colors.is_empty() {
        return Err(BuildError::UnsupportedExpression("empty tuple"));
    }
    let mut domains = Vec::with_capacity(colors.len());
    let mut choices = Vec::with_capacity(colors.len());
    for color in colors {
        let (options, domain) = lower_color(color, symbols)?;
        domains.push(domain);
        choices.push(options);
    }
    let sequences = choices.into_iter().multi_cartesian_product().collect();
    Ok(ArcExpression::Variables(VariableTokens {
        sequences,
        domains,
        scale: 1,
    }))
}

fn lower_color(
    expr: &ColorExpression,
    symbols: &SymbolTable,
) -> Result<(Vec<ParameterizedColor>, u32), BuildError> {
    let mut offset = 0i64;
    let mut current = expr;
    loop {
        match current {
            ColorExpression::Successor(inner) => {
                offset += 1;
                current = inner;
            }
            ColorExpression::Predecessor(inner) => {
                offset -= 1;
                current = inner;
            }
            ColorExpression::Constant { color_type, color } => {
                let (value, domain) = symbols.color(color_type, color)?;
                let folded = signed_wrap(i64::from(value) + offset, domain);
                return Ok((vec![ParameterizedColor::Constant(folded)], domain));
            }
            ColorExpression::Variable { name } => {
                let (variable, domain) = symbols.variable(name)?;
                return Ok((
                    vec![ParameterizedColor::Variable { variable, offset }],
                    domain,
                ));
            }
            ColorExpression::All { color_type } => {
                let domain = symbols.color_type_size(color_type)?;
                let options = (0..domain).map(ParameterizedColor::Constant).collect();
                return Ok((options, domain));
            }
        }
    }
}
