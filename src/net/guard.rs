//! Compiled transition guards.
//!
//! Lowering resolves every color expression to either a literal color or a
//! variable plus a signed offset, so evaluation is a table lookup and a
//! wrap per operand. Offsets on constants are folded away at compile time.

use crate::error::BuildError;
use crate::net::ast::{ColorExpression, GuardExpression};
use crate::net::binding::{Binding, signed_wrap};
use crate::net::builder::SymbolTable;
use crate::net::ids::{Color, VariableId};

/// One side of a guard comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOperand {
    Constant(Color),
    Variable {
        variable: VariableId,
        offset: i64,
        domain: u32,
    },
}

impl GuardOperand {
    fn resolve(&self, binding: &Binding) -> Color {
        match *self {
            GuardOperand::Constant(color) => color,
            GuardOperand::Variable {
                variable,
                offset,
                domain,
            } => signed_wrap(i64::from(binding.value(variable)) + offset, domain),
        }
    }

    fn collect_variables(&self, out: &mut Vec<VariableId>) {
        if let GuardOperand::Variable { variable, .. } = *self {
            out.push(variable);
        }
    }
}

/// A guard lowered to comparisons over [`GuardOperand`]s. Sequence
/// comparisons keep one operand pair per tuple position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledGuard {
    And(Vec<CompiledGuard>),
    Or(Vec<CompiledGuard>),
    LessThan(GuardOperand, GuardOperand),
    LessThanOrEqual(GuardOperand, GuardOperand),
    Equality(Vec<(GuardOperand, GuardOperand)>),
    Inequality(Vec<(GuardOperand, GuardOperand)>),
}

impl CompiledGuard {
    pub fn eval(&self, binding: &Binding) -> bool {
        match self {
            CompiledGuard::And(children) => children.iter().all(|child| child.eval(binding)),
            CompiledGuard::Or(children) => children.iter().any(|child| child.eval(binding)),
            CompiledGuard::LessThan(lhs, rhs) => lhs.resolve(binding) < rhs.resolve(binding),
            CompiledGuard::LessThanOrEqual(lhs, rhs) => {
                lhs.resolve(binding) <= rhs.resolve(binding)
            }
            CompiledGuard::Equality(pairs) => pairs
                .iter()
                .all(|(lhs, rhs)| lhs.resolve(binding) == rhs.resolve(binding)),
            CompiledGuard::Inequality(pairs) => pairs
                .iter()
                .any(|(lhs, rhs)| lhs.resolve(binding) != rhs.resolve(binding)),
        }
    }

    pub fn collect_variables(&self, out: &mut Vec<VariableId>) {
        match self {
            CompiledGuard::And(children) | CompiledGuard::Or(children) => {
                for child in children {
                    child.collect_variables(out);
                }
            }
            CompiledGuard::LessThan(lhs, rhs) | CompiledGuard::LessThanOrEqual(lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            CompiledGuard::Equality(pairs) | CompiledGuard::Inequality(pairs) => {
                for (lhs, rhs) in pairs {
                    lhs.collect_variables(out);
                    rhs.collect_variables(out);
                }
            }
        }
    }

    pub(crate) fn compile(
        expr: &GuardExpression,
        symbols: &SymbolTable,
    ) -> Result<CompiledGuard, BuildError> {
        match expr {
            GuardExpression::And(children) => Ok(CompiledGuard::And(
                children
                    .iter()
                    .map(|child| CompiledGuard::compile(child, symbols))
                    .collect::<Result<_, _>>()?,
            )),
            GuardExpression::Or(children) => Ok(CompiledGuard::Or(
                children
                    .iter()
                    .map(|child| CompiledGuard::compile(child, symbols))
                    .collect::<Result<_, _>>()?,
            )),
            GuardExpression::LessThan { lhs, rhs } => Ok(CompiledGuard::LessThan(
                compile_operand(lhs, symbols)?,
                compile_operand(rhs, symbols)?,
            )),
            GuardExpression::LessThanOrEqual { lhs, rhs } => Ok(CompiledGuard::LessThanOrEqual(
                compile_operand(lhs, symbols)?,
                compile_operand(rhs, symbols)?,
            )),
            GuardExpression::Equality { lhs, rhs } => {
                Ok(CompiledGuard::Equality(compile_pairs(lhs, rhs, symbols)?))
            }
            GuardExpression::Inequality { lhs, rhs } => {
                Ok(CompiledGuard::Inequality(compile_pairs(lhs, rhs, symbols)?))
            }
        }
    }
}

fn compile_pairs(
    lhs: &[ColorExpression],
    rhs: &[ColorExpression],
    symbols: &SymbolTable,
) -> Result<Vec<(GuardOperand, GuardOperand)>, BuildError> {
    if lhs.len() != rhs.len() {
        return Err(BuildError::GuardArityMismatch);
    }
    lhs.iter()
        .zip(rhs)
        .map(|(l, r)| Ok((compile_operand(l, symbols)?, compile_operand(r, symbols)?)))
        .collect()
}

fn compile_operand(
    expr: &ColorExpression,
    symbols: &SymbolTable,
) -> Result<GuardOperand, BuildError> {
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
                return Ok(GuardOperand::Constant(signed_wrap(
                    i64::from(value) + offset,
                    domain,
                )));
            }
            ColorExpression::Variable { name } => {
                let (variable, domain) = symbols.variable(name)?;
                return Ok(GuardOperand::Variable {
                    variable,
                    offset,
                    domain,
                });
            }
            ColorExpression::All { .. } => {
                return Err(BuildError::UnsupportedExpression(
                    "'all' cannot appear in a guard",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(index: u32, offset: i64, domain: u32) -> GuardOperand {
        GuardOperand::Variable {
            variable: VariableId::new(index),
            offset,
            domain,
        }
    }

    fn binding(values: &[Color]) -> Binding {
        let mut binding = Binding::zeroed(values.len());
        for (index, &color) in values.iter().enumerate() {
            binding.set(VariableId::new(index as u32), color);
        }
        binding
    }

    #[test]
    fn comparison_applies_wrapped_offset() {
        // x + 1 < 2 over a domain of size 3
        let guard = CompiledGuard::LessThan(var(0, 1, 3), GuardOperand::Constant(2));
        assert!(guard.eval(&binding(&[0])));
        assert!(!guard.eval(&binding(&[1])));
        // 2 + 1 wraps to 0
        assert!(guard.eval(&binding(&[2])));
    }

    #[test]
    fn equality_compares_component_wise() {
        let guard = CompiledGuard::Equality(vec![
            (var(0, 0, 4), GuardOperand::Constant(1)),
            (var(1, 0, 4), GuardOperand::Constant(3)),
        ]);
        assert!(guard.eval(&binding(&[1, 3])));
        assert!(!guard.eval(&binding(&[1, 2])));

        let negated = CompiledGuard::Inequality(vec![
            (var(0, 0, 4), GuardOperand::Constant(1)),
            (var(1, 0, 4), GuardOperand::Constant(3)),
        ]);
        assert!(!negated.eval(&binding(&[1, 3])));
        assert!(negated.eval(&binding(&[1, 2])));
    }

    #[test]
    fn conjunction_and_disjunction_short_circuit_values() {
        let left = CompiledGuard::LessThan(var(0, 0, 5), GuardOperand::Constant(2));
        let right = CompiledGuard::LessThan(var(1, 0, 5), GuardOperand::Constant(2));
        let both = CompiledGuard::And(vec![left.clone(), right.clone()]);
        let either = CompiledGuard::Or(vec![left, right]);

        assert!(both.eval(&binding(&[1, 1])));
        assert!(!both.eval(&binding(&[1, 4])));
        assert!(either.eval(&binding(&[1, 4])));
        assert!(!either.eval(&binding(&[4, 4])));
    }

    #[test]
    fn collects_variables_from_all_operands() {
        let guard = CompiledGuard::And(vec![
            CompiledGuard::LessThan(var(2, 0, 5), var(0, 1, 5)),
            CompiledGuard::Equality(vec![(var(1, 0, 5), GuardOperand::Constant(0))]),
        ]);
        let mut variables = Vec::new();
        guard.collect_variables(&mut variables);
        variables.sort();
        variables.dedup();
        assert_eq!(
            variables,
            vec![VariableId::new(0), VariableId::new(1), VariableId::new(2)]
        );
    }
}
