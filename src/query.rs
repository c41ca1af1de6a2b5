//! Reachability queries over markings.
//!
//! A query is a single `EF` or `AG` quantifier wrapped around a boolean
//! condition on one marking: token-count comparisons, deadlock, transition
//! fireability, and boolean combinators. Compilation resolves place and
//! transition names against a built net and rejects anything that is not
//! exactly one top-level quantifier.
//!
//! Besides evaluation, a compiled predicate measures [`StatePredicate::distance`]:
//! an admissible-ish guess of how far a marking is from satisfying (or,
//! negated, violating) the condition. The best-first search strategy orders
//! its waiting list by it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::marking::ColoredMarking;
use crate::net::structure::ColoredNet;
use crate::search::successor::SuccessorGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    /// Some reachable marking satisfies the condition.
    ExistsFinally,
    /// Every reachable marking satisfies the condition.
    AlwaysGlobally,
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::ExistsFinally => write!(f, "EF"),
            Quantifier::AlwaysGlobally => write!(f, "AG"),
        }
    }
}

/// Condition tree as written in models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    ExistsFinally(Box<Condition>),
    AlwaysGlobally(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    LessThan(CountExpression, CountExpression),
    LessThanOrEqual(CountExpression, CountExpression),
    Equal(CountExpression, CountExpression),
    NotEqual(CountExpression, CountExpression),
    /// No transition has any enabled binding.
    Deadlock,
    /// The named transition has at least one enabled binding.
    Fireable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CountExpression {
    /// Total token count of the named place.
    Place(String),
    Literal(u64),
}

/// A compiled query: quantifier plus resolved predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub quantifier: Quantifier,
    pub predicate: StatePredicate,
}

impl CompiledQuery {
    pub fn compile(condition: &Condition, net: &ColoredNet) -> Result<CompiledQuery, EngineError> {
        let (quantifier, inner) = match condition {
            Condition::ExistsFinally(inner) => (Quantifier::ExistsFinally, inner),
            Condition::AlwaysGlobally(inner) => (Quantifier::AlwaysGlobally, inner),
            _ => return Err(EngineError::UnsupportedQuery),
        };
        Ok(CompiledQuery {
            quantifier,
            predicate: compile_predicate(inner, net)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountValue {
    Place(PlaceId),
    Literal(u64),
}

impl CountValue {
    fn value(self, marking: &ColoredMarking) -> u64 {
        match self {
            CountValue::Place(place) => marking.place_count(place),
            CountValue::Literal(value) => value,
        }
    }
}

/// A condition with names resolved, evaluable on a single marking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePredicate {
    And(Vec<StatePredicate>),
    Or(Vec<StatePredicate>),
    Not(Box<StatePredicate>),
    LessThan(CountValue, CountValue),
    LessThanOrEqual(CountValue, CountValue),
    Equal(CountValue, CountValue),
    NotEqual(CountValue, CountValue),
    Deadlock,
    Fireable(TransitionId),
}

impl StatePredicate {
    /// Evaluates on `marking`. Deadlock and fireability probe the successor
    /// generator without touching its per-state caches.
    pub fn eval(&self, generator: &SuccessorGenerator<'_>, marking: &ColoredMarking) -> bool {
        match self {
            StatePredicate::And(children) => {
                children.iter().all(|child| child.eval(generator, marking))
            }
            StatePredicate::Or(children) => {
                children.iter().any(|child| child.eval(generator, marking))
            }
            StatePredicate::Not(inner) => !inner.eval(generator, marking),
            StatePredicate::LessThan(lhs, rhs) => lhs.value(marking) < rhs.value(marking),
            StatePredicate::LessThanOrEqual(lhs, rhs) => lhs.value(marking) <= rhs.value(marking),
            StatePredicate::Equal(lhs, rhs) => lhs.value(marking) == rhs.value(marking),
            StatePredicate::NotEqual(lhs, rhs) => lhs.value(marking) != rhs.value(marking),
            StatePredicate::Deadlock => !generator.has_enabled(marking),
            StatePredicate::Fireable(transition) => generator.is_fireable(marking, *transition),
        }
    }

    /// Token-count distance from `marking` to a marking satisfying this
    /// predicate (or its negation when `negated`). Zero means satisfied;
    /// structural predicates contribute nothing.
    pub fn distance(&self, marking: &ColoredMarking, negated: bool) -> u64 {
        match self {
            StatePredicate::And(children) => {
                if negated {
                    children
                        .iter()
                        .map(|child| child.distance(marking, true))
                        .min()
                        .unwrap_or(0)
                } else {
                    children
                        .iter()
                        .fold(0u64, |sum, child| {
                            sum.saturating_add(child.distance(marking, false))
                        })
                }
            }
            StatePredicate::Or(children) => {
                if negated {
                    children
                        .iter()
                        .fold(0u64, |sum, child| {
                            sum.saturating_add(child.distance(marking, true))
                        })
                } else {
                    children
                        .iter()
                        .map(|child| child.distance(marking, false))
                        .min()
                        .unwrap_or(0)
                }
            }
            StatePredicate::Not(inner) => inner.distance(marking, !negated),
            StatePredicate::LessThan(lhs, rhs) => {
                let (lhs, rhs) = (lhs.value(marking), rhs.value(marking));
                if negated {
                    if lhs >= rhs { 0 } else { rhs - lhs }
                } else if lhs < rhs {
                    0
                } else {
                    (lhs - rhs).saturating_add(1)
                }
            }
            StatePredicate::LessThanOrEqual(lhs, rhs) => {
                let (lhs, rhs) = (lhs.value(marking), rhs.value(marking));
                if negated {
                    if lhs > rhs {
                        0
                    } else {
                        (rhs - lhs).saturating_add(1)
                    }
                } else if lhs <= rhs {
                    0
                } else {
                    lhs - rhs
                }
            }
            StatePredicate::Equal(lhs, rhs) => {
                let (lhs, rhs) = (lhs.value(marking), rhs.value(marking));
                if negated {
                    u64::from(lhs == rhs)
                } else {
                    lhs.abs_diff(rhs)
                }
            }
            StatePredicate::NotEqual(lhs, rhs) => {
                let (lhs, rhs) = (lhs.value(marking), rhs.value(marking));
                if negated {
                    lhs.abs_diff(rhs)
                } else {
                    u64::from(lhs != rhs)
                }
            }
            StatePredicate::Deadlock | StatePredicate::Fireable(_) => 0,
        }
    }
}

fn compile_predicate(
    condition: &Condition,
    net: &ColoredNet,
) -> Result<StatePredicate, EngineError> {
    match condition {
        Condition::ExistsFinally(_) | Condition::AlwaysGlobally(_) => {
            Err(EngineError::UnsupportedQuery)
        }
        Condition::And(children) => Ok(StatePredicate::And(
            children
                .iter()
                .map(|child| compile_predicate(child, net))
                .collect::<Result<_, _>>()?,
        )),
        Condition::Or(children) => Ok(StatePredicate::Or(
            children
                .iter()
                .map(|child| compile_predicate(child, net))
                .collect::<Result<_, _>>()?,
        )),
        Condition::Not(inner) => Ok(StatePredicate::Not(Box::new(compile_predicate(
            inner, net,
        )?))),
        Condition::LessThan(lhs, rhs) => Ok(StatePredicate::LessThan(
            compile_count(lhs, net)?,
            compile_count(rhs, net)?,
        )),
        Condition::LessThanOrEqual(lhs, rhs) => Ok(StatePredicate::LessThanOrEqual(
            compile_count(lhs, net)?,
            compile_count(rhs, net)?,
        )),
        Condition::Equal(lhs, rhs) => Ok(StatePredicate::Equal(
            compile_count(lhs, net)?,
            compile_count(rhs, net)?,
        )),
        Condition::NotEqual(lhs, rhs) => Ok(StatePredicate::NotEqual(
            compile_count(lhs, net)?,
            compile_count(rhs, net)?,
        )),
        Condition::Deadlock => Ok(StatePredicate::Deadlock),
        Condition::Fireable(name) => {
            let transition = net
                .find_transition(name)
                .ok_or_else(|| EngineError::UnknownTransition(name.clone()))?;
            Ok(StatePredicate::Fireable(transition))
        }
    }
}

fn compile_count(expr: &CountExpression, net: &ColoredNet) -> Result<CountValue, EngineError> {
    match expr {
        CountExpression::Place(name) => {
            let place = net
                .find_place(name)
                .ok_or_else(|| EngineError::UnknownPlace(name.clone()))?;
            Ok(CountValue::Place(place))
        }
        CountExpression::Literal(value) => Ok(CountValue::Literal(*value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ast::{ArcExpression, ColorExpression};
    use crate::net::builder::TokenDecl;
    use crate::net::multiset::ColorSequence;
    use crate::net::NetBuilder;
    use crate::search::GeneratorMode;

    fn net_with_one_transition() -> ColoredNet {
        let mut builder = NetBuilder::new();
        builder.add_color_type("dot");
        builder.add_to_color_type("dot", "dot");
        builder.add_place("p", &["dot"], vec![TokenDecl::new(&["dot"], 2)]);
        builder.add_place("q", &["dot"], Vec::new());
        builder.add_transition("t", None);
        builder.add_input_arc(
            "p",
            "t",
            ArcExpression::Single(ColorExpression::color("dot", "dot")),
        );
        builder.build().unwrap()
    }

    fn marking(p: u64, q: u64) -> ColoredMarking {
        let mut marking = ColoredMarking::empty(2);
        marking
            .place_mut(PlaceId::new(0))
            .add_count(ColorSequence::single(0), p as i64);
        marking
            .place_mut(PlaceId::new(1))
            .add_count(ColorSequence::single(0), q as i64);
        marking
    }

    #[test]
    fn compile_requires_one_top_level_quantifier() {
        let net = net_with_one_transition();
        let bare = Condition::Deadlock;
        assert_eq!(
            CompiledQuery::compile(&bare, &net).unwrap_err(),
            EngineError::UnsupportedQuery
        );

        let nested = Condition::ExistsFinally(Box::new(Condition::And(vec![
            Condition::AlwaysGlobally(Box::new(Condition::Deadlock)),
        ])));
        assert_eq!(
            CompiledQuery::compile(&nested, &net).unwrap_err(),
            EngineError::UnsupportedQuery
        );

        let good = Condition::AlwaysGlobally(Box::new(Condition::LessThan(
            CountExpression::Place("p".to_owned()),
            CountExpression::Literal(5),
        )));
        let compiled = CompiledQuery::compile(&good, &net).unwrap();
        assert_eq!(compiled.quantifier, Quantifier::AlwaysGlobally);
    }

    #[test]
    fn unknown_names_are_compile_errors() {
        let net = net_with_one_transition();
        let query = Condition::ExistsFinally(Box::new(Condition::Equal(
            CountExpression::Place("nope".to_owned()),
            CountExpression::Literal(0),
        )));
        assert_eq!(
            CompiledQuery::compile(&query, &net).unwrap_err(),
            EngineError::UnknownPlace("nope".to_owned())
        );

        let query = Condition::ExistsFinally(Box::new(Condition::Fireable("nope".to_owned())));
        assert_eq!(
            CompiledQuery::compile(&query, &net).unwrap_err(),
            EngineError::UnknownTransition("nope".to_owned())
        );
    }

    #[test]
    fn comparison_distances() {
        let m = marking(3, 0);
        let p = CountValue::Place(PlaceId::new(0));

        let lt = StatePredicate::LessThan(p, CountValue::Literal(2));
        assert_eq!(lt.distance(&m, false), 2); // 3 -> below 2 needs 3-2+1
        assert_eq!(lt.distance(&m, true), 0);

        let le = StatePredicate::LessThanOrEqual(p, CountValue::Literal(3));
        assert_eq!(le.distance(&m, false), 0);
        assert_eq!(le.distance(&m, true), 1);

        let eq = StatePredicate::Equal(p, CountValue::Literal(7));
        assert_eq!(eq.distance(&m, false), 4);
        assert_eq!(eq.distance(&m, true), 0);

        let ne = StatePredicate::NotEqual(p, CountValue::Literal(3));
        assert_eq!(ne.distance(&m, false), 1);
        assert_eq!(ne.distance(&m, true), 0);
    }

    #[test]
    fn combinator_distances_sum_and_min() {
        let m = marking(3, 1);
        let p = CountValue::Place(PlaceId::new(0));
        let q = CountValue::Place(PlaceId::new(1));
        let want_p_zero = StatePredicate::Equal(p, CountValue::Literal(0));
        let want_q_zero = StatePredicate::Equal(q, CountValue::Literal(0));

        let both = StatePredicate::And(vec![want_p_zero.clone(), want_q_zero.clone()]);
        assert_eq!(both.distance(&m, false), 4);
        let either = StatePredicate::Or(vec![want_p_zero.clone(), want_q_zero.clone()]);
        assert_eq!(either.distance(&m, false), 1);

        let negated = StatePredicate::Not(Box::new(want_p_zero));
        assert_eq!(negated.distance(&m, false), 0);
        assert_eq!(negated.distance(&m, true), 3);
    }

    #[test]
    fn deadlock_and_fireable_probe_the_generator() {
        let net = net_with_one_transition();
        let generator = SuccessorGenerator::new(&net, GeneratorMode::Fixed);
        let t = net.find_transition("t").unwrap();

        let initial = net.initial_marking().clone();
        assert!(StatePredicate::Fireable(t).eval(&generator, &initial));
        assert!(!StatePredicate::Deadlock.eval(&generator, &initial));

        let drained = marking(0, 0);
        assert!(!StatePredicate::Fireable(t).eval(&generator, &drained));
        assert!(StatePredicate::Deadlock.eval(&generator, &drained));
    }
}
