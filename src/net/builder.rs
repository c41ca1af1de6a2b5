//! Net assembly.
//!
//! The builder accepts declarations in any order and resolves nothing until
//! [`NetBuilder::build`]: arcs may name places declared later, guards may
//! mention variables whose color type grows afterwards. `build` materializes
//! variables, compiles guards and arcs, lays the arcs out grouped per
//! transition (inputs first), computes each transition's relevant variables
//! and binding code, and merges the pre-place constraints the successor
//! generator prunes with.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::net::arc::ArcExpression;
use crate::net::ast;
use crate::net::binding::BindingCodec;
use crate::net::guard::CompiledGuard;
use crate::net::ids::{Color, PlaceId, TransitionId, VariableId};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::marking::ColoredMarking;
use crate::net::multiset::{ColorSequence, TokenCount};
use crate::net::structure::{
    ArcSplit, ColorVariable, ColoredNet, ColoredPlace, ColoredTransition, InhibitorArc, NetArc,
    NetProperties, VariableConstraint,
};

/// One line of a place's initial marking: `count` tokens of the written
/// color sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDecl {
    pub colors: Vec<String>,
    pub count: u64,
}

impl TokenDecl {
    pub fn new(colors: &[&str], count: u64) -> Self {
        TokenDecl {
            colors: colors.iter().map(|&color| color.to_owned()).collect(),
            count,
        }
    }
}

#[derive(Debug, Clone)]
struct PlaceDecl {
    name: String,
    domain: Vec<String>,
    initial: Vec<TokenDecl>,
}

#[derive(Debug, Clone)]
struct TransitionDecl {
    name: String,
    guard: Option<ast::GuardExpression>,
}

#[derive(Debug, Clone)]
struct ArcDecl {
    place: String,
    transition: String,
    expression: ast::ArcExpression,
}

#[derive(Debug, Clone)]
struct InhibitorDecl {
    place: String,
    transition: String,
    weight: u64,
}

#[derive(Debug, Default)]
pub struct NetBuilder {
    color_types: IndexMap<String, Vec<String>>,
    variables: IndexMap<String, String>,
    places: Vec<PlaceDecl>,
    transitions: Vec<TransitionDecl>,
    input_arcs: Vec<ArcDecl>,
    output_arcs: Vec<ArcDecl>,
    inhibitors: Vec<InhibitorDecl>,
}

impl NetBuilder {
    pub fn new() -> Self {
        NetBuilder::default()
    }

    pub fn add_color_type(&mut self, name: impl Into<String>) {
        self.color_types.entry(name.into()).or_default();
    }

    /// Appends a color to a type, creating the type if needed. The color's
    /// value is its position in declaration order.
    pub fn add_to_color_type(&mut self, color_type: &str, color: &str) {
        self.color_types
            .entry(color_type.to_owned())
            .or_default()
            .push(color.to_owned());
    }

    pub fn add_variable(&mut self, name: impl Into<String>, color_type: &str) {
        self.variables.insert(name.into(), color_type.to_owned());
    }

    pub fn add_place(&mut self, name: impl Into<String>, domain: &[&str], initial: Vec<TokenDecl>) {
        self.places.push(PlaceDecl {
            name: name.into(),
            domain: domain.iter().map(|&name| name.to_owned()).collect(),
            initial,
        });
    }

    pub fn add_transition(&mut self, name: impl Into<String>, guard: Option<ast::GuardExpression>) {
        self.transitions.push(TransitionDecl {
            name: name.into(),
            guard,
        });
    }

    pub fn add_input_arc(&mut self, place: &str, transition: &str, expression: ast::ArcExpression) {
        self.input_arcs.push(ArcDecl {
            place: place.to_owned(),
            transition: transition.to_owned(),
            expression,
        });
    }

    pub fn add_output_arc(
        &mut self,
        transition: &str,
        place: &str,
        expression: ast::ArcExpression,
    ) {
        self.output_arcs.push(ArcDecl {
            place: place.to_owned(),
            transition: transition.to_owned(),
            expression,
        });
    }

    pub fn add_inhibitor_arc(&mut self, place: &str, transition: &str, weight: u64) {
        self.inhibitors.push(InhibitorDecl {
            place: place.to_owned(),
            transition: transition.to_owned(),
            weight,
        });
    }

    /// Orders pending arc declarations by endpoint names, so the built arc
    /// layout does not depend on insertion order. `build` calls this.
    pub fn sort(&mut self) {
        let key = |arc: &ArcDecl| (arc.transition.clone(), arc.place.clone());
        self.input_arcs.sort_by_key(key);
        self.output_arcs.sort_by_key(key);
        self.inhibitors
            .sort_by(|a, b| a.transition.cmp(&b.transition));
    }

    pub fn build(mut self) -> Result<ColoredNet, BuildError> {
        self.sort();

        let mut variables: IndexVec<VariableId, ColorVariable> =
            IndexVec::with_capacity(self.variables.len());
        let mut variable_table: IndexMap<&str, (VariableId, u32)> = IndexMap::new();
        for (name, type_name) in &self.variables {
            let domain = color_type_size(&self.color_types, type_name)?;
            let id = variables.push(ColorVariable {
                name: name.clone(),
                domain,
            });
            variable_table.insert(name.as_str(), (id, domain));
        }
        let symbols = SymbolTable {
            color_types: &self.color_types,
            variables: variable_table,
        };

        let mut places: IndexVec<PlaceId, ColoredPlace> = IndexVec::with_capacity(self.places.len());
        let mut place_table: IndexMap<&str, PlaceId> = IndexMap::new();
        for decl in &self.places {
            if decl.domain.is_empty() {
                return Err(BuildError::EmptyDomain(decl.name.clone()));
            }
            let mut domains = Vec::with_capacity(decl.domain.len());
            for type_name in &decl.domain {
                domains.push(color_type_size(&self.color_types, type_name)?);
            }
            let id = places.push(ColoredPlace {
                name: decl.name.clone(),
                domains,
            });
            if place_table.insert(decl.name.as_str(), id).is_some() {
                return Err(BuildError::DuplicateName(decl.name.clone()));
            }
        }

        let mut initial_marking = ColoredMarking::empty(places.len());
        for (index, decl) in self.places.iter().enumerate() {
            let place_id = PlaceId::new(index as u32);
            for token in &decl.initial {
                if token.colors.len() != decl.domain.len() {
                    return Err(BuildError::ArityMismatch(decl.name.clone()));
                }
                let mut sequence = Vec::with_capacity(token.colors.len());
                for (color, type_name) in token.colors.iter().zip(&decl.domain) {
                    let (value, _) = symbols.color(type_name, color)?;
                    sequence.push(value);
                }
                let count = TokenCount::try_from(token.count)
                    .map_err(|_| BuildError::TooManyTokens(token.count))?;
                initial_marking
                    .place_mut(place_id)
                    .add_count(ColorSequence::new(sequence), count);
            }
        }

        let mut properties = NetProperties::empty();
        let mut transitions: IndexVec<TransitionId, ColoredTransition> =
            IndexVec::with_capacity(self.transitions.len());
        let mut transition_table: IndexMap<&str, TransitionId> = IndexMap::new();
        for decl in &self.transitions {
            let guard = decl
                .guard
                .as_ref()
                .map(|guard| CompiledGuard::compile(guard, &symbols))
                .transpose()?;
            if guard.is_some() {
                properties |= NetProperties::HAS_GUARDS;
            }
            let id = transitions.push(ColoredTransition {
                name: decl.name.clone(),
                guard,
                variables: Vec::new(),
                codec: BindingCodec::empty(),
                total_bindings: 0,
                constraints: Vec::new(),
            });
            if transition_table.insert(decl.name.as_str(), id).is_some() {
                return Err(BuildError::DuplicateName(decl.name.clone()));
            }
        }

        let mut input_buckets: Vec<Vec<NetArc>> = vec![Vec::new(); transitions.len()];
        let mut output_buckets: Vec<Vec<NetArc>> = vec![Vec::new(); transitions.len()];
        for decl in &self.input_arcs {
            let arc = compile_arc(decl, &place_table, &transition_table, &symbols, &places, &mut properties)?;
            input_buckets[arc.transition.index()].push(arc);
        }
        for decl in &self.output_arcs {
            let arc = compile_arc(decl, &place_table, &transition_table, &symbols, &places, &mut properties)?;
            output_buckets[arc.transition.index()].push(arc);
        }

        let mut arcs = Vec::with_capacity(self.input_arcs.len() + self.output_arcs.len());
        let mut arc_splits: IndexVec<TransitionId, ArcSplit> =
            IndexVec::with_capacity(transitions.len());
        for (inputs, outputs) in input_buckets.into_iter().zip(output_buckets) {
            let input_start = arcs.len();
            arcs.extend(inputs);
            let output_start = arcs.len();
            arcs.extend(outputs);
            arc_splits.push(ArcSplit {
                input_start,
                output_start,
                end: arcs.len(),
            });
        }

        let mut inhibitor_buckets: Vec<Vec<InhibitorArc>> = vec![Vec::new(); transitions.len()];
        for decl in &self.inhibitors {
            let place = resolve_place(&place_table, &decl.place)?;
            let transition = resolve_transition(&transition_table, &decl.transition)?;
            properties |= NetProperties::HAS_INHIBITORS;
            inhibitor_buckets[transition.index()].push(InhibitorArc {
                place,
                transition,
                weight: decl.weight,
            });
        }
        let mut inhibitors = Vec::with_capacity(self.inhibitors.len());
        let mut inhibitor_splits: IndexVec<TransitionId, (usize, usize)> =
            IndexVec::with_capacity(transitions.len());
        for bucket in inhibitor_buckets {
            let start = inhibitors.len();
            inhibitors.extend(bucket);
            inhibitor_splits.push((start, inhibitors.len()));
        }

        for index in 0..transitions.len() {
            let id = TransitionId::new(index as u32);
            let mut relevant = Vec::new();
            if let Some(guard) = &transitions[id].guard {
                guard.collect_variables(&mut relevant);
            }
            let split = arc_splits[id];
            for arc in &arcs[split.input_start..split.end] {
                arc.expression.collect_variables(&mut relevant);
            }
            relevant.sort();
            relevant.dedup();

            let sizes = relevant
                .iter()
                .map(|&variable| u64::from(variables[variable].domain))
                .collect();
            let codec = BindingCodec::new(sizes)
                .ok_or_else(|| BuildError::TooManyBindings(transitions[id].name.clone()))?;
            let total_bindings = if relevant.is_empty() { 0 } else { codec.total() };

            let mut constraints: Vec<Vec<VariableConstraint>> = vec![Vec::new(); relevant.len()];
            for arc in &arcs[split.input_start..split.output_start] {
                let mut arc_variables = Vec::new();
                arc.expression.collect_variables(&mut arc_variables);
                arc_variables.sort();
                arc_variables.dedup();
                for variable in arc_variables {
                    let Ok(slot) = relevant.binary_search(&variable) else {
                        continue;
                    };
                    let mut uses = Vec::new();
                    arc.expression.variable_uses(variable, &mut uses);
                    constraints[slot].extend(uses.into_iter().map(|site| VariableConstraint {
                        place: arc.place,
                        position: site.position,
                        offset: site.offset,
                    }));
                }
            }
            for list in &mut constraints {
                list.sort();
                list.dedup();
            }

            let transition = &mut transitions[id];
            transition.variables = relevant;
            transition.codec = codec;
            transition.total_bindings = total_bindings;
            transition.constraints = constraints;
        }

        debug!(
            "built colored net: {} places, {} transitions, {} variables, {} arcs, properties {:?}",
            places.len(),
            transitions.len(),
            variables.len(),
            arcs.len(),
            properties
        );

        Ok(ColoredNet {
            places,
            transitions,
            variables,
            arcs,
            arc_splits,
            inhibitors,
            inhibitor_splits,
            initial_marking,
            properties,
        })
    }
}

/// Resolution tables shared by the guard and arc compilers.
pub(crate) struct SymbolTable<'a> {
    color_types: &'a IndexMap<String, Vec<String>>,
    variables: IndexMap<&'a str, (VariableId, u32)>,
}

impl SymbolTable<'_> {
    pub(crate) fn variable(&self, name: &str) -> Result<(VariableId, u32), BuildError> {
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::UnknownVariable(name.to_owned()))
    }

    pub(crate) fn color(&self, color_type: &str, color: &str) -> Result<(Color, u32), BuildError> {
        let colors = self
            .color_types
            .get(color_type)
            .ok_or_else(|| BuildError::UnknownColorType(color_type.to_owned()))?;
        let value = colors.iter().position(|candidate| candidate == color).ok_or_else(|| {
            BuildError::UnknownColor {
                color_type: color_type.to_owned(),
                color: color.to_owned(),
            }
        })?;
        Ok((value as Color, colors.len() as u32))
    }

    pub(crate) fn color_type_size(&self, name: &str) -> Result<u32, BuildError> {
        color_type_size(self.color_types, name)
    }
}

fn color_type_size(
    color_types: &IndexMap<String, Vec<String>>,
    name: &str,
) -> Result<u32, BuildError> {
    let colors = color_types
        .get(name)
        .ok_or_else(|| BuildError::UnknownColorType(name.to_owned()))?;
    if colors.is_empty() {
        return Err(BuildError::EmptyColorType(name.to_owned()));
    }
    Ok(colors.len() as u32)
}

fn compile_arc(
    decl: &ArcDecl,
    place_table: &IndexMap<&str, PlaceId>,
    transition_table: &IndexMap<&str, TransitionId>,
    symbols: &SymbolTable<'_>,
    places: &IndexVec<PlaceId, ColoredPlace>,
    properties: &mut NetProperties,
) -> Result<NetArc, BuildError> {
    let place = resolve_place(place_table, &decl.place)?;
    let transition = resolve_transition(transition_table, &decl.transition)?;
    let expression = ArcExpression::compile(&decl.expression, symbols)?;
    if let Some(arity) = expression.arity() {
        if arity != places[place].arity() {
            return Err(BuildError::ArityMismatch(decl.place.clone()));
        }
    }
    if expression.contains_unfolded_subtraction() {
        *properties |= NetProperties::CONTAINS_NEGATIVE;
    }
    let minimal_tokens = expression.minimal_marking();
    Ok(NetArc {
        place,
        transition,
        expression,
        minimal_tokens,
    })
}

fn resolve_place(table: &IndexMap<&str, PlaceId>, name: &str) -> Result<PlaceId, BuildError> {
    table
        .get(name)
        .copied()
        .ok_or_else(|| BuildError::UnknownPlace(name.to_owned()))
}

fn resolve_transition(
    table: &IndexMap<&str, TransitionId>,
    name: &str,
) -> Result<TransitionId, BuildError> {
    table
        .get(name)
        .copied()
        .ok_or_else(|| BuildError::UnknownTransition(name.to_owned()))
}
