//! The built net: immutable records the checker walks.
//!
//! Everything here comes out of [`crate::net::NetBuilder::build`] fully
//! resolved: names are gone from the hot paths, arcs are compiled, and each
//! transition carries its sorted variable list, the mixed-radix code over
//! their domains and the pre-place constraints used to prune bindings.

use bitflags::bitflags;

use crate::net::arc::ArcExpression;
use crate::net::binding::BindingCodec;
use crate::net::guard::CompiledGuard;
use crate::net::ids::{BindingIndex, PlaceId, TransitionId, VariableId};
use crate::net::index_vec::IndexVec;
use crate::net::marking::ColoredMarking;
use crate::net::multiset::ColorMultiset;

bitflags! {
    /// Structural facts derived once at build time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetProperties: u8 {
        /// Some arc keeps a clamped subtraction after constant folding, so
        /// intermediate token counts can dip below zero while firing.
        const CONTAINS_NEGATIVE = 1 << 0;
        const HAS_GUARDS = 1 << 1;
        const HAS_INHIBITORS = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct ColoredPlace {
    pub name: String,
    /// Domain size per tuple position of this place's color type.
    pub domains: Vec<u32>,
}

impl ColoredPlace {
    pub fn arity(&self) -> usize {
        self.domains.len()
    }
}

#[derive(Debug, Clone)]
pub struct ColorVariable {
    pub name: String,
    pub domain: u32,
}

/// One pre-place requirement on a variable: for a binding to fire, `place`
/// must hold a token whose color at `position` equals the variable's value
/// shifted by `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VariableConstraint {
    pub place: PlaceId,
    pub position: usize,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct ColoredTransition {
    pub name: String,
    pub guard: Option<CompiledGuard>,
    /// Variables the guard or any adjacent arc mentions, sorted by id.
    pub variables: Vec<VariableId>,
    /// Mixed-radix code over the domains of `variables`, in the same order.
    pub codec: BindingCodec,
    /// Product of the variable domains; zero when there are no variables.
    pub total_bindings: BindingIndex,
    /// Constraints per entry of `variables`, merged over all input arcs. An
    /// empty list leaves that variable unconstrained.
    pub constraints: Vec<Vec<VariableConstraint>>,
}

#[derive(Debug, Clone)]
pub struct NetArc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub expression: ArcExpression,
    /// Tokens the expression moves under every binding, precomputed for the
    /// pre-binding enabledness check.
    pub minimal_tokens: ColorMultiset,
}

#[derive(Debug, Clone, Copy)]
pub struct InhibitorArc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub weight: u64,
}

/// Slice bounds of one transition's arcs inside [`ColoredNet::arcs`]:
/// inputs first, outputs behind them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArcSplit {
    pub(crate) input_start: usize,
    pub(crate) output_start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone)]
pub struct ColoredNet {
    pub(crate) places: IndexVec<PlaceId, ColoredPlace>,
    pub(crate) transitions: IndexVec<TransitionId, ColoredTransition>,
    pub(crate) variables: IndexVec<VariableId, ColorVariable>,
    pub(crate) arcs: Vec<NetArc>,
    pub(crate) arc_splits: IndexVec<TransitionId, ArcSplit>,
    pub(crate) inhibitors: Vec<InhibitorArc>,
    pub(crate) inhibitor_splits: IndexVec<TransitionId, (usize, usize)>,
    pub(crate) initial_marking: ColoredMarking,
    pub(crate) properties: NetProperties,
}

impl ColoredNet {
    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn place(&self, id: PlaceId) -> &ColoredPlace {
        &self.places[id]
    }

    pub fn transition(&self, id: TransitionId) -> &ColoredTransition {
        &self.transitions[id]
    }

    pub fn variable(&self, id: VariableId) -> &ColorVariable {
        &self.variables[id]
    }

    pub fn transition_ids(&self) -> impl Iterator<Item = TransitionId> + use<> {
        (0..self.transitions.len() as u32).map(TransitionId::new)
    }

    pub fn input_arcs(&self, transition: TransitionId) -> &[NetArc] {
        let split = self.arc_splits[transition];
        &self.arcs[split.input_start..split.output_start]
    }

    pub fn output_arcs(&self, transition: TransitionId) -> &[NetArc] {
        let split = self.arc_splits[transition];
        &self.arcs[split.output_start..split.end]
    }

    pub fn inhibitors_of(&self, transition: TransitionId) -> &[InhibitorArc] {
        let (start, end) = self.inhibitor_splits[transition];
        &self.inhibitors[start..end]
    }

    pub fn initial_marking(&self) -> &ColoredMarking {
        &self.initial_marking
    }

    pub fn properties(&self) -> NetProperties {
        self.properties
    }

    /// Tuple arity per place, in id order. The marking decoder needs this
    /// to know how many color components to read per token.
    pub fn place_arities(&self) -> IndexVec<PlaceId, usize> {
        IndexVec::from_vec(self.places.iter().map(ColoredPlace::arity).collect())
    }

    pub fn find_place(&self, name: &str) -> Option<PlaceId> {
        self.places
            .iter_enumerated()
            .find(|(_, place)| place.name == name)
            .map(|(id, _)| id)
    }

    pub fn find_transition(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter_enumerated()
            .find(|(_, transition)| transition.name == name)
            .map(|(id, _)| id)
    }
}
