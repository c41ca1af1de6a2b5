//! Successor generation.
//!
//! A state's successors are the markings reached by firing every enabled
//! (transition, binding) pair once. The generator never materializes the
//! binding space: a cursor on the state records how far enumeration got,
//! and each call to [`SuccessorGenerator::next`] resumes from there.
//!
//! Three prunes keep the walk short. A transition is skipped outright when
//! an inhibitor arc blocks it or some input place holds fewer tokens than
//! the arc's minimal count. For the rest, the pre-place constraints are
//! intersected with the marking into per-variable candidate sets, and only
//! the product of those candidates is scanned, in full-binding-index order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::net::binding::{Binding, BindingCodec, signed_wrap};
use crate::net::ids::{BindingIndex, Color, TransitionId};
use crate::net::marking::ColoredMarking;
use crate::net::structure::{ColoredNet, ColoredTransition};
use crate::search::constraint::{ConstraintCache, ConstraintData, PossibleValues};

/// How the generator schedules transitions when expanding a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    /// Exhaust one transition's bindings before moving to the next.
    Fixed,
    /// Round-robin across transitions, one firing per turn.
    Even,
    /// Like fixed, but the cursor walks the constraint-reduced space
    /// directly instead of skipping through the full one.
    Constrained,
}

impl fmt::Display for GeneratorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorMode::Fixed => write!(f, "fixed"),
            GeneratorMode::Even => write!(f, "even"),
            GeneratorMode::Constrained => write!(f, "constrained"),
        }
    }
}

impl FromStr for GeneratorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(GeneratorMode::Fixed),
            "even" => Ok(GeneratorMode::Even),
            "constrained" => Ok(GeneratorMode::Constrained),
            other => Err(format!("unknown generator mode '{other}'")),
        }
    }
}

/// Expansion cursor of one search state.
#[derive(Debug, Clone)]
enum Cursor {
    Fixed {
        transition: u32,
        binding: BindingIndex,
    },
    Even {
        /// Next full binding index per transition; `MAX` marks exhausted.
        bindings: Vec<BindingIndex>,
        current: u32,
    },
    Constrained {
        transition: u32,
        offset: BindingIndex,
    },
}

/// A state on the search frontier: its marking plus the cursor recording
/// how much of its successor set has already been generated.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub marking: ColoredMarking,
    pub id: u64,
    cursor: Cursor,
}

impl SearchState {
    fn new(marking: ColoredMarking, id: u64, mode: GeneratorMode, transition_count: usize) -> Self {
        let cursor = match mode {
            GeneratorMode::Fixed => Cursor::Fixed {
                transition: 0,
                binding: 0,
            },
            GeneratorMode::Even => Cursor::Even {
                bindings: vec![0; transition_count],
                current: 0,
            },
            GeneratorMode::Constrained => Cursor::Constrained {
                transition: 0,
                offset: 0,
            },
        };
        SearchState { marking, id, cursor }
    }
}

/// One newly generated successor: the resulting marking, the fired
/// transition and the full-space binding index, enough to replay the step.
#[derive(Debug, Clone)]
pub struct Successor {
    pub marking: ColoredMarking,
    pub transition: TransitionId,
    pub binding: BindingIndex,
}

pub struct SuccessorGenerator<'a> {
    net: &'a ColoredNet,
    mode: GeneratorMode,
    cache: ConstraintCache,
    /// Cache keys hold 16 bits of transition index; larger nets fall back
    /// to recomputing constraints.
    cache_enabled: bool,
}

impl<'a> SuccessorGenerator<'a> {
    pub fn new(net: &'a ColoredNet, mode: GeneratorMode) -> Self {
        SuccessorGenerator {
            net,
            mode,
            cache: ConstraintCache::new(),
            cache_enabled: net.transition_count() <= 1 << 16,
        }
    }

    pub fn net(&self) -> &'a ColoredNet {
        self.net
    }

    pub fn initial_state(&self) -> SearchState {
        self.fresh_state(self.net.initial_marking().clone(), 0)
    }

    /// Wraps a marking into an unexpanded state under this generator's
    /// scheduling mode.
    pub fn fresh_state(&self, marking: ColoredMarking, id: u64) -> SearchState {
        SearchState::new(marking, id, self.mode, self.net.transition_count())
    }

    /// The next not-yet-reported successor of `state`, advancing its
    /// cursor. `None` means the state is fully expanded.
    pub fn next(&mut self, state: &mut SearchState) -> Option<Successor> {
        let SearchState { marking, id, cursor } = state;
        match cursor {
            Cursor::Fixed {
                transition,
                binding,
            } => self.next_fixed(marking, *id, transition, binding),
            Cursor::Even { bindings, current } => self.next_even(marking, *id, bindings, current),
            Cursor::Constrained { transition, offset } => {
                self.next_constrained(marking, *id, transition, offset)
            }
        }
    }

    /// Drops cached constraint data of a fully expanded state.
    pub fn forget_state(&mut self, id: u64) {
        if self.cache_enabled {
            self.cache.forget_state(id);
        }
    }

    /// Replays one firing. `transition` and `binding` must come from a
    /// successor this generator produced for `marking`.
    pub fn fire(
        &self,
        marking: &ColoredMarking,
        transition: TransitionId,
        binding: BindingIndex,
    ) -> ColoredMarking {
        let bound = decode_binding(self.net, self.net.transition(transition), binding);
        fire_to_new(self.net, marking, transition, &bound)
    }

    /// Whether `transition` has any enabled binding under `marking`. Probes
    /// compute constraints locally and leave the per-state cache untouched.
    pub fn is_fireable(&self, marking: &ColoredMarking, transition: TransitionId) -> bool {
        let net = self.net;
        let record = net.transition(transition);
        if should_skip_transition(net, marking, transition) {
            return false;
        }
        if record.variables.is_empty() {
            let binding = Binding::zeroed(net.variable_count());
            return preset_and_guard_hold(net, marking, transition, &binding);
        }
        let data = constraint_data(net, marking, record);
        scan_reduced(net, marking, transition, record, &data, 0).is_some()
    }

    pub fn has_enabled(&self, marking: &ColoredMarking) -> bool {
        self.net
            .transition_ids()
            .any(|transition| self.is_fireable(marking, transition))
    }

    fn next_fixed(
        &mut self,
        marking: &ColoredMarking,
        state_id: u64,
        transition: &mut u32,
        binding: &mut BindingIndex,
    ) -> Option<Successor> {
        let count = self.net.transition_count() as u32;
        while *transition < count {
            let id = TransitionId::new(*transition);
            match self.find_from(marking, state_id, id, *binding) {
                Some((full, bound)) => {
                    *binding = full + 1;
                    return Some(Successor {
                        marking: fire_to_new(self.net, marking, id, &bound),
                        transition: id,
                        binding: full,
                    });
                }
                None => {
                    *transition += 1;
                    *binding = 0;
                }
            }
        }
        None
    }

    fn next_even(
        &mut self,
        marking: &ColoredMarking,
        state_id: u64,
        bindings: &mut [BindingIndex],
        current: &mut u32,
    ) -> Option<Successor> {
        let count = bindings.len() as u32;
        let mut attempts = 0;
        while attempts < count {
            let index = *current % count;
            *current = (index + 1) % count;
            attempts += 1;
            if bindings[index as usize] == BindingIndex::MAX {
                continue;
            }
            let id = TransitionId::new(index);
            match self.find_from(marking, state_id, id, bindings[index as usize]) {
                Some((full, bound)) => {
                    bindings[index as usize] = full + 1;
                    return Some(Successor {
                        marking: fire_to_new(self.net, marking, id, &bound),
                        transition: id,
                        binding: full,
                    });
                }
                None => bindings[index as usize] = BindingIndex::MAX,
            }
        }
        None
    }

    fn next_constrained(
        &mut self,
        marking: &ColoredMarking,
        state_id: u64,
        transition: &mut u32,
        offset: &mut BindingIndex,
    ) -> Option<Successor> {
        let net = self.net;
        let count = net.transition_count() as u32;
        while *transition < count {
            let id = TransitionId::new(*transition);
            let record = net.transition(id);
            let found = if record.variables.is_empty() {
                self.find_from(marking, state_id, id, *offset)
                    .map(|(full, bound)| (full, full, bound))
            } else if should_skip_transition(net, marking, id) {
                None
            } else {
                let computed;
                let data: &ConstraintData = if self.cache_enabled {
                    self.cache.get_or_insert_with(state_id, id, || {
                        constraint_data(net, marking, record)
                    })
                } else {
                    computed = constraint_data(net, marking, record);
                    &computed
                };
                scan_reduced(net, marking, id, record, data, *offset)
            };
            match found {
                Some((reduced, full, bound)) => {
                    *offset = reduced + 1;
                    return Some(Successor {
                        marking: fire_to_new(net, marking, id, &bound),
                        transition: id,
                        binding: full,
                    });
                }
                None => {
                    *transition += 1;
                    *offset = 0;
                }
            }
        }
        None
    }

    /// First enabled binding of `transition` whose full index is at least
    /// `from`, as (full index, binding).
    fn find_from(
        &mut self,
        marking: &ColoredMarking,
        state_id: u64,
        transition: TransitionId,
        from: BindingIndex,
    ) -> Option<(BindingIndex, Binding)> {
        let net = self.net;
        let record = net.transition(transition);
        if record.variables.is_empty() {
            if from == 0 && !should_skip_transition(net, marking, transition) {
                let binding = Binding::zeroed(net.variable_count());
                if preset_and_guard_hold(net, marking, transition, &binding) {
                    return Some((0, binding));
                }
            }
            return None;
        }
        if from >= record.codec.total() || should_skip_transition(net, marking, transition) {
            return None;
        }
        let computed;
        let data: &ConstraintData = if self.cache_enabled {
            self.cache
                .get_or_insert_with(state_id, transition, || {
                    constraint_data(net, marking, record)
                })
        } else {
            computed = constraint_data(net, marking, record);
            &computed
        };
        let start = align_reduced(net, record, data, from)?;
        scan_reduced(net, marking, transition, record, data, start)
            .map(|(_, full, bound)| (full, bound))
    }
}

/// Intersects the transition's pre-place constraints with the marking into
/// per-variable candidate sets.
fn constraint_data(
    net: &ColoredNet,
    marking: &ColoredMarking,
    transition: &ColoredTransition,
) -> ConstraintData {
    let mut possible = Vec::with_capacity(transition.variables.len());
    for (slot, &variable) in transition.variables.iter().enumerate() {
        let domain = net.variable(variable).domain;
        let mut values = PossibleValues::Any;
        for constraint in &transition.constraints[slot] {
            let mut candidates: Vec<Color> = marking
                .place(constraint.place)
                .iter_positive()
                .map(|(sequence, _)| {
                    signed_wrap(
                        i64::from(sequence.colors()[constraint.position]) - constraint.offset,
                        domain,
                    )
                })
                .collect();
            candidates.sort_unstable();
            candidates.dedup();
            values.intersect_sorted(&candidates);
        }
        possible.push(values);
    }
    let sizes = transition
        .variables
        .iter()
        .zip(&possible)
        .map(|(&variable, values)| values.len(net.variable(variable).domain))
        .collect();
    // the reduced space never exceeds the full one, which fit at build time
    let reduced = BindingCodec::new(sizes).unwrap_or_else(BindingCodec::vacant);
    ConstraintData { possible, reduced }
}

/// Walks the reduced space from `from`, returning the first binding that
/// passes guard and preset as (reduced index, full index, binding).
fn scan_reduced(
    net: &ColoredNet,
    marking: &ColoredMarking,
    transition: TransitionId,
    record: &ColoredTransition,
    data: &ConstraintData,
    from: BindingIndex,
) -> Option<(BindingIndex, BindingIndex, Binding)> {
    let mut digits = Vec::with_capacity(record.variables.len());
    let mut reduced = from;
    while reduced < data.reduced.total() {
        digits.clear();
        let mut binding = Binding::zeroed(net.variable_count());
        for (position, &variable) in record.variables.iter().enumerate() {
            let color = data.possible[position].color_at(data.reduced.digit(reduced, position));
            binding.set(variable, color);
            digits.push(u64::from(color));
        }
        let full = record.codec.encode(&digits);
        if preset_and_guard_hold(net, marking, transition, &binding) {
            return Some((reduced, full, binding));
        }
        reduced += 1;
    }
    None
}

/// Smallest reduced index whose full binding index is `>= from`.
fn align_reduced(
    net: &ColoredNet,
    record: &ColoredTransition,
    data: &ConstraintData,
    from: BindingIndex,
) -> Option<BindingIndex> {
    if from == 0 {
        return (data.reduced.total() > 0).then_some(0);
    }
    let count = record.variables.len();
    let mut digits = vec![0u64; count];
    let mut position = count;
    while position > 0 {
        position -= 1;
        let domain = net.variable(record.variables[position]).domain;
        let target = record.codec.digit(from, position) as Color;
        match data.possible[position].digit_at_or_after(target, domain) {
            Some((digit, color)) if color == target => {
                digits[position] = digit;
            }
            Some((digit, _)) => {
                digits[position] = digit;
                for lower in digits.iter_mut().take(position) {
                    *lower = 0;
                }
                return Some(data.reduced.encode(&digits));
            }
            None => {
                let mut carry = position + 1;
                while carry < count {
                    if digits[carry] + 1 < data.reduced.size(carry) {
                        digits[carry] += 1;
                        for lower in digits.iter_mut().take(carry) {
                            *lower = 0;
                        }
                        return Some(data.reduced.encode(&digits));
                    }
                    carry += 1;
                }
                return None;
            }
        }
    }
    Some(data.reduced.encode(&digits))
}

fn should_skip_transition(
    net: &ColoredNet,
    marking: &ColoredMarking,
    transition: TransitionId,
) -> bool {
    let inhibited = net
        .inhibitors_of(transition)
        .iter()
        .any(|inhibitor| marking.place_count(inhibitor.place) >= inhibitor.weight);
    inhibited
        || net.input_arcs(transition).iter().any(|arc| {
            marking.place_count(arc.place) < arc.expression.minimal_count()
                || !arc.minimal_tokens.is_subset(marking.place(arc.place))
        })
}

fn preset_and_guard_hold(
    net: &ColoredNet,
    marking: &ColoredMarking,
    transition: TransitionId,
    binding: &Binding,
) -> bool {
    if let Some(guard) = &net.transition(transition).guard {
        if !guard.eval(binding) {
            return false;
        }
    }
    net.input_arcs(transition)
        .iter()
        .all(|arc| arc.expression.is_subset(marking.place(arc.place), binding))
}

fn fire_to_new(
    net: &ColoredNet,
    marking: &ColoredMarking,
    transition: TransitionId,
    binding: &Binding,
) -> ColoredMarking {
    let mut next = marking.clone();
    for arc in net.input_arcs(transition) {
        arc.expression.consume(next.place_mut(arc.place), binding);
    }
    for arc in net.output_arcs(transition) {
        arc.expression.produce(next.place_mut(arc.place), binding);
    }
    next
}

fn decode_binding(
    net: &ColoredNet,
    record: &ColoredTransition,
    index: BindingIndex,
) -> Binding {
    let mut binding = Binding::zeroed(net.variable_count());
    for (position, &variable) in record.variables.iter().enumerate() {
        binding.set(variable, record.codec.digit(index, position) as Color);
    }
    binding
}
