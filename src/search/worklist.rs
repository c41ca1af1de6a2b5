//! The reachability engine.
//!
//! Explores markings from the initial one, deduplicating by compressed
//! encoding, until the query is decided. `EF cond` stops on the first
//! state satisfying `cond`; `AG cond` stops on the first state violating
//! it. Exhausting the space decides the other way, unless some encoding
//! was truncated, in which case exploration may have missed states and the
//! only honest answer left is inconclusive.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::net::ids::{BindingIndex, TransitionId};
use crate::net::marking::{ColoredMarking, MAX_ENCODING_BYTES};
use crate::net::structure::ColoredNet;
use crate::query::{CompiledQuery, Condition, Quantifier};
use crate::search::graph::StateGraph;
use crate::search::passed::PassedSet;
use crate::search::queue::{Strategy, WaitingList};
use crate::search::stats::SearchStatistics;
use crate::search::successor::{GeneratorMode, SuccessorGenerator, Successor};
use crate::search::trace::{TraceArena, TraceStep};

/// Cooperative cancellation flag shared between the engine and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Satisfied,
    Unsatisfied,
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Satisfied => write!(f, "satisfied"),
            Verdict::Unsatisfied => write!(f, "unsatisfied"),
            Verdict::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// Maps the raw search outcome to a verdict. `found` is whether a target
/// state turned up (a witness for `EF`, a violation for `AG`); `complete`
/// is whether exploration covered every state it claims to.
pub fn decide_verdict(quantifier: Quantifier, found: bool, complete: bool) -> Verdict {
    if !found && !complete {
        return Verdict::Inconclusive;
    }
    let satisfied = match quantifier {
        Quantifier::ExistsFinally => found,
        Quantifier::AlwaysGlobally => !found,
    };
    if satisfied {
        Verdict::Satisfied
    } else {
        Verdict::Unsatisfied
    }
}

/// Knobs of one search run.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub strategy: Strategy,
    pub mode: GeneratorMode,
    pub seed: u64,
    pub record_trace: bool,
    pub record_graph: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            strategy: Strategy::Dfs,
            mode: GeneratorMode::Fixed,
            seed: 0,
            record_trace: false,
            record_graph: false,
        }
    }
}

struct GraphRecorder {
    graph: StateGraph,
    /// Compressed key to state id, for edges into already known states.
    ids: HashMap<Vec<u8>, u64>,
}

enum Step {
    Exhausted(u64),
    Produced { parent: u64, successor: Successor },
}

pub struct Worklist<'a> {
    generator: SuccessorGenerator<'a>,
    query: CompiledQuery,
    waiting: WaitingList,
    passed: PassedSet,
    statistics: SearchStatistics,
    trace: Option<TraceArena>,
    graph: Option<GraphRecorder>,
    cancel: CancelToken,
    complete: bool,
    counter_example: Option<u64>,
    next_id: u64,
}

impl<'a> Worklist<'a> {
    pub fn new(
        net: &'a ColoredNet,
        condition: &Condition,
        settings: &SearchSettings,
    ) -> Result<Self, EngineError> {
        let query = CompiledQuery::compile(condition, net)?;
        Ok(Worklist {
            generator: SuccessorGenerator::new(net, settings.mode),
            query,
            waiting: WaitingList::new(settings.strategy, settings.seed),
            passed: PassedSet::new(),
            statistics: SearchStatistics::default(),
            trace: settings.record_trace.then(TraceArena::new),
            graph: settings.record_graph.then(|| GraphRecorder {
                graph: StateGraph::new(),
                ids: HashMap::new(),
            }),
            cancel: CancelToken::new(),
            complete: true,
            counter_example: None,
            next_id: 0,
        })
    }

    /// Runs the search to a verdict.
    pub fn check(&mut self) -> Verdict {
        // EF hunts for a state satisfying the predicate, AG for one
        // violating it
        let target = self.query.quantifier == Quantifier::ExistsFinally;
        let mut key = Vec::new();
        let mut found = false;

        let mut initial = self.generator.initial_state();
        initial.marking.shrink();
        if !initial.marking.compressed_encode(&mut key) {
            warn!("state encoding hit the {MAX_ENCODING_BYTES} byte ceiling, keys may collide");
            self.complete = false;
        }
        self.statistics.biggest_encoding = key.len();
        self.passed.insert(&key);
        self.statistics.discovered_states = 1;
        self.statistics.explored_states = 1;
        self.statistics.checked_states = 1;
        initial.id = self.allocate_id(&key, None, &initial.marking);

        if self.query.predicate.eval(&self.generator, &initial.marking) == target {
            found = true;
            self.counter_example = Some(initial.id);
        } else {
            let priority = self.priority_of(&initial.marking);
            self.waiting.add(initial, priority);
            self.statistics.peak_waiting_states = 1;
        }

        'search: while !found && !self.waiting.is_empty() {
            if self.cancel.is_cancelled() {
                debug!("search cancelled after {} states", self.next_id);
                self.statistics.end_waiting_states = self.waiting.len() as u64;
                return Verdict::Inconclusive;
            }

            let step = {
                let Some(state) = self.waiting.next() else {
                    break 'search;
                };
                let parent = state.id;
                match self.generator.next(state) {
                    Some(successor) => Step::Produced { parent, successor },
                    None => Step::Exhausted(parent),
                }
            };

            match step {
                Step::Exhausted(id) => {
                    self.waiting.remove();
                    self.generator.forget_state(id);
                }
                Step::Produced { parent, successor } => {
                    let Successor {
                        mut marking,
                        transition,
                        binding,
                    } = successor;
                    marking.shrink();
                    self.statistics.discovered_states += 1;
                    if !marking.compressed_encode(&mut key) {
                        if self.complete {
                            warn!(
                                "state encoding hit the {MAX_ENCODING_BYTES} byte ceiling, \
                                 keys may collide"
                            );
                        }
                        self.complete = false;
                    }
                    trace!("discovered {}", hex::encode(&key));
                    self.statistics.biggest_encoding =
                        self.statistics.biggest_encoding.max(key.len());

                    if !self.passed.insert(&key) {
                        self.record_duplicate_edge(parent, &key, transition, binding);
                        continue;
                    }
                    self.statistics.explored_states += 1;
                    self.statistics.checked_states += 1;
                    let id = self.allocate_id(&key, Some((parent, transition, binding)), &marking);

                    if self.query.predicate.eval(&self.generator, &marking) == target {
                        found = true;
                        self.counter_example = Some(id);
                        break 'search;
                    }

                    let priority = self.priority_of(&marking);
                    self.waiting.add(self.generator.fresh_state(marking, id), priority);
                    self.statistics.peak_waiting_states = self
                        .statistics
                        .peak_waiting_states
                        .max(self.waiting.len() as u64);
                }
            }
        }

        self.statistics.end_waiting_states = self.waiting.len() as u64;
        let verdict = decide_verdict(self.query.quantifier, found, self.complete);
        info!(
            "{} {} after exploring {} states ({} discovered)",
            self.query.quantifier,
            verdict,
            self.statistics.explored_states,
            self.statistics.discovered_states,
        );
        verdict
    }

    pub fn statistics(&self) -> &SearchStatistics {
        &self.statistics
    }

    pub fn quantifier(&self) -> Quantifier {
        self.query.quantifier
    }

    /// Id of the state that decided the verdict, when one did.
    pub fn counter_example_id(&self) -> Option<u64> {
        self.counter_example
    }

    /// Whether exploration was exhaustive: every state either expanded or
    /// still waiting, no encoding truncated.
    pub fn was_complete(&self) -> bool {
        self.complete
    }

    /// The firing sequence to `id`; needs trace recording switched on.
    pub fn trace_to(&self, id: u64) -> Result<Vec<TraceStep>, EngineError> {
        match &self.trace {
            Some(arena) => arena.trace_to(id),
            None => Err(EngineError::InvalidTrace),
        }
    }

    pub fn state_graph(&self) -> Option<&StateGraph> {
        self.graph.as_ref().map(|recorder| &recorder.graph)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn priority_of(&self, marking: &ColoredMarking) -> u64 {
        if self.waiting.ranks_by_distance() {
            let negated = self.query.quantifier == Quantifier::AlwaysGlobally;
            self.query.predicate.distance(marking, negated)
        } else {
            0
        }
    }

    /// Hands out the next dense state id and mirrors the state into the
    /// trace arena and graph when those are recording.
    fn allocate_id(
        &mut self,
        key: &[u8],
        parent: Option<(u64, TransitionId, BindingIndex)>,
        marking: &ColoredMarking,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if let Some(arena) = &mut self.trace {
            match parent {
                None => {
                    arena.record_initial();
                }
                Some((parent_id, transition, binding)) => {
                    arena.record(parent_id, transition, binding);
                }
            }
        }
        if let Some(recorder) = &mut self.graph {
            recorder.graph.add_state(id, marking.to_string());
            recorder.ids.insert(key.to_vec(), id);
            if let Some((parent_id, transition, binding)) = parent {
                let name = &self.generator.net().transition(transition).name;
                recorder
                    .graph
                    .add_edge(parent_id, id, format!("{name}[{binding}]"));
            }
        }
        id
    }

    fn record_duplicate_edge(
        &mut self,
        parent: u64,
        key: &[u8],
        transition: TransitionId,
        binding: BindingIndex,
    ) {
        if let Some(recorder) = &mut self.graph {
            if let Some(&known) = recorder.ids.get(key) {
                let name = &self.generator.net().transition(transition).name;
                recorder
                    .graph
                    .add_edge(parent, known, format!("{name}[{binding}]"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetBuilder;
    use crate::net::ast::{ArcExpression, ColorExpression};
    use crate::net::builder::TokenDecl;
    use crate::query::CountExpression;

    /// One place holding `tokens` dots, one transition consuming one dot.
    fn chain_net(tokens: u64) -> ColoredNet {
        let mut builder = NetBuilder::new();
        builder.add_color_type("dot");
        builder.add_to_color_type("dot", "dot");
        builder.add_place("p", &["dot"], vec![TokenDecl::new(&["dot"], tokens)]);
        builder.add_transition("t", None);
        builder.add_input_arc(
            "p",
            "t",
            ArcExpression::Single(ColorExpression::color("dot", "dot")),
        );
        builder.build().unwrap()
    }

    fn place_count_is(place: &str, count: u64) -> Condition {
        Condition::Equal(
            CountExpression::Place(place.to_owned()),
            CountExpression::Literal(count),
        )
    }

    #[test]
    fn ef_finds_a_witness_and_counts_states() {
        let net = chain_net(2);
        let query = Condition::ExistsFinally(Box::new(place_count_is("p", 0)));
        let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
        assert_eq!(worklist.check(), Verdict::Satisfied);
        assert_eq!(worklist.counter_example_id(), Some(2));

        let stats = worklist.statistics();
        assert_eq!(stats.discovered_states, 3);
        assert_eq!(stats.explored_states, 3);
        assert_eq!(stats.checked_states, 3);
        assert!(worklist.was_complete());
    }

    #[test]
    fn ef_exhausts_and_rejects() {
        let net = chain_net(2);
        let query = Condition::ExistsFinally(Box::new(place_count_is("p", 9)));
        let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
        assert_eq!(worklist.check(), Verdict::Unsatisfied);
        assert_eq!(worklist.counter_example_id(), None);
        assert_eq!(worklist.statistics().end_waiting_states, 0);
    }

    #[test]
    fn ag_violated_by_the_initial_marking() {
        let net = chain_net(2);
        let query = Condition::AlwaysGlobally(Box::new(Condition::LessThan(
            CountExpression::Place("p".to_owned()),
            CountExpression::Literal(2),
        )));
        let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
        assert_eq!(worklist.check(), Verdict::Unsatisfied);
        assert_eq!(worklist.counter_example_id(), Some(0));
        assert_eq!(worklist.statistics().discovered_states, 1);
    }

    #[test]
    fn ag_holds_after_full_exploration() {
        let net = chain_net(2);
        let query = Condition::AlwaysGlobally(Box::new(Condition::LessThanOrEqual(
            CountExpression::Place("p".to_owned()),
            CountExpression::Literal(2),
        )));
        let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
        assert_eq!(worklist.check(), Verdict::Satisfied);
        assert!(worklist.was_complete());
        assert_eq!(worklist.statistics().explored_states, 3);
    }

    #[test]
    fn deadlock_is_reachable_in_a_draining_net() {
        let net = chain_net(1);
        let query = Condition::ExistsFinally(Box::new(Condition::Deadlock));
        let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
        assert_eq!(worklist.check(), Verdict::Satisfied);
        assert_eq!(worklist.counter_example_id(), Some(1));
    }

    #[test]
    fn cancellation_yields_inconclusive() {
        let net = chain_net(2);
        let query = Condition::ExistsFinally(Box::new(place_count_is("p", 0)));
        let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
        worklist.cancel_token().cancel();
        assert_eq!(worklist.check(), Verdict::Inconclusive);
    }

    #[test]
    fn traces_replay_to_the_witness() {
        let net = chain_net(2);
        let query = Condition::ExistsFinally(Box::new(place_count_is("p", 0)));
        let settings = SearchSettings {
            record_trace: true,
            ..SearchSettings::default()
        };
        let mut worklist = Worklist::new(&net, &query, &settings).unwrap();
        assert_eq!(worklist.check(), Verdict::Satisfied);

        let witness = worklist.counter_example_id().unwrap();
        let steps = worklist.trace_to(witness).unwrap();
        assert_eq!(steps.len(), 2);

        let generator = SuccessorGenerator::new(&net, GeneratorMode::Fixed);
        let mut marking = net.initial_marking().clone();
        for step in steps {
            marking = generator.fire(&marking, step.transition, step.binding);
        }
        assert_eq!(marking.total_tokens(), 0);
    }

    #[test]
    fn trace_requests_without_recording_fail() {
        let net = chain_net(1);
        let query = Condition::ExistsFinally(Box::new(place_count_is("p", 0)));
        let mut worklist = Worklist::new(&net, &query, &SearchSettings::default()).unwrap();
        worklist.check();
        assert_eq!(
            worklist.trace_to(1).unwrap_err(),
            EngineError::InvalidTrace
        );
    }

    #[test]
    fn graph_recording_includes_duplicate_edges() {
        // self-loop: one state, one edge back onto itself
        let mut builder = NetBuilder::new();
        builder.add_color_type("dot");
        builder.add_to_color_type("dot", "dot");
        builder.add_place("p", &["dot"], vec![TokenDecl::new(&["dot"], 1)]);
        builder.add_transition("t", None);
        builder.add_input_arc(
            "p",
            "t",
            ArcExpression::Single(ColorExpression::color("dot", "dot")),
        );
        builder.add_output_arc(
            "t",
            "p",
            ArcExpression::Single(ColorExpression::color("dot", "dot")),
        );
        let net = builder.build().unwrap();

        let query = Condition::AlwaysGlobally(Box::new(place_count_is("p", 1)));
        let settings = SearchSettings {
            record_graph: true,
            ..SearchSettings::default()
        };
        let mut worklist = Worklist::new(&net, &query, &settings).unwrap();
        assert_eq!(worklist.check(), Verdict::Satisfied);

        let graph = worklist.state_graph().unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn nested_quantifiers_fail_compilation() {
        let net = chain_net(1);
        let query = Condition::ExistsFinally(Box::new(Condition::ExistsFinally(Box::new(
            Condition::Deadlock,
        ))));
        let error = Worklist::new(&net, &query, &SearchSettings::default())
            .err()
            .unwrap();
        assert_eq!(error, EngineError::UnsupportedQuery);
    }

    #[test]
    fn verdict_table() {
        use Quantifier::{AlwaysGlobally as Ag, ExistsFinally as Ef};
        assert_eq!(decide_verdict(Ef, true, true), Verdict::Satisfied);
        assert_eq!(decide_verdict(Ef, true, false), Verdict::Satisfied);
        assert_eq!(decide_verdict(Ef, false, true), Verdict::Unsatisfied);
        assert_eq!(decide_verdict(Ef, false, false), Verdict::Inconclusive);
        assert_eq!(decide_verdict(Ag, true, true), Verdict::Unsatisfied);
        assert_eq!(decide_verdict(Ag, true, false), Verdict::Unsatisfied);
        assert_eq!(decide_verdict(Ag, false, true), Verdict::Satisfied);
        assert_eq!(decide_verdict(Ag, false, false), Verdict::Inconclusive);
    }

    #[test]
    fn heuristic_strategy_reaches_the_same_verdict() {
        let net = chain_net(3);
        let query = Condition::ExistsFinally(Box::new(place_count_is("p", 0)));
        for strategy in [Strategy::Dfs, Strategy::Bfs, Strategy::Rdfs, Strategy::Heur] {
            let settings = SearchSettings {
                strategy,
                seed: 5,
                ..SearchSettings::default()
            };
            let mut worklist = Worklist::new(&net, &query, &settings).unwrap();
            assert_eq!(worklist.check(), Verdict::Satisfied, "{strategy}");
        }
    }
}
