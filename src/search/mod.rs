//! State-space exploration.
//!
//! [`worklist::Worklist`] drives the search: it draws frontier states from
//! a [`queue::WaitingList`], asks [`successor::SuccessorGenerator`] for one
//! successor at a time, deduplicates markings in [`passed::PassedSet`] by
//! their compressed encoding, and evaluates the compiled query on each new
//! state. [`constraint`] prunes binding spaces per state, [`trace`] keeps
//! parent pointers for counter-example replay, and [`graph`] optionally
//! mirrors everything into a dot-printable graph.

pub mod constraint;
pub mod graph;
pub mod passed;
pub mod queue;
pub mod stats;
pub mod successor;
pub mod trace;
pub mod worklist;

pub use constraint::{ConstraintCache, ConstraintData, PossibleValues};
pub use graph::StateGraph;
pub use passed::PassedSet;
pub use queue::{Strategy, WaitingList};
pub use stats::SearchStatistics;
pub use successor::{GeneratorMode, SearchState, Successor, SuccessorGenerator};
pub use trace::{TraceArena, TraceStep};
pub use worklist::{
    CancelToken, SearchSettings, Verdict, Worklist, decide_verdict,
};
