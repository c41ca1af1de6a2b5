//! Firing traces.
//!
//! Every discovered state gets one arena slot holding its parent id and the
//! step that produced it, so a counter example costs a parent-pointer walk
//! instead of storing paths per state. Slot indices are the engine's state
//! ids; the engine allocates them densely in discovery order.

use crate::error::EngineError;
use crate::net::ids::{BindingIndex, TransitionId};

/// One firing: which transition under which full-space binding index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceStep {
    pub transition: TransitionId,
    pub binding: BindingIndex,
}

struct TraceLink {
    parent: u64,
    step: Option<TraceStep>,
}

#[derive(Default)]
pub struct TraceArena {
    links: Vec<TraceLink>,
}

impl TraceArena {
    pub fn new() -> Self {
        TraceArena::default()
    }

    /// Registers a root state, returning its id.
    pub fn record_initial(&mut self) -> u64 {
        let id = self.links.len() as u64;
        self.links.push(TraceLink {
            parent: id,
            step: None,
        });
        id
    }

    /// Registers a state reached from `parent` by one firing, returning its
    /// id. `parent` must already be recorded.
    pub fn record(&mut self, parent: u64, transition: TransitionId, binding: BindingIndex) -> u64 {
        let id = self.links.len() as u64;
        self.links.push(TraceLink {
            parent,
            step: Some(TraceStep {
                transition,
                binding,
            }),
        });
        id
    }

    /// The firing sequence from a root to `target`, in firing order.
    pub fn trace_to(&self, target: u64) -> Result<Vec<TraceStep>, EngineError> {
        let mut steps = Vec::new();
        let mut id = target;
        loop {
            let link = self
                .links
                .get(id as usize)
                .ok_or(EngineError::InvalidTrace)?;
            match link.step {
                Some(step) => {
                    // links always point backwards; anything else is corrupt
                    if link.parent >= id {
                        return Err(EngineError::InvalidTrace);
                    }
                    steps.push(step);
                    id = link.parent;
                }
                None => break,
            }
        }
        steps.reverse();
        Ok(steps)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traces_walk_back_to_the_root() {
        let mut arena = TraceArena::new();
        let root = arena.record_initial();
        let a = arena.record(root, TransitionId::new(0), 3);
        let b = arena.record(a, TransitionId::new(1), 0);
        // a sibling branch must not disturb the walk
        arena.record(root, TransitionId::new(2), 7);
        let c = arena.record(b, TransitionId::new(0), 1);

        let steps = arena.trace_to(c).unwrap();
        assert_eq!(
            steps,
            vec![
                TraceStep {
                    transition: TransitionId::new(0),
                    binding: 3
                },
                TraceStep {
                    transition: TransitionId::new(1),
                    binding: 0
                },
                TraceStep {
                    transition: TransitionId::new(0),
                    binding: 1
                },
            ]
        );

        assert_eq!(arena.trace_to(root).unwrap(), Vec::new());
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut arena = TraceArena::new();
        arena.record_initial();
        assert_eq!(arena.trace_to(5).unwrap_err(), EngineError::InvalidTrace);
    }
}
