//! Waiting-list disciplines.
//!
//! The engine keeps frontier states in a [`WaitingList`] and always expands
//! the one [`WaitingList::next`] exposes. A state stays in the list until
//! its successor cursor is exhausted, so `next` peeks and [`WaitingList::remove`]
//! drops. Depth-first and breadth-first are the plain stack and queue;
//! random depth-first shuffles each batch of newly added states before
//! stacking it; the heuristic list is a min-heap over the query distance
//! with a seeded random tie-break, and switches states mid-expansion as
//! soon as a strictly closer one shows up.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::search::successor::SearchState;

/// Search order of the waiting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Dfs,
    Bfs,
    Rdfs,
    /// Best-first on the query distance heuristic.
    Heur,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Dfs => write!(f, "dfs"),
            Strategy::Bfs => write!(f, "bfs"),
            Strategy::Rdfs => write!(f, "rdfs"),
            Strategy::Heur => write!(f, "heur"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dfs" => Ok(Strategy::Dfs),
            "bfs" => Ok(Strategy::Bfs),
            "rdfs" => Ok(Strategy::Rdfs),
            "heur" => Ok(Strategy::Heur),
            other => Err(format!("unknown search strategy '{other}'")),
        }
    }
}

struct RankedState {
    priority: u64,
    tie: u64,
    state: SearchState,
}

impl PartialEq for RankedState {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.tie == other.tie
    }
}

impl Eq for RankedState {}

impl PartialOrd for RankedState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.tie.cmp(&other.tie))
    }
}

pub enum WaitingList {
    Dfs(Vec<SearchState>),
    Bfs(VecDeque<SearchState>),
    Rdfs {
        stack: Vec<SearchState>,
        fresh: Vec<SearchState>,
        rng: StdRng,
    },
    Heur {
        heap: BinaryHeap<Reverse<RankedState>>,
        current: Option<RankedState>,
        rng: StdRng,
    },
}

impl WaitingList {
    pub fn new(strategy: Strategy, seed: u64) -> Self {
        match strategy {
            Strategy::Dfs => WaitingList::Dfs(Vec::new()),
            Strategy::Bfs => WaitingList::Bfs(VecDeque::new()),
            Strategy::Rdfs => WaitingList::Rdfs {
                stack: Vec::new(),
                fresh: Vec::new(),
                rng: StdRng::seed_from_u64(seed),
            },
            Strategy::Heur => WaitingList::Heur {
                heap: BinaryHeap::new(),
                current: None,
                rng: StdRng::seed_from_u64(seed),
            },
        }
    }

    /// The state to expand next. Stays in the list until [`WaitingList::remove`].
    pub fn next(&mut self) -> Option<&mut SearchState> {
        match self {
            WaitingList::Dfs(stack) => stack.last_mut(),
            WaitingList::Bfs(queue) => queue.front_mut(),
            WaitingList::Rdfs { stack, fresh, rng } => {
                if stack.is_empty() && !fresh.is_empty() {
                    fresh.shuffle(rng);
                    stack.append(fresh);
                }
                stack.last_mut()
            }
            WaitingList::Heur { heap, current, .. } => {
                match current {
                    Some(held) => {
                        let closer = match heap.peek() {
                            Some(Reverse(top)) => top.cmp(held) == Ordering::Less,
                            None => false,
                        };
                        if closer {
                            if let Some(Reverse(better)) = heap.pop() {
                                let displaced = std::mem::replace(held, better);
                                heap.push(Reverse(displaced));
                            }
                        }
                    }
                    None => *current = heap.pop().map(|Reverse(ranked)| ranked),
                }
                current.as_mut().map(|ranked| &mut ranked.state)
            }
        }
    }

    /// Drops the state [`WaitingList::next`] exposed.
    pub fn remove(&mut self) {
        match self {
            WaitingList::Dfs(stack) => {
                stack.pop();
            }
            WaitingList::Bfs(queue) => {
                queue.pop_front();
            }
            WaitingList::Rdfs { stack, fresh, .. } => {
                if stack.pop().is_none() {
                    fresh.pop();
                }
            }
            WaitingList::Heur { current, .. } => *current = None,
        }
    }

    /// Adds a frontier state. `priority` only matters to the heuristic list.
    pub fn add(&mut self, state: SearchState, priority: u64) {
        match self {
            WaitingList::Dfs(stack) => stack.push(state),
            WaitingList::Bfs(queue) => queue.push_back(state),
            WaitingList::Rdfs { fresh, .. } => fresh.push(state),
            WaitingList::Heur { heap, rng, .. } => heap.push(Reverse(RankedState {
                priority,
                tie: rng.random(),
                state,
            })),
        }
    }

    /// Whether adding needs a real distance as priority.
    pub fn ranks_by_distance(&self) -> bool {
        matches!(self, WaitingList::Heur { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            WaitingList::Dfs(stack) => stack.len(),
            WaitingList::Bfs(queue) => queue.len(),
            WaitingList::Rdfs { stack, fresh, .. } => stack.len() + fresh.len(),
            WaitingList::Heur { heap, current, .. } => heap.len() + usize::from(current.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
