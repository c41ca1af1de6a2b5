//! Colored Petri nets.
//!
//! Let `P` be a set of places and `T` a set of transitions. Every place
//! carries a multiset of tokens over a finite color domain (a tuple of
//! enumerated types), every transition a set of variables, an optional
//! guard, and arcs labelled with multiset expressions over those variables.
//! For a marking `M`, a transition `t` and a binding `b` of its variables:
//!
//! * `(t, b)` is **enabled** iff the guard of `t` holds under `b`, every
//!   input arc expression evaluated under `b` is a sub-multiset of the
//!   marking of its place, and every inhibitor arc `(p, t, w)` sees
//!   `|M[p]| < w`;
//! * **firing** `(t, b)` removes each input arc's evaluation from its place
//!   (clamped at zero per color) and adds each output arc's evaluation to
//!   its place.
//!
//! Nets are assembled through [`NetBuilder`], which compiles arc and guard
//! expressions into the closed forms the state-space search evaluates.
//!
//! ```rust
//! use RustCPN::net::{NetBuilder, TokenDecl};
//! use RustCPN::net::ast::{ArcExpression, ColorExpression};
//! use RustCPN::search::{GeneratorMode, SuccessorGenerator};
//!
//! let mut builder = NetBuilder::new();
//! builder.add_color_type("dot");
//! builder.add_to_color_type("dot", "dot");
//! builder.add_place("p", &["dot"], vec![TokenDecl::new(&["dot"], 1)]);
//! builder.add_transition("t", None);
//! builder.add_input_arc("p", "t", ArcExpression::Single(ColorExpression::color("dot", "dot")));
//! let net = builder.build().unwrap();
//!
//! let mut generator = SuccessorGenerator::new(&net, GeneratorMode::Fixed);
//! let mut state = generator.initial_state();
//! let successor = generator.next(&mut state).unwrap();
//! assert_eq!(successor.marking.total_tokens(), 0);
//! assert!(generator.next(&mut state).is_none());
//! ```

pub mod arc;
pub mod ast;
pub mod binding;
pub mod builder;
pub mod guard;
pub mod ids;
pub mod index_vec;
pub mod marking;
pub mod multiset;
pub mod structure;

pub use arc::{ArcExpression, ParameterizedColor, VariableTokens, VariableUse};
pub use binding::{Binding, BindingCodec, signed_wrap};
pub use builder::{NetBuilder, TokenDecl};
pub use guard::{CompiledGuard, GuardOperand};
pub use ids::{BindingIndex, Color, PlaceId, TransitionId, VariableId};
pub use index_vec::{Idx, IndexVec};
pub use marking::{ColoredMarking, MAX_ENCODING_BYTES};
pub use multiset::{ColorMultiset, ColorSequence, TokenCount};
pub use structure::{
    ColorVariable, ColoredNet, ColoredPlace, ColoredTransition, InhibitorArc, NetArc,
    NetProperties, VariableConstraint,
};
