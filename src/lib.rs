//! Explicit-state reachability checking for colored Petri nets.
//!
//! A net is declared through [`net::NetBuilder`] or loaded from a file with
//! [`io::read_model`], compiled into a [`net::ColoredNet`], and explored by
//! a [`search::Worklist`] answering one `EF` or `AG` query over place
//! counts, deadlock and fireability.

#![allow(non_snake_case)]

pub mod config;
pub mod error;
pub mod io;
pub mod net;
pub mod options;
pub mod query;
pub mod report;
pub mod search;
pub mod util;
