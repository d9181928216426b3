//! Engine modules: turn the chosen disk into an ordered operation plan.
//!
//! The engine sits between configuration (which disk, how much swap) and
//! execution (which commands to run). Plans are built without I/O and
//! executed through a [`crate::runner::CommandRunner`].

pub mod storage;
