#![warn(
	clippy::all,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::unwrap_used,
	rust_2018_idioms,
	unused_allocation,
	clippy::dbg_macro,
	deprecated
)]
#![allow(clippy::module_name_repetitions)]

//! Cloud resource recorder
//!
//! Reconciles collector snapshots of cloud resources into a canonical relational store and
//! keeps the derived `ch_*` tag tables in step with it. Only the elected controller writes,
//! see [`infra::election`].

pub mod config;
pub mod context;
pub mod infra;
pub mod logging;
pub mod recorder;
pub mod tagrecorder;
