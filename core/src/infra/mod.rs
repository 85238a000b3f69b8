//! Infrastructure layer - store, election and event plumbing

pub mod db;
pub mod election;
pub mod event;
