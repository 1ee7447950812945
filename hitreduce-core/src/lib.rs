//! hitreduce-core: Core types for hit-level event reduction.
//!
//! This crate provides the hit and raw-event data model, the canonical
//! hit ordering, the geometry query surface consumed by reduction stages,
//! and the reducer stage configuration.
//!

pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod hit;
pub mod ordering;

pub use config::ReducerConfig;
pub use error::{Error, Result};
pub use event::RawEvent;
pub use geometry::{ElementInterval, GeometryOracle, GeometryTable, PlaneSpec, PlaneType};
pub use hit::{Hit, PlaneGroup, Station};
