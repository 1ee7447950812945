//! hitreduce-algorithms: Hit reduction stages and the per-event pipeline.
//!
//! This crate provides the reduction stages:
//! - **Cluster collapse** - adjacent same-plane hits (split pulses, noise, delta rays)
//! - **Sagitta veto** - three-station consistency with target and dump vertices
//! - **Hodoscope masking** - chamber hits need a covering paddle hit
//! - **Trigger roads** - pluggable analyzer interface
//!
//! [`ReductionPipeline`] chains them per event; [`reduce_events`] runs
//! independent pipelines over event chunks with rayon.
#![warn(missing_docs)]

pub mod cluster;
pub mod mask;
pub mod pipeline;
mod processing;
pub mod sagitta;
pub mod trigger;

pub use cluster::{ClusterCollapser, ClusterConfig};
pub use mask::HodoscopeMaskTable;
pub use pipeline::{PipelineBuilder, ReductionPipeline, ReductionStats};
pub use processing::{reduce_events, reduce_events_sequential, DEFAULT_CHUNK_SIZE};
pub use sagitta::{SagittaConfig, SagittaVeto, StationBounds};
pub use trigger::{TriggerAnalyzer, TriggerMode};
