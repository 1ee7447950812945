//! Batch reduction across threads.

use crate::pipeline::PipelineBuilder;
use hitreduce_core::{RawEvent, Result};
use rayon::prelude::*;

/// Default number of events reduced by one pipeline instance.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Shares the mask table, validates the configuration and announces the
/// stages once. Returns a quiet builder for the per-chunk pipelines.
fn prepare(builder: &PipelineBuilder) -> Result<PipelineBuilder> {
    let shared = builder.clone().share_mask_table();
    let _ = shared.clone().build()?;
    Ok(shared.quiet())
}

/// Reduces `events` in parallel and returns the total number of chamber hits removed.
///
/// Events are split into chunks of `chunk_size`; each chunk gets its own
/// pipeline seeded with `seed + chunk_index`, so the result does not depend
/// on the number of threads. The mask table is built once and shared, and
/// the enabled stages are announced once unless the builder is
/// [`quiet`](PipelineBuilder::quiet).
///
/// # Errors
///
/// Returns the first error raised while building a chunk pipeline.
pub fn reduce_events(
    events: &mut [RawEvent],
    builder: &PipelineBuilder,
    chunk_size: usize,
) -> Result<usize> {
    let chunk_size = chunk_size.max(1);
    let shared = prepare(builder)?;
    let base_seed = shared.config().seed;

    let removed: Vec<usize> = events
        .par_chunks_mut(chunk_size)
        .enumerate()
        .map(|(index, chunk)| -> Result<usize> {
            let mut pipeline = shared
                .clone()
                .seed(base_seed.wrapping_add(index as u64))
                .build()?;
            Ok(pipeline.reduce_all(chunk))
        })
        .collect::<Result<Vec<usize>>>()?;

    let total = removed.iter().sum();
    log::debug!(
        "reduced {} events in {} chunks, {total} chamber hits removed",
        events.len(),
        removed.len()
    );
    Ok(total)
}

/// Sequential counterpart of [`reduce_events`] with identical seeding and
/// announcement.
///
/// # Errors
///
/// Returns the first error raised while building a chunk pipeline.
pub fn reduce_events_sequential(
    events: &mut [RawEvent],
    builder: &PipelineBuilder,
    chunk_size: usize,
) -> Result<usize> {
    let chunk_size = chunk_size.max(1);
    let shared = prepare(builder)?;
    let base_seed = shared.config().seed;

    let mut total = 0;
    for (index, chunk) in events.chunks_mut(chunk_size).enumerate() {
        let mut pipeline = shared
            .clone()
            .seed(base_seed.wrapping_add(index as u64))
            .build()?;
        total += pipeline.reduce_all(chunk);
    }
    Ok(total)
}
