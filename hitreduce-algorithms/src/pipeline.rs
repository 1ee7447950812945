//! Per-event reduction pipeline.
//!
//! A [`ReductionPipeline`] owns its working lists and random stream, so one
//! instance must not be shared between concurrently reduced events. The
//! geometry, mask table and trigger analyzer are read-only and shared
//! through `Arc`s; use [`PipelineBuilder`] to create several pipelines over
//! the same collaborators.

use crate::cluster::{ClusterCollapser, ClusterConfig};
use crate::mask::HodoscopeMaskTable;
use crate::sagitta::{SagittaConfig, SagittaVeto};
use crate::trigger::{TriggerAnalyzer, TriggerMode};
use hitreduce_core::geometry::{GeometryOracle, PlaneType};
use hitreduce_core::ordering::{dedup_channels, merge_sorted, sort_canonical};
use hitreduce_core::{Error, Hit, RawEvent, ReducerConfig, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::sync::Arc;

/// Probability that a chamber hit survives realization thinning.
pub const REALIZATION_KEEP_PROBABILITY: f64 = 0.94;
/// Standard deviation of the realization drift-distance smearing.
pub const REALIZATION_SMEAR_SIGMA: f64 = 0.04;

/// Hit counts recorded for the last reduced event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReductionStats {
    /// All hits before reduction.
    pub hits_before: usize,
    /// All hits after reduction.
    pub hits_after: usize,
    /// Chamber hits before reduction.
    pub chamber_before: usize,
    /// Chamber hits after reduction.
    pub chamber_after: usize,
    /// Hits dropped as out of time.
    pub out_of_time: usize,
    /// Chamber hits dropped by realization thinning.
    pub realization: usize,
    /// X-hodoscope hits dropped in favour of trigger roads.
    pub trigger_mask: usize,
    /// Chamber hits vetoed by hodoscope masking.
    pub hodo_mask: usize,
    /// Duplicate channel hits collapsed after the merge.
    pub after_hit: usize,
    /// Hits removed by cluster collapse.
    pub decluster: usize,
    /// Hits removed by the sagitta veto.
    pub sagitta: usize,
}

impl ReductionStats {
    /// Chamber hits removed from the event.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.chamber_before.saturating_sub(self.chamber_after)
    }
}

/// Builder for [`ReductionPipeline`].
///
/// Cloning a builder is cheap; the collaborators are reference counted.
#[derive(Clone)]
pub struct PipelineBuilder {
    config: ReducerConfig,
    geometry: Arc<dyn GeometryOracle>,
    mask_table: Option<Arc<HodoscopeMaskTable>>,
    trigger: Option<Arc<dyn TriggerAnalyzer>>,
    cluster: ClusterConfig,
    sagitta: SagittaConfig,
    announce: bool,
}

impl PipelineBuilder {
    /// Starts a builder with default stage constants.
    #[must_use]
    pub fn new(config: ReducerConfig, geometry: Arc<dyn GeometryOracle>) -> Self {
        Self {
            config,
            geometry,
            mask_table: None,
            trigger: None,
            cluster: ClusterConfig::default(),
            sagitta: SagittaConfig::default(),
            announce: true,
        }
    }

    /// Uses a prebuilt mask table instead of building one from the geometry.
    #[must_use]
    pub fn mask_table(mut self, table: Arc<HodoscopeMaskTable>) -> Self {
        self.mask_table = Some(table);
        self
    }

    /// Sets the trigger-road analyzer required by trigger masking.
    #[must_use]
    pub fn trigger_analyzer(mut self, analyzer: Arc<dyn TriggerAnalyzer>) -> Self {
        self.trigger = Some(analyzer);
        self
    }

    /// Overrides the cluster collapse constants.
    #[must_use]
    pub fn cluster_config(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    /// Overrides the sagitta veto constants.
    #[must_use]
    pub fn sagitta_config(mut self, sagitta: SagittaConfig) -> Self {
        self.sagitta = sagitta;
        self
    }

    /// Sets the realization seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Builds the mask table now so that clones of this builder share it.
    ///
    /// Does nothing if hodoscope masking is disabled or a table is already set.
    #[must_use]
    pub fn share_mask_table(mut self) -> Self {
        if self.config.hodo_mask && self.mask_table.is_none() {
            self.mask_table = Some(Arc::new(HodoscopeMaskTable::build(self.geometry.as_ref())));
        }
        self
    }

    /// Suppresses the stage announcement of [`build`](Self::build).
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.announce = false;
        self
    }

    /// True if [`build`](Self::build) logs the enabled stages.
    #[must_use]
    pub fn announces(&self) -> bool {
        self.announce
    }

    /// Stage configuration.
    #[must_use]
    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Creates the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if trigger masking is enabled without a
    /// trigger analyzer, or if the smearing distribution cannot be built.
    pub fn build(self) -> Result<ReductionPipeline> {
        if self.config.trigger_mask && self.trigger.is_none() {
            return Err(Error::Config(
                "trigger road masking requires a trigger analyzer".into(),
            ));
        }

        let smear = Normal::new(0.0, REALIZATION_SMEAR_SIGMA)
            .map_err(|e| Error::Config(format!("realization smearing: {e}")))?;

        if self.announce {
            announce_stages(&self.config, self.trigger.as_deref());
        }

        let mask_table = if self.config.hodo_mask {
            Some(self.mask_table.unwrap_or_else(|| {
                Arc::new(HodoscopeMaskTable::build(self.geometry.as_ref()))
            }))
        } else {
            None
        };

        Ok(ReductionPipeline {
            config: self.config,
            geometry: self.geometry,
            mask_table,
            trigger: self.trigger,
            collapser: ClusterCollapser::new(self.cluster),
            veto: SagittaVeto::new(self.sagitta),
            rng: StdRng::seed_from_u64(self.config.seed),
            smear,
            hit_list: Vec::new(),
            hodo_list: Vec::new(),
            stats: ReductionStats::default(),
        })
    }
}

fn announce_stages(config: &ReducerConfig, trigger: Option<&dyn TriggerAnalyzer>) {
    for (letter, enabled, description) in config.flags() {
        if !enabled {
            continue;
        }
        match letter {
            'g' => log::warn!("{description} requested ('g') but it has no effect"),
            't' => log::info!(
                "{description} enabled ('t') using {}",
                trigger.map_or("no analyzer", |analyzer| analyzer.name())
            ),
            _ => log::info!("{description} enabled ('{letter}')"),
        }
    }
}

/// Configurable multi-stage hit filter.
pub struct ReductionPipeline {
    config: ReducerConfig,
    geometry: Arc<dyn GeometryOracle>,
    mask_table: Option<Arc<HodoscopeMaskTable>>,
    trigger: Option<Arc<dyn TriggerAnalyzer>>,
    collapser: ClusterCollapser,
    veto: SagittaVeto,
    rng: StdRng,
    smear: Normal<f64>,
    hit_list: Vec<Hit>,
    hodo_list: Vec<Hit>,
    stats: ReductionStats,
}

impl ReductionPipeline {
    /// Creates a pipeline with default stage constants.
    ///
    /// # Errors
    ///
    /// See [`PipelineBuilder::build`].
    pub fn new(config: ReducerConfig, geometry: Arc<dyn GeometryOracle>) -> Result<Self> {
        PipelineBuilder::new(config, geometry).build()
    }

    /// Starts a [`PipelineBuilder`].
    #[must_use]
    pub fn builder(config: ReducerConfig, geometry: Arc<dyn GeometryOracle>) -> PipelineBuilder {
        PipelineBuilder::new(config, geometry)
    }

    /// Stage configuration.
    #[must_use]
    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Mask table, if hodoscope masking is enabled.
    #[must_use]
    pub fn mask_table(&self) -> Option<&HodoscopeMaskTable> {
        self.mask_table.as_deref()
    }

    /// Counts recorded for the last reduced event.
    #[must_use]
    pub fn last_stats(&self) -> &ReductionStats {
        &self.stats
    }

    /// Reduces one event in place and returns the number of chamber hits removed.
    pub fn reduce_event(&mut self, event: &mut RawEvent) -> usize {
        let mut stats = ReductionStats {
            hits_before: event.hits.len(),
            chamber_before: event.chamber_hit_count(),
            ..ReductionStats::default()
        };
        let trigger_masking =
            self.config.trigger_mask && !(self.config.dif_nim && event.is_nim_only());

        self.hit_list.clear();
        self.hodo_list.clear();
        self.admit(&event.hits, trigger_masking, &mut stats);

        if self.config.merge_hodo {
            for hit in &event.trigger_hits {
                if !hit.is_hodoscope() {
                    continue;
                }
                if trigger_masking && self.is_x_view(hit.detector_id) {
                    stats.trigger_mask += 1;
                    continue;
                }
                self.hodo_list.push(*hit);
            }
        }

        if trigger_masking {
            if let Some(analyzer) = &self.trigger {
                let mode = TriggerMode::for_merge(self.config.merge_hodo);
                analyzer.trim_event(event, &mut self.hodo_list, mode);
                self.hodo_list.retain(Hit::is_hodoscope);
            }
        }

        sort_canonical(&mut self.hodo_list);

        if let Some(table) = &self.mask_table {
            stats.hodo_mask = table.apply(&mut self.hit_list, &self.hodo_list);
            log::trace!("hodoscope mask removed {}", stats.hodo_mask);
        }

        sort_canonical(&mut self.hit_list);
        let mut merged = merge_sorted(
            std::mem::take(&mut self.hit_list),
            std::mem::take(&mut self.hodo_list),
        );

        if self.config.after_hit {
            stats.after_hit = dedup_channels(&mut merged);
            log::trace!("after-pulse removal removed {}", stats.after_hit);
        }
        if self.config.decluster {
            stats.decluster = self.collapser.collapse(&mut merged);
            log::trace!("cluster collapse removed {}", stats.decluster);
        }
        if self.config.sagitta {
            stats.sagitta = self.veto.apply(&mut merged, self.geometry.as_ref());
            log::trace!("sagitta veto removed {}", stats.sagitta);
        }

        event.replace_hits(merged);
        stats.hits_after = event.hits.len();
        stats.chamber_after = event.chamber_hit_count();

        log::debug!(
            "event {}/{}/{}: {} -> {} hits ({} chamber hits removed)",
            event.run_id,
            event.spill_id,
            event.event_id,
            stats.hits_before,
            stats.hits_after,
            stats.removed()
        );

        self.stats = stats;
        stats.removed()
    }

    /// Reduces events in order and returns the total number of chamber hits removed.
    pub fn reduce_all(&mut self, events: &mut [RawEvent]) -> usize {
        events.iter_mut().map(|event| self.reduce_event(event)).sum()
    }

    fn admit(&mut self, hits: &[Hit], trigger_masking: bool, stats: &mut ReductionStats) {
        for &input in hits {
            let mut hit = input;

            if self.config.out_of_time && !hit.in_time {
                stats.out_of_time += 1;
                continue;
            }
            if self.config.realization
                && hit.is_chamber()
                && !self.rng.gen_bool(REALIZATION_KEEP_PROBABILITY)
            {
                stats.realization += 1;
                continue;
            }
            if trigger_masking && hit.is_hodoscope() && self.is_x_view(hit.detector_id) {
                stats.trigger_mask += 1;
                continue;
            }
            if self.config.external_par {
                hit.pos = self.geometry.measurement(hit.detector_id, hit.element_id);
                hit.drift_distance = self.geometry.drift_distance(hit.detector_id, hit.tdc_time);
            }
            if self.config.realization && hit.is_chamber() {
                hit.drift_distance += self.smear.sample(&mut self.rng);
            }

            if hit.is_hodoscope() {
                self.hodo_list.push(hit);
            } else {
                self.hit_list.push(hit);
            }
        }
    }

    fn is_x_view(&self, plane: u16) -> bool {
        self.geometry.plane_type(plane) == PlaneType::X
    }
}
