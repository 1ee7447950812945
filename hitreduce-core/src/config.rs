//! Reducer stage configuration.

use serde::{Deserialize, Serialize};

/// Which reduction stages run, plus the seed of the realization stream.
///
/// The legacy option string maps one letter to each flag:
///
/// | letter | flag |
/// |---|---|
/// | `a` | [`after_hit`](Self::after_hit) |
/// | `h` | [`hodo_mask`](Self::hodo_mask) |
/// | `o` | [`out_of_time`](Self::out_of_time) |
/// | `c` | [`decluster`](Self::decluster) |
/// | `m` | [`merge_hodo`](Self::merge_hodo) |
/// | `t` | [`trigger_mask`](Self::trigger_mask) |
/// | `s` | [`sagitta`](Self::sagitta) |
/// | `g` | [`hough`](Self::hough) |
/// | `e` | [`external_par`](Self::external_par) |
/// | `r` | [`realization`](Self::realization) |
/// | `n` | [`dif_nim`](Self::dif_nim) |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ReducerConfig {
    /// Collapse duplicate hits on one channel after the merge.
    pub after_hit: bool,
    /// Veto chamber hits without a covering hodoscope hit.
    pub hodo_mask: bool,
    /// Drop hits flagged out of time.
    pub out_of_time: bool,
    /// Collapse same-plane clusters of adjacent hits.
    pub decluster: bool,
    /// Merge trigger-system hodoscope hits into the hodoscope bucket.
    pub merge_hodo: bool,
    /// Replace X-hodoscope hits with trigger-road information.
    pub trigger_mask: bool,
    /// Apply the three-station sagitta veto.
    pub sagitta: bool,
    /// Reserved stage letter; has no effect.
    pub hough: bool,
    /// Recompute positions and drift distances from the geometry.
    pub external_par: bool,
    /// Randomly thin chamber hits and smear their drift distances.
    pub realization: bool,
    /// Skip trigger-road masking for NIM-only events.
    pub dif_nim: bool,
    /// Seed of the realization random stream.
    pub seed: u64,
}

impl ReducerConfig {
    /// Creates a configuration with every stage disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a legacy option string.
    ///
    /// Letters are case-insensitive; order, repetition and unknown letters
    /// are ignored.
    #[must_use]
    pub fn from_options(options: &str) -> Self {
        let mut config = Self::default();
        for letter in options.chars().map(|c| c.to_ascii_lowercase()) {
            match letter {
                'a' => config.after_hit = true,
                'h' => config.hodo_mask = true,
                'o' => config.out_of_time = true,
                'c' => config.decluster = true,
                'm' => config.merge_hodo = true,
                't' => config.trigger_mask = true,
                's' => config.sagitta = true,
                'g' => config.hough = true,
                'e' => config.external_par = true,
                'r' => config.realization = true,
                'n' => config.dif_nim = true,
                _ => {}
            }
        }
        config
    }

    /// Renders the enabled stages as a canonical option string.
    #[must_use]
    pub fn to_options(&self) -> String {
        self.flags()
            .iter()
            .filter(|(_, enabled, _)| *enabled)
            .map(|(letter, _, _)| *letter)
            .collect()
    }

    /// `(letter, enabled, description)` for every stage flag.
    #[must_use]
    pub fn flags(&self) -> [(char, bool, &'static str); 11] {
        [
            ('a', self.after_hit, "after-pulse removal"),
            ('h', self.hodo_mask, "hodoscope masking"),
            ('o', self.out_of_time, "out-of-time hit removal"),
            ('c', self.decluster, "hit cluster removal"),
            ('m', self.merge_hodo, "trigger hodoscope hit merging"),
            ('t', self.trigger_mask, "trigger road masking"),
            ('s', self.sagitta, "sagitta reducer"),
            ('g', self.hough, "hough transform reducer"),
            ('e', self.external_par, "geometry recalibration"),
            ('r', self.realization, "realization"),
            ('n', self.dif_nim, "trigger masking disabled in NIM events"),
        ]
    }

    /// Sets the realization seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enables or disables after-pulse removal.
    #[must_use]
    pub fn with_after_hit(mut self, enabled: bool) -> Self {
        self.after_hit = enabled;
        self
    }

    /// Enables or disables hodoscope masking.
    #[must_use]
    pub fn with_hodo_mask(mut self, enabled: bool) -> Self {
        self.hodo_mask = enabled;
        self
    }

    /// Enables or disables out-of-time removal.
    #[must_use]
    pub fn with_out_of_time(mut self, enabled: bool) -> Self {
        self.out_of_time = enabled;
        self
    }

    /// Enables or disables cluster collapse.
    #[must_use]
    pub fn with_decluster(mut self, enabled: bool) -> Self {
        self.decluster = enabled;
        self
    }

    /// Enables or disables trigger hit merging.
    #[must_use]
    pub fn with_merge_hodo(mut self, enabled: bool) -> Self {
        self.merge_hodo = enabled;
        self
    }

    /// Enables or disables trigger-road masking.
    #[must_use]
    pub fn with_trigger_mask(mut self, enabled: bool) -> Self {
        self.trigger_mask = enabled;
        self
    }

    /// Enables or disables the sagitta veto.
    #[must_use]
    pub fn with_sagitta(mut self, enabled: bool) -> Self {
        self.sagitta = enabled;
        self
    }

    /// Enables or disables geometry recalibration.
    #[must_use]
    pub fn with_external_par(mut self, enabled: bool) -> Self {
        self.external_par = enabled;
        self
    }

    /// Enables or disables realization.
    #[must_use]
    pub fn with_realization(mut self, enabled: bool) -> Self {
        self.realization = enabled;
        self
    }

    /// Enables or disables the NIM trigger exemption.
    #[must_use]
    pub fn with_dif_nim(mut self, enabled: bool) -> Self {
        self.dif_nim = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_options() {
        let config = ReducerConfig::from_options("aOc");
        assert!(config.after_hit);
        assert!(config.out_of_time);
        assert!(config.decluster);
        assert!(!config.hodo_mask);
        assert!(!config.sagitta);
    }

    #[test]
    fn test_from_options_ignores_unknown_and_repeats() {
        let config = ReducerConfig::from_options("zz s?S x");
        assert_eq!(config, ReducerConfig::new().with_sagitta(true));
    }

    #[test]
    fn test_empty_options() {
        assert_eq!(ReducerConfig::from_options(""), ReducerConfig::default());
    }

    #[test]
    fn test_to_options_round_trip() {
        let config = ReducerConfig::from_options("SNERGTMCOHA");
        assert_eq!(config.to_options(), "ahocmtsgern");
        assert_eq!(ReducerConfig::from_options(&config.to_options()), config);
    }

    #[test]
    fn test_builder() {
        let config = ReducerConfig::new()
            .with_hodo_mask(true)
            .with_realization(true)
            .with_seed(42);
        assert!(config.hodo_mask);
        assert!(config.realization);
        assert_eq!(config.seed, 42);
        assert_eq!(config.to_options(), "hr");
    }
}
