//! Saddle-driven peak merging.
//!
//! Peaks start ACTIVE. Each sweep visits the active peaks from the lowest rank
//! (largest id) upward and asks whether the peak is too small or too shallow
//! relative to its highest saddle. A qualifying peak is joined with that
//! neighbour; the higher-ranked (lower id) of the two survives and absorbs the
//! other's territory, totals and saddles. Merges always point from a larger id
//! to a smaller id, so no cycle can form and every merge removes exactly one
//! active peak. Sweeps repeat until nothing changes or one peak is left.
//!
//! Each merged peak keeps a link to the peak that absorbed it. The links form a
//! union-find forest so saddle neighbours resolve to their current owner.

use std::collections::VecDeque;

use shared::image_proc::Neighbourhood;

use crate::growth::PeakRegion;
use crate::options::{FindFociProcessorOptions, PeakMethod};
use crate::saddle::{sort_saddles, FindFociSaddle};
use crate::statistics::peak_height;

/// Lifecycle of a peak during merging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeakState {
    Active,
    Merged { into: u32 },
    Discarded,
}

/// Merge thresholds taken from the processor options
#[derive(Debug, Clone, Copy)]
pub(crate) struct MergeSettings {
    pub min_size: usize,
    pub max_size: usize,
    pub minimum_above_saddle: bool,
    pub contiguous_above_saddle: bool,
    pub remove_edge_maxima: bool,
    pub peak_method: PeakMethod,
    pub peak_parameter: f64,
    pub background: f64,
}

impl MergeSettings {
    pub fn from_options(options: &FindFociProcessorOptions, background: f64) -> Self {
        Self {
            min_size: options.min_size,
            max_size: options.max_size,
            minimum_above_saddle: options.minimum_above_saddle,
            contiguous_above_saddle: options.contiguous_above_saddle,
            remove_edge_maxima: options.remove_edge_maxima,
            peak_method: options.peak_method,
            peak_parameter: options.peak_parameter,
            background,
        }
    }
}

/// A peak that survived merging and filtering
#[derive(Debug, Clone)]
pub(crate) struct MergedPeak {
    pub region: PeakRegion,
    pub saddles: Vec<FindFociSaddle>,
}

#[derive(Debug, Clone)]
pub(crate) struct MergeOutcome {
    /// Surviving peaks in ascending id order
    pub peaks: Vec<MergedPeak>,
    /// Surviving peak id per pixel (0 = none)
    pub owners: Vec<u32>,
    pub merge_count: usize,
    pub discarded_count: usize,
}

pub(crate) struct PeakMerger<'a> {
    values: &'a [f32],
    assigned: &'a [u32],
    hood: &'a Neighbourhood,
    settings: MergeSettings,
    regions: Vec<PeakRegion>,
    saddles: Vec<Vec<FindFociSaddle>>,
    states: Vec<PeakState>,
    marks: Vec<u32>,
    stamp: u32,
    active: usize,
    merge_count: usize,
}

impl<'a> PeakMerger<'a> {
    /// `regions[k]` and `saddles[k]` belong to peak id `k + 1`.
    pub fn new(
        values: &'a [f32],
        assigned: &'a [u32],
        hood: &'a Neighbourhood,
        regions: Vec<PeakRegion>,
        saddles: Vec<Vec<FindFociSaddle>>,
        settings: MergeSettings,
    ) -> Self {
        let n = regions.len();
        Self {
            values,
            assigned,
            hood,
            settings,
            regions,
            saddles,
            states: vec![PeakState::Active; n],
            marks: Vec::new(),
            stamp: 0,
            active: n,
            merge_count: 0,
        }
    }

    fn slot(id: u32) -> usize {
        id as usize - 1
    }

    fn state(&self, id: u32) -> PeakState {
        self.states[Self::slot(id)]
    }

    /// Current owner of a peak id, following merge links with path compression
    fn find(&mut self, id: u32) -> u32 {
        let mut root = id;
        while let PeakState::Merged { into } = self.state(root) {
            root = into;
        }
        let mut current = id;
        while let PeakState::Merged { into } = self.state(current) {
            if into == root {
                break;
            }
            self.states[Self::slot(current)] = PeakState::Merged { into: root };
            current = into;
        }
        root
    }

    fn active_count(&self) -> usize {
        self.active
    }

    /// Resolve neighbours to their owners, drop self links, keep the highest
    /// saddle per neighbour and restore canonical order.
    fn refresh_saddles(&mut self, id: u32) {
        let list = std::mem::take(&mut self.saddles[Self::slot(id)]);
        let mut mapped: Vec<FindFociSaddle> = list
            .into_iter()
            .map(|s| FindFociSaddle::new(self.find(s.id), s.value))
            .filter(|s| s.id != id)
            .collect();
        sort_saddles(&mut mapped);

        let mut seen = Vec::with_capacity(mapped.len());
        mapped.retain(|s| {
            if seen.contains(&s.id) {
                false
            } else {
                seen.push(s.id);
                true
            }
        });
        self.saddles[Self::slot(id)] = mapped;
    }

    /// Pixels of the peak strictly above the saddle value.
    ///
    /// With `contiguous_above_saddle` only pixels connected to the maximum
    /// through such pixels are counted.
    fn count_above_saddle(&mut self, id: u32, saddle: f64) -> usize {
        let region = &self.regions[Self::slot(id)];
        if !self.settings.contiguous_above_saddle {
            return region
                .pixels
                .iter()
                .filter(|&&p| self.values[p] as f64 > saddle)
                .count();
        }

        if self.marks.is_empty() {
            self.marks = vec![0; self.values.len()];
        }
        self.stamp += 2;
        let (candidate, visited) = (self.stamp - 1, self.stamp);
        for &p in &region.pixels {
            if self.values[p] as f64 > saddle {
                self.marks[p] = candidate;
            }
        }

        let start = region.max_index;
        if self.marks[start] != candidate {
            return 0;
        }
        let mut queue = VecDeque::from([start]);
        self.marks[start] = visited;
        let mut count = 0;
        while let Some(p) = queue.pop_front() {
            count += 1;
            for (_, n) in self.hood.neighbours(p) {
                if self.marks[n] == candidate {
                    self.marks[n] = visited;
                    queue.push_back(n);
                }
            }
        }
        count
    }

    /// Neighbour to merge with, if the peak is too small or too shallow
    fn merge_target(&mut self, id: u32) -> Option<u32> {
        self.refresh_saddles(id);
        let first = *self.saddles[Self::slot(id)].first()?;

        let region = &self.regions[Self::slot(id)];
        let (count, v0) = (region.count, region.max_value);
        let size = if self.settings.minimum_above_saddle {
            self.count_above_saddle(id, first.value)
        } else {
            count
        };
        let height = peak_height(
            self.settings.peak_method,
            self.settings.peak_parameter,
            self.settings.background,
            v0,
        );

        if size < self.settings.min_size || v0 - first.value < height {
            Some(first.id)
        } else {
            None
        }
    }

    /// Join two active peaks; the lower id survives
    fn merge(&mut self, a: u32, b: u32) {
        let (survivor, absorbed) = if a < b { (a, b) } else { (b, a) };

        let (left, right) = self.regions.split_at_mut(Self::slot(absorbed));
        left[Self::slot(survivor)].absorb(&mut right[0]);

        let moved = std::mem::take(&mut self.saddles[Self::slot(absorbed)]);
        self.saddles[Self::slot(survivor)].extend(moved);

        self.states[Self::slot(absorbed)] = PeakState::Merged { into: survivor };
        self.active -= 1;
        self.merge_count += 1;
    }

    /// Run merge sweeps until stable.
    pub fn run(&mut self) {
        let n = self.regions.len() as u32;
        loop {
            let mut changed = false;
            for id in (1..=n).rev() {
                if self.state(id) != PeakState::Active {
                    continue;
                }
                if self.active_count() <= 1 {
                    break;
                }
                if let Some(target) = self.merge_target(id) {
                    log::trace!("Merging peak {id} with {target}");
                    self.merge(id, target);
                    changed = true;
                }
            }
            if !changed || self.active_count() <= 1 {
                break;
            }
        }
        log::debug!(
            "{} merges, {} of {} peaks active",
            self.merge_count,
            self.active_count(),
            n
        );
    }

    /// Discard small isolated peaks, then apply edge and size filters.
    pub fn filter(&mut self) -> usize {
        let dims = *self.hood.dims();
        let mut discarded = 0;
        for slot in 0..self.regions.len() {
            if self.states[slot] != PeakState::Active {
                continue;
            }
            let region = &self.regions[slot];
            let too_small = region.count < self.settings.min_size;
            let on_edge =
                self.settings.remove_edge_maxima && region.bounds.touches_xy_edge(&dims);
            let too_large = self.settings.max_size > 0 && region.count > self.settings.max_size;
            if too_small || on_edge || too_large {
                log::trace!(
                    "Discarding peak {} (small={too_small} edge={on_edge} large={too_large})",
                    region.id
                );
                self.states[slot] = PeakState::Discarded;
                self.active -= 1;
                discarded += 1;
            }
        }
        discarded
    }

    /// Consume the merger into the surviving peaks and pixel ownership.
    pub fn finish(mut self, discarded_count: usize) -> MergeOutcome {
        let n = self.regions.len() as u32;
        for id in 1..=n {
            if self.state(id) == PeakState::Active {
                self.refresh_saddles(id);
            }
        }

        let mut resolved = vec![0u32; n as usize + 1];
        for id in 1..=n {
            let root = self.find(id);
            if self.state(root) == PeakState::Active {
                resolved[id as usize] = root;
            }
        }
        let owners = self
            .assigned
            .iter()
            .map(|&a| resolved[a as usize])
            .collect();

        let states = self.states;
        let peaks = self
            .regions
            .into_iter()
            .zip(self.saddles)
            .zip(states.iter())
            .filter(|(_, state)| **state == PeakState::Active)
            .map(|((region, saddles), _)| MergedPeak { region, saddles })
            .collect();

        MergeOutcome {
            peaks,
            owners,
            merge_count: self.merge_count,
            discarded_count,
        }
    }

    #[cfg(test)]
    fn states(&self) -> &[PeakState] {
        &self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::{grow_regions, steepest_ascent, GrowthLevels, NeverCancel};
    use crate::maxima::find_maxima;
    use crate::options::SearchMethod;
    use crate::saddle::find_saddles;
    use crate::types::PixelTypes;
    use shared::ImageDims;

    fn settings() -> MergeSettings {
        MergeSettings {
            min_size: 1,
            max_size: 0,
            minimum_above_saddle: false,
            contiguous_above_saddle: false,
            remove_edge_maxima: false,
            peak_method: PeakMethod::Absolute,
            peak_parameter: 0.0,
            background: 0.0,
        }
    }

    struct Stage {
        values: Vec<f32>,
        assigned: Vec<u32>,
        hood: Neighbourhood,
        regions: Vec<PeakRegion>,
        saddles: Vec<Vec<FindFociSaddle>>,
    }

    fn stage(values: Vec<f32>, dims: ImageDims) -> Stage {
        let hood = Neighbourhood::full(dims);
        let mut types = PixelTypes::new(values.len());
        let maxima = find_maxima(&values, &mut types, &hood);
        let directions = steepest_ascent(&values, &types, &hood);
        let levels = GrowthLevels {
            background: 0.0,
            search_background: 0.0,
            search_method: SearchMethod::AboveBackground,
            search_parameter: 0.0,
        };
        let (assigned, regions) = grow_regions(
            &values,
            &types,
            &directions,
            &hood,
            &maxima,
            levels,
            &NeverCancel,
        )
        .unwrap();
        let saddles = find_saddles(&values, &assigned, &mut types, &hood, regions.len());
        Stage {
            values,
            assigned,
            hood,
            regions,
            saddles,
        }
    }

    fn merged(stage: &Stage, settings: MergeSettings) -> (MergeOutcome, Vec<PeakState>) {
        let mut merger = PeakMerger::new(
            &stage.values,
            &stage.assigned,
            &stage.hood,
            stage.regions.clone(),
            stage.saddles.clone(),
            settings,
        );
        merger.run();
        let states = merger.states().to_vec();
        let discarded = merger.filter();
        (merger.finish(discarded), states)
    }

    // Two peaks (9 at x=1, 7 at x=5) separated by a valley of 4
    fn two_peaks() -> Stage {
        stage(
            vec![1.0, 9.0, 6.0, 4.0, 5.0, 7.0, 2.0],
            ImageDims::from_width_height(7, 1),
        )
    }

    #[test]
    fn test_find_follows_merge_links() {
        let s = stage(
            vec![1.0, 9.0, 4.0, 8.0, 3.0, 7.0, 1.0],
            ImageDims::from_width_height(7, 1),
        );
        assert_eq!(s.regions.len(), 3);
        let mut merger = PeakMerger::new(
            &s.values,
            &s.assigned,
            &s.hood,
            s.regions.clone(),
            s.saddles.clone(),
            settings(),
        );
        merger.merge(2, 3);
        merger.merge(1, 2);
        assert_eq!(merger.states()[2], PeakState::Merged { into: 2 });

        assert_eq!(merger.find(3), 1);
        assert_eq!(merger.states()[2], PeakState::Merged { into: 1 });
        assert_eq!(merger.find(1), 1);
        assert_eq!(merger.active_count(), 1);
    }

    #[test]
    fn test_no_merge_when_peaks_are_distinct() {
        let s = two_peaks();
        let (outcome, _) = merged(&s, settings());
        assert_eq!(outcome.peaks.len(), 2);
        assert_eq!(outcome.merge_count, 0);
        assert_eq!(outcome.peaks[0].saddles, vec![FindFociSaddle::new(2, 4.0)]);
        assert_eq!(outcome.peaks[1].saddles, vec![FindFociSaddle::new(1, 4.0)]);
    }

    #[test]
    fn test_height_merge_into_higher_rank() {
        let s = two_peaks();
        // Peak 2 rises 3 above the saddle; require 3.5
        let (outcome, states) = merged(
            &s,
            MergeSettings {
                peak_parameter: 3.5,
                ..settings()
            },
        );
        assert_eq!(outcome.peaks.len(), 1);
        assert_eq!(outcome.peaks[0].region.id, 1);
        assert_eq!(outcome.peaks[0].region.count, 7);
        assert_eq!(outcome.peaks[0].region.total, 34.0);
        assert!(outcome.peaks[0].saddles.is_empty());
        assert_eq!(states[1], PeakState::Merged { into: 1 });
        assert!(outcome.owners.iter().all(|&o| o == 1));
    }

    #[test]
    fn test_size_merge() {
        let s = two_peaks();
        let count_2 = s.regions[1].count;
        let (outcome, _) = merged(
            &s,
            MergeSettings {
                min_size: count_2 + 1,
                ..settings()
            },
        );
        assert_eq!(outcome.peaks.len(), 1);
        assert_eq!(outcome.merge_count, 1);
    }

    #[test]
    fn test_minimum_above_saddle_counts_only_upper_pixels() {
        let s = two_peaks();
        // Peak 2 owns {5, 7, 2}; only 5 and 7 are above the saddle of 4
        let base = MergeSettings {
            min_size: 3,
            ..settings()
        };
        let (plain, _) = merged(&s, base);
        assert_eq!(plain.peaks.len(), 2);

        let (above, _) = merged(
            &s,
            MergeSettings {
                minimum_above_saddle: true,
                ..base
            },
        );
        assert_eq!(above.peaks.len(), 1);
    }

    #[test]
    fn test_contiguous_above_saddle() {
        let s = two_peaks();
        let merger_with = |contiguous| {
            let mut merger = PeakMerger::new(
                &s.values,
                &s.assigned,
                &s.hood,
                s.regions.clone(),
                s.saddles.clone(),
                MergeSettings {
                    contiguous_above_saddle: contiguous,
                    ..settings()
                },
            );
            merger.merge(2, 1);
            merger
        };

        // After the merge {9, 6} reach the maximum while {5, 7} sit beyond the valley of 4
        let mut contiguous = merger_with(true);
        assert_eq!(contiguous.count_above_saddle(1, 4.5), 2);
        assert_eq!(contiguous.count_above_saddle(1, 3.0), 5);
        assert_eq!(contiguous.count_above_saddle(1, 8.5), 1);
        assert_eq!(contiguous.count_above_saddle(1, 9.0), 0);

        let mut anywhere = merger_with(false);
        assert_eq!(anywhere.count_above_saddle(1, 4.5), 4);
    }

    #[test]
    fn test_merges_point_to_lower_ids_and_reduce_active_peaks() {
        // Many shallow ripples on a slope
        let values: Vec<f32> = (0..40)
            .map(|i| 100.0 - i as f32 + if i % 3 == 0 { 2.0 } else { 0.0 })
            .collect();
        let s = stage(values, ImageDims::from_width_height(40, 1));
        let initial = s.regions.len();
        assert!(initial > 5);

        let (outcome, states) = merged(
            &s,
            MergeSettings {
                peak_parameter: 10.0,
                ..settings()
            },
        );
        for (slot, state) in states.iter().enumerate() {
            if let PeakState::Merged { into } = state {
                assert!((*into as usize) < slot + 1);
            }
        }
        assert!(outcome.merge_count < initial);
        assert_eq!(outcome.peaks.len(), initial - outcome.merge_count);
    }

    #[test]
    fn test_filters() {
        let s = two_peaks();
        let (outcome, _) = merged(
            &s,
            MergeSettings {
                remove_edge_maxima: true,
                ..settings()
            },
        );
        // Both regions reach x = 0 or x = 6 in a single-row image
        assert!(outcome.peaks.is_empty());
        assert_eq!(outcome.discarded_count, 2);
        assert!(outcome.owners.iter().all(|&o| o == 0));

        let (outcome, _) = merged(
            &s,
            MergeSettings {
                max_size: 3,
                ..settings()
            },
        );
        assert!(outcome.peaks.iter().all(|p| p.region.count <= 3));
    }
}
