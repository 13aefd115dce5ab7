//! Histogram based automatic thresholding.
//!
//! This module provides a family of stateless global threshold algorithms. Each
//! consumes the bin counts of a [`Histogram`] and returns the bin index at which
//! the data is split: bins `<= threshold` are background, bins above it are
//! foreground. [`auto_threshold`] converts the bin back into a value.
//!
//! # Algorithms
//!
//! - **Otsu**: maximises the between-class variance
//! - **Mean**: mean of the histogram
//! - **Huang**: minimises fuzzy entropy of the membership functions
//! - **Li**: iterative minimum cross entropy
//! - **Yen**: maximum correlation criterion
//! - **IsoData** / **Default**: iterative intermeans (the default is the
//!   classic variant that ignores the extreme bins and damps a dominant mode)
//! - **Intermodes** / **Minimum**: smooth until bimodal, then take the
//!   midpoint of the modes or the valley between them
//! - **MaxEntropy**: Kapur's maximum entropy split
//! - **Moments**: moment-preserving threshold
//! - **Percentile**: half of the pixels are background
//! - **Triangle**: maximum distance from the line joining the mode and the tail
//!
//! All methods return the single occupied bin for degenerate histograms.

use crate::image_proc::histogram::Histogram;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Iteration cap for the smoothing based methods
const MAX_SMOOTHING_ITERATIONS: usize = 10000;

/// Available automatic threshold algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdMethod {
    /// No thresholding: the lowest occupied bin
    None,
    Default,
    Huang,
    Intermodes,
    IsoData,
    Li,
    MaxEntropy,
    Mean,
    Minimum,
    Moments,
    Otsu,
    Percentile,
    Triangle,
    Yen,
}

impl ThresholdMethod {
    /// Every method, in display order
    pub const ALL: [ThresholdMethod; 14] = [
        ThresholdMethod::None,
        ThresholdMethod::Default,
        ThresholdMethod::Huang,
        ThresholdMethod::Intermodes,
        ThresholdMethod::IsoData,
        ThresholdMethod::Li,
        ThresholdMethod::MaxEntropy,
        ThresholdMethod::Mean,
        ThresholdMethod::Minimum,
        ThresholdMethod::Moments,
        ThresholdMethod::Otsu,
        ThresholdMethod::Percentile,
        ThresholdMethod::Triangle,
        ThresholdMethod::Yen,
    ];

    /// Human readable name
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdMethod::None => "None",
            ThresholdMethod::Default => "Default",
            ThresholdMethod::Huang => "Huang",
            ThresholdMethod::Intermodes => "Intermodes",
            ThresholdMethod::IsoData => "IsoData",
            ThresholdMethod::Li => "Li",
            ThresholdMethod::MaxEntropy => "MaxEntropy",
            ThresholdMethod::Mean => "Mean",
            ThresholdMethod::Minimum => "Minimum",
            ThresholdMethod::Moments => "Moments",
            ThresholdMethod::Otsu => "Otsu",
            ThresholdMethod::Percentile => "Percentile",
            ThresholdMethod::Triangle => "Triangle",
            ThresholdMethod::Yen => "Yen",
        }
    }
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compute the threshold value for a histogram.
pub fn auto_threshold(method: ThresholdMethod, histogram: &Histogram) -> f64 {
    histogram.value_of(threshold_bin(method, histogram.counts()))
}

/// Compute the threshold bin for raw histogram counts.
pub fn threshold_bin(method: ThresholdMethod, counts: &[u64]) -> usize {
    let (first, last) = match occupied_range(counts) {
        Some(range) => range,
        None => return 0,
    };
    if first == last || method == ThresholdMethod::None {
        return first;
    }

    let data: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    let bin = match method {
        ThresholdMethod::None => Some(first),
        ThresholdMethod::Default => Some(ij_isodata(&data)),
        ThresholdMethod::Huang => Some(huang(&data, first, last)),
        ThresholdMethod::Intermodes => intermodes(&data),
        ThresholdMethod::IsoData => isodata(&data),
        ThresholdMethod::Li => Some(li(&data)),
        ThresholdMethod::MaxEntropy => Some(max_entropy(&data)),
        ThresholdMethod::Mean => Some(mean(&data)),
        ThresholdMethod::Minimum => minimum(&data),
        ThresholdMethod::Moments => Some(moments(&data, first)),
        ThresholdMethod::Otsu => Some(otsu(&data)),
        ThresholdMethod::Percentile => Some(percentile(&data, 0.5)),
        ThresholdMethod::Triangle => Some(triangle(&data)),
        ThresholdMethod::Yen => Some(yen(&data)),
    };

    match bin {
        Some(bin) => bin.min(counts.len() - 1),
        None => {
            log::debug!("{method} threshold did not converge, using the mean");
            mean(&data)
        }
    }
}

fn occupied_range(counts: &[u64]) -> Option<(usize, usize)> {
    let first = counts.iter().position(|&c| c > 0)?;
    let last = counts.iter().rposition(|&c| c > 0)?;
    Some((first, last))
}

fn x_ln_x(x: f64) -> f64 {
    if x > 0.0 {
        x * x.ln()
    } else {
        0.0
    }
}

fn total(data: &[f64]) -> f64 {
    data.iter().sum()
}

/// Otsu's method: maximise between-class variance
fn otsu(data: &[f64]) -> usize {
    let total_count = total(data);
    let sum_all: f64 = data.iter().enumerate().map(|(i, &c)| i as f64 * c).sum();

    let mut weight_b = 0.0;
    let mut sum_b = 0.0;
    let mut best = 0;
    let mut max_variance = -1.0;

    for (k, &count) in data.iter().enumerate() {
        weight_b += count;
        if weight_b == 0.0 {
            continue;
        }
        let weight_f = total_count - weight_b;
        if weight_f == 0.0 {
            break;
        }
        sum_b += k as f64 * count;
        let mean_b = sum_b / weight_b;
        let mean_f = (sum_all - sum_b) / weight_f;
        let variance = weight_b * weight_f * (mean_b - mean_f).powi(2);
        if variance > max_variance {
            max_variance = variance;
            best = k;
        }
    }
    best
}

fn mean(data: &[f64]) -> usize {
    let sum: f64 = data.iter().enumerate().map(|(i, &c)| i as f64 * c).sum();
    (sum / total(data)).floor() as usize
}

fn huang(data: &[f64], first: usize, last: usize) -> usize {
    let n = data.len();
    let mut s = vec![0.0; n];
    let mut w = vec![0.0; n];
    s[first] = data[first];
    w[first] = first as f64 * data[first];
    for i in (first + 1)..=last {
        s[i] = s[i - 1] + data[i];
        w[i] = w[i - 1] + i as f64 * data[i];
    }

    // Entropy of the membership function for every possible distance to the mean
    let c = (last - first) as f64;
    let smu: Vec<f64> = (0..=(last - first))
        .map(|i| {
            let mu = 1.0 / (1.0 + i as f64 / c);
            -x_ln_x(mu) - x_ln_x(1.0 - mu)
        })
        .collect();

    let mut best_threshold = first;
    let mut best_entropy = f64::MAX;
    for threshold in first..=last {
        let mut entropy = 0.0;

        let mu = (w[threshold] / s[threshold]).round() as isize;
        for i in first..=threshold {
            entropy += smu[(i as isize - mu).unsigned_abs()] * data[i];
        }

        let upper = s[last] - s[threshold];
        if upper > 0.0 {
            let mu = ((w[last] - w[threshold]) / upper).round() as isize;
            for i in (threshold + 1)..=last {
                entropy += smu[(i as isize - mu).unsigned_abs()] * data[i];
            }
        }

        if best_entropy > entropy {
            best_entropy = entropy;
            best_threshold = threshold;
        }
    }
    best_threshold
}

fn is_bimodal(y: &[f64]) -> bool {
    let modes = (1..y.len().saturating_sub(1))
        .filter(|&k| y[k - 1] < y[k] && y[k + 1] < y[k])
        .count();
    modes == 2
}

/// Iteratively smooth with a 3 point running mean until the histogram is bimodal
fn smooth_until_bimodal(data: &[f64]) -> Option<Vec<f64>> {
    let n = data.len();
    if n < 3 {
        return None;
    }
    let mut y = data.to_vec();
    let mut iterations = 0;
    while !is_bimodal(&y) {
        let mut previous;
        let mut current = 0.0;
        let mut next = y[0];
        for i in 0..(n - 1) {
            previous = current;
            current = next;
            next = y[i + 1];
            y[i] = (previous + current + next) / 3.0;
        }
        y[n - 1] = (current + next) / 3.0;

        iterations += 1;
        if iterations > MAX_SMOOTHING_ITERATIONS {
            return None;
        }
    }
    Some(y)
}

fn intermodes(data: &[f64]) -> Option<usize> {
    let y = smooth_until_bimodal(data)?;
    let sum: usize = (1..(y.len() - 1))
        .filter(|&i| y[i - 1] < y[i] && y[i + 1] < y[i])
        .sum();
    Some(sum / 2)
}

fn minimum(data: &[f64]) -> Option<usize> {
    let y = smooth_until_bimodal(data)?;
    (1..(y.len() - 1)).find(|&i| y[i - 1] > y[i] && y[i + 1] >= y[i])
}

fn isodata(data: &[f64]) -> Option<usize> {
    let n = data.len();
    let mut g = (1..n).find(|&i| data[i] > 0.0)? + 1;
    loop {
        if g + 2 > n {
            return None;
        }
        let (mut low, mut total_low) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().take(g + 1) {
            total_low += c;
            low += c * i as f64;
        }
        let (mut high, mut total_high) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().skip(g + 1) {
            total_high += c;
            high += c * i as f64;
        }
        if total_low > 0.0 && total_high > 0.0 {
            low /= total_low;
            high /= total_high;
            if g as f64 == ((low + high) / 2.0).round() {
                return Some(g);
            }
        }
        g += 1;
    }
}

/// Classic intermeans variant: ignores the extreme bins and damps a dominant mode
fn ij_isodata(counts: &[f64]) -> usize {
    let mut data = counts.to_vec();
    let n = data.len();

    let (mode, &max_count) = data
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
        .unwrap_or((0, &0.0));
    let second_max = data
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != mode)
        .map(|(_, &c)| c)
        .fold(0.0, f64::max);
    if second_max > 0.0 && max_count > second_max * 2.0 {
        data[mode] = (second_max * 1.5).floor();
    }

    let max_value = n - 1;
    data[0] = 0.0;
    data[max_value] = 0.0;

    let mut min = 0;
    while data[min] == 0.0 && min < max_value {
        min += 1;
    }
    let mut max = max_value;
    while data[max] == 0.0 && max > 0 {
        max -= 1;
    }
    if min >= max {
        return n / 2;
    }

    let mut moving = min;
    let mut result;
    loop {
        let (mut sum1, mut sum2, mut sum3, mut sum4) = (0.0, 0.0, 0.0, 0.0);
        for (i, &c) in data.iter().enumerate().take(moving + 1).skip(min) {
            sum1 += i as f64 * c;
            sum2 += c;
        }
        for (i, &c) in data.iter().enumerate().take(max + 1).skip(moving + 1) {
            sum3 += i as f64 * c;
            sum4 += c;
        }
        result = (sum1 / sum2 + sum3 / sum4) / 2.0;
        moving += 1;
        if !((moving + 1) as f64 <= result && moving + 1 < max) {
            break;
        }
    }
    result.round().max(0.0) as usize
}

fn li(data: &[f64]) -> usize {
    let tolerance = 0.5;
    let n = data.len();
    let num_pixels = total(data);
    let mean_all: f64 = data.iter().enumerate().map(|(i, &c)| i as f64 * c).sum::<f64>() / num_pixels;

    let mut new_thresh = mean_all;
    let mut threshold;
    let mut iterations = 0;
    loop {
        let old_thresh = new_thresh;
        threshold = (old_thresh + 0.5).floor().clamp(0.0, (n - 1) as f64) as usize;

        let (mut sum_back, mut num_back) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().take(threshold + 1) {
            sum_back += i as f64 * c;
            num_back += c;
        }
        let (mut sum_obj, mut num_obj) = (0.0, 0.0);
        for (i, &c) in data.iter().enumerate().skip(threshold + 1) {
            sum_obj += i as f64 * c;
            num_obj += c;
        }
        if num_back == 0.0 || num_obj == 0.0 {
            break;
        }
        let mean_back = sum_back / num_back;
        let mean_obj = sum_obj / num_obj;
        if mean_back <= 0.0 || mean_obj <= 0.0 || mean_back == mean_obj {
            break;
        }

        let temp = (mean_back - mean_obj) / (mean_back.ln() - mean_obj.ln());
        new_thresh = if temp < -f64::EPSILON {
            (temp - 0.5).trunc()
        } else {
            (temp + 0.5).trunc()
        };

        iterations += 1;
        if (new_thresh - old_thresh).abs() <= tolerance || iterations > 1000 {
            break;
        }
    }
    threshold
}

fn max_entropy(data: &[f64]) -> usize {
    let n = data.len();
    let total_count = total(data);
    let norm: Vec<f64> = data.iter().map(|&c| c / total_count).collect();

    // Cumulative probability and cumulative p*ln(p)
    let mut p1 = vec![0.0; n];
    let mut h1 = vec![0.0; n];
    p1[0] = norm[0];
    h1[0] = x_ln_x(norm[0]);
    for i in 1..n {
        p1[i] = p1[i - 1] + norm[i];
        h1[i] = h1[i - 1] + x_ln_x(norm[i]);
    }
    let h_total = h1[n - 1];

    let first_bin = (0..n).find(|&i| p1[i].abs() >= f64::EPSILON).unwrap_or(0);
    let last_bin = (0..n)
        .rev()
        .find(|&i| (1.0 - p1[i]).abs() >= f64::EPSILON)
        .unwrap_or(first_bin);

    let mut threshold = first_bin;
    let mut max_ent = f64::MIN;
    for it in first_bin..=last_bin.max(first_bin) {
        let back = p1[it];
        let obj = 1.0 - back;
        // H(p/P) = ln(P) - sum(p ln p)/P
        let ent_back = if back > 0.0 { back.ln() - h1[it] / back } else { 0.0 };
        let ent_obj = if obj > 0.0 {
            obj.ln() - (h_total - h1[it]) / obj
        } else {
            0.0
        };
        let tot_ent = ent_back + ent_obj;
        if max_ent < tot_ent {
            max_ent = tot_ent;
            threshold = it;
        }
    }
    threshold
}

fn moments(data: &[f64], first: usize) -> usize {
    let total_count = total(data);
    let (mut m1, mut m2, mut m3) = (0.0, 0.0, 0.0);
    for (i, &c) in data.iter().enumerate() {
        let p = c / total_count;
        let x = i as f64;
        m1 += x * p;
        m2 += x * x * p;
        m3 += x * x * x * p;
    }
    let m0 = 1.0;
    let cd = m0 * m2 - m1 * m1;
    if cd.abs() < f64::EPSILON {
        return first;
    }
    let c0 = (-m2 * m2 + m1 * m3) / cd;
    let c1 = (m0 * -m3 + m2 * m1) / cd;
    let disc = (c1 * c1 - 4.0 * c0).max(0.0).sqrt();
    let z0 = 0.5 * (-c1 - disc);
    let z1 = 0.5 * (-c1 + disc);
    if (z1 - z0).abs() < f64::EPSILON {
        return first;
    }
    let p0 = (z1 - m1) / (z1 - z0);

    let mut sum = 0.0;
    for (i, &c) in data.iter().enumerate() {
        sum += c / total_count;
        if sum > p0 {
            return i;
        }
    }
    data.len() - 1
}

fn percentile(data: &[f64], ptile: f64) -> usize {
    let total_count = total(data);
    let mut cumulative = 0.0;
    let mut best = 0;
    let mut best_distance = f64::MAX;
    for (i, &c) in data.iter().enumerate() {
        cumulative += c;
        let distance = (cumulative / total_count - ptile).abs();
        if distance < best_distance {
            best_distance = distance;
            best = i;
        }
    }
    best
}

fn triangle(counts: &[f64]) -> usize {
    let mut data = counts.to_vec();
    let n = data.len();

    let mut min = data.iter().position(|&c| c > 0.0).unwrap_or(0);
    if min > 0 {
        // line to the empty bin before the first occupied one
        min -= 1;
    }
    let mut min2 = data.iter().rposition(|&c| c > 0.0).unwrap_or(0);
    if min2 < n - 1 {
        min2 += 1;
    }
    let mut max = 0;
    let mut dmax = 0.0;
    for (i, &c) in data.iter().enumerate() {
        if c > dmax {
            max = i;
            dmax = c;
        }
    }

    // Work on the longer tail
    let inverted = (max as isize - min as isize) < (min2 as isize - max as isize);
    if inverted {
        data.reverse();
        min = n - 1 - min2;
        max = n - 1 - max;
    }
    if min == max {
        return if inverted { n - 1 - min } else { min };
    }

    let mut nx = data[max];
    let mut ny = min as f64 - max as f64;
    let d = (nx * nx + ny * ny).sqrt();
    nx /= d;
    ny /= d;
    let d = nx * min as f64 + ny * data[min];

    let mut split = min;
    let mut split_distance = 0.0;
    for (i, &c) in data.iter().enumerate().take(max + 1).skip(min + 1) {
        let distance = nx * i as f64 + ny * c - d;
        if distance > split_distance {
            split = i;
            split_distance = distance;
        }
    }
    let split = split.saturating_sub(1);

    if inverted {
        n - 1 - split
    } else {
        split
    }
}

fn yen(data: &[f64]) -> usize {
    let n = data.len();
    let total_count = total(data);
    let norm: Vec<f64> = data.iter().map(|&c| c / total_count).collect();

    let mut p1 = vec![0.0; n];
    let mut p1_sq = vec![0.0; n];
    let mut p2_sq = vec![0.0; n];
    p1[0] = norm[0];
    p1_sq[0] = norm[0] * norm[0];
    for i in 1..n {
        p1[i] = p1[i - 1] + norm[i];
        p1_sq[i] = p1_sq[i - 1] + norm[i] * norm[i];
    }
    for i in (0..(n - 1)).rev() {
        p2_sq[i] = p2_sq[i + 1] + norm[i + 1] * norm[i + 1];
    }

    let mut threshold = 0;
    let mut max_crit = f64::MIN;
    for it in 0..n {
        let sq = p1_sq[it] * p2_sq[it];
        let spread = p1[it] * (1.0 - p1[it]);
        let crit = -(if sq > 0.0 { sq.ln() } else { 0.0 })
            + 2.0 * (if spread > 0.0 { spread.ln() } else { 0.0 });
        if crit > max_crit {
            max_crit = crit;
            threshold = it;
        }
    }
    threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well separated Gaussian-ish modes centred on 40 and 200
    fn bimodal_counts() -> Vec<u64> {
        let mut counts = vec![0u64; 256];
        for (i, c) in counts.iter_mut().enumerate() {
            let x = i as f64;
            let a = 1000.0 * (-(x - 40.0).powi(2) / (2.0 * 8.0 * 8.0)).exp();
            let b = 400.0 * (-(x - 200.0).powi(2) / (2.0 * 10.0 * 10.0)).exp();
            *c = (a + b).round() as u64;
        }
        counts
    }

    #[test]
    fn test_methods_split_bimodal_histogram() {
        let counts = bimodal_counts();
        for method in [
            ThresholdMethod::Default,
            ThresholdMethod::Intermodes,
            ThresholdMethod::IsoData,
            ThresholdMethod::Li,
            ThresholdMethod::Minimum,
            ThresholdMethod::Otsu,
        ] {
            let t = threshold_bin(method, &counts);
            assert!(
                (50..=190).contains(&t),
                "{method} threshold {t} does not separate the modes"
            );
        }
        for method in [
            ThresholdMethod::Huang,
            ThresholdMethod::MaxEntropy,
            ThresholdMethod::Yen,
        ] {
            let t = threshold_bin(method, &counts);
            assert!(t > 40 && t < 200, "{method} threshold {t} outside the modes");
        }
    }

    #[test]
    fn test_otsu_midpoint_of_two_spikes() {
        let mut counts = vec![0u64; 256];
        counts[10] = 100;
        counts[200] = 100;
        let t = threshold_bin(ThresholdMethod::Otsu, &counts);
        assert!((10..200).contains(&t));
    }

    #[test]
    fn test_mean_threshold() {
        let mut counts = vec![0u64; 16];
        counts[2] = 1;
        counts[9] = 1;
        // mean 5.5 floors to 5
        assert_eq!(threshold_bin(ThresholdMethod::Mean, &counts), 5);
    }

    #[test]
    fn test_percentile_threshold() {
        let counts = vec![10u64; 10];
        assert_eq!(threshold_bin(ThresholdMethod::Percentile, &counts), 4);
    }

    #[test]
    fn test_triangle_on_skewed_histogram() {
        // Strong low mode with a long bright tail
        let mut counts = vec![0u64; 256];
        for (i, c) in counts.iter_mut().enumerate().take(200).skip(5) {
            *c = (5000.0 * (-(i as f64 - 5.0) / 15.0).exp()).round() as u64 + 1;
        }
        let t = threshold_bin(ThresholdMethod::Triangle, &counts);
        assert!(t > 5 && t < 200, "triangle threshold {t}");
    }

    #[test]
    fn test_single_bin_is_degenerate() {
        let mut counts = vec![0u64; 256];
        counts[17] = 50;
        for method in ThresholdMethod::ALL {
            assert_eq!(threshold_bin(method, &counts), 17, "{method}");
        }
    }

    #[test]
    fn test_empty_counts() {
        assert_eq!(threshold_bin(ThresholdMethod::Otsu, &[0, 0, 0]), 0);
    }

    #[test]
    fn test_none_returns_lowest_bin() {
        let counts = bimodal_counts();
        let first = counts.iter().position(|&c| c > 0).unwrap();
        assert_eq!(threshold_bin(ThresholdMethod::None, &counts), first);
    }

    #[test]
    fn test_auto_threshold_maps_back_to_value() {
        let values: Vec<f64> = (0..100)
            .map(|i| if i < 50 { 0.1 } else { 0.9 })
            .collect();
        let hist = Histogram::from_range(values, 0.1, 0.9, 81).unwrap();
        let t = auto_threshold(ThresholdMethod::Otsu, &hist);
        assert!((0.1..0.9).contains(&t));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ThresholdMethod::MaxEntropy).unwrap();
        assert_eq!(json, "\"MAX_ENTROPY\"");
        let method: ThresholdMethod = serde_json::from_str("\"OTSU\"").unwrap();
        assert_eq!(method, ThresholdMethod::Otsu);
    }
}
