use ndarray::{ArrayBase, Data, Dimension};
use serde::Serialize;

/// Summary of the finite samples of a slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub finite_pixels: usize,
    pub shape: Vec<usize>,
}

/// Calculate min/max/mean/std over finite samples; `None` when there are none.
pub fn compute_stats<S, D>(array: &ArrayBase<S, D>) -> Option<SliceStatistics>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let finite = || array.iter().copied().filter(|v| v.is_finite());

    let count = finite().count();
    if count == 0 {
        return None;
    }

    let min = finite().fold(f64::INFINITY, f64::min);
    let max = finite().fold(f64::NEG_INFINITY, f64::max);
    let mean = finite().sum::<f64>() / count as f64;

    let variance = finite()
        .map(|x| {
            let diff = mean - x;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    Some(SliceStatistics {
        min,
        max,
        mean,
        std_dev: variance.sqrt(),
        finite_pixels: count,
        shape: array.shape().to_vec(),
    })
}

/// Upper bound on histogram buckets.
pub const MAX_HISTOGRAM_BINS: usize = 65_536;

/// Equal-width histogram over `[min, max]` of the finite samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<usize>,
    pub min: f64,
    pub max: f64,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins.len() as f64
    }

    /// Lower edge of every bin.
    pub fn bin_starts(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..self.bins.len())
            .map(|i| self.min + width * i as f64)
            .collect()
    }

    pub fn total(&self) -> usize {
        self.bins.iter().sum()
    }
}

/// Build a histogram with `bins` buckets, clamped to `1..=MAX_HISTOGRAM_BINS`. The maximum lands in the last bucket.
pub fn histogram<S, D>(array: &ArrayBase<S, D>, bins: usize) -> Histogram
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let bins = bins.clamp(1, MAX_HISTOGRAM_BINS);
    let mut counts = vec![0usize; bins];

    let Some(stats) = compute_stats(array) else {
        return Histogram {
            bins: counts,
            min: 0.0,
            max: 0.0,
        };
    };

    let span = stats.max - stats.min;
    for v in array.iter().copied().filter(|v| v.is_finite()) {
        let bucket = if span > 0.0 {
            (((v - stats.min) / span) * bins as f64) as usize
        } else {
            0
        };
        counts[bucket.min(bins - 1)] += 1;
    }

    Histogram {
        bins: counts,
        min: stats.min,
        max: stats.max,
    }
}
