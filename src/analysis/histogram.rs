/// `num` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|idx| if idx == num - 1 { stop } else { start + step * idx as f64 })
                .collect()
        }
    }
}

/// Counts per bin for ascending `edges`. Bins are half-open except the last,
/// which includes its right edge; values outside the edges are not counted.
pub fn histogram(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0usize; bins];
    if bins == 0 {
        return counts;
    }
    let (first, last) = (edges[0], edges[bins]);
    for &value in values {
        if !value.is_finite() || value < first || value > last {
            continue;
        }
        let idx = if value == last {
            bins - 1
        } else {
            edges.partition_point(|edge| *edge <= value) - 1
        };
        counts[idx.min(bins - 1)] += 1;
    }
    counts
}

/// Index of the last bin consumed from the left before `area` (a fraction of
/// the total count) is reached.
pub fn left_tail(counts: &[usize], area: f64) -> usize {
    let total = counts.iter().sum::<usize>() as f64;
    if total == 0.0 {
        return 0;
    }
    let mut covered = 0.0;
    let mut bin = 0;
    while covered < area && bin < counts.len() {
        covered += counts[bin] as f64 / total;
        bin += 1;
    }
    bin.saturating_sub(1)
}

/// Edge index closing the right tail of `area`.
pub fn right_tail(counts: &[usize], area: f64) -> usize {
    let total = counts.iter().sum::<usize>() as f64;
    if total == 0.0 {
        return counts.len();
    }
    let mut covered = 0.0;
    let mut bin = counts.len();
    while covered < area && bin > 0 {
        covered += counts[bin - 1] as f64 / total;
        bin -= 1;
    }
    (bin + 1).min(counts.len())
}

/// Shared bin edges for a set of series: a fine grid of `bin_count² + 1`
/// edges over the full value range, trimmed to the widest tail bounds, then
/// resampled to `bin_count + 1` edges. `None` when no finite value exists.
pub fn bin_edges(series: &[&[f64]], bin_count: usize, tail_area: f64) -> Option<Vec<f64>> {
    let finite = || {
        series
            .iter()
            .flat_map(|values| values.iter().copied())
            .filter(|value| value.is_finite())
    };
    let min = finite().reduce(f64::min)?;
    let max = finite().reduce(f64::max)?;
    let (min, max) = if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    };

    let fine = linspace(min, max, bin_count * bin_count + 1);
    let mut lower: Option<usize> = None;
    let mut upper: Option<usize> = None;
    for values in series {
        let counts = histogram(values, &fine);
        if counts.iter().all(|count| *count == 0) {
            continue;
        }
        let left = left_tail(&counts, tail_area);
        let right = right_tail(&counts, tail_area);
        lower = Some(lower.map_or(left, |current| current.min(left)));
        upper = Some(upper.map_or(right, |current| current.max(right)));
    }

    let (lower, upper) = match (lower, upper) {
        (Some(lower), Some(upper)) if upper > lower => (lower, upper),
        _ => (0, fine.len() - 1),
    };
    Some(linspace(fine[lower], fine[upper], bin_count + 1))
}

/// Trailing rolling mean; the first `window - 1` positions have no value.
pub fn rolling_mean(counts: &[usize], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; counts.len()];
    }
    (0..counts.len())
        .map(|idx| {
            (idx + 1 >= window).then(|| {
                counts[idx + 1 - window..=idx]
                    .iter()
                    .map(|count| *count as f64)
                    .sum::<f64>()
                    / window as f64
            })
        })
        .collect()
}

pub fn midpoints(edges: &[f64]) -> Vec<f64> {
    edges
        .windows(2)
        .map(|pair| (pair[0] + pair[1]) / 2.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_bin_includes_right_edge() {
        let edges = linspace(0.0, 4.0, 5);
        assert_eq!(edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        let counts = histogram(&[0.0, 0.5, 1.0, 3.9, 4.0, 4.1, f64::NAN], &edges);
        assert_eq!(counts, vec![2, 1, 0, 2]);
    }

    #[test]
    fn tails_trim_sparse_outliers() {
        let mut counts = vec![0usize; 10];
        counts[0] = 1;
        counts[4] = 98;
        counts[9] = 1;
        assert_eq!(left_tail(&counts, 0.015), 4);
        assert_eq!(right_tail(&counts, 0.015), 5);
    }

    #[test]
    fn rolling_mean_is_trailing() {
        assert_eq!(
            rolling_mean(&[3, 0, 3, 6], 3),
            vec![None, None, Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn edges_span_every_series() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 5.0];
        let edges = bin_edges(&[&a, &b], 4, 0.0).unwrap();
        assert_eq!(edges.len(), 5);
        assert!((edges[0] - 1.0).abs() < 1e-9);
        assert!((edges[4] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn no_finite_values_means_no_edges() {
        let empty: [f64; 0] = [];
        assert!(bin_edges(&[&empty, &[f64::NAN]], 100, 0.015).is_none());
    }

    #[test]
    fn constant_series_gets_a_unit_range() {
        let edges = bin_edges(&[&[7.0, 7.0]], 10, 0.015).unwrap();
        assert!(edges[0] <= 7.0 && edges[10] > 7.0);
    }
}
