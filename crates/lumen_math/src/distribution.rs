/// Discrete distribution proportional to a list of non-negative weights.
///
/// Backed by a cumulative table; sampling is a binary search. Used for
/// power-proportional light selection and area-proportional triangle
/// selection on emitters.
#[derive(Debug, Clone)]
pub struct Distribution1D {
    /// Unnormalized weights.
    func: Vec<f32>,
    /// Normalized CDF, `func.len() + 1` entries starting at 0 and ending at 1.
    cdf: Vec<f32>,
    /// Sum of `func`.
    total: f32,
}

impl Distribution1D {
    /// Build from weights. Negative or non-finite weights count as zero;
    /// an all-zero table falls back to a uniform distribution.
    pub fn new(weights: Vec<f32>) -> Self {
        let func: Vec<f32> = weights
            .into_iter()
            .map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect();
        let n = func.len();

        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0f32);
        let mut running = 0.0f64;
        for &w in &func {
            running += w as f64;
            cdf.push(running as f32);
        }

        let total = running as f32;
        if total > 0.0 {
            for v in cdf.iter_mut().skip(1) {
                *v /= total;
            }
        } else {
            for (i, v) in cdf.iter_mut().enumerate().skip(1) {
                *v = i as f32 / n as f32;
            }
        }
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }

        Self { func, cdf, total }
    }

    pub fn len(&self) -> usize {
        self.func.len()
    }

    pub fn is_empty(&self) -> bool {
        self.func.is_empty()
    }

    /// Sum of the weights.
    pub fn total(&self) -> f32 {
        self.total
    }

    /// Pick an index for a uniform sample `u` in [0, 1).
    ///
    /// Returns the index and its probability, or `None` when the
    /// distribution is empty.
    pub fn sample_discrete(&self, u: f32) -> Option<(usize, f32)> {
        if self.func.is_empty() {
            return None;
        }
        // Last cdf entry <= u, skipping zero-probability buckets.
        let index = self
            .cdf
            .partition_point(|&c| c <= u)
            .saturating_sub(1)
            .min(self.func.len() - 1);
        Some((index, self.pmf(index)))
    }

    /// Probability of picking `index`.
    pub fn pmf(&self, index: usize) -> f32 {
        match self.func.get(index) {
            Some(&w) if self.total > 0.0 => w / self.total,
            Some(_) => 1.0 / self.func.len() as f32,
            None => 0.0,
        }
    }
}
