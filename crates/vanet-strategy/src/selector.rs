//! Multi-criteria next-hop selection
//!
//! The main ranking is TOPSIS: each metric column is vector-normalized and
//! weighted by `1/√k`, then candidates are ranked by closeness to the ideal
//! solution relative to the negative-ideal one. Simpler single-purpose
//! rankers used by some variants live here too so they share the same
//! candidate representation.
//!
//! All selectors return `None` for an empty candidate set and break ties in
//! favor of the first candidate.

use serde::{Deserialize, Serialize};

/// Direction in which a metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Higher is better
    Benefit,
    /// Lower is better
    Cost,
}

/// One option under consideration with its raw metric values
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<T> {
    pub item: T,
    pub metrics: Vec<f64>,
}

impl<T> Candidate<T> {
    pub fn new(item: T, metrics: Vec<f64>) -> Self {
        Self { item, metrics }
    }
}

/// Vector-normalize metric columns with weight `1/√k`
///
/// `epsilon` is added to each column's sum of squares before the square
/// root. A column whose denominator is zero normalizes to all zeros.
pub fn normalize(rows: &[Vec<f64>], epsilon: f64) -> Vec<Vec<f64>> {
    let Some(width) = rows.first().map(Vec::len) else {
        return Vec::new();
    };
    if width == 0 {
        return rows.to_vec();
    }
    let weight = 1.0 / (width as f64).sqrt();

    let norms: Vec<f64> = (0..width)
        .map(|col| {
            let sum: f64 = rows.iter().map(|r| r.get(col).copied().unwrap_or(0.0).powi(2)).sum();
            (sum + epsilon).sqrt()
        })
        .collect();

    rows.iter()
        .map(|row| {
            (0..width)
                .map(|col| {
                    let value = row.get(col).copied().unwrap_or(0.0);
                    if norms[col] > 0.0 {
                        weight * value / norms[col]
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Index of the first maximum, ignoring NaN scores
pub fn first_max(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// TOPSIS ranker over a fixed set of criteria
#[derive(Debug, Clone, PartialEq)]
pub struct Topsis {
    criteria: Vec<Criterion>,
    epsilon: f64,
}

impl Topsis {
    /// Create a ranker; metric `i` of every candidate follows `criteria[i]`
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self {
            criteria,
            epsilon: 0.0,
        }
    }

    /// Add `epsilon` to each column's sum of squares during normalization
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Closeness of every row to the ideal solution, in `[0, 1]`
    ///
    /// Rows that coincide with both ideal and negative-ideal (all
    /// candidates identical) score 0.
    pub fn closeness(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let normalized = normalize(rows, self.epsilon);
        if normalized.is_empty() {
            return Vec::new();
        }

        let (ideal, negative): (Vec<f64>, Vec<f64>) = self
            .criteria
            .iter()
            .enumerate()
            .map(|(col, criterion)| {
                let (min, max) = column_extremes(&normalized, col);
                match criterion {
                    Criterion::Benefit => (max, min),
                    Criterion::Cost => (min, max),
                }
            })
            .unzip();

        normalized
            .iter()
            .map(|row| {
                let to_ideal = euclidean(row, &ideal);
                let to_negative = euclidean(row, &negative);
                let total = to_ideal + to_negative;
                if total > 0.0 { to_negative / total } else { 0.0 }
            })
            .collect()
    }

    /// Pick the candidate closest to the ideal solution
    pub fn select<'a, T>(&self, candidates: &'a [Candidate<T>]) -> Option<&'a Candidate<T>> {
        let rows: Vec<Vec<f64>> = candidates.iter().map(|c| c.metrics.clone()).collect();
        first_max(&self.closeness(&rows)).map(|i| &candidates[i])
    }
}

fn column_extremes(rows: &[Vec<f64>], col: usize) -> (f64, f64) {
    rows.iter()
        .map(|r| r.get(col).copied().unwrap_or(0.0))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Pick the candidate with the highest sum of normalized metrics
pub fn select_normalized_sum<T>(candidates: &[Candidate<T>]) -> Option<&Candidate<T>> {
    let rows: Vec<Vec<f64>> = candidates.iter().map(|c| c.metrics.clone()).collect();
    let sums: Vec<f64> = normalize(&rows, 0.0)
        .iter()
        .map(|r| r.iter().sum())
        .collect();
    first_max(&sums).map(|i| &candidates[i])
}

/// Pick the candidate with the highest weighted sum, if any scores above zero
pub fn select_weighted_sum<'a, T>(
    candidates: &'a [Candidate<T>],
    weights: &[f64],
) -> Option<&'a Candidate<T>> {
    let mut best: Option<&Candidate<T>> = None;
    let mut highest = 0.0;
    for candidate in candidates {
        let value: f64 = candidate
            .metrics
            .iter()
            .zip(weights.iter())
            .map(|(m, w)| m * w)
            .sum();
        if value > highest {
            highest = value;
            best = Some(candidate);
        }
    }
    best
}
