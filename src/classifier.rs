//! # Logistic regression
//! Binary L2-regularized logistic regression, fitted with L-BFGS.
//!
//! Objective (mean-scaled, intercept not penalized):
//!
//! ```text
//! F(w, b) = (1/S) Σ s_i · (softplus(z_i) - y_i z_i) + ||w||² / (2 C S),   z_i = w·x_i + b
//! ```
//!
//! `s_i` are class weights (`n / (2 n_c)` when balanced), `S = Σ s_i`.
//! Converged when `max |∇F| <= tol`. Running out of iterations is reported
//! as a [`ConvergenceWarning`], not an error: the best iterate is kept.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, warn};

use crate::dataset::{Label, TrainingSet};
use crate::error::TrainingFailed;
use crate::pipeline::Cancellation;
use crate::vectorize::FeatureVector;

/// Rows per partial-gradient chunk; fixed so the summation order (and the
/// fitted weights) do not depend on the thread count.
const CHUNK: usize = 512;
const HISTORY: usize = 10;
const ARMIJO_C1: f64 = 1e-4;
const MAX_LINE_SEARCH_STEPS: usize = 40;

/// Probability model over fixed-width feature vectors.
pub trait Classifier: Send + Sync {
    /// Width of the feature vectors this model accepts.
    fn n_features(&self) -> usize;

    /// Probability of [`Label::Offensive`] per row.
    fn predict_proba(&self, rows: &[FeatureVector]) -> Vec<f64>;

    /// Hard labels at 0.5. Reporting only; moderation uses its own threshold.
    fn predict(&self, rows: &[FeatureVector]) -> Vec<Label> {
        self.predict_proba(rows)
            .into_iter()
            .map(|p| if p > 0.5 { Label::Offensive } else { Label::Normal })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub balanced: bool,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            balanced: true,
        }
    }
}

/// Optimizer stopped at `max_iter` before reaching the gradient tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    pub iterations: usize,
    pub max_abs_gradient: f64,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lbfgs did not converge in {} iterations (max |grad| = {:.3e}); using best iterate",
            self.iterations, self.max_abs_gradient
        )
    }
}

#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub model: LogisticRegression,
    pub iterations: usize,
    pub loss: f64,
    pub warning: Option<ConvergenceWarning>,
}

/// Fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    pub fn decision_function(&self, x: &FeatureVector) -> f64 {
        x.dot(&self.weights) + self.intercept
    }

    pub fn probability(&self, x: &FeatureVector) -> f64 {
        sigmoid(self.decision_function(x))
    }
}

impl Classifier for LogisticRegression {
    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn predict_proba(&self, rows: &[FeatureVector]) -> Vec<f64> {
        rows.iter().map(|x| self.probability(x)).collect()
    }
}

impl LogisticParams {
    pub fn fit(
        &self,
        set: &TrainingSet,
        cancel: &Cancellation,
    ) -> Result<FitOutcome, TrainingFailed> {
        if set.is_empty() {
            return Err(TrainingFailed::dataset("cannot fit classifier on zero rows"));
        }
        let dim = set.features().first().map(FeatureVector::len).unwrap_or(0);
        let objective = Objective::new(set, self.c, self.balanced);

        let mut x = vec![0.0; dim + 1];
        let (mut f, mut g) = objective.eval(&x);
        let mut s_hist: VecDeque<Vec<f64>> = VecDeque::with_capacity(HISTORY);
        let mut y_hist: VecDeque<Vec<f64>> = VecDeque::with_capacity(HISTORY);
        let mut iterations = 0;
        let mut converged = max_abs(&g) <= self.tol;

        while !converged && iterations < self.max_iter {
            cancel.check("classifier fit")?;
            iterations += 1;

            let mut dir = two_loop(&g, &s_hist, &y_hist);
            let mut slope = dot(&g, &dir);
            if slope >= 0.0 {
                // not a descent direction: drop curvature history
                s_hist.clear();
                y_hist.clear();
                dir = g.iter().map(|v| -v).collect();
                slope = -dot(&g, &g);
            }
            let mut step = if s_hist.is_empty() {
                (1.0 / norm(&g)).min(1.0)
            } else {
                1.0
            };

            let mut accepted = None;
            for _ in 0..MAX_LINE_SEARCH_STEPS {
                let candidate: Vec<f64> = x.iter().zip(&dir).map(|(xi, di)| xi + step * di).collect();
                let (fc, gc) = objective.eval(&candidate);
                if fc.is_finite() && fc <= f + ARMIJO_C1 * step * slope {
                    accepted = Some((candidate, fc, gc));
                    break;
                }
                step *= 0.5;
            }
            let Some((x_new, f_new, g_new)) = accepted else {
                debug!(target: "training", iterations, "line search failed; stopping");
                break;
            };

            let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
            if dot(&s, &y) > 1e-10 {
                if s_hist.len() == HISTORY {
                    s_hist.pop_front();
                    y_hist.pop_front();
                }
                s_hist.push_back(s);
                y_hist.push_back(y);
            }
            x = x_new;
            f = f_new;
            g = g_new;
            converged = max_abs(&g) <= self.tol;
        }

        let warning = (!converged).then(|| ConvergenceWarning {
            iterations,
            max_abs_gradient: max_abs(&g),
        });
        match &warning {
            Some(w) => warn!(target: "training", %w, "convergence warning"),
            None => debug!(target: "training", iterations, loss = f, "lbfgs converged"),
        }

        let intercept = x[dim];
        x.truncate(dim);
        Ok(FitOutcome {
            model: LogisticRegression {
                weights: x,
                intercept,
            },
            iterations,
            loss: f,
            warning,
        })
    }
}

struct Objective<'a> {
    rows: &'a [FeatureVector],
    targets: Vec<f64>,
    sample_weights: Vec<f64>,
    weight_sum: f64,
    c: f64,
    dim: usize,
}

impl<'a> Objective<'a> {
    fn new(set: &'a TrainingSet, c: f64, balanced: bool) -> Self {
        let counts = set.class_counts();
        let n = set.len() as f64;
        let class_weight = |l: Label| {
            if balanced {
                n / (2.0 * counts.get(l) as f64)
            } else {
                1.0
            }
        };
        let sample_weights: Vec<f64> = set.labels().iter().map(|l| class_weight(*l)).collect();
        Self {
            rows: set.features(),
            targets: set.labels().iter().map(|l| l.target()).collect(),
            weight_sum: sample_weights.iter().sum(),
            sample_weights,
            c,
            dim: set.features().first().map(FeatureVector::len).unwrap_or(0),
        }
    }

    /// Loss and gradient at `theta = [w.., b]`.
    fn eval(&self, theta: &[f64]) -> (f64, Vec<f64>) {
        let (w, b) = theta.split_at(self.dim);
        let b = b[0];

        let partials: Vec<(f64, Vec<f64>)> = self
            .rows
            .par_chunks(CHUNK)
            .zip(self.targets.par_chunks(CHUNK))
            .zip(self.sample_weights.par_chunks(CHUNK))
            .map(|((rows, ys), sws)| {
                let mut loss = 0.0;
                let mut grad = vec![0.0; self.dim + 1];
                for ((x, y), sw) in rows.iter().zip(ys).zip(sws) {
                    let z = x.dot(w) + b;
                    loss += sw * (softplus(z) - y * z);
                    let r = sw * (sigmoid(z) - y);
                    for (i, v) in x.iter() {
                        grad[i] += r * v;
                    }
                    grad[self.dim] += r;
                }
                (loss, grad)
            })
            .collect();

        let mut loss = 0.0;
        let mut grad = vec![0.0; self.dim + 1];
        for (l, g) in partials {
            loss += l;
            for (acc, v) in grad.iter_mut().zip(g) {
                *acc += v;
            }
        }

        let scale = 1.0 / self.weight_sum;
        let reg = 1.0 / (self.c * self.weight_sum);
        loss = loss * scale + 0.5 * reg * dot(w, w);
        for (i, gi) in grad.iter_mut().enumerate() {
            *gi *= scale;
            if i < self.dim {
                *gi += reg * w[i];
            }
        }
        (loss, grad)
    }
}

/// L-BFGS two-loop recursion; returns the search direction `-H·g`.
fn two_loop(g: &[f64], s_hist: &VecDeque<Vec<f64>>, y_hist: &VecDeque<Vec<f64>>) -> Vec<f64> {
    let mut q = g.to_vec();
    let k = s_hist.len();
    let mut alphas = vec![0.0; k];
    let rhos: Vec<f64> = (0..k).map(|i| 1.0 / dot(&y_hist[i], &s_hist[i])).collect();

    for i in (0..k).rev() {
        alphas[i] = rhos[i] * dot(&s_hist[i], &q);
        axpy(-alphas[i], &y_hist[i], &mut q);
    }
    if let (Some(s), Some(y)) = (s_hist.back(), y_hist.back()) {
        let gamma = dot(s, y) / dot(y, y);
        q.iter_mut().for_each(|v| *v *= gamma);
    }
    for i in 0..k {
        let beta = rhos[i] * dot(&y_hist[i], &q);
        axpy(alphas[i] - beta, &s_hist[i], &mut q);
    }
    q.iter_mut().for_each(|v| *v = -*v);
    q
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}
