//! Feedback mixing matrix.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::MAX_ORDER;

/*
Feedback Matrix
===============

Every sample the filtered outputs of the N lines are mixed into the N line
inputs for the next sample:

    fb[i] = Σ_j A[i][j] · out[j]

Identity keeps every line to itself (N parallel comb filters, useful for
checking a single line's decay). Anything with off-diagonal terms spreads
energy between lines, which is what turns N combs into a dense reverb.

Lossless matrices
-----------------

If A is orthogonal (A·Aᵀ = I) the matrix neither adds nor removes energy, so
the decay is set entirely by the shelving filters. Two common choices:

    Householder   A = I - (2/N)·1·1ᵀ        any N
    Hadamard      recursive ±1 blocks / √N   N a power of two

Custom coefficients are taken as-is. A matrix with gain above one makes the
network ring forever or blow up; nothing here checks for that.

Storage
-------

Coefficients live in a MAX_ORDER × MAX_ORDER grid with a fixed row stride, so
changing N never reallocates and cells keep their (row, col) meaning.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixTopology {
    /// No cross-coupling.
    Identity,
    /// User-supplied coefficients.
    Custom,
}

pub struct FeedbackMatrix {
    custom: Vec<f32>,
    order: usize,
    topology: MatrixTopology,
}

impl FeedbackMatrix {
    /// Identity matrix of dimension `order`; custom cells start at zero.
    pub fn identity(order: usize) -> Self {
        Self {
            custom: vec![0.0; MAX_ORDER * MAX_ORDER],
            order: order.min(MAX_ORDER),
            topology: MatrixTopology::Identity,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn topology(&self) -> MatrixTopology {
        self.topology
    }

    pub fn set_topology(&mut self, topology: MatrixTopology) {
        self.topology = topology;
    }

    /// Change the dimension. Cells that come into view are zeroed; the
    /// overlapping top-left block is kept.
    pub fn resize(&mut self, order: usize) {
        let order = order.min(MAX_ORDER);
        if order > self.order {
            for row in 0..order {
                let start = if row < self.order { self.order } else { 0 };
                self.custom[row * MAX_ORDER + start..row * MAX_ORDER + order].fill(0.0);
            }
        }
        self.order = order;
    }

    /// Effective coefficient at `(row, col)` for the current topology.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        match self.topology {
            MatrixTopology::Identity => {
                if row == col {
                    1.0
                } else {
                    0.0
                }
            }
            MatrixTopology::Custom => self.custom[row * MAX_ORDER + col],
        }
    }

    /// Stored custom coefficient, regardless of the active topology.
    pub fn custom_cell(&self, row: usize, col: usize) -> f32 {
        self.custom[row * MAX_ORDER + col]
    }

    /// Caller guarantees `row` and `col` are below `order()`.
    pub fn set_cell(&mut self, row: usize, col: usize, value: f32) {
        self.custom[row * MAX_ORDER + col] = value;
    }

    /// Load `order()²` row-major custom coefficients.
    /// Caller guarantees the length.
    pub fn set_custom(&mut self, row_major: &[f32]) {
        let n = self.order;
        for (row, values) in row_major.chunks_exact(n).take(n).enumerate() {
            self.custom[row * MAX_ORDER..row * MAX_ORDER + n].copy_from_slice(values);
        }
    }

    /// `output = A · input` over the first `order()` entries.
    #[inline]
    pub fn apply(&self, input: &[f32], output: &mut [f32]) {
        let n = self.order;
        match self.topology {
            MatrixTopology::Identity => output[..n].copy_from_slice(&input[..n]),
            MatrixTopology::Custom => {
                for (row, out) in output[..n].iter_mut().enumerate() {
                    let coeffs = &self.custom[row * MAX_ORDER..row * MAX_ORDER + n];
                    *out = coeffs
                        .iter()
                        .zip(&input[..n])
                        .map(|(a, x)| a * x)
                        .sum();
                }
            }
        }
    }

    /// Effective matrix, flattened row-major at the current dimension.
    pub fn to_row_major(&self) -> Vec<f32> {
        let n = self.order;
        let mut flat = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                flat.push(self.get(row, col));
            }
        }
        flat
    }
}

/// Householder reflection `I - (2/N)·1·1ᵀ`, row-major.
pub fn householder(order: usize) -> Vec<f32> {
    let scale = 2.0 / order as f32;
    let mut m = vec![-scale; order * order];
    for i in 0..order {
        m[i * order + i] = 1.0 - scale;
    }
    m
}

/// Normalized Hadamard matrix, row-major. `order` must be a power of two.
pub fn hadamard(order: usize) -> Option<Vec<f32>> {
    if order == 0 || !order.is_power_of_two() {
        return None;
    }
    let norm = 1.0 / (order as f32).sqrt();
    let mut m = vec![0.0; order * order];
    for row in 0..order {
        for col in 0..order {
            // Sylvester construction: sign is the parity of the shared bits.
            let sign = if (row & col).count_ones() % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            m[row * order + col] = sign * norm;
        }
    }
    Some(m)
}
