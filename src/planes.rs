// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Grid struct, which describes a relationship between
//! the character cells of the terminal, with row 0 at the top, and a
//! rectangle on the complex plane defined by its left-lower and
//! right-upper corners.  A Grid also knows how to compute one row of
//! the image and which worker owns a row.
use num::Complex;

use crate::config::GridSpec;
use crate::errors::RenderError;
use crate::escape::iterations_at_point;
use crate::palette::xterm_color;

/// Describes the column and row of a character cell.  Row 0 is the top
/// of the image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// The immutable render parameters shared by every worker.
#[derive(Clone, Debug)]
pub struct Grid {
    /// Number of character cells per row.
    pub columns: usize,
    /// Number of rows.
    pub rows: usize,
    /// The left-lower corner of the complex plane.
    pub leftlower: Complex<f64>,
    /// The right-upper corner of the complex plane.
    pub rightupper: Complex<f64>,
    /// Iteration cap for the escape-time evaluator.
    pub limit: usize,
    // Width and height of one cell on the complex plane.
    steps: (f64, f64),
}

impl Grid {
    /// Validates a grid description and derives the per-cell steps.
    pub fn new(spec: &GridSpec) -> Result<Grid, RenderError> {
        if !(spec.xmin < spec.xmax) {
            return Err(RenderError::Config(
                "The left edge is not to the left of the right edge".to_string(),
            ));
        }
        if !(spec.ymin < spec.ymax) {
            return Err(RenderError::Config(
                "The bottom edge is not below the top edge".to_string(),
            ));
        }
        if spec.max_iterations == 0 {
            return Err(RenderError::Config(
                "The iteration limit must be at least 1".to_string(),
            ));
        }

        // A grid with no columns or rows renders nothing, so its steps
        // are never used.
        let steps = (
            (spec.xmax - spec.xmin) / (spec.columns.max(1) as f64),
            (spec.ymax - spec.ymin) / (spec.rows.max(1) as f64),
        );

        Ok(Grid {
            columns: spec.columns,
            rows: spec.rows,
            leftlower: Complex::new(spec.xmin, spec.ymin),
            rightupper: Complex::new(spec.xmax, spec.ymax),
            limit: spec.max_iterations,
            steps,
        })
    }

    /// True when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.columns == 0 || self.rows == 0
    }

    /// Given a cell, return the point on the complex plane it samples.
    /// Columns run left to right from the left edge; rows run top to
    /// bottom from the upper edge.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        Complex::new(
            self.leftlower.re + (pixel.0 as f64) * self.steps.0,
            self.rightupper.im - (pixel.1 as f64) * self.steps.1,
        )
    }

    /// Computes the terminal colors of one row, left to right.
    pub fn compute_row(&self, row: usize) -> Vec<u8> {
        (0..self.columns)
            .map(|column| {
                let point = self.pixel_to_point(&Pixel(column, row));
                xterm_color(iterations_at_point(point, self.limit))
            })
            .collect()
    }

    /// The rows owned by `worker` in a pool of `workers`: every row
    /// whose index is congruent to the worker's identity, ascending.
    pub fn stripe(&self, worker: usize, workers: usize) -> impl Iterator<Item = usize> {
        (worker..self.rows).step_by(workers.max(1))
    }
}

/// The worker that owns `row` in a pool of `workers`.
#[inline]
pub fn owner(row: usize, workers: usize) -> usize {
    row % workers
}
