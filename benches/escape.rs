// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[macro_use]
extern crate criterion;
extern crate mandelterm;
extern crate num;

use criterion::Criterion;
use mandelterm::escape::iterations_at_point;
use mandelterm::palette::xterm_color;
use mandelterm::{Grid, GridSpec};
use num::Complex;

fn escape(c: &mut Criterion) {
    c.bench_function("iterations at the origin", |b| {
        b.iter(|| iterations_at_point(Complex::new(0.0, 0.0), 10_000))
    });
    c.bench_function("iterations near the boundary", |b| {
        b.iter(|| iterations_at_point(Complex::new(-0.75, 0.1), 10_000))
    });
}

fn quantize(c: &mut Criterion) {
    c.bench_function("quantize every palette entry", |b| {
        b.iter(|| (0..256).map(xterm_color).fold(0u32, |acc, x| acc + u32::from(x)))
    });
}

fn row(c: &mut Criterion) {
    let grid = Grid::new(&GridSpec {
        max_iterations: 2000,
        ..GridSpec::default()
    })
    .unwrap();
    c.bench_function("middle row of the default view", move |b| {
        b.iter(|| grid.compute_row(25))
    });
}

criterion_group!(benches, escape, quantize, row);
criterion_main!(benches);
