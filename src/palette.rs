// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Color quantization for 256-color terminals.
//!
//! An iteration count is first looked up in a fixed artistic palette of
//! 256 RGB triples, and the triple is then matched against the colors an
//! xterm can actually show.  The table of representable colors is built
//! once, on first use, and never changes afterwards.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The number of terminal colors we match against: 16 basic colors, the
/// 6x6x6 color cube and 22 grays.
pub const XTERM_COLORS: usize = 254;

/// An 8-bit-per-channel color.
pub type Rgb = [u8; 3];

const BASIC16: [Rgb; 16] = [
    [0x00, 0x00, 0x00],
    [0xCD, 0x00, 0x00],
    [0x00, 0xCD, 0x00],
    [0xCD, 0xCD, 0x00],
    [0x00, 0x00, 0xEE],
    [0xCD, 0x00, 0xCD],
    [0x00, 0xCD, 0xCD],
    [0xE5, 0xE5, 0xE5],
    [0x7F, 0x7F, 0x7F],
    [0xFF, 0x00, 0x00],
    [0x00, 0xFF, 0x00],
    [0xFF, 0xFF, 0x00],
    [0x5C, 0x5C, 0xFF],
    [0xFF, 0x00, 0xFF],
    [0x00, 0xFF, 0xFF],
    [0xFF, 0xFF, 0xFF],
];

// Channel levels of the color cube.
const CUBE_LEVELS: [u8; 6] = [0x00, 0x5F, 0x87, 0xAF, 0xD7, 0xFF];

/// The Mandelbrot palette, indexed by (clamped) iteration count.
const MANDEL256: [(f64, f64, f64); 256] = [
    (0.000, 0.000, 0.734),
    (0.000, 0.300, 0.734),
    (0.000, 0.734, 0.000),
    (0.734, 0.734, 0.000),
    (0.734, 0.000, 0.000),
    (0.734, 0.000, 0.734),
    (0.000, 0.734, 0.734),
    (0.750, 0.750, 0.750),
    (0.750, 0.859, 0.750),
    (0.641, 0.781, 0.938),
    (0.500, 0.000, 0.000),
    (0.000, 0.500, 0.000),
    (0.500, 0.500, 0.000),
    (0.000, 0.000, 0.500),
    (0.500, 0.000, 0.500),
    (0.000, 0.500, 0.500),
    (0.234, 0.359, 0.234),
    (0.359, 0.359, 0.234),
    (0.484, 0.359, 0.234),
    (0.609, 0.359, 0.234),
    (0.734, 0.359, 0.234),
    (0.859, 0.359, 0.234),
    (0.984, 0.359, 0.234),
    (0.234, 0.484, 0.234),
    (0.359, 0.484, 0.234),
    (0.484, 0.484, 0.234),
    (0.609, 0.484, 0.234),
    (0.734, 0.484, 0.234),
    (0.859, 0.484, 0.234),
    (0.984, 0.484, 0.234),
    (0.234, 0.609, 0.234),
    (0.359, 0.609, 0.234),
    (0.484, 0.609, 0.234),
    (0.609, 0.609, 0.234),
    (0.734, 0.609, 0.234),
    (0.859, 0.609, 0.234),
    (0.984, 0.609, 0.234),
    (0.234, 0.734, 0.234),
    (0.359, 0.734, 0.234),
    (0.484, 0.734, 0.234),
    (0.609, 0.734, 0.234),
    (0.734, 0.734, 0.234),
    (0.859, 0.734, 0.234),
    (0.984, 0.734, 0.234),
    (0.234, 0.859, 0.234),
    (0.359, 0.859, 0.234),
    (0.484, 0.859, 0.234),
    (0.609, 0.859, 0.234),
    (0.734, 0.859, 0.234),
    (0.859, 0.859, 0.234),
    (0.984, 0.859, 0.234),
    (0.234, 0.984, 0.234),
    (0.359, 0.984, 0.234),
    (0.484, 0.984, 0.234),
    (0.609, 0.984, 0.234),
    (0.734, 0.984, 0.234),
    (0.859, 0.984, 0.234),
    (0.984, 0.984, 0.234),
    (0.234, 0.234, 0.359),
    (0.359, 0.234, 0.359),
    (0.484, 0.234, 0.359),
    (0.609, 0.234, 0.359),
    (0.734, 0.234, 0.359),
    (0.859, 0.234, 0.359),
    (0.984, 0.234, 0.359),
    (0.234, 0.359, 0.359),
    (0.359, 0.359, 0.359),
    (0.484, 0.359, 0.359),
    (0.609, 0.359, 0.359),
    (0.734, 0.359, 0.359),
    (0.859, 0.359, 0.359),
    (0.984, 0.359, 0.359),
    (0.234, 0.484, 0.359),
    (0.359, 0.484, 0.359),
    (0.484, 0.484, 0.359),
    (0.609, 0.484, 0.359),
    (0.734, 0.484, 0.359),
    (0.859, 0.484, 0.359),
    (0.984, 0.484, 0.359),
    (0.234, 0.609, 0.359),
    (0.359, 0.609, 0.359),
    (0.484, 0.609, 0.359),
    (0.609, 0.609, 0.359),
    (0.734, 0.609, 0.359),
    (0.859, 0.609, 0.359),
    (0.984, 0.609, 0.359),
    (0.234, 0.734, 0.359),
    (0.359, 0.734, 0.359),
    (0.484, 0.734, 0.359),
    (0.609, 0.734, 0.359),
    (0.734, 0.734, 0.359),
    (0.859, 0.734, 0.359),
    (0.984, 0.734, 0.359),
    (0.234, 0.859, 0.359),
    (0.359, 0.859, 0.359),
    (0.484, 0.859, 0.359),
    (0.609, 0.859, 0.359),
    (0.734, 0.859, 0.359),
    (0.859, 0.859, 0.359),
    (0.984, 0.859, 0.359),
    (0.234, 0.984, 0.359),
    (0.359, 0.984, 0.359),
    (0.484, 0.984, 0.359),
    (0.609, 0.984, 0.359),
    (0.734, 0.984, 0.359),
    (0.859, 0.984, 0.359),
    (0.984, 0.984, 0.359),
    (0.234, 0.234, 0.484),
    (0.359, 0.234, 0.484),
    (0.484, 0.234, 0.484),
    (0.609, 0.234, 0.484),
    (0.734, 0.234, 0.484),
    (0.859, 0.234, 0.484),
    (0.984, 0.234, 0.484),
    (0.234, 0.359, 0.484),
    (0.359, 0.359, 0.484),
    (0.484, 0.359, 0.484),
    (0.609, 0.359, 0.484),
    (0.734, 0.359, 0.484),
    (0.859, 0.359, 0.484),
    (0.984, 0.359, 0.484),
    (0.234, 0.484, 0.484),
    (0.359, 0.484, 0.484),
    (0.484, 0.484, 0.484),
    (0.609, 0.484, 0.484),
    (0.734, 0.484, 0.484),
    (0.859, 0.484, 0.484),
    (0.984, 0.484, 0.484),
    (0.234, 0.609, 0.484),
    (0.359, 0.609, 0.484),
    (0.484, 0.609, 0.484),
    (0.609, 0.609, 0.484),
    (0.734, 0.609, 0.484),
    (0.859, 0.609, 0.484),
    (0.984, 0.609, 0.484),
    (0.234, 0.734, 0.484),
    (0.359, 0.734, 0.484),
    (0.484, 0.734, 0.484),
    (0.609, 0.734, 0.484),
    (0.734, 0.734, 0.484),
    (0.859, 0.734, 0.484),
    (0.984, 0.734, 0.484),
    (0.234, 0.859, 0.484),
    (0.359, 0.859, 0.484),
    (0.484, 0.859, 0.484),
    (0.609, 0.859, 0.484),
    (0.734, 0.859, 0.484),
    (0.859, 0.859, 0.484),
    (0.984, 0.859, 0.484),
    (0.234, 0.984, 0.484),
    (0.359, 0.984, 0.484),
    (0.484, 0.984, 0.484),
    (0.609, 0.984, 0.484),
    (0.734, 0.984, 0.484),
    (0.859, 0.984, 0.484),
    (0.984, 0.984, 0.484),
    (0.234, 0.234, 0.609),
    (0.359, 0.234, 0.609),
    (0.484, 0.234, 0.609),
    (0.609, 0.234, 0.609),
    (0.734, 0.234, 0.609),
    (0.859, 0.234, 0.609),
    (0.984, 0.234, 0.609),
    (0.234, 0.359, 0.609),
    (0.359, 0.359, 0.609),
    (0.484, 0.359, 0.609),
    (0.609, 0.359, 0.609),
    (0.734, 0.359, 0.609),
    (0.859, 0.359, 0.609),
    (0.984, 0.359, 0.609),
    (0.234, 0.484, 0.609),
    (0.359, 0.484, 0.609),
    (0.484, 0.484, 0.609),
    (0.609, 0.484, 0.609),
    (0.734, 0.484, 0.609),
    (0.859, 0.484, 0.609),
    (0.984, 0.484, 0.609),
    (0.234, 0.609, 0.609),
    (0.359, 0.609, 0.609),
    (0.484, 0.609, 0.609),
    (0.609, 0.609, 0.609),
    (0.734, 0.609, 0.609),
    (0.859, 0.609, 0.609),
    (0.984, 0.609, 0.609),
    (0.234, 0.734, 0.609),
    (0.359, 0.734, 0.609),
    (0.484, 0.734, 0.609),
    (0.609, 0.734, 0.609),
    (0.734, 0.734, 0.609),
    (0.859, 0.734, 0.609),
    (0.984, 0.734, 0.609),
    (0.234, 0.859, 0.609),
    (0.359, 0.859, 0.609),
    (0.484, 0.859, 0.609),
    (0.609, 0.859, 0.609),
    (0.734, 0.859, 0.609),
    (0.859, 0.859, 0.609),
    (0.984, 0.859, 0.609),
    (0.234, 0.984, 0.609),
    (0.359, 0.984, 0.609),
    (0.484, 0.984, 0.609),
    (0.609, 0.984, 0.609),
    (0.734, 0.984, 0.609),
    (0.859, 0.984, 0.609),
    (0.984, 0.984, 0.609),
    (0.234, 0.234, 0.734),
    (0.359, 0.234, 0.734),
    (0.484, 0.234, 0.734),
    (0.609, 0.234, 0.734),
    (0.734, 0.234, 0.734),
    (0.859, 0.234, 0.734),
    (0.984, 0.234, 0.734),
    (0.234, 0.359, 0.734),
    (0.359, 0.359, 0.734),
    (0.484, 0.359, 0.734),
    (0.609, 0.359, 0.734),
    (0.734, 0.359, 0.734),
    (0.859, 0.359, 0.734),
    (0.984, 0.359, 0.734),
    (0.234, 0.484, 0.734),
    (0.359, 0.484, 0.734),
    (0.484, 0.484, 0.734),
    (0.609, 0.484, 0.734),
    (0.734, 0.484, 0.734),
    (0.859, 0.484, 0.734),
    (0.984, 0.484, 0.734),
    (0.234, 0.609, 0.734),
    (0.359, 0.609, 0.734),
    (0.484, 0.609, 0.734),
    (0.609, 0.609, 0.734),
    (0.734, 0.609, 0.734),
    (0.859, 0.609, 0.734),
    (0.984, 0.609, 0.734),
    (0.234, 0.734, 0.734),
    (0.359, 0.734, 0.734),
    (0.484, 0.734, 0.734),
    (0.609, 0.734, 0.734),
    (0.734, 0.734, 0.734),
    (0.859, 0.734, 0.734),
    (0.984, 0.734, 0.734),
    (0.234, 0.859, 0.734),
    (0.359, 0.859, 0.734),
    (0.484, 0.859, 0.734),
    (0.609, 0.859, 0.734),
    (0.734, 0.859, 0.734),
    (0.859, 0.859, 0.734),
    (0.984, 0.969, 0.938),
    (0.625, 0.625, 0.641),
    (0.500, 0.500, 0.500),
    (0.984, 0.000, 0.000),
    (0.000, 0.984, 0.000),
    (0.984, 0.984, 0.000),
    (0.000, 0.000, 0.984),
    (0.984, 0.000, 0.984),
    (0.000, 0.984, 0.984),
    (0.000, 0.000, 0.000),
];

static BUILDS: AtomicUsize = AtomicUsize::new(0);

static XTERM_TABLE: Lazy<[Rgb; XTERM_COLORS]> = Lazy::new(|| {
    BUILDS.fetch_add(1, Ordering::SeqCst);
    let mut table = [[0u8; 3]; XTERM_COLORS];
    for (index, slot) in table.iter_mut().enumerate() {
        *slot = xterm_to_rgb(index as u8);
    }
    log::debug!("built the {}-entry terminal color table", XTERM_COLORS);
    table
});

/// The RGB value an xterm shows for a color index in `0..XTERM_COLORS`.
/// Indices past the table are reported as the last gray.
pub fn xterm_to_rgb(index: u8) -> Rgb {
    match index {
        0..=15 => BASIC16[index as usize],
        16..=231 => {
            let cube = index - 16;
            [
                CUBE_LEVELS[(cube / 36) as usize],
                CUBE_LEVELS[((cube / 6) % 6) as usize],
                CUBE_LEVELS[(cube % 6) as usize],
            ]
        }
        _ => {
            let gray = 8 + (index.min(253) - 232) * 10;
            [gray, gray, gray]
        }
    }
}

/// The table of representable terminal colors.  The first caller builds
/// it; concurrent first callers block until that build is done.
pub fn xterm_table() -> &'static [Rgb; XTERM_COLORS] {
    &XTERM_TABLE
}

/// How many times the terminal color table has been built in this
/// process.  Never more than one.
pub fn table_builds() -> usize {
    BUILDS.load(Ordering::SeqCst)
}

/// Finds the terminal color closest to `rgb` by squared euclidean
/// distance.  Ties go to the lowest index.
pub fn nearest_xterm(rgb: Rgb) -> u8 {
    let mut best = 0;
    let mut smallest = u32::max_value();
    for (index, candidate) in xterm_table().iter().enumerate() {
        let distance: u32 = candidate
            .iter()
            .zip(rgb.iter())
            .map(|(&a, &b)| {
                let d = i32::from(a) - i32::from(b);
                (d * d) as u32
            })
            .sum();
        if distance < smallest {
            smallest = distance;
            best = index;
        }
    }
    best as u8
}

/// The artistic palette entry for an iteration count, scaled to bytes.
/// Counts above 255 share the last entry.
pub fn palette_rgb(iterations: usize) -> Rgb {
    let (red, green, blue) = MANDEL256[iterations.min(255)];
    [
        (255.0 * red) as u8,
        (255.0 * green) as u8,
        (255.0 * blue) as u8,
    ]
}

/// Maps an iteration count to the terminal color used to draw it.
pub fn xterm_color(iterations: usize) -> u8 {
    nearest_xterm(palette_rgb(iterations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_and_grays_follow_the_xterm_layout() {
        assert_eq!(xterm_to_rgb(16), [0, 0, 0]);
        assert_eq!(xterm_to_rgb(21), [0, 0, 0xFF]);
        assert_eq!(xterm_to_rgb(196), [0xFF, 0, 0]);
        assert_eq!(xterm_to_rgb(231), [0xFF, 0xFF, 0xFF]);
        assert_eq!(xterm_to_rgb(232), [8, 8, 8]);
        assert_eq!(xterm_to_rgb(253), [218, 218, 218]);
    }

    #[test]
    fn exact_matches_win_and_ties_go_low() {
        assert_eq!(nearest_xterm([0xCD, 0x00, 0x00]), 1);
        // Pure red exists as both 9 and 196.
        assert_eq!(nearest_xterm([0xFF, 0x00, 0x00]), 9);
        assert_eq!(nearest_xterm([0x00, 0x00, 0x00]), 0);
        assert_eq!(nearest_xterm([0x87, 0xAF, 0xD7]), 16 + 2 * 36 + 3 * 6 + 4);
    }

    #[test]
    fn every_table_color_maps_back_to_its_first_occurrence() {
        let table = xterm_table();
        for index in 0..XTERM_COLORS {
            let found = nearest_xterm(table[index]) as usize;
            assert!(found <= index);
            assert_eq!(table[found], table[index]);
        }
    }

    #[test]
    fn quantized_colors_are_fixed_points() {
        let table = xterm_table();
        for iterations in 0..256 {
            let color = xterm_color(iterations);
            assert_eq!(nearest_xterm(table[color as usize]), color);
        }
    }

    #[test]
    fn counts_past_the_palette_share_the_last_entry() {
        assert_eq!(palette_rgb(255), palette_rgb(100_000));
        assert_eq!(xterm_color(255), 0);
    }

}
