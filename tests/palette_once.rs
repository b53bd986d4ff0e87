// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Kept alone in its own test binary: nothing else may touch the color
//! table before the racing threads do.

extern crate mandelterm;

use mandelterm::palette::{table_builds, xterm_color, xterm_table};
use std::ptr;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn concurrent_first_use_builds_the_table_once() {
    assert_eq!(table_builds(), 0);

    let start = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                let color = xterm_color(i * 31);
                (color, xterm_table())
            })
        })
        .collect();
    let seen: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(table_builds(), 1);
    // Every thread saw the same, complete table.
    let table = xterm_table();
    for (i, &(color, seen_table)) in seen.iter().enumerate() {
        assert!(ptr::eq(seen_table, table));
        assert_eq!(color, xterm_color(i * 31));
    }
    assert_eq!(table_builds(), 1);
}
