// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The output writer.  A sink receives finished rows one at a time, in
//! order, and is responsible for putting them on the screen.

use std::io::Write;

use crate::errors::RenderError;

/// Returns the terminal to its default attributes.
pub const RESET_SEQUENCE: &[u8] = b"\x1b[0m";

/// Something that can display a row of terminal colors.
pub trait RowSink {
    /// Writes one complete row.  `row` is the row's index in the image,
    /// which sinks are free to ignore.
    fn write_row(&mut self, row: usize, colors: &[u8]) -> Result<(), RenderError>;

    /// Leaves the sink in its default color state.
    fn reset(&mut self) -> Result<(), RenderError>;

    /// Pushes anything buffered out to the underlying stream.
    fn flush(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

impl<'a, S: RowSink + ?Sized> RowSink for &'a mut S {
    fn write_row(&mut self, row: usize, colors: &[u8]) -> Result<(), RenderError> {
        (**self).write_row(row, colors)
    }

    fn reset(&mut self) -> Result<(), RenderError> {
        (**self).reset()
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        (**self).flush()
    }
}

/// Draws rows on a 256-color terminal: a color escape and a glyph per
/// cell, then a newline.  Each row reaches the stream in full and is
/// flushed before `write_row` returns.
pub struct AnsiWriter<W: Write> {
    out: W,
    glyph: u8,
    line: Vec<u8>,
}

impl<W: Write> AnsiWriter<W> {
    /// Wraps a byte stream, drawing every cell with `glyph`.
    pub fn new(out: W, glyph: u8) -> Self {
        AnsiWriter {
            out,
            glyph,
            line: Vec::new(),
        }
    }

    /// Gives back the underlying stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RowSink for AnsiWriter<W> {
    fn write_row(&mut self, _row: usize, colors: &[u8]) -> Result<(), RenderError> {
        self.line.clear();
        for &color in colors {
            write!(self.line, "\x1b[38;5;{}m", color)?;
            self.line.push(self.glyph);
        }
        self.line.push(b'\n');
        self.out.write_all(&self.line)?;
        self.out.flush()?;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), RenderError> {
        self.out.write_all(RESET_SEQUENCE)?;
        self.out.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn rows_are_escape_glyph_pairs_and_a_newline() {
        let mut writer = AnsiWriter::new(Vec::new(), b'@');
        writer.write_row(0, &[0, 196, 15]).unwrap();
        assert_eq!(
            writer.into_inner(),
            b"\x1b[38;5;0m@\x1b[38;5;196m@\x1b[38;5;15m@\n".to_vec()
        );
    }

    #[test]
    fn the_line_buffer_is_cleared_between_rows() {
        let mut writer = AnsiWriter::new(Vec::new(), b'@');
        writer.write_row(0, &[255, 255]).unwrap();
        writer.write_row(1, &[7]).unwrap();
        assert_eq!(
            writer.into_inner(),
            b"\x1b[38;5;255m@\x1b[38;5;255m@\n\x1b[38;5;7m@\n".to_vec()
        );
    }

    #[test]
    fn empty_rows_are_bare_newlines() {
        let mut writer = AnsiWriter::new(Vec::new(), b'#');
        writer.write_row(3, &[]).unwrap();
        writer.reset().unwrap();
        assert_eq!(writer.into_inner(), b"\n\x1b[0m".to_vec());
    }

    // Accepts at most two bytes per call, to make sure short writes are
    // carried on to the end.
    struct Trickle(Vec<u8>);

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(2);
            self.0.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn short_writes_are_retried() {
        let mut writer = AnsiWriter::new(Trickle(Vec::new()), b'@');
        writer.write_row(0, &[42]).unwrap();
        writer.reset().unwrap();
        assert_eq!(writer.into_inner().0, b"\x1b[38;5;42m@\n\x1b[0m".to_vec());
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failures_surface_as_io_errors() {
        let mut writer = AnsiWriter::new(Broken, b'@');
        match writer.write_row(0, &[1]) {
            Err(RenderError::Io(ref e)) if e.kind() == io::ErrorKind::BrokenPipe => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}
