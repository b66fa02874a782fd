// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! String-only output.
//!
//! The reporter produces text, and writes it either to a terminal stream or to an in-memory
//! buffer (in tests). [`WriteStr`] abstracts over both while reporting failures as
//! [`io::Error`], unlike [`std::fmt::Write`].

use std::{
    fmt,
    io::{self, Write},
};

/// A writer that accepts UTF-8 text.
pub trait WriteStr {
    /// Writes a string.
    fn write_str(&mut self, s: &str) -> io::Result<()>;

    /// Flushes any buffered output.
    fn write_str_flush(&mut self) -> io::Result<()>;

    /// Writes formatted text. This makes the `write!` and `writeln!` macros work.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        // Plain strings skip the formatting machinery.
        if let Some(s) = args.as_str() {
            return self.write_str(s);
        }
        self.write_str(&args.to_string())
    }
}

impl WriteStr for String {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.push_str(s);
        Ok(())
    }

    fn write_str_flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapts an [`io::Write`] into a [`WriteStr`].
#[derive(Debug)]
pub struct IoWriter<W>(pub W);

impl<W: Write> WriteStr for IoWriter<W> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.0.write_all(s.as_bytes())
    }

    fn write_str_flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<T: WriteStr + ?Sized> WriteStr for &mut T {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        (**self).write_str(s)
    }

    fn write_str_flush(&mut self) -> io::Result<()> {
        (**self).write_str_flush()
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        (**self).write_fmt(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_macros() {
        let mut out = String::new();
        write!(out, "{} + {}", 1, 2).unwrap();
        writeln!(out, " = 3").unwrap();
        assert_eq!(out, "1 + 2 = 3\n");

        let mut buf = IoWriter(Vec::new());
        writeln!(buf, "hello {}", "world").unwrap();
        buf.write_str_flush().unwrap();
        assert_eq!(buf.0, b"hello world\n");
    }
}
