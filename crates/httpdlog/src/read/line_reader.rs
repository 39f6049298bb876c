//! Line reader — fixed-window buffered line reading.
//!
//! Reads the underlying stream in large chunks and hands out lines
//! stripped of `\r?\n`. The caller owns and reuses the output buffer, so
//! steady-state reading allocates nothing per line.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Scratch window over the file.
pub const BUFFER_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug)]
pub struct LineReader<R = File> {
    source: R,
    buffer: Vec<u8>,
    filled: usize,
    offset: usize,
    eof: bool,
}

impl LineReader<File> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read> LineReader<R> {
    pub fn from_reader(source: R) -> Self {
        Self {
            source,
            buffer: vec![0; BUFFER_SIZE],
            filled: 0,
            offset: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let n = self.source.read(&mut self.buffer)?;
        self.filled = n;
        self.offset = 0;
        if n == 0 {
            self.eof = true;
        }
        Ok(())
    }

    /// Read the next line into `out`, clearing it first. Returns `true`
    /// for every line including an unterminated last one, `false` only at
    /// EOF with nothing accumulated. One trailing `\r` is stripped when a
    /// `\n` is consumed.
    pub fn read_line(&mut self, out: &mut Vec<u8>) -> io::Result<bool> {
        out.clear();

        loop {
            while self.offset < self.filled {
                let byte = self.buffer[self.offset];
                self.offset += 1;
                if byte == b'\n' {
                    if out.last() == Some(&b'\r') {
                        out.pop();
                    }
                    return Ok(true);
                }
                out.push(byte);
            }

            if self.eof {
                return Ok(!out.is_empty());
            }
            self.refill()?;
        }
    }

    pub fn finished(&self) -> bool {
        self.eof && self.offset >= self.filled
    }
}

// ── Tests ───────────────────────────────────────────────────────
