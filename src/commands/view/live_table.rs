//! In-place timeline redraw using crossterm cursor control.
//!
//! The live region is whatever was drawn last. A redraw moves the cursor
//! back to its first line, clears to the end of the screen and prints the
//! new lines. Lines are cut to the terminal width so each takes exactly one
//! terminal row and the cursor arithmetic stays exact.

use std::io::{self, IsTerminal, Stdout, Write, stdout};

use crossterm::{
    QueueableCommand,
    cursor::{MoveToColumn, MoveUp},
    terminal::{Clear, ClearType},
};
use ptview::styling::truncate_visible;

pub struct LiveTable<W: Write> {
    out: W,
    /// Lines currently on screen in the live region
    drawn: Vec<String>,
    max_width: usize,
    is_tty: bool,
}

impl LiveTable<Stdout> {
    pub fn stdout(max_width: usize) -> Self {
        let out = stdout();
        let is_tty = out.is_terminal();
        Self::new(out, max_width, is_tty)
    }
}

impl<W: Write> LiveTable<W> {
    pub fn new(out: W, max_width: usize, is_tty: bool) -> Self {
        Self {
            out,
            drawn: Vec::new(),
            max_width,
            is_tty,
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Replace the live region with `lines`. No-op off a terminal.
    pub fn redraw(&mut self, lines: &[String]) -> io::Result<()> {
        if !self.is_tty {
            return Ok(());
        }

        let lines: Vec<String> = lines
            .iter()
            .map(|line| truncate_visible(line, self.max_width, "…"))
            .collect();
        if lines == self.drawn {
            return Ok(());
        }

        self.clear_region()?;
        for line in &lines {
            writeln!(self.out, "{line}")?;
        }
        self.drawn = lines;
        self.out.flush()
    }

    /// Print the complete table, replacing any live region.
    ///
    /// On a terminal lines are still cut to the width; elsewhere they are
    /// printed whole.
    pub fn finalize(&mut self, lines: &[String]) -> io::Result<()> {
        self.clear_region()?;
        for line in lines {
            if self.is_tty {
                writeln!(self.out, "{}", truncate_visible(line, self.max_width, "…"))?;
            } else {
                writeln!(self.out, "{line}")?;
            }
        }
        self.drawn.clear();
        self.out.flush()
    }

    fn clear_region(&mut self) -> io::Result<()> {
        if !self.is_tty || self.drawn.is_empty() {
            return Ok(());
        }
        let rows = u16::try_from(self.drawn.len()).unwrap_or(u16::MAX);
        self.out
            .queue(MoveUp(rows))?
            .queue(MoveToColumn(0))?
            .queue(Clear(ClearType::FromCursorDown))?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
