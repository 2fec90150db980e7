//! Display surfaces for playback.
//!
//! The playback driver never talks to the terminal directly; it goes through a
//! [`Surface`]. [`select`] picks the implementation once at startup.

use crossterm::{cursor, execute, queue, terminal};
use std::io::{self, IsTerminal, Stdout, Write};

pub trait Surface {
    /// Prepare the display for full-screen frames and clear it.
    fn begin(&mut self) -> io::Result<()>;

    /// Draw one frame over the previous one.
    fn present(&mut self, frame: &str) -> io::Result<()>;

    /// Undo whatever `begin` changed. Must be safe to call more than once.
    fn end(&mut self) -> io::Result<()>;
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn begin(&mut self) -> io::Result<()> {
        (**self).begin()
    }

    fn present(&mut self, frame: &str) -> io::Result<()> {
        (**self).present(frame)
    }

    fn end(&mut self) -> io::Result<()> {
        (**self).end()
    }
}

/// An interactive terminal driven through crossterm (ANSI on Unix, console API on Windows).
pub struct TerminalSurface<W: Write> {
    out: W,
    active: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out, active: false }
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn begin(&mut self) -> io::Result<()> {
        execute!(
            self.out,
            cursor::Hide,
            terminal::DisableLineWrap,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        self.active = true;
        Ok(())
    }

    fn present(&mut self, frame: &str) -> io::Result<()> {
        queue!(self.out, cursor::MoveTo(0, 0))?;
        for line in frame.lines() {
            queue!(self.out, terminal::Clear(terminal::ClearType::UntilNewLine))?;
            self.out.write_all(line.as_bytes())?;
            self.out.write_all(b"\r\n")?;
        }
        self.out.flush()
    }

    fn end(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(
            self.out,
            terminal::EnableLineWrap,
            cursor::Show,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )
    }
}

impl<W: Write> Drop for TerminalSurface<W> {
    fn drop(&mut self) {
        let _ = self.end();
    }
}

/// Writes frames verbatim with no control sequences. Used when stdout is piped.
pub struct PlainSurface<W: Write> {
    out: W,
}

impl<W: Write> PlainSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Surface for PlainSurface<W> {
    fn begin(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn present(&mut self, frame: &str) -> io::Result<()> {
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }

    fn end(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Terminal surface when stdout is a terminal, plain output otherwise.
pub fn select() -> Box<dyn Surface> {
    let stdout: Stdout = io::stdout();
    if stdout.is_terminal() {
        Box::new(TerminalSurface::new(stdout))
    } else {
        Box::new(PlainSurface::new(stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_surface_is_verbatim() {
        let mut s = PlainSurface::new(Vec::new());
        s.begin().unwrap();
        s.present("&&\n  \n").unwrap();
        s.present("@@\n..\n").unwrap();
        s.end().unwrap();
        assert_eq!(s.into_inner(), b"&&\n  \n@@\n..\n");
    }

    #[test]
    fn terminal_surface_homes_cursor_per_frame() {
        let mut s = TerminalSurface::new(Vec::new());
        s.begin().unwrap();
        s.present("ab\ncd\n").unwrap();
        s.end().unwrap();
        let text = String::from_utf8(std::mem::take(&mut s.out)).unwrap();
        assert!(text.contains("\x1b[?25l"));
        assert!(text.contains("ab\r\n"));
        assert!(text.contains("cd\r\n"));
        assert!(text.contains("\x1b[?25h"));
    }
}
