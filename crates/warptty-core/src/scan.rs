//! Byte-level scanning of game server output.
//!
//! Output is a mix of newline-terminated lines and prompts that park the
//! cursor without a terminator. The scanner buffers bytes into a bounded
//! window and recognizes four things as they appear: complete lines,
//! deployed-fighter contact reports (flushed by their trailing colon),
//! sub-bot chat prompts (flushed by `>`), and interactive prompts (flushed
//! by `?`). Prompt classification runs at most once per line so chat text
//! full of question marks stays cheap.

use std::sync::OnceLock;

use regex::Regex;

use crate::prompt::{self, PromptHit};
use crate::text::clean_line;

/// Longest line the game is known to produce.
pub const LINE_WINDOW: usize = 300;

/// One recognized piece of game output.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanItem {
    /// A complete line, ANSI-stripped.
    Line(String),
    /// A deployed-fighter garrison reported contact in this sector.
    FigHit(u32),
    /// The sub-bot is at its chat prompt and ready for a command.
    SubBotPrompt,
    /// An interactive prompt was classified mid-line.
    Prompt(PromptHit),
    /// The window filled without a terminator; the partial line was dropped.
    Overflow,
}

fn fig_hit() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Deployed Fighters Report Sector (\d+)").expect("static pattern"))
}

/// Incremental scanner over the raw game byte stream.
#[derive(Debug, Default)]
pub struct LineScanner {
    buf: Vec<u8>,
    prompt_checked: bool,
}

impl LineScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one byte, yielding at most one recognized item.
    pub fn feed(&mut self, byte: u8) -> Option<ScanItem> {
        if byte == b'\n' {
            let line = clean_line(&String::from_utf8_lossy(&self.buf));
            self.reset();
            return Some(ScanItem::Line(line));
        }

        // The contact report check looks at the text before the colon.
        let early = if byte == b':' { self.check_fig_hit() } else { None };

        self.buf.push(byte);

        let item = early.or_else(|| match byte {
            b'>' => self.check_subbot(),
            b'?' if !self.prompt_checked => {
                self.prompt_checked = true;
                self.check_prompt()
            }
            _ => None,
        });

        if self.buf.len() >= LINE_WINDOW {
            self.reset();
            return item.or(Some(ScanItem::Overflow));
        }
        item
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.prompt_checked = false;
    }

    fn window_text(&self) -> String {
        clean_line(&String::from_utf8_lossy(&self.buf))
    }

    fn check_fig_hit(&self) -> Option<ScanItem> {
        let clean = self.window_text();
        if !clean.contains("Deployed Fighters Report Sector") {
            return None;
        }
        let sector = fig_hit().captures(&clean)?[1].parse().ok()?;
        Some(ScanItem::FigHit(sector))
    }

    fn check_subbot(&self) -> Option<ScanItem> {
        if self.window_text().contains("{General} cbot>") {
            Some(ScanItem::SubBotPrompt)
        } else {
            None
        }
    }

    fn check_prompt(&self) -> Option<ScanItem> {
        prompt::classify(&self.window_text()).map(ScanItem::Prompt)
    }
}
