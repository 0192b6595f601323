//! The quick stats bar.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;
use warptty_core::models::{LrsMode, TwarpClass};
use warptty_core::text::parse_num;

use super::{LineParser, Outcome, StatusPatch};

fn stat_item() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-zA-Z]+) ([a-zA-Z0-9,-]+)").expect("static pattern"))
}

/// Splits a stats line into `Key Value` items. The game separates items with
/// a high-bit box character that survives lossy UTF-8 decoding as a
/// replacement char, so anything non-ASCII acts as a separator.
fn split_items(line: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    for c in line.chars() {
        if c.is_ascii() {
            current.push(c);
        } else if !current.is_empty() {
            items.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        items.push(current);
    }
    items
}

/// Scrapes the multi-line quick stats display. Keys the bot does not track
/// are ignored.
#[derive(Default)]
pub struct QuickStatsParser {
    lines: Vec<String>,
    done: bool,
}

impl QuickStatsParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn finalize(&self) -> StatusPatch {
        let mut patch = StatusPatch::default();
        for line in &self.lines {
            for item in split_items(line.trim()) {
                let Some(caps) = stat_item().captures(&item) else {
                    warn!(item, "unreadable quick stats item");
                    continue;
                };
                let value = &caps[2];
                match &caps[1] {
                    "Sect" => patch.sector = parse_num(value).map(|n| n as u32),
                    "Creds" => patch.creds = parse_num(value),
                    "Figs" => patch.figs = parse_num(value),
                    "Shlds" => patch.shields = parse_num(value),
                    "Hlds" => patch.holds = parse_num(value),
                    "Equ" => patch.equ = parse_num(value),
                    "Exp" => patch.exp = parse_num(value),
                    "Ship" => patch.ship = parse_num(value).map(|n| n as u32),
                    "GTorp" => patch.gtorps = parse_num(value),
                    "AtmDt" => patch.atmdts = parse_num(value),
                    "LRS" => {
                        patch.lrs = match value {
                            "None" => Some(LrsMode::None),
                            "Holo" => Some(LrsMode::Holo),
                            _ => None,
                        }
                    }
                    "TWarp" => {
                        patch.twarp = match value {
                            "No" => Some(TwarpClass::None),
                            "1" => Some(TwarpClass::One),
                            "2" => Some(TwarpClass::Two),
                            _ => None,
                        }
                    }
                    _ => {}
                }
            }
        }
        patch
    }
}

impl LineParser for QuickStatsParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        self.lines.push(line.to_string());
        if self.lines.len() >= 3 && line.trim().is_empty() {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        Some(Outcome::QuickStats(self.finalize()))
    }
}
