//! Ship outfitting: hardware purchase maxima, the citadel fighter console,
//! and the corp ship scan.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;
use warptty_core::event::EventKind;
use warptty_core::models::Ship;
use warptty_core::text::parse_num;

use super::{LineParser, Outcome};

fn detonator_max() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"How many Atomic Detonators do you want \(Max ([0-9]+)\)").expect("static pattern")
    })
}

fn genesis_max() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"How many Genesis Torpedoes do you want \(Max ([0-9]+)\)").expect("static pattern")
    })
}

/// Reads the maximum quoted by a hardware purchase prompt. The purchase
/// routine declines to buy once just to see this number.
pub struct BuyMaxParser {
    kind: EventKind,
    trigger: &'static str,
    regex: &'static Regex,
    last: Option<String>,
    done: bool,
}

impl BuyMaxParser {
    pub fn detonators() -> Self {
        Self {
            kind: EventKind::DetonatorBuyMax,
            trigger: "How many Atomic Detonators do you want",
            regex: detonator_max(),
            last: None,
            done: false,
        }
    }

    pub fn genesis() -> Self {
        Self {
            kind: EventKind::GenesisBuyMax,
            trigger: "How many Genesis Torpedoes do you want",
            regex: genesis_max(),
            last: None,
            done: false,
        }
    }
}

impl LineParser for BuyMaxParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        self.last = Some(line.to_string());
        if line.starts_with(self.trigger) {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        let last = self.last?;
        let Some(caps) = self.regex.captures(&last) else {
            warn!(line = %last, "failed to parse purchase prompt");
            return None;
        };
        let max = caps[1].parse().ok()?;
        Some(Outcome::BuyMax {
            kind: self.kind,
            max,
        })
    }
}

fn figs_available() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^You have ([0-9,]+) fighters available\.").expect("static pattern"))
}

/// Scrapes the citadel fighter console for the fighters available to deploy.
#[derive(Default)]
pub struct FigDeployParser {
    available: Option<i64>,
    done: bool,
}

impl FigDeployParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for FigDeployParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        let line = line.trim();
        if self.available.is_none() {
            if let Some(caps) = figs_available().captures(line) {
                self.available = parse_num(&caps[1]);
            }
        }
        if line.starts_with("Your ship can support up to") {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        self.available.map(Outcome::FigDeploy)
    }
}

/// Scrapes the corp ship scan. Rows are fixed-width: the ship id in the
/// first four columns, its sector in the next five.
#[derive(Default)]
pub struct ShipScanParser {
    started: bool,
    done: bool,
    ships: Vec<Ship>,
}

impl ShipScanParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for ShipScanParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c == '-') {
            self.started = true;
            return;
        }
        if trimmed.is_empty() {
            self.done = true;
            return;
        }
        if !self.started || line.len() <= 11 {
            return;
        }

        let (Some(id_col), Some(sector_col)) = (line.get(..4), line.get(5..10)) else {
            return;
        };
        let (Ok(id), Ok(sector)) = (id_col.trim().parse(), sector_col.trim().parse()) else {
            warn!(line, "unreadable ship scan row");
            return;
        };
        self.ships.push(Ship { id, sector });
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        Some(Outcome::Ships(self.ships))
    }
}
