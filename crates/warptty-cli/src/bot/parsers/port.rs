//! Port commerce intelligence: the commerce report, the rob estimate, and
//! the dockside stock check used when casing a steal.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use tracing::warn;
use warptty_core::models::{PortItem, PortReport, TradeStatus};
use warptty_core::text::parse_num;

use super::{LineParser, Outcome};

fn fuel_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Fuel Ore   (Buying|Selling) +(\d+) +(\d+)%").expect("static pattern"))
}

fn org_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Organics   (Buying|Selling) +(\d+) +(\d+)%").expect("static pattern"))
}

fn equ_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Equipment  (Buying|Selling) +(\d+) +(\d+)%").expect("static pattern"))
}

fn typed_sector() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"What sector is the port in\?.+\[[0-9]+\] ([0-9]+)").expect("static pattern")
    })
}

fn default_sector() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"What sector is the port in\?.+\[([0-9]+)\]").expect("static pattern")
    })
}

fn parse_item(line: &str, re: &Regex) -> Option<PortItem> {
    let Some(caps) = re.captures(line) else {
        warn!(line, "unreadable commerce report line");
        return None;
    };
    let status = match &caps[1] {
        "Buying" => TradeStatus::Buying,
        _ => TradeStatus::Selling,
    };
    Some(PortItem {
        status,
        trading: caps[2].parse().ok()?,
        percent: caps[3].parse().ok()?,
    })
}

/// Scrapes a commerce report. The report names its sector when requested
/// through the computer prompt; a report pulled up while docked does not, so
/// the parser is constructed with the current sector as the fallback.
pub struct PortReportParser {
    lines: Vec<String>,
    current_sector: u32,
    done: bool,
    readable: bool,
}

impl PortReportParser {
    pub fn new(current_sector: u32) -> Self {
        Self {
            lines: Vec::new(),
            current_sector,
            done: false,
            readable: false,
        }
    }

    fn finalize(&self) -> Option<(u32, PortReport)> {
        if !self.readable || self.lines.len() < 3 {
            return None;
        }

        let sector = if self.lines[0].starts_with("What sector is the port in?") {
            match typed_sector().captures(&self.lines[0]) {
                Some(caps) => caps[1].parse().ok()?,
                None => match default_sector().captures(&self.lines[0]) {
                    Some(caps) => caps[1].parse().ok()?,
                    None => 0,
                },
            }
        } else {
            self.current_sector
        };

        let n = self.lines.len();
        let fuel = parse_item(&self.lines[n - 3], fuel_info())?;
        let org = parse_item(&self.lines[n - 2], org_info())?;
        let equ = parse_item(&self.lines[n - 1], equ_info())?;

        let report = PortReport {
            time: Utc::now(),
            fuel,
            org,
            equ,
        };
        Some((sector, report))
    }
}

impl LineParser for PortReportParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        let line = line.trim();
        self.lines.push(line.to_string());
        if line.starts_with("I have no information about a port") {
            self.done = true;
        } else if line.starts_with("Equipment") {
            self.done = true;
            self.readable = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        self.finalize()
            .map(|(sector, report)| Outcome::PortReport { sector, report })
    }
}

/// Scrapes the credits-on-hand estimate shown while casing a port for a rob.
pub struct PortRobParser {
    first: Option<String>,
    sector: u32,
    done: bool,
}

fn rob_creds() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^The Trade Journals estimate this port has in excess of ([0-9,]+) creds onhand\.")
            .expect("static pattern")
    })
}

impl PortRobParser {
    pub fn new(sector: u32) -> Self {
        Self {
            first: None,
            sector,
            done: false,
        }
    }
}

impl LineParser for PortRobParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        if self.first.is_none() {
            self.first = Some(line.to_string());
        }
        if line.starts_with("The Trade Journals estimate this port has") {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        let first = self.first?;
        let Some(caps) = rob_creds().captures(&first) else {
            warn!("no match for port rob creds");
            return None;
        };
        let creds = parse_num(&caps[1])?;
        Some(Outcome::PortCreds {
            sector: self.sector,
            creds,
        })
    }
}

/// Watches a dockside inventory listing for the equipment units on the dock.
#[derive(Default)]
pub struct StealStockParser {
    stock: Option<i64>,
    done: bool,
}

fn equ_on_dock() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Equipment  Buying +[0-9]+ +([0-9]+) ").expect("static pattern"))
}

impl StealStockParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for StealStockParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        if let Some(caps) = equ_on_dock().captures(line) {
            self.stock = caps[1].parse().ok();
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        Some(Outcome::StealStock(self.stock?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_via_computer_prompt() {
        let mut parser = Box::new(PortReportParser::new(5));
        parser.parse("What sector is the port in? [250] 1000");
        parser.parse("");
        parser.parse("Commerce report for Sundown Trading: 12:30:04 PM Sat May 06, 2051");
        parser.parse("");
        parser.parse(" Items     Status  Trading % of max OnBoard");
        parser.parse(" -----     ------  ------- -------- -------");
        parser.parse("Fuel Ore   Buying    2810    100%       0");
        parser.parse("Organics   Buying    2545     95%       0");
        parser.parse("Equipment  Selling   1610     87%       0");
        assert!(parser.is_done());

        let Some(Outcome::PortReport { sector, report }) = parser.finish() else {
            panic!("expected a port report outcome");
        };
        assert_eq!(sector, 1000);
        assert_eq!(report.fuel.status, TradeStatus::Buying);
        assert_eq!(report.fuel.trading, 2810);
        assert_eq!(report.org.percent, 95);
        assert_eq!(report.equ.status, TradeStatus::Selling);
        assert_eq!(report.equ.trading, 1610);
    }

    #[test]
    fn test_report_defaults_to_prompt_sector() {
        let mut parser = Box::new(PortReportParser::new(5));
        parser.parse("What sector is the port in? [250]");
        parser.parse("Fuel Ore   Selling   1200     55%       0");
        parser.parse("Organics   Buying    2545     95%       0");
        parser.parse("Equipment  Buying    1610     87%       0");
        assert!(parser.is_done());

        let Some(Outcome::PortReport { sector, .. }) = parser.finish() else {
            panic!("expected a port report outcome");
        };
        assert_eq!(sector, 250);
    }

    #[test]
    fn test_docked_report_uses_current_sector() {
        let mut parser = Box::new(PortReportParser::new(649));
        parser.parse("Commerce report for Hidden Vale: 12:30:04 PM Sat May 06, 2051");
        parser.parse("Fuel Ore   Buying    2810    100%       0");
        parser.parse("Organics   Buying    2545     95%      20");
        parser.parse("Equipment  Selling   1610     87%       0");
        assert!(parser.is_done());

        let Some(Outcome::PortReport { sector, .. }) = parser.finish() else {
            panic!("expected a port report outcome");
        };
        assert_eq!(sector, 649);
    }

    #[test]
    fn test_no_information_yields_nothing() {
        let mut parser = Box::new(PortReportParser::new(5));
        parser.parse("What sector is the port in? [250] 3");
        parser.parse("I have no information about a port in that sector.");
        assert!(parser.is_done());
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_rob_estimate() {
        let mut parser = Box::new(PortRobParser::new(1000));
        parser.parse("The Trade Journals estimate this port has in excess of 31,400 creds onhand.");
        assert!(parser.is_done());

        let Some(Outcome::PortCreds { sector, creds }) = parser.finish() else {
            panic!("expected a port creds outcome");
        };
        assert_eq!(sector, 1000);
        assert_eq!(creds, 31_400);
    }

    #[test]
    fn test_steal_stock() {
        let mut parser = Box::new(StealStockParser::new());
        parser.parse(" Items     Status  Trading On Dock OnBoard");
        parser.parse(" -----     ------  ------- ------- -------");
        parser.parse("Fuel Ore   Buying     2810     180       0");
        assert!(!parser.is_done());
        parser.parse("Equipment  Buying     1610     155       0");
        assert!(parser.is_done());

        assert_eq!(parser.finish(), Some(Outcome::StealStock(155)));
    }
}
