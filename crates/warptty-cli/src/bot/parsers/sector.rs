//! The sector display, shown on arrival and by holographic scans.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;
use warptty_core::models::{FigStance, Port, Sector};
use warptty_core::text::parse_num;

use super::{LineParser, Outcome};

fn sector_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Sector  : (\d+)").expect("static pattern"))
}

fn port_type() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Ports   : [a-zA-Z '-]+, Class \d \(([SB]{3})\)").expect("static pattern")
    })
}

fn fig_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Fighters: ([0-9,]+) \((.+?)\) \[([A-Za-z]+)\]").expect("static pattern")
    })
}

fn mines_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Mines   : ([0-9]+) \(Type 1 Armid\) \(([A-Za-z ]+)\)").expect("static pattern")
    })
}

fn warps_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Warps to Sector\(s\) :  ([0-9 ()-]+)").expect("static pattern"))
}

fn is_ours(owner: &str) -> bool {
    matches!(owner, "yours" | "belong to your Corp")
}

/// Scrapes a sector display. A holo scan omits the warp line, so the display
/// can also end on a blank line; the world store fills missing warps from
/// what it already knows.
#[derive(Default)]
pub struct SectorParser {
    lines: Vec<String>,
    done: bool,
}

impl SectorParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn finalize(&self) -> Option<Sector> {
        if self.lines.len() < 2 {
            return None;
        }
        let caps = sector_info().captures(&self.lines[0])?;
        let id = caps[1].parse().ok()?;

        let mut sector = Sector {
            id,
            fedspace: self.lines[0].contains("The Federation"),
            ..Default::default()
        };

        for line in &self.lines {
            if let Some(caps) = port_type().captures(line) {
                sector.port = Some(Port {
                    class: caps[1].to_string(),
                    ..Default::default()
                });
                continue;
            }

            if let Some(caps) = fig_info().captures(line) {
                let Some(count) = parse_num(&caps[1]) else {
                    warn!(line, "unreadable fighter count in sector display");
                    return None;
                };
                sector.figs = count;
                sector.figs_friendly = is_ours(&caps[2]);
                sector.fig_stance = FigStance::parse(&caps[3]);
            }

            if let Some(caps) = mines_info().captures(line) {
                let Some(count) = parse_num(&caps[1]) else {
                    warn!(line, "unreadable mine count in sector display");
                    return None;
                };
                sector.mines = count;
                sector.mines_friendly = is_ours(&caps[2]);
            }

            if let Some(caps) = warps_info().captures(line) {
                for part in caps[1].split(" - ") {
                    let trimmed =
                        part.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
                    let Ok(warp) = trimmed.parse() else {
                        warn!(part, "unreadable warp in sector display");
                        return None;
                    };
                    sector.warps.push(warp);
                }
                sector.warp_count = sector.warps.len() as i64;
            }
        }

        Some(sector)
    }
}

impl LineParser for SectorParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        self.lines.push(line.to_string());
        if line.starts_with("Warps to Sector(s) :") || line.trim().is_empty() {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        self.finalize().map(Outcome::Sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> Option<Outcome> {
        let mut parser = Box::new(SectorParser::new());
        for line in lines {
            parser.parse(line);
        }
        assert!(parser.is_done());
        parser.finish()
    }

    #[test]
    fn test_full_sector_display() {
        let outcome = run(&[
            "Sector  : 100 in uncharted space.",
            "Ports   : Stargate Alpha, Class 1 (BBS)",
            "Warps to Sector(s) :  (101) - (102)",
        ]);
        let Some(Outcome::Sector(sector)) = outcome else {
            panic!("expected a sector outcome");
        };
        assert_eq!(sector.id, 100);
        assert_eq!(sector.port.as_ref().map(|p| p.class.as_str()), Some("BBS"));
        assert_eq!(sector.warps, vec![101, 102]);
        assert_eq!(sector.warp_count, 2);
        assert!(!sector.fedspace);
    }

    #[test]
    fn test_unexplored_warps_have_no_parens() {
        let outcome = run(&[
            "Sector  : 842 in uncharted space.",
            "Warps to Sector(s) :  (101) - 649 - (7044)",
        ]);
        let Some(Outcome::Sector(sector)) = outcome else {
            panic!("expected a sector outcome");
        };
        assert_eq!(sector.warps, vec![101, 649, 7044]);
    }

    #[test]
    fn test_garrison_and_mines() {
        let outcome = run(&[
            "Sector  : 2328 in uncharted space.",
            "Fighters: 1,250 (belong to your Corp) [Defensive]",
            "Mines   : 10 (Type 1 Armid) (Ripper Jack)",
            "Warps to Sector(s) :  (2327)",
        ]);
        let Some(Outcome::Sector(sector)) = outcome else {
            panic!("expected a sector outcome");
        };
        assert_eq!(sector.figs, 1250);
        assert!(sector.figs_friendly);
        assert_eq!(sector.fig_stance, Some(FigStance::Defensive));
        assert_eq!(sector.mines, 10);
        assert!(!sector.mines_friendly);
        assert!(!sector.is_safe());
    }

    #[test]
    fn test_hostile_figs_are_unsafe() {
        let outcome = run(&[
            "Sector  : 515 in uncharted space.",
            "Fighters: 300 (Ripper Jack) [Offensive]",
            "Warps to Sector(s) :  (514) - (516)",
        ]);
        let Some(Outcome::Sector(sector)) = outcome else {
            panic!("expected a sector outcome");
        };
        assert!(!sector.figs_friendly);
        assert_eq!(sector.fig_stance, Some(FigStance::Offensive));
        assert!(!sector.is_safe());
    }

    #[test]
    fn test_fedspace() {
        let outcome = run(&[
            "Sector  : 3 in The Federation.",
            "Warps to Sector(s) :  (1) - (2) - (4)",
        ]);
        let Some(Outcome::Sector(sector)) = outcome else {
            panic!("expected a sector outcome");
        };
        assert!(sector.fedspace);
    }

    #[test]
    fn test_holo_scan_ends_on_blank_without_warps() {
        let outcome = run(&["Sector  : 77 in uncharted space.", ""]);
        let Some(Outcome::Sector(sector)) = outcome else {
            panic!("expected a sector outcome");
        };
        assert_eq!(sector.id, 77);
        assert!(sector.warps.is_empty());
    }

    #[test]
    fn test_unreadable_header_yields_nothing() {
        let outcome = run(&["Relay chatter", ""]);
        assert!(outcome.is_none());
    }
}
