//! Navigation intelligence: computed courses, density scans, and the two
//! warp listings that feed the persistent warp chart.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{DensityRow, LineParser, Outcome};

/// Scrapes the course the computer plots between two sectors.
#[derive(Default)]
pub struct RouteParser {
    lines: Vec<String>,
    done: bool,
}

impl RouteParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for RouteParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        let line = line.trim();
        self.lines.push(line.to_string());
        if self.lines.len() >= 2 && line.is_empty() {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        if self.lines.len() < 2 {
            return None;
        }
        let body = &self.lines[1..self.lines.len() - 1];
        Some(Outcome::Route(body.join(" ")))
    }
}

fn density_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Sector +([0-9]+) +==> +([0-9]+)  Warps : ([0-9]+)").expect("static pattern")
    })
}

/// Scrapes a relative density scan. Rows only update sectors that are
/// already known; a density reading alone is not enough to chart a sector.
#[derive(Default)]
pub struct DensityScanParser {
    lines: Vec<String>,
    done: bool,
}

impl DensityScanParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for DensityScanParser {
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
        let mut rows = Vec::new();
        for line in &self.lines[2..] {
            let Some(caps) = density_info().captures(line) else {
                continue;
            };
            let (Ok(sector), Ok(density), Ok(warp_count)) =
                (caps[1].parse(), caps[2].parse(), caps[3].parse())
            else {
                warn!(line, "unreadable density scan row");
                return None;
            };
            rows.push(DensityRow {
                sector,
                density,
                warp_count,
            });
        }
        Some(Outcome::Density(rows))
    }
}

fn warp_query() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Sector ([0-9]+) has warps to sector\(s\) :  ([0-9 -]+)").expect("static pattern")
    })
}

/// Scrapes the single-line answer to a computer warp query.
#[derive(Default)]
pub struct SectorWarpsParser {
    result: Option<(u32, Vec<u32>)>,
    done: bool,
}

impl SectorWarpsParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for SectorWarpsParser {
    fn parse(&mut self, line: &str) {
        if self.done || !line.contains("has warps to sector(s) :") {
            return;
        }
        self.done = true;

        let Some(caps) = warp_query().captures(line) else {
            warn!(line, "failed to parse sector warp query results");
            return;
        };
        let Ok(from) = caps[1].parse() else {
            return;
        };
        let mut to = Vec::new();
        for part in caps[2].split(" - ") {
            let Ok(warp) = part.trim().parse() else {
                warn!(part, "unreadable warp in query results");
                return;
            };
            to.push(warp);
        }
        self.result = Some((from, to));
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        self.result
            .map(|(sector, warps)| Outcome::SectorWarps { sector, warps })
    }
}

/// Scrapes the warp dump the computer interrogation mode prints, one sector
/// and its outbound warps per line, until the closing marker.
#[derive(Default)]
pub struct CimWarpsParser {
    entries: Vec<(u32, Vec<u32>)>,
    done: bool,
}

impl CimWarpsParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for CimWarpsParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        if line.contains("ENDINTERROG") {
            self.done = true;
            return;
        }
        if line.starts_with(':') || line.starts_with("Command") || line.trim().is_empty() {
            return;
        }

        let mut parts = line.split_whitespace();
        let Some(Ok(from)) = parts.next().map(str::parse) else {
            warn!(line, "unreadable warp dump line");
            return;
        };
        let mut to = Vec::new();
        for part in parts {
            let Ok(warp) = part.parse() else {
                warn!(part, "unreadable warp in dump line");
                return;
            };
            to.push(warp);
        }
        self.entries.push((from, to));
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        Some(Outcome::CimWarps(self.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_joins_body_lines() {
        let mut parser = Box::new(RouteParser::new());
        parser.parse("The shortest path (9 hops, 18 turns) from sector 1 to sector 1000 is:");
        parser.parse("1 > 2 > 7 > 88 >");
        parser.parse("516 > 1000");
        parser.parse("");
        assert!(parser.is_done());

        assert_eq!(
            parser.finish(),
            Some(Outcome::Route("1 > 2 > 7 > 88 > 516 > 1000".into()))
        );
    }

    #[test]
    fn test_density_rows() {
        let mut parser = Box::new(DensityScanParser::new());
        parser.parse("                          Relative Density Scan");
        parser.parse("-------------------------------------------------------------------------");
        parser.parse("Sector  412  ==>              0  Warps : 4    NavHaz :     0%    Anom : No");
        parser.parse("Sector  519  ==>            100  Warps : 2    NavHaz :     0%    Anom : No");
        parser.parse("");
        assert!(parser.is_done());

        let Some(Outcome::Density(rows)) = parser.finish() else {
            panic!("expected a density outcome");
        };
        assert_eq!(
            rows,
            vec![
                DensityRow { sector: 412, density: 0, warp_count: 4 },
                DensityRow { sector: 519, density: 100, warp_count: 2 },
            ]
        );
    }

    #[test]
    fn test_warp_query_answer() {
        let mut parser = Box::new(SectorWarpsParser::new());
        parser.parse("Sector 649 has warps to sector(s) :  512 - 1000 - 7044");
        assert!(parser.is_done());

        assert_eq!(
            parser.finish(),
            Some(Outcome::SectorWarps {
                sector: 649,
                warps: vec![512, 1000, 7044],
            })
        );
    }

    #[test]
    fn test_warp_dump() {
        let mut parser = Box::new(CimWarpsParser::new());
        parser.parse(": ");
        parser.parse("Command [TL=00:00:00]:[1] (?=Help)? ^");
        parser.parse("     1     2     3     4     5     6     7");
        parser.parse("     2     1     3     7  8192");
        parser.parse("");
        parser.parse(": ENDINTERROG");
        assert!(parser.is_done());

        let Some(Outcome::CimWarps(entries)) = parser.finish() else {
            panic!("expected a warp dump outcome");
        };
        assert_eq!(
            entries,
            vec![
                (1, vec![2, 3, 4, 5, 6, 7]),
                (2, vec![1, 3, 7, 8192]),
            ]
        );
    }
}
