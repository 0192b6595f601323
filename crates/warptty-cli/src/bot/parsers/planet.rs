//! Planetary displays: the landing display, the corp planet scan, the
//! landing registry, and the genesis launch result.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;
use warptty_core::event::PromptKind;
use warptty_core::models::{Planet, PlanetSummary};
use warptty_core::text::{parse_num, parse_summary};

use super::{CorpPlanetRow, LineParser, Outcome};

fn planet_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Planet #([0-9]+) in sector ([0-9]+): (.+)").expect("static pattern"))
}

fn class_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Class ([A-Z])").expect("static pattern"))
}

fn fuel_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Fuel Ore +?([0-9,]+) +?[0-9,]+ +?[0-9,]+ +?([0-9,]+) +?[0-9]+ +?([0-9,]+)")
            .expect("static pattern")
    })
}

fn org_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Organics +?([0-9,]+) +?[0-9,N/A]+ +?[0-9,]+ +?([0-9,]+) +?[0-9]+ +?([0-9,]+)")
            .expect("static pattern")
    })
}

fn equ_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Equipment +?([0-9,]+) +?[0-9,]+ +?[0-9,]+ +?([0-9,]+) +?[0-9]+ +?([0-9,]+)")
            .expect("static pattern")
    })
}

fn citadel_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Planet has a level ([0-6]) Citadel").expect("static pattern"))
}

fn figs_info() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Fighters +?N/A +?[0-9,]+ +?[0-9,]+ +?([0-9,]+) ").expect("static pattern")
    })
}

/// Scrapes the display shown after landing on a planet. The display has no
/// terminator line; it ends when the planet command prompt appears.
#[derive(Default)]
pub struct PlanetParser {
    lines: Vec<String>,
    done: bool,
}

impl PlanetParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn finalize(&self) -> Option<Planet> {
        let mut planet = Planet::default();
        for line in &self.lines {
            if line.starts_with("Planet #") {
                let Some(caps) = planet_info().captures(line) else {
                    continue;
                };
                planet = Planet {
                    id: caps[1].parse().ok()?,
                    sector: caps[2].parse().ok()?,
                    name: caps[3].trim().to_string(),
                    ..Default::default()
                };
            } else if line.starts_with("Class ") {
                let Some(caps) = class_info().captures(line) else {
                    continue;
                };
                planet.class = caps[1].chars().next();
            } else if line.starts_with("Fuel Ore") {
                let Some(caps) = fuel_info().captures(line) else {
                    continue;
                };
                planet.ore_cols = parse_num(&caps[1])?;
                planet.ore = parse_num(&caps[2])?;
                planet.ore_max = parse_num(&caps[3])?;
            } else if line.starts_with("Organics") {
                let Some(caps) = org_info().captures(line) else {
                    continue;
                };
                planet.org_cols = parse_num(&caps[1])?;
                planet.org = parse_num(&caps[2])?;
                planet.org_max = parse_num(&caps[3])?;
            } else if line.starts_with("Equipment") {
                let Some(caps) = equ_info().captures(line) else {
                    continue;
                };
                planet.equ_cols = parse_num(&caps[1])?;
                planet.equ = parse_num(&caps[2])?;
                planet.equ_max = parse_num(&caps[3])?;
            } else if line.starts_with("Planet has a level ") {
                let Some(caps) = citadel_info().captures(line) else {
                    continue;
                };
                planet.citadel_level = parse_num(&caps[1])?;
            } else if line.starts_with("Fighters ") {
                let Some(caps) = figs_info().captures(line) else {
                    continue;
                };
                planet.figs = parse_num(&caps[1])?;
            }
        }

        if planet.id == 0 {
            warn!("planet display ended without a readable header");
            return None;
        }
        Some(planet)
    }
}

impl LineParser for PlanetParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        self.lines.push(line.to_string());
    }

    fn notify_prompt(&mut self, kind: PromptKind) {
        if kind == PromptKind::Planet {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        self.finalize().map(Outcome::Planet)
    }
}

fn corp_row_head() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)[ T]+#(\d+).*?Class ([A-Z]), ").expect("static pattern"))
}

fn corp_row_totals() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\([0-9M-]+\) +[0-9T]+ +[0-9T]+ +[0-9T]+ +([0-9MT]+) +([0-9MT]+) +([0-9MT]+) +([0-9MT]+)",
        )
        .expect("static pattern")
    })
}

/// Scrapes the corp planet scan. Each planet spans a pair of lines: a header
/// with the sector, id, and class, then a totals row in scan shorthand.
#[derive(Default)]
pub struct CorpPlanetsParser {
    lines: Vec<String>,
    done: bool,
}

impl CorpPlanetsParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn finalize(&self) -> Option<Vec<CorpPlanetRow>> {
        if self.lines.len() < 6 {
            return Some(Vec::new());
        }
        let body = &self.lines[5..self.lines.len() - 1];

        let mut rows = Vec::new();
        let mut i = 0;
        while i + 1 < body.len() {
            let Some(head) = corp_row_head().captures(&body[i]) else {
                warn!(line = %body[i], "unreadable corp planet entry");
                return None;
            };
            let Some(totals) = corp_row_totals().captures(&body[i + 1]) else {
                warn!(line = %body[i + 1], "unreadable corp planet totals");
                return None;
            };

            let summary = PlanetSummary {
                ore: parse_summary(&totals[1])?,
                org: parse_summary(&totals[2])?,
                equ: parse_summary(&totals[3])?,
                figs: parse_summary(&totals[4])?,
            };
            rows.push(CorpPlanetRow {
                id: head[2].parse().ok()?,
                sector: head[1].parse().ok()?,
                class: head[3].chars().next(),
                summary,
            });
            i += 2;
        }
        Some(rows)
    }
}

impl LineParser for CorpPlanetsParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        self.lines.push(line.to_string());
        if self.lines.len() >= 5 && line.starts_with("======  ") {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        self.finalize().map(Outcome::CorpPlanets)
    }
}

fn landing_entry() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" +< +([0-9]+)>").expect("static pattern"))
}

/// Scrapes the registry shown when landing in a sector with several planets.
#[derive(Default)]
pub struct PlanetLandingParser {
    lines: Vec<String>,
    done: bool,
}

impl PlanetLandingParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for PlanetLandingParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        self.lines.push(line.to_string());
        if line.trim().is_empty() {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        let mut planets = Vec::new();
        for line in &self.lines {
            let Some(caps) = landing_entry().captures(line) else {
                continue;
            };
            let Ok(pid) = caps[1].parse() else {
                warn!(line, "unreadable planet id in landing registry");
                return None;
            };
            planets.push(pid);
        }
        Some(Outcome::PlanetLanding(planets))
    }
}

fn created_class() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Class (.)").expect("static pattern"))
}

/// Scrapes the class of a planet just created by a genesis torpedo, taken
/// from the naming prompt that follows the launch.
#[derive(Default)]
pub struct PlanetCreateParser {
    last: Option<String>,
    done: bool,
}

impl PlanetCreateParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for PlanetCreateParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        self.last = Some(line.to_string());
        if line.starts_with("What do you want to name this planet?") {
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        let last = self.last?;
        let Some(caps) = created_class().captures(&last) else {
            warn!("failed to match created planet class");
            return None;
        };
        caps[1].chars().next().map(Outcome::PlanetClass)
    }
}
