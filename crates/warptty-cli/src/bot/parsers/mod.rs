//! Screen scrapers for multi-line game output.
//!
//! The dispatcher activates a parser when it recognizes a trigger line and
//! then feeds it every following cleaned line until the parser reports it is
//! done. A finished parser yields an [`Outcome`] describing what it read off
//! the screen; the dispatcher applies the outcome to the world and announces
//! it on the event broker.

mod chart;
mod config;
mod crime;
mod outfit;
mod planet;
mod port;
mod quickstats;
mod sector;

pub use chart::{CimWarpsParser, DensityScanParser, RouteParser, SectorWarpsParser};
pub use config::ConfigParser;
pub use crime::CrimeParser;
pub use outfit::{BuyMaxParser, FigDeployParser, ShipScanParser};
pub use planet::{CorpPlanetsParser, PlanetCreateParser, PlanetLandingParser, PlanetParser};
pub use port::{PortReportParser, PortRobParser, StealStockParser};
pub use quickstats::QuickStatsParser;
pub use sector::SectorParser;

use warptty_core::event::{CrimeOutcome, EventKind, PromptKind};
use warptty_core::models::{LrsMode, Planet, PlanetSummary, PortReport, Sector, Ship, TwarpClass};

/// The slot an active parser occupies in the dispatcher.
///
/// Activating a parser for an occupied slot replaces the previous one
/// without finishing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Sector,
    QuickStats,
    PortReport,
    PortRob,
    StealStock,
    Route,
    DensityScan,
    CimWarps,
    SectorWarps,
    Planet,
    CorpPlanets,
    PlanetLanding,
    PlanetCreate,
    RobResult,
    StealResult,
    Ships,
    FigDeploy,
    BuyDetonators,
    BuyGenesis,
    Config,
}

/// One active screen scraper.
///
/// `parse` receives every cleaned line from the trigger line onward. Parsers
/// that end on a prompt rather than a line override `notify_prompt`.
pub trait LineParser: Send {
    fn parse(&mut self, line: &str);
    fn notify_prompt(&mut self, _kind: PromptKind) {}
    fn is_done(&self) -> bool;
    /// Consume the parser, yielding what it read. `None` means the screen
    /// was unreadable and nothing should be applied or announced.
    fn finish(self: Box<Self>) -> Option<Outcome>;
}

/// What a finished parser read off the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A full or holo sector display.
    Sector(Sector),
    /// Player stats to fold into the stored status.
    QuickStats(StatusPatch),
    PortReport {
        sector: u32,
        report: PortReport,
    },
    /// The text of a computed course, e.g. `(18) > (125) > (442)`.
    Route(String),
    Density(Vec<DensityRow>),
    Planet(Planet),
    CorpPlanets(Vec<CorpPlanetRow>),
    /// Estimated credits on hand at the port in `sector`.
    PortCreds {
        sector: u32,
        creds: i64,
    },
    /// A rob or steal attempt ended.
    Crime {
        kind: EventKind,
        outcome: CrimeOutcome,
        sector: Option<u32>,
    },
    /// Equipment units on the dock at the port being cased.
    StealStock(i64),
    CimWarps(Vec<(u32, Vec<u32>)>),
    SectorWarps {
        sector: u32,
        warps: Vec<u32>,
    },
    Stardock(u32),
    /// Planet ids listed in a landing registry.
    PlanetLanding(Vec<u32>),
    /// Fighters available to deploy from a citadel.
    FigDeploy(i64),
    /// Class letter of a planet created by genesis torpedo.
    PlanetClass(char),
    Ships(Vec<Ship>),
    /// A hardware purchase prompt quoting the most we can take.
    BuyMax {
        kind: EventKind,
        max: i64,
    },
}

/// Fields read from a quick stats display. `None` leaves the stored value
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusPatch {
    pub sector: Option<u32>,
    pub creds: Option<i64>,
    pub figs: Option<i64>,
    pub shields: Option<i64>,
    pub holds: Option<i64>,
    pub equ: Option<i64>,
    pub exp: Option<i64>,
    pub gtorps: Option<i64>,
    pub atmdts: Option<i64>,
    pub lrs: Option<LrsMode>,
    pub twarp: Option<TwarpClass>,
    pub ship: Option<u32>,
}

/// One row of a relative density scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityRow {
    pub sector: u32,
    pub density: i64,
    pub warp_count: i64,
}

/// One entry of the corp planet scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorpPlanetRow {
    pub id: u32,
    pub sector: u32,
    pub class: Option<char>,
    pub summary: PlanetSummary,
}
