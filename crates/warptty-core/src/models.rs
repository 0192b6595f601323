//! World-model value types.
//!
//! These are plain data: the world store in the CLI crate owns the maps and
//! the merge rules. Everything serializes so the operator inspect commands
//! can dump state as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tradeable commodity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Product {
    Fuel,
    Org,
    Equ,
}

impl Product {
    /// The single-letter code used in commands and mombot negotiations.
    pub fn code(&self) -> char {
        match self {
            Product::Fuel => 'f',
            Product::Org => 'o',
            Product::Equ => 'e',
        }
    }

    pub fn from_code(c: char) -> Option<Self> {
        match c {
            'f' => Some(Product::Fuel),
            'o' => Some(Product::Org),
            'e' => Some(Product::Equ),
            _ => None,
        }
    }

    /// Parse the long name the game prints in buy/sell prompts.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "Fuel Ore" => Some(Product::Fuel),
            "Organics" => Some(Product::Org),
            "Equipment" => Some(Product::Equ),
            _ => None,
        }
    }
}

/// Whether a port buys or sells a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Buying,
    Selling,
}

impl TradeStatus {
    /// Port class codes place one letter per product, `B` or `S`.
    pub fn from_class_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(TradeStatus::Buying),
            'S' => Some(TradeStatus::Selling),
            _ => None,
        }
    }
}

/// Stance of a deployed fighter garrison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FigStance {
    Toll,
    Offensive,
    Defensive,
}

impl FigStance {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Toll" => Some(FigStance::Toll),
            "Offensive" => Some(FigStance::Offensive),
            "Defensive" => Some(FigStance::Defensive),
            _ => None,
        }
    }
}

/// Long-range scanner fitted to the ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LrsMode {
    #[default]
    None,
    Holo,
}

/// Transwarp drive class fitted to the ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TwarpClass {
    #[default]
    None,
    One,
    Two,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: u32,
    pub figs: i64,
    pub figs_friendly: bool,
    pub fig_stance: Option<FigStance>,
    pub mines: i64,
    pub mines_friendly: bool,
    pub port: Option<Port>,
    pub warps: Vec<u32>,
    pub warp_count: i64,
    pub density: i64,
    pub fedspace: bool,
}

impl Sector {
    /// A sector is safe when nothing hostile is parked in it.
    pub fn is_safe(&self) -> bool {
        if self.figs > 0 && !self.figs_friendly {
            return false;
        }
        if self.mines > 0 && !self.mines_friendly {
            return false;
        }
        true
    }

    pub fn is_adjacent(&self, other: u32) -> bool {
        self.warps.contains(&other)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Three-letter class code, one `B` or `S` per product, e.g. "BBS".
    pub class: String,
    pub creds: i64,
    pub report: Option<PortReport>,
}

impl Port {
    pub fn status(&self, product: Product) -> Option<TradeStatus> {
        let idx = match product {
            Product::Fuel => 0,
            Product::Org => 1,
            Product::Equ => 2,
        };
        self.class
            .chars()
            .nth(idx)
            .and_then(TradeStatus::from_class_char)
    }
}

/// A commerce report, timestamped so callers can judge freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortReport {
    pub time: DateTime<Utc>,
    pub fuel: PortItem,
    pub org: PortItem,
    pub equ: PortItem,
}

impl PortReport {
    pub fn item(&self, product: Product) -> &PortItem {
        match product {
            Product::Fuel => &self.fuel,
            Product::Org => &self.org,
            Product::Equ => &self.equ,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortItem {
    pub status: TradeStatus,
    pub trading: i64,
    pub percent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id: u32,
    pub name: String,
    pub sector: u32,
    /// Class letter, e.g. M, O, H, L.
    pub class: Option<char>,
    pub citadel_level: i64,
    pub ore: i64,
    pub ore_max: i64,
    pub org: i64,
    pub org_max: i64,
    pub equ: i64,
    pub equ_max: i64,
    pub ore_cols: i64,
    pub org_cols: i64,
    pub equ_cols: i64,
    pub figs: i64,
    /// Totals from the corp planet scan, coarser than a landing display.
    pub summary: Option<PlanetSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanetSummary {
    pub ore: i64,
    pub org: i64,
    pub equ: i64,
    pub figs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub sector: u32,
    pub creds: i64,
    pub figs: i64,
    pub shields: i64,
    pub holds: i64,
    pub exp: i64,
    pub gtorps: i64,
    pub atmdts: i64,
    pub lrs: LrsMode,
    pub twarp: TwarpClass,
    pub stardock: u32,
    pub ship: u32,
    /// Equipment currently in the holds, tracked by the steal loop.
    pub equ: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub id: u32,
    pub sector: u32,
}

/// One transwarp-capable staging stop on the way to the stardock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwarpHop {
    pub sector: u32,
    pub planet: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub hops_to_stardock: Vec<TwarpHop>,
}
