//! Typed events published by the protocol interpreter.
//!
//! Every recognizable game response maps to exactly one [`EventKind`].
//! Events are matched by `(kind, id)`: the id carries the discriminator a
//! waiter cares about (a sector number, a prompt flavor, a crime outcome),
//! or [`EventId::Any`] to match any event of the kind.

use serde::{Deserialize, Serialize};

use crate::models::Product;

/// One recognizable category of game server output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A sector display, from holo-scans or arrival.
    SectorDisplay,
    /// A computed course between two sectors.
    RouteDisplay,
    /// A planet display after landing.
    PlanetDisplay,
    /// The planet registry shown when landing with multiple planets present.
    PlanetLanding,
    /// Any interactive prompt; the id carries the [`PromptKind`].
    PromptDisplay,
    QuickStats,
    /// A commerce report for a port; the id carries the sector.
    PortReport,
    /// The computer has no commerce data for the requested sector.
    PortNoInfo,
    /// Estimated credits on hand at a port, read while casing it.
    PortRobCredits,
    /// Equipment units on the dock, read while casing a steal.
    PortStealStock,
    RobResult,
    StealResult,
    /// Port guards caught us; payload is the sector it happened in.
    Busted,
    /// A deployed-fighter garrison reported contact.
    FigHit,
    CorpPlanetList,
    DensityScan,
    SectorWarps,
    SectorNotVisited,
    ConfigDisplay,
    /// Genesis torpedo launched; the id carries the new planet's class.
    PlanetCreate,
    PlanetWarpComplete,
    /// Fighters available while docked at a planet's citadel.
    FigDeploy,
    TradeComplete,
    /// The port rejected an offer outright.
    PortNotInterested,
    HoldsToBuy,
    FigsToBuy,
    ShieldsToBuy,
    DetonatorBuyMax,
    GenesisBuyMax,
    /// One row of the corp ship scan; the id carries the ship.
    AvailableShips,
    ShipNotAvailable,
    ScriptTerminated,
    /// Transwarp found no locating beam at the destination.
    BlindJump,
    TwarpLocked,
    TwarpLowFuel,
    MombotTradeDone,
    MombotNothingToSell,
}

/// Interactive prompts the game can stop at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptKind {
    Command,
    Planet,
    Computer,
    Corp,
    Citadel,
    StarDock,
    Shipyard,
    StopInSector,
    MinedSector,
    Buy,
    Sell,
    Mombot,
}

/// How a rob or steal attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrimeOutcome {
    Success,
    Busted,
    /// We backed out before committing.
    Abort,
}

/// The discriminator half of an event key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventId {
    /// Matches any event of the kind.
    Any,
    /// A sector, planet, or ship number.
    Num(u32),
    Prompt(PromptKind),
    Crime(CrimeOutcome),
    /// A planet class letter.
    Class(char),
}

/// Data carried alongside an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    None,
    Num(i64),
    Text(String),
    Nums(Vec<u32>),
    Product(Product),
}

/// A single published signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub id: EventId,
    pub payload: Payload,
}

impl Event {
    pub fn new(kind: EventKind, id: EventId) -> Self {
        Self {
            kind,
            id,
            payload: Payload::None,
        }
    }

    pub fn with_num(kind: EventKind, id: EventId, num: i64) -> Self {
        Self {
            kind,
            id,
            payload: Payload::Num(num),
        }
    }

    /// The numeric payload, if the event carries one.
    pub fn num(&self) -> Option<i64> {
        match self.payload {
            Payload::Num(n) => Some(n),
            _ => None,
        }
    }

    /// The numeric-list payload, empty for other payloads.
    pub fn nums(&self) -> &[u32] {
        match &self.payload {
            Payload::Nums(ns) => ns,
            _ => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn product(&self) -> Option<Product> {
        match self.payload {
            Payload::Product(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accessors() {
        let ev = Event::with_num(EventKind::FigDeploy, EventId::Any, 420);
        assert_eq!(ev.num(), Some(420));
        assert_eq!(ev.text(), None);
        assert!(ev.nums().is_empty());

        let ev = Event {
            kind: EventKind::PlanetLanding,
            id: EventId::Any,
            payload: Payload::Nums(vec![3, 17]),
        };
        assert_eq!(ev.nums(), &[3, 17]);
        assert_eq!(ev.num(), None);

        let ev = Event {
            kind: EventKind::PromptDisplay,
            id: EventId::Prompt(PromptKind::Buy),
            payload: Payload::Product(Product::Org),
        };
        assert_eq!(ev.product(), Some(Product::Org));
        assert_eq!(ev.num(), None);
    }

    #[test]
    fn test_event_ids_are_distinct_keys() {
        use std::collections::HashSet;
        let mut keys = HashSet::new();
        assert!(keys.insert((EventKind::RobResult, EventId::Crime(CrimeOutcome::Success))));
        assert!(keys.insert((EventKind::RobResult, EventId::Crime(CrimeOutcome::Busted))));
        assert!(keys.insert((EventKind::RobResult, EventId::Any)));
        assert!(!keys.insert((EventKind::RobResult, EventId::Any)));
    }
}
