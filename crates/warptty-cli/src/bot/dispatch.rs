//! Recognizes game output and turns it into world updates and events.
//!
//! One line can do three things: trigger an inline event, activate a parser
//! for the display that follows, and feed every parser already active. The
//! trigger table runs first, so a freshly activated parser sees its own
//! trigger line.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{trace, warn};

use warptty_core::event::{CrimeOutcome, Event, EventId, EventKind, Payload, PromptKind};
use warptty_core::prompt::PromptHit;
use warptty_core::scan::ScanItem;
use warptty_core::text::parse_num;

use crate::bot::broker::Broker;
use crate::bot::parsers::{self, Category, LineParser, Outcome};
use crate::world::persist::Stores;
use crate::world::World;

fn warping() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Warping to Sector (\d+)").expect("static pattern"))
}

fn trade_complete() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"You have [0-9,]+ credits and ([0-9]+) empty cargo holds\.")
            .expect("static pattern")
    })
}

fn holds_to_buy() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^A  Cargo holds +: +[0-9]+ credits / next hold +([0-9]+)")
            .expect("static pattern")
    })
}

fn figs_to_buy() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^B  Fighters +: +[0-9]+ credits per fighter +([0-9]+)")
            .expect("static pattern")
    })
}

fn shields_to_buy() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^C  Shield Points +: +[0-9]+ credits per point +([0-9]+)")
            .expect("static pattern")
    })
}

/// Lines a port uses to turn down an offer.
const PORT_INSULTS: [&str; 8] = [
    "We're not interested.",
    "When you want to make me a real offer, drop back by.",
    "Swine, go peddle your wares somewhere else, you make me sick.",
    "I see you are as stupid as you look, get lost...",
    "HA!  You think me a fool?  Thats insane!  Get out of here!",
    "Get lost creep, that junk isn't worth half that much!",
    "I think you'd better leave if you value your life!",
    "How have you survived this long?  Get lost, I'm not interested.",
];

pub struct Dispatcher {
    world: World,
    stores: Stores,
    broker: Broker,
    parsers: HashMap<Category, Box<dyn LineParser>>,
}

impl Dispatcher {
    pub fn new(world: World, stores: Stores, broker: Broker) -> Self {
        Self {
            world,
            stores,
            broker,
            parsers: HashMap::new(),
        }
    }

    /// Activate a parser directly, outside the trigger table. Used by
    /// commands whose displays have no distinctive first line, like the
    /// CIM warp dump.
    pub fn install(&mut self, category: Category, parser: Box<dyn LineParser>) {
        self.parsers.insert(category, parser);
    }

    pub async fn handle(&mut self, item: ScanItem) {
        match item {
            ScanItem::Line(line) => self.on_line(&line).await,
            ScanItem::FigHit(sector) => {
                self.broker.publish(&Event::with_num(
                    EventKind::FigHit,
                    EventId::Any,
                    i64::from(sector),
                ));
            }
            ScanItem::SubBotPrompt => {
                self.broker.publish(&Event::new(
                    EventKind::PromptDisplay,
                    EventId::Prompt(PromptKind::Mombot),
                ));
            }
            ScanItem::Prompt(hit) => self.on_prompt(hit).await,
            ScanItem::Overflow => trace!("dropped an unterminated line"),
        }
    }

    async fn on_line(&mut self, line: &str) {
        self.trigger(line).await;

        // Feed every active parser, the just-activated one included, then
        // retire the ones that are finished.
        for parser in self.parsers.values_mut() {
            parser.parse(line);
        }
        self.reap().await;
    }

    async fn on_prompt(&mut self, hit: PromptHit) {
        let payload = match hit.kind {
            PromptKind::Command => match hit.sector {
                Some(sector) => {
                    self.world.set_sector(sector).await;
                    Payload::Num(i64::from(sector))
                }
                None => Payload::None,
            },
            PromptKind::Buy | PromptKind::Sell => match hit.product {
                Some(product) => Payload::Product(product),
                None => Payload::None,
            },
            _ => Payload::None,
        };
        self.broker.publish(&Event {
            kind: EventKind::PromptDisplay,
            id: EventId::Prompt(hit.kind),
            payload,
        });

        // Some displays end at a prompt rather than a recognizable line.
        for parser in self.parsers.values_mut() {
            parser.notify_prompt(hit.kind);
        }
        self.reap().await;
    }

    /// The trigger table. Order matters: the first match wins.
    async fn trigger(&mut self, line: &str) {
        if line.starts_with("Warping to Sector") {
            if let Some(cap) = warping().captures(line) {
                if let Ok(sector) = cap[1].parse() {
                    self.world.set_sector(sector).await;
                }
            }
        } else if line.starts_with("Sector  : ") {
            self.parsers
                .insert(Category::Sector, Box::new(parsers::SectorParser::new()));
        } else if line.starts_with("The shortest path (") {
            self.parsers
                .insert(Category::Route, Box::new(parsers::RouteParser::new()));
        } else if line.starts_with("Planet #") {
            self.parsers
                .insert(Category::Planet, Box::new(parsers::PlanetParser::new()));
        } else if line.starts_with("The Trade Journals estimate this port has") {
            let sector = self.world.status().await.sector;
            self.parsers.insert(
                Category::PortRob,
                Box::new(parsers::PortRobParser::new(sector)),
            );
        } else if line.starts_with(" Sect ") {
            self.parsers.insert(
                Category::QuickStats,
                Box::new(parsers::QuickStatsParser::new()),
            );
        } else if line.starts_with("What sector is the port in?") {
            let sector = self.world.status().await.sector;
            self.parsers.insert(
                Category::PortReport,
                Box::new(parsers::PortReportParser::new(sector)),
            );
        } else if line.starts_with("Commerce report") {
            // A report requested by sector number opens with the question
            // line instead; keep that parser if one is already running.
            if !self.parsers.contains_key(&Category::PortReport) {
                let sector = self.world.status().await.sector;
                self.parsers.insert(
                    Category::PortReport,
                    Box::new(parsers::PortReportParser::new(sector)),
                );
            }
        } else if line.contains("Corporate Planet Scan") {
            self.parsers.insert(
                Category::CorpPlanets,
                Box::new(parsers::CorpPlanetsParser::new()),
            );
        } else if line.contains("[General] {cbot} - Done with port") {
            self.broker
                .publish(&Event::new(EventKind::MombotTradeDone, EventId::Any));
        } else if line.contains("[General] {cbot} - Nothing to sell") {
            self.broker
                .publish(&Event::new(EventKind::MombotNothingToSell, EventId::Any));
        } else if line.contains("Relative Density Scan") {
            self.parsers.insert(
                Category::DensityScan,
                Box::new(parsers::DensityScanParser::new()),
            );
        } else if line.starts_with("What do you want to name this planet?") {
            self.parsers.insert(
                Category::PlanetCreate,
                Box::new(parsers::PlanetCreateParser::new()),
            );
        } else if line.starts_with("Registry# and Planet Name") {
            self.parsers.insert(
                Category::PlanetLanding,
                Box::new(parsers::PlanetLandingParser::new()),
            );
        } else if line.starts_with("<Drop/Take Fighters>") {
            self.parsers.insert(
                Category::FigDeploy,
                Box::new(parsers::FigDeployParser::new()),
            );
        } else if line.starts_with("You connect to their control computer to siphon the funds out") {
            let sector = self.world.status().await.sector;
            self.parsers.insert(
                Category::RobResult,
                Box::new(parsers::CrimeParser::rob(sector)),
            );
        } else if line.starts_with("You start your droids loading the cargo") {
            let sector = self.world.status().await.sector;
            self.parsers.insert(
                Category::StealResult,
                Box::new(parsers::CrimeParser::steal(sector)),
            );
        } else if line.starts_with("Script terminated:") {
            self.broker
                .publish(&Event::new(EventKind::ScriptTerminated, EventId::Any));
        } else if line.starts_with("*** WARNING *** No locating beam found for sector") {
            self.broker
                .publish(&Event::new(EventKind::BlindJump, EventId::Any));
        } else if line.starts_with("Locating beam pinpointed, TransWarp Locked.") {
            self.broker
                .publish(&Event::new(EventKind::TwarpLocked, EventId::Any));
        } else if line.starts_with("You do not have enough Fuel Ore to make the jump.") {
            self.broker
                .publish(&Event::new(EventKind::TwarpLowFuel, EventId::Any));
        } else if line.starts_with("How many Atomic Detonators do you want") {
            self.parsers.insert(
                Category::BuyDetonators,
                Box::new(parsers::BuyMaxParser::detonators()),
            );
        } else if line.starts_with("How many Genesis Torpedoes do you want") {
            self.parsers.insert(
                Category::BuyGenesis,
                Box::new(parsers::BuyMaxParser::genesis()),
            );
        } else if line.contains("Planet is now in sector") {
            self.broker
                .publish(&Event::new(EventKind::PlanetWarpComplete, EventId::Any));
        } else if line.starts_with("The port Guards surround you") {
            let sector = self.world.status().await.sector;
            self.broker.publish(&Event::with_num(
                EventKind::Busted,
                EventId::Any,
                i64::from(sector),
            ));
        } else if line.contains("has warps to sector(s) :") {
            self.parsers.insert(
                Category::SectorWarps,
                Box::new(parsers::SectorWarpsParser::new()),
            );
        } else if line.contains("empty cargo holds.") {
            if let Some(cap) = trade_complete().captures(line) {
                if let Some(empty) = parse_num(&cap[1]) {
                    self.broker.publish(&Event::with_num(
                        EventKind::TradeComplete,
                        EventId::Any,
                        empty,
                    ));
                }
            }
        } else if PORT_INSULTS.iter().any(|insult| line.contains(insult)) {
            self.broker
                .publish(&Event::new(EventKind::PortNotInterested, EventId::Any));
        } else if line.contains("Available Ship Scan") {
            self.parsers
                .insert(Category::Ships, Box::new(parsers::ShipScanParser::new()));
        } else if line.starts_with("You have never visited sector") {
            self.broker
                .publish(&Event::new(EventKind::SectorNotVisited, EventId::Any));
        } else if line.starts_with(" Items     Status  Trading On Dock OnBoard") {
            self.parsers.insert(
                Category::StealStock,
                Box::new(parsers::StealStockParser::new()),
            );
        } else if line.starts_with("For stealing from this port, your alignment went down") {
            self.broker.publish(&Event::new(
                EventKind::StealResult,
                EventId::Crime(CrimeOutcome::Success),
            ));
        } else if let Some(cap) = holds_to_buy().captures(line) {
            if let Some(next) = parse_num(&cap[1]) {
                self.broker
                    .publish(&Event::with_num(EventKind::HoldsToBuy, EventId::Any, next));
            }
        } else if let Some(cap) = figs_to_buy().captures(line) {
            if let Some(next) = parse_num(&cap[1]) {
                self.broker
                    .publish(&Event::with_num(EventKind::FigsToBuy, EventId::Any, next));
            }
        } else if let Some(cap) = shields_to_buy().captures(line) {
            if let Some(next) = parse_num(&cap[1]) {
                self.broker.publish(&Event::with_num(
                    EventKind::ShieldsToBuy,
                    EventId::Any,
                    next,
                ));
            }
        } else if line.starts_with("That is not an available ship.") {
            self.broker
                .publish(&Event::new(EventKind::ShipNotAvailable, EventId::Any));
        } else if line.starts_with("I have no information about a port in that sector.") {
            self.broker
                .publish(&Event::new(EventKind::PortNoInfo, EventId::Any));
        } else if line.starts_with("Trade Wars 2002 Game Configuration and Status") {
            self.parsers
                .insert(Category::Config, Box::new(parsers::ConfigParser::new()));
        }
    }

    async fn reap(&mut self) {
        let done: Vec<Category> = self
            .parsers
            .iter()
            .filter(|(_, p)| p.is_done())
            .map(|(k, _)| *k)
            .collect();
        for category in done {
            if let Some(parser) = self.parsers.remove(&category) {
                if let Some(outcome) = parser.finish() {
                    self.apply(outcome).await;
                }
            }
        }
    }

    /// Fold a finished parser's outcome into the world and announce it.
    async fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sector(sector) => {
                let id = sector.id;
                self.world.upsert_sector(sector).await;
                self.broker.publish(&Event::with_num(
                    EventKind::SectorDisplay,
                    EventId::Num(id),
                    i64::from(id),
                ));
            }
            Outcome::QuickStats(patch) => {
                self.world
                    .update_status(|status| {
                        if let Some(sector) = patch.sector {
                            status.sector = sector;
                        }
                        if let Some(creds) = patch.creds {
                            status.creds = creds;
                        }
                        if let Some(figs) = patch.figs {
                            status.figs = figs;
                        }
                        if let Some(shields) = patch.shields {
                            status.shields = shields;
                        }
                        if let Some(holds) = patch.holds {
                            status.holds = holds;
                        }
                        if let Some(equ) = patch.equ {
                            status.equ = equ;
                        }
                        if let Some(exp) = patch.exp {
                            status.exp = exp;
                        }
                        if let Some(ship) = patch.ship {
                            status.ship = ship;
                        }
                        if let Some(gtorps) = patch.gtorps {
                            status.gtorps = gtorps;
                        }
                        if let Some(atmdts) = patch.atmdts {
                            status.atmdts = atmdts;
                        }
                        if let Some(lrs) = patch.lrs {
                            status.lrs = lrs;
                        }
                        if let Some(twarp) = patch.twarp {
                            status.twarp = twarp;
                        }
                    })
                    .await;
                self.broker
                    .publish(&Event::new(EventKind::QuickStats, EventId::Any));
            }
            Outcome::PortReport { sector, report } => {
                self.world.put_port_report(sector, report).await;
                self.broker.publish(&Event::with_num(
                    EventKind::PortReport,
                    EventId::Num(sector),
                    i64::from(sector),
                ));
            }
            Outcome::Route(text) => {
                self.broker.publish(&Event {
                    kind: EventKind::RouteDisplay,
                    id: EventId::Any,
                    payload: Payload::Text(text),
                });
            }
            Outcome::Density(rows) => {
                for row in rows {
                    // Density attaches to sectors we already hold; there is
                    // not enough here to make a new entry.
                    if !self
                        .world
                        .update_density(row.sector, row.density, row.warp_count)
                        .await
                    {
                        trace!(sector = row.sector, "density for an uncached sector");
                    }
                }
                self.broker
                    .publish(&Event::new(EventKind::DensityScan, EventId::Any));
            }
            Outcome::Planet(planet) => {
                let id = planet.id;
                self.world.upsert_planet(planet).await;
                self.broker.publish(&Event::with_num(
                    EventKind::PlanetDisplay,
                    EventId::Num(id),
                    i64::from(id),
                ));
            }
            Outcome::CorpPlanets(rows) => {
                for row in rows {
                    self.world
                        .merge_planet_summary(row.id, row.sector, row.class, row.summary)
                        .await;
                }
                self.broker
                    .publish(&Event::new(EventKind::CorpPlanetList, EventId::Any));
            }
            Outcome::PortCreds { sector, creds } => {
                if self.world.set_port_creds(sector, creds).await {
                    self.broker.publish(&Event::with_num(
                        EventKind::PortRobCredits,
                        EventId::Num(sector),
                        creds,
                    ));
                } else {
                    warn!(sector, "rob estimate for a sector with no known port");
                }
            }
            Outcome::Crime {
                kind,
                outcome,
                sector,
            } => {
                let payload = match sector {
                    Some(sector) => Payload::Num(i64::from(sector)),
                    None => Payload::None,
                };
                self.broker.publish(&Event {
                    kind,
                    id: EventId::Crime(outcome),
                    payload,
                });
            }
            Outcome::StealStock(on_dock) => {
                self.broker.publish(&Event::with_num(
                    EventKind::PortStealStock,
                    EventId::Any,
                    on_dock,
                ));
            }
            Outcome::CimWarps(entries) => {
                for (from, warps) in entries {
                    if let Err(err) = self.stores.warps.add_if_absent(from, warps).await {
                        warn!(%err, from, "failed to store warps");
                    }
                }
            }
            Outcome::SectorWarps { sector, warps } => {
                if let Err(err) = self.stores.warps.add_if_absent(sector, warps.clone()).await {
                    warn!(%err, sector, "failed to store warps");
                }
                self.world.set_sector_warps(sector, warps.clone()).await;
                self.broker.publish(&Event {
                    kind: EventKind::SectorWarps,
                    id: EventId::Num(sector),
                    payload: Payload::Nums(warps),
                });
            }
            Outcome::Stardock(sector) => {
                self.world
                    .update_status(|status| status.stardock = sector)
                    .await;
                self.broker
                    .publish(&Event::new(EventKind::ConfigDisplay, EventId::Any));
            }
            Outcome::PlanetLanding(ids) => {
                self.broker.publish(&Event {
                    kind: EventKind::PlanetLanding,
                    id: EventId::Any,
                    payload: Payload::Nums(ids),
                });
            }
            Outcome::FigDeploy(available) => {
                self.broker.publish(&Event::with_num(
                    EventKind::FigDeploy,
                    EventId::Any,
                    available,
                ));
            }
            Outcome::PlanetClass(class) => {
                self.broker
                    .publish(&Event::new(EventKind::PlanetCreate, EventId::Class(class)));
            }
            Outcome::Ships(ships) => {
                for ship in ships {
                    self.world.put_ship(ship).await;
                    self.broker.publish(&Event::with_num(
                        EventKind::AvailableShips,
                        EventId::Num(ship.id),
                        i64::from(ship.sector),
                    ));
                }
            }
            Outcome::BuyMax { kind, max } => {
                self.broker.publish(&Event::with_num(kind, EventId::Any, max));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warptty_core::models::{Port, PortItem, PortReport, Sector, TradeStatus};

    async fn dispatcher() -> (Dispatcher, World, Broker, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let world = World::new();
        let broker = Broker::new();
        let stores = Stores::load(dir.path()).await.unwrap();
        let dispatcher = Dispatcher::new(world.clone(), stores, broker.clone());
        (dispatcher, world, broker, dir)
    }

    async fn feed_lines(dispatcher: &mut Dispatcher, lines: &[&str]) {
        for line in lines {
            dispatcher.handle(ScanItem::Line(line.to_string())).await;
        }
    }

    #[tokio::test]
    async fn test_warping_line_updates_sector() {
        let (mut dispatcher, world, _broker, _dir) = dispatcher().await;

        feed_lines(&mut dispatcher, &["Warping to Sector 1234"]).await;

        assert_eq!(world.status().await.sector, 1234);
    }

    #[tokio::test]
    async fn test_sector_display_flow() {
        let (mut dispatcher, world, broker, _dir) = dispatcher().await;
        let mut events = broker.subscribe(EventKind::SectorDisplay);

        feed_lines(
            &mut dispatcher,
            &[
                "Sector  : 100 in The Federation.",
                "Ports   : Stargate Alpha I, Class 9 (BBS)",
                "Warps to Sector(s) :  (101) - 102",
            ],
        )
        .await;

        let event = events.try_recv().unwrap();
        assert_eq!(event.id, EventId::Num(100));
        assert_eq!(event.num(), Some(100));

        let sector = world.sector(100).await.unwrap();
        assert!(sector.fedspace);
        assert_eq!(sector.warps, vec![101, 102]);
        assert_eq!(sector.port.unwrap().class, "BBS");
    }

    #[tokio::test]
    async fn test_quick_stats_update_status() {
        let (mut dispatcher, world, broker, _dir) = dispatcher().await;
        let mut events = broker.subscribe(EventKind::QuickStats);

        let sep = "\u{2592}";
        feed_lines(
            &mut dispatcher,
            &[
                &format!(" Sect 217{sep}Turns 9,217{sep}Creds 301,000{sep}Figs 2,500"),
                &format!("{sep}Shlds 400{sep}Hlds 75{sep}Exp 12,000{sep}GTorp 6"),
                &format!("{sep}AtmDt 3{sep}LRS Holo{sep}TWarp 2{sep}"),
                "",
            ],
        )
        .await;

        assert!(events.try_recv().is_ok());
        let status = world.status().await;
        assert_eq!(status.sector, 217);
        assert_eq!(status.creds, 301_000);
        assert_eq!(status.figs, 2_500);
        assert_eq!(status.gtorps, 6);
    }

    #[tokio::test]
    async fn test_busted_line_carries_current_sector() {
        let (mut dispatcher, world, broker, _dir) = dispatcher().await;
        world.set_sector(555).await;
        let wait = broker.wait_for(EventKind::Busted, EventId::Any);

        feed_lines(&mut dispatcher, &["The port Guards surround you"]).await;

        let event = wait.await.unwrap();
        assert_eq!(event.num(), Some(555));
    }

    #[tokio::test]
    async fn test_commerce_report_keeps_active_report_parser() {
        let (mut dispatcher, world, _broker, _dir) = dispatcher().await;
        world.set_sector(1).await;

        feed_lines(
            &mut dispatcher,
            &[
                "What sector is the port in? [1] 650",
                "Commerce report for Vega Prime: 12:30:00 PM Sat May 06, 2023",
                "",
                "Fuel Ore   Buying   2890   97%",
                "Organics   Buying   1203   55%",
                "Equipment  Selling   940   100%",
            ],
        )
        .await;

        // The answered question pins the report to sector 650; the Commerce
        // header arriving next must not reset that.
        let report = world.port_report(650).await.unwrap();
        assert_eq!(report.equ.trading, 940);
        assert!(world.port_report(1).await.is_none());
    }

    #[tokio::test]
    async fn test_rob_estimate_needs_a_cached_port() {
        let (mut dispatcher, world, broker, _dir) = dispatcher().await;
        let mut events = broker.subscribe(EventKind::PortRobCredits);
        world.set_sector(300).await;

        let estimate =
            "The Trade Journals estimate this port has in excess of 31,000 creds onhand.";
        feed_lines(&mut dispatcher, &[estimate]).await;
        assert!(events.try_recv().is_err());

        world
            .upsert_sector(Sector {
                id: 300,
                port: Some(Port {
                    class: "SSB".to_string(),
                    creds: 0,
                    report: None,
                }),
                ..Default::default()
            })
            .await;
        feed_lines(&mut dispatcher, &[estimate]).await;

        let event = events.try_recv().unwrap();
        assert_eq!(event.id, EventId::Num(300));
        assert_eq!(event.num(), Some(31_000));
        assert_eq!(world.sector(300).await.unwrap().port.unwrap().creds, 31_000);
    }

    #[tokio::test]
    async fn test_planet_display_ends_at_prompt() {
        let (mut dispatcher, world, broker, _dir) = dispatcher().await;
        let mut events = broker.subscribe(EventKind::PlanetDisplay);

        feed_lines(
            &mut dispatcher,
            &[
                "Planet #5 in sector 300: Ore Works",
                "Class M, Earth Type",
                "Fuel Ore    120    10    1,000    25,000    5    100,000",
            ],
        )
        .await;
        assert!(events.try_recv().is_err());

        dispatcher
            .handle(ScanItem::Prompt(PromptHit {
                kind: PromptKind::Planet,
                sector: None,
                product: None,
            }))
            .await;

        let event = events.try_recv().unwrap();
        assert_eq!(event.id, EventId::Num(5));
        let planet = world.planet(5).await.unwrap();
        assert_eq!(planet.sector, 300);
        assert_eq!(planet.class, Some('M'));
    }

    #[tokio::test]
    async fn test_command_prompt_sets_sector_and_publishes() {
        let (mut dispatcher, world, broker, _dir) = dispatcher().await;
        let wait = broker.wait_for(
            EventKind::PromptDisplay,
            EventId::Prompt(PromptKind::Command),
        );

        dispatcher
            .handle(ScanItem::Prompt(PromptHit {
                kind: PromptKind::Command,
                sector: Some(812),
                product: None,
            }))
            .await;

        let event = wait.await.unwrap();
        assert_eq!(event.num(), Some(812));
        assert_eq!(world.status().await.sector, 812);
    }

    #[tokio::test]
    async fn test_fig_hit_publishes_sector() {
        let (mut dispatcher, _world, broker, _dir) = dispatcher().await;
        let wait = broker.wait_for(EventKind::FigHit, EventId::Any);

        dispatcher.handle(ScanItem::FigHit(420)).await;

        assert_eq!(wait.await.unwrap().num(), Some(420));
    }

    #[tokio::test]
    async fn test_trade_complete_counts_empty_holds() {
        let (mut dispatcher, _world, broker, _dir) = dispatcher().await;
        let wait = broker.wait_for(EventKind::TradeComplete, EventId::Any);

        feed_lines(
            &mut dispatcher,
            &["You have 2,301,440 credits and 75 empty cargo holds."],
        )
        .await;

        assert_eq!(wait.await.unwrap().num(), Some(75));
    }

    #[tokio::test]
    async fn test_port_insult_publishes_not_interested() {
        let (mut dispatcher, _world, broker, _dir) = dispatcher().await;
        let wait = broker.wait_for(EventKind::PortNotInterested, EventId::Any);

        feed_lines(&mut dispatcher, &["We're not interested."]).await;

        assert!(wait.await.is_some());
    }

    #[tokio::test]
    async fn test_installed_cim_parser_fills_warp_store() {
        let (mut dispatcher, _world, _broker, dir) = dispatcher().await;
        dispatcher.install(
            Category::CimWarps,
            Box::new(parsers::CimWarpsParser::new()),
        );

        feed_lines(
            &mut dispatcher,
            &["1 2 3 4", "2 1 5", ": ENDINTERROG"],
        )
        .await;

        let stores = Stores::load(dir.path()).await.unwrap();
        assert_eq!(stores.warps.get(1).await, Some(vec![2, 3, 4]));
        assert_eq!(stores.warps.get(2).await, Some(vec![1, 5]));
    }

    #[tokio::test]
    async fn test_sector_warps_query_publishes_and_stores() {
        let (mut dispatcher, world, broker, _dir) = dispatcher().await;
        world
            .upsert_sector(Sector {
                id: 218,
                ..Default::default()
            })
            .await;
        let wait = broker.wait_for(EventKind::SectorWarps, EventId::Num(218));

        feed_lines(
            &mut dispatcher,
            &["Sector 218 has warps to sector(s) :  219 - 450 - 2101"],
        )
        .await;

        let event = wait.await.unwrap();
        assert_eq!(event.nums(), &[219, 450, 2101]);
        assert_eq!(world.sector(218).await.unwrap().warps, vec![219, 450, 2101]);
    }

    #[tokio::test]
    async fn test_ship_scan_rows_become_events() {
        let (mut dispatcher, world, broker, _dir) = dispatcher().await;
        let mut events = broker.subscribe(EventKind::AvailableShips);

        feed_lines(
            &mut dispatcher,
            &[
                "       Available Ship Scan",
                "-----------------------------------------------------------------------------",
                "   2  1000  Stinger [Owned by] Krul",
                "  15   649  Mule Train [Owned by] Krul",
                "",
            ],
        )
        .await;

        let first = events.try_recv().unwrap();
        assert_eq!(first.id, EventId::Num(2));
        assert_eq!(first.num(), Some(1000));
        let second = events.try_recv().unwrap();
        assert_eq!(second.id, EventId::Num(15));
        assert_eq!(world.ship(15).await.unwrap().sector, 649);
    }

    #[tokio::test]
    async fn test_stored_report_from_commerce_header() {
        let (mut dispatcher, world, _broker, _dir) = dispatcher().await;
        world.set_sector(77).await;

        feed_lines(
            &mut dispatcher,
            &[
                "Commerce report for Vega Prime: 12:30:00 PM Sat May 06, 2023",
                "",
                "Fuel Ore   Selling   1000   100%",
                "Organics   Buying    500    50%",
                "Equipment  Buying    250    25%",
            ],
        )
        .await;

        // No question line, so the report lands on the current sector.
        let report = world.port_report(77).await.unwrap();
        assert_eq!(report.fuel.trading, 1000);
    }

    #[tokio::test]
    async fn test_report_refresh_replaces_cache() {
        let (mut dispatcher, world, _broker, _dir) = dispatcher().await;
        let stale = PortItem {
            status: TradeStatus::Selling,
            trading: 1,
            percent: 1,
        };
        world
            .put_port_report(
                9,
                PortReport {
                    time: Utc::now(),
                    fuel: stale.clone(),
                    org: stale.clone(),
                    equ: stale,
                },
            )
            .await;
        world.set_sector(9).await;

        feed_lines(
            &mut dispatcher,
            &[
                "Commerce report for Vega Prime: 12:30:00 PM Sat May 06, 2023",
                "",
                "Fuel Ore   Selling   1000   100%",
                "Organics   Buying    500    50%",
                "Equipment  Buying    250    25%",
            ],
        )
        .await;

        assert_eq!(world.port_report(9).await.unwrap().org.trading, 500);
    }
}
