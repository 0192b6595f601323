//! Sends keystrokes to the game and waits for the events they cause.
//!
//! Every operation arms its broker registration before sending the
//! keystrokes, so an event that comes back quickly cannot slip past the
//! waiter.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use warptty_core::error::BotError;
use warptty_core::event::{CrimeOutcome, Event, EventId, EventKind, PromptKind};
use warptty_core::models::{FigStance, LrsMode, PortReport, Product, TwarpClass};
use warptty_core::text::parse_route;

use crate::bot::broker::Broker;
use crate::world::World;

pub(crate) fn displaced() -> BotError {
    BotError::action_failed("event wait was displaced")
}

/// Knobs for [`Actuator::move_to`]. The defaults tolerate nothing hostile.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveOpts {
    /// Leave this many fighters in each sector passed through.
    pub drop_figs: i64,
    pub enemy_figs_max: i64,
    pub enemy_mines_max: i64,
    /// Never let the ship's own fighters fall below this while dropping.
    pub min_figs: i64,
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Clone)]
pub struct Actuator {
    pub broker: Broker,
    pub world: World,
    writer: mpsc::UnboundedSender<Vec<u8>>,
}

impl Actuator {
    pub fn new(broker: Broker, world: World, writer: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            broker,
            world,
            writer,
        }
    }

    pub fn send(&self, keys: &str) {
        if self.writer.send(keys.as_bytes().to_vec()).is_err() {
            warn!("game connection is gone; keystrokes dropped");
        }
    }

    pub fn land(&self, planet: u32) {
        self.send(&format!("l{planet}\r"));
    }

    /// Open the sub-bot's chat prompt and hand it a command.
    pub async fn mombot_send(&self, command: &str) -> Result<(), BotError> {
        let prompt = self
            .broker
            .wait_for(EventKind::PromptDisplay, EventId::Prompt(PromptKind::Mombot));
        self.send(">");
        prompt.await.ok_or_else(displaced)?;
        self.send(command);
        Ok(())
    }

    pub async fn quick_stats(&self) -> Result<(), BotError> {
        let wait = self.broker.wait_for(EventKind::QuickStats, EventId::Any);
        self.send("/");
        wait.await.ok_or_else(displaced)?;
        Ok(())
    }

    /// Plot a course on the ship's computer and return it, endpoints
    /// included.
    pub async fn route_from_to(&self, from: u32, to: u32) -> Result<Vec<u32>, BotError> {
        let wait = self.broker.wait_for(EventKind::RouteDisplay, EventId::Any);
        self.send(&format!("cf{from}\r{to}\rq"));
        let event = wait.await.ok_or_else(displaced)?;

        let route = event.text().unwrap_or_default();
        debug!(route, "got route");
        parse_route(route)
            .ok_or_else(|| BotError::parse_failed(format!("unreadable route: {route}")))
    }

    pub async fn route_to(&self, sector: u32) -> Result<Vec<u32>, BotError> {
        let current_id = self.world.status().await.sector;
        let current = self
            .world
            .sector(current_id)
            .await
            .ok_or_else(|| BotError::sector_not_cached(current_id))?;

        // No plotting needed if the destination is next door.
        if current.is_adjacent(sector) {
            return Ok(vec![current.id, sector]);
        }

        self.route_from_to(current.id, sector).await
    }

    pub async fn move_safe(&self, dest: u32, block: bool) -> Result<(), BotError> {
        self.move_to(dest, MoveOpts::default(), block).await
    }

    /// Walk sector by sector to `dest`, holo-scanning ahead when the ship
    /// has a holographic scanner and refusing to enter sectors that exceed
    /// the hostile limits in `opts`.
    pub async fn move_to(&self, dest: u32, opts: MoveOpts, block: bool) -> Result<(), BotError> {
        // Refresh the stats so the scanner type is known.
        self.quick_stats().await?;

        if self.world.status().await.sector == dest {
            debug!(dest, "already there; no move needed");
            return Ok(());
        }

        debug!(dest, "moving");
        let route = self.route_to(dest).await?;

        // Answer mined-sector prompts for the whole trip.
        let watcher = {
            let broker = self.broker.clone();
            let writer = self.writer.clone();
            tokio::spawn(async move {
                loop {
                    let wait = broker.wait_for(
                        EventKind::PromptDisplay,
                        EventId::Prompt(PromptKind::MinedSector),
                    );
                    if wait.await.is_some() {
                        let _ = writer.send(b"\r".to_vec());
                    }
                }
            })
        };
        let _watcher = AbortOnDrop(watcher);

        for &hop in &route[1..] {
            let mut attack = false;
            if self.world.status().await.lrs == LrsMode::Holo {
                let scan = self
                    .broker
                    .wait_for(EventKind::SectorDisplay, EventId::Num(hop));
                self.send("sh");
                scan.await.ok_or_else(displaced)?;

                let ahead = self
                    .world
                    .sector(hop)
                    .await
                    .ok_or_else(|| BotError::sector_not_cached(hop))?;
                if !ahead.figs_friendly && ahead.figs > opts.enemy_figs_max {
                    return Err(BotError::unsafe_sector(hop, "too many enemy fighters"));
                }
                if !ahead.mines_friendly && ahead.mines > opts.enemy_mines_max {
                    return Err(BotError::unsafe_sector(hop, "too many enemy mines"));
                }
                // Offensive fighters attack on entry, so there is nothing
                // left to order an attack against.
                if ahead.figs > 0
                    && !ahead.figs_friendly
                    && ahead.fig_stance != Some(FigStance::Offensive)
                {
                    attack = true;
                }
            }

            let arrival = self
                .broker
                .wait_for(EventKind::SectorDisplay, EventId::Num(hop));
            self.send(&format!("{hop}\r"));
            if attack {
                self.send("a999\r");
            }
            arrival.await.ok_or_else(displaced)?;

            let here = self
                .world
                .sector(hop)
                .await
                .ok_or_else(|| BotError::sector_not_cached(hop))?;
            if opts.drop_figs > 0
                && !here.fedspace
                && self.world.status().await.figs - opts.drop_figs >= opts.min_figs
                && here.figs < opts.drop_figs
            {
                self.send(&format!("f{}\rcd", opts.drop_figs));
            }
        }

        if block {
            loop {
                let event = self
                    .broker
                    .wait_for(EventKind::PromptDisplay, EventId::Prompt(PromptKind::Command))
                    .await
                    .ok_or_else(displaced)?;
                if event.num() == Some(i64::from(dest)) {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// Autopilot with express stops disabled, transwarping when the ship
    /// can.
    pub async fn express(&self, destination: u32) {
        if self.world.status().await.twarp == TwarpClass::None {
            self.send(&format!("{destination}\re"));
        } else {
            self.send(&format!("{destination}\rne"));
        }
    }

    pub async fn twarp(&self, destination: u32) -> Result<(), BotError> {
        let current_id = self.world.status().await.sector;
        let current = self
            .world
            .sector(current_id)
            .await
            .ok_or_else(|| BotError::sector_not_cached(current_id))?;

        if current.id == destination {
            return Ok(());
        }

        self.send(&format!("{destination}\r"));
        if current.is_adjacent(destination) {
            return Ok(());
        }

        let blind = self.broker.wait_for(EventKind::BlindJump, EventId::Any);
        let low_fuel = self.broker.wait_for(EventKind::TwarpLowFuel, EventId::Any);
        let locked = self.broker.wait_for(EventKind::TwarpLocked, EventId::Any);
        self.send("y");

        tokio::select! {
            e = blind => {
                e.ok_or_else(displaced)?;
                self.send("n");
                Err(BotError::action_failed(format!(
                    "no locating beam at sector {destination}; aborting the jump"
                )))
            }
            e = low_fuel => {
                e.ok_or_else(displaced)?;
                Err(BotError::action_failed("not enough fuel for the jump"))
            }
            e = locked => {
                e.ok_or_else(displaced)?;
                self.send("y");
                Ok(())
            }
        }
    }

    /// Dock and rob the port, skipping ports too poor to be worth the risk.
    pub async fn rob(&self) -> Result<(), BotError> {
        let wait = self
            .broker
            .wait_for(EventKind::PortRobCredits, EventId::Any);
        self.send("d/pr\rr");
        let event = wait.await.ok_or_else(displaced)?;

        let creds = event.num().unwrap_or(0);
        let exp = self.world.status().await.exp;
        if creds < exp {
            debug!(creds, "not enough creds to rob");
            self.send("0\r");
            self.broker.publish(&Event::new(
                EventKind::RobResult,
                EventId::Crime(CrimeOutcome::Abort),
            ));
            return Ok(());
        }

        // Ask for a bit more than the estimate; the game caps a successful
        // haul at triple experience.
        let mut to_rob = (creds as f32 * 1.11) as i64;
        let max = 3 * exp;
        if to_rob > max {
            to_rob = max;
        }
        self.send(&format!("{to_rob}\r"));
        Ok(())
    }

    /// Land on the highest-numbered planet here, which is the newest.
    pub async fn land_newest(&self) -> Result<(), BotError> {
        let wait = self
            .broker
            .wait_for(EventKind::PlanetLanding, EventId::Any);
        self.send("l");
        let event = wait.await.ok_or_else(displaced)?;

        let newest = event
            .nums()
            .iter()
            .max()
            .copied()
            .ok_or_else(|| BotError::action_failed("no planets to land on"))?;
        self.send(&format!("{newest}\r"));
        Ok(())
    }

    /// Dump the CIM warp report into the warp store.
    pub fn cim_sector_update(&self) {
        self.send("^iq");
    }

    pub async fn query_warps(&self, sector: u32, block: bool) -> Result<(), BotError> {
        if !block {
            self.send(&format!("ci{sector}\rq"));
            return Ok(());
        }

        let warps = self.broker.wait_for(EventKind::SectorWarps, EventId::Any);
        let unvisited = self
            .broker
            .wait_for(EventKind::SectorNotVisited, EventId::Any);
        self.send(&format!("ci{sector}\rq"));
        tokio::select! {
            e = warps => { e.ok_or_else(displaced)?; }
            e = unvisited => { e.ok_or_else(displaced)?; }
        }
        Ok(())
    }

    /// Buy the most the dock will sell of detonators, genesis torpedoes,
    /// and shields. Must be run from the stardock sector. Each purchase
    /// opens by declining once so the parser can observe the maximum.
    pub async fn buy_hardware(&self) -> Result<(), BotError> {
        let max = self
            .broker
            .wait_for(EventKind::DetonatorBuyMax, EventId::Any);
        self.send("psha\r");
        let event = max.await.ok_or_else(displaced)?;
        self.send(&format!("a{}\r", event.num().unwrap_or(0)));

        let max = self.broker.wait_for(EventKind::GenesisBuyMax, EventId::Any);
        self.send("t\r");
        let event = max.await.ok_or_else(displaced)?;
        self.send(&format!("t{}\r", event.num().unwrap_or(0)));

        let max = self.broker.wait_for(EventKind::ShieldsToBuy, EventId::Any);
        self.send("qsp");
        let event = max.await.ok_or_else(displaced)?;
        self.send(&format!("c{}\r", event.num().unwrap_or(0)));

        self.send("qqq");
        Ok(())
    }

    /// Travel to the stardock, following the configured transwarp refueling
    /// hops when they are set.
    pub async fn go_to_stardock(&self) -> Result<(), BotError> {
        if self.world.status().await.stardock == 0 {
            let wait = self.broker.wait_for(EventKind::ConfigDisplay, EventId::Any);
            self.send("v");
            wait.await.ok_or_else(displaced)?;
        }

        for hop in self.world.settings().await.hops_to_stardock {
            self.twarp(hop.sector).await?;
            self.land(hop.planet);
            self.send("t\r\r1\rq");
        }

        let stardock = self.world.status().await.stardock;
        self.move_safe(stardock, false).await
    }

    /// Ask the computer for a port's commerce report. Returns `Ok(None)`
    /// when the computer has no data for the sector. A cached report
    /// younger than `max_age` is returned without asking.
    ///
    /// No console command binds this yet; exercised in tests.
    #[allow(dead_code)]
    pub async fn get_port_report(
        &self,
        sector: u32,
        max_age: chrono::Duration,
    ) -> Result<Option<PortReport>, BotError> {
        if max_age > chrono::Duration::zero() {
            if let Some(report) = self.world.port_report(sector).await {
                if Utc::now() - report.time < max_age {
                    return Ok(Some(report));
                }
            }
        }

        let report = self
            .broker
            .wait_for(EventKind::PortReport, EventId::Num(sector));
        let no_info = self.broker.wait_for(EventKind::PortNoInfo, EventId::Any);
        self.send(&format!("cr{sector}\rq"));
        tokio::select! {
            e = report => { e.ok_or_else(displaced)?; }
            e = no_info => {
                e.ok_or_else(displaced)?;
                return Ok(None);
            }
        }

        let report = self
            .world
            .port_report(sector)
            .await
            .ok_or_else(|| BotError::action_failed("port report missing after display"))?;
        Ok(Some(report))
    }

    /// Ferry everything stockpiled on planet `from` to planet `to`, one
    /// shipload at a time. Both planets must be in the current sector.
    pub async fn strip_planet(&self, from: u32, to: u32) -> Result<(), BotError> {
        let wait = self.broker.wait_for(EventKind::PlanetDisplay, EventId::Any);
        self.send(&format!("l{from}\r"));
        tokio::select! {
            _ = wait => {}
            _ = sleep(Duration::from_secs(1)) => {
                // The planet display event gets missed a lot. Cause another
                // display and give it a second to be parsed.
                debug!("planet display missed; nudging");
                self.send("\r");
                sleep(Duration::from_secs(1)).await;
            }
        }

        let planet = self
            .world
            .planet(from)
            .await
            .ok_or_else(|| BotError::planet_not_cached(from))?;
        let holds = self.world.status().await.holds;
        if holds <= 0 {
            return Err(BotError::action_failed("no cargo holds to ferry with"));
        }

        for (idx, amount) in [(1, planet.ore), (2, planet.org), (3, planet.equ)] {
            let mut quantity = amount;
            while quantity > 0 {
                if quantity < holds {
                    self.send(&format!("tnt{idx}{quantity}\rq"));
                } else {
                    self.send(&format!("tnt{idx}\rq"));
                }
                self.send(&format!("l{to}\rtnl{idx}\rql{from}\r"));
                quantity -= holds;
            }
        }

        Ok(())
    }

    /// Visit every planet in the current sector and shift colonists off
    /// crowded categories, per planet class.
    pub async fn rebalance_populations(&self) -> Result<(), BotError> {
        let wait = self
            .broker
            .wait_for(EventKind::PlanetLanding, EventId::Any);
        self.send("lq\r");
        let event = wait.await.ok_or_else(displaced)?;
        let planet_ids = event.nums().to_vec();

        for pid in planet_ids {
            let mut planet = loop {
                let wait = self
                    .broker
                    .wait_for(EventKind::PlanetDisplay, EventId::Num(pid));
                self.land(pid);
                tokio::select! {
                    e = wait => {
                        if e.is_some() {
                            match self.world.planet(pid).await {
                                Some(planet) => break planet,
                                None => return Err(BotError::planet_not_cached(pid)),
                            }
                        }
                    }
                    _ = sleep(Duration::from_secs(1)) => {
                        // Occasionally the planet display event doesn't
                        // fire. Re-try.
                        debug!(planet = pid, "planet display missed; retrying");
                        self.send("q");
                    }
                }
            };
            debug!(planet = pid, "got planet info");

            match planet.class {
                Some('M') => {
                    if planet.equ_cols > 15_000 {
                        let to_move = planet.equ_cols - 14_600;
                        self.send(&format!("pn3{to_move}\r1"));
                        planet.ore_cols += to_move;
                        planet.equ_cols -= to_move;
                    }
                    if planet.ore_cols > 15_000 {
                        let to_move = planet.ore_cols - 14_600;
                        self.send(&format!("pn1{to_move}\r2"));
                        planet.org_cols += to_move;
                        planet.ore_cols -= to_move;
                    }
                }
                Some('O') => {
                    if planet.org_cols > 100_000 {
                        let to_move = planet.org_cols - 99_000;
                        self.send(&format!("pn2{to_move}\r1"));
                        planet.ore_cols += to_move;
                        planet.org_cols -= to_move;
                    }
                }
                Some('H') => {
                    if planet.ore_cols > 50_000 {
                        let to_move = planet.ore_cols - 49_500;
                        self.send(&format!("pn1{to_move}\r3"));
                        planet.equ_cols += to_move;
                        planet.ore_cols -= to_move;
                    }
                }
                _ => {}
            }
            self.world.upsert_planet(planet).await;
            self.send("q");
        }

        Ok(())
    }

    /// Kick off the TWX mass-upgrade script on the current planet.
    pub async fn mass_upgrade(&self, block: bool) -> Result<(), BotError> {
        if !block {
            self.send("$ss2_massupgrade\rg");
            return Ok(());
        }
        let wait = self
            .broker
            .wait_for(EventKind::ScriptTerminated, EventId::Any);
        self.send("$ss2_massupgrade\rg");
        wait.await.ok_or_else(displaced)?;
        Ok(())
    }

    /// Visit each point in turn and run `task` once in every sector along
    /// the way, skipping sectors already visited on this walk.
    pub async fn route_walk<F, Fut>(&self, points: &[u32], mut task: F) -> Result<(), BotError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.quick_stats().await?;

        let mut completed = HashSet::new();

        for &point in points {
            let route = self.route_to(point).await?;

            for (i, &sector) in route.iter().enumerate() {
                if i > 0 {
                    self.move_safe(sector, false).await?;
                }

                if !completed.insert(sector) {
                    debug!(sector, "already visited on this walk");
                    continue;
                }

                task().await;

                // TWX scripts can quit before their keystrokes finish; wait
                // for a prompt before moving on.
                let wait = self.broker.wait_for(EventKind::PromptDisplay, EventId::Any);
                self.send("\r");
                wait.await.ok_or_else(displaced)?;
            }
        }

        Ok(())
    }

    /// Have the sub-bot negotiate away a product stockpiled on the planet
    /// it is parked at, and wait for it to report back.
    pub async fn mombot_planet_sell(&self, product: Product) -> Result<(), BotError> {
        let done = self
            .broker
            .wait_for(EventKind::MombotTradeDone, EventId::Any);
        let nothing = self
            .broker
            .wait_for(EventKind::MombotNothingToSell, EventId::Any);
        self.mombot_send(&format!("neg {}\r", product.code())).await?;
        tokio::select! {
            e = done => { e.ok_or_else(displaced)?; }
            e = nothing => { e.ok_or_else(displaced)?; }
        }
        Ok(())
    }
}
