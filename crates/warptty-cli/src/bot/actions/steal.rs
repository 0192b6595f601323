use std::collections::HashSet;

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use warptty_core::error::BotError;
use warptty_core::event::{CrimeOutcome, EventId, EventKind, PromptKind};
use warptty_core::models::{Sector, TradeStatus};

use crate::bot::actions::{pick_hop, roam_opts, safe_hops};
use crate::bot::actuator::{displaced, Actuator};
use crate::world::persist::Stores;

struct ShipPos {
    id: u32,
    sector: u32,
}

/// Run the sell-steal loop with a second ship: find a pair of equ-buying
/// ports, park one ship under each, and alternate selling stolen equ and
/// stealing it back, transporting between the ships. On a bust, re-equip
/// in fedspace and hunt for a new pair.
pub async fn sell_steal(act: Actuator, stores: Stores, other_ship: u32) -> Result<(), BotError> {
    act.quick_stats().await?;

    // Figure out where the ships are and get them to the same sector.
    let status = act.world.status().await;
    let mut current = ShipPos {
        id: status.ship,
        sector: status.sector,
    };
    let mut other = ShipPos {
        id: other_ship,
        sector: other_ship_sector(&act, other_ship).await?,
    };

    if current.sector != other.sector {
        act.move_to(other.sector, roam_opts(), false).await?;
    }

    loop {
        info!("starting steal round");

        let sector_id = act.world.status().await.sector;
        current.sector = sector_id;
        other.sector = sector_id;

        // Holo-scan and wait for the sectors to be parsed.
        let scan = act
            .broker
            .wait_for(EventKind::SectorDisplay, EventId::Num(sector_id));
        act.send("sh");
        scan.await.ok_or_else(displaced)?;

        find_ports(&act, &stores, &mut current, &mut other).await?;

        let busted = steal_rounds(&act, &mut current, &mut other).await?;

        if busted {
            // Re-equip in fedspace before hunting for a new pair.
            act.move_safe(1, false).await?;

            // TODO also buy shields and figs
            let wait = act.broker.wait_for(EventKind::HoldsToBuy, EventId::Any);
            act.send("pta");
            let holds = wait.await.ok_or_else(displaced)?.num().unwrap_or(0);
            act.send(&format!("{holds}\ryq"));

            let wait = act
                .broker
                .wait_for(EventKind::AvailableShips, EventId::Num(other.id));
            act.send("x\rq");
            other.sector = wait.await.ok_or_else(displaced)?.num().unwrap_or(0) as u32;

            act.move_safe(other.sector, false).await?;
        }
    }
}

/// Ask the transporter where a ship is.
async fn other_ship_sector(act: &Actuator, ship: u32) -> Result<u32, BotError> {
    let wait = act
        .broker
        .wait_for(EventKind::AvailableShips, EventId::Num(ship));
    act.send("xq");
    let event = wait.await.ok_or_else(displaced)?;
    Ok(event.num().unwrap_or(0) as u32)
}

/// Transport over to the other ship and confirm the swap took.
async fn change_ships(
    act: &Actuator,
    current: &mut ShipPos,
    other: &mut ShipPos,
) -> Result<(), BotError> {
    let not_available = act
        .broker
        .wait_for(EventKind::ShipNotAvailable, EventId::Any);
    // The confirmation lists the ship we just left, which after the swap
    // below is `other`.
    let confirmed = act
        .broker
        .wait_for(EventKind::AvailableShips, EventId::Num(current.id));
    act.send(&format!("x{}\rq", other.id));
    std::mem::swap(current, other);

    tokio::select! {
        e = not_available => {
            e.ok_or_else(displaced)?;
            Err(BotError::action_failed("ship not available for xport"))
        }
        e = confirmed => {
            e.ok_or_else(displaced)?;
            Ok(())
        }
    }
}

/// Alternate sell and steal between the two parked ships until a bust.
async fn steal_rounds(
    act: &Actuator,
    current: &mut ShipPos,
    other: &mut ShipPos,
) -> Result<bool, BotError> {
    for i in 0i64.. {
        let status = act.world.status().await;
        if i % 5 == 0 || status.exp < 35 * status.holds {
            // Track exp, more often when it runs low.
            act.send("/");
        }

        for _half in 0..2 {
            if i == 0 {
                prepare_port(act).await?;
            } else if let Err(err) = sell(act).await {
                warn!(%err, "sell failed");
            }

            if steal(act).await? {
                info!(rounds = i, "steal pair done");
                return Ok(true);
            }

            change_ships(act, current, other).await?;
        }
    }
    Ok(false)
}

async fn prepare_port(act: &Actuator) -> Result<(), BotError> {
    act.quick_stats().await?;

    if act.world.status().await.equ > 0 {
        sell(act).await?;
    }

    // Jettison anything else onboard.
    act.send("jy");
    Ok(())
}

/// Dock and sell everything onboard, declining whatever the port offers
/// back.
async fn sell(act: &Actuator) -> Result<(), BotError> {
    loop {
        let sell_prompt = act
            .broker
            .wait_for(EventKind::PromptDisplay, EventId::Prompt(PromptKind::Sell));
        act.send("pt");
        sell_prompt.await.ok_or_else(displaced)?;

        let not_interested = act
            .broker
            .wait_for(EventKind::PortNotInterested, EventId::Any);
        let command_prompt = act.broker.wait_for(
            EventKind::PromptDisplay,
            EventId::Prompt(PromptKind::Command),
        );
        let buy_prompt = act
            .broker
            .wait_for(EventKind::PromptDisplay, EventId::Prompt(PromptKind::Buy));
        // Sell all.
        act.send("\r");

        tokio::select! {
            e = not_interested => {
                e.ok_or_else(displaced)?;
                // The negotiation fell through; try again.
            }
            e = command_prompt => {
                e.ok_or_else(displaced)?;
                return Ok(());
            }
            e = buy_prompt => {
                e.ok_or_else(displaced)?;
                let sector_id = act.world.status().await.sector;
                let sector = act
                    .world
                    .sector(sector_id)
                    .await
                    .ok_or_else(|| BotError::sector_not_cached(sector_id))?;
                let report = sector
                    .port
                    .as_ref()
                    .and_then(|p| p.report.as_ref())
                    .ok_or_else(|| BotError::port_unusable(sector_id, "missing report"))?;
                if report.fuel.status == TradeStatus::Selling {
                    act.send("0\r");
                }
                if report.org.status == TradeStatus::Selling {
                    act.send("0\r");
                }
                return Ok(());
            }
        }
    }
}

/// Steal as much equ as experience allows, upgrading the port's stock
/// first when it is short. Returns true on a bust.
async fn steal(act: &Actuator) -> Result<bool, BotError> {
    let status = act.world.status().await;
    let holds = status.holds;
    let holds_to_steal = holds.min(status.exp / 30);

    let stock = act
        .broker
        .wait_for(EventKind::PortStealStock, EventId::Any);
    act.send("pr\rs3");
    let available = stock.await.ok_or_else(displaced)?.num().unwrap_or(0);

    if available < holds {
        // The port is short on equ. Pay to top up its stock, then start
        // the steal over.
        let mut upgrade = (holds - available) / 10;
        if (holds - available) % 10 > 0 {
            upgrade += 1;
        }
        act.send(&format!("0\ro3{upgrade}\rq"));
        act.send("pr\rs3");
    }

    let success = act.broker.wait_for(
        EventKind::StealResult,
        EventId::Crime(CrimeOutcome::Success),
    );
    let busted_result = act.broker.wait_for(
        EventKind::StealResult,
        EventId::Crime(CrimeOutcome::Busted),
    );
    let busted_any = act.broker.wait_for(EventKind::Busted, EventId::Any);
    act.send(&format!("{holds_to_steal}\r"));

    tokio::select! {
        e = success => {
            e.ok_or_else(displaced)?;
            Ok(false)
        }
        e = busted_result => {
            e.ok_or_else(displaced)?;
            Ok(true)
        }
        // A fig hit can bury the steal result line, so watch the bust
        // announcement too.
        e = busted_any => {
            e.ok_or_else(displaced)?;
            Ok(true)
        }
    }
}

/// A port we can steal from sells equ, meaning an xxB class.
async fn port_can_be_used(
    act: &Actuator,
    stores: &Stores,
    sector: &Sector,
) -> Result<bool, BotError> {
    // TODO judge ports from the stored record alone so the visit in
    // sector_with_visit can go away.
    let is_xxb = sector
        .port
        .as_ref()
        .map(|p| p.class.len() == 3 && p.class.ends_with('B'))
        .unwrap_or(false);
    if !is_xxb {
        return Ok(false);
    }
    info!(sector = sector.id, "considering port");

    let report_wait = act
        .broker
        .wait_for(EventKind::PortReport, EventId::Num(sector.id));
    act.send(&format!("cr{}\rq", sector.id));

    let saved = stores.sectors.get(sector.id).await;

    report_wait.await.ok_or_else(displaced)?;

    let Some(fresh) = act.world.sector(sector.id).await else {
        return Ok(false);
    };
    let Some(report) = fresh.port.as_ref().and_then(|p| p.report.as_ref()) else {
        return Ok(false);
    };

    // A missing record just means we have never been busted there.
    if saved.and_then(|s| s.busted).is_some() {
        return Ok(false);
    }

    Ok(report.equ.status == TradeStatus::Buying
        && report.equ.percent >= 80
        && report.equ.trading <= 10_000
        && report.org.trading <= 10_000
        && !fresh.fedspace)
}

/// Fetch a sector from the cache, visiting it first if we have never seen
/// it.
async fn sector_with_visit(act: &Actuator, sector_id: u32) -> Result<Sector, BotError> {
    if let Some(sector) = act.world.sector(sector_id).await {
        return Ok(sector);
    }

    act.move_to(sector_id, roam_opts(), false).await?;
    let scan = act
        .broker
        .wait_for(EventKind::SectorDisplay, EventId::Num(sector_id));
    act.send("sh");
    scan.await.ok_or_else(displaced)?;

    act.world.sector(sector_id).await.ok_or_else(|| {
        BotError::action_failed("failed to get sector details even after visiting it")
    })
}

/// Whether two ports are close enough to each other, and to the other
/// ship, for the transporter to cover.
async fn check_distance(
    act: &Actuator,
    other: &ShipPos,
    distance: usize,
    sector_a: u32,
    sector_b: u32,
) -> bool {
    let Ok(outbound) = act.route_from_to(sector_a, sector_b).await else {
        return false;
    };
    if outbound.len() >= distance {
        return false;
    }

    let Ok(inbound) = act.route_from_to(sector_b, sector_a).await else {
        return false;
    };
    // Routes include the starting sector, so even a 1-hop route has two
    // points.
    if inbound.len() > distance + 1 {
        return false;
    }

    // The current ship has to be able to reach A and still transport back
    // to the other ship.
    // TODO move to the closer port first instead of vetoing the pair.
    if sector_a != other.sector {
        let Ok(route) = act.route_from_to(sector_a, other.sector).await else {
            return false;
        };
        if route.len() > distance + 1 {
            return false;
        }
    }
    true
}

/// Walk one ship to port `a`, transport to the other, and walk it to `b`.
async fn position_ships(
    act: &Actuator,
    current: &mut ShipPos,
    other: &mut ShipPos,
    a: u32,
    b: u32,
) -> Result<(), BotError> {
    act.move_to(a, roam_opts(), false).await?;
    current.sector = a;
    change_ships(act, current, other).await?;
    act.move_to(b, roam_opts(), false).await?;
    current.sector = b;
    Ok(())
}

/// Roam until two usable equ-buying ports within transporter range of
/// each other are found, then park one ship under each.
async fn find_ports(
    act: &Actuator,
    stores: &Stores,
    current: &mut ShipPos,
    other: &mut ShipPos,
) -> Result<(), BotError> {
    let mut visited: HashSet<u32> = HashSet::new();

    'outer: loop {
        let start = current.sector;
        visited.insert(start);

        let (candidates, unexplored) = find_xxbs(act, stores, start, 5, &[]).await?;

        for &candidate in &candidates {
            let sector = sector_with_visit(act, candidate).await?;
            if !port_can_be_used(act, stores, &sector).await? {
                continue;
            }
            info!(sector = sector.id, "found a suitable primary port");

            // Look for a companion near it.
            let (companions, c_unexplored) =
                find_xxbs(act, stores, candidate, 5, &[sector.id]).await?;
            info!(count = companions.len(), "potential companions");
            for &companion in &companions {
                info!(companion, "considering companion");
                let c_sector = sector_with_visit(act, companion).await?;
                if port_can_be_used(act, stores, &c_sector).await?
                    && check_distance(act, other, 5, candidate, companion).await
                {
                    info!(candidate, companion, "found a pair");
                    return position_ships(act, current, other, candidate, companion).await;
                }
            }

            // No companion on record; look at the unexplored sectors
            // nearby.
            for &uc in &c_unexplored {
                info!(sector = uc, "moving to unexplored sector");
                act.move_to(uc, roam_opts(), false).await?;
                let Some(c_sector) = act.world.sector(uc).await else {
                    warn!(sector = uc, "sector still not cached after visiting");
                    continue;
                };
                if port_can_be_used(act, stores, &c_sector).await?
                    && check_distance(act, other, 5, candidate, uc).await
                {
                    return position_ships(act, current, other, candidate, uc).await;
                }
            }
            info!(candidate, "giving up on primary candidate");
        }

        if !unexplored.is_empty() {
            // Move to a nearby unexplored sector and hunt from there.
            let mut unexplored = unexplored;
            unexplored.shuffle(&mut rand::thread_rng());
            for &u in &unexplored {
                let return_route = act.route_from_to(u, current.sector).await?;
                if return_route.len() <= 6 {
                    act.move_to(u, roam_opts(), false).await?;
                    change_ships(act, current, other).await?;
                    act.move_to(u, roam_opts(), false).await?;
                    current.sector = u;
                    other.sector = u;
                    continue 'outer;
                }
            }
        }

        // We may have wandered while exploring; regroup with the other
        // ship before towing it.
        info!("moving back to the other ship to start towing it");
        other.sector = other_ship_sector(act, other.id).await?;
        act.move_safe(other.sector, false).await?;
        current.sector = other.sector;

        let here = act
            .world
            .sector(current.sector)
            .await
            .ok_or_else(BotError::current_sector_unknown)?;
        let safe = safe_hops(&act.world, &here).await;
        if safe.is_empty() {
            return Err(BotError::action_failed("no safe moves available"));
        }

        let unexplored_hops = stores.warps.trim_explored(&safe).await;
        let unvisited: Vec<u32> = safe
            .iter()
            .copied()
            .filter(|w| !visited.contains(w))
            .collect();

        info!(
            safe = safe.len(),
            unexplored = unexplored_hops.len(),
            unvisited = unvisited.len(),
            "picking the next hop"
        );

        let Some(next) = pick_hop(&safe, &unexplored_hops, &unvisited) else {
            return Err(BotError::action_failed("no safe moves available"));
        };

        // Tow the other ship along.
        act.send(&format!("wn{}\r", other.id));
        act.move_safe(next, false).await?;
        act.send("w");
        current.sector = next;
        other.sector = next;
    }
}

/// Breadth-first search over the persisted map for ports recorded as
/// buying equ, capped at `distance` hops. Also reports the sectors the
/// search could not see past.
async fn find_xxbs(
    act: &Actuator,
    stores: &Stores,
    start: u32,
    distance: u32,
    exclude: &[u32],
) -> Result<(Vec<u32>, Vec<u32>), BotError> {
    let mut xxbs = Vec::new();
    let mut unexplored = Vec::new();
    let mut checked: HashSet<u32> = HashSet::new();
    let mut to_check = vec![start];

    for _ in 0..distance {
        let mut next_to_check = Vec::new();
        for &sector in &to_check {
            if !checked.insert(sector) {
                continue;
            }
            debug!(sector, "checking sector");

            let Some(record) = stores.sectors.get(sector).await else {
                debug!(sector, "not yet explored");
                unexplored.push(sector);
                continue;
            };
            if record.equ == Some(TradeStatus::Buying) {
                if exclude.contains(&sector) {
                    debug!(sector, "excluded");
                } else {
                    debug!(sector, "adding candidate");
                    xxbs.push(sector);
                }
            }

            let warps = match stores.warps.get(sector).await {
                Some(warps) => warps,
                None => {
                    // Maybe holo-scanned but never visited; ask the
                    // computer.
                    act.query_warps(sector, true).await?;
                    match stores.warps.get(sector).await {
                        Some(warps) => warps,
                        None => {
                            unexplored.push(sector);
                            continue;
                        }
                    }
                }
            };
            for warp in warps {
                if !checked.contains(&warp) {
                    next_to_check.push(warp);
                }
            }
        }
        to_check = next_to_check;
    }

    Ok((xxbs, unexplored))
}

#[cfg(test)]
mod tests {
    use warptty_core::event::Event;
    use warptty_core::models::{Port, PortItem, PortReport};

    use super::*;
    use crate::bot::actions::testutil::{drain, harness};
    use crate::world::persist::SectorRecord;

    async fn seeded_stores() -> (Stores, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = Stores::load(dir.path()).await.expect("load");
        (stores, dir)
    }

    fn item(status: TradeStatus, trading: i64, percent: i64) -> PortItem {
        PortItem {
            status,
            trading,
            percent,
        }
    }

    #[tokio::test]
    async fn test_find_xxbs_collects_buyers_and_frontier() {
        let (act, _rx) = harness();
        let (stores, _dir) = seeded_stores().await;

        for (id, class, warps) in [
            (1, "SSB", vec![2, 3]),
            (2, "BBS", vec![1]),
            (3, "BBB", vec![1, 4]),
        ] {
            stores
                .sectors
                .update_if_changed(SectorRecord::from_port_class(id, Some(class)))
                .await
                .expect("seed record");
            stores.warps.add_if_absent(id, warps).await.expect("seed warps");
        }

        let (xxbs, unexplored) = find_xxbs(&act, &stores, 1, 3, &[]).await.expect("search");
        assert_eq!(xxbs, vec![1, 3]);
        assert_eq!(unexplored, vec![4]);
    }

    #[tokio::test]
    async fn test_find_xxbs_honors_exclude() {
        let (act, _rx) = harness();
        let (stores, _dir) = seeded_stores().await;

        stores
            .sectors
            .update_if_changed(SectorRecord::from_port_class(7, Some("SSB")))
            .await
            .expect("seed record");
        stores.warps.add_if_absent(7, vec![]).await.expect("seed warps");

        let (xxbs, _) = find_xxbs(&act, &stores, 7, 2, &[7]).await.expect("search");
        assert!(xxbs.is_empty());
    }

    #[tokio::test]
    async fn test_steal_tops_up_short_port() {
        let (act, mut rx) = harness();
        let broker = act.broker.clone();
        act.world
            .update_status(|status| {
                status.holds = 75;
                status.exp = 1_500;
            })
            .await;

        let script = async {
            tokio::task::yield_now().await;
            broker.publish(&Event::with_num(
                EventKind::PortStealStock,
                EventId::Any,
                60,
            ));
            tokio::task::yield_now().await;
            broker.publish(&Event::new(
                EventKind::StealResult,
                EventId::Crime(CrimeOutcome::Success),
            ));
        };
        let (result, _) = tokio::join!(steal(&act), script);
        // 15 holds short rounds up to a 2-point upgrade; exp caps the
        // steal at 50 holds.
        assert!(!result.expect("steal"));
        assert_eq!(drain(&mut rx), "pr\rs30\ro32\rqpr\rs350\r");
    }

    #[tokio::test]
    async fn test_port_can_be_used_rejects_busted_record() {
        let (act, mut rx) = harness();
        let broker = act.broker.clone();
        let (stores, _dir) = seeded_stores().await;

        stores
            .sectors
            .update_if_changed(SectorRecord::from_port_class(300, Some("SSB")))
            .await
            .expect("seed record");
        stores.sectors.mark_busted(300).await.expect("bust");

        let sector = Sector {
            id: 300,
            port: Some(Port {
                class: "SSB".into(),
                report: Some(PortReport {
                    time: chrono::Utc::now(),
                    fuel: item(TradeStatus::Selling, 2_000, 100),
                    org: item(TradeStatus::Selling, 2_000, 100),
                    equ: item(TradeStatus::Buying, 5_000, 100),
                }),
                ..Port::default()
            }),
            ..Sector::default()
        };
        act.world.upsert_sector(sector.clone()).await;

        let script = async {
            tokio::task::yield_now().await;
            broker.publish(&Event::with_num(
                EventKind::PortReport,
                EventId::Num(300),
                300,
            ));
        };
        let (result, _) = tokio::join!(port_can_be_used(&act, &stores, &sector), script);
        assert!(!result.expect("check port"));
        assert_eq!(drain(&mut rx), "cr300\rq");
    }
}
