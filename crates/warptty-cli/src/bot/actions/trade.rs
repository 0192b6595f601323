use std::collections::HashSet;

use tracing::{debug, info, warn};
use warptty_core::error::BotError;
use warptty_core::event::{EventId, EventKind, PromptKind};
use warptty_core::models::{PortItem, Sector, TradeStatus};

use crate::bot::actions::{pick_hop, report_of, roam_opts, safe_hops};
use crate::bot::actuator::{displaced, Actuator, MoveOpts};
use crate::world::persist::{SectorRecord, Stores};

/// What to buy where for one pair of adjacent ports. A zero sector means
/// the product is not part of the plan.
#[derive(Debug, Default)]
struct TradePlan {
    buy_equ_from: u32,
    buy_org_from: u32,
    buy_fuel_from: u32,
    num_trades: i64,
    score: i64,
}

/// Roam space looking for pairs of adjacent ports with complementary
/// trade profiles, and trade each pair it finds until the ports run dry.
pub async fn pair_trade(act: Actuator, stores: Stores) -> Result<(), BotError> {
    // Start with empty holds.
    act.send("jy");
    let mut current_id = act.world.status().await.sector;
    let mut visited: HashSet<u32> = HashSet::new();

    loop {
        let scan = act
            .broker
            .wait_for(EventKind::SectorDisplay, EventId::Num(current_id));
        act.send("sh");
        scan.await.ok_or_else(displaced)?;
        visited.insert(current_id);

        let sector = act
            .world
            .sector(current_id)
            .await
            .ok_or_else(|| BotError::sector_not_cached(current_id))?;

        if sector.port.is_some() {
            info!(sector = current_id, "considering port");
            let report_wait = act.broker.wait_for(EventKind::PortReport, EventId::Any);
            act.send("cr\rq");
            report_wait.await.ok_or_else(displaced)?;

            let sector = act
                .world
                .sector(current_id)
                .await
                .ok_or_else(|| BotError::sector_not_cached(current_id))?;
            if sector.port.is_none() {
                return Err(BotError::action_failed("current sector's port disappeared"));
            }
            let saved = stores.sectors.get(current_id).await.ok_or_else(|| {
                BotError::action_failed(format!("no stored record for sector {current_id}"))
            })?;

            if can_consider_port(&sector, &saved) {
                let holds = act.world.status().await.holds;
                let mut plans: Vec<(Sector, TradePlan)> = Vec::new();

                for &warp in &sector.warps {
                    let neighbor = act
                        .world
                        .sector(warp)
                        .await
                        .ok_or_else(|| BotError::sector_not_cached(warp))?;
                    if neighbor.port.is_none() || !neighbor.is_safe() {
                        continue;
                    }
                    let saved_neighbor = stores.sectors.get(warp).await.ok_or_else(|| {
                        BotError::action_failed(format!("no stored record for sector {warp}"))
                    })?;

                    if stores.warps.get(warp).await.is_none() {
                        act.query_warps(warp, true).await?;
                        if stores.warps.get(warp).await.is_none() {
                            return Err(BotError::action_failed(format!(
                                "failed to query warps for sector {warp}"
                            )));
                        }
                    }
                    if !stores.warps.exists(warp, current_id).await {
                        info!(neighbor = warp, "return warp does not exist");
                        continue;
                    }

                    let report_wait = act
                        .broker
                        .wait_for(EventKind::PortReport, EventId::Num(warp));
                    act.send(&format!("cr{warp}\rq"));
                    report_wait.await.ok_or_else(displaced)?;

                    let neighbor = act
                        .world
                        .sector(warp)
                        .await
                        .ok_or_else(|| BotError::sector_not_cached(warp))?;
                    if !can_consider_port(&neighbor, &saved_neighbor) {
                        continue;
                    }
                    if let Some(plan) = create_trade_plan(holds, &sector, &neighbor) {
                        plans.push((neighbor, plan));
                    }
                }

                for (neighbor, plan) in &plans {
                    info!(neighbor = neighbor.id, score = plan.score, "trade plan");
                }
                if let Some((neighbor, plan)) = plans
                    .into_iter()
                    .reduce(|best, cand| if cand.1.score > best.1.score { cand } else { best })
                {
                    debug!(?plan, "chosen plan");
                    trade(&act, &plan, &sector, &neighbor).await?;
                    info!("done trading pair");
                }
            }
        }

        // Roam on. The reports above may have refreshed the sector.
        let here = act
            .world
            .sector(current_id)
            .await
            .ok_or_else(|| BotError::sector_not_cached(current_id))?;
        let safe = safe_hops(&act.world, &here).await;
        if safe.is_empty() {
            info!("no safe moves available");
            return Ok(());
        }
        let unexplored = stores.warps.trim_explored(&safe).await;
        let unvisited: Vec<u32> = safe
            .iter()
            .copied()
            .filter(|w| !visited.contains(w))
            .collect();

        info!(
            safe = safe.len(),
            unexplored = unexplored.len(),
            unvisited = unvisited.len(),
            "picking the next hop"
        );
        let Some(next) = pick_hop(&safe, &unexplored, &unvisited) else {
            info!("no safe moves available");
            return Ok(());
        };
        if let Err(err) = act.move_to(next, roam_opts(), false).await {
            warn!(%err, next, "roaming move failed");
            return Ok(());
        }
        current_id = next;
    }
}

/// Whether a port is worth planning around: full prices, modest stock,
/// and no bust on record.
fn can_consider_port(sector: &Sector, saved: &SectorRecord) -> bool {
    let Some(report) = report_of(sector) else {
        return false;
    };
    if report.equ.percent < 80 || report.org.percent < 80 {
        return false;
    }
    if report.equ.trading > 10_000 || report.org.trading > 10_000 {
        return false;
    }
    saved.busted.is_none()
}

/// Plan a pair trade between two adjacent ports. Prefers equ, then org,
/// then fuel; a pair not worth at least an equ run or an org and fuel run
/// gets no plan.
fn create_trade_plan(holds: i64, a: &Sector, b: &Sector) -> Option<TradePlan> {
    let a_rep = report_of(a)?;
    let b_rep = report_of(b)?;

    let mut plan = TradePlan::default();
    if a_rep.equ.status != b_rep.equ.status {
        if a_rep.equ.status == TradeStatus::Selling {
            plan.buy_equ_from = a.id;
            check_org_fuel(&mut plan, b, a);
        } else {
            plan.buy_equ_from = b.id;
            check_org_fuel(&mut plan, a, b);
        }
    } else {
        check_just_org_fuel(&mut plan, a, b);
    }

    if plan.buy_equ_from != 0 {
        plan.score += 1000;
    }
    if plan.buy_org_from != 0 {
        plan.score += 500;
    }
    if plan.buy_fuel_from != 0 {
        plan.score += 300;
    }
    if plan.score < 800 {
        return None;
    }

    let mut max_trades = i64::MAX;
    if plan.buy_equ_from != 0 {
        max_trades = max_trades.min(max_trades_for(&a_rep.equ, &b_rep.equ, holds));
    }
    if plan.buy_org_from != 0 {
        max_trades = max_trades.min(max_trades_for(&a_rep.org, &b_rep.org, holds));
    }
    if plan.buy_fuel_from != 0 {
        max_trades = max_trades.min(max_trades_for(&a_rep.fuel, &b_rep.fuel, holds));
    }
    // Each trade has two legs, one at each port.
    plan.num_trades = max_trades * 2;

    Some(plan)
}

/// How many full-holds runs a product supports before the pair drops off
/// full price.
fn max_trades_for(a: &PortItem, b: &PortItem, holds: i64) -> i64 {
    let limit = a.trading.min(b.trading);
    (limit as f64 * 0.8 / holds as f64) as i64
}

/// With equ spoken for, pick one backhaul product bought from `from` and
/// sold at `to`.
fn check_org_fuel(plan: &mut TradePlan, from: &Sector, to: &Sector) {
    let (Some(from_rep), Some(to_rep)) = (report_of(from), report_of(to)) else {
        return;
    };
    if from_rep.org.status != to_rep.org.status && from_rep.org.status == TradeStatus::Selling {
        plan.buy_org_from = from.id;
        return;
    }
    if from_rep.fuel.status != to_rep.fuel.status && from_rep.fuel.status == TradeStatus::Selling {
        plan.buy_fuel_from = from.id;
    }
}

/// No equ trade possible; an org and fuel pair still pays if the two run
/// in opposite directions.
fn check_just_org_fuel(plan: &mut TradePlan, a: &Sector, b: &Sector) {
    let (Some(a_rep), Some(b_rep)) = (report_of(a), report_of(b)) else {
        return;
    };
    if a_rep.org.status == b_rep.org.status {
        return;
    }
    if a_rep.fuel.status == b_rep.fuel.status {
        return;
    }
    if a_rep.org.status == a_rep.fuel.status {
        return;
    }
    if a_rep.org.status == TradeStatus::Selling {
        plan.buy_org_from = a.id;
        plan.buy_fuel_from = b.id;
    } else {
        plan.buy_org_from = b.id;
        plan.buy_fuel_from = a.id;
    }
}

/// Shuttle between the two ports, docking at each until the plan's trades
/// are spent.
async fn trade(
    act: &Actuator,
    plan: &TradePlan,
    a: &Sector,
    b: &Sector,
) -> Result<(), BotError> {
    let mut current = a;
    let mut next = b;

    for i in 0..plan.num_trades {
        if i > 0 {
            act.move_to(
                next.id,
                MoveOpts {
                    drop_figs: 1,
                    ..MoveOpts::default()
                },
                false,
            )
            .await?;
            std::mem::swap(&mut current, &mut next);
        }

        // Nothing to buy at the first port means the run starts across
        // the warp.
        if i == 0
            && plan.buy_equ_from != current.id
            && plan.buy_org_from != current.id
            && plan.buy_fuel_from != current.id
        {
            continue;
        }

        let last_time = i + 1 == plan.num_trades;
        port(act, plan, current, last_time).await?;
    }
    Ok(())
}

/// Dock once: sell whatever is in the holds, then answer the buy dialog
/// per the plan.
async fn port(
    act: &Actuator,
    plan: &TradePlan,
    sector: &Sector,
    last_time: bool,
) -> Result<(), BotError> {
    loop {
        let sell_prompt = act
            .broker
            .wait_for(EventKind::PromptDisplay, EventId::Prompt(PromptKind::Sell));
        let buy_first = act
            .broker
            .wait_for(EventKind::PromptDisplay, EventId::Prompt(PromptKind::Buy));
        act.send("pt");

        tokio::select! {
            e = sell_prompt => {
                e.ok_or_else(displaced)?;
                let not_interested = act
                    .broker
                    .wait_for(EventKind::PortNotInterested, EventId::Any);
                let command_prompt = act.broker.wait_for(
                    EventKind::PromptDisplay,
                    EventId::Prompt(PromptKind::Command),
                );
                let buy_after = act
                    .broker
                    .wait_for(EventKind::PromptDisplay, EventId::Prompt(PromptKind::Buy));
                // Sell everything.
                act.send("\r");

                tokio::select! {
                    e = not_interested => {
                        e.ok_or_else(displaced)?;
                        // TODO this seems to fire when the port would rather
                        // buy a product the holds don't carry; dock again
                        // for now.
                    }
                    e = command_prompt => {
                        e.ok_or_else(displaced)?;
                        return Ok(());
                    }
                    e = buy_after => {
                        e.ok_or_else(displaced)?;
                        if last_time {
                            info!("done trading this pair");
                            send_buy0(act, sector);
                            return Ok(());
                        }
                        if !buy(act, plan, sector).await? {
                            return Ok(());
                        }
                    }
                }
            }
            e = buy_first => {
                e.ok_or_else(displaced)?;
                info!("got buy prompt right away");
                if last_time {
                    info!("done trading this pair");
                    send_buy0(act, sector);
                    return Ok(());
                }
                if !buy(act, plan, sector).await? {
                    return Ok(());
                }
            }
        }
    }
}

/// Decline everything the port offers to sell.
fn send_buy0(act: &Actuator, sector: &Sector) {
    let Some(report) = report_of(sector) else {
        warn!(sector = sector.id, "no report while declining a buy; guessing");
        act.send("0\r0\r0\r");
        return;
    };
    for item in [&report.fuel, &report.org, &report.equ] {
        if item.status == TradeStatus::Selling {
            act.send("0\r");
        }
    }
}

/// Answer the buy dialog, accepting the planned product and declining the
/// rest. Returns true when the port broke off and docking should restart.
async fn buy(act: &Actuator, plan: &TradePlan, sector: &Sector) -> Result<bool, BotError> {
    let report = report_of(sector)
        .ok_or_else(|| BotError::port_unusable(sector.id, "missing report"))?;

    // The dialog asks about fuel, then org, then equ, skipping products
    // the port does not sell. Buying a product fills the holds so the
    // questions after it never come.
    let mut output = String::new();
    if plan.buy_fuel_from == sector.id {
        output.push('\r');
    } else if plan.buy_org_from == sector.id {
        if report.fuel.status == TradeStatus::Selling {
            output.push_str("0\r");
        }
        output.push('\r');
    } else if plan.buy_equ_from == sector.id {
        if report.fuel.status == TradeStatus::Selling {
            output.push_str("0\r");
        }
        if report.org.status == TradeStatus::Selling {
            output.push_str("0\r");
        }
        output.push('\r');
    } else {
        for item in [&report.fuel, &report.org, &report.equ] {
            if item.status == TradeStatus::Selling {
                output.push_str("0\r");
            }
        }
    }

    let command_prompt = act.broker.wait_for(
        EventKind::PromptDisplay,
        EventId::Prompt(PromptKind::Command),
    );
    let not_interested = act
        .broker
        .wait_for(EventKind::PortNotInterested, EventId::Any);
    act.send(&output);

    tokio::select! {
        e = command_prompt => {
            e.ok_or_else(displaced)?;
            Ok(false)
        }
        e = not_interested => {
            e.ok_or_else(displaced)?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use warptty_core::event::Event;
    use warptty_core::models::{Port, PortReport};

    use super::*;
    use crate::bot::actions::testutil::{drain, harness};

    fn item(status: TradeStatus, trading: i64) -> PortItem {
        PortItem {
            status,
            trading,
            percent: 100,
        }
    }

    fn trade_sector(id: u32, fuel: PortItem, org: PortItem, equ: PortItem) -> Sector {
        Sector {
            id,
            port: Some(Port {
                class: "???".into(),
                report: Some(PortReport {
                    time: Utc::now(),
                    fuel,
                    org,
                    equ,
                }),
                ..Port::default()
            }),
            ..Sector::default()
        }
    }

    use TradeStatus::{Buying, Selling};

    #[test]
    fn test_plan_equ_only() {
        let a = trade_sector(10, item(Buying, 500), item(Buying, 500), item(Selling, 1_000));
        let b = trade_sector(11, item(Buying, 500), item(Buying, 500), item(Buying, 800));

        let plan = create_trade_plan(50, &a, &b).expect("plan");
        assert_eq!(plan.buy_equ_from, 10);
        assert_eq!(plan.buy_org_from, 0);
        assert_eq!(plan.buy_fuel_from, 0);
        assert_eq!(plan.score, 1000);
        // 800 * 0.8 / 50 holds = 12 runs, two legs each.
        assert_eq!(plan.num_trades, 24);
    }

    #[test]
    fn test_plan_equ_with_org_backhaul() {
        let a = trade_sector(10, item(Buying, 500), item(Buying, 900), item(Selling, 1_000));
        let b = trade_sector(11, item(Buying, 500), item(Selling, 600), item(Buying, 800));

        let plan = create_trade_plan(50, &a, &b).expect("plan");
        assert_eq!(plan.buy_equ_from, 10);
        assert_eq!(plan.buy_org_from, 11);
        assert_eq!(plan.score, 1500);
        // org is the tighter product: 600 * 0.8 / 50 = 9 runs.
        assert_eq!(plan.num_trades, 18);
    }

    #[test]
    fn test_plan_org_fuel_pair() {
        let a = trade_sector(10, item(Buying, 700), item(Selling, 900), item(Buying, 500));
        let b = trade_sector(11, item(Selling, 700), item(Buying, 900), item(Buying, 500));

        let plan = create_trade_plan(50, &a, &b).expect("plan");
        assert_eq!(plan.buy_equ_from, 0);
        assert_eq!(plan.buy_org_from, 10);
        assert_eq!(plan.buy_fuel_from, 11);
        assert_eq!(plan.score, 800);
    }

    #[test]
    fn test_plan_rejects_dead_pair() {
        let a = trade_sector(10, item(Selling, 700), item(Buying, 900), item(Buying, 500));
        let b = trade_sector(11, item(Selling, 700), item(Buying, 900), item(Buying, 500));

        assert!(create_trade_plan(50, &a, &b).is_none());
    }

    #[test]
    fn test_consider_port_boundaries() {
        let record = SectorRecord::from_port_class(10, Some("BBS"));
        let good = trade_sector(10, item(Selling, 700), item(Selling, 900), item(Buying, 500));
        assert!(can_consider_port(&good, &record));

        let mut cheap = good.clone();
        if let Some(report) = cheap.port.as_mut().and_then(|p| p.report.as_mut()) {
            report.equ.percent = 79;
        }
        assert!(!can_consider_port(&cheap, &record));

        let mut big = good.clone();
        if let Some(report) = big.port.as_mut().and_then(|p| p.report.as_mut()) {
            report.org.trading = 10_001;
        }
        assert!(!can_consider_port(&big, &record));

        let mut busted = record.clone();
        busted.busted = Some(Utc::now());
        assert!(!can_consider_port(&good, &busted));

        let bare = Sector {
            id: 10,
            ..Sector::default()
        };
        assert!(!can_consider_port(&bare, &record));
    }

    #[tokio::test]
    async fn test_buy_declines_everything_not_planned() {
        let (act, mut rx) = harness();
        let broker = act.broker.clone();
        let sector = trade_sector(5, item(Selling, 700), item(Selling, 900), item(Buying, 500));
        let plan = TradePlan {
            buy_org_from: 5,
            ..TradePlan::default()
        };

        let script = async {
            tokio::task::yield_now().await;
            broker.publish(&Event::new(
                EventKind::PromptDisplay,
                EventId::Prompt(PromptKind::Command),
            ));
        };
        let (result, _) = tokio::join!(buy(&act, &plan, &sector), script);
        assert!(!result.expect("buy"));
        // Decline fuel, accept the default org amount.
        assert_eq!(drain(&mut rx), "0\r\r");
    }

    #[tokio::test]
    async fn test_send_buy0_declines_each_offer() {
        let (act, mut rx) = harness();
        let sector = trade_sector(5, item(Selling, 700), item(Selling, 900), item(Buying, 500));
        send_buy0(&act, &sector);
        assert_eq!(drain(&mut rx), "0\r0\r");

        let bare = Sector {
            id: 6,
            ..Sector::default()
        };
        send_buy0(&act, &bare);
        assert_eq!(drain(&mut rx), "0\r0\r0\r");
    }
}
