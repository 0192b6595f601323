use std::collections::{HashMap, HashSet};

use tracing::info;
use warptty_core::error::BotError;
use warptty_core::event::{EventId, EventKind, PromptKind};
use warptty_core::models::{Planet, Product, TradeStatus};

use crate::bot::actuator::{displaced, Actuator};

/// A port buys product in lots of this size from a planet in its sector.
const PORT_LOT: i64 = 32_760;

/// Sell one product from the planet we are at to the port in its sector,
/// negotiating through the sub-bot.
pub async fn planet_trade(act: Actuator, planet_id: u32, product: Product) -> Result<(), BotError> {
    // Figure out where we are. A bare carriage return redraws whatever
    // display we are sitting at.
    let planet_wait = act
        .broker
        .wait_for(EventKind::PlanetDisplay, EventId::Any);
    let sector_wait = act
        .broker
        .wait_for(EventKind::SectorDisplay, EventId::Any);
    let citadel_wait = act.broker.wait_for(
        EventKind::PromptDisplay,
        EventId::Prompt(PromptKind::Citadel),
    );
    act.send("\r");

    tokio::select! {
        e = planet_wait => {
            let e = e.ok_or_else(displaced)?;
            let here = e.num().unwrap_or(0) as u32;
            if planet_id != 0 && planet_id != here {
                act.send("q");
                act.land(planet_id);
            }
        }
        _ = sector_wait => act.land(planet_id),
        _ = citadel_wait => act.send("q"),
    }

    act.mombot_planet_sell(product).await
}

/// Walk a route through `points` and at every port along the way that is
/// paying full price for org, land on the best-stocked corp planet and
/// sell.
pub async fn route_trade(act: Actuator, points: Vec<u32>) -> Result<(), BotError> {
    // Refresh the corp planet list.
    let list = act
        .broker
        .wait_for(EventKind::CorpPlanetList, EventId::Any);
    act.send("tlq");
    list.await.ok_or_else(displaced)?;

    let mut completed = HashSet::new();

    let mut planets_by_sector: HashMap<u32, Vec<Planet>> = HashMap::new();
    for planet in act.world.planets().await {
        planets_by_sector.entry(planet.sector).or_default().push(planet);
    }

    for point in points {
        let route = act.route_to(point).await?;

        for (i, &sector_id) in route.iter().enumerate() {
            if i > 0 {
                act.move_safe(sector_id, false).await?;
            }

            if !completed.insert(sector_id) {
                info!(sector = sector_id, "skipping sector we already visited");
                continue;
            }

            let sector = act
                .world
                .sector(sector_id)
                .await
                .ok_or_else(|| BotError::sector_not_cached(sector_id))?;
            if sector.port.is_none() {
                info!(sector = sector_id, "skipping sector without a port");
                continue;
            }

            let prompt = act.broker.wait_for(
                EventKind::PromptDisplay,
                EventId::Prompt(PromptKind::Command),
            );
            let report_wait = act.broker.wait_for(EventKind::PortReport, EventId::Any);
            act.send("cr\rq");
            report_wait.await.ok_or_else(displaced)?;

            // Make sure the command prompt is back before proceeding.
            // Keystrokes sent before it returns can get swallowed.
            prompt.await.ok_or_else(displaced)?;

            // Re-fetch the sector to pick up the fresh port report.
            let sector = act
                .world
                .sector(sector_id)
                .await
                .ok_or_else(|| BotError::sector_not_cached(sector_id))?;
            let report = match sector.port.as_ref().and_then(|p| p.report.as_ref()) {
                Some(report) => report,
                None => {
                    return Err(BotError::action_failed(format!(
                        "no port report for sector {sector_id}"
                    )))
                }
            };

            if report.org.status == TradeStatus::Selling {
                info!(sector = sector_id, "skipping port that doesn't buy org");
                continue;
            }
            if report.org.percent != 100 {
                info!(
                    sector = sector_id,
                    percent = report.org.percent,
                    "skipping port below full price"
                );
                continue;
            }

            let candidates = planets_by_sector
                .get(&sector_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let Some(planet) = choose_planet(report.org.trading, candidates) else {
                info!(sector = sector_id, "no suitable planet");
                continue;
            };
            info!(planet = planet.id, sector = sector_id, "chose planet");

            let prompt = act.broker.wait_for(
                EventKind::PromptDisplay,
                EventId::Prompt(PromptKind::Planet),
            );
            act.land(planet.id);
            prompt.await.ok_or_else(displaced)?;

            act.mombot_planet_sell(Product::Org).await?;

            // Lift off.
            act.send("q");
        }
    }
    Ok(())
}

/// The planet with the most org among those stocked to cover what the
/// port is buying.
fn choose_planet(trading: i64, planets: &[Planet]) -> Option<&Planet> {
    let mut choice: Option<&Planet> = None;
    for planet in planets {
        let org = planet.summary.map(|s| s.org).unwrap_or(0);
        if org < trading {
            continue;
        }
        if let Some(best) = choice {
            if best.summary.map(|s| s.org).unwrap_or(0) >= org {
                continue;
            }
        }
        choice = Some(planet);
    }
    choice
}

/// Warp the planet we are parked on through `points`, selling a port lot
/// of org and equ at each stop, until the planet runs low.
pub async fn warp_sell(act: Actuator, points: Vec<u32>) -> Result<(), BotError> {
    let display = act
        .broker
        .wait_for(EventKind::PlanetDisplay, EventId::Any);
    act.send("d");
    let event = display.await.ok_or_else(displaced)?;
    let planet_id = event.num().unwrap_or(0) as u32;

    let planet = act
        .world
        .planet(planet_id)
        .await
        .ok_or_else(|| BotError::planet_not_cached(planet_id))?;
    let mut org = planet.org;
    let mut equ = planet.equ;

    for point in points {
        if org < PORT_LOT || equ < PORT_LOT {
            info!(org, equ, "done; planet is low on product");
            return Ok(());
        }

        let warped = act
            .broker
            .wait_for(EventKind::PlanetWarpComplete, EventId::Any);
        act.send(&format!("cp{point}\ryq"));
        warped.await.ok_or_else(displaced)?;

        act.mombot_planet_sell(Product::Org).await?;
        org -= PORT_LOT;
        act.mombot_planet_sell(Product::Equ).await?;
        equ -= PORT_LOT;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use warptty_core::event::Event;
    use warptty_core::models::PlanetSummary;

    use super::*;
    use crate::bot::actions::testutil::{drain, harness};

    fn planet_with_org(id: u32, org: i64) -> Planet {
        Planet {
            id,
            sector: 100,
            summary: Some(PlanetSummary {
                org,
                ..PlanetSummary::default()
            }),
            ..Planet::default()
        }
    }

    #[test]
    fn test_choose_planet_prefers_most_org() {
        let planets = vec![
            planet_with_org(1, 5_000),
            planet_with_org(2, 40_000),
            planet_with_org(3, 20_000),
        ];
        let choice = choose_planet(10_000, &planets);
        assert_eq!(choice.map(|p| p.id), Some(2));
    }

    #[test]
    fn test_choose_planet_skips_understocked() {
        let planets = vec![planet_with_org(1, 5_000)];
        assert!(choose_planet(10_000, &planets).is_none());
        assert!(choose_planet(10_000, &[]).is_none());
    }

    #[test]
    fn test_choose_planet_tie_keeps_first() {
        let planets = vec![planet_with_org(1, 20_000), planet_with_org(2, 20_000)];
        let choice = choose_planet(10_000, &planets);
        assert_eq!(choice.map(|p| p.id), Some(1));
    }

    #[tokio::test]
    async fn test_warp_sell_stops_when_low() {
        let (act, mut rx) = harness();
        let broker = act.broker.clone();
        act.world
            .upsert_planet(Planet {
                id: 4,
                org: 10_000,
                equ: 50_000,
                ..Planet::default()
            })
            .await;

        let script = async {
            tokio::task::yield_now().await;
            broker.publish(&Event::with_num(
                EventKind::PlanetDisplay,
                EventId::Num(4),
                4,
            ));
        };
        let (result, _) = tokio::join!(warp_sell(act, vec![200, 300]), script);
        assert!(result.is_ok());
        // Low org means no warps get attempted at all.
        assert_eq!(drain(&mut rx), "d");
    }
}
