use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;
use warptty_core::error::BotError;
use warptty_core::event::{EventId, EventKind};

use crate::bot::actuator::{displaced, Actuator};

/// Fire genesis torpedoes until every class on the shopping list exists.
/// Planets of unwanted classes get destroyed as they appear.
pub async fn create_planets(act: Actuator, classes: Vec<(char, u32)>) -> Result<(), BotError> {
    act.quick_stats().await?;

    let mut remaining = classes;
    while !remaining.is_empty() {
        let status = act.world.status().await;
        if status.gtorps == 0 || status.atmdts == 0 {
            replenish(&act).await?;
        }

        let wait = act.broker.wait_for(EventKind::PlanetCreate, EventId::Any);
        act.send("uy");
        act.world.update_status(|status| status.gtorps -= 1).await;

        let event = wait.await.ok_or_else(displaced)?;
        let EventId::Class(class) = event.id else {
            return Err(BotError::parse_failed("planet create event without a class"));
        };

        match remaining.iter().position(|(c, _)| *c == class) {
            None => {
                // Not a class we want. Destroy it.
                act.send("x\rc");
                act.land_newest().await?;
                act.send("zdy");
                act.world.update_status(|status| status.atmdts -= 1).await;
            }
            Some(i) => {
                act.send("x\rc");
                remaining[i].1 -= 1;
                if remaining[i].1 == 0 {
                    remaining.remove(i);
                }
            }
        }
    }
    Ok(())
}

async fn replenish(act: &Actuator) -> Result<(), BotError> {
    let sector = act.world.status().await.sector;
    act.go_to_stardock().await?;
    act.buy_hardware().await?;
    // Ask for quick stats so the replenished counts get folded in.
    act.send("/");
    act.twarp(sector).await
}

/// Create throwaway planets one at a time, strip each one's population
/// onto planet `to_id`, and destroy the husk. Runs until the torpedoes or
/// detonators run out.
pub async fn strip_bulk(act: Actuator, to_id: u32) -> Result<(), BotError> {
    act.quick_stats().await?;

    loop {
        if act.world.status().await.gtorps == 0 {
            return Ok(());
        }

        let wait = act.broker.wait_for(EventKind::PlanetCreate, EventId::Any);
        act.send("uy");
        act.world.update_status(|status| status.gtorps -= 1).await;
        wait.await.ok_or_else(displaced)?;

        act.send("x\rc");

        let display = act
            .broker
            .wait_for(EventKind::PlanetDisplay, EventId::Any);
        act.land_newest().await?;
        let from_id = display.await.ok_or_else(displaced)?.num().unwrap_or(0) as u32;
        act.send("q");
        sleep(Duration::from_secs(1)).await;
        act.strip_planet(from_id, to_id).await?;

        let status = act.world.status().await;
        if status.gtorps == 0 || status.atmdts == 0 {
            return Ok(());
        }
        act.send("zdy");
        act.world.update_status(|status| status.atmdts -= 1).await;

        // Pacing; a burst of planet commands has destabilized the game
        // server before.
        sleep(Duration::from_secs(4)).await;
    }
}

/// Transwarp along `points` and run the planet upgrade macro at each stop.
pub async fn upgrade_route(act: Actuator, points: Vec<u32>) -> Result<(), BotError> {
    let walker = act.clone();
    act.route_walk(&points, move || {
        let act = walker.clone();
        async move {
            if let Err(err) = act.mass_upgrade(true).await {
                warn!(%err, "mass upgrade failed");
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use warptty_core::event::{Event, Payload};

    use super::*;
    use crate::bot::actions::testutil::{drain, harness};

    #[tokio::test]
    async fn test_create_planets_destroys_unwanted_class() {
        let (act, mut rx) = harness();
        let broker = act.broker.clone();
        act.world
            .update_status(|status| {
                status.gtorps = 5;
                status.atmdts = 5;
            })
            .await;

        let script = async {
            tokio::task::yield_now().await;
            broker.publish(&Event::new(EventKind::QuickStats, EventId::Any));
            tokio::task::yield_now().await;
            broker.publish(&Event::new(EventKind::PlanetCreate, EventId::Class('M')));
            tokio::task::yield_now().await;
            broker.publish(&Event {
                kind: EventKind::PlanetLanding,
                id: EventId::Any,
                payload: Payload::Nums(vec![3, 9]),
            });
            tokio::task::yield_now().await;
            broker.publish(&Event::new(EventKind::PlanetCreate, EventId::Class('L')));
        };
        let (result, _) = tokio::join!(biased; create_planets(act.clone(), vec![('L', 1)]), script);
        assert!(result.is_ok());
        assert_eq!(drain(&mut rx), "/uyx\rcl9\rzdyuyx\rc");

        let status = act.world.status().await;
        assert_eq!(status.gtorps, 3);
        assert_eq!(status.atmdts, 4);
    }
}
