use tracing::info;
use warptty_core::error::BotError;
use warptty_core::event::{EventId, EventKind, PromptKind};

use crate::bot::actuator::{displaced, Actuator};

/// Wait for fighters to report a hit, then launch a planet into that
/// sector. The planet to drop must already be in the ship's hold.
pub async fn planet_drop(act: Actuator) -> Result<(), BotError> {
    info!("waiting to drop planet");

    let hit = act.broker.wait_for(EventKind::FigHit, EventId::Any);
    let event = hit.await.ok_or_else(displaced)?;
    let sector = event.num().unwrap_or(0);
    act.send(&format!("p{sector}\ry"));

    info!(sector, "planet dropped");
    Ok(())
}

/// Keep a garrison of `figs` fighters in the sector, topped up from the
/// planet we are parked on as it produces more. Must start at a planet
/// prompt.
pub async fn fig_deploy(act: Actuator, figs: i64) -> Result<(), BotError> {
    let mut planet_wait = act
        .broker
        .wait_for(EventKind::PlanetDisplay, EventId::Any);
    let mut prompt_wait = act
        .broker
        .wait_for(EventKind::PromptDisplay, EventId::Any);
    act.send("\r");

    let planet_id = loop {
        tokio::select! {
            e = &mut planet_wait => {
                let e = e.ok_or_else(displaced)?;
                break e.num().unwrap_or(0) as u32;
            }
            e = &mut prompt_wait => {
                let e = e.ok_or_else(displaced)?;
                if e.id != EventId::Prompt(PromptKind::Planet) {
                    return Err(BotError::action_failed(
                        "must be at a planet prompt to deploy fighters",
                    ));
                }
                prompt_wait = act
                    .broker
                    .wait_for(EventKind::PromptDisplay, EventId::Any);
            }
        }
    };

    act.world
        .planet(planet_id)
        .await
        .ok_or_else(|| BotError::planet_not_cached(planet_id))?;

    // Load the ship up with figs and get quick stats so the ship's own
    // count is known.
    act.send("m\r\r\r");
    act.quick_stats().await?;

    loop {
        let wait = act.broker.wait_for(EventKind::FigDeploy, EventId::Any);
        act.send("qf");
        let available = wait.await.ok_or_else(displaced)?.num().unwrap_or(0);

        let on_ship = act.world.status().await.figs;
        if available - on_ship > figs {
            // This command does not un-deploy figs. Leave the garrison as
            // it is and bail out.
            act.send(&format!("{}\rcd", available - on_ship));
            act.land(planet_id);
            return Err(BotError::action_failed(
                "sector already has more figs than desired",
            ));
        }
        act.send(&format!("{}\rcd", available.min(figs)));
        act.land(planet_id);

        if available >= figs {
            // Load the ship back up with figs.
            act.send("m\r\r\r");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use warptty_core::event::Event;
    use warptty_core::models::Planet;

    use super::*;
    use crate::bot::actions::testutil::{drain, harness};

    #[tokio::test]
    async fn test_fig_deploy_rejects_overfull_sector() {
        let (act, mut rx) = harness();
        let broker = act.broker.clone();
        act.world
            .upsert_planet(Planet {
                id: 7,
                name: "Homeworld".into(),
                sector: 100,
                ..Planet::default()
            })
            .await;
        act.world.update_status(|status| status.figs = 100).await;

        let script = async {
            tokio::task::yield_now().await;
            broker.publish(&Event::with_num(
                EventKind::PlanetDisplay,
                EventId::Num(7),
                7,
            ));
            tokio::task::yield_now().await;
            broker.publish(&Event::new(EventKind::QuickStats, EventId::Any));
            tokio::task::yield_now().await;
            broker.publish(&Event::with_num(EventKind::FigDeploy, EventId::Any, 600));
        };
        let (result, _) = tokio::join!(biased; fig_deploy(act, 200), script);
        assert!(result.is_err());
        assert_eq!(drain(&mut rx), "\rm\r\r\r/qf500\rcdl7\r");
    }

    #[tokio::test]
    async fn test_fig_deploy_needs_planet_prompt() {
        let (act, mut rx) = harness();
        let broker = act.broker.clone();

        let script = async {
            tokio::task::yield_now().await;
            broker.publish(&Event::new(
                EventKind::PromptDisplay,
                EventId::Prompt(PromptKind::Command),
            ));
        };
        let (result, _) = tokio::join!(fig_deploy(act, 200), script);
        assert!(result.is_err());
        assert_eq!(drain(&mut rx), "\r");
    }
}
