use std::time::Instant;

use tracing::info;
use warptty_core::error::BotError;
use warptty_core::event::{EventId, EventKind, PromptKind};

use crate::bot::actuator::{displaced, Actuator};

/// Garrison `figs` fighters in every sector adjacent to the current one,
/// boxing in whoever is here.
pub async fn surround(act: Actuator, figs: i64) -> Result<(), BotError> {
    let start = Instant::now();

    // Scan to make sure the neighbors are safe and to get warp counts.
    let scan = act.broker.wait_for(EventKind::DensityScan, EventId::Any);
    act.send("shsd");
    scan.await.ok_or_else(displaced)?;

    let home_id = act.world.status().await.sector;
    let home = act
        .world
        .sector(home_id)
        .await
        .ok_or_else(BotError::current_sector_unknown)?;

    let mut need_figs = Vec::new();
    for &warp in &home.warps {
        let neighbor = act
            .world
            .sector(warp)
            .await
            .ok_or_else(|| BotError::sector_not_cached(warp))?;
        if !neighbor.is_safe() {
            return Err(BotError::unsafe_sector(warp, "hostile forces present"));
        }
        if neighbor.figs < figs {
            need_figs.push(neighbor);
        }
    }

    // Visit the sectors with the most warps first. That gives the opponent
    // being surrounded fewer options for where to run.
    need_figs.sort_by(|a, b| b.warp_count.cmp(&a.warp_count));

    for (i, n) in need_figs.iter().enumerate() {
        let current_id = act.world.status().await.sector;
        let current = act
            .world
            .sector(current_id)
            .await
            .ok_or_else(BotError::current_sector_unknown)?;
        let direct_return = current.warps.contains(&home_id);

        if i == 0 || direct_return {
            let arrival = act
                .broker
                .wait_for(EventKind::SectorDisplay, EventId::Num(n.id));
            let stop = act.broker.wait_for(
                EventKind::PromptDisplay,
                EventId::Prompt(PromptKind::StopInSector),
            );
            if i == 0 {
                act.send(&format!("{}\r", n.id));
            } else {
                act.express(n.id).await;
            }
            tokio::select! {
                _ = arrival => {}
                _ = stop => act.send("\r"),
            }
        } else {
            act.move_safe(n.id, false).await?;
        }
        act.send(&format!("f{figs}\rcd"));
    }
    act.send(&format!("{home_id}\r"));

    info!(elapsed = ?start.elapsed(), "surround done");
    Ok(())
}

/// Collect the garrisons back out of every sector adjacent to the current
/// one.
pub async fn unsurround(act: Actuator) -> Result<(), BotError> {
    let start = Instant::now();

    let home_id = act.world.status().await.sector;
    let scan = act
        .broker
        .wait_for(EventKind::SectorDisplay, EventId::Num(home_id));
    act.send("sh");
    scan.await.ok_or_else(displaced)?;

    let home = act
        .world
        .sector(home_id)
        .await
        .ok_or_else(BotError::current_sector_unknown)?;

    for &warp in &home.warps {
        let neighbor = act
            .world
            .sector(warp)
            .await
            .ok_or_else(|| BotError::sector_not_cached(warp))?;
        if !neighbor.is_safe() {
            return Err(BotError::unsafe_sector(warp, "hostile forces present"));
        }
    }

    for &warp in &home.warps {
        act.move_safe(warp, true).await?;
        act.send("f0\r");
    }
    act.move_safe(home_id, false).await?;

    info!(elapsed = ?start.elapsed(), "unsurround done");
    Ok(())
}
