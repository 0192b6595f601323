use tracing::{info, warn};
use warptty_core::error::BotError;
use warptty_core::event::{CrimeOutcome, EventId, EventKind};

use crate::bot::actuator::{displaced, Actuator};

/// Rob the port in the current sector once, skipping ports too poor to be
/// worth the bust risk.
pub async fn rob_port(act: Actuator) -> Result<(), BotError> {
    let wait = act
        .broker
        .wait_for(EventKind::PortRobCredits, EventId::Any);
    act.send("d/pr\rr");
    let event = wait.await.ok_or_else(displaced)?;

    let creds = event.num().unwrap_or(0);
    if creds < 700_000 {
        info!(creds, "not enough creds to rob");
        act.send("0\r");
        return Ok(());
    }

    let mut to_rob = (creds as f32 * 1.11) as i64;
    let max = 3 * act.world.status().await.exp;
    if to_rob > max {
        to_rob = max;
    }
    act.send(&format!("{to_rob}\r"));
    Ok(())
}

/// Rob the current port and `other_port` in alternation until a rob gets
/// aborted or busted.
pub async fn rob_pair(act: Actuator, other_port: u32) -> Result<(), BotError> {
    let start_port = act.world.status().await.sector;

    let mut abort_wait = act
        .broker
        .wait_for(EventKind::RobResult, EventId::Crime(CrimeOutcome::Abort));
    let mut busted_wait = act
        .broker
        .wait_for(EventKind::RobResult, EventId::Crime(CrimeOutcome::Busted));

    for i in 0u64.. {
        let mut success_wait = act
            .broker
            .wait_for(EventKind::RobResult, EventId::Crime(CrimeOutcome::Success));
        act.rob().await?;

        tokio::select! {
            _ = &mut abort_wait => return Ok(()),
            _ = &mut busted_wait => return Ok(()),
            _ = &mut success_wait => {
                let dest = if i % 2 == 0 { other_port } else { start_port };
                if let Err(err) = act.move_safe(dest, true).await {
                    warn!(%err, dest, "move between ports failed");
                }
            }
        }
    }
    Ok(())
}
