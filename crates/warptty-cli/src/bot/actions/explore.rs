use tracing::info;
use warptty_core::error::BotError;

use crate::bot::actuator::Actuator;

/// Visit every sector from `start` up through the top of the map, scanning
/// ahead and skipping nothing. Useful early in a game to fill the warp
/// cache.
pub async fn explore(act: Actuator, start: u32) -> Result<(), BotError> {
    for sector in start..=20_000 {
        info!(sector, "exploring");
        act.move_safe(sector, true).await?;
    }
    info!("done exploring");
    Ok(())
}
