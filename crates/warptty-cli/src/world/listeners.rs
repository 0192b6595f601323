//! Background listeners that keep the persistent stores current.

use tokio::task::JoinHandle;
use tracing::warn;
use warptty_core::event::EventKind;

use crate::bot::broker::Broker;
use crate::world::persist::{SectorRecord, Stores};
use crate::world::World;

/// Subscribe the write-through listeners. The returned handles live as
/// long as the session; dropping the broker ends them.
pub fn spawn(broker: &Broker, world: World, stores: Stores) -> Vec<JoinHandle<()>> {
    let mut busts = broker.subscribe(EventKind::Busted);
    let bust_stores = stores.clone();
    let bust_task = tokio::spawn(async move {
        while let Some(event) = busts.recv().await {
            let Some(sector) = event.num().filter(|n| *n > 0) else {
                warn!("bust event without a sector");
                continue;
            };
            if let Err(err) = bust_stores.sectors.mark_busted(sector as u32).await {
                warn!(sector, error = %err, "failed to record bust");
            }
        }
    });

    let mut displays = broker.subscribe(EventKind::SectorDisplay);
    let sector_task = tokio::spawn(async move {
        while let Some(event) = displays.recv().await {
            let Some(id) = event.num().filter(|n| *n > 0) else {
                warn!("sector event without a sector");
                continue;
            };
            let id = id as u32;
            let Some(sector) = world.sector(id).await else {
                continue;
            };

            if !sector.warps.is_empty() {
                if let Err(err) = stores.warps.add_if_absent(id, sector.warps.clone()).await {
                    warn!(sector = id, error = %err, "failed to record warps");
                }
            }

            let class = sector
                .port
                .as_ref()
                .map(|p| p.class.as_str())
                .filter(|c| c.len() == 3);
            let record = SectorRecord::from_port_class(id, class);
            if let Err(err) = stores.sectors.update_if_changed(record).await {
                warn!(sector = id, error = %err, "failed to record sector");
            }
        }
    });

    vec![bust_task, sector_task]
}
