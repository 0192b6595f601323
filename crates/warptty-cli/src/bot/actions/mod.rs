//! Long-running operator commands.
//!
//! Each action is an async fn the command loop spawns and can abort
//! mid-flight. Actions drive the game through the actuator, block on broker
//! events, and log progress under the run span the command loop opens.

mod explore;
mod planet_build;
mod planet_defense;
mod planet_trade;
mod rob;
mod steal;
mod surround;
mod trade;

pub use explore::explore;
pub use planet_build::{create_planets, strip_bulk, upgrade_route};
pub use planet_defense::{fig_deploy, planet_drop};
pub use planet_trade::{planet_trade, route_trade, warp_sell};
pub use rob::{rob_pair, rob_port};
pub use steal::sell_steal;
pub use surround::{surround, unsurround};
pub use trade::pair_trade;

use rand::seq::SliceRandom;
use warptty_core::models::{PortReport, Sector};

use crate::bot::actuator::MoveOpts;
use crate::world::World;

fn report_of(sector: &Sector) -> Option<&PortReport> {
    sector.port.as_ref()?.report.as_ref()
}

/// Options for moves made while roaming space that may turn hostile.
fn roam_opts() -> MoveOpts {
    MoveOpts {
        drop_figs: 1,
        min_figs: 100,
        ..MoveOpts::default()
    }
}

/// Warp neighbors of `sector` that are cached and have nothing hostile in
/// them.
async fn safe_hops(world: &World, sector: &Sector) -> Vec<u32> {
    let mut hops = Vec::new();
    for &warp in &sector.warps {
        if let Some(s) = world.sector(warp).await {
            if s.is_safe() {
                hops.push(warp);
            }
        }
    }
    hops
}

/// Next stop for a roaming search: unexplored sectors first, then sectors
/// this run has not visited, then anything safe.
fn pick_hop(safe: &[u32], unexplored: &[u32], unvisited: &[u32]) -> Option<u32> {
    let mut rng = rand::thread_rng();
    unexplored
        .choose(&mut rng)
        .or_else(|| unvisited.choose(&mut rng))
        .or_else(|| safe.choose(&mut rng))
        .copied()
}

#[cfg(test)]
pub(crate) mod testutil {
    use tokio::sync::mpsc;

    use crate::bot::actuator::Actuator;
    use crate::bot::broker::Broker;
    use crate::world::World;

    pub fn harness() -> (Actuator, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let actuator = Actuator::new(Broker::new(), World::new(), tx);
        (actuator, rx)
    }

    pub fn drain(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> String {
        let mut all = Vec::new();
        while let Ok(bytes) = rx.try_recv() {
            all.extend(bytes);
        }
        String::from_utf8(all).unwrap()
    }
}
