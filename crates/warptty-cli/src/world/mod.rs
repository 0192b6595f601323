//! Owned game-world state.
//!
//! One handle, independent locks per sub-map so a slow reader of one map
//! never holds up writers of another. Accessors hand out clones; callers
//! never hold a lock across an await.

pub mod listeners;
pub mod persist;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use warptty_core::models::{
    Planet, PlanetSummary, PlayerStatus, PortReport, Sector, Settings, Ship, TwarpHop,
};

#[derive(Clone, Default)]
pub struct World {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    status: RwLock<PlayerStatus>,
    sectors: RwLock<HashMap<u32, Sector>>,
    planets: RwLock<HashMap<u32, Planet>>,
    reports: RwLock<HashMap<u32, PortReport>>,
    ships: RwLock<HashMap<u32, Ship>>,
    settings: RwLock<Settings>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status(&self) -> PlayerStatus {
        self.inner.status.read().await.clone()
    }

    pub async fn set_sector(&self, sector: u32) {
        self.inner.status.write().await.sector = sector;
    }

    pub async fn update_status<F>(&self, f: F)
    where
        F: FnOnce(&mut PlayerStatus),
    {
        let mut status = self.inner.status.write().await;
        f(&mut status);
    }

    pub async fn sector(&self, id: u32) -> Option<Sector> {
        self.inner.sectors.read().await.get(&id).cloned()
    }

    /// Store a freshly parsed sector, keeping anything the new parse could
    /// not see: known warps, density, and the port's report and credits.
    pub async fn upsert_sector(&self, mut sector: Sector) {
        let mut sectors = self.inner.sectors.write().await;
        if let Some(existing) = sectors.get(&sector.id) {
            if sector.warps.is_empty() {
                sector.warps = existing.warps.clone();
                sector.warp_count = existing.warp_count;
            }
            if sector.density == 0 {
                sector.density = existing.density;
            }
            if let (Some(port), Some(old)) = (sector.port.as_mut(), existing.port.as_ref()) {
                if port.report.is_none() {
                    port.report = old.report.clone();
                }
                if port.creds == 0 {
                    port.creds = old.creds;
                }
            }
        }
        sectors.insert(sector.id, sector);
    }

    /// Density scans only refine sectors we already know about.
    pub async fn update_density(&self, id: u32, density: i64, warp_count: i64) -> bool {
        let mut sectors = self.inner.sectors.write().await;
        match sectors.get_mut(&id) {
            Some(sector) => {
                sector.density = density;
                sector.warp_count = warp_count;
                true
            }
            None => false,
        }
    }

    pub async fn set_sector_warps(&self, id: u32, warps: Vec<u32>) {
        let mut sectors = self.inner.sectors.write().await;
        if let Some(sector) = sectors.get_mut(&id) {
            sector.warp_count = warps.len() as i64;
            sector.warps = warps;
        }
    }

    pub async fn planet(&self, id: u32) -> Option<Planet> {
        self.inner.planets.read().await.get(&id).cloned()
    }

    pub async fn planets(&self) -> Vec<Planet> {
        self.inner.planets.read().await.values().cloned().collect()
    }

    /// Store a landing display, keeping a previously scanned summary.
    pub async fn upsert_planet(&self, mut planet: Planet) {
        let mut planets = self.inner.planets.write().await;
        if let Some(existing) = planets.get(&planet.id) {
            if planet.summary.is_none() {
                planet.summary = existing.summary;
            }
        }
        planets.insert(planet.id, planet);
    }

    /// Fold one corp-scan row into the planet table.
    pub async fn merge_planet_summary(
        &self,
        id: u32,
        sector: u32,
        class: Option<char>,
        summary: PlanetSummary,
    ) {
        let mut planets = self.inner.planets.write().await;
        let planet = planets.entry(id).or_insert_with(|| Planet {
            id,
            ..Default::default()
        });
        planet.sector = sector;
        if planet.class.is_none() {
            planet.class = class;
        }
        planet.summary = Some(summary);
    }

    pub async fn port_report(&self, sector: u32) -> Option<PortReport> {
        self.inner.reports.read().await.get(&sector).cloned()
    }

    pub async fn put_port_report(&self, sector: u32, report: PortReport) {
        self.inner
            .reports
            .write()
            .await
            .insert(sector, report.clone());
        let mut sectors = self.inner.sectors.write().await;
        if let Some(port) = sectors.get_mut(&sector).and_then(|s| s.port.as_mut()) {
            port.report = Some(report);
        }
    }

    /// Records a port's estimated credits on hand. Returns false when the
    /// sector is not cached or has no port, in which case nothing is stored.
    pub async fn set_port_creds(&self, sector: u32, creds: i64) -> bool {
        let mut sectors = self.inner.sectors.write().await;
        match sectors.get_mut(&sector).and_then(|s| s.port.as_mut()) {
            Some(port) => {
                port.creds = creds;
                true
            }
            None => false,
        }
    }

    pub async fn ship(&self, id: u32) -> Option<Ship> {
        self.inner.ships.read().await.get(&id).copied()
    }

    pub async fn put_ship(&self, ship: Ship) {
        self.inner.ships.write().await.insert(ship.id, ship);
    }

    pub async fn ships(&self) -> Vec<Ship> {
        self.inner.ships.read().await.values().copied().collect()
    }

    pub async fn settings(&self) -> Settings {
        self.inner.settings.read().await.clone()
    }

    pub async fn set_hops_to_stardock(&self, hops: Vec<TwarpHop>) {
        self.inner.settings.write().await.hops_to_stardock = hops;
    }
}
