//! Application lifecycle management.
//!
//! Headless main loop: walks the player along the configured route, streams
//! chunks around it and keeps the map echo in step with the resident set.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};

use hinterland_common::WorldCoord;
use hinterland_world::{MapEcho, WorldMap, WorldObject};

use crate::config::{EngineConfig, CONFIG_FILE};
use crate::route::RouteWalker;
use crate::timing::FrameTiming;

/// How long shutdown waits for in-flight jobs before saving.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Frames between status lines.
const STATUS_INTERVAL: u32 = 600;

/// Application state.
struct HinterlandApp {
    config: EngineConfig,
    world: WorldMap,
    echo: MapEcho,
    walker: RouteWalker,
    timing: FrameTiming,
    /// Unsaved actors (the Player) handed back by evicted chunks
    carried: Vec<WorldObject>,
    frame: u32,
}

impl HinterlandApp {
    fn new(config: EngineConfig) -> Result<Self> {
        let world = WorldMap::new(config.world.clone(), &config.save_dir)
            .with_context(|| format!("opening world at {}", config.save_dir.display()))?;
        // The seed has to travel with the chunks it generated.
        if let Err(e) = config.save_to(config.save_dir.join(CONFIG_FILE)) {
            warn!("Failed to record config next to the save: {e}");
        }
        let echo = MapEcho::for_world(&world);
        let walker = RouteWalker::new(&config.route);
        let timing = FrameTiming::new(config.tick_rate).with_realtime(config.realtime);

        Ok(Self {
            config,
            world,
            echo,
            walker,
            timing,
            carried: Vec::new(),
            frame: 0,
        })
    }

    /// One simulation tick.
    fn tick(&mut self) -> Result<()> {
        let step = f64::from(self.config.walk_speed * self.timing.fixed_dt());
        let player = self.walker.advance(step);

        self.world.update(player);

        let report = self.world.resolve_pending();
        if !report.failures.is_empty() {
            for failure in &report.failures {
                error!(key = %failure.key, "Chunk failed to load: {}", failure.error);
            }
            let first = &report.failures[0];
            bail!("chunk {} could not be loaded: {}", first.key, first.error);
        }

        self.world.explore(player);
        for key in self.world.resident_keys() {
            self.echo.remove_chunk(key);
        }

        if self.frame % self.config.eviction_interval == 0 {
            self.evict(player);
        }

        if self.frame % STATUS_INTERVAL == 0 {
            info!(
                frame = self.frame,
                x = player.x,
                y = player.y,
                resident = report.resident,
                generating = report.generating,
                echoed = self.echo.len(),
                fps = self.timing.current_fps(),
                "Status"
            );
        }
        Ok(())
    }

    fn evict(&mut self, player: WorldCoord) {
        let report = self.world.evict_distant(player, Some(&self.echo));
        if !report.failed_saves.is_empty() {
            warn!(count = report.failed_saves.len(), "Some chunks could not be saved, kept resident");
        }
        if !report.survivors.is_empty() {
            debug!(count = report.survivors.len(), "Carrying actors out of evicted chunks");
            self.carried.extend(report.survivors);
        }
    }

    fn run(&mut self) -> Result<()> {
        info!(
            frames = self.config.frames,
            tick_rate = self.config.tick_rate,
            realtime = self.config.realtime,
            "Entering main loop"
        );

        while self.frame < self.config.frames {
            self.tick()?;
            self.frame += 1;
            self.timing.end_frame();
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        if !self.world.wait_idle(SHUTDOWN_GRACE) {
            warn!("Background jobs still running at shutdown");
        }
        // Chunks that finished after the last tick still need their edges fixed.
        self.world.resolve_pending();

        let saved = self.world.save_all().context("saving world")?;
        info!(
            saved,
            echoed = self.echo.len(),
            carried = self.carried.len(),
            avg_frame_ms = self.timing.average_frame_time_ms(),
            "World saved"
        );
        Ok(())
    }
}

/// Runs the application.
pub fn run(config: EngineConfig) -> Result<()> {
    let mut app = HinterlandApp::new(config)?;
    let outcome = app.run();
    // Save what we have even when the loop stopped on an error.
    let saved = app.shutdown();
    outcome.and(saved)
}
