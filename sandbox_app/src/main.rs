//! Unit sandbox
//!
//! Builds a turret unit over a fake host object, runs a fixed-step loop and
//! tears it down. Pass a `.toml` or `.ron` unit config as the first argument
//! to override the defaults.

use std::cell::RefCell;
use std::rc::Rc;
use unit_runtime::prelude::*;

const FIXED_DT: f32 = 1.0 / 60.0;
const FRAMES: u32 = 120;
const FUSE_FRAMES: u32 = 30;

/// Host-ticked mount the engine binds to the turret object
#[derive(Default)]
struct Mount {
    core: ComponentCore,
}

impl Component for Mount {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn category(&self) -> Category {
        Category::HostManaged
    }

    fn on_attach(&mut self, owner: &Unit) -> Result<(), ComponentError> {
        log::info!("Mount bound to '{}'", owner.name());
        Ok(())
    }
}

/// Misconfigured: host-managed but asks for updates, so discovery refuses it
#[derive(Default)]
struct Radar {
    core: ComponentCore,
}

impl Component for Radar {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn category(&self) -> Category {
        Category::HostManaged
    }

    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for Radar {
    fn on_update(&mut self, _delta_time: f32) -> Result<(), ComponentError> {
        Ok(())
    }
}

/// Rotates the turret every tick
#[derive(Default)]
struct Traverse {
    core: ComponentCore,
    heading: f32,
    rate: f32,
}

impl Component for Traverse {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn initialize(&mut self) -> Result<(), ComponentError> {
        self.rate = 90.0;
        Ok(())
    }

    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for Traverse {
    fn on_update(&mut self, delta_time: f32) -> Result<(), ComponentError> {
        if self.is_enabled() {
            self.heading = (self.heading + self.rate * delta_time) % 360.0;
        }
        Ok(())
    }
}

/// Counts down and detaches itself from the unit
#[derive(Default)]
struct Fuse {
    core: ComponentCore,
    frames: u32,
}

impl Component for Fuse {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn on_detach(&mut self) {
        log::info!("Fuse burned out after {} frames", self.frames);
    }

    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for Fuse {
    fn on_update(&mut self, _delta_time: f32) -> Result<(), ComponentError> {
        self.frames += 1;
        if self.frames < FUSE_FRAMES {
            return Ok(());
        }

        let owner = self.owner().ok_or(ComponentError::MissingOwner)?;
        if let Some(me) = owner.get_component_ref::<Self>() {
            owner
                .remove_component(&me)
                .map_err(|e| ComponentError::Custom(e.to_string()))?;
        }
        Ok(())
    }
}

/// Unit-level setup: adds the self-managed components
struct TurretHooks;

impl UnitHooks for TurretHooks {
    fn on_initialize(&mut self, unit: &Unit) -> Result<(), ComponentError> {
        log::info!("Turret setup with {} discovered components", unit.len());
        let to_component_error = |e: UnitError| ComponentError::Custom(e.to_string());
        unit.add_component(Traverse::default())
            .map_err(to_component_error)?;
        unit.add_component(Fuse::default())
            .map_err(to_component_error)?;
        Ok(())
    }

    fn on_teardown(&mut self, unit: &Unit) {
        log::info!("Turret teardown with {} components", unit.len());
    }
}

fn load_config() -> Result<UnitConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading unit config from {}", path);
            Ok(UnitConfig::load_from_file(path)?)
        }
        None => Ok(UnitConfig::default()),
    }
}

#[allow(dead_code)]
struct Transform;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    log::info!("Starting unit sandbox");

    let config = load_config()?;
    // The host owns its bound components; the unit only borrows them
    let mount = Rc::new(RefCell::new(Mount::default()));
    let radar = Rc::new(RefCell::new(Radar::default()));
    let unit = Unit::builder()
        .name("turret")
        .config(config)
        .backing(vec![
            BoundObject::foreign::<Transform>(),
            BoundObject::component(&mount),
            BoundObject::component(&radar),
        ])
        .hooks(TurretHooks)
        .build();

    unit.initialize()?;
    if let Some(report) = unit.discovery_report() {
        log::info!(
            "Discovery: {} registered, {} rejected, {} skipped",
            report.registered,
            report.rejected,
            report.skipped
        );
    }
    log::info!(
        "Initialized: {} components, {} scheduled",
        unit.len(),
        unit.scheduled().len()
    );

    for frame in 0..FRAMES {
        unit.tick(FIXED_DT)?;
        if frame % 30 == 0 {
            log::info!("Frame {}: {} scheduled", frame, unit.scheduled().len());
        }
    }

    if let Some(traverse) = unit.get_component::<Traverse>() {
        log::info!("Final heading {:.1} deg", traverse.borrow().heading);
    }

    for diagnostic in unit.diagnostics() {
        log::info!(
            "Diagnostic [{:?}] {} from {:?}: {}",
            diagnostic.rejection.severity(),
            diagnostic.component,
            diagnostic.origin,
            diagnostic.rejection
        );
    }

    unit.teardown()?;
    log::info!(
        "Sandbox finished ({}), mount still bound: {}",
        unit.state(),
        mount.borrow().owner().is_some()
    );
    Ok(())
}
