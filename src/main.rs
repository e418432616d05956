//! Hedgehog Physics headless runner
//!
//! Drops a body onto a generated course, gives it a push and runs the fixed
//! timestep simulation. With `--trace` every tick is printed as one JSON line.

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use glam::Vec2;
use serde::Serialize;

use hedgehog_physics::PhysicsSettings;
use hedgehog_physics::sim::{BodySnapshot, ControllerEvent, Simulation, World, generate_course};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Course seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Number of random course sections
    #[arg(long, default_value_t = 12)]
    sections: u32,

    /// Fixed ticks to simulate
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Initial horizontal speed (units/s)
    #[arg(long, default_value_t = 8.0)]
    speed: f32,

    /// Physics settings JSON (missing fields keep defaults)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print one JSON line per tick
    #[arg(long)]
    trace: bool,
}

#[derive(Serialize)]
struct TraceLine<'a> {
    body: &'a BodySnapshot,
    events: Vec<&'static str>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => PhysicsSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => PhysicsSettings::default(),
    };

    let terrain = generate_course(args.seed, args.sections);
    log::info!(
        "Starting hedgehog-sim: seed={} ticks={} segments={}",
        args.seed,
        args.ticks,
        terrain.len()
    );

    let mut sim = Simulation::new(World::new(terrain));
    let id = sim.spawn(settings, Vec2::new(1.0, 1.0));
    if let Some(body) = sim.body_mut(id) {
        body.set_velocity(Vec2::new(args.speed, 0.0));
    }

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut attaches = 0u32;
    let mut detaches = 0u32;
    let mut collisions = 0u64;

    for _ in 0..args.ticks {
        sim.step();
        let Some(body) = sim.body_mut(id) else {
            anyhow::bail!("body {:?} disappeared", id);
        };
        let events = body.drain_events();
        for event in &events {
            match event {
                ControllerEvent::Attached { .. } => attaches += 1,
                ControllerEvent::Detached => detaches += 1,
                ControllerEvent::Collision(_) => collisions += 1,
                _ => {}
            }
        }
        if args.trace {
            let snapshot = body.snapshot();
            let line = TraceLine {
                body: &snapshot,
                events: events.iter().map(ControllerEvent::name).collect(),
            };
            serde_json::to_writer(&mut out, &line)?;
            writeln!(out)?;
        }
    }
    out.flush()?;

    let Some(body) = sim.body(id) else {
        anyhow::bail!("body {:?} disappeared", id);
    };
    log::info!(
        "Done after {} ticks: position={:?} grounded={} wall_mode={:?} attaches={} detaches={} collisions={}",
        sim.time_ticks(),
        body.position(),
        body.is_grounded(),
        body.wall_mode(),
        attaches,
        detaches,
        collisions
    );
    Ok(())
}
