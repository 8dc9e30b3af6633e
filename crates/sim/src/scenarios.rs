//! Canned simulation scenarios for a multicast cell

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cellcast_core::{
    ConfigError, Destination, ForwardingEntry, ForwardingTable, GroupAddress, InterfaceId,
    Position, Role, SourceMatch, Topology,
};
use cellcast_radio::channel::{FixedLossChannel, PathLossChannel};
use cellcast_radio::mobility::{access_point_position, station_line, LinearMotion};
use cellcast_radio::RadioConfig;

use crate::simulation::{SimEvent, Simulation, SimulationStats, World};
use crate::traffic::{TrafficConfig, TrafficGenerator};

const GROUP: &str = "225.1.2.3";
const SIM_TIME: Duration = Duration::from_secs(1);
const APP_START: Duration = Duration::from_millis(100);

fn group() -> GroupAddress {
    GroupAddress::from(GROUP)
}

fn cell_traffic() -> TrafficConfig {
    TrafficConfig {
        interval: Duration::from_millis(10),
        packet_size: 1024,
        start: APP_START,
        stop: SIM_TIME,
    }
}

/// Build a one-cell topology: access point node 0, stations 1..=n on a line,
/// every station joined to the group, one route replicating to all of them.
fn build_cell(num_stations: u32) -> (Topology, ForwardingTable, InterfaceId, Vec<InterfaceId>) {
    let mut topology = Topology::new();
    let ap = topology.add_node(0, Role::AccessPoint, access_point_position());

    let mut stations = Vec::new();
    for (i, position) in station_line(num_stations).into_iter().enumerate() {
        let iface = topology.add_node(i as u32 + 1, Role::Station, position);
        topology.join(iface, group());
        stations.push(iface);
    }

    let mut routes = ForwardingTable::new();
    routes.add_route(ForwardingEntry {
        group: group(),
        source: SourceMatch::Any,
        outputs: stations.iter().copied().collect(),
    });

    (topology, routes, ap, stations)
}

fn run_with_progress(sim: &mut Simulation, end: Duration) {
    let steps = 10u32;
    let bar = ProgressBar::new(steps as u64);
    bar.set_style(
        ProgressStyle::with_template("  [{bar:30}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    // Intermediate slices must keep future events queued; only the last
    // step applies the discard-at-horizon contract.
    for i in 1..steps {
        sim.advance_to(end.mul_f64(i as f64 / steps as f64));
        bar.inc(1);
    }
    sim.run_until(end);
    bar.inc(1);
    bar.finish_and_clear();
}

fn print_summary(sim: &Simulation) {
    let stats = sim.stats();
    let (frames, submitted, granted) = sim.world().scheduler_stats();
    println!("  sends: {} (+{} unroutable)", stats.sends, stats.sends_unroutable);
    println!("  receptions: {} ({} suppressed, {} lost on air)",
        stats.deliveries, stats.deliveries_suppressed, stats.attempts_failed);
    println!("  delivery rate: {:.1}%", stats.delivery_rate() * 100.0);
    println!("  frames: {}, flows: {} submitted / {} granted", frames, submitted, granted);
}

/// One access point multicasting 1024-byte packets to every station.
pub fn multicast_cell(
    config: RadioConfig,
    num_stations: u32,
    seed: u64,
) -> Result<SimulationStats, ConfigError> {
    println!("\n=== Multicast Cell ===");
    println!("{} stations, group {}, seed {}", num_stations, GROUP, seed);

    let (topology, routes, ap, _stations) = build_cell(num_stations);
    let channel = FixedLossChannel::new(&config, seed)?;
    let mut world = World::new(topology, routes, &config, Box::new(channel))?;
    world.add_generator(TrafficGenerator::new(
        cell_traffic(),
        ap,
        Destination::Group(group()),
    )?)?;

    let mut sim = Simulation::new(world);
    run_with_progress(&mut sim, SIM_TIME);
    print_summary(&sim);

    Ok(sim.stats().clone())
}

/// Multicast cell with one station leaving mid-run and rejoining later.
pub fn group_churn(
    config: RadioConfig,
    num_stations: u32,
    seed: u64,
) -> Result<SimulationStats, ConfigError> {
    println!("\n=== Group Churn ===");
    println!("{} stations, seed {}", num_stations, seed);

    let (topology, routes, ap, stations) = build_cell(num_stations);
    let channel = FixedLossChannel::new(&config, seed)?;
    let mut world = World::new(topology, routes, &config, Box::new(channel))?;
    world.add_generator(TrafficGenerator::new(
        cell_traffic(),
        ap,
        Destination::Group(group()),
    )?)?;

    let mut sim = Simulation::new(world);

    let mut rng = StdRng::seed_from_u64(seed);
    let churner = stations[rng.random_range(0..stations.len())];
    println!("station {} leaves at 450ms, rejoins at 750ms", churner.node);
    sim.schedule(
        Duration::from_millis(450),
        SimEvent::Leave {
            interface: churner,
            group: group(),
        },
    );
    sim.schedule(
        Duration::from_millis(750),
        SimEvent::Join {
            interface: churner,
            group: group(),
        },
    );

    run_with_progress(&mut sim, SIM_TIME);
    print_summary(&sim);

    for station in &stations {
        let count = sim
            .trace()
            .replay()
            .filter(|r| r.node == station.node)
            .count();
        let marker = if *station == churner { " (churned)" } else { "" };
        println!("  station {}: {} packets{}", station.node, count, marker);
    }

    Ok(sim.stats().clone())
}

/// The same cell with per-station unicast flows instead of the group.
pub fn unicast_baseline(
    config: RadioConfig,
    num_stations: u32,
    seed: u64,
) -> Result<SimulationStats, ConfigError> {
    println!("\n=== Unicast Baseline ===");
    println!("{} stations, one flow each, seed {}", num_stations, seed);

    let (topology, routes, ap, stations) = build_cell(num_stations);
    let channel = FixedLossChannel::new(&config, seed)?;
    let mut world = World::new(topology, routes, &config, Box::new(channel))?;
    for station in &stations {
        world.add_generator(TrafficGenerator::new(
            cell_traffic(),
            ap,
            Destination::Node(station.node),
        )?)?;
    }

    let mut sim = Simulation::new(world);
    run_with_progress(&mut sim, SIM_TIME);
    print_summary(&sim);

    Ok(sim.stats().clone())
}

/// A station walking out of coverage under a path-loss channel: receptions
/// stop once its distance pushes the signal below sensitivity.
pub fn edge_walkout(num_stations: u32, seed: u64) -> Result<SimulationStats, ConfigError> {
    println!("\n=== Edge Walkout ===");
    println!("{} stations, station 1 walks out, seed {}", num_stations, seed);

    let config = RadioConfig {
        packet_loss: 0.0,
        latency_jitter: Duration::ZERO,
        ..Default::default()
    };
    let (topology, routes, ap, stations) = build_cell(num_stations);
    let walker = stations[0];
    let start_position = topology
        .position(walker.node)
        .unwrap_or_else(|| station_line(1)[0]);

    // 14 dBm tx against -100 dBm sensitivity, exponent 3: coverage ends a
    // few hundred meters out.
    let channel = PathLossChannel::new(
        14.0,
        -100.0,
        30.0,
        3.0,
        6.0,
        Duration::from_millis(1),
        seed,
    )?;
    let mut world = World::new(topology, routes, &config, Box::new(channel))?;
    world.add_generator(TrafficGenerator::new(
        cell_traffic(),
        ap,
        Destination::Group(group()),
    )?)?;

    let mut sim = Simulation::new(world);
    let walk = LinearMotion {
        from: start_position,
        to: Position::new(2000.0, 0.0, 1.5),
        start: APP_START,
        duration: Duration::from_millis(800),
    };
    for (at, position) in walk.waypoints(16) {
        sim.schedule(
            at,
            SimEvent::SetPosition {
                node: walker.node,
                position,
            },
        );
    }

    run_with_progress(&mut sim, SIM_TIME);
    print_summary(&sim);

    let walker_count = sim
        .trace()
        .replay()
        .filter(|r| r.node == walker.node)
        .count();
    println!("  walker received {} packets before losing coverage", walker_count);

    Ok(sim.stats().clone())
}
