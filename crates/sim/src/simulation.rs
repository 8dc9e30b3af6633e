//! Simulation driver: cell state plus the event loop around it

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};

use cellcast_core::{
    ConfigError, Destination, EventHandle, EventHandler, EventQueue, ForwardingEntry,
    ForwardingTable, GroupAddress, InterfaceId, NodeId, Packet, Position, SourceMatch, Topology,
    TraceRecord, TraceRecorder,
};
use cellcast_radio::channel::{ChannelModel, Link};
use cellcast_radio::scheduler::{FlowTarget, Grant, TdmaScheduler, TxRequest};
use cellcast_radio::RadioConfig;

use crate::traffic::TrafficGenerator;

/// Everything that can happen in a run. Traffic, radio frames, deliveries,
/// and topology changes all go through the same queue, so churn composes
/// with traffic without special cases.
#[derive(Debug, Clone)]
pub enum SimEvent {
    GeneratorTick { generator: usize },
    FrameTick { frame: u64 },
    Deliver { interface: InterfaceId, packet: Packet },
    Join { interface: InterfaceId, group: GroupAddress },
    Leave { interface: InterfaceId, group: GroupAddress },
    AddRoute { entry: ForwardingEntry },
    RemoveRoute { group: GroupAddress, source: SourceMatch },
    SetPosition { node: NodeId, position: Position },
}

/// Counters for everything that does not show up in the delivery trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub sends: u64,
    pub sends_unroutable: u64,
    pub deliveries: u64,
    pub deliveries_suppressed: u64,
    pub attempts_failed: u64,
}

impl SimulationStats {
    /// Fraction of per-receiver delivery attempts that produced a reception.
    pub fn delivery_rate(&self) -> f64 {
        let attempts = self.deliveries + self.deliveries_suppressed + self.attempts_failed;
        if attempts == 0 {
            0.0
        } else {
            self.deliveries as f64 / attempts as f64
        }
    }
}

/// A packet waiting for air time, with its receiver set fixed at send time.
#[derive(Debug, Clone)]
struct PendingFlow {
    packet: Packet,
    receivers: Vec<InterfaceId>,
}

/// The simulated cell: topology, routes, scheduler, channel, traffic
/// sources, and the delivery trace. Mutated only by event dispatch.
pub struct World {
    topology: Topology,
    routes: ForwardingTable,
    scheduler: TdmaScheduler,
    channel: Box<dyn ChannelModel>,
    generators: Vec<TrafficGenerator>,
    recorder: TraceRecorder,
    pending: HashMap<u64, PendingFlow>,
    next_tag: u64,
    frame_duration: Duration,
    next_frame_tick: Option<u64>,
    stats: SimulationStats,
}

impl World {
    pub fn new(
        topology: Topology,
        routes: ForwardingTable,
        config: &RadioConfig,
        channel: Box<dyn ChannelModel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            topology,
            routes,
            scheduler: TdmaScheduler::new(config.blocks_per_frame)?,
            channel,
            generators: Vec::new(),
            recorder: TraceRecorder::new(),
            pending: HashMap::new(),
            next_tag: 0,
            frame_duration: config.frame_duration,
            next_frame_tick: None,
            stats: SimulationStats::default(),
        })
    }

    /// Register a traffic source. Its first tick is scheduled when the world
    /// is wrapped into a [`Simulation`].
    pub fn add_generator(&mut self, generator: TrafficGenerator) -> Result<usize, ConfigError> {
        let source = generator.source().node;
        if self.topology.node(source).is_none() {
            return Err(ConfigError::UnknownNode(source));
        }
        self.generators.push(generator);
        Ok(self.generators.len() - 1)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn routes(&self) -> &ForwardingTable {
        &self.routes
    }

    pub fn recorder(&self) -> &TraceRecorder {
        &self.recorder
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn scheduler_stats(&self) -> (u64, u64, u64) {
        self.scheduler.get_stats()
    }

    fn frame_at(&self, now: Duration) -> u64 {
        (now.as_nanos() / self.frame_duration.as_nanos()) as u64
    }

    fn frame_start(&self, frame: u64) -> Duration {
        Duration::from_nanos(self.frame_duration.as_nanos() as u64 * frame)
    }

    fn on_generator_tick(&mut self, generator: usize, queue: &mut EventQueue<SimEvent>) {
        let now = queue.now();
        let gen = match self.generators.get(generator) {
            Some(gen) => gen.clone(),
            None => return,
        };
        let packet = gen.make_packet(now);

        match &packet.destination {
            Destination::Group(group) => {
                let receivers = self.routes.resolve(packet.source, group, &self.topology);
                if receivers.is_empty() {
                    self.stats.sends_unroutable += 1;
                    debug!("no receivers for {} at {:?}", group, now);
                } else {
                    self.submit_flow(packet, receivers, FlowTarget::Broadcast, now);
                }
            }
            Destination::Node(node) => {
                let node = *node;
                let target = self
                    .topology
                    .node(node)
                    .and_then(|n| n.interfaces().first().map(|i| i.id()));
                match target {
                    Some(iface) => {
                        self.submit_flow(packet, vec![iface], FlowTarget::Station(node), now);
                    }
                    None => {
                        self.stats.sends_unroutable += 1;
                        debug!("unicast to unknown node {} at {:?}", node, now);
                    }
                }
            }
        }

        self.service_frame(now, queue);

        if let Some(next) = gen.next_tick(now) {
            queue.schedule_at(next, SimEvent::GeneratorTick { generator });
        }
    }

    fn submit_flow(
        &mut self,
        packet: Packet,
        receivers: Vec<InterfaceId>,
        target: FlowTarget,
        now: Duration,
    ) {
        let tag = self.next_tag;
        self.next_tag += 1;
        let source = packet.source.node;
        self.pending.insert(tag, PendingFlow { packet, receivers });
        self.scheduler.submit(TxRequest {
            queued_at: now,
            source,
            target,
            tag,
        });
        self.stats.sends += 1;
    }

    /// Run the scheduler for the frame containing `now` and deal out the
    /// grants. Backlog that did not fit waits for the next frame boundary.
    fn service_frame(&mut self, now: Duration, queue: &mut EventQueue<SimEvent>) {
        let frame = self.frame_at(now);
        let stations = self.topology.stations();
        let grants = self.scheduler.assign(frame, &stations);
        self.process_grants(grants, now, queue);
        if self.scheduler.backlog_len() > 0 {
            self.schedule_frame_tick(frame + 1, queue);
        }
    }

    fn schedule_frame_tick(&mut self, frame: u64, queue: &mut EventQueue<SimEvent>) {
        if self.next_frame_tick == Some(frame) {
            return;
        }
        self.next_frame_tick = Some(frame);
        queue.schedule_at(self.frame_start(frame), SimEvent::FrameTick { frame });
    }

    fn on_frame_tick(&mut self, frame: u64, queue: &mut EventQueue<SimEvent>) {
        self.next_frame_tick = None;
        let now = queue.now();
        let stations = self.topology.stations();
        let grants = self.scheduler.assign(frame, &stations);
        self.process_grants(grants, now, queue);
        if self.scheduler.backlog_len() > 0 {
            self.schedule_frame_tick(frame + 1, queue);
        }
    }

    fn process_grants(
        &mut self,
        grants: Vec<Grant>,
        now: Duration,
        queue: &mut EventQueue<SimEvent>,
    ) {
        for grant in grants {
            let flow = match self.pending.remove(&grant.request.tag) {
                Some(flow) => flow,
                None => continue,
            };
            let source_pos = self.topology.position(flow.packet.source.node);
            for iface in flow.receivers {
                let distance = match (source_pos, self.topology.position(iface.node)) {
                    (Some(a), Some(b)) => a.distance_to(&b),
                    _ => 0.0,
                };
                let link = Link {
                    source: flow.packet.source.node,
                    target: iface.node,
                    distance_m: distance,
                    bytes: flow.packet.size,
                };
                let outcome = self.channel.attempt(&link, &grant.block, now);
                if outcome.delivered {
                    queue.schedule(
                        outcome.delay,
                        SimEvent::Deliver {
                            interface: iface,
                            packet: flow.packet.clone(),
                        },
                    );
                } else {
                    self.stats.attempts_failed += 1;
                }
            }
        }
    }

    fn on_deliver(&mut self, interface: InterfaceId, packet: Packet, now: Duration) {
        if let Destination::Group(group) = &packet.destination {
            // Membership is re-checked at delivery time: a leave that landed
            // while the packet was in flight suppresses the record.
            if !self.topology.joined(interface, group) {
                self.stats.deliveries_suppressed += 1;
                debug!("suppressed delivery to {}: left {}", interface, group);
                return;
            }
        }
        self.recorder
            .record(TraceRecord::recv(now, interface.node, packet.size));
        self.stats.deliveries += 1;
    }
}

impl EventHandler<SimEvent> for World {
    fn handle(&mut self, event: SimEvent, queue: &mut EventQueue<SimEvent>) {
        match event {
            SimEvent::GeneratorTick { generator } => self.on_generator_tick(generator, queue),
            SimEvent::FrameTick { frame } => self.on_frame_tick(frame, queue),
            SimEvent::Deliver { interface, packet } => {
                let now = queue.now();
                self.on_deliver(interface, packet, now);
            }
            SimEvent::Join { interface, group } => {
                self.topology.join(interface, group);
            }
            SimEvent::Leave { interface, group } => {
                self.topology.leave(interface, &group);
            }
            SimEvent::AddRoute { entry } => {
                self.routes.add_route(entry);
            }
            SimEvent::RemoveRoute { group, source } => {
                self.routes.remove_route(&group, &source);
            }
            SimEvent::SetPosition { node, position } => {
                self.topology.set_position(node, position);
            }
        }
    }
}

/// A world plus its event queue, ready to run.
pub struct Simulation {
    queue: EventQueue<SimEvent>,
    world: World,
}

impl Simulation {
    /// Wrap a configured world. Every registered generator gets its first
    /// tick scheduled here.
    pub fn new(world: World) -> Self {
        let mut queue = EventQueue::new();
        for (index, gen) in world.generators.iter().enumerate() {
            if let Some(at) = gen.first_tick() {
                queue.schedule_at(at, SimEvent::GeneratorTick { generator: index });
            }
        }
        Self { queue, world }
    }

    /// Schedule an event at an absolute time, e.g. mid-run churn.
    pub fn schedule(&mut self, at: Duration, event: SimEvent) -> EventHandle {
        self.queue.schedule_at(at, event)
    }

    pub fn cancel(&mut self, handle: &EventHandle) -> bool {
        self.queue.cancel(handle)
    }

    pub fn now(&self) -> Duration {
        self.queue.now()
    }

    /// Run to `end` without discarding events scheduled past it, so the run
    /// can be continued in slices. Returns the number of events dispatched.
    pub fn advance_to(&mut self, end: Duration) -> u64 {
        self.queue.advance_to(end, &mut self.world)
    }

    /// Run to `end`, returning the number of events dispatched.
    pub fn run_until(&mut self, end: Duration) -> u64 {
        let dispatched = self.queue.run_until(end, &mut self.world);
        info!(
            "run to {:?}: {} events, {} receptions",
            end, dispatched, self.world.stats.deliveries
        );
        dispatched
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn trace(&self) -> &TraceRecorder {
        self.world.recorder()
    }

    pub fn stats(&self) -> &SimulationStats {
        self.world.stats()
    }
}
