// Simultaneous-activation scheduler

use crate::beacon_config::BeaconConfig;
use crate::beacon_group::{Group, GroupTransition};
use crate::beacon_interface::{EntityId, EntityKind, SignatureEvent, Tick};
use crate::beacon_node::{Node, NodeTransition};
use crate::beacon_signature::{Signature, SignatureTransition};
use indexmap::IndexMap;

// ============================================================================
// Entities
// ============================================================================

/// Anything the scheduler advances once per tick
#[derive(Debug, Clone)]
pub enum Entity {
    Node(Node),
    Group(Group),
    Signature(Signature),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Node(node) => node.id(),
            Entity::Group(group) => group.id(),
            Entity::Signature(signature) => signature.id(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Node(_) => EntityKind::Node,
            Entity::Group(_) => EntityKind::Group,
            Entity::Signature(_) => EntityKind::Signature,
        }
    }

    /// Reportable metric sampled by data collectors after every step
    ///
    /// Groups report seats per owner (largest first); nodes and signatures
    /// own no seats and report an empty distribution.
    pub fn ownership_distribution(&self) -> &[usize] {
        match self {
            Entity::Group(group) => group.ownership_distribution(),
            Entity::Node(_) | Entity::Signature(_) => &[],
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Entity::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Entity::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Entity::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_signature(&self) -> Option<&Signature> {
        match self {
            Entity::Signature(signature) => Some(signature),
            _ => None,
        }
    }

    fn compute(&self, view: &StepView<'_>) -> Transition {
        match self {
            Entity::Node(node) => Transition::Node(node.compute()),
            Entity::Group(group) => Transition::Group(group.compute(view.config)),
            Entity::Signature(signature) => Transition::Signature(signature.compute(view)),
        }
    }

    fn commit(&mut self, transition: Transition, events: &mut Vec<SignatureEvent>) {
        match (self, transition) {
            (Entity::Node(node), Transition::Node(t)) => node.commit(t),
            (Entity::Group(group), Transition::Group(t)) => group.commit(t),
            (Entity::Signature(signature), Transition::Signature(mut t)) => {
                if let Some(event) = t.take_event() {
                    events.push(event);
                }
                signature.commit(t);
            }
            (entity, _) => {
                log::error!("transition kind mismatch for entity {}", entity.id());
            }
        }
    }
}

enum Transition {
    Node(NodeTransition),
    Group(GroupTransition),
    Signature(SignatureTransition),
}

// ============================================================================
// Snapshot View
// ============================================================================

/// Read-only start-of-tick view handed to every entity's compute pass
pub struct StepView<'a> {
    pub tick: Tick,
    pub config: &'a BeaconConfig,
    entities: &'a IndexMap<EntityId, Entity>,
}

impl<'a> StepView<'a> {
    pub fn get(&self, id: EntityId) -> Option<&'a Entity> {
        self.entities.get(&id)
    }

    pub fn node(&self, id: EntityId) -> Option<&'a Node> {
        self.get(id).and_then(Entity::as_node)
    }

    pub fn group(&self, id: EntityId) -> Option<&'a Group> {
        self.get(id).and_then(Entity::as_group)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Stable-id arena of registered entities
///
/// `advance_all` is two-phase: every admitted entity computes its transition
/// against the same frozen snapshot, then all transitions are committed. The
/// outcome of a tick is therefore independent of iteration order.
///
/// Entities registered between ticks are visible through `get`/`iter`
/// immediately but are only admitted to advancement once the next
/// `advance_all` has finished, so they first step on the tick after that.
#[derive(Debug, Default)]
pub struct Scheduler {
    entities: IndexMap<EntityId, Entity>,
    pending: IndexMap<EntityId, Entity>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity; returns false (and ignores it) if the id is taken
    pub fn register(&mut self, entity: Entity) -> bool {
        let id = entity.id();
        if self.contains(id) {
            log::warn!("entity id {} already registered, ignoring {:?}", id, entity.kind());
            return false;
        }

        self.pending.insert(id, entity);
        true
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id) || self.pending.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id).or_else(|| self.pending.get(&id))
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        match self.entities.get_mut(&id) {
            Some(entity) => Some(entity),
            None => self.pending.get_mut(&id),
        }
    }

    /// All registered entities in registration order (admitted first)
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values().chain(self.pending.values())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.iter().filter_map(Entity::as_node)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> + '_ {
        self.iter().filter_map(Entity::as_group)
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> + '_ {
        self.iter().filter_map(Entity::as_signature)
    }

    pub fn len(&self) -> usize {
        self.entities.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance every admitted entity by one tick
    ///
    /// Returns the failed-signature records produced during the commit pass.
    pub fn advance_all(&mut self, tick: Tick, config: &BeaconConfig) -> Vec<SignatureEvent> {
        let transitions: Vec<Transition> = {
            let view = StepView {
                tick,
                config,
                entities: &self.entities,
            };
            self.entities.values().map(|entity| entity.compute(&view)).collect()
        };

        let mut events = Vec::new();
        for (entity, transition) in self.entities.values_mut().zip(transitions) {
            entity.commit(transition, &mut events);
        }

        let admitted = self.admit();
        if admitted > 0 {
            log::debug!("tick {}: admitted {} new entities", tick, admitted);
        }

        events
    }

    /// Make pending registrations eligible for the next `advance_all`
    ///
    /// Called at the end of every tick; also used once at start-up so the
    /// initial population steps on the first tick.
    pub fn admit(&mut self) -> usize {
        let admitted = self.pending.len();
        self.entities.extend(self.pending.drain(..));
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon_interface::{GroupStatus, NodeState};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> BeaconConfig {
        BeaconConfig {
            nodes: 6,
            ticket_distribution: vec![1; 6],
            group_size: 3,
            min_nodes: 3,
            node_failure_percent: 0.2,
            node_death_percent: 0.2,
            node_connection_delay: 1,
            node_mainloop_connection_delay: 1,
            group_expiry: 2,
            ..Default::default()
        }
    }

    fn populate(scheduler: &mut Scheduler, config: &BeaconConfig, seed: u8) {
        let mut rng = StdRng::from_seed([seed; 32]);
        for i in 0..config.nodes {
            scheduler.register(Entity::Node(Node::new(i as EntityId, i, config, &mut rng)));
        }
    }

    fn node_states(scheduler: &Scheduler) -> Vec<(EntityId, NodeState)> {
        let mut states: Vec<_> = scheduler.nodes().map(|n| (n.id(), n.state())).collect();
        states.sort_by_key(|(id, _)| *id);
        states
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let config = config();
        let mut scheduler = Scheduler::new();
        populate(&mut scheduler, &config, 1);

        let group = Group::new(3, 0, vec![0, 1, 2], 5);
        assert!(!scheduler.register(Entity::Group(group)));
        assert_eq!(scheduler.len(), 6);
    }

    #[test]
    fn test_registration_deferred_to_next_tick() {
        let config = config();
        let mut scheduler = Scheduler::new();
        scheduler.register(Entity::Group(Group::new(100, 0, vec![1, 2, 3], 2)));

        // Visible immediately, but not advanced by the tick that admits it
        assert!(scheduler.get(100).is_some());
        scheduler.advance_all(0, &config);
        assert_eq!(scheduler.groups().next().map(Group::expires_in), Some(2));

        scheduler.advance_all(1, &config);
        assert_eq!(scheduler.groups().next().map(Group::expires_in), Some(1));

        scheduler.advance_all(2, &config);
        assert_eq!(scheduler.groups().next().map(Group::status), Some(GroupStatus::Expired));
        // Retired groups remain registered
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_order_independent_advance() {
        let config = config();

        let mut forward = Scheduler::new();
        populate(&mut forward, &config, 7);

        // Same entities registered in reverse order
        let mut reverse = Scheduler::new();
        let mut rng = StdRng::from_seed([7u8; 32]);
        let mut nodes: Vec<Node> = (0..config.nodes)
            .map(|i| Node::new(i as EntityId, i, &config, &mut rng))
            .collect();
        nodes.reverse();
        for node in nodes {
            reverse.register(Entity::Node(node));
        }

        for tick in 0..30 {
            forward.advance_all(tick, &config);
            reverse.advance_all(tick, &config);
            assert_eq!(node_states(&forward), node_states(&reverse));
        }
    }

    #[test]
    fn test_iter_covers_admitted_and_pending() {
        let config = config();
        let mut scheduler = Scheduler::new();
        populate(&mut scheduler, &config, 2);
        scheduler.advance_all(0, &config);
        scheduler.register(Entity::Group(Group::new(50, 0, vec![0, 1, 2], 5)));

        let kinds: Vec<EntityKind> = scheduler.iter().map(Entity::kind).collect();
        assert_eq!(kinds.len(), 7);
        assert_eq!(kinds.last(), Some(&EntityKind::Group));
        assert_eq!(scheduler.nodes().count(), 6);
        assert_eq!(scheduler.groups().count(), 1);
    }
}
