//! Dependency edges, free-text dependency parsing, and the dependency
//! graph / topological ordering (spec §4.E).

use crate::component::ComponentId;
use crate::state::State;
use std::collections::{HashMap, HashSet};

/// A directed dependency: `from` cannot reach `Running` until `to` is at
/// least `required_state` (spec §3, "DependencyEdge").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub from: ComponentId,
    pub to: ComponentId,
    pub required_state: State,
}

/// Error returned when a declared dependency string cannot be parsed
/// (spec §4.E, "unparseable -> component Errored with 'bad dependency
/// syntax'").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySyntaxError {
    pub fragment: String,
}

/// Parse the declared free-text dependency form: `"<name>[:<state>], ..."`,
/// split on commas, semicolons, or whitespace. The state fragment matches
/// by case-insensitive prefix against the `State` enum; an omitted state
/// defaults to `Running`.
pub fn parse_dependency_spec(
    from: &ComponentId,
    spec: &str,
) -> Result<Vec<DependencyEdge>, DependencySyntaxError> {
    let mut edges = Vec::new();
    for token in spec.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (name, required_state) = match token.split_once(':') {
            Some((name, state_fragment)) => {
                let state = State::parse_prefix(state_fragment).ok_or_else(|| {
                    DependencySyntaxError {
                        fragment: token.to_string(),
                    }
                })?;
                (name, state)
            }
            None => (token, State::Running),
        };
        if name.is_empty() {
            return Err(DependencySyntaxError {
                fragment: token.to_string(),
            });
        }
        edges.push(DependencyEdge {
            from: from.clone(),
            to: ComponentId::new(name),
            required_state,
        });
    }
    Ok(edges)
}

/// Adjacency-list dependency graph keyed by source component.
///
/// The graph is a DAG by construction; `topo_order` detects cycles and
/// reports the last-touched node, matching spec §4.E and Scenario S6.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    edges: HashMap<ComponentId, Vec<DependencyEdge>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edge, de-duplicating by `(from, to)` and keeping the
    /// strictest `required_state` (spec §4.E).
    pub fn add_dependency(&mut self, from: ComponentId, to: ComponentId, required_state: State) {
        let edges = self.edges.entry(from.clone()).or_default();
        if let Some(existing) = edges.iter_mut().find(|e| e.to == to) {
            if strictness_rank(required_state) > strictness_rank(existing.required_state) {
                existing.required_state = required_state;
            }
            return;
        }
        edges.push(DependencyEdge {
            from,
            to,
            required_state,
        });
    }

    pub fn edges_from(&self, from: &ComponentId) -> &[DependencyEdge] {
        self.edges.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All components mentioned as either a source or a target.
    pub fn nodes(&self) -> HashSet<ComponentId> {
        let mut nodes = HashSet::new();
        for (from, edges) in &self.edges {
            nodes.insert(from.clone());
            for edge in edges {
                nodes.insert(edge.to.clone());
            }
        }
        nodes
    }

    /// `true` iff every outgoing edge of `from` points to a component in
    /// `ready_states` whose recorded state satisfies the edge's
    /// `required_state` (spec §4.E, "satisfiedBy").
    pub fn satisfied_by(
        &self,
        from: &ComponentId,
        ready_states: &HashMap<ComponentId, State>,
    ) -> bool {
        self.edges_from(from).iter().all(|edge| {
            ready_states
                .get(&edge.to)
                .is_some_and(|state| state.satisfies(edge.required_state))
        })
    }

    /// Leaves-first topological order over `roots` and their transitive
    /// dependencies. Returns the last-touched node of a cycle as `Err` if
    /// one is detected (spec §4.E).
    pub fn topo_order(&self, roots: &[ComponentId]) -> Result<Vec<ComponentId>, ComponentId> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<ComponentId, Mark> = HashMap::new();
        let mut order = Vec::new();
        let mut last_touched: Option<ComponentId> = None;

        fn visit(
            node: &ComponentId,
            graph: &DependencyGraph,
            marks: &mut HashMap<ComponentId, Mark>,
            order: &mut Vec<ComponentId>,
            last_touched: &mut Option<ComponentId>,
        ) -> Result<(), ComponentId> {
            match marks.get(node) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    *last_touched = Some(node.clone());
                    return Err(node.clone());
                }
                None => {}
            }
            marks.insert(node.clone(), Mark::Visiting);
            *last_touched = Some(node.clone());
            for edge in graph.edges_from(node) {
                visit(&edge.to, graph, marks, order, last_touched)?;
            }
            marks.insert(node.clone(), Mark::Done);
            if !order.contains(node) {
                order.push(node.clone());
            }
            Ok(())
        }

        for root in roots {
            if let Err(cycle_node) = visit(root, self, &mut marks, &mut order, &mut last_touched) {
                return Err(cycle_node);
            }
        }

        Ok(order)
    }
}

fn strictness_rank(state: State) -> u8 {
    // Higher rank = stricter requirement. Terminal states outrank the
    // active chain since they demand the dependency fully complete.
    match state {
        State::New => 0,
        State::Installing => 1,
        State::AwaitingStartup => 2,
        State::Starting => 3,
        State::Running => 4,
        State::Stopping => 5,
        State::Finished => 6,
        State::Errored => 7,
        State::Broken => 8,
    }
}
