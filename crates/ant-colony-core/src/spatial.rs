use crate::agent::Agent;
use crate::geom::Vec2;
use rstar::{RTree, RTreeObject, AABB};

/// Lightweight position-only struct for spatial indexing to avoid cloning full agents.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentLocation {
    pub id: u32,
    pub position: Vec2,
}

impl RTreeObject for AgentLocation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Build an R*-tree from the positions of living agents via bulk_load.
pub fn build_index(agents: &[Agent]) -> RTree<AgentLocation> {
    let locations: Vec<AgentLocation> = agents
        .iter()
        .filter(|a| a.is_alive())
        .map(|a| AgentLocation {
            id: a.id,
            position: a.position,
        })
        .collect();
    RTree::bulk_load(locations)
}

/// Visit every indexed agent within `radius` of `center`, except `self_id`.
pub fn for_each_neighbor<'a>(
    tree: &'a RTree<AgentLocation>,
    center: Vec2,
    radius: f64,
    self_id: u32,
    mut visitor: impl FnMut(&'a AgentLocation),
) {
    let envelope = AABB::from_corners(
        [center[0] - radius, center[1] - radius],
        [center[0] + radius, center[1] + radius],
    );
    let r_sq = radius * radius;
    for loc in tree.locate_in_envelope(&envelope) {
        if loc.id == self_id {
            continue;
        }
        let dx = loc.position[0] - center[0];
        let dy = loc.position[1] - center[1];
        if dx * dx + dy * dy <= r_sq {
            visitor(loc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AntState;
    use crate::config::SimConfig;
    use crate::genome::Genome;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    /// Ids of agents within `radius` of `center`, sorted ascending.
    fn query_neighbors(
        tree: &RTree<AgentLocation>,
        center: Vec2,
        radius: f64,
        self_id: u32,
    ) -> Vec<u32> {
        let mut result = Vec::new();
        for_each_neighbor(tree, center, radius, self_id, |loc| result.push(loc.id));
        result.sort_unstable();
        result
    }

    fn make_agent(id: u32, x: f64, y: f64) -> Agent {
        let cfg = SimConfig::default();
        let mut rng = ChaCha12Rng::seed_from_u64(id as u64);
        let genome = Genome::random(cfg.policy_kind, &mut rng);
        Agent::new(id, [x, y], 0.0, genome, &cfg)
    }

    #[test]
    fn query_finds_agents_within_radius() {
        let agents = vec![
            make_agent(0, 5.0, 5.0),
            make_agent(1, 6.0, 5.0),
            make_agent(2, 50.0, 50.0),
        ];
        let tree = build_index(&agents);
        let result = query_neighbors(&tree, [5.0, 5.0], 2.0, u32::MAX);
        assert_eq!(result, vec![0, 1]);
    }

    #[test]
    fn query_excludes_self() {
        let agents = vec![make_agent(0, 5.0, 5.0), make_agent(1, 6.0, 5.0)];
        let tree = build_index(&agents);
        assert_eq!(query_neighbors(&tree, [5.0, 5.0], 2.0, 0), vec![1]);
    }

    #[test]
    fn query_returns_agent_ids_not_indices() {
        let agents = vec![make_agent(42, 1.0, 1.0), make_agent(99, 1.5, 1.0)];
        let tree = build_index(&agents);
        assert_eq!(query_neighbors(&tree, [1.0, 1.0], 2.0, u32::MAX), vec![42, 99]);
    }

    #[test]
    fn dead_agents_are_not_indexed() {
        let mut agents = vec![make_agent(0, 1.0, 1.0), make_agent(1, 1.2, 1.0)];
        agents[1].state = AntState::Dead;
        let tree = build_index(&agents);
        assert_eq!(query_neighbors(&tree, [1.0, 1.0], 1.0, u32::MAX), vec![0]);
    }
}
