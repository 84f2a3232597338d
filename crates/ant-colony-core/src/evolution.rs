use crate::config::{EvolutionCadence, ParentSelection, PolicyKind, SimConfig};
use crate::genome::{EvolutionRates, Genome};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};
use tracing::{debug, warn};

pub const POOL_SCHEMA_VERSION: u32 = 1;

/// Mean elite fitness at which colony knowledge saturates.
pub const KNOWLEDGE_SATURATION: f32 = 100.0;

#[derive(Clone, Debug, PartialEq)]
pub struct EliteRecord {
    pub fitness: f32,
    pub genome: Genome,
}

/// Fixed-capacity arena of elites with a rank index sorted by
/// non-increasing fitness. Slots are reused in place on eviction.
#[derive(Clone, Debug)]
pub struct ElitePool {
    capacity: usize,
    slots: Vec<EliteRecord>,
    ranking: Vec<usize>,
}

impl ElitePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            ranking: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ranking.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    /// Elites in rank order, best first.
    pub fn iter(&self) -> impl Iterator<Item = &EliteRecord> + '_ {
        self.ranking.iter().map(move |&i| &self.slots[i])
    }

    pub fn get(&self, rank: usize) -> Option<&EliteRecord> {
        self.ranking.get(rank).map(|&i| &self.slots[i])
    }

    pub fn best(&self) -> Option<&EliteRecord> {
        self.get(0)
    }

    pub fn lowest(&self) -> Option<&EliteRecord> {
        self.ranking.last().map(|&i| &self.slots[i])
    }

    /// Insert if there is room or `fitness` strictly beats the lowest elite.
    /// Non-finite scores are never recorded.
    pub fn insert(&mut self, genome: Genome, fitness: f32) -> bool {
        if !fitness.is_finite() || self.capacity == 0 {
            return false;
        }
        let slot = if self.slots.len() < self.capacity {
            self.slots.push(EliteRecord { fitness, genome });
            self.slots.len() - 1
        } else {
            let Some(&lowest) = self.ranking.last() else {
                return false;
            };
            if fitness <= self.slots[lowest].fitness {
                return false;
            }
            self.ranking.pop();
            self.slots[lowest] = EliteRecord { fitness, genome };
            lowest
        };
        // Equal scores rank after incumbents.
        let pos = self
            .ranking
            .partition_point(|&i| self.slots[i].fitness >= fitness);
        self.ranking.insert(pos, slot);
        true
    }

    /// Scale every elite's fitness. Non-negative factors keep the ranking.
    pub fn scale_fitness(&mut self, factor: f32) {
        for record in &mut self.slots {
            record.fitness *= factor;
        }
    }

    pub fn average_fitness(&self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        Some(self.iter().map(|e| e.fitness).sum::<f32>() / self.len() as f32)
    }

    /// Mean pairwise gene distance between elites, capped at 1. A pool with
    /// fewer than two elites counts as fully diverse.
    pub fn diversity(&self) -> f32 {
        if self.len() < 2 {
            return 1.0;
        }
        let elites: Vec<&Genome> = self.iter().map(|e| &e.genome).collect();
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, a) in elites.iter().enumerate() {
            for b in &elites[i + 1..] {
                if let Some(d) = a.gene_distance(b) {
                    total += d;
                    pairs += 1;
                }
            }
        }
        if pairs == 0 {
            return 1.0;
        }
        (total / pairs as f32).min(1.0)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.ranking.clear();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionStats {
    pub total_retired: u64,
    pub best_fitness_ever: f32,
    pub last_fitness: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EliteSnapshot {
    pub fitness: f32,
    pub genes: Vec<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub best_fitness: f32,
    pub average_fitness: f32,
    pub last_population: usize,
}

/// Persisted elite pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub schema_version: u32,
    pub generation: u64,
    pub policy_kind: PolicyKind,
    pub elites: Vec<EliteSnapshot>,
    #[serde(default)]
    pub stats: PoolStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    Parse(String),
    UnsupportedSchema { expected: u32, found: u32 },
    PolicyKindMismatch { expected: PolicyKind, found: PolicyKind },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Parse(msg) => write!(f, "malformed pool snapshot: {msg}"),
            SnapshotError::UnsupportedSchema { expected, found } => write!(
                f,
                "pool snapshot schema {found} is not supported (expected {expected})"
            ),
            SnapshotError::PolicyKindMismatch { expected, found } => write!(
                f,
                "pool snapshot holds {found:?} policies but the colony runs {expected:?}"
            ),
        }
    }
}

impl Error for SnapshotError {}

/// Bounded elite memory, parent selection and the generation counter.
#[derive(Clone, Debug)]
pub struct EvolutionEngine {
    kind: PolicyKind,
    pool: ElitePool,
    generation: u64,
    rates: EvolutionRates,
    parent_selection: ParentSelection,
    cadence: EvolutionCadence,
    elite_fitness_decay: f32,
    ticks_since_advance: u64,
    retired_since_advance: usize,
    /// Retirements needed for a turnover advance; zero until first observed.
    turnover_target: usize,
    last_population: usize,
    stats: EvolutionStats,
}

impl EvolutionEngine {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            kind: config.policy_kind,
            pool: ElitePool::new(config.pool_cap),
            generation: 0,
            rates: EvolutionRates::from_config(config),
            parent_selection: config.parent_selection,
            cadence: config.evolution_cadence,
            elite_fitness_decay: config.elite_fitness_decay,
            ticks_since_advance: 0,
            retired_since_advance: 0,
            turnover_target: 0,
            last_population: 0,
            stats: EvolutionStats::default(),
        }
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pool(&self) -> &ElitePool {
        &self.pool
    }

    pub fn stats(&self) -> &EvolutionStats {
        &self.stats
    }

    pub fn rates(&self) -> &EvolutionRates {
        &self.rates
    }

    /// Record a retired agent's genome and score.
    pub fn record(&mut self, genome: Genome, fitness: f32) -> bool {
        self.stats.total_retired += 1;
        if !fitness.is_finite() {
            debug!(fitness, "non-finite fitness not recorded");
            return false;
        }
        self.stats.last_fitness = Some(fitness);
        if fitness > self.stats.best_fitness_ever {
            self.stats.best_fitness_ever = fitness;
        }
        if genome.kind() != self.kind {
            debug!(kind = ?genome.kind(), "genome of foreign policy kind not recorded");
            return false;
        }
        self.pool.insert(genome, fitness)
    }

    /// Genome for a newly spawned agent.
    pub fn spawn_policy<R: Rng + ?Sized>(&self, rng: &mut R) -> Genome {
        match self.pool.len() {
            0 => {
                let mut genome = Genome::random(self.kind, rng);
                genome.clamp(&self.rates);
                genome
            }
            1 => {
                let mut child = self.pool.iter().next().map_or_else(
                    || Genome::random(self.kind, rng),
                    |elite| elite.genome.clone(),
                );
                child.mutate(rng, &self.rates);
                child
            }
            _ => {
                let (a, b) = self.select_parents(rng);
                let (Some(pa), Some(pb)) = (self.pool.get(a), self.pool.get(b)) else {
                    return Genome::random(self.kind, rng);
                };
                let mut child = pa.genome.crossover(&pb.genome, rng, &self.rates);
                child.mutate(rng, &self.rates);
                child
            }
        }
    }

    /// Two distinct ranks. Requires a pool of at least two.
    fn select_parents<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, usize) {
        let n = self.pool.len();
        let weights: Vec<f32> = match self.parent_selection {
            ParentSelection::Uniform => vec![1.0; n],
            ParentSelection::FitnessWeighted => {
                self.pool.iter().map(|e| e.fitness.max(0.0)).collect()
            }
        };
        let first = weighted_index(&weights, None, rng);
        let second = weighted_index(&weights, Some(first), rng);
        (first, second)
    }

    pub fn advance_generation(&mut self) {
        self.generation += 1;
        self.pool.scale_fitness(self.elite_fitness_decay);
        self.ticks_since_advance = 0;
        self.retired_since_advance = 0;
        debug!(
            generation = self.generation,
            elites = self.pool.len(),
            best = self.pool.best().map(|e| e.fitness),
            "generation advanced"
        );
    }

    /// Feed one tick's retirements and live population into the cadence.
    /// Returns true when the generation advanced.
    pub fn on_tick(&mut self, retired: usize, population: usize) -> bool {
        self.ticks_since_advance += 1;
        self.retired_since_advance += retired;
        self.last_population = population;
        if self.turnover_target == 0 {
            self.turnover_target = population.max(1);
        }
        let due = match self.cadence {
            EvolutionCadence::FixedTicks { interval } => self.ticks_since_advance >= interval,
            EvolutionCadence::PopulationTurnover => {
                self.retired_since_advance >= self.turnover_target
            }
        };
        if due {
            self.advance_generation();
            self.turnover_target = population.max(1);
        }
        due
    }

    /// Accumulated knowledge in `[0, 1]`: mean elite fitness over
    /// [`KNOWLEDGE_SATURATION`]. Zero for an empty pool.
    pub fn knowledge(&self) -> f32 {
        let avg = self.pool.average_fitness().unwrap_or(0.0);
        (avg / KNOWLEDGE_SATURATION).clamp(0.0, 1.0)
    }

    /// Clear the pool and counters.
    pub fn reset(&mut self) {
        self.pool.clear();
        self.generation = 0;
        self.ticks_since_advance = 0;
        self.retired_since_advance = 0;
        self.turnover_target = 0;
        self.stats = EvolutionStats::default();
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let elites: Vec<EliteSnapshot> = self
            .pool
            .iter()
            .map(|e| EliteSnapshot {
                fitness: e.fitness,
                genes: e.genome.data().to_vec(),
            })
            .collect();
        let average_fitness = self.pool.average_fitness().unwrap_or(0.0);
        PoolSnapshot {
            schema_version: POOL_SCHEMA_VERSION,
            generation: self.generation,
            policy_kind: self.kind,
            elites,
            stats: PoolStats {
                best_fitness: self.stats.best_fitness_ever,
                average_fitness,
                last_population: self.last_population,
            },
        }
    }

    /// Rebuild from persisted data. Individual elites that fail validation are
    /// skipped; the snapshot as a whole is rejected only for schema or kind.
    pub fn restore(snapshot: PoolSnapshot, config: &SimConfig) -> Result<Self, SnapshotError> {
        if snapshot.schema_version != POOL_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedSchema {
                expected: POOL_SCHEMA_VERSION,
                found: snapshot.schema_version,
            });
        }
        if snapshot.policy_kind != config.policy_kind {
            return Err(SnapshotError::PolicyKindMismatch {
                expected: config.policy_kind,
                found: snapshot.policy_kind,
            });
        }
        let mut engine = Self::new(config);
        engine.generation = snapshot.generation;
        engine.last_population = snapshot.stats.last_population;
        for (i, elite) in snapshot.elites.into_iter().enumerate() {
            if !elite.fitness.is_finite() {
                warn!(elite = i, "skipping elite with non-finite fitness");
                continue;
            }
            match Genome::from_genes(engine.kind, elite.genes, &engine.rates) {
                Ok(genome) => {
                    engine.pool.insert(genome, elite.fitness);
                }
                Err(e) => warn!(elite = i, error = %e, "skipping invalid elite"),
            }
        }
        let best_loaded = engine.pool.best().map_or(0.0, |e| e.fitness);
        let best_saved = if snapshot.stats.best_fitness.is_finite() {
            snapshot.stats.best_fitness
        } else {
            0.0
        };
        engine.stats.best_fitness_ever = best_saved.max(best_loaded);
        Ok(engine)
    }

    pub fn from_json(json: &str, config: &SimConfig) -> Result<Self, SnapshotError> {
        let snapshot: PoolSnapshot =
            serde_json::from_str(json).map_err(|e| SnapshotError::Parse(e.to_string()))?;
        Self::restore(snapshot, config)
    }

    /// Restore from optional persisted JSON. Missing or unusable data yields
    /// an empty engine at generation 0.
    pub fn restore_from_json(json: Option<&str>, config: &SimConfig) -> Self {
        let Some(json) = json else {
            return Self::new(config);
        };
        match Self::from_json(json, config) {
            Ok(engine) => engine,
            Err(e) => {
                warn!(error = %e, "discarding persisted pool");
                Self::new(config)
            }
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

/// Draw an index proportional to `weights`, skipping `exclude`.
/// Falls back to uniform when the remaining weight is zero.
fn weighted_index<R: Rng + ?Sized>(weights: &[f32], exclude: Option<usize>, rng: &mut R) -> usize {
    let eligible = |i: usize| Some(i) != exclude;
    let total: f32 = weights
        .iter()
        .enumerate()
        .filter(|&(i, _)| eligible(i))
        .map(|(_, w)| *w)
        .sum();
    if total > 0.0 && total.is_finite() {
        let mut target = rng.random_range(0.0..total);
        for (i, &w) in weights.iter().enumerate() {
            if !eligible(i) {
                continue;
            }
            if target < w {
                return i;
            }
            target -= w;
        }
    }
    let candidates: Vec<usize> = (0..weights.len()).filter(|&i| eligible(i)).collect();
    candidates
        .get(rng.random_range(0..candidates.len().max(1)))
        .copied()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::TRAIT_RANGES;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn genome(rng: &mut ChaCha12Rng) -> Genome {
        Genome::random(PolicyKind::Heuristic, rng)
    }

    fn ranked(pool: &ElitePool) -> Vec<f32> {
        pool.iter().map(|e| e.fitness).collect()
    }

    #[test]
    fn pool_stays_bounded_and_sorted() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let mut pool = ElitePool::new(10);
        for _ in 0..200 {
            let fitness = rng.random_range(0.0..100.0);
            pool.insert(genome(&mut rng), fitness);
            assert!(pool.len() <= 10);
            let scores = ranked(&pool);
            assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        }
        assert_eq!(pool.len(), 10);
    }

    #[test]
    fn better_record_evicts_lowest_from_full_pool() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let mut pool = ElitePool::new(50);
        for i in 0..50 {
            pool.insert(genome(&mut rng), i as f32);
        }
        let newcomer = genome(&mut rng);
        assert!(pool.insert(newcomer.clone(), 25.5));
        assert_eq!(pool.len(), 50);
        assert!(!pool.iter().any(|e| e.fitness == 0.0));
        assert!(pool.iter().any(|e| e.genome == newcomer && e.fitness == 25.5));
        assert_eq!(pool.lowest().map(|e| e.fitness), Some(1.0));
    }

    #[test]
    fn ties_keep_the_incumbent() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let mut pool = ElitePool::new(2);
        let incumbent = genome(&mut rng);
        pool.insert(genome(&mut rng), 9.0);
        pool.insert(incumbent.clone(), 4.0);
        assert!(!pool.insert(genome(&mut rng), 4.0));
        assert_eq!(pool.lowest().map(|e| &e.genome), Some(&incumbent));
    }

    #[test]
    fn equal_scores_rank_after_existing_entries() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let mut pool = ElitePool::new(5);
        let first = genome(&mut rng);
        pool.insert(first.clone(), 5.0);
        pool.insert(genome(&mut rng), 5.0);
        assert_eq!(pool.best().map(|e| &e.genome), Some(&first));
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let mut engine = EvolutionEngine::new(&SimConfig::default());
        assert!(!engine.record(genome(&mut rng), f32::NAN));
        assert!(!engine.record(genome(&mut rng), f32::INFINITY));
        assert!(engine.pool().is_empty());
        assert_eq!(engine.stats().total_retired, 2);
    }

    #[test]
    fn spawn_uses_pool_and_respects_ranges() {
        let cfg = SimConfig::default();
        let mut rng = ChaCha12Rng::seed_from_u64(6);
        let mut engine = EvolutionEngine::new(&cfg);
        let check = |g: &Genome| {
            g.data()
                .iter()
                .zip(TRAIT_RANGES.iter())
                .all(|(v, r)| (r.min..=r.max).contains(v))
        };
        assert!(check(&engine.spawn_policy(&mut rng)));
        engine.record(genome(&mut rng), 10.0);
        assert!(check(&engine.spawn_policy(&mut rng)));
        for i in 0..10 {
            engine.record(genome(&mut rng), i as f32);
        }
        for _ in 0..50 {
            let child = engine.spawn_policy(&mut rng);
            assert_eq!(child.kind(), PolicyKind::Heuristic);
            assert!(check(&child));
        }
    }

    #[test]
    fn fitness_weighted_selection_prefers_strong_parents() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let weights = [100.0, 0.0, 0.0];
        for _ in 0..100 {
            assert_eq!(weighted_index(&weights, None, &mut rng), 0);
            assert_ne!(weighted_index(&weights, Some(0), &mut rng), 0);
        }
    }

    #[test]
    fn advance_decays_fitness_and_keeps_pool() {
        let mut rng = ChaCha12Rng::seed_from_u64(8);
        let mut engine = EvolutionEngine::new(&SimConfig::default());
        engine.record(genome(&mut rng), 100.0);
        engine.record(genome(&mut rng), 50.0);
        engine.advance_generation();
        assert_eq!(engine.generation(), 1);
        let scores = ranked(engine.pool());
        assert!((scores[0] - 95.0).abs() < 1e-4);
        assert!((scores[1] - 47.5).abs() < 1e-4);
    }

    #[test]
    fn fixed_tick_cadence_advances_on_interval() {
        let cfg = SimConfig {
            evolution_cadence: EvolutionCadence::FixedTicks { interval: 3 },
            ..SimConfig::default()
        };
        let mut engine = EvolutionEngine::new(&cfg);
        let advanced: Vec<bool> = (0..6).map(|_| engine.on_tick(0, 10)).collect();
        assert_eq!(advanced, vec![false, false, true, false, false, true]);
        assert_eq!(engine.generation(), 2);
    }

    #[test]
    fn turnover_cadence_waits_for_population_worth_of_retirements() {
        let cfg = SimConfig {
            evolution_cadence: EvolutionCadence::PopulationTurnover,
            ..SimConfig::default()
        };
        let mut engine = EvolutionEngine::new(&cfg);
        assert!(!engine.on_tick(0, 3));
        assert!(!engine.on_tick(2, 3));
        assert!(engine.on_tick(1, 3));
        assert_eq!(engine.generation(), 1);
        assert!(!engine.on_tick(1, 5));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let cfg = SimConfig::default();
        let mut rng = ChaCha12Rng::seed_from_u64(10);
        let mut engine = EvolutionEngine::new(&cfg);
        for i in 0..5 {
            engine.record(genome(&mut rng), i as f32 * 3.0);
        }
        engine.advance_generation();
        let json = engine.to_json().unwrap();
        let restored = EvolutionEngine::from_json(&json, &cfg).unwrap();
        assert_eq!(restored.generation(), 1);
        assert_eq!(restored.snapshot().elites, engine.snapshot().elites);
        assert_eq!(restored.stats().best_fitness_ever, 12.0);
    }

    #[test]
    fn malformed_or_missing_json_restores_empty_engine() {
        let cfg = SimConfig::default();
        for json in [None, Some("not json"), Some("{\"generation\": 4}")] {
            let engine = EvolutionEngine::restore_from_json(json, &cfg);
            assert_eq!(engine.generation(), 0);
            assert!(engine.pool().is_empty());
        }
    }

    #[test]
    fn invalid_elites_are_skipped_individually() {
        let cfg = SimConfig::default();
        let json = r#"{
            "schema_version": 1,
            "generation": 7,
            "policy_kind": "heuristic",
            "elites": [
                { "fitness": 30.0, "genes": [2.0, 0.2, 0.2, 1.0, 0.01] },
                { "fitness": 20.0, "genes": [1.0, 2.0] },
                { "fitness": 10.0, "genes": [9.0, 0.2, 0.2, 1.0, 0.01] }
            ]
        }"#;
        let engine = EvolutionEngine::restore_from_json(Some(json), &cfg);
        assert_eq!(engine.generation(), 7);
        assert_eq!(ranked(engine.pool()), vec![30.0, 10.0]);
        let clamped = engine.pool().get(1).unwrap().genome.traits().unwrap();
        assert_eq!(clamped.speed, 4.0);
    }

    #[test]
    fn mismatched_policy_kind_is_rejected() {
        let cfg = SimConfig::default();
        let snapshot = PoolSnapshot {
            schema_version: POOL_SCHEMA_VERSION,
            generation: 3,
            policy_kind: PolicyKind::Network,
            elites: Vec::new(),
            stats: PoolStats::default(),
        };
        assert!(matches!(
            EvolutionEngine::restore(snapshot, &cfg),
            Err(SnapshotError::PolicyKindMismatch { .. })
        ));
    }

    #[test]
    fn reset_clears_pool_and_generation() {
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let mut engine = EvolutionEngine::new(&SimConfig::default());
        engine.record(genome(&mut rng), 5.0);
        engine.advance_generation();
        engine.reset();
        assert_eq!(engine.generation(), 0);
        assert!(engine.pool().is_empty());
    }

    #[test]
    fn identical_elites_give_zero_diversity() {
        let mut rng = ChaCha12Rng::seed_from_u64(12);
        let mut pool = ElitePool::new(4);
        assert_eq!(pool.diversity(), 1.0);
        let g = genome(&mut rng);
        pool.insert(g.clone(), 3.0);
        assert_eq!(pool.diversity(), 1.0);
        pool.insert(g.clone(), 2.0);
        pool.insert(g, 1.0);
        assert_eq!(pool.diversity(), 0.0);
        pool.insert(genome(&mut rng), 4.0);
        let d = pool.diversity();
        assert!(d > 0.0 && d <= 1.0);
    }

    #[test]
    fn knowledge_tracks_mean_elite_fitness_and_saturates() {
        let mut rng = ChaCha12Rng::seed_from_u64(13);
        let mut engine = EvolutionEngine::new(&SimConfig::default());
        assert_eq!(engine.knowledge(), 0.0);
        engine.record(genome(&mut rng), 20.0);
        engine.record(genome(&mut rng), 40.0);
        assert_eq!(engine.pool().average_fitness(), Some(30.0));
        assert!((engine.knowledge() - 0.3).abs() < 1e-6);
        engine.record(genome(&mut rng), 500.0);
        assert_eq!(engine.knowledge(), 1.0);
    }
}
