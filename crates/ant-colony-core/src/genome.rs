use crate::config::{PolicyKind, SimConfig};
use crate::nn::NeuralNet;
use rand::Rng;
use std::{error::Error, fmt};

/// Valid range and variation steps for one gene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneRange {
    pub min: f32,
    pub max: f32,
    pub init_min: f32,
    pub init_max: f32,
    /// Half-width of a mutation perturbation, before scaling.
    pub mutation_step: f32,
}

impl GeneRange {
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    pub fn clamp(&self, v: f32) -> f32 {
        v.clamp(self.min, self.max)
    }
}

pub const TRAIT_COUNT: usize = 5;

/// Heuristic trait genes in order: speed, pheromone sensitivity, exploration
/// rate, deposit strength, energy efficiency (per-tick drain).
pub const TRAIT_RANGES: [GeneRange; TRAIT_COUNT] = [
    GeneRange {
        min: 1.0,
        max: 4.0,
        init_min: 1.5,
        init_max: 3.5,
        mutation_step: 0.2,
    },
    GeneRange {
        min: 0.01,
        max: 0.5,
        init_min: 0.05,
        init_max: 0.35,
        mutation_step: 0.05,
    },
    GeneRange {
        min: 0.05,
        max: 0.4,
        init_min: 0.1,
        init_max: 0.3,
        mutation_step: 0.05,
    },
    GeneRange {
        min: 0.5,
        max: 3.0,
        init_min: 0.8,
        init_max: 2.5,
        mutation_step: 0.3,
    },
    GeneRange {
        min: 0.005,
        max: 0.02,
        init_min: 0.008,
        init_max: 0.015,
        mutation_step: 0.002,
    },
];

/// Crossover noise for trait genes as a fraction of the gene span.
const TRAIT_CROSSOVER_NOISE: f32 = 0.05;

/// Decoded heuristic traits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Traits {
    pub speed: f32,
    pub sensitivity: f32,
    pub exploration: f32,
    pub deposit_strength: f32,
    pub energy_efficiency: f32,
}

impl Traits {
    pub fn from_genes(genes: &[f32; TRAIT_COUNT]) -> Self {
        Self {
            speed: genes[0],
            sensitivity: genes[1],
            exploration: genes[2],
            deposit_strength: genes[3],
            energy_efficiency: genes[4],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDataError {
    WrongLength { expected: usize, actual: usize },
    NonFinite { index: usize },
}

impl fmt::Display for PolicyDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyDataError::WrongLength { expected, actual } => {
                write!(f, "policy data has {actual} genes, expected {expected}")
            }
            PolicyDataError::NonFinite { index } => {
                write!(f, "policy gene {index} is not finite")
            }
        }
    }
}

impl Error for PolicyDataError {}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvolutionRates {
    /// Per-gene mutation probability.
    pub mutation_rate: f32,
    pub trait_mutation_scale: f32,
    pub weight_mutation_step: f32,
    pub weight_crossover_noise: f32,
    pub weight_limit: f32,
}

impl EvolutionRates {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            mutation_rate: config.mutation_rate,
            trait_mutation_scale: config.trait_mutation_scale,
            weight_mutation_step: config.weight_mutation_step,
            weight_crossover_noise: config.weight_crossover_noise,
            weight_limit: config.weight_limit,
        }
    }
}

impl Default for EvolutionRates {
    fn default() -> Self {
        Self::from_config(&SimConfig::default())
    }
}

/// Heritable policy data: trait genes or a flat network weight vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Genome {
    kind: PolicyKind,
    data: Vec<f32>,
}

impl Genome {
    pub fn expected_len(kind: PolicyKind) -> usize {
        match kind {
            PolicyKind::Heuristic => TRAIT_COUNT,
            PolicyKind::Network => NeuralNet::WEIGHT_COUNT,
        }
    }

    /// Range and mutation step of gene `index`.
    fn gene(&self, index: usize, rates: &EvolutionRates) -> (GeneRange, f32) {
        match self.kind {
            PolicyKind::Heuristic => {
                let range = TRAIT_RANGES[index];
                let noise = range.span() * TRAIT_CROSSOVER_NOISE;
                let step = range.mutation_step * rates.trait_mutation_scale;
                (GeneRange { mutation_step: step, ..range }, noise)
            }
            PolicyKind::Network => (
                GeneRange {
                    min: -rates.weight_limit,
                    max: rates.weight_limit,
                    init_min: -1.0,
                    init_max: 1.0,
                    mutation_step: rates.weight_mutation_step,
                },
                rates.weight_crossover_noise,
            ),
        }
    }

    pub fn random<R: Rng + ?Sized>(kind: PolicyKind, rng: &mut R) -> Self {
        let data = match kind {
            PolicyKind::Heuristic => TRAIT_RANGES
                .iter()
                .map(|r| rng.random_range(r.init_min..=r.init_max))
                .collect(),
            PolicyKind::Network => (0..NeuralNet::WEIGHT_COUNT)
                .map(|_| rng.random_range(-1.0f32..=1.0))
                .collect(),
        };
        Self { kind, data }
    }

    /// Validate externally supplied genes. Out-of-range values are clamped.
    pub fn from_genes(
        kind: PolicyKind,
        genes: Vec<f32>,
        rates: &EvolutionRates,
    ) -> Result<Self, PolicyDataError> {
        let expected = Self::expected_len(kind);
        if genes.len() != expected {
            return Err(PolicyDataError::WrongLength {
                expected,
                actual: genes.len(),
            });
        }
        if let Some(index) = genes.iter().position(|g| !g.is_finite()) {
            return Err(PolicyDataError::NonFinite { index });
        }
        let mut genome = Self { kind, data: genes };
        genome.clamp(rates);
        Ok(genome)
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mean absolute per-gene difference to `other`. Trait genes count as a
    /// fraction of their range, network weights as raw values. `None` when
    /// the genomes are not comparable.
    pub fn gene_distance(&self, other: &Genome) -> Option<f32> {
        if self.kind != other.kind
            || self.data.len() != other.data.len()
            || self.data.is_empty()
        {
            return None;
        }
        let total: f32 = self
            .data
            .iter()
            .zip(&other.data)
            .enumerate()
            .map(|(i, (a, b))| match self.kind {
                PolicyKind::Heuristic => (a - b).abs() / TRAIT_RANGES[i].span(),
                PolicyKind::Network => (a - b).abs(),
            })
            .sum();
        Some(total / self.data.len() as f32)
    }

    /// Decoded traits for heuristic genomes.
    pub fn traits(&self) -> Option<Traits> {
        match self.kind {
            PolicyKind::Heuristic => {
                let genes: [f32; TRAIT_COUNT] = self.data.as_slice().try_into().ok()?;
                Some(Traits::from_genes(&genes))
            }
            PolicyKind::Network => None,
        }
    }

    pub fn clamp(&mut self, rates: &EvolutionRates) {
        for i in 0..self.data.len() {
            let (range, _) = self.gene(i, rates);
            self.data[i] = range.clamp(self.data[i]);
        }
    }

    /// Element-wise average plus symmetric noise, clamped. Genomes of a
    /// different kind or length fall back to a copy of `self`.
    pub fn crossover<R: Rng + ?Sized>(
        &self,
        other: &Genome,
        rng: &mut R,
        rates: &EvolutionRates,
    ) -> Genome {
        if self.kind != other.kind || self.data.len() != other.data.len() {
            return self.clone();
        }
        let mut child = self.clone();
        for i in 0..child.data.len() {
            let (range, noise) = self.gene(i, rates);
            let mean = (self.data[i] + other.data[i]) * 0.5;
            let jitter = if noise > 0.0 {
                rng.random_range(-noise..=noise)
            } else {
                0.0
            };
            child.data[i] = range.clamp(mean + jitter);
        }
        child
    }

    /// Perturb each gene with probability `mutation_rate`, then clamp.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, rates: &EvolutionRates) {
        for i in 0..self.data.len() {
            if rng.random::<f32>() >= rates.mutation_rate {
                continue;
            }
            let (range, _) = self.gene(i, rates);
            let step = range.mutation_step;
            let delta = if step > 0.0 {
                rng.random_range(-step..=step)
            } else {
                0.0
            };
            self.data[i] = range.clamp(self.data[i] + delta);
        }
    }
}
