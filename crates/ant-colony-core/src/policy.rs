use crate::config::{PolicyKind, SimConfig};
use crate::constants::{NETWORK_DEPOSIT_STRENGTH, SENSITIVITY_GAIN};
use crate::genome::{Genome, PolicyDataError, Traits, TRAIT_COUNT};
use crate::nn::NeuralNet;
use crate::perception::Perception;
use rand::Rng;
use std::f64::consts::FRAC_PI_2;

/// One tick's command. Ranges are enforced by the agent, not here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    /// Relative heading change in radians.
    pub turn: f64,
    pub speed_factor: f64,
    /// Share of steering left to the policy rather than goal seeking.
    pub explore_bias: f64,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            turn: 0.0,
            speed_factor: 1.0,
            explore_bias: 0.0,
        }
    }
}

/// Decoded controller.
#[derive(Clone, Debug, PartialEq)]
pub enum Policy {
    Heuristic(Traits),
    Network(Box<NeuralNet>),
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl Policy {
    pub fn from_genome(genome: &Genome) -> Self {
        Self::try_from_genome(genome).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Decode a genome, rejecting data of the wrong shape.
    pub fn try_from_genome(genome: &Genome) -> Result<Self, PolicyDataError> {
        match genome.kind() {
            PolicyKind::Heuristic => genome.traits().map(Policy::Heuristic).ok_or(
                PolicyDataError::WrongLength {
                    expected: TRAIT_COUNT,
                    actual: genome.data().len(),
                },
            ),
            PolicyKind::Network => {
                NeuralNet::from_slice(genome.data()).map(|nn| Policy::Network(Box::new(nn)))
            }
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::Heuristic(_) => PolicyKind::Heuristic,
            Policy::Network(_) => PolicyKind::Network,
        }
    }

    pub fn base_speed(&self, config: &SimConfig) -> f64 {
        match self {
            Policy::Heuristic(t) => t.speed as f64,
            Policy::Network(_) => config.base_speed,
        }
    }

    /// Per-tick energy drain before movement cost.
    pub fn base_drain(&self, config: &SimConfig) -> f32 {
        match self {
            Policy::Heuristic(t) => t.energy_efficiency,
            Policy::Network(_) => config.base_energy_drain,
        }
    }

    pub fn deposit_strength(&self) -> f32 {
        match self {
            Policy::Heuristic(t) => t.deposit_strength,
            Policy::Network(_) => NETWORK_DEPOSIT_STRENGTH,
        }
    }

    pub fn decide<R: Rng + ?Sized>(&self, perception: &Perception, rng: &mut R) -> Decision {
        match self {
            Policy::Heuristic(t) => {
                let e = t.exploration as f64;
                let gain = (t.sensitivity as f64 * SENSITIVITY_GAIN).min(1.0);
                let follow = perception.trail_turn.map_or(0.0, |g| g * gain);
                let jitter = rng.random_range(-FRAC_PI_2..=FRAC_PI_2);
                Decision {
                    turn: (1.0 - e) * follow + e * jitter,
                    speed_factor: 1.0,
                    explore_bias: e,
                }
            }
            Policy::Network(nn) => {
                let out = nn.forward(&perception.features);
                let net_turn = out[0].tanh() as f64 * FRAC_PI_2;
                let speed_factor = sigmoid(out[1]) as f64 + 0.5;
                let e = sigmoid(out[2]) as f64;
                let turn = match perception.trail_turn {
                    Some(g) => e * net_turn + (1.0 - e) * g,
                    None => net_turn,
                };
                Decision {
                    turn,
                    speed_factor,
                    explore_bias: e,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::EvolutionRates;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn heuristic(exploration: f32, sensitivity: f32) -> Policy {
        Policy::Heuristic(Traits {
            speed: 2.0,
            sensitivity,
            exploration,
            deposit_strength: 1.0,
            energy_efficiency: 0.01,
        })
    }

    #[test]
    fn heuristic_follows_trail_when_exploration_is_low() {
        let policy = heuristic(0.0, 0.5);
        let mut perception = Perception::blank();
        perception.trail_turn = Some(0.4);
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let d = policy.decide(&perception, &mut rng);
        assert!((d.turn - 0.4).abs() < 1e-12);
        assert_eq!(d.speed_factor, 1.0);
        assert_eq!(d.explore_bias, 0.0);
    }

    #[test]
    fn heuristic_jitter_is_bounded_without_signal() {
        let policy = heuristic(0.4, 0.2);
        let perception = Perception::blank();
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        for _ in 0..200 {
            let d = policy.decide(&perception, &mut rng);
            assert!(d.turn.abs() <= 0.4 * FRAC_PI_2 + 1e-12);
        }
    }

    #[test]
    fn network_outputs_stay_in_activation_ranges() {
        let mut rng = ChaCha12Rng::seed_from_u64(8);
        let genome = Genome::random(PolicyKind::Network, &mut rng);
        let policy = Policy::from_genome(&genome);
        let mut perception = Perception::blank();
        perception.features = [1.0; crate::constants::FEATURE_COUNT];
        let d = policy.decide(&perception, &mut rng);
        assert!(d.turn.abs() <= FRAC_PI_2);
        assert!((0.5..=1.5).contains(&d.speed_factor));
        assert!((0.0..=1.0).contains(&d.explore_bias));
    }

    #[test]
    fn network_blends_toward_trail() {
        let weights = vec![0.0; NeuralNet::WEIGHT_COUNT];
        let genome =
            Genome::from_genes(PolicyKind::Network, weights, &EvolutionRates::default()).unwrap();
        let policy = Policy::from_genome(&genome);
        let mut perception = Perception::blank();
        perception.trail_turn = Some(1.0);
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let d = policy.decide(&perception, &mut rng);
        // Zero weights: net turn 0, explore sigmoid(0) = 0.5.
        assert!((d.turn - 0.5).abs() < 1e-9);
        assert!((d.speed_factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn policy_matches_genome_kind() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let cfg = SimConfig::default();
        let genome = Genome::random(PolicyKind::Heuristic, &mut rng);
        let policy = Policy::from_genome(&genome);
        assert_eq!(policy.kind(), PolicyKind::Heuristic);
        let traits = genome.traits().unwrap();
        assert_eq!(policy.base_speed(&cfg), traits.speed as f64);
        assert_eq!(policy.base_drain(&cfg), traits.energy_efficiency);
    }

    #[test]
    fn network_policy_carries_genome_weights() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let genome = Genome::random(PolicyKind::Network, &mut rng);
        let Ok(Policy::Network(nn)) = Policy::try_from_genome(&genome) else {
            panic!("expected a network policy");
        };
        let data = genome.data();
        assert_eq!(nn.w_ih[0][1], data[1]);
        assert_eq!(nn.b_o[2], data[NeuralNet::WEIGHT_COUNT - 1]);
    }
}
