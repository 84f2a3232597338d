use crate::constants::FEATURE_COUNT;
use crate::genome::PolicyDataError;

/// Feedforward controller: 27 perception features → 16 hidden (tanh) → 3 raw outputs.
/// Stack-allocated, no heap. 499 weights total.
///
/// Outputs are pre-activation: `[turn, speed, explore]`. The policy applies
/// the squashing functions.
const INPUT_SIZE: usize = FEATURE_COUNT;
const HIDDEN_SIZE: usize = 16;
const OUTPUT_SIZE: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct NeuralNet {
    pub w_ih: [[f32; HIDDEN_SIZE]; INPUT_SIZE],
    pub b_h: [f32; HIDDEN_SIZE],
    pub w_ho: [[f32; OUTPUT_SIZE]; HIDDEN_SIZE],
    pub b_o: [f32; OUTPUT_SIZE],
}

impl NeuralNet {
    pub const WEIGHT_COUNT: usize =
        INPUT_SIZE * HIDDEN_SIZE + HIDDEN_SIZE + HIDDEN_SIZE * OUTPUT_SIZE + OUTPUT_SIZE;

    /// Create a NN from an iterator of f32 values. Panics if fewer than WEIGHT_COUNT values.
    pub fn from_weights(mut weights: impl Iterator<Item = f32>) -> Self {
        let mut next = || {
            weights
                .next()
                .expect("insufficient weights: need WEIGHT_COUNT (499) elements")
        };

        let mut w_ih = [[0.0f32; HIDDEN_SIZE]; INPUT_SIZE];
        for row in &mut w_ih {
            for w in row.iter_mut() {
                *w = next();
            }
        }

        let mut b_h = [0.0f32; HIDDEN_SIZE];
        for b in &mut b_h {
            *b = next();
        }

        let mut w_ho = [[0.0f32; OUTPUT_SIZE]; HIDDEN_SIZE];
        for row in &mut w_ho {
            for w in row.iter_mut() {
                *w = next();
            }
        }

        let mut b_o = [0.0f32; OUTPUT_SIZE];
        for b in &mut b_o {
            *b = next();
        }

        Self {
            w_ih,
            b_h,
            w_ho,
            b_o,
        }
    }

    /// Checked variant of [`from_weights`](Self::from_weights) for untrusted data.
    pub fn from_slice(weights: &[f32]) -> Result<Self, PolicyDataError> {
        if weights.len() != Self::WEIGHT_COUNT {
            return Err(PolicyDataError::WrongLength {
                expected: Self::WEIGHT_COUNT,
                actual: weights.len(),
            });
        }
        if let Some(index) = weights.iter().position(|w| !w.is_finite()) {
            return Err(PolicyDataError::NonFinite { index });
        }
        Ok(Self::from_weights(weights.iter().copied()))
    }

    pub fn forward(&self, input: &[f32; INPUT_SIZE]) -> [f32; OUTPUT_SIZE] {
        let mut hidden = self.b_h;
        for (i, &x) in input.iter().enumerate() {
            for (j, h) in hidden.iter_mut().enumerate() {
                *h += x * self.w_ih[i][j];
            }
        }
        for h in &mut hidden {
            *h = h.tanh();
        }

        let mut output = self.b_o;
        for (i, &h) in hidden.iter().enumerate() {
            for (j, o) in output.iter_mut().enumerate() {
                *o += h * self.w_ho[i][j];
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_count_matches_topology() {
        assert_eq!(NeuralNet::WEIGHT_COUNT, 27 * 16 + 16 + 16 * 3 + 3);
    }

    #[test]
    fn from_slice_fills_layers_in_order() {
        let weights: Vec<f32> = (0..NeuralNet::WEIGHT_COUNT)
            .map(|i| i as f32 * 0.001)
            .collect();
        let nn = NeuralNet::from_slice(&weights).unwrap();
        let hidden_bias = INPUT_SIZE * HIDDEN_SIZE;
        let output_weights = hidden_bias + HIDDEN_SIZE;
        assert_eq!(nn.w_ih[1][0], weights[HIDDEN_SIZE]);
        assert_eq!(nn.b_h[0], weights[hidden_bias]);
        assert_eq!(nn.w_ho[0][2], weights[output_weights + 2]);
        assert_eq!(nn.b_o[2], weights[NeuralNet::WEIGHT_COUNT - 1]);
    }

    #[test]
    fn from_slice_rejects_bad_data() {
        assert_eq!(
            NeuralNet::from_slice(&[0.0; 10]),
            Err(PolicyDataError::WrongLength {
                expected: NeuralNet::WEIGHT_COUNT,
                actual: 10
            })
        );
        let mut weights = vec![0.0; NeuralNet::WEIGHT_COUNT];
        weights[7] = f32::NAN;
        assert_eq!(
            NeuralNet::from_slice(&weights),
            Err(PolicyDataError::NonFinite { index: 7 })
        );
    }

    #[test]
    fn zero_network_outputs_biases() {
        let mut weights = vec![0.0; NeuralNet::WEIGHT_COUNT];
        let n = weights.len();
        weights[n - 3..].copy_from_slice(&[0.5, -0.25, 1.0]);
        let nn = NeuralNet::from_slice(&weights).unwrap();
        assert_eq!(nn.forward(&[1.0; INPUT_SIZE]), [0.5, -0.25, 1.0]);
    }
}
