//! Pointwise activation functions used by the model families

use crate::error::{RigError, Result};

const LEAKY_SLOPE: f32 = 0.01;

/// Activation applied after convolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Tanh,
    Hardtanh,
    Fasttanh,
    ReLU,
    LeakyReLU,
    Sigmoid,
    SiLU,
    HardSwish,
}

impl Activation {
    /// Parse the name used in model files
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "Tanh" => Ok(Activation::Tanh),
            "Hardtanh" => Ok(Activation::Hardtanh),
            "Fasttanh" => Ok(Activation::Fasttanh),
            "ReLU" => Ok(Activation::ReLU),
            "LeakyReLU" => Ok(Activation::LeakyReLU),
            "Sigmoid" => Ok(Activation::Sigmoid),
            "SiLU" | "Swish" => Ok(Activation::SiLU),
            "Hardswish" | "HardSwish" => Ok(Activation::HardSwish),
            other => Err(RigError::load(
                "model",
                format!("unknown activation '{}'", other),
            )),
        }
    }

    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Hardtanh => x.clamp(-1.0, 1.0),
            Activation::Fasttanh => fast_tanh(x),
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_SLOPE * x
                }
            }
            Activation::Sigmoid => sigmoid(x),
            Activation::SiLU => x * sigmoid(x),
            Activation::HardSwish => x * (x + 3.0).clamp(0.0, 6.0) / 6.0,
        }
    }

    #[inline]
    pub fn apply_slice(self, values: &mut [f32]) {
        values.iter_mut().for_each(|v| *v = self.apply(*v));
    }
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Rational tanh approximation
#[inline]
pub fn fast_tanh(x: f32) -> f32 {
    let ax = x.abs();
    let x2 = x * x;
    (x * (2.455_507_5 + 2.455_507_5 * ax + (0.893_229_85 + 0.821_226_7 * ax) * x2))
        / (2.445_066_3 + (2.445_066_3 + x2) * (x + 0.814_642_73 * x * ax).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test_case("Tanh", Activation::Tanh)]
    #[test_case("ReLU", Activation::ReLU)]
    #[test_case("Fasttanh", Activation::Fasttanh)]
    #[test_case("Swish", Activation::SiLU)]
    fn test_parse(name: &str, expected: Activation) {
        assert_eq!(Activation::from_name(name).unwrap(), expected);
    }

    #[test]
    fn test_unknown_activation_is_load_error() {
        let err = Activation::from_name("Softplus").unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }

    #[test]
    fn test_fast_tanh_tracks_tanh() {
        for i in -40..=40 {
            let x = i as f32 / 10.0;
            assert_abs_diff_eq!(fast_tanh(x), x.tanh(), epsilon = 0.01);
        }
    }

    #[test]
    fn test_zero_maps_to_zero() {
        for act in [
            Activation::Tanh,
            Activation::Hardtanh,
            Activation::Fasttanh,
            Activation::ReLU,
            Activation::LeakyReLU,
            Activation::SiLU,
            Activation::HardSwish,
        ] {
            assert_eq!(act.apply(0.0), 0.0, "{:?}", act);
        }
        assert_abs_diff_eq!(Activation::Sigmoid.apply(0.0), 0.5);
    }
}
