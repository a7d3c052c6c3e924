//! Keyframe samplers
//!
//! A sampler is a table of key times and vec4 values plus the rule used
//! between keys. Cubic-spline samplers store three values per key:
//! in-tangent, value, out-tangent.

use std::str::FromStr;

use crate::foundation::math::{quat_from_xyzw, slerp_shortest, utils::hermite_weights, Quat, Vec4};
use super::AnimationError;

/// How values are produced between two keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Straight-line blend (slerp for rotations)
    Linear,
    /// Hold the earlier key until the next one
    Step,
    /// Cubic Hermite spline through the keys using stored tangents
    CubicSpline,
}

impl FromStr for Interpolation {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LINEAR" => Ok(Self::Linear),
            "STEP" => Ok(Self::Step),
            "CUBICSPLINE" => Ok(Self::CubicSpline),
            other => Err(AnimationError::UnsupportedInterpolation(other.to_string())),
        }
    }
}

/// Key times and values
#[derive(Debug, Clone)]
pub struct Sampler {
    /// Interpolation rule
    pub interpolation: Interpolation,
    inputs: Vec<f32>,
    outputs: Vec<Vec4>,
}

impl Sampler {
    /// Create a sampler, checking key order and output count
    pub fn new(interpolation: Interpolation, inputs: Vec<f32>, outputs: Vec<Vec4>) -> Result<Self, AnimationError> {
        let expected = match interpolation {
            Interpolation::CubicSpline => inputs.len() * 3,
            _ => inputs.len(),
        };
        if outputs.len() != expected {
            return Err(AnimationError::OutputLengthMismatch { expected, actual: outputs.len() });
        }
        if inputs.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(AnimationError::InputsNotSorted);
        }

        Ok(Self { interpolation, inputs, outputs })
    }

    /// Key times
    pub fn inputs(&self) -> &[f32] {
        &self.inputs
    }

    /// Raw output values (three per key for cubic splines)
    pub fn outputs(&self) -> &[Vec4] {
        &self.outputs
    }

    /// Earliest key time
    pub fn first_time(&self) -> Option<f32> {
        self.inputs.first().copied()
    }

    /// Latest key time
    pub fn last_time(&self) -> Option<f32> {
        self.inputs.last().copied()
    }

    /// Find `i` with `inputs[i] <= time <= inputs[i + 1]`
    ///
    /// Returns the key index and the normalized position inside the interval,
    /// or `None` when no pair of keys encloses `time`.
    pub fn bracket(&self, time: f32) -> Option<(usize, f32)> {
        self.inputs
            .windows(2)
            .position(|pair| pair[0] <= time && time <= pair[1])
            .map(|i| {
                let span = self.inputs[i + 1] - self.inputs[i];
                let u = if span > 0.0 { (time - self.inputs[i]) / span } else { 0.0 };
                (i, u)
            })
    }

    /// Value at key `index`
    pub fn value(&self, index: usize) -> Vec4 {
        match self.interpolation {
            Interpolation::CubicSpline => self.outputs[index * 3 + 1],
            _ => self.outputs[index],
        }
    }

    /// Key held by a STEP sampler; landing exactly on the later key shows it
    fn step_key(index: usize, u: f32) -> usize {
        if u >= 1.0 {
            index + 1
        } else {
            index
        }
    }

    /// Sample a vector value between key `index` and `index + 1`
    pub fn sample_vec4(&self, index: usize, u: f32) -> Vec4 {
        match self.interpolation {
            Interpolation::Step => self.value(Self::step_key(index, u)),
            Interpolation::Linear => self.value(index).lerp(&self.value(index + 1), u),
            Interpolation::CubicSpline => self.hermite(index, u),
        }
    }

    /// Sample a rotation between key `index` and `index + 1`
    pub fn sample_rotation(&self, index: usize, u: f32) -> Quat {
        match self.interpolation {
            Interpolation::Step => quat_from_xyzw(&self.value(Self::step_key(index, u))),
            Interpolation::Linear => {
                let from = quat_from_xyzw(&self.value(index));
                let to = quat_from_xyzw(&self.value(index + 1));
                slerp_shortest(&from, &to, u)
            }
            Interpolation::CubicSpline => quat_from_xyzw(&self.hermite(index, u)),
        }
    }

    fn hermite(&self, index: usize, u: f32) -> Vec4 {
        let span = self.inputs[index + 1] - self.inputs[index];
        let previous = index * 3;
        let next = (index + 1) * 3;

        let v0 = self.outputs[previous + 1];
        let m0 = self.outputs[previous + 2] * span;
        let m1 = self.outputs[next] * span;
        let v1 = self.outputs[next + 1];

        let (s0, s1, s2, s3) = hermite_weights(u);
        v0 * s0 + m0 * s1 + v1 * s2 + m1 * s3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn linear(inputs: Vec<f32>, outputs: Vec<Vec4>) -> Sampler {
        Sampler::new(Interpolation::Linear, inputs, outputs).unwrap()
    }

    #[test]
    fn test_interpolation_parses_gltf_names() {
        assert_eq!("LINEAR".parse::<Interpolation>().unwrap(), Interpolation::Linear);
        assert_eq!("STEP".parse::<Interpolation>().unwrap(), Interpolation::Step);
        assert_eq!("CUBICSPLINE".parse::<Interpolation>().unwrap(), Interpolation::CubicSpline);
        assert!(matches!(
            "SMOOTH".parse::<Interpolation>(),
            Err(AnimationError::UnsupportedInterpolation(name)) if name == "SMOOTH"
        ));
    }

    #[test]
    fn test_output_count_checked() {
        let result = Sampler::new(Interpolation::CubicSpline, vec![0.0, 1.0], vec![Vec4::zeros(); 2]);
        assert!(matches!(result, Err(AnimationError::OutputLengthMismatch { expected: 6, actual: 2 })));
    }

    #[test]
    fn test_unsorted_inputs_rejected() {
        let result = Sampler::new(Interpolation::Linear, vec![1.0, 0.5], vec![Vec4::zeros(); 2]);
        assert!(matches!(result, Err(AnimationError::InputsNotSorted)));
    }

    #[test]
    fn test_bracket_uses_closed_interval() {
        let sampler = linear(vec![0.0, 1.0, 2.0], vec![Vec4::zeros(); 3]);

        assert_eq!(sampler.bracket(0.0), Some((0, 0.0)));
        assert_eq!(sampler.bracket(1.5), Some((1, 0.5)));
        assert_eq!(sampler.bracket(2.0), Some((1, 1.0)));
        assert_eq!(sampler.bracket(2.5), None);
        assert_eq!(sampler.bracket(-0.1), None);
    }

    #[test]
    fn test_bracket_degenerate_interval() {
        let sampler = linear(vec![1.0, 1.0], vec![Vec4::zeros(); 2]);
        assert_eq!(sampler.bracket(1.0), Some((0, 0.0)));
    }

    #[test]
    fn test_linear_and_step_vectors() {
        let outputs = vec![Vec4::new(0.0, 0.0, 0.0, 0.0), Vec4::new(4.0, 2.0, -2.0, 0.0)];
        let lin = linear(vec![0.0, 2.0], outputs.clone());
        assert_relative_eq!(lin.sample_vec4(0, 0.25), Vec4::new(1.0, 0.5, -0.5, 0.0));

        let step = Sampler::new(Interpolation::Step, vec![0.0, 2.0], outputs).unwrap();
        assert_eq!(step.sample_vec4(0, 0.99), Vec4::zeros());
    }

    #[test]
    fn test_step_on_a_key_shows_that_key() {
        let outputs = vec![Vec4::new(1.0, 0.0, 0.0, 0.0), Vec4::new(2.0, 0.0, 0.0, 0.0), Vec4::new(3.0, 0.0, 0.0, 0.0)];
        let step = Sampler::new(Interpolation::Step, vec![0.0, 1.0, 2.0], outputs).unwrap();

        let at = |time: f32| {
            let (index, u) = step.bracket(time).unwrap();
            step.sample_vec4(index, u).x
        };
        assert_eq!(at(0.0), 1.0);
        assert_eq!(at(0.5), 1.0);
        assert_eq!(at(1.0), 2.0);
        assert_eq!(at(1.5), 2.0);
        assert_eq!(at(2.0), 3.0);
    }

    #[test]
    fn test_step_rotation_on_last_key() {
        let to = Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2);
        let outputs = vec![Vec4::new(0.0, 0.0, 0.0, 1.0), Vec4::new(to.i, to.j, to.k, to.w)];
        let step = Sampler::new(Interpolation::Step, vec![0.0, 1.0], outputs).unwrap();

        assert_relative_eq!(step.sample_rotation(0, 0.5), Quat::identity(), epsilon = 1e-6);
        assert_relative_eq!(step.sample_rotation(0, 1.0), to, epsilon = 1e-6);
    }

    #[test]
    fn test_cubic_spline_with_flat_tangents_is_smoothstep() {
        let zero = Vec4::zeros();
        let outputs = vec![zero, zero, zero, zero, Vec4::new(1.0, 0.0, 0.0, 0.0), zero];
        let sampler = Sampler::new(Interpolation::CubicSpline, vec![0.0, 1.0], outputs).unwrap();

        assert_relative_eq!(sampler.sample_vec4(0, 0.5).x, 0.5, epsilon = 1e-6);
        assert_relative_eq!(sampler.sample_vec4(0, 0.25).x, 0.15625, epsilon = 1e-6);
        assert_eq!(sampler.value(1), Vec4::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_cubic_spline_tangents_scale_with_interval() {
        // Linear motion x = t over [0, 2] encoded with unit tangents.
        let tangent = Vec4::new(1.0, 0.0, 0.0, 0.0);
        let outputs = vec![tangent, Vec4::zeros(), tangent, tangent, Vec4::new(2.0, 0.0, 0.0, 0.0), tangent];
        let sampler = Sampler::new(Interpolation::CubicSpline, vec![0.0, 2.0], outputs).unwrap();

        assert_relative_eq!(sampler.sample_vec4(0, 0.5).x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(sampler.sample_vec4(0, 0.25).x, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_linear_rotation_slerps() {
        let to = Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2);
        let outputs = vec![Vec4::new(0.0, 0.0, 0.0, 1.0), Vec4::new(to.i, to.j, to.k, to.w)];
        let sampler = linear(vec![0.0, 1.0], outputs);

        let mid = sampler.sample_rotation(0, 0.5);
        assert_relative_eq!(mid, Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2 * 0.5), epsilon = 1e-5);
    }
}
