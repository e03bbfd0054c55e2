pub mod noise_field;
pub mod noise_parameters;

pub use noise_field::{generate_fractal, generate_simplex};
pub use noise_parameters::{NoiseParameters, NormalizeMode};
