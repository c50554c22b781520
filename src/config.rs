//! Run configuration of the `polar-poisson` binary.
//!
//! Configurations are stored as JSON. Missing keys take their [`Default`] values, so the smallest
//! valid file is `{}`.
use crate::basis::MAX_DEGREE;
use crate::error::PolarError;
use crate::manufactured::CoefficientProfile;
use crate::solver::DEFAULT_POLE_EPSILON;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Number of cells of the radial and angular break point sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineMeshConfig {
    pub r_ncells: usize,
    pub p_ncells: usize,
}

impl Default for SplineMeshConfig {
    fn default() -> Self {
        Self {
            r_ncells: 32,
            p_ncells: 64,
        }
    }
}

/// The analytical mapping that the discrete mapping interpolates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MappingConfig {
    Circular,
    Czarny { epsilon: f64, e: f64 },
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self::Czarny { epsilon: 0.3, e: 1.4 }
    }
}

/// The manufactured potential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolutionConfig {
    #[default]
    Curvilinear,
    Cartesian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "SplineMesh")]
    pub spline_mesh: SplineMeshConfig,
    /// Degree of the radial and angular B-splines.
    pub degree: usize,
    /// Smoothness of the polar basis at the pole, one of -1, 0 or 1.
    pub continuity: i32,
    pub mapping: MappingConfig,
    pub solution: SolutionConfig,
    pub coefficients: CoefficientProfile,
    /// Radius below which the electric field is linearized around the pole.
    pub pole_epsilon: f64,
    /// Zero picks the number of threads from the environment.
    pub num_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spline_mesh: SplineMeshConfig::default(),
            degree: 3,
            continuity: 1,
            mapping: MappingConfig::default(),
            solution: SolutionConfig::default(),
            coefficients: CoefficientProfile::default(),
            pole_epsilon: DEFAULT_POLE_EPSILON,
            num_threads: 0,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|err| eyre!("Malformed configuration: {err}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|err| eyre!("Failed to read configuration file {}: {err}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> eyre::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn write_json_file(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json_pretty()?)
            .map_err(|err| eyre!("Failed to write configuration file {}: {err}", path.display()))
    }

    /// Checks the parameters that the solver would otherwise reject with a panic.
    pub fn validate(&self) -> Result<(), PolarError> {
        let fail = |message: String| Err(PolarError::precondition(message));
        if self.degree == 0 || self.degree > MAX_DEGREE {
            return fail(format!("degree must lie in [1, {MAX_DEGREE}], got {}", self.degree));
        }
        if !(-1..=1).contains(&self.continuity) {
            return fail(format!("continuity must be -1, 0 or 1, got {}", self.continuity));
        }
        let SplineMeshConfig { r_ncells, p_ncells } = self.spline_mesh;
        // The radial basis must keep functions beyond the absorbed rings and the outer ring
        let min_nbasis_r = (self.continuity + 3) as usize;
        if r_ncells == 0 || r_ncells + self.degree < min_nbasis_r || p_ncells < self.degree {
            return fail(format!(
                "the spline mesh {r_ncells} x {p_ncells} is too coarse for degree {}",
                self.degree
            ));
        }
        if !(self.pole_epsilon > 0.0) {
            return fail(format!("pole_epsilon must be positive, got {}", self.pole_epsilon));
        }
        if let MappingConfig::Czarny { epsilon, e } = self.mapping {
            if !(epsilon > 0.0 && epsilon < 2.0 && e > 0.0) {
                return fail(format!("invalid Czarny parameters epsilon = {epsilon}, e = {e}"));
            }
        }
        if let CoefficientProfile::Tanh { width, .. } = self.coefficients {
            if width == 0.0 {
                return fail("the width of the coefficient profile must be non-zero".to_string());
            }
        }
        Ok(())
    }
}
