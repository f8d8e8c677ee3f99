use crate::case::CaseData;
use crate::error::MdError;
use crate::error::Result;

/// Conversion from Joule to the atomic-scale energy unit u * Angstrom^2 / fs^2.
///
/// J = kg m^2 s^-2
///   = (1/1.660e-27 u) * (1e10 Angstrom)^2 * (1e15 fs)^-2
///   = 6.02e16 u Angstrom^2 fs^-2
const ENERGY_CONVERSION: f64 = 6.02e16;

/// Source data for one supported species.
pub struct Species {
    pub label: &'static str,
    /// Mass [u].
    pub mass: f64,
    /// Potential well depth [J].
    pub epsilon: f64,
    /// Zero-crossing distance of the potential [Angstrom].
    pub sigma: f64,
}

/// The species this program knows parameters for. The initial-state file
/// refers to entries by label; the index into this table is the `kind` that
/// travels with every particle.
pub const SPECIES: &[Species] = &[
    Species {
        label: "He",
        mass: 4.0026022,
        epsilon: 0.141e-21,
        sigma: 2.56,
    },
    Species {
        label: "Ne",
        mass: 20.17976,
        epsilon: 0.492e-21,
        sigma: 2.75,
    },
    Species {
        label: "Ar",
        mass: 39.948,
        epsilon: 1.70e-21,
        sigma: 3.40,
    },
    Species {
        label: "Kr",
        mass: 83.7982,
        epsilon: 2.30e-21,
        sigma: 3.68,
    },
    Species {
        label: "Xe",
        mass: 131.2936,
        epsilon: 3.1e-21,
        sigma: 4.07,
    },
    Species {
        label: "N2",
        mass: 28.01344,
        epsilon: 1.25e-21,
        sigma: 3.70,
    },
    Species {
        label: "I2",
        mass: 253.808946,
        epsilon: 7.6e-21,
        sigma: 4.98,
    },
    Species {
        label: "Hg",
        mass: 200.592,
        epsilon: 11.74e-21,
        sigma: 2.90,
    },
    Species {
        label: "CCl4",
        mass: 153.82358,
        epsilon: 4.51e-21,
        sigma: 5.88,
    },
];

/// Finds the species index for a label from the initial-state file.
pub fn species_index(label: &str) -> Result<usize> {
    if let Some(index) = SPECIES.iter().position(|s| s.label == label) {
        return Ok(index);
    }
    let supported: Vec<_> = SPECIES.iter().map(|s| format!("\"{}\"", s.label)).collect();
    Err(MdError::data(format!(
        "Molecule name \"{}\" not found. Supported names are : {}",
        label,
        supported.join(", ")
    )))
}

/// Per-species loop invariants in simulation units.
#[derive(Clone, Copy, Debug)]
pub struct ScaledSpecies {
    /// dt^2 / 2m [fs^2/u], turns a force into the stored half-acceleration.
    pub dt2_by_2m: f64,
    /// m / 2dt^2 [u/fs^2], turns the stored `v*dt` into kinetic energy.
    pub m_by_2dt2: f64,
}

/// Per-pair loop invariants. Signs and the energy conversion are baked in so
/// that the force on i from j at displacement d with r2 = |d|^2 is
/// `d * (a / r^14 + b / r^8)` and the pair potential is
/// `-a / (12 r^12) - b / (6 r^6)`, with no further sign flips in the kernels.
#[derive(Clone, Copy, Debug)]
pub struct PairCoefficients {
    /// [u Angstrom^14 fs^-2]
    pub a: f64,
    /// [u Angstrom^8 fs^-2]
    pub b: f64,
}

/// All derived Lennard-Jones coefficients for one simulation run. Computed
/// once from the case parameters; read-only inside the step loop.
pub struct LjTable {
    species: Vec<ScaledSpecies>,
    pairs: Vec<Vec<PairCoefficients>>,
    pub cutoff_sq: f64,
}

impl LjTable {
    pub fn new(case: &CaseData) -> Self {
        Self::from_parameters(case.delta_t, case.cutoff_radius)
    }

    pub fn from_parameters(delta_t: f64, cutoff_radius: f64) -> Self {
        let species = SPECIES
            .iter()
            .map(|s| ScaledSpecies {
                dt2_by_2m: delta_t * delta_t / (2.0 * s.mass),
                m_by_2dt2: s.mass / (2.0 * delta_t * delta_t),
            })
            .collect();
        let pairs = SPECIES
            .iter()
            .map(|alpha| {
                SPECIES
                    .iter()
                    .map(|beta| {
                        // Lorentz-Berthelot combining rules.
                        let eps = (alpha.epsilon * beta.epsilon).sqrt();
                        let sigma = (alpha.sigma + beta.sigma) / 2.0;
                        let sigma6 = sigma.powi(6);
                        PairCoefficients {
                            a: -48.0 * eps * ENERGY_CONVERSION * sigma6 * sigma6,
                            b: 24.0 * eps * ENERGY_CONVERSION * sigma6,
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            species,
            pairs,
            cutoff_sq: cutoff_radius * cutoff_radius,
        }
    }

    pub fn species(&self, kind: usize) -> &ScaledSpecies {
        &self.species[kind]
    }

    pub fn pair(&self, kind_i: usize, kind_j: usize) -> &PairCoefficients {
        &self.pairs[kind_i][kind_j]
    }
}
