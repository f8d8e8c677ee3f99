//! # mdlj
//! A spatially-decomposed molecular-dynamics engine for classical
//! Lennard-Jones fluids. A cubic volume under periodic boundary conditions
//! is divided among a 3-D grid of MPI ranks; each rank advances the
//! particles of its sub-volume by velocity-Verlet integration with a cutoff
//! pair potential and refreshes a one-cell-thick halo from its 26 neighbors
//! once per step.
//!
//! The pieces, bottom up: [`grid`] and [`extent`] provide the integer and
//! real geometry, [`particle`] the arena-backed intrusive particle lists,
//! [`cell`] the force kernels and [`proc_data`] the per-rank cell grid with
//! the halo import/export machinery. [`communication`] carries the
//! 26-direction two-phase exchange protocol, and [`driver`] sequences the
//! step loop, in a multi-process ([`driver::Driver`]) and a single-process
//! ([`driver::LocalDriver`]) rendition.

pub mod case;
pub mod cell;
pub mod communication;
pub mod driver;
pub mod error;
pub mod extent;
pub mod grid;
pub mod io;
pub mod lj;
pub mod logging;
pub mod particle;
pub mod proc_data;
