//! Rns-amr solves reacting flow on a two-dimensional, block-structured
//! adaptive mesh. Each refinement level is a union of rectangular boxes
//! holding cell-centered conserved variables with a band of ghost cells.
//! Levels can be advanced either by Berger-Oliger subcycling with
//! second or third order Runge-Kutta stages and conservative refluxing, or
//! all together by a multi-level spectral deferred correction (MLSDC)
//! iteration, which treats advection explicitly and chemistry implicitly
//! and couples the levels through V-cycles with FAS corrections.

pub mod advance;
pub mod amr;
pub mod bc;
pub mod box_array;
pub mod config;
pub mod error;
pub mod flux_register;
pub mod geometry;
pub mod index_space;
pub mod interp;
pub mod kernel;
pub mod level;
pub mod meshing;
pub mod multifab;
pub mod patch;
pub mod physics;
pub mod sdc;
pub mod sdc_amr;
pub mod transfer;
pub mod variables;
