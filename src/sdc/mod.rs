//! Spectral deferred corrections. A step is split into nodes, and an
//! approximate solution at the nodes is improved by sweeps of a low-order
//! method, each sweep correcting with the integral of the previous
//! iterate's right-hand side. The multi-level variant couples one node set
//! per AMR level through V-cycles, with FAS corrections carrying fine
//! information to the coarse levels.
//!

mod encap;
mod imex;
mod mg;
pub mod nodes;

pub use encap::{Encap, EncapKind};
pub use imex::{ImexHooks, ImexSweeper};
pub use mg::{Mlsdc, MlsdcContext, SweeperLayout, Transfer};
