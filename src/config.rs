use serde::{Deserialize, Serialize};
use crate::bc::{DomainBc, PhysBc};
use crate::error::{Error, Result};




/// Parameters of the level hierarchy and the time step control.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AmrConfig {
    pub n_cell: (i64, i64),
    pub prob_lo: (f64, f64),
    pub prob_hi: (f64, f64),
    pub max_level: usize,
    pub ref_ratio: i64,
    pub blocking_factor: i64,
    pub n_grow: i64,
    pub regrid_int: usize,
    pub change_max: f64,
    pub cfl: f64,
    pub fixed_dt: Option<f64>,
    pub verbose: u32,
}

impl Default for AmrConfig {
    fn default() -> Self {
        Self {
            n_cell: (32, 32),
            prob_lo: (0.0, 0.0),
            prob_hi: (1.0, 1.0),
            max_level: 0,
            ref_ratio: 2,
            blocking_factor: 8,
            n_grow: 2,
            regrid_int: 1,
            change_max: 1.1,
            cfl: 0.5,
            fixed_dt: None,
            verbose: 0,
        }
    }
}




/// Knobs of the multi-level SDC integrator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MlsdcConfig {
    pub max_iters: usize,
    pub max_trefs: usize,
    pub nnodes0: usize,
    pub trat: usize,
}

impl Default for MlsdcConfig {
    fn default() -> Self {
        Self {
            max_iters: 8,
            max_trefs: 3,
            nnodes0: 3,
            trat: 2,
        }
    }
}




/// Linear conversion of the first species into the second.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Chemistry {
    pub rate: f64,
}




/// Parameters of the reacting-flow model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub num_species: usize,
    pub velocity: (f64, f64),
    pub chemistry: Option<Chemistry>,
    pub phys_bc: DomainBc,
    pub is_periodic: [bool; 2],
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            num_species: 2,
            velocity: (1.0, 1.0),
            chemistry: None,
            phys_bc: DomainBc::periodic(),
            is_periodic: [true, true],
        }
    }
}




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeStepping {
    Subcycled,
    Mlsdc,
}




/**
 * The run configuration. It is built once, validated, and then shared
 * read-only by every component of the solver.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub amr: AmrConfig,
    pub mlsdc: MlsdcConfig,
    pub rk_order: u32,
    pub do_reflux: bool,
    pub time_stepping: TimeStepping,
    pub physics: PhysicsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            amr: AmrConfig::default(),
            mlsdc: MlsdcConfig::default(),
            rk_order: 2,
            do_reflux: true,
            time_stepping: TimeStepping::Mlsdc,
            physics: PhysicsConfig::default(),
        }
    }
}




// ============================================================================
impl Config {

    /**
     * Reject parameter combinations the solver cannot run with. This is
     * called before any level data is allocated.
     */
    pub fn validate(&self) -> Result<()> {
        let amr = &self.amr;
        let fail = |message: &str| Err(Error::Config(message.to_string()));

        if amr.n_cell.0 <= 0 || amr.n_cell.1 <= 0 {
            return fail("n_cell must be positive")
        }
        if amr.max_level > 0 && amr.blocking_factor < 4 {
            return fail("blocking_factor must be at least 4 when max_level > 0")
        }
        if amr.ref_ratio < 2 {
            return fail("ref_ratio must be at least 2")
        }
        if amr.n_grow < 1 {
            return fail("n_grow must be at least 1")
        }
        if amr.regrid_int == 0 {
            return fail("regrid_int must be at least 1")
        }
        if !(amr.cfl > 0.0) || !(amr.change_max > 0.0) {
            return fail("cfl and change_max must be positive")
        }
        if let Some(dt) = amr.fixed_dt {
            if !(dt > 0.0) {
                return fail("fixed_dt must be positive")
            }
        }
        if amr.max_level > 0 && (amr.n_cell.0 % amr.blocking_factor != 0 || amr.n_cell.1 % amr.blocking_factor != 0) {
            return fail("n_cell must be a multiple of blocking_factor")
        }
        if self.rk_order != 2 && self.rk_order != 3 {
            return fail("rk_order must be 2 or 3")
        }
        if self.rk_order == 3 && amr.max_level > 0 && self.time_stepping == TimeStepping::Subcycled {
            return fail("rk_order 3 is only available on a single level")
        }
        if self.mlsdc.nnodes0 < 2 {
            return fail("nnodes0 must be at least 2")
        }
        if self.mlsdc.trat < 1 {
            return fail("trat must be at least 1")
        }
        if self.mlsdc.max_iters < 1 {
            return fail("max_iters must be at least 1")
        }
        if self.physics.chemistry.is_some() && self.physics.num_species < 2 {
            return fail("chemistry needs at least two species")
        }

        for (axis, &periodic) in self.physics.is_periodic.iter().enumerate() {
            let lo = self.physics.phys_bc.lo[axis];
            let hi = self.physics.phys_bc.hi[axis];
            let interior = (lo == PhysBc::Interior, hi == PhysBc::Interior);

            if periodic && interior != (true, true) {
                return fail("a periodic direction must have interior boundaries on both sides")
            }
            if !periodic && (interior.0 || interior.1) {
                return fail("interior boundaries are only allowed in periodic directions")
            }
        }
        Ok(())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{Config, TimeStepping};
    use crate::bc::{DomainBc, PhysBc};

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn small_blocking_factor_is_rejected_with_refinement() {
        let mut config = Config::default();
        config.amr.max_level = 2;
        config.amr.blocking_factor = 2;
        assert!(config.validate().is_err());
        config.amr.max_level = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rk3_is_rejected_for_subcycling() {
        let mut config = Config::default();
        config.rk_order = 3;
        config.amr.max_level = 1;
        config.time_stepping = TimeStepping::Subcycled;
        assert!(config.validate().is_err());
        config.rk_order = 4;
        config.amr.max_level = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn periodic_flags_must_agree_with_boundaries() {
        let mut config = Config::default();
        config.physics.is_periodic = [false, true];
        assert!(config.validate().is_err());
        config.physics.phys_bc = DomainBc {
            lo: [PhysBc::Inflow, PhysBc::Interior],
            hi: [PhysBc::Outflow, PhysBc::Interior],
        };
        assert!(config.validate().is_ok());
    }
}
