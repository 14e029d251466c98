use std::sync::Arc;
use log::{debug, info};
use rayon::prelude::*;
use crate::bc::{self, component_bcs, FillMode};
use crate::box_array::BoxArray;
use crate::config::{Config, TimeStepping};
use crate::error::{Error, Result};
use crate::flux_register::FluxRegister;
use crate::geometry::Geometry;
use crate::index_space::range2d;
use crate::interp::Interpolater;
use crate::level::{AmrLevel, LevelVariant, StateData};
use crate::multifab::MultiFab;
use crate::physics::Physics;
use crate::sdc::Mlsdc;
use crate::transfer;




/**
 * How the ghost cells of a level's field are filled before its time
 * derivative is evaluated.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillType {
    /// Exchange with boxes on the same level, periodic images, then the
    /// physical boundary.
    FillBoundary,
    /// Fill the whole patch from the level's own state at the given time,
    /// taking cells the level does not cover from the coarser levels.
    FillPatchIterator,
    /// Interpolate the ghost cells from the coarser level, then do a
    /// `FillBoundary`.
    FillCoarsePatch,
}




/**
 * Decides the grids of the level above a given one. Returning `None`
 * removes every level above `level`.
 */
pub trait Regrid: Send + Sync {
    fn new_grids(&self, level: usize, amr: &Amr) -> Option<BoxArray>;
}




/**
 * Keeps whatever grids the hierarchy currently has.
 */
pub struct StaticGrids;

impl Regrid for StaticGrids {
    fn new_grids(&self, level: usize, amr: &Amr) -> Option<BoxArray> {
        amr.levels.get(level + 1).map(|l| l.grids.clone())
    }
}




fn fab_boxes(u: &MultiFab) -> BoxArray {
    BoxArray::new((0..u.len()).map(|n| u.fab_box(n).clone()).collect())
}




/**
 * The AMR level hierarchy and its time step control. Per-level vectors
 * (`flux_regs`, `dt_level`, `level_steps`, `level_count`) have one entry
 * for every level up to `max_level`, whether or not the level exists.
 * `flux_regs[l]` sits between levels `l - 1` and `l`.
 */
pub struct Amr {
    pub(crate) config: Arc<Config>,
    pub(crate) physics: Box<dyn Physics>,
    pub(crate) interpolater: Interpolater,
    pub(crate) levels: Vec<AmrLevel>,
    pub(crate) flux_regs: Vec<Option<FluxRegister>>,
    pub(crate) dt_level: Vec<f64>,
    pub(crate) level_steps: Vec<usize>,
    pub(crate) level_count: Vec<usize>,
    pub(crate) mlsdc: Option<Mlsdc>,
    regrid: Box<dyn Regrid>,
}




// ============================================================================
impl Amr {


    /**
     * Validate the configuration and build a hierarchy on the given grids,
     * one box array per level starting from the coarsest. Level 0 must cover
     * the domain, and each finer level must be aligned with the refinement
     * ratio and nested in the level below it. The state is zero until
     * `init_data` is called.
     */
    pub fn new(config: Config, physics: Box<dyn Physics>, grids: Vec<BoxArray>) -> Result<Self> {
        config.validate()?;

        if physics.variables().num_species() != config.physics.num_species {
            return Err(Error::Config("the physics model and the configuration disagree on the number of species".into()))
        }
        if grids.is_empty() || grids.len() > config.amr.max_level + 1 {
            return Err(Error::Config(format!("between 1 and {} levels of grids are required", config.amr.max_level + 1)))
        }
        let amr = &config.amr;
        let geom = Geometry::new(
            range2d(0..amr.n_cell.0, 0..amr.n_cell.1),
            amr.prob_lo,
            amr.prob_hi,
            config.physics.is_periodic);
        let num_levels = amr.max_level + 1;

        let mut this = Self {
            config: Arc::new(config),
            physics,
            interpolater: Interpolater::CellConservativeLinear,
            levels: Vec::new(),
            flux_regs: (0..num_levels).map(|_| None).collect(),
            dt_level: vec![0.0; num_levels],
            level_steps: vec![0; num_levels],
            level_count: vec![0; num_levels],
            mlsdc: None,
            regrid: Box::new(StaticGrids),
        };

        for (lev, boxes) in grids.into_iter().enumerate() {
            let geom = if lev == 0 { geom.clone() } else { this.levels[lev - 1].geom.refine(this.ratio()) };
            this.check_grids(lev, &boxes, &geom)?;
            let state = MultiFab::new(boxes.clone(), this.num_state(), this.config.amr.n_grow);
            this.install_level(lev, geom, boxes, state, 0.0);
        }
        Ok(this)
    }


    pub fn with_regrid(mut self, regrid: Box<dyn Regrid>) -> Self {
        self.regrid = regrid;
        self
    }


    pub fn with_interpolater(mut self, interpolater: Interpolater) -> Self {
        self.interpolater = interpolater;
        self
    }


    pub fn config(&self) -> &Config {
        &self.config
    }


    pub fn physics(&self) -> &dyn Physics {
        &*self.physics
    }


    pub fn finest_level(&self) -> usize {
        self.levels.len() - 1
    }


    pub fn level(&self, lev: usize) -> &AmrLevel {
        &self.levels[lev]
    }


    pub fn levels(&self) -> &[AmrLevel] {
        &self.levels
    }


    pub fn dt_level(&self, lev: usize) -> f64 {
        self.dt_level[lev]
    }


    pub fn level_steps(&self, lev: usize) -> usize {
        self.level_steps[lev]
    }


    pub fn level_count(&self, lev: usize) -> usize {
        self.level_count[lev]
    }


    pub fn mlsdc(&self) -> Option<&Mlsdc> {
        self.mlsdc.as_ref()
    }


    pub(crate) fn ratio(&self) -> i64 {
        self.config.amr.ref_ratio
    }


    pub(crate) fn num_state(&self) -> usize {
        self.physics.variables().num_state()
    }


    fn variant(&self) -> LevelVariant {
        match self.config.time_stepping {
            TimeStepping::Subcycled => LevelVariant::Standard,
            TimeStepping::Mlsdc => LevelVariant::Sdc,
        }
    }


    fn check_grids(&self, lev: usize, boxes: &BoxArray, geom: &Geometry) -> Result<()> {
        let fail = |message: String| Err(Error::Config(message));
        let domain = geom.domain();

        if boxes.is_empty() {
            return fail(format!("level {} has no boxes", lev))
        }
        if boxes.iter().any(|b| b.is_empty() || !domain.contains_space(b)) {
            return fail(format!("level {} has a box outside the domain", lev))
        }
        if lev == 0 {
            if !boxes.covers(domain) {
                return fail("level 0 must cover the domain".into())
            }
            return Ok(())
        }
        let ratio = self.ratio();
        let coarse = &self.levels[lev - 1].grids;

        for b in boxes.iter() {
            let (lo, hi) = (b.start(), b.end());

            if [lo.0, lo.1, hi.0, hi.1].iter().any(|x| x.rem_euclid(ratio) != 0) {
                return fail(format!("box {:?} on level {} is not aligned with the refinement ratio", b, lev))
            }
            if !coarse.covers(&b.coarsen_by(ratio)) {
                return fail(format!("box {:?} on level {} is not nested in level {}", b, lev, lev - 1))
            }
        }
        Ok(())
    }


    fn install_level(&mut self, lev: usize, geom: Geometry, grids: BoxArray, state: MultiFab, time: f64) {
        let level = AmrLevel {
            level: lev,
            variant: self.variant(),
            geom,
            grids: grids.clone(),
            bcs: component_bcs(&self.config.physics.phys_bc, &self.physics.variables()),
            state: StateData::new(state, time),
        };
        if lev < self.levels.len() {
            self.levels[lev] = level;
        } else {
            self.levels.push(level);
        }
        self.flux_regs[lev] = if lev > 0 && self.config.time_stepping == TimeStepping::Subcycled {
            Some(FluxRegister::new(&grids, self.ratio(), self.num_state()))
        } else {
            None
        };
    }


    /**
     * Set the state of every level from a function of the cell center, then
     * make the levels consistent by averaging down.
     */
    pub fn init_data<F>(&mut self, initial: F)
    where
        F: Fn((f64, f64), &mut [f64]) + Sync
    {
        let physics = &*self.physics;

        for level in &mut self.levels {
            let geom = &level.geom;

            level.state.new.par_iter_mut().for_each(|(_, valid, p)| {
                for (index, s) in valid.iter().zip(p.select_mut(valid)) {
                    initial(geom.cell_center(index), s)
                }
            });
            AmrLevel::post_update(physics, &mut level.state.new);
        }
        self.average_down_all();
    }


    pub(crate) fn average_down_all(&mut self) {
        let ratio = self.ratio();

        for lev in (1..self.levels.len()).rev() {
            let (coarse, fine) = self.levels.split_at_mut(lev);
            transfer::average_down(&fine[0].state.new, &mut coarse[lev - 1].state.new, ratio);
        }
    }


    // ========================================================================
    // Ghost cell filling


    /**
     * Return a field on the given boxes, without ghost cells, holding the
     * state of level `lev` at `time` wherever the level (or a periodic image
     * of it) has data. Other cells come from interpolating the coarser
     * levels, or from the physical boundary outside the domain.
     */
    pub fn fill_patch(&self, lev: usize, boxes: &BoxArray, time: f64) -> MultiFab {
        let level = &self.levels[lev];

        let mut dest = if lev > 0 {
            self.fill_coarse_patch(lev, boxes, time)
        } else {
            let mut dest = MultiFab::new(boxes.clone(), self.num_state(), 0);
            dest.set_nan();
            dest
        };
        dest.copy_valid_periodic(&level.state.data_at(time), &level.geom);
        level.view(&*self.physics).fill_physical_boundary(&mut dest, time, FillMode::Solution);
        dest
    }


    /**
     * Return a field on the given boxes of level `lev` interpolated entirely
     * from level `lev - 1` at `time`.
     */
    pub fn fill_coarse_patch(&self, lev: usize, boxes: &BoxArray, time: f64) -> MultiFab {
        assert!(lev > 0, "level 0 has no coarser level");

        let ratio = self.ratio();
        let interpolater = self.interpolater;
        let crse_boxes = boxes.map(|b| interpolater.coarse_box(b, ratio));
        let crse = self.fill_patch(lev - 1, &crse_boxes, time);
        self.interp_from_coarse(lev, boxes, &crse)
    }


    /// Interpolate `crse`, a field already covering the coarse footprint of
    /// each of the given boxes, onto those boxes of level `lev`.
    fn interp_from_coarse(&self, lev: usize, boxes: &BoxArray, crse: &MultiFab) -> MultiFab {
        let ratio = self.ratio();
        let interpolater = self.interpolater;
        let crse_domain = self.levels[lev - 1].geom.domain();
        let fine = &self.levels[lev];

        let mut dest = MultiFab::new(boxes.clone(), self.num_state(), 0);

        dest.patches_mut().par_iter_mut().zip(crse.patches()).for_each(|(pf, pc)| {
            let fab = pf.index_space().clone();
            let bcr = bc::set_bc(&fab, fine.geom.domain(), &fine.bcs);
            interpolater.interp(pc, pf, &fab, ratio, crse_domain, &bcr);
        });
        dest
    }


    /**
     * Fill the ghost cells of `u`, a field on the boxes of level `lev`.
     */
    pub fn fill_boundary(&self, lev: usize, u: &mut MultiFab, time: f64, fill_type: FillType) {
        assert!(lev > 0 || fill_type == FillType::FillBoundary, "level 0 only supports FillBoundary");

        let level = &self.levels[lev];
        let fabs = fab_boxes(u);

        match fill_type {
            FillType::FillPatchIterator => {
                u.copy_fab_from(&self.fill_patch(lev, &fabs, time));
            }
            FillType::FillCoarsePatch => {
                let coarse = self.fill_coarse_patch(lev, &fabs, time);
                self.fill_ghosts_from(lev, u, &coarse, time);
            }
            FillType::FillBoundary => {
                level.view(&*self.physics).fill_boundary(u, time, FillMode::Solution);
            }
        }
    }


    /**
     * Fill the ghost cells of `u`, a field on the boxes of level `lev > 0`,
     * like `FillCoarsePatch` but interpolating from `crse` instead of the
     * stored state of level `lev - 1`. `crse` lives on the boxes of level
     * `lev - 1` and its ghost cells must be filled.
     */
    pub fn fill_boundary_from_coarse(&self, lev: usize, u: &mut MultiFab, crse: &MultiFab, time: f64) {
        assert!(lev > 0, "level 0 has no coarser level");

        let coarse = &self.levels[lev - 1];
        let ratio = self.ratio();
        let interpolater = self.interpolater;
        let fabs = fab_boxes(u);

        let mut src = MultiFab::new(fabs.map(|b| interpolater.coarse_box(b, ratio)), self.num_state(), 0);
        src.set_nan();
        src.copy_fab_from(crse);
        src.copy_valid_periodic(crse, &coarse.geom);
        coarse.view(&*self.physics).fill_physical_boundary(&mut src, time, FillMode::Solution);
        debug_assert!(!src.contains_non_finite(0), "coarse data does not cover the fine ghost cells");

        let interpolated = self.interp_from_coarse(lev, &fabs, &src);
        self.fill_ghosts_from(lev, u, &interpolated, time);
    }


    /// Copy the non-valid cells of `u` from `src`, a field on its fab boxes,
    /// then do a `FillBoundary`.
    fn fill_ghosts_from(&self, lev: usize, u: &mut MultiFab, src: &MultiFab, time: f64) {
        u.par_iter_mut().zip(src.patches()).for_each(|((_, valid, p), src)| {
            let fab = p.index_space().clone();

            for index in fab.iter().filter(|&index| !valid.contains(index)) {
                p.get_slice_mut(index).copy_from_slice(src.get_slice(index))
            }
        });
        self.levels[lev].view(&*self.physics).fill_boundary(u, time, FillMode::Solution);
    }


    // ========================================================================
    // Time step control


    /**
     * Determine the time step of every level for a coarse step starting at
     * `time`, and return the level 0 step.
     */
    pub fn compute_new_dt(&mut self, time: f64, stop_time: f64) -> Result<f64> {
        self.compute_new_dt_from(time, stop_time, self.dt_level[0])
    }


    /// Like `compute_new_dt`, but limiting the growth of the level 0 step
    /// relative to `dt_prev` rather than the current one, so that repeated
    /// calls within a step do not compound the limit.
    pub(crate) fn compute_new_dt_from(&mut self, time: f64, stop_time: f64, dt_prev: f64) -> Result<f64> {
        let amr = &self.config.amr;
        let ratio = self.ratio() as f64;
        let subcycled = self.config.time_stepping == TimeStepping::Subcycled;
        let physics = &*self.physics;

        let mut dt0 = match amr.fixed_dt {
            Some(dt) => dt,
            None => {
                let estimate = self.levels
                    .iter()
                    .map(|l| {
                        let est = l.estimate_dt(physics, amr.cfl);
                        if subcycled { est * ratio.powi(l.level as i32) } else { est }
                    })
                    .fold(f64::INFINITY, f64::min);

                if dt_prev > 0.0 {
                    estimate.min(amr.change_max * dt_prev)
                } else {
                    estimate
                }
            }
        };

        let remaining = stop_time - time;

        if remaining > 0.0 && dt0 * (1.0 + 1e-8) > remaining {
            dt0 = remaining;
        }
        if !dt0.is_finite() || dt0 <= 0.0 {
            return Err(Error::Config(format!("could not determine a time step (got {}); set fixed_dt", dt0)))
        }

        for lev in 0..self.dt_level.len() {
            self.dt_level[lev] = if subcycled { dt0 / ratio.powi(lev as i32) } else { dt0 };
        }
        debug!("new dt on level 0: {:.6e}", dt0);
        Ok(dt0)
    }


    // ========================================================================
    // Regridding


    /**
     * Ask the regrid policy for new grids above each level from `base` up,
     * replacing the levels whose grids changed. Returns whether anything
     * changed.
     */
    pub fn regrid(&mut self, base: usize, time: f64) -> Result<bool> {
        let max_level = self.config.amr.max_level;
        let mut changed = false;
        let mut lev = base;

        while max_level > 0 && lev <= self.finest_level().min(max_level - 1) {
            changed |= self.regrid_level(lev, time)?;
            lev += 1;
        }
        Ok(changed)
    }


    /**
     * Replace level `lev + 1` if the regrid policy wants different grids for
     * it, or remove every level above `lev` if it wants none. Data on a new
     * or changed level is interpolated from the level below, then
     * overwritten by the old data of that level where it overlaps.
     */
    pub fn regrid_level(&mut self, lev: usize, time: f64) -> Result<bool> {
        if lev >= self.config.amr.max_level || lev > self.finest_level() {
            return Ok(false)
        }
        let desired = self.regrid.new_grids(lev, &*self);

        let changed = match desired {
            Some(grids) => {
                if self.levels.get(lev + 1).map_or(true, |l| l.grids != grids) {
                    self.replace_level(lev + 1, grids, time)?;
                    true
                } else {
                    false
                }
            }
            None if lev < self.finest_level() => {
                self.levels.truncate(lev + 1);
                for reg in &mut self.flux_regs[lev + 1..] {
                    *reg = None
                }
                true
            }
            None => false,
        };
        if changed {
            info!("regridded above level {}: finest level {}, boxes per level {:?}",
                lev,
                self.finest_level(),
                self.levels.iter().map(|l| l.grids.len()).collect::<Vec<_>>());
        }
        Ok(changed)
    }


    fn replace_level(&mut self, lev: usize, grids: BoxArray, time: f64) -> Result<()> {
        let geom = self.levels[lev - 1].geom.refine(self.ratio());
        self.check_grids(lev, &grids, &geom)?;

        let mut state = MultiFab::new(grids.clone(), self.num_state(), self.config.amr.n_grow);
        state.copy_valid_from(&self.fill_coarse_patch(lev, &grids, time));

        if let Some(old) = self.levels.get(lev) {
            state.copy_valid_from(&old.state.new);
        }
        self.install_level(lev, geom, grids, state, time);
        Ok(())
    }


    // ========================================================================
    // Subcycled stepping


    /**
     * Advance level `lev` by its own time step, then take `ref_ratio` steps
     * of each finer level, then synchronize the two.
     */
    pub fn time_step(&mut self, lev: usize, time: f64) -> Result<()> {
        let dt = self.dt_level[lev];

        self.advance(lev, time, dt)?;
        self.level_steps[lev] += 1;
        self.level_count[lev] += 1;

        if lev < self.finest_level() {
            let dt_fine = self.dt_level[lev + 1];

            for i in 0..self.ratio() {
                self.time_step(lev + 1, time + i as f64 * dt_fine)?;
            }
            self.post_timestep(lev);
        }
        Ok(())
    }


    /**
     * Correct level `lev` with the flux mismatch recorded at its interface
     * with `lev + 1`, then replace its covered cells with the fine average.
     */
    pub fn post_timestep(&mut self, lev: usize) {
        if self.config.do_reflux {
            if let Some(reg) = &self.flux_regs[lev + 1] {
                let level = &mut self.levels[lev];
                reg.reflux(&mut level.state.new, &level.geom);
            }
        }
        let ratio = self.ratio();
        let (coarse, fine) = self.levels.split_at_mut(lev + 1);
        transfer::average_down(&fine[0].state.new, &mut coarse[lev].state.new, ratio);
    }


    /**
     * Take one step of the whole hierarchy from `time`, never going past
     * `stop_time`. Returns the level 0 time step that was taken.
     */
    pub fn coarse_time_step(&mut self, time: f64, stop_time: f64) -> Result<f64> {
        let dt = match self.config.time_stepping {
            TimeStepping::Subcycled => {
                let amr = &self.config.amr;

                if amr.max_level > 0 && self.level_steps[0] % amr.regrid_int == 0 {
                    self.regrid(0, time)?;
                }
                let dt = self.compute_new_dt(time, stop_time)?;
                self.time_step(0, time)?;
                dt
            }
            TimeStepping::Mlsdc => self.sdc_time_step(0, time, stop_time)?,
        };

        info!("[{}] t={:.6e} dt={:.6e}", self.level_steps[0], time + dt, dt);
        Ok(dt)
    }
}
