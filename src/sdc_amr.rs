use log::{error, info};
use rayon::prelude::*;
use crate::amr::{Amr, FillType};
use crate::config::MlsdcConfig;
use crate::error::{Error, Result};
use crate::kernel;
use crate::level::AmrLevel;
use crate::multifab::MultiFab;
use crate::sdc::{Encap, ImexHooks, Mlsdc, Transfer};
use crate::transfer::{self, TransferKind};




/**
 * The number of SDC nodes on level `lev` of a hierarchy whose finest level
 * is `finest`. The coarse levels use `nnodes0` nodes; at most `max_trefs`
 * of the finest levels refine in time, each by a factor of `trat` over the
 * level below it.
 */
pub fn nnodes(lev: usize, finest: usize, config: &MlsdcConfig) -> usize {
    let first = if finest > config.max_trefs + 1 {
        finest - config.max_trefs
    } else {
        1
    };
    if lev > first + 1 {
        1 + (config.nnodes0 - 1) * config.trat.pow((lev - first - 1) as u32)
    } else {
        config.nnodes0
    }
}




// ============================================================================
impl Amr {


    fn build_mlsdc_level(&self, lev: usize) -> (Encap, usize) {
        let level = &self.levels[lev];
        let encap = Encap {
            level: lev,
            boxes: level.grids.clone(),
            num_fields: self.num_state(),
            n_grow: self.config.amr.n_grow,
        };
        (encap, nnodes(lev, self.finest_level(), &self.config.mlsdc))
    }


    fn build_mlsdc(&self) -> Mlsdc {
        let levels: Vec<_> = (0..=self.finest_level()).map(|lev| self.build_mlsdc_level(lev)).collect();
        let counts: Vec<_> = levels.iter().map(|(_, n)| *n).collect();

        info!("rebuilt MLSDC hierarchy: {} levels, nodes per level {:?}", counts.len(), counts);
        Mlsdc::new(levels)
    }


    /**
     * Replace the SDC hierarchy with one matching the current levels.
     */
    pub fn rebuild_mlsdc(&mut self) {
        self.mlsdc = Some(self.build_mlsdc());
    }


    /**
     * Take one multi-level SDC step of the whole hierarchy from `time`. The
     * levels above `level` are regridded first, and the SDC hierarchy is
     * rebuilt. Returns the time step taken.
     */
    pub fn sdc_time_step(&mut self, level: usize, time: f64, stop_time: f64) -> Result<f64> {
        assert_eq!(level, 0, "the multi-level SDC step is only taken on level 0");

        let dt_prev = self.dt_level[0];
        self.compute_new_dt_from(time, stop_time, dt_prev)?;

        let max_level = self.config.amr.max_level;

        if max_level > 0 && self.level_steps[0] % self.config.amr.regrid_int == 0 {
            let mut lev = level;

            while lev <= self.finest_level().min(max_level - 1) {
                self.regrid_level(lev, time)?;
                self.compute_new_dt_from(time, stop_time, dt_prev)?;

                for count in &mut self.level_count[lev..] {
                    *count = 0
                }
                lev += 1;
            }
        }
        let dt = self.dt_level[0];
        let finest = self.finest_level();
        let n_grow = self.config.amr.n_grow;
        let mut mg = self.build_mlsdc();

        for lev in 0..=finest {
            let state = &mut self.levels[lev].state;
            mg.q0_mut(lev).copy_from(&state.new, n_grow);
            state.set_time_level(time + dt, dt);
        }
        for lev in 0..=finest {
            let fill_type = if lev == 0 { FillType::FillBoundary } else { FillType::FillCoarsePatch };
            self.fill_boundary(lev, mg.q0_mut(lev), time, fill_type);
        }

        mg.spread(&*self, time, dt);

        let max_iters = self.config.mlsdc.max_iters;

        for k in 0..max_iters {
            mg.sweep(&*self, time, dt, k + 1 == max_iters);
        }
        if let Some((r0, r2)) = mg.residual() {
            info!("MLSDC step to t={:.6e}: finest residual norm0 {:.3e}, norm2 {:.3e}", time + dt, r0, r2);
        }

        for lev in 0..=finest {
            self.levels[lev].state.new.copy_from(mg.q_end(lev), 0);
        }
        self.mlsdc = Some(mg);
        self.average_down_all();

        for lev in 0..=finest {
            if let Some(component) = self.levels[lev].state.new.first_non_finite(0) {
                error!("level {} has non-finite values in component {} after the SDC step to t={:.6e}", lev, component, time + dt);
                return Err(Error::NonFinite { level: lev, component })
            }
        }
        self.level_steps[level] += 1;
        self.level_count[level] += 1;
        Ok(dt)
    }
}




// ============================================================================
impl ImexHooks for Amr {

    fn f1eval(&self, level: usize, q: &mut MultiFab, coarse: Option<&MultiFab>, t: f64, f1: &mut MultiFab) {
        match (level, coarse) {
            (0, _) => self.fill_boundary(0, q, t, FillType::FillBoundary),
            (_, Some(crse)) => self.fill_boundary_from_coarse(level, q, crse, t),
            (_, None) => self.fill_boundary(level, q, t, FillType::FillCoarsePatch),
        }
        kernel::dudt(&*self.physics, q, &self.levels[level].geom, f1, false);
    }

    fn f2eval(&self, _level: usize, q: &MultiFab, _t: f64, f2: &mut MultiFab) {
        let physics = &*self.physics;

        f2.par_iter_mut().for_each(|(n, valid, p)| {
            for (f, u) in p.select_mut(valid).zip(q.patch(n).select(valid)) {
                physics.chemistry_rate(u, f)
            }
        })
    }

    fn f2comp(&self, _level: usize, q: &mut MultiFab, _t: f64, dt: f64, rhs: &MultiFab, f2: &mut MultiFab) {
        let physics = &*self.physics;

        q.par_iter_mut().for_each(|(n, valid, p)| {
            for (u, b) in p.select_mut(valid).zip(rhs.patch(n).select(valid)) {
                physics.chemistry_solve(u, b, dt)
            }
        });
        f2.lincomb(1.0 / dt, q, -1.0 / dt, rhs, 0);
    }

    fn post_step(&self, _level: usize, q: &mut MultiFab, _t: f64) {
        AmrLevel::post_update(&*self.physics, q);
    }
}




// ============================================================================
impl Transfer for Amr {

    fn interpolate(&self, fine_level: usize, uf: &mut MultiFab, ug: &MultiFab, t: f64, kind: TransferKind) {
        let fine = self.levels[fine_level].view(&*self.physics);
        let coarse = self.levels[fine_level - 1].view(&*self.physics);
        transfer::interpolate(&fine, &coarse, self.ratio(), self.interpolater, uf, ug, t, kind);
    }

    fn restrict(&self, fine_level: usize, uf: &MultiFab, ug: &mut MultiFab, t: f64, kind: TransferKind) {
        let coarse = self.levels[fine_level - 1].view(&*self.physics);
        transfer::restrict(&coarse, self.ratio(), uf, ug, t, kind);
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::nnodes;
    use crate::amr::{Amr, Regrid};
    use crate::box_array::BoxArray;
    use crate::config::{Chemistry, Config, MlsdcConfig, TimeStepping};
    use crate::index_space::{range2d, IndexSpace};
    use crate::physics::ReactiveAdvection;
    use crate::variables::{DENSITY, ENERGY, FIRST_SPEC};

    fn hierarchy(fine: &[IndexSpace], velocity: (f64, f64), fixed_dt: Option<f64>) -> Amr {
        let mut config = Config::default();
        config.amr.n_cell = (16, 16);
        config.amr.max_level = 3;
        config.amr.fixed_dt = fixed_dt;
        config.time_stepping = TimeStepping::Mlsdc;
        config.physics.velocity = velocity;
        config.physics.chemistry = Some(Chemistry { rate: 1.0 });

        let physics = Box::new(ReactiveAdvection::from_config(&config.physics));
        let mut grids = vec![BoxArray::new(vec![range2d(0..16, 0..16)])];
        grids.extend(fine.iter().map(|b| BoxArray::new(vec![b.clone()])));

        let mut amr = Amr::new(config, physics, grids).unwrap();
        amr.init_data(|_, s| {
            s.iter_mut().for_each(|v| *v = 0.0);
            s[DENSITY] = 1.0;
            s[ENERGY] = 2.0;
            s[FIRST_SPEC] = 1.0;
        });
        amr
    }

    #[test]
    fn node_counts_are_graded_toward_the_finest_levels() {
        let config = MlsdcConfig::default();
        let counts: Vec<_> = (0..=4).map(|lev| nnodes(lev, 4, &config)).collect();
        assert_eq!(counts, vec![3, 3, 3, 5, 9]);
        assert_eq!(nnodes(0, 0, &config), 3);
    }

    #[test]
    fn rebuilding_twice_gives_the_same_hierarchy() {
        let mut amr = hierarchy(&[range2d(8..24, 8..24)], (0.0, 0.0), Some(0.1));
        amr.rebuild_mlsdc();
        let first = amr.mlsdc().unwrap().layout();
        amr.rebuild_mlsdc();
        assert_eq!(amr.mlsdc().unwrap().layout(), first);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].encap.boxes, amr.level(1).grids);
    }

    #[test]
    fn four_level_chemistry_step_matches_the_exact_decay() {
        let mut amr = hierarchy(&[range2d(8..24, 8..24), range2d(24..40, 24..40), range2d(56..72, 56..72)], (0.0, 0.0), Some(0.1));
        let dt = amr.coarse_time_step(0.0, 1.0).unwrap();
        let mg = amr.mlsdc().unwrap();
        let a = (-0.1f64).exp();

        assert_eq!(dt, 0.1);
        assert_eq!(mg.sweeps(), amr.config().mlsdc.max_iters);
        assert_eq!(mg.layout().iter().map(|l| l.nodes.len()).collect::<Vec<_>>(), vec![3, 3, 3, 5]);

        for level in amr.levels() {
            let u = &level.state.new;
            for n in 0..u.len() {
                for s in u.patch(n).select(u.valid_box(n)) {
                    assert!((s[FIRST_SPEC] - a).abs() < 1e-6);
                    assert!((s[FIRST_SPEC + 1] - (1.0 - a)).abs() < 1e-6);
                }
            }
            assert_eq!(level.state.new_time, 0.1);
        }
        assert_eq!(amr.level_steps(0), 1);
    }

    #[test]
    fn uniform_flow_stays_uniform_across_levels() {
        let mut amr = hierarchy(&[range2d(8..24, 8..24)], (1.0, 0.5), Some(0.01));
        let mut time = 0.0;

        for _ in 0..2 {
            time += amr.coarse_time_step(time, 1.0).unwrap();
        }
        assert!((time - 0.02).abs() < 1e-14);

        for level in amr.levels() {
            let u = &level.state.new;
            for n in 0..u.len() {
                for s in u.patch(n).select(u.valid_box(n)) {
                    assert!((s[DENSITY] - 1.0).abs() < 1e-12);
                    assert!((s[FIRST_SPEC] - (-0.02f64).exp()).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn fine_level_decays_like_the_coarse_level_in_a_moving_flow() {
        let mut amr = hierarchy(&[range2d(8..24, 8..24), range2d(24..40, 24..40)], (1.0, -0.5), Some(0.004));
        let dt = amr.coarse_time_step(0.0, 1.0).unwrap();
        let exact = (-dt).exp();

        for level in amr.levels() {
            let u = &level.state.new;
            let worst = (0..u.len())
                .flat_map(|n| u.patch(n).select(u.valid_box(n)).map(|s| (s[FIRST_SPEC] - exact).abs()).collect::<Vec<_>>())
                .fold(0.0, f64::max);
            assert!(worst < 1e-10, "level {}: species error {:e}", level.level, worst);
        }
    }

    #[test]
    fn time_step_growth_is_limited_once_per_step_across_regrids() {
        let amr = hierarchy(&[range2d(8..24, 8..24), range2d(24..40, 24..40)], (0.0, 0.0), None);
        let mut amr = amr.with_regrid(Box::new(GrowingGrids));
        amr.dt_level[0] = 1e-3;

        let dt = amr.coarse_time_step(0.0, 1.0).unwrap();
        let limit = amr.config().amr.change_max * 1e-3;

        assert_eq!(amr.finest_level(), 1);
        assert!(dt <= limit * (1.0 + 1e-12), "dt {:e} exceeds {:e}", dt, limit);
        assert!((dt - limit).abs() < 1e-15);
    }

    struct GrowingGrids;

    impl Regrid for GrowingGrids {
        fn new_grids(&self, level: usize, _amr: &Amr) -> Option<BoxArray> {
            match level {
                0 => Some(BoxArray::new(vec![range2d(8..16, 8..24), range2d(16..24, 8..24)])),
                _ => None,
            }
        }
    }

    #[test]
    fn hierarchy_follows_the_regridded_levels() {
        let amr = hierarchy(&[range2d(8..24, 8..24), range2d(24..40, 24..40)], (0.0, 0.0), Some(0.1));
        let mut amr = amr.with_regrid(Box::new(GrowingGrids));
        amr.coarse_time_step(0.0, 1.0).unwrap();

        let layout = amr.mlsdc().unwrap().layout();
        assert_eq!(amr.finest_level(), 1);
        assert_eq!(layout.len(), 2);
        assert_eq!(layout[1].encap.boxes.len(), 2);
        assert_eq!(amr.level_count(1), 0);
    }
}
