use log::error;
use crate::amr::{Amr, FillType};
use crate::error::{Error, Result};
use crate::flux_register::FluxRegister;
use crate::kernel;
use crate::level::{AmrLevel, LevelVariant};
use crate::multifab::MultiFab;
use crate::patch::Patch;




// ============================================================================
impl Amr {


    /**
     * Advance level `lev` from `time` by `dt` with the Runge-Kutta scheme
     * of the configured order, with half a step of chemistry on either side
     * of the advection. Returns the time step taken.
     */
    pub fn advance(&mut self, lev: usize, time: f64, dt: f64) -> Result<f64> {
        assert_eq!(self.levels[lev].variant, LevelVariant::Standard, "only standard levels are advanced with Runge-Kutta");

        self.levels[lev].state.swap_time_levels(dt);
        let mut unew = std::mem::take(&mut self.levels[lev].state.new);

        if lev == 0 {
            unew.copy_from(self.levels[lev].state.old(), unew.n_grow());
            self.fill_boundary(lev, &mut unew, time, FillType::FillBoundary);
        } else {
            self.fill_boundary(lev, &mut unew, time, FillType::FillPatchIterator);
        }

        AmrLevel::advance_chemistry(&*self.physics, &mut unew, 0.5 * dt);

        match self.config.rk_order {
            3 => self.advance_ad_rk3(lev, &mut unew, time, dt),
            _ => self.advance_ad_rk2(lev, &mut unew, time, dt),
        }

        AmrLevel::advance_chemistry(&*self.physics, &mut unew, 0.5 * dt);

        let bad = unew.first_non_finite(0);
        self.levels[lev].state.new = unew;

        match bad {
            Some(component) => {
                error!("level {} has non-finite values in component {} after advancing to t={:.6e}", lev, component, time + dt);
                Err(Error::NonFinite { level: lev, component })
            }
            None => Ok(dt),
        }
    }


    fn advance_ad_rk2(&mut self, lev: usize, unew: &mut MultiFab, time: f64, dt: f64) {
        let finest = lev == self.finest_level();
        let reflux = self.config.do_reflux;

        let mut fine = if reflux && !finest { self.flux_regs[lev + 1].take() } else { None };
        let mut current = if reflux && lev > 0 { self.flux_regs[lev].take() } else { None };

        if let Some(fine) = &mut fine {
            fine.set_val(0.0);
        }
        let fill_type = if lev == 0 { FillType::FillBoundary } else { FillType::FillCoarsePatch };
        let mut uprime = MultiFab::new(unew.boxes().clone(), unew.num_fields(), 0);

        {
            let uold = self.levels[lev].state.old();
            let physics = &*self.physics;

            self.dudt(lev, unew, &mut uprime, time, fill_type, None, None, dt);
            unew.lincomb(1.0, uold, 0.5 * dt, &uprime, 0);
            AmrLevel::post_update(physics, unew);

            self.dudt(lev, unew, &mut uprime, time + 0.5 * dt, fill_type, fine.as_mut(), current.as_mut(), dt);
            unew.lincomb(1.0, uold, dt, &uprime, 0);
            AmrLevel::post_update(physics, unew);
        }

        if reflux && !finest {
            self.flux_regs[lev + 1] = fine;
        }
        if reflux && lev > 0 {
            self.flux_regs[lev] = current;
        }
    }


    fn advance_ad_rk3(&self, lev: usize, unew: &mut MultiFab, time: f64, dt: f64) {
        assert_eq!(lev, 0, "third order Runge-Kutta is only available on level 0");

        let uold = self.levels[lev].state.old();
        let physics = &*self.physics;
        let fill_type = FillType::FillBoundary;
        let mut uprime = MultiFab::new(unew.boxes().clone(), unew.num_fields(), 0);

        self.dudt(lev, unew, &mut uprime, time, fill_type, None, None, dt);
        unew.lincomb(1.0, uold, dt, &uprime, 0);
        AmrLevel::post_update(physics, unew);

        let mut utmp = unew.clone();
        self.dudt(lev, unew, &mut uprime, time + dt / 3.0, fill_type, None, None, dt);
        utmp.lincomb(0.75, uold, 0.25, unew, 0);
        utmp.saxpy(0.25 * dt, &uprime, 0);
        AmrLevel::post_update(physics, &mut utmp);

        self.dudt(lev, &mut utmp, &mut uprime, time + 2.0 * dt / 3.0, fill_type, None, None, dt);
        unew.lincomb(1.0 / 3.0, uold, 2.0 / 3.0, &utmp, 0);
        unew.saxpy(2.0 / 3.0 * dt, &uprime, 0);
        AmrLevel::post_update(physics, unew);
    }


    /**
     * Fill the ghost cells of `u` and evaluate its time derivative. Face
     * fluxes go into the coarse side of the `fine` register and the fine
     * side of the `current` one, when those are given.
     */
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn dudt(
        &self,
        lev: usize,
        u: &mut MultiFab,
        uprime: &mut MultiFab,
        time: f64,
        fill_type: FillType,
        fine: Option<&mut FluxRegister>,
        mut current: Option<&mut FluxRegister>,
        dt: f64,
    ) {
        self.fill_boundary(lev, u, time, fill_type);

        let level = &self.levels[lev];
        let want_fluxes = fine.is_some() || current.is_some();
        let fluxes = kernel::dudt(&*self.physics, u, &level.geom, uprime, want_fluxes);

        if !want_fluxes {
            return
        }
        let mut coarse_fluxes: Vec<(usize, [Patch; 2])> = Vec::with_capacity(u.len());

        for (n, box_fluxes) in fluxes.iter() {
            if let Some(current) = current.as_mut() {
                current.fine_add(n, &box_fluxes, &level.geom, dt);
            }
            if fine.is_some() {
                coarse_fluxes.push((n, box_fluxes));
            }
        }
        if let Some(fine) = fine {
            coarse_fluxes.sort_by_key(|(n, _)| *n);
            let coarse_fluxes: Vec<_> = coarse_fluxes.into_iter().map(|(_, f)| f).collect();
            fine.crse_init(&level.grids, &coarse_fluxes, &level.geom, -dt);
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::amr::Amr;
    use crate::box_array::BoxArray;
    use crate::config::{Config, TimeStepping};
    use crate::index_space::range2d;
    use crate::physics::ReactiveAdvection;
    use crate::variables::{DENSITY, ENERGY, FIRST_SPEC, TEMP, XMOM};

    fn single_level(rk_order: u32, velocity: (f64, f64)) -> Amr {
        let mut config = Config::default();
        config.amr.n_cell = (16, 16);
        config.rk_order = rk_order;
        config.time_stepping = TimeStepping::Subcycled;
        config.physics.velocity = velocity;

        let physics = Box::new(ReactiveAdvection::from_config(&config.physics));
        let grids = vec![BoxArray::new(vec![range2d(0..8, 0..16), range2d(8..16, 0..16)])];
        let mut amr = Amr::new(config, physics, grids).unwrap();

        amr.init_data(|(x, y), s| {
            s.iter_mut().for_each(|v| *v = 0.0);
            s[DENSITY] = 1.0;
            s[XMOM] = x;
            s[ENERGY] = 2.0 + y;
            s[TEMP] = s[ENERGY] / s[DENSITY];
            s[FIRST_SPEC] = 0.25;
            s[FIRST_SPEC + 1] = 0.75;
        });
        amr
    }

    #[test]
    fn rk2_step_with_zero_derivative_leaves_the_state_unchanged() {
        let mut amr = single_level(2, (0.0, 0.0));
        let before = amr.level(0).state.new.clone();
        amr.advance(0, 0.0, 0.1).unwrap();

        for n in 0..2 {
            let valid = before.valid_box(n).clone();
            let a: Vec<_> = before.patch(n).select(&valid).collect();
            let b: Vec<_> = amr.level(0).state.new.patch(n).select(&valid).collect();
            assert_eq!(a, b);
        }
        assert_eq!(amr.level(0).state.new_time, 0.1);
    }

    #[test]
    fn rk3_step_advects_a_uniform_state_without_change() {
        let mut amr = single_level(3, (1.0, -1.0));
        amr.init_data(|_, s| {
            s.iter_mut().for_each(|v| *v = 0.0);
            s[DENSITY] = 2.0;
            s[ENERGY] = 4.0;
            s[FIRST_SPEC] = 1.0;
            s[FIRST_SPEC + 1] = 1.0;
        });
        let dt = amr.compute_new_dt(0.0, 1.0).unwrap();
        amr.advance(0, 0.0, dt).unwrap();

        let u = &amr.level(0).state.new;
        assert!((u.sum(DENSITY) - 2.0 * 256.0).abs() < 1e-10);
        assert!((u.norm0() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_state_is_reported() {
        let mut amr = single_level(2, (1.0, 0.0));
        amr.init_data(|_, s| {
            s.iter_mut().for_each(|v| *v = 1.0);
            s[DENSITY] = f64::NAN;
        });
        assert!(matches!(amr.advance(0, 0.0, 0.01), Err(crate::error::Error::NonFinite { level: 0, .. })));
    }
}
