use std::borrow::Cow;
use rayon::prelude::*;
use crate::bc::BcRec;
use crate::box_array::BoxArray;
use crate::geometry::Geometry;
use crate::multifab::MultiFab;
use crate::physics::Physics;
use crate::transfer::LevelView;




/**
 * Which integrator owns a level's state. Standard levels keep an old and a
 * new copy of the state and are advanced by the Runge-Kutta path; SDC
 * levels keep only the new copy, the node storage being owned by the
 * multi-level SDC context.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelVariant {
    Standard,
    Sdc,
}




/**
 * The state of a level at up to two time instants.
 */
#[derive(Clone, Debug)]
pub struct StateData {
    pub old: Option<MultiFab>,
    pub new: MultiFab,
    pub old_time: f64,
    pub new_time: f64,
}




// ============================================================================
impl StateData {

    pub fn new(new: MultiFab, time: f64) -> Self {
        Self { old: None, new, old_time: time, new_time: time }
    }


    /**
     * Make the current new state the old one, and advance the new time by
     * `dt`. The previous old storage, if any, is recycled as the new one.
     */
    pub fn swap_time_levels(&mut self, dt: f64) {
        let recycled = match self.old.take() {
            Some(old) => old,
            None => self.new.clone(),
        };
        self.old = Some(std::mem::replace(&mut self.new, recycled));
        self.old_time = self.new_time;
        self.new_time += dt;
    }


    /// The old state, or the new one if there is no old copy.
    pub fn old(&self) -> &MultiFab {
        self.old.as_ref().unwrap_or(&self.new)
    }


    /**
     * Set the time of the new state, with the old state `dt_old` behind it.
     */
    pub fn set_time_level(&mut self, time: f64, dt_old: f64) {
        self.new_time = time;
        self.old_time = time - dt_old;
    }


    /**
     * Return the state at the given time: the new state if there is no old
     * state or the time matches the new time, the old state if it matches
     * the old time, and otherwise a linear interpolation between the two.
     */
    pub fn data_at(&self, time: f64) -> Cow<'_, MultiFab> {
        let old = match &self.old {
            Some(old) => old,
            None => return Cow::Borrowed(&self.new),
        };
        let span = self.new_time - self.old_time;
        let eps = 1e-10 * span.abs().max(f64::MIN_POSITIVE);

        if (time - self.new_time).abs() <= eps || span.abs() <= f64::MIN_POSITIVE {
            Cow::Borrowed(&self.new)
        } else if (time - self.old_time).abs() <= eps {
            Cow::Borrowed(old)
        } else {
            let b = (time - self.old_time) / span;
            let mut blend = self.new.clone();
            blend.lincomb(1.0 - b, old, b, &self.new, self.new.n_grow());
            Cow::Owned(blend)
        }
    }
}




/**
 * One level of the AMR hierarchy.
 */
#[derive(Clone, Debug)]
pub struct AmrLevel {
    pub level: usize,
    pub variant: LevelVariant,
    pub geom: Geometry,
    pub grids: BoxArray,
    pub bcs: Vec<BcRec>,
    pub state: StateData,
}




// ============================================================================
impl AmrLevel {

    pub fn view<'a>(&'a self, physics: &'a dyn Physics) -> LevelView<'a> {
        LevelView {
            geom: &self.geom,
            bcs: &self.bcs,
            physics,
        }
    }


    /**
     * Make the species consistent with the density, and recompute the
     * temperature, in every valid cell.
     */
    pub fn post_update(physics: &dyn Physics, u: &mut MultiFab) {
        u.par_iter_mut().for_each(|(_, valid, p)| {
            for s in p.select_mut(valid) {
                physics.enforce_consistent_y(s);
                physics.compute_temp(s);
            }
        })
    }


    /**
     * Advance the reactions over `dt` in every valid cell, then apply the
     * post-update. Nothing happens to the species if the physics has no
     * chemistry.
     */
    pub fn advance_chemistry(physics: &dyn Physics, u: &mut MultiFab, dt: f64) {
        if physics.has_chemistry() {
            u.par_iter_mut().for_each(|(_, valid, p)| {
                for s in p.select_mut(valid) {
                    physics.advance_chemistry(s, dt);
                }
            })
        }
        Self::post_update(physics, u);
    }


    /**
     * Estimate the largest stable time step on this level's new state.
     * Returns infinity if no signal propagates.
     */
    pub fn estimate_dt(&self, physics: &dyn Physics, cfl: f64) -> f64 {
        let (dx, dy) = self.geom.cell_size();
        let u = &self.state.new;

        let rate = u.patches()
            .par_iter()
            .enumerate()
            .map(|(n, p)| {
                p.select(u.valid_box(n))
                    .map(|s| {
                        let (a, b) = physics.max_signal_speed(s);
                        a / dx + b / dy
                    })
                    .fold(0.0, f64::max)
            })
            .reduce(|| 0.0, f64::max);

        if rate > 0.0 {
            cfl / rate
        } else {
            f64::INFINITY
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::StateData;
    use crate::box_array::BoxArray;
    use crate::index_space::range2d;
    use crate::multifab::MultiFab;

    fn state(value: f64) -> MultiFab {
        let mut mf = MultiFab::new(BoxArray::new(vec![range2d(0..4, 0..4)]), 1, 1);
        mf.set_val(value);
        mf
    }

    #[test]
    fn state_without_old_data_always_returns_new() {
        let data = StateData::new(state(1.0), 0.0);
        assert_eq!(data.data_at(-5.0).norm0(), 1.0);
    }

    #[test]
    fn state_interpolates_between_time_levels() {
        let mut data = StateData::new(state(1.0), 0.0);
        data.swap_time_levels(0.5);
        data.new.set_val(3.0);
        assert_eq!(data.data_at(0.0).norm0(), 1.0);
        assert_eq!(data.data_at(0.5).norm0(), 3.0);
        assert_eq!(data.data_at(0.25).norm0(), 2.0);
        assert_eq!((data.old_time, data.new_time), (0.0, 0.5));
    }
}
