use log::{debug, log_enabled, Level};
use crate::multifab::MultiFab;
use crate::transfer::TransferKind;
use super::encap::{Encap, EncapKind};
use super::imex::{ImexHooks, ImexSweeper};
use super::nodes;




/**
 * Spatial transfer between the node fields of adjacent levels. Both
 * operations are named by the index of the finer of the two levels.
 */
pub trait Transfer {
    fn interpolate(&self, fine_level: usize, uf: &mut MultiFab, ug: &MultiFab, t: f64, kind: TransferKind);
    fn restrict(&self, fine_level: usize, uf: &MultiFab, ug: &mut MultiFab, t: f64, kind: TransferKind);
}




/// Everything the multi-level iteration needs from the problem.
pub trait MlsdcContext: ImexHooks + Transfer {}

impl<T: ImexHooks + Transfer + ?Sized> MlsdcContext for T {}




/// The shape of one level of an `Mlsdc` hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct SweeperLayout {
    pub encap: Encap,
    pub nodes: Vec<f64>,
}




/**
 * A multi-level SDC iteration: one IMEX sweeper per level, coarsest first,
 * coupled by V-cycles with FAS corrections. The hierarchy owns all node
 * storage; it is replaced as a whole whenever the level layout changes.
 */
pub struct Mlsdc {
    sweepers: Vec<ImexSweeper>,
    sweeps: usize,
    residual: Option<(f64, f64)>,
}




// ============================================================================
impl Mlsdc {


    /**
     * Build a hierarchy from a layout and a node count for each level. Node
     * counts must nest: each level's count minus one is a multiple of the
     * coarser level's count minus one.
     */
    pub fn new(levels: Vec<(Encap, usize)>) -> Self {
        assert!(!levels.is_empty(), "an SDC hierarchy needs at least one level");

        for pair in levels.windows(2) {
            let (nc, nf) = (pair[0].1, pair[1].1);
            assert!(nf >= nc && (nf - 1) % (nc - 1) == 0, "node counts {} and {} are not nested", nc, nf);
        }
        let finest = levels.len() - 1;
        let mut sweepers: Vec<ImexSweeper> = Vec::with_capacity(levels.len());

        for (lev, (encap, nnodes)) in levels.into_iter().enumerate() {
            let mut sweeper = ImexSweeper::new(encap, nodes::uniform(nnodes), lev < finest);

            if let Some(coarse) = sweepers.last() {
                sweeper = sweeper.with_coarse_source(coarse.encap(), coarse.nodes());
            }
            sweepers.push(sweeper);
        }

        Self { sweepers, sweeps: 0, residual: None }
    }


    pub fn num_levels(&self) -> usize {
        self.sweepers.len()
    }


    pub fn sweeper(&self, lev: usize) -> &ImexSweeper {
        &self.sweepers[lev]
    }


    /// The number of V-cycles done since the hierarchy was built.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }


    /// The max and 2-norms of the finest level's residual at the last node,
    /// as of the last sweep that computed it.
    pub fn residual(&self) -> Option<(f64, f64)> {
        self.residual
    }


    pub fn layout(&self) -> Vec<SweeperLayout> {
        self.sweepers
            .iter()
            .map(|s| SweeperLayout { encap: s.encap().clone(), nodes: s.nodes().to_vec() })
            .collect()
    }


    pub fn q0_mut(&mut self, lev: usize) -> &mut MultiFab {
        &mut self.sweepers[lev].q[0]
    }


    pub fn q_end(&self, lev: usize) -> &MultiFab {
        let q = &self.sweepers[lev].q;
        &q[q.len() - 1]
    }


    /**
     * Copy the initial value of each level to all of its nodes, and evaluate
     * the right-hand side there.
     */
    pub fn spread<C: MlsdcContext + ?Sized>(&mut self, ctx: &C, t0: f64, dt: f64) {
        for lev in 0..self.num_levels() {
            self.sweepers[lev].spread();
            self.update_coarse_source(lev);
            self.sweepers[lev].evaluate_all(ctx, t0, dt);
        }
    }


    /// Refresh the coarse source of level `lev` from the current node
    /// values of the level below.
    fn update_coarse_source(&mut self, lev: usize) {
        if lev > 0 {
            let (coarse, fine) = self.sweepers.split_at_mut(lev);
            fine[0].update_coarse_source(&coarse[lev - 1].q);
        }
    }


    /**
     * Do one V-cycle over the hierarchy for the step `[t0, t0 + dt]`.
     * Residuals are computed when debug logging is on, or if this is the
     * last sweep of the step.
     */
    pub fn sweep<C: MlsdcContext + ?Sized>(&mut self, ctx: &C, t0: f64, dt: f64, last: bool) {
        let num_levels = self.num_levels();
        let finest = num_levels - 1;
        let want_residuals = last || log_enabled!(Level::Debug);
        let iteration = self.sweeps;

        let sweep_level = |sweeper: &mut ImexSweeper, residual: &mut Option<(f64, f64)>| {
            sweeper.sweep(ctx, t0, dt);

            if want_residuals {
                let (r0, r2) = sweeper.compute_residual(dt);
                debug!("MLSDC iteration {}, level {}: residual norm0 {:.3e}, norm2 {:.3e}", iteration, sweeper.level(), r0, r2);

                if sweeper.level() == finest {
                    *residual = Some((r0, r2));
                }
            }
        };

        for lev in (1..num_levels).rev() {
            self.update_coarse_source(lev);
            self.update_coarse_source(lev - 1);
            let (coarse, fine) = self.sweepers.split_at_mut(lev);
            sweep_level(&mut fine[0], &mut self.residual);
            restrict_fas(ctx, &mut fine[0], &mut coarse[lev - 1], t0, dt);
        }

        sweep_level(&mut self.sweepers[0], &mut self.residual);

        for lev in 1..num_levels {
            self.update_coarse_source(lev);
            let (coarse, fine) = self.sweepers.split_at_mut(lev);
            interpolate_correction(ctx, &mut fine[0], &coarse[lev - 1], t0, dt);

            if lev < finest {
                sweep_level(&mut fine[0], &mut self.residual);
            }
        }
        self.sweeps += 1;
    }
}




/**
 * Restrict the fine node values onto the coarse nodes, re-evaluate the
 * coarse right-hand side, and set the coarse FAS correction so that coarse
 * integrals plus the correction equal the restricted fine integrals.
 */
fn restrict_fas<C: MlsdcContext + ?Sized>(ctx: &C, fine: &mut ImexSweeper, coarse: &mut ImexSweeper, t0: f64, dt: f64) {
    let fine_level = fine.level();
    let stride = (fine.num_nodes() - 1) / (coarse.num_nodes() - 1);

    for m in 0..coarse.num_nodes() {
        let t = t0 + dt * coarse.nodes()[m];
        ctx.restrict(fine_level, &fine.q[m * stride], &mut coarse.q[m], t, TransferKind::Solution);
    }
    coarse.evaluate_all(ctx, t0, dt);
    coarse.save();

    fine.integrate(dt, true);
    coarse.integrate(dt, false);

    for m in 0..coarse.num_nodes() - 1 {
        let t = t0 + dt * coarse.nodes()[m + 1];
        let mut fine_sum = fine.encap().create(EncapKind::Function);

        for k in m * stride..(m + 1) * stride {
            fine_sum.saxpy(1.0, &fine.integrals[k], 0);
        }
        let mut restricted = coarse.integrals[m].clone();
        ctx.restrict(fine_level, &fine_sum, &mut restricted, t, TransferKind::Function);

        if let Some(tau) = &mut coarse.tau {
            tau[m].lincomb(1.0, &restricted, -1.0, &coarse.integrals[m], 0);
        }
    }
}




/**
 * Interpolate the change of the coarse node values since they were saved,
 * in space and then in time, add it to the fine nodes after the first, and
 * re-evaluate the fine right-hand side there.
 */
fn interpolate_correction<C: MlsdcContext + ?Sized>(ctx: &C, fine: &mut ImexSweeper, coarse: &ImexSweeper, t0: f64, dt: f64) {
    let fine_level = fine.level();

    let corrections: Vec<MultiFab> = (0..coarse.num_nodes())
        .map(|m| {
            let t = t0 + dt * coarse.nodes()[m];
            let mut delta = coarse.encap().create(EncapKind::Function);
            delta.lincomb(1.0, &coarse.q[m], -1.0, &coarse.saved[m], 0);

            let mut delta_fine = fine.encap().create(EncapKind::Solution);
            ctx.interpolate(fine_level, &mut delta_fine, &delta, t, TransferKind::Correction);
            delta_fine
        })
        .collect();

    let pmat = nodes::interpolation_matrix(fine.nodes(), coarse.nodes());

    for n in 1..fine.num_nodes() {
        let t = t0 + dt * fine.nodes()[n];

        for (m, delta) in corrections.iter().enumerate() {
            if pmat[n][m] != 0.0 {
                fine.q[n].saxpy(pmat[n][m], delta, 0);
            }
        }
        ctx.post_step(fine_level, &mut fine.q[n], t);
        fine.evaluate(ctx, n, t);
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::cell::RefCell;
    use super::{Mlsdc, Transfer};
    use crate::box_array::BoxArray;
    use crate::index_space::range2d;
    use crate::multifab::MultiFab;
    use crate::sdc::{Encap, ImexHooks};
    use crate::transfer::TransferKind;

    /// `y' = a y + b y` on a single cell, with `b y` treated implicitly.
    struct Decay {
        a: f64,
        b: f64,
        seen: Option<RefCell<Vec<(usize, f64, Option<f64>)>>>,
    }

    impl ImexHooks for Decay {
        fn f1eval(&self, level: usize, q: &mut MultiFab, coarse: Option<&MultiFab>, t: f64, f1: &mut MultiFab) {
            if let Some(seen) = &self.seen {
                seen.borrow_mut().push((level, t, coarse.map(|c| c.patch(0).get((0, 0), 0))));
            }
            f1.lincomb(self.a, q, 0.0, q, 0);
        }
        fn f2eval(&self, _level: usize, q: &MultiFab, _t: f64, f2: &mut MultiFab) {
            f2.lincomb(self.b, q, 0.0, q, 0);
        }
        fn f2comp(&self, _level: usize, q: &mut MultiFab, _t: f64, dt: f64, rhs: &MultiFab, f2: &mut MultiFab) {
            q.lincomb(1.0 / (1.0 - dt * self.b), rhs, 0.0, rhs, 0);
            f2.lincomb(self.b, q, 0.0, q, 0);
        }
    }

    impl Transfer for Decay {
        fn interpolate(&self, _fine_level: usize, uf: &mut MultiFab, ug: &MultiFab, _t: f64, _kind: TransferKind) {
            uf.copy_from(ug, 0);
        }
        fn restrict(&self, _fine_level: usize, uf: &MultiFab, ug: &mut MultiFab, _t: f64, _kind: TransferKind) {
            ug.copy_from(uf, 0);
        }
    }

    fn solve(nnodes: &[usize], steps: usize, sweeps: usize) -> (f64, f64) {
        let ctx = Decay { a: -1.0, b: -0.5, seen: None };
        let encap = |level| Encap {
            level,
            boxes: BoxArray::new(vec![range2d(0..1, 0..1)]),
            num_fields: 1,
            n_grow: 0,
        };
        let mut mg = Mlsdc::new(nnodes.iter().enumerate().map(|(l, &n)| (encap(l), n)).collect());
        let finest = mg.num_levels() - 1;
        let dt = 1.0 / steps as f64;
        let mut y = 1.0;

        for step in 0..steps {
            let t0 = step as f64 * dt;

            for lev in 0..mg.num_levels() {
                mg.q0_mut(lev).set_val(y);
            }
            mg.spread(&ctx, t0, dt);

            for k in 0..sweeps {
                mg.sweep(&ctx, t0, dt, k == sweeps - 1);
            }
            y = mg.q_end(finest).patch(0).get((0, 0), 0);
        }
        assert_eq!(mg.sweeps(), steps * sweeps);
        ((y - (-1.5f64).exp()).abs(), mg.residual().unwrap().0)
    }

    #[test]
    fn single_level_sdc_converges_at_high_order() {
        let (e1, _) = solve(&[3], 10, 8);
        let (e2, _) = solve(&[3], 20, 8);
        assert!(e1 < 1e-5);
        assert!(e1 / e2 > 12.0);
    }

    #[test]
    fn two_level_iteration_converges_to_the_fine_collocation_solution() {
        let (error, residual) = solve(&[3, 5], 10, 6);
        assert!(error < 1e-5);
        assert!(residual < 1e-6);
    }

    #[test]
    fn fine_evaluations_see_the_coarse_solution_at_their_own_time() {
        let ctx = Decay { a: -1.0, b: -0.5, seen: Some(RefCell::new(Vec::new())) };
        let encap = |level| Encap {
            level,
            boxes: BoxArray::new(vec![range2d(0..1, 0..1)]),
            num_fields: 1,
            n_grow: 0,
        };
        let mut mg = Mlsdc::new(vec![(encap(0), 3), (encap(1), 5)]);
        let dt = 0.1;

        for lev in 0..2 {
            mg.q0_mut(lev).set_val(1.0);
        }
        mg.spread(&ctx, 0.0, dt);

        for k in 0..8 {
            mg.sweep(&ctx, 0.0, dt, k == 7);
        }
        let seen = ctx.seen.unwrap().into_inner();
        let (coarse, fine): (Vec<_>, Vec<_>) = seen.into_iter().partition(|(level, _, _)| *level == 0);

        assert!(coarse.iter().all(|(_, _, c)| c.is_none()));
        assert!(fine.iter().all(|(_, _, c)| c.is_some()));

        // Once converged, the coarse solution at the end of the step is close
        // to exp(-1.5 t) rather than the value at the start of the step.
        let (_, t, last) = fine[fine.len() - 1];
        assert!((t - dt).abs() < 1e-14);
        assert!((last.unwrap() - (-1.5 * dt).exp()).abs() < 1e-6);
    }

    #[test]
    #[should_panic]
    fn node_counts_must_nest() {
        let encap = |level| Encap {
            level,
            boxes: BoxArray::new(vec![range2d(0..1, 0..1)]),
            num_fields: 1,
            n_grow: 0,
        };
        Mlsdc::new(vec![(encap(0), 3), (encap(1), 4)]);
    }
}
