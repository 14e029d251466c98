use crate::multifab::MultiFab;
use super::encap::{Encap, EncapKind};
use super::nodes;




/**
 * The right-hand side of an IMEX split problem `q' = f1(q) + f2(q)`, with
 * `f1` treated explicitly and `f2` implicitly. Each hook receives the index
 * of the level whose node field it works on.
 */
pub trait ImexHooks {

    /// Evaluate the explicit part. The ghost cells of `q` are filled first.
    /// On a refined level, `coarse` is the solution of the level below at
    /// time `t`, with its ghost cells filled.
    fn f1eval(&self, level: usize, q: &mut MultiFab, coarse: Option<&MultiFab>, t: f64, f1: &mut MultiFab);

    /// Evaluate the implicit part.
    fn f2eval(&self, level: usize, q: &MultiFab, t: f64, f2: &mut MultiFab);

    /// Solve `q - dt * f2(q) = rhs` for `q`, and set `f2` to `f2(q)`.
    fn f2comp(&self, level: usize, q: &mut MultiFab, t: f64, dt: f64, rhs: &MultiFab, f2: &mut MultiFab);

    /// Called on each newly computed node value.
    fn post_step(&self, _level: usize, _q: &mut MultiFab, _t: f64) {}
}




/**
 * The solution of the next coarser level at each node of a finer one,
 * interpolated in time from the coarse nodes.
 */
struct CoarseSource {
    pmat: Vec<Vec<f64>>,
    values: Vec<MultiFab>,
}




/**
 * The node set of one SDC level and the semi-implicit sweep over it.
 */
pub struct ImexSweeper {
    encap: Encap,
    nodes: Vec<f64>,
    smat: Vec<Vec<f64>>,
    pub(crate) q: Vec<MultiFab>,
    pub(crate) f1: Vec<MultiFab>,
    pub(crate) f2: Vec<MultiFab>,
    pub(crate) integrals: Vec<MultiFab>,
    pub(crate) residual: Vec<MultiFab>,
    pub(crate) tau: Option<Vec<MultiFab>>,
    pub(crate) saved: Vec<MultiFab>,
    coarse: Option<CoarseSource>,
}




// ============================================================================
impl ImexSweeper {


    /**
     * Allocate the node fields for the given layout and nodes on [0, 1].
     * Sweepers of all but the finest level carry an FAS correction.
     */
    pub fn new(encap: Encap, nodes: Vec<f64>, with_tau: bool) -> Self {
        let n = nodes.len();
        let solutions = |count: usize| (0..count).map(|_| encap.create(EncapKind::Solution)).collect::<Vec<_>>();
        let functions = |count: usize| (0..count).map(|_| encap.create(EncapKind::Function)).collect::<Vec<_>>();

        Self {
            smat: nodes::integration_matrix(&nodes),
            q: solutions(n),
            f1: functions(n),
            f2: functions(n),
            integrals: functions(n - 1),
            residual: functions(n - 1),
            tau: if with_tau { Some(functions(n - 1)) } else { None },
            saved: functions(n),
            coarse: None,
            encap,
            nodes,
        }
    }


    /// Hold the solution of the level below, with layout `coarse` and
    /// nodes `coarse_nodes`, at each node of this level.
    pub fn with_coarse_source(mut self, coarse: &Encap, coarse_nodes: &[f64]) -> Self {
        let snap = |w: f64| if w.abs() < 1e-12 { 0.0 } else if (w - 1.0).abs() < 1e-12 { 1.0 } else { w };
        let pmat = nodes::interpolation_matrix(&self.nodes, coarse_nodes)
            .into_iter()
            .map(|row| row.into_iter().map(snap).collect())
            .collect();

        self.coarse = Some(CoarseSource {
            pmat,
            values: (0..self.nodes.len()).map(|_| coarse.create(EncapKind::Solution)).collect(),
        });
        self
    }


    /// Interpolate `coarse_q`, the node values of the level below, onto the
    /// nodes of this one. Does nothing on a level without a coarse source.
    pub fn update_coarse_source(&mut self, coarse_q: &[MultiFab]) {
        if let Some(source) = &mut self.coarse {
            for (value, row) in source.values.iter_mut().zip(&source.pmat) {
                let n_grow = value.n_grow();
                value.set_val(0.0);

                for (w, q) in row.iter().zip(coarse_q).filter(|(w, _)| **w != 0.0) {
                    value.saxpy(*w, q, n_grow)
                }
            }
        }
    }


    pub fn encap(&self) -> &Encap {
        &self.encap
    }


    pub fn level(&self) -> usize {
        self.encap.level
    }


    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }


    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }


    /// Copy the first node to all the others, ghost cells included.
    pub fn spread(&mut self) {
        let n_grow = self.encap.n_grow;
        let (first, rest) = self.q.split_at_mut(1);

        for q in rest {
            q.copy_from(&first[0], n_grow)
        }
    }


    pub fn evaluate<H: ImexHooks + ?Sized>(&mut self, hooks: &H, m: usize, t: f64) {
        let level = self.encap.level;
        let coarse = self.coarse.as_ref().map(|c| &c.values[m]);
        hooks.f1eval(level, &mut self.q[m], coarse, t, &mut self.f1[m]);
        hooks.f2eval(level, &self.q[m], t, &mut self.f2[m]);
    }


    pub fn evaluate_all<H: ImexHooks + ?Sized>(&mut self, hooks: &H, t0: f64, dt: f64) {
        for m in 0..self.num_nodes() {
            self.evaluate(hooks, m, t0 + dt * self.nodes[m]);
        }
    }


    /// Keep a copy of the node values, for computing a correction later.
    pub fn save(&mut self) {
        for (s, q) in self.saved.iter_mut().zip(&self.q) {
            s.copy_from(q, 0)
        }
    }


    /**
     * Set the node-to-node integrals of `f1 + f2` over a step of size `dt`,
     * adding the FAS correction if requested and present.
     */
    pub fn integrate(&mut self, dt: f64, with_tau: bool) {
        for (m, integral) in self.integrals.iter_mut().enumerate() {
            integral.set_val(0.0);

            for (j, s) in self.smat[m].iter().enumerate() {
                integral.saxpy(dt * s, &self.f1[j], 0);
                integral.saxpy(dt * s, &self.f2[j], 0);
            }
            if let (true, Some(tau)) = (with_tau, &self.tau) {
                integral.saxpy(1.0, &tau[m], 0);
            }
        }
    }


    /**
     * Do one forward-backward Euler correction sweep over the nodes of a step
     * starting at `t0`.
     */
    pub fn sweep<H: ImexHooks + ?Sized>(&mut self, hooks: &H, t0: f64, dt: f64) {
        let level = self.encap.level;
        let n = self.num_nodes();

        self.integrate(dt, true);

        let f1_old = self.f1.clone();
        let f2_old = self.f2.clone();
        let mut rhs = self.encap.create(EncapKind::Function);

        for m in 0..n - 1 {
            let t = t0 + dt * self.nodes[m + 1];
            let dtm = dt * (self.nodes[m + 1] - self.nodes[m]);

            rhs.copy_from(&self.q[m], 0);
            rhs.saxpy(dtm, &self.f1[m], 0);
            rhs.saxpy(-dtm, &f1_old[m], 0);
            rhs.saxpy(-dtm, &f2_old[m + 1], 0);
            rhs.saxpy(1.0, &self.integrals[m], 0);

            hooks.f2comp(level, &mut self.q[m + 1], t, dtm, &rhs, &mut self.f2[m + 1]);
            hooks.post_step(level, &mut self.q[m + 1], t);
            let coarse = self.coarse.as_ref().map(|c| &c.values[m + 1]);
            hooks.f1eval(level, &mut self.q[m + 1], coarse, t, &mut self.f1[m + 1]);
        }
    }


    /**
     * Compute the residual of the collocation problem at every node, and
     * return the max and 2-norms of the one at the last node.
     */
    pub fn compute_residual(&mut self, dt: f64) -> (f64, f64) {
        self.integrate(dt, true);

        let mut acc = self.encap.create(EncapKind::Function);
        acc.copy_from(&self.q[0], 0);

        for (m, r) in self.residual.iter_mut().enumerate() {
            acc.saxpy(1.0, &self.integrals[m], 0);
            r.lincomb(1.0, &acc, -1.0, &self.q[m + 1], 0);
        }
        let last = &self.residual[self.residual.len() - 1];
        (last.norm0(), last.norm2())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::ImexSweeper;
    use crate::box_array::BoxArray;
    use crate::index_space::range2d;
    use crate::sdc::{nodes, Encap, EncapKind};

    fn encap(level: usize, n_grow: i64) -> Encap {
        Encap {
            level,
            boxes: BoxArray::new(vec![range2d(0..2, 0..2)]),
            num_fields: 1,
            n_grow,
        }
    }

    #[test]
    fn coarse_source_is_interpolated_to_the_fine_nodes() {
        let coarse = encap(0, 1);
        let coarse_nodes = nodes::uniform(3);
        let mut sweeper = ImexSweeper::new(encap(1, 1), nodes::uniform(5), false).with_coarse_source(&coarse, &coarse_nodes);

        let q: Vec<_> = coarse_nodes
            .iter()
            .map(|t| {
                let mut q = coarse.create(EncapKind::Solution);
                q.set_val(1.0 + t * t);
                q
            })
            .collect();
        sweeper.update_coarse_source(&q);

        let source = sweeper.coarse.as_ref().unwrap();

        for (t, value) in sweeper.nodes().iter().zip(&source.values) {
            assert!((value.patch(0).get((-1, -1), 0) - (1.0 + t * t)).abs() < 1e-14);
            assert!((value.patch(0).get((1, 0), 0) - (1.0 + t * t)).abs() < 1e-14);
        }
        assert_eq!(source.values[4].patch(0).get((0, 0), 0), 2.0);
    }

    #[test]
    fn coarsest_sweeper_has_no_coarse_source() {
        let mut sweeper = ImexSweeper::new(encap(0, 0), nodes::uniform(3), true);
        sweeper.update_coarse_source(&[]);
        assert!(sweeper.coarse.is_none());
    }
}
