use rayon::prelude::*;
use crate::bc::{self, BcRec, FillMode};
use crate::box_array::BoxArray;
use crate::geometry::Geometry;
use crate::index_space::Axis;
use crate::interp::Interpolater;
use crate::multifab::MultiFab;
use crate::physics::Physics;




/**
 * The kind of data moved between levels. Solutions get inhomogeneous
 * boundary data and have their ghost cells refreshed after a restriction;
 * corrections get homogeneous boundary data; function values (time
 * derivatives, integrals) have no ghost cells at all.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferKind {
    Solution,
    Correction,
    Function,
}

impl TransferKind {
    pub fn fill_mode(self) -> FillMode {
        match self {
            TransferKind::Correction => FillMode::Correction,
            _ => FillMode::Solution,
        }
    }
}




/**
 * What the transfer operators need to know about one level: its geometry,
 * the boundary conditions of each component, and the physics providing
 * external boundary data.
 */
#[derive(Clone, Copy)]
pub struct LevelView<'a> {
    pub geom: &'a Geometry,
    pub bcs: &'a [BcRec],
    pub physics: &'a dyn Physics,
}




// ============================================================================
impl<'a> LevelView<'a> {

    /// Fill the ghost cells of `u` outside the domain in non-periodic
    /// directions.
    pub fn fill_physical_boundary(&self, u: &mut MultiFab, time: f64, mode: FillMode) {
        let LevelView { geom, bcs, physics } = *self;

        u.patches_mut().par_iter_mut().for_each(|p| {
            bc::fill_physical(p, geom, bcs, mode, |x, s| physics.boundary_value(x, time, s))
        })
    }

    /// Same-level exchange, periodic images, then the physical boundary.
    pub fn fill_boundary(&self, u: &mut MultiFab, time: f64, mode: FillMode) {
        u.fill_boundary(Some(self.geom));
        self.fill_physical_boundary(u, time, mode);
    }
}




/**
 * Interpolate the coarse field `ug` onto every cell of the fine field `uf`,
 * ghost cells included. The fine field is set to NaN first, so any cell
 * left unfilled shows up in the finiteness checks.
 */
pub fn interpolate(
    fine: &LevelView,
    coarse: &LevelView,
    ratio: i64,
    interpolater: Interpolater,
    uf: &mut MultiFab,
    ug: &MultiFab,
    time: f64,
    kind: TransferKind,
) {
    let mode = kind.fill_mode();
    let num_fields = uf.num_fields();
    let crse_domain = coarse.geom.domain();

    uf.set_nan();

    let crse_boxes = BoxArray::new((0..uf.len()).map(|n| interpolater.coarse_box(uf.fab_box(n), ratio)).collect());
    let mut uc = MultiFab::new(crse_boxes.clone(), num_fields, 0);
    uc.set_nan();

    let inside = crse_boxes.iter().all(|b| crse_domain.contains_space(b));
    let extension = |b: &crate::index_space::IndexSpace, axis: Axis| {
        let (r, d) = (b.range(axis), crse_domain.range(axis));
        (d.start - r.start).max(r.end - d.end).max(0)
    };
    let touches_periodic = crse_boxes.iter().any(|b| {
        Axis::BOTH.iter().any(|&axis| coarse.geom.is_periodic(axis) && extension(b, axis) > 0)
    });

    if inside {
        uc.copy_valid_from(ug);
    } else if touches_periodic {
        let ng = crse_boxes
            .iter()
            .flat_map(|b| Axis::BOTH.iter().map(move |&axis| extension(b, axis)))
            .max()
            .unwrap_or(0);
        let mut grown = MultiFab::new(ug.boxes().clone(), num_fields, ng);
        grown.copy_from(ug, 0);
        coarse.fill_boundary(&mut grown, time, mode);
        uc.copy_fab_from(&grown);
        uc.copy_valid_from(ug);
    } else {
        uc.copy_valid_from(ug);
        coarse.fill_physical_boundary(&mut uc, time, mode);
    }
    debug_assert!(!uc.contains_non_finite(0), "coarse interpolation data has unfilled cells");

    let fine_domain = fine.geom.domain();

    uf.patches_mut().par_iter_mut().zip(uc.patches()).for_each(|(pf, pc)| {
        let fab = pf.index_space().clone();
        let bcr = bc::set_bc(&fab, fine_domain, fine.bcs);
        interpolater.interp(pc, pf, &fab, ratio, crse_domain, &bcr);
    });

    fine.fill_boundary(uf, time, mode);
    debug_assert!(!uf.contains_non_finite(uf.n_grow()), "interpolated data has unfilled cells");
}




/**
 * Replace each coarse valid cell covered by the fine level with the average
 * of its fine children. Fine boxes must be aligned with the refinement
 * ratio.
 */
pub fn average_down(uf: &MultiFab, ug: &mut MultiFab, ratio: i64) {
    let fine_boxes = uf.boxes();
    let norm = (ratio * ratio) as f64;

    ug.par_iter_mut().for_each(|(_, valid, pc)| {
        for (m, fb) in fine_boxes.iter().enumerate() {
            if let Some(overlap) = fb.coarsen_by(ratio).intersect(valid) {
                let pf = uf.patch(m);

                for ((i, j), s) in overlap.iter().zip(pc.select_mut(&overlap)) {
                    for (n, x) in s.iter_mut().enumerate() {
                        let mut sum = 0.0;
                        for a in 0..ratio {
                            for b in 0..ratio {
                                sum += pf.get((i * ratio + a, j * ratio + b), n);
                            }
                        }
                        *x = sum / norm;
                    }
                }
            }
        }
    })
}




/**
 * Restrict the fine field onto the coarse one by averaging, refreshing the
 * coarse ghost cells if the data is a solution.
 */
pub fn restrict(coarse: &LevelView, ratio: i64, uf: &MultiFab, ug: &mut MultiFab, time: f64, kind: TransferKind) {
    average_down(uf, ug, ratio);

    if kind == TransferKind::Solution {
        coarse.fill_boundary(ug, time, FillMode::Solution);
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::bc::{component_bcs, set_bc, DomainBc, PhysBc};
    use crate::index_space::range2d;
    use crate::patch::Patch;
    use crate::physics::ReactiveAdvection;
    use crate::variables::Variables;

    struct Setup {
        physics: ReactiveAdvection,
        bcs: Vec<BcRec>,
        geom_c: Geometry,
        geom_f: Geometry,
    }

    fn setup(n: i64) -> Setup {
        let vars = Variables::new(2);
        let geom_c = Geometry::new(range2d(0..n, 0..n), (0.0, 0.0), (1.0, 1.0), [true, true]);
        Setup {
            physics: ReactiveAdvection::new(vars, (1.0, 1.0), None),
            bcs: component_bcs(&DomainBc::periodic(), &vars),
            geom_f: geom_c.refine(2),
            geom_c,
        }
    }

    fn field(boxes: Vec<crate::index_space::IndexSpace>, n_grow: i64, f: impl Fn(i64, i64, usize) -> f64 + Sync) -> MultiFab {
        let mut mf = MultiFab::new(BoxArray::new(boxes), 7, n_grow);
        mf.par_iter_mut().for_each(|(_, _, p)| {
            let space = p.index_space().clone();
            for ((i, j), s) in space.iter().zip(p.select_mut(&space)) {
                for (n, x) in s.iter_mut().enumerate() {
                    *x = f(i, j, n);
                }
            }
        });
        mf
    }

    #[test]
    fn interpolate_then_restrict_reproduces_coarse_data() {
        let s = setup(16);
        let (fine, coarse) = (
            LevelView { geom: &s.geom_f, bcs: &s.bcs, physics: &s.physics },
            LevelView { geom: &s.geom_c, bcs: &s.bcs, physics: &s.physics });
        let ug = field(vec![range2d(0..16, 0..16)], 2, |i, j, n| (i + 2 * j + n as i64) as f64);
        let mut uf = MultiFab::new(BoxArray::new(vec![range2d(8..24, 8..24)]), 7, 2);

        interpolate(&fine, &coarse, 2, Interpolater::CellConservativeLinear, &mut uf, &ug, 0.0, TransferKind::Solution);

        let mut restricted = MultiFab::new(ug.boxes().clone(), 7, 2);
        restrict(&coarse, 2, &uf, &mut restricted, 0.0, TransferKind::Function);

        for (i, j) in range2d(4..12, 4..12).iter() {
            assert_eq!(restricted.patch(0).get_slice((i, j)), ug.patch(0).get_slice((i, j)));
        }
    }

    #[test]
    fn periodic_interpolation_matches_wrapped_reference() {
        let s = setup(8);
        let (fine, coarse) = (
            LevelView { geom: &s.geom_f, bcs: &s.bcs, physics: &s.physics },
            LevelView { geom: &s.geom_c, bcs: &s.bcs, physics: &s.physics });
        let value = |i: i64, j: i64, n: usize| (0.7 * i as f64 + 0.3 * j as f64 + n as f64).sin();
        let ug = field(vec![range2d(0..8, 0..8)], 1, value);
        let mut uf = MultiFab::new(BoxArray::new(vec![range2d(0..8, 4..12)]), 7, 2);

        interpolate(&fine, &coarse, 2, Interpolater::CellConservativeLinear, &mut uf, &ug, 0.0, TransferKind::Solution);

        let fab = uf.fab_box(0).clone();
        let crse_space = Interpolater::CellConservativeLinear.coarse_box(&fab, 2);
        let crse = Patch::from_slice_function(7, crse_space, |(i, j), x| {
            for (n, x) in x.iter_mut().enumerate() {
                *x = value(i.rem_euclid(8), j.rem_euclid(8), n);
            }
        });
        let mut reference = Patch::zeros(7, fab.clone());
        let bcr = set_bc(&fab, s.geom_f.domain(), &s.bcs);
        Interpolater::CellConservativeLinear.interp(&crse, &mut reference, &fab, 2, s.geom_c.domain(), &bcr);

        assert_eq!(uf.patch(0).data(), reference.data());
    }

    #[test]
    fn interpolation_at_an_outflow_corner_extrapolates_the_coarse_data() {
        let vars = Variables::new(2);
        let physics = ReactiveAdvection::new(vars, (1.0, 1.0), None);
        let outflow = DomainBc { lo: [PhysBc::Outflow; 2], hi: [PhysBc::Outflow; 2] };
        let bcs = component_bcs(&outflow, &vars);
        let geom_c = Geometry::new(range2d(0..8, 0..8), (0.0, 0.0), (1.0, 1.0), [false, false]);
        let geom_f = geom_c.refine(2);
        let (fine, coarse) = (
            LevelView { geom: &geom_f, bcs: &bcs, physics: &physics },
            LevelView { geom: &geom_c, bcs: &bcs, physics: &physics });

        // Ghost cells of the coarse field hold values that the boundary
        // conditions must not see.
        let value = |i: i64, j: i64, n: usize| (0.7 * i as f64 + 0.3 * j as f64 + n as f64).sin();
        let ug = field(vec![range2d(0..8, 0..8)], 1, value);
        let mut uf = MultiFab::new(BoxArray::new(vec![range2d(0..8, 0..8)]), 7, 2);

        interpolate(&fine, &coarse, 2, Interpolater::CellConservativeLinear, &mut uf, &ug, 0.0, TransferKind::Solution);

        let fab = uf.fab_box(0).clone();
        let crse_space = Interpolater::CellConservativeLinear.coarse_box(&fab, 2);
        let crse = Patch::from_slice_function(7, crse_space, |(i, j), x| {
            for (n, x) in x.iter_mut().enumerate() {
                *x = value(i.clamp(0, 7), j.clamp(0, 7), n);
            }
        });
        let mut reference = Patch::zeros(7, fab.clone());
        let bcr = set_bc(&fab, geom_f.domain(), &bcs);
        Interpolater::CellConservativeLinear.interp(&crse, &mut reference, &fab, 2, geom_c.domain(), &bcr);

        let p = uf.patch(0);

        for index in range2d(0..10, 0..10).iter() {
            assert_eq!(p.get_slice(index), reference.get_slice(index));
        }
        assert_eq!(p.get_slice((-1, 3)), p.get_slice((0, 3)));
        assert_eq!(p.get_slice((-2, -2)), p.get_slice((0, 0)));
        assert!(!uf.contains_non_finite(2));
    }

    #[test]
    fn restriction_of_a_solution_refreshes_ghost_cells() {
        let s = setup(8);
        let coarse = LevelView { geom: &s.geom_c, bcs: &s.bcs, physics: &s.physics };
        let uf = field(vec![range2d(0..4, 0..16)], 0, |_, _, _| 2.0);
        let mut ug = field(vec![range2d(0..8, 0..8)], 1, |_, _, _| 1.0);

        restrict(&coarse, 2, &uf, &mut ug, 0.0, TransferKind::Solution);
        assert_eq!(ug.patch(0).get((1, 3), 0), 2.0);
        assert_eq!(ug.patch(0).get((2, 3), 0), 1.0);
        assert_eq!(ug.patch(0).get((8, 3), 0), 2.0);
    }
}
