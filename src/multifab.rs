use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::box_array::BoxArray;
use crate::geometry::Geometry;
use crate::index_space::IndexSpace;
use crate::meshing::{self, PatchQuery};
use crate::patch::Patch;




/**
 * A multi-component field defined over all the boxes of a level. Each box
 * owns one patch, which covers the box grown by `n_grow` ghost cells. Work
 * on separate boxes is done in parallel; each method returns only after all
 * of its per-box work is complete.
 */
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MultiFab {
    boxes: BoxArray,
    num_fields: usize,
    n_grow: i64,
    patches: Vec<Patch>,
}




// ============================================================================
impl MultiFab {


    /**
     * Allocate a zero-valued field on the given boxes.
     */
    pub fn new(boxes: BoxArray, num_fields: usize, n_grow: i64) -> Self {
        let patches = boxes
            .iter()
            .map(|b| Patch::zeros(num_fields, b.extend_all(n_grow)))
            .collect();
        Self { boxes, num_fields, n_grow, patches }
    }


    pub fn boxes(&self) -> &BoxArray {
        &self.boxes
    }


    pub fn num_fields(&self) -> usize {
        self.num_fields
    }


    pub fn n_grow(&self) -> i64 {
        self.n_grow
    }


    pub fn len(&self) -> usize {
        self.patches.len()
    }


    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }


    pub fn valid_box(&self, n: usize) -> &IndexSpace {
        self.boxes.get(n)
    }


    pub fn fab_box(&self, n: usize) -> &IndexSpace {
        self.patches[n].index_space()
    }


    pub fn patch(&self, n: usize) -> &Patch {
        &self.patches[n]
    }


    pub fn patch_mut(&mut self, n: usize) -> &mut Patch {
        &mut self.patches[n]
    }


    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }


    pub fn patches_mut(&mut self) -> &mut [Patch] {
        &mut self.patches
    }


    /**
     * Iterate in parallel over the patches, mutably, along with their valid
     * boxes and positions.
     */
    pub fn par_iter_mut(&mut self) -> impl IndexedParallelIterator<Item = (usize, &IndexSpace, &mut Patch)> {
        let boxes = &self.boxes;
        self.patches
            .par_iter_mut()
            .enumerate()
            .map(move |(n, p)| (n, boxes.get(n), p))
    }


    fn assert_same_layout(&self, other: &Self) {
        assert!(
            self.boxes == other.boxes && self.num_fields == other.num_fields,
            "field layouts differ");
    }


    pub fn set_val(&mut self, value: f64) {
        self.patches.par_iter_mut().for_each(|p| p.set_val(value))
    }


    pub fn set_nan(&mut self) {
        self.set_val(f64::NAN)
    }


    /**
     * Copy another field with the same layout, on the valid region grown by
     * `n_grow` cells.
     */
    pub fn copy_from(&mut self, src: &Self, n_grow: i64) {
        self.assert_same_layout(src);
        let boxes = &self.boxes;

        self.patches.par_iter_mut().zip(&src.patches).enumerate().for_each(|(n, (a, b))| {
            a.copy_from(b, &boxes.get(n).extend_all(n_grow))
        })
    }


    /**
     * Copy the valid data of another field, which may be defined on different
     * boxes, into the valid region of this one, wherever they overlap.
     */
    pub fn copy_valid_from(&mut self, src: &Self) {
        let boxes = &self.boxes;

        self.patches.par_iter_mut().enumerate().for_each(|(n, a)| {
            for (m, overlap) in src.boxes.intersections(boxes.get(n)) {
                a.copy_from(&src.patches[m], &overlap)
            }
        })
    }


    /**
     * Copy the valid data of another field into this one, anywhere in this
     * field's patches (ghost cells included), using the periodic images of
     * the source boxes.
     */
    pub fn copy_valid_periodic(&mut self, src: &Self, geom: &Geometry) {
        let shifts = geom.periodic_shifts();

        self.patches.par_iter_mut().for_each(|a| {
            let fab = a.index_space().clone();

            for &shift in &shifts {
                for (m, b) in src.boxes.iter().enumerate() {
                    if let Some(overlap) = fab.intersect(&b.shift(shift)) {
                        a.copy_shifted(&src.patches[m], &overlap.shift((-shift.0, -shift.1)), shift)
                    }
                }
            }
        })
    }


    /**
     * Copy every patch of another field, ghost cells included, into the
     * patches of this one wherever they overlap.
     */
    pub fn copy_fab_from(&mut self, src: &Self) {
        self.patches.par_iter_mut().for_each(|a| {
            for b in &src.patches {
                if let Some(overlap) = a.index_space().intersect(b.index_space()) {
                    a.copy_from(b, &overlap)
                }
            }
        })
    }


    /**
     * Replace `self` with `self + a * x` on the valid region grown by
     * `n_grow` cells.
     */
    pub fn saxpy(&mut self, a: f64, x: &Self, n_grow: i64) {
        self.assert_same_layout(x);
        let boxes = &self.boxes;

        self.patches.par_iter_mut().zip(&x.patches).enumerate().for_each(|(n, (u, v))| {
            u.saxpy(a, v, &boxes.get(n).extend_all(n_grow))
        })
    }


    /**
     * Replace `self` with `a * x + b * y` on the valid region grown by
     * `n_grow` cells.
     */
    pub fn lincomb(&mut self, a: f64, x: &Self, b: f64, y: &Self, n_grow: i64) {
        self.assert_same_layout(x);
        self.assert_same_layout(y);
        let boxes = &self.boxes;

        self.patches.par_iter_mut().enumerate().for_each(|(n, u)| {
            u.lincomb(a, &x.patches[n], b, &y.patches[n], &boxes.get(n).extend_all(n_grow))
        })
    }


    /**
     * Return the lowest-numbered component having a non-finite value in the
     * valid region grown by `n_grow` cells.
     */
    pub fn first_non_finite(&self, n_grow: i64) -> Option<usize> {
        self.patches
            .par_iter()
            .enumerate()
            .filter_map(|(n, p)| p.first_non_finite(&self.boxes.get(n).extend_all(n_grow)))
            .min()
    }


    pub fn contains_non_finite(&self, n_grow: i64) -> bool {
        self.first_non_finite(n_grow).is_some()
    }


    /// Maximum absolute value over all components and valid cells.
    pub fn norm0(&self) -> f64 {
        self.patches
            .par_iter()
            .enumerate()
            .map(|(n, p)| p.max_abs(self.boxes.get(n)))
            .reduce(|| 0.0, f64::max)
    }


    /// Square root of the sum of squares over all components and valid
    /// cells.
    pub fn norm2(&self) -> f64 {
        self.patches
            .par_iter()
            .enumerate()
            .map(|(n, p)| p.sum_sq(self.boxes.get(n)))
            .sum::<f64>()
            .sqrt()
    }


    /// Sum of one component over the valid cells.
    pub fn sum(&self, field: usize) -> f64 {
        self.patches
            .iter()
            .enumerate()
            .map(|(n, p)| p.sum(field, self.boxes.get(n)))
            .sum()
    }


    /**
     * Fill the ghost cells which lie in the valid region of some box of this
     * field, wrapping through periodic boundaries if a geometry is given.
     * Ghost cells with no such source are not touched.
     */
    pub fn fill_boundary(&mut self, geom: Option<&Geometry>) {
        let image = |index: (i64, i64)| geom.map_or(index, |g| g.periodic_image(index));

        let guards: Vec<_> = {
            let this = &*self;
            (0..this.len())
                .into_par_iter()
                .map(|n| meshing::guard_zone_values(this.fab_box(n), this.valid_box(n), this, image))
                .collect()
        };
        self.patches
            .par_iter_mut()
            .zip(guards)
            .for_each(|(p, g)| meshing::extend_patch_mut(p, &g));
    }
}




// ============================================================================
impl PatchQuery for MultiFab {
    fn patch_containing_point(&self, point: (i64, i64)) -> Option<&Patch> {
        self.boxes.find(point).map(|n| &self.patches[n])
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::MultiFab;
    use crate::box_array::BoxArray;
    use crate::geometry::Geometry;
    use crate::index_space::range2d;

    fn two_box_field() -> MultiFab {
        let boxes = BoxArray::new(vec![range2d(0..4, 0..8), range2d(4..8, 0..8)]);
        let mut mf = MultiFab::new(boxes, 1, 2);
        mf.set_nan();

        for n in 0..2 {
            let valid = mf.valid_box(n).clone();
            for (index, s) in valid.iter().zip(mf.patch_mut(n).select_mut(&valid)) {
                s[0] = (index.0 * 8 + index.1) as f64;
            }
        }
        mf
    }

    #[test]
    fn fill_boundary_exchanges_between_boxes() {
        let mut mf = two_box_field();
        mf.fill_boundary(None);
        assert_eq!(mf.patch(0).get((5, 3), 0), 43.0);
        assert_eq!(mf.patch(1).get((2, 7), 0), 23.0);
        assert!(mf.patch(0).get((-1, 3), 0).is_nan());
    }

    #[test]
    fn fill_boundary_wraps_periodic_images() {
        let geom = Geometry::new(range2d(0..8, 0..8), (0.0, 0.0), (1.0, 1.0), [true, true]);
        let mut mf = two_box_field();
        mf.fill_boundary(Some(&geom));
        assert_eq!(mf.patch(0).get((-1, 3), 0), 59.0);
        assert_eq!(mf.patch(0).get((-1, -1), 0), 63.0);
        assert_eq!(mf.patch(1).get((8, 9), 0), 1.0);
        assert!(!mf.contains_non_finite(2));
    }

    #[test]
    fn copy_valid_between_layouts_works() {
        let src = two_box_field();
        let mut dst = MultiFab::new(BoxArray::new(vec![range2d(2..6, 2..6)]), 1, 1);
        dst.copy_valid_from(&src);
        assert_eq!(dst.patch(0).get((3, 3), 0), 27.0);
        assert_eq!(dst.patch(0).get((5, 5), 0), 45.0);
        assert_eq!(dst.patch(0).get((1, 1), 0), 0.0);
    }

    #[test]
    fn norms_and_sums_use_valid_cells_only() {
        let mut mf = MultiFab::new(BoxArray::new(vec![range2d(0..2, 0..2)]), 2, 1);
        mf.set_val(-3.0);
        let valid = mf.valid_box(0).clone();
        for s in mf.patch_mut(0).select_mut(&valid) {
            s[0] = 1.0;
            s[1] = -2.0;
        }
        assert_eq!(mf.norm0(), 2.0);
        assert_eq!(mf.norm2(), 20.0f64.sqrt());
        assert_eq!(mf.sum(1), -8.0);
    }
}
