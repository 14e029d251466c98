use crate::bc::{BcRec, BcType};
use crate::index_space::{Axis, IndexSpace};
use crate::patch::Patch;




/**
 * Spatial interpolation from a coarse patch onto a region of a fine patch.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolater {
    /// Linear reconstruction with monotonized-central limited slopes. The
    /// fine children of a coarse cell average to the coarse value.
    CellConservativeLinear,
    /// Each fine cell takes the value of its coarse parent.
    PiecewiseConstant,
}




// ============================================================================
impl Interpolater {

    /**
     * Return the region of coarse data needed to interpolate onto the given
     * fine region.
     */
    pub fn coarse_box(&self, fine: &IndexSpace, ratio: i64) -> IndexSpace {
        match self {
            Interpolater::CellConservativeLinear => fine.coarsen_by(ratio).extend_all(1),
            Interpolater::PiecewiseConstant => fine.coarsen_by(ratio),
        }
    }

    /**
     * Interpolate the coarse patch onto `region` of the fine patch. `bcr`
     * holds one boundary record per component for the fine patch; slopes are
     * taken one-sided in coarse cells adjacent to a domain side with
     * Dirichlet-like data.
     */
    pub fn interp(&self, crse: &Patch, fine: &mut Patch, region: &IndexSpace, ratio: i64, crse_domain: &IndexSpace, bcr: &[BcRec]) {
        assert!(
            crse.index_space().contains_space(&self.coarse_box(region, ratio)),
            "coarse patch does not cover the interpolation stencil");

        let num_fields = fine.num_fields();
        let offset = |f: i64, c: i64| ((f - c * ratio) as f64 + 0.5) / ratio as f64 - 0.5;

        for ((i, j), s) in region.iter().zip(fine.select_mut(region)) {
            let c = (i.div_euclid(ratio), j.div_euclid(ratio));
            let u0 = crse.get_slice(c);

            match self {
                Interpolater::PiecewiseConstant => s.copy_from_slice(u0),
                Interpolater::CellConservativeLinear => {
                    let (xoff, yoff) = (offset(i, c.0), offset(j, c.1));

                    for n in 0..num_fields {
                        let sx = slope(crse, c, n, Axis::I, crse_domain, &bcr[n]);
                        let sy = slope(crse, c, n, Axis::J, crse_domain, &bcr[n]);
                        s[n] = u0[n] + xoff * sx + yoff * sy;
                    }
                }
            }
        }
    }
}




fn neighbor(index: (i64, i64), axis: Axis, delta: i64) -> (i64, i64) {
    match axis {
        Axis::I => (index.0 + delta, index.1),
        Axis::J => (index.0, index.1 + delta),
    }
}

fn one_sided(bc: BcType) -> bool {
    matches!(bc, BcType::ExtDir | BcType::HoExtrap)
}

fn slope(crse: &Patch, c: (i64, i64), n: usize, axis: Axis, crse_domain: &IndexSpace, bc: &BcRec) -> f64 {
    let (l, r) = (neighbor(c, axis, -1), neighbor(c, axis, 1));
    let u0 = crse.get(c, n);
    let d = crse_domain.range(axis);
    let k = if axis == Axis::I { c.0 } else { c.1 };

    if k == d.start && one_sided(bc.lo[axis.index()]) {
        return crse.get(r, n) - u0
    }
    if k == d.end - 1 && one_sided(bc.hi[axis.index()]) {
        return u0 - crse.get(l, n)
    }
    let (ul, ur) = (crse.get(l, n), crse.get(r, n));
    let dc = 0.5 * (ur - ul);
    let dl = u0 - ul;
    let dr = ur - u0;

    if dl * dr > 0.0 {
        dc.signum() * dc.abs().min(2.0 * dl.abs()).min(2.0 * dr.abs())
    } else {
        0.0
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::Interpolater;
    use crate::bc::BcRec;
    use crate::index_space::range2d;
    use crate::patch::Patch;

    #[test]
    fn linear_interpolation_reproduces_linear_data() {
        let crse = Patch::from_slice_function(1, range2d(0..8, 0..8), |(i, j), s| s[0] = (i + 2 * j) as f64);
        let region = range2d(4..8, 4..8);
        let mut fine = Patch::zeros(1, region.clone());
        Interpolater::CellConservativeLinear.interp(&crse, &mut fine, &region, 2, &range2d(0..8, 0..8), &[BcRec::interior()]);

        assert_eq!(fine.get((4, 4), 0), 6.0 - 0.75);
        assert_eq!(fine.get((5, 5), 0), 6.0 + 0.75);
        assert_eq!(fine.sum(0, &range2d(4..6, 4..6)), 4.0 * 6.0);
    }

    #[test]
    fn slopes_are_limited_at_extrema() {
        let crse = Patch::from_slice_function(1, range2d(0..3, 0..3), |(i, j), s| s[0] = if (i, j) == (1, 1) { 1.0 } else { 0.0 });
        let region = range2d(2..4, 2..4);
        let mut fine = Patch::zeros(1, region.clone());
        Interpolater::CellConservativeLinear.interp(&crse, &mut fine, &region, 2, &range2d(0..3, 0..3), &[BcRec::interior()]);

        for s in fine.select(&region) {
            assert_eq!(s[0], 1.0);
        }
    }
}
