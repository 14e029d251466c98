use serde::{Deserialize, Serialize};
use crate::index_space::{Axis, IndexSpace};




/**
 * Maps a level's index space to physical coordinates: the problem domain in
 * cell indexes, its physical extent, and which axes are periodic.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    domain: IndexSpace,
    prob_lo: (f64, f64),
    prob_hi: (f64, f64),
    is_periodic: [bool; 2],
}




// ============================================================================
impl Geometry {

    pub fn new(domain: IndexSpace, prob_lo: (f64, f64), prob_hi: (f64, f64), is_periodic: [bool; 2]) -> Self {
        assert!(!domain.is_empty(), "the problem domain is empty");
        assert!(prob_hi.0 > prob_lo.0 && prob_hi.1 > prob_lo.1, "the physical extent is empty");
        Self { domain, prob_lo, prob_hi, is_periodic }
    }

    pub fn domain(&self) -> &IndexSpace {
        &self.domain
    }

    pub fn cell_size(&self) -> (f64, f64) {
        let (ni, nj) = self.domain.dim();
        ((self.prob_hi.0 - self.prob_lo.0) / ni as f64,
         (self.prob_hi.1 - self.prob_lo.1) / nj as f64)
    }

    pub fn cell_volume(&self) -> f64 {
        let (dx, dy) = self.cell_size();
        dx * dy
    }

    /// Area of a face normal to the given axis.
    pub fn face_area(&self, axis: Axis) -> f64 {
        let (dx, dy) = self.cell_size();
        match axis {
            Axis::I => dy,
            Axis::J => dx,
        }
    }

    pub fn cell_center(&self, index: (i64, i64)) -> (f64, f64) {
        let (dx, dy) = self.cell_size();
        let (i0, j0) = self.domain.start();
        (self.prob_lo.0 + (index.0 - i0) as f64 * dx + 0.5 * dx,
         self.prob_lo.1 + (index.1 - j0) as f64 * dy + 0.5 * dy)
    }

    pub fn is_periodic(&self, axis: Axis) -> bool {
        self.is_periodic[axis.index()]
    }

    pub fn period(&self, axis: Axis) -> i64 {
        let r = self.domain.range(axis);
        r.end - r.start
    }

    /**
     * Map an index to its image inside the domain along periodic axes.
     * Indexes along non-periodic axes are returned unchanged, so the result
     * may still lie outside the domain.
     */
    pub fn periodic_image(&self, index: (i64, i64)) -> (i64, i64) {
        let wrap = |x: i64, axis: Axis| {
            if self.is_periodic(axis) {
                let r = self.domain.range(axis);
                r.start + (x - r.start).rem_euclid(r.end - r.start)
            } else {
                x
            }
        };
        (wrap(index.0, Axis::I), wrap(index.1, Axis::J))
    }

    /**
     * Return the periodic translations of the domain, including the zero
     * shift, which could bring data within one domain length of the space
     * into it.
     */
    pub fn periodic_shifts(&self) -> Vec<(i64, i64)> {
        let shifts = |axis: Axis| -> Vec<i64> {
            if self.is_periodic(axis) {
                let p = self.period(axis);
                vec![0, -p, p]
            } else {
                vec![0]
            }
        };
        let mut result = Vec::new();

        for si in shifts(Axis::I) {
            for sj in shifts(Axis::J) {
                result.push((si, sj))
            }
        }
        result
    }

    pub fn refine(&self, ratio: i64) -> Self {
        Self { domain: self.domain.refine_by(ratio), ..self.clone() }
    }

    pub fn coarsen(&self, ratio: i64) -> Self {
        Self { domain: self.domain.coarsen_by(ratio), ..self.clone() }
    }
}
