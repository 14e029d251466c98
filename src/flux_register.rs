use rayon::prelude::*;
use crate::box_array::BoxArray;
use crate::geometry::Geometry;
use crate::index_space::{Axis, IndexSpace};
use crate::multifab::MultiFab;
use crate::patch::Patch;




const SIDES: [(Axis, bool); 4] = [
    (Axis::I, true),
    (Axis::I, false),
    (Axis::J, true),
    (Axis::J, false),
];

fn compose(axis: Axis, a: i64, t: i64) -> (i64, i64) {
    match axis {
        Axis::I => (a, t),
        Axis::J => (t, a),
    }
}




/**
 * Accumulates the mismatch between coarse and fine fluxes through the
 * coarse/fine interface of two adjacent levels, so that the coarse level can
 * be corrected after its fine level has caught up in time.
 *
 * There is one register patch for each side of each fine box, covering the
 * coarse cells just outside the coarsened box. The value stored for a
 * register cell is the time- and area-integrated flux through the face it
 * shares with the fine box: coarse contributions enter with a negative
 * scale, fine contributions with a positive one.
 */
pub struct FluxRegister {
    ratio: i64,
    fine_boxes: BoxArray,
    registers: Vec<[Patch; 4]>,
}




// ============================================================================
impl FluxRegister {


    pub fn new(fine_boxes: &BoxArray, ratio: i64, num_fields: usize) -> Self {
        let registers = fine_boxes
            .iter()
            .map(|b| {
                let cb = b.coarsen_by(ratio);
                let side = |(axis, is_lo): (Axis, bool)| Patch::zeros(num_fields, Self::register_space(&cb, axis, is_lo));
                [side(SIDES[0]), side(SIDES[1]), side(SIDES[2]), side(SIDES[3])]
            })
            .collect();

        Self {
            ratio,
            fine_boxes: fine_boxes.clone(),
            registers,
        }
    }


    fn register_space(cb: &IndexSpace, axis: Axis, is_lo: bool) -> IndexSpace {
        let r = cb.range(axis);
        let cells = if is_lo { r.start - 1..r.start } else { r.end..r.end + 1 };
        cb.with_range(axis, cells)
    }


    pub fn fine_boxes(&self) -> &BoxArray {
        &self.fine_boxes
    }


    pub fn set_val(&mut self, value: f64) {
        self.registers.par_iter_mut().for_each(|r| r.iter_mut().for_each(|p| p.set_val(value)))
    }


    /**
     * Overwrite every register with `scale * area * F` from the coarse face
     * fluxes. Each register gathers its own values, so registers are
     * filled independently.
     */
    pub fn crse_init(&mut self, coarse_boxes: &BoxArray, coarse_fluxes: &[[Patch; 2]], geom: &Geometry, scale: f64) {
        assert_eq!(coarse_boxes.len(), coarse_fluxes.len());

        self.registers.par_iter_mut().for_each(|sides| {
            for (reg, &(axis, is_lo)) in sides.iter_mut().zip(&SIDES) {
                let area = geom.face_area(axis);
                let space = reg.index_space().clone();

                for cell in space.iter() {
                    let face = if is_lo { step(cell, axis, 1) } else { cell };
                    let source = coarse_boxes
                        .iter()
                        .position(|b| b.extend_upper(1, axis).contains(face));

                    if let Some(m) = source {
                        let flux = coarse_fluxes[m][axis.index()].get_slice(face);
                        for (r, f) in reg.get_slice_mut(cell).iter_mut().zip(flux) {
                            *r = scale * area * f;
                        }
                    }
                }
            }
        })
    }


    /**
     * Add `scale * area * F` from the fine face fluxes of box `n` onto the
     * coarse faces they are part of.
     */
    pub fn fine_add(&mut self, n: usize, fluxes: &[Patch; 2], geom: &Geometry, scale: f64) {
        let fb = self.fine_boxes.get(n).clone();
        let ratio = self.ratio;

        for (reg, &(axis, is_lo)) in self.registers[n].iter_mut().zip(&SIDES) {
            let area = geom.face_area(axis);
            let r = fb.range(axis);
            let face_coord = if is_lo { r.start } else { r.end };
            let coarse_coord = if is_lo { face_coord.div_euclid(ratio) - 1 } else { face_coord.div_euclid(ratio) };

            for t in fb.range(axis.other()).clone() {
                let flux = fluxes[axis.index()].get_slice(compose(axis, face_coord, t));
                let cell = compose(axis, coarse_coord, t.div_euclid(ratio));

                for (r, f) in reg.get_slice_mut(cell).iter_mut().zip(flux) {
                    *r += scale * area * f;
                }
            }
        }
    }


    /**
     * Apply the accumulated flux mismatch to the coarse cells outside the fine
     * boxes. Register cells are mapped through the periodic boundaries; cells
     * outside the domain, and cells covered by the fine level, are skipped.
     * Contributions to the same cell are summed in a fixed order.
     */
    pub fn reflux(&self, u: &mut MultiFab, geom: &Geometry) {
        let covered = self.fine_boxes.coarsen(self.ratio);
        let volume = geom.cell_volume();
        let mut updates = Vec::new();

        for sides in &self.registers {
            for (reg, &(_, is_lo)) in sides.iter().zip(&SIDES) {
                let sign = if is_lo { -1.0 } else { 1.0 };

                for cell in reg.index_space().iter() {
                    let image = geom.periodic_image(cell);

                    if !geom.domain().contains(image) || covered.contains_index(image) {
                        continue
                    }
                    if let Some(m) = u.boxes().find(image) {
                        updates.push((m, image, sign / volume, reg.get_slice(cell)));
                    }
                }
            }
        }
        for (m, image, factor, values) in updates {
            for (x, r) in u.patch_mut(m).get_slice_mut(image).iter_mut().zip(values) {
                *x += factor * r;
            }
        }
    }
}




fn step(index: (i64, i64), axis: Axis, delta: i64) -> (i64, i64) {
    match axis {
        Axis::I => (index.0 + delta, index.1),
        Axis::J => (index.0, index.1 + delta),
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::FluxRegister;
    use crate::box_array::BoxArray;
    use crate::geometry::Geometry;
    use crate::index_space::{range2d, Axis};
    use crate::multifab::MultiFab;
    use crate::patch::Patch;

    fn face_fluxes(cells: &crate::index_space::IndexSpace, fi: f64, fj: f64) -> [Patch; 2] {
        [
            Patch::from_slice_function(1, cells.extend_upper(1, Axis::I), |_, s| s[0] = fi),
            Patch::from_slice_function(1, cells.extend_upper(1, Axis::J), |_, s| s[0] = fj),
        ]
    }

    #[test]
    fn reflux_sign_convention_works() {
        let geom_c = Geometry::new(range2d(0..8, 0..8), (0.0, 0.0), (1.0, 1.0), [true, true]);
        let geom_f = geom_c.refine(2);
        let coarse = BoxArray::new(vec![range2d(0..8, 0..8)]);
        let fine = BoxArray::new(vec![range2d(4..8, 0..16)]);
        let dt = 0.1;

        let mut reg = FluxRegister::new(&fine, 2, 1);
        reg.set_val(0.0);
        reg.crse_init(&coarse, &[face_fluxes(coarse.get(0), 1.0, 0.0)], &geom_c, -dt);

        for _ in 0..2 {
            reg.fine_add(0, &face_fluxes(fine.get(0), 2.0, 0.0), &geom_f, 0.5 * dt);
        }
        let mut u = MultiFab::new(coarse, 1, 0);
        reg.reflux(&mut u, &geom_c);

        for j in 0..8 {
            assert!((u.patch(0).get((1, j), 0) + 0.8).abs() < 1e-12);
            assert!((u.patch(0).get((4, j), 0) - 0.8).abs() < 1e-12);
            assert_eq!(u.patch(0).get((2, j), 0), 0.0);
            assert_eq!(u.patch(0).get((0, j), 0), 0.0);
        }
    }
}
