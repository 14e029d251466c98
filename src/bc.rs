use serde::{Deserialize, Serialize};
use crate::geometry::Geometry;
use crate::index_space::{Axis, IndexSpace};
use crate::patch::Patch;
use crate::variables::Variables;




/**
 * Kind of physical boundary on one side of the problem domain.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysBc {
    Interior,
    Inflow,
    Outflow,
    Symmetry,
    SlipWall,
    NoSlipWall,
}




/**
 * How the ghost cells of one component are filled on one side of the domain.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BcType {
    IntDir,
    ExtDir,
    FoExtrap,
    HoExtrap,
    ReflectEven,
    ReflectOdd,
}




/**
 * Whether ghost cells receive a solution (with inhomogeneous boundary data)
 * or a correction to one (boundary data is zero).
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillMode {
    Solution,
    Correction,
}




use BcType::*;

const NORM_VEL_BC: [BcType; 6] = [IntDir, ExtDir, FoExtrap, ReflectOdd, ExtDir, ExtDir];
const TANG_VEL_BC: [BcType; 6] = [IntDir, ExtDir, FoExtrap, ReflectEven, HoExtrap, ExtDir];
const SCALAR_BC: [BcType; 6] = [IntDir, ExtDir, FoExtrap, ReflectEven, ReflectEven, ReflectEven];

fn table_index(bc: PhysBc) -> usize {
    match bc {
        PhysBc::Interior => 0,
        PhysBc::Inflow => 1,
        PhysBc::Outflow => 2,
        PhysBc::Symmetry => 3,
        PhysBc::SlipWall => 4,
        PhysBc::NoSlipWall => 5,
    }
}




/**
 * Physical boundary kinds of the domain, indexed by axis.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainBc {
    pub lo: [PhysBc; 2],
    pub hi: [PhysBc; 2],
}

impl DomainBc {
    pub fn periodic() -> Self {
        Self {
            lo: [PhysBc::Interior; 2],
            hi: [PhysBc::Interior; 2],
        }
    }
}




/**
 * The fill kinds for a single component, on the low and high sides of each
 * axis.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BcRec {
    pub lo: [BcType; 2],
    pub hi: [BcType; 2],
}

impl BcRec {
    pub fn interior() -> Self {
        Self { lo: [IntDir; 2], hi: [IntDir; 2] }
    }

    pub fn side(&self, axis: Axis, is_lo: bool) -> BcType {
        if is_lo {
            self.lo[axis.index()]
        } else {
            self.hi[axis.index()]
        }
    }
}




/**
 * Map the physical boundaries of the domain to a fill kind for every state
 * component. Momentum normal to a side uses the normal-velocity table,
 * momentum tangent to it the tangential table, and everything else is
 * treated as a scalar.
 */
pub fn component_bcs(phys: &DomainBc, vars: &Variables) -> Vec<BcRec> {
    (0..vars.num_state()).map(|n| {
        let kind = |axis: Axis, bc: PhysBc| {
            let table = if n == Variables::momentum(axis) {
                &NORM_VEL_BC
            } else if n == Variables::momentum(axis.other()) {
                &TANG_VEL_BC
            } else {
                &SCALAR_BC
            };
            table[table_index(bc)]
        };
        BcRec {
            lo: [kind(Axis::I, phys.lo[0]), kind(Axis::J, phys.lo[1])],
            hi: [kind(Axis::I, phys.hi[0]), kind(Axis::J, phys.hi[1])],
        }
    }).collect()
}




/**
 * Restrict the domain boundary conditions to the sides where the given fab
 * box reaches the domain edge; every other side is interior.
 */
pub fn set_bc(fab_box: &IndexSpace, domain: &IndexSpace, bcs: &[BcRec]) -> Vec<BcRec> {
    bcs.iter().map(|bc| {
        let mut rec = *bc;
        for axis in Axis::BOTH {
            let a = axis.index();
            if fab_box.range(axis).start > domain.range(axis).start {
                rec.lo[a] = IntDir;
            }
            if fab_box.range(axis).end < domain.range(axis).end {
                rec.hi[a] = IntDir;
            }
        }
        rec
    }).collect()
}




fn compose(axis: Axis, a: i64, t: i64) -> (i64, i64) {
    match axis {
        Axis::I => (a, t),
        Axis::J => (t, a),
    }
}




/**
 * Fill the cells of a patch lying outside the problem domain, in the
 * non-periodic directions, according to the given per-component boundary
 * conditions. Axis I is filled over the full J range of the patch first, and
 * then axis J over the full I range, so corner cells are filled too.
 */
pub fn fill_physical<F>(patch: &mut Patch, geom: &Geometry, bcs: &[BcRec], mode: FillMode, boundary_value: F)
where
    F: Fn((f64, f64), &mut [f64])
{
    assert_eq!(bcs.len(), patch.num_fields(), "one boundary record per component is needed");

    let num_fields = patch.num_fields();
    let mut external = vec![0.0; num_fields];

    for axis in Axis::BOTH {
        if geom.is_periodic(axis) {
            continue
        }
        let d = geom.domain().range(axis).clone();
        let space = patch.index_space().clone();
        let s = space.range(axis).clone();
        let other = space.range(axis.other()).clone();

        if s.start >= d.end || s.end <= d.start {
            continue
        }

        for is_lo in [true, false] {
            let (ghosts, inner, next, mirror_base) = if is_lo {
                (s.start..d.start, d.start, (d.start + 1).min(s.end - 1), 2 * d.start - 1)
            } else {
                (d.end..s.end, d.end - 1, (d.end - 2).max(s.start), 2 * d.end - 1)
            };
            let needs_external = mode == FillMode::Solution && bcs.iter().any(|bc| bc.side(axis, is_lo) == ExtDir);

            for g in ghosts {
                let depth = (g - inner).abs() as f64;
                let mirror = (mirror_base - g).clamp(s.start, s.end - 1);

                for t in other.clone() {
                    let index = compose(axis, g, t);

                    if needs_external {
                        boundary_value(geom.cell_center(index), &mut external);
                    }
                    for (n, bc) in bcs.iter().enumerate() {
                        let value = match bc.side(axis, is_lo) {
                            IntDir => continue,
                            ExtDir => match mode {
                                FillMode::Solution => external[n],
                                FillMode::Correction => 0.0,
                            },
                            FoExtrap => patch.get(compose(axis, inner, t), n),
                            HoExtrap => {
                                let u0 = patch.get(compose(axis, inner, t), n);
                                let u1 = patch.get(compose(axis, next, t), n);
                                u0 + depth * (u0 - u1)
                            }
                            ReflectEven => patch.get(compose(axis, mirror, t), n),
                            ReflectOdd => -patch.get(compose(axis, mirror, t), n),
                        };
                        patch.get_slice_mut(index)[n] = value;
                    }
                }
            }
        }
    }
}
