use crate::box_array::BoxArray;
use crate::multifab::MultiFab;




/// Whether a node field holds a solution, which carries ghost cells, or a
/// function value (derivative, integral, residual), which does not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncapKind {
    Solution,
    Function,
}




/**
 * Ties the node fields of one SDC level to the layout of an AMR level.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Encap {
    pub level: usize,
    pub boxes: BoxArray,
    pub num_fields: usize,
    pub n_grow: i64,
}

impl Encap {
    pub fn create(&self, kind: EncapKind) -> MultiFab {
        let n_grow = match kind {
            EncapKind::Solution => self.n_grow,
            EncapKind::Function => 0,
        };
        MultiFab::new(self.boxes.clone(), self.num_fields, n_grow)
    }
}
