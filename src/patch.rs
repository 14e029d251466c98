use serde::{Deserialize, Serialize};
use crate::index_space::IndexSpace;




/**
 * A patch is a mapping from a rectangular subset of a level's index space to
 * a fixed number of field values per cell. The backing array is row-major
 * over the index space, with the field components of each cell stored
 * contiguously (fields are the fastest index). A patch may cover ghost
 * zones outside of the box whose data it owns; which part of the patch is
 * valid is a property of the container holding it, not of the patch.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patch {
    space: IndexSpace,
    num_fields: usize,
    data: Vec<f64>,
}




// ============================================================================
impl Patch {


    /**
     * Generate a zero-valued patch covering the given index space.
     */
    pub fn zeros(num_fields: usize, space: IndexSpace) -> Self {
        Self {
            data: vec![0.0; space.len() * num_fields],
            space,
            num_fields,
        }
    }


    /**
     * Generate a patch covering the given index space, with values defined
     * from a closure which writes the fields of a single cell.
     */
    pub fn from_slice_function<F>(num_fields: usize, space: IndexSpace, f: F) -> Self
    where
        F: Fn((i64, i64), &mut [f64])
    {
        let mut patch = Self::zeros(num_fields, space);

        for (index, slice) in patch.space.clone().iter().zip(patch.data.chunks_exact_mut(num_fields)) {
            f(index, slice)
        }
        patch
    }


    pub fn index_space(&self) -> &IndexSpace {
        &self.space
    }


    pub fn num_fields(&self) -> usize {
        self.num_fields
    }


    pub fn data(&self) -> &[f64] {
        &self.data
    }


    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }


    /**
     * Return the fields at a given index.
     */
    pub fn get_slice(&self, index: (i64, i64)) -> &[f64] {
        self.validate_index(index);
        let s = self.space.row_major_offset(index) * self.num_fields;
        &self.data[s .. s + self.num_fields]
    }


    /**
     * Return the fields at a given index, mutably.
     */
    pub fn get_slice_mut(&mut self, index: (i64, i64)) -> &mut [f64] {
        self.validate_index(index);
        let s = self.space.row_major_offset(index) * self.num_fields;
        &mut self.data[s .. s + self.num_fields]
    }


    /**
     * Return a single field value at the given index.
     */
    pub fn get(&self, index: (i64, i64), field: usize) -> f64 {
        self.get_slice(index)[field]
    }


    /**
     * Return an iterator over the cell slices within a sub-region of this
     * patch, in row-major order.
     */
    pub fn select<'a>(&'a self, region: &IndexSpace) -> impl Iterator<Item = &'a [f64]> + 'a {
        region.memory_region_in(&self.space).iter_slice(&self.data, self.num_fields)
    }


    /**
     * Return a mutable iterator over the cell slices within a sub-region of
     * this patch, in row-major order.
     */
    pub fn select_mut<'a>(&'a mut self, region: &IndexSpace) -> impl Iterator<Item = &'a mut [f64]> + 'a {
        region.memory_region_in(&self.space).iter_slice_mut(&mut self.data, self.num_fields)
    }


    /**
     * Copy the data from another patch on the given region, which must be
     * contained in both patches.
     */
    pub fn copy_from(&mut self, src: &Patch, region: &IndexSpace) {
        assert_eq!(self.num_fields, src.num_fields, "patches have different field counts");

        for (a, b) in self.select_mut(region).zip(src.select(region)) {
            a.copy_from_slice(b)
        }
    }


    /**
     * Copy data from another patch on the overlap of their index spaces,
     * treating the source as if it were shifted by the given offset. This is
     * how data is copied across a periodic boundary.
     */
    pub fn copy_shifted(&mut self, src: &Patch, src_region: &IndexSpace, shift: (i64, i64)) {
        let dst_region = src_region.shift(shift);

        for (a, b) in self.select_mut(&dst_region).zip(src.select(src_region)) {
            a.copy_from_slice(b)
        }
    }


    /**
     * Replace `self` with `self + a * x` on the given region.
     */
    pub fn saxpy(&mut self, a: f64, x: &Patch, region: &IndexSpace) {
        for (u, v) in self.select_mut(region).zip(x.select(region)) {
            for (u, v) in u.iter_mut().zip(v) {
                *u += a * v
            }
        }
    }


    /**
     * Replace `self` with `a * x + b * y` on the given region.
     */
    pub fn lincomb(&mut self, a: f64, x: &Patch, b: f64, y: &Patch, region: &IndexSpace) {
        for ((u, v), w) in self.select_mut(region).zip(x.select(region)).zip(y.select(region)) {
            for ((u, v), w) in u.iter_mut().zip(v).zip(w) {
                *u = a * v + b * w
            }
        }
    }


    pub fn set_val(&mut self, value: f64) {
        for x in &mut self.data {
            *x = value
        }
    }


    pub fn set_nan(&mut self) {
        self.set_val(f64::NAN)
    }


    /**
     * Return the first field having a non-finite value somewhere in the
     * given region, if any.
     */
    pub fn first_non_finite(&self, region: &IndexSpace) -> Option<usize> {
        (0..self.num_fields).find(|&n| self.select(region).any(|s| !s[n].is_finite()))
    }


    /**
     * Return the sum of one field over the given region.
     */
    pub fn sum(&self, field: usize, region: &IndexSpace) -> f64 {
        self.select(region).map(|s| s[field]).sum()
    }


    /**
     * Return the maximum absolute value of all fields over the region.
     */
    pub fn max_abs(&self, region: &IndexSpace) -> f64 {
        self.select(region).flatten().fold(0.0, |a: f64, b| a.max(b.abs()))
    }


    /**
     * Return the sum of squares of all fields over the region.
     */
    pub fn sum_sq(&self, region: &IndexSpace) -> f64 {
        self.select(region).flatten().map(|x| x * x).sum()
    }


    fn validate_index(&self, index: (i64, i64)) {
        if !self.space.contains(index) {
            let (i0, j0) = self.space.start();
            let (i1, j1) = self.space.end();
            panic!("index ({} {}) out of range on patch ({}..{} {}..{})",
                index.0,
                index.1,
                i0, i1,
                j0, j1);
        }
    }
}
