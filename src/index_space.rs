use core::ops::Range;
use serde::{Deserialize, Serialize};




/**
 * Identifier for a Cartesian axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    I,
    J,
}




// ============================================================================
impl Axis {

    pub const BOTH: [Axis; 2] = [Axis::I, Axis::J];

    pub fn index(self) -> usize {
        match self {
            Axis::I => 0,
            Axis::J => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Axis::I => Axis::J,
            Axis::J => Axis::I,
        }
    }
}




/**
 * Represents a rectangular region in a discrete index space. Cell-centered
 * quantities on a box, and the face-centered quantities surrounding it, are
 * both described by an `IndexSpace`; a face space along an axis has one more
 * index on that axis than the cell space it bounds (see
 * [`IndexSpace::extend_upper`]).
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
}




// ============================================================================
impl IndexSpace {


    pub fn new(di: Range<i64>, dj: Range<i64>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end,
            "index space has negative volume");

        Self { di, dj }
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> (usize, usize) {
        ((self.di.end - self.di.start) as usize,
         (self.dj.end - self.dj.start) as usize)
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let (l, m) = self.dim();
        l * m
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> (i64, i64) {
        (self.di.start, self.dj.start)
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn end(&self) -> (i64, i64) {
        (self.di.end, self.dj.end)
    }


    /**
     * Return the range covered along the given axis.
     */
    pub fn range(&self, axis: Axis) -> &Range<i64> {
        match axis {
            Axis::I => &self.di,
            Axis::J => &self.dj,
        }
    }


    /**
     * Return a copy of this index space with the range on one axis replaced.
     */
    pub fn with_range(&self, axis: Axis, range: Range<i64>) -> Self {
        match axis {
            Axis::I => Self::new(range, self.dj.clone()),
            Axis::J => Self::new(self.di.clone(), range),
        }
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: (i64, i64)) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1)
    }


    /**
     * Determine whether another index space is a subset of this one.
     */
    pub fn contains_space(&self, other: &Self) -> bool {
        other.is_empty() || (
        other.di.start >= self.di.start && other.di.end <= self.di.end &&
        other.dj.start >= self.dj.start && other.dj.end <= self.dj.end)
    }


    /**
     * Return the overlap of two index spaces, or `None` if they are disjoint.
     */
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let i0 = self.di.start.max(other.di.start);
        let i1 = self.di.end.min(other.di.end);
        let j0 = self.dj.start.max(other.dj.start);
        let j1 = self.dj.end.min(other.dj.end);

        if i0 < i1 && j0 < j1 {
            Some(Self::new(i0..i1, j0..j1))
        } else {
            None
        }
    }


    /**
     * Expand this index space by the given number of elements on each axis.
     */
    pub fn extend_all(&self, delta: i64) -> Self {
        Self::new(
            self.di.start - delta .. self.di.end + delta,
            self.dj.start - delta .. self.dj.end + delta)
    }


    /**
     * Extend just the upper end of this index space on the given axis. With
     * `delta = 1` this is the space of faces bounding the cells.
     */
    pub fn extend_upper(&self, delta: i64, axis: Axis) -> Self {
        match axis {
            Axis::I => Self::new(self.di.start .. self.di.end + delta, self.dj.clone()),
            Axis::J => Self::new(self.di.clone(), self.dj.start .. self.dj.end + delta),
        }
    }


    /**
     * Shift this index space by the given amount on one axis.
     */
    pub fn translate(&self, delta: i64, axis: Axis) -> Self {
        match axis {
            Axis::I => Self::new(self.di.start + delta .. self.di.end + delta, self.dj.clone()),
            Axis::J => Self::new(self.di.clone(), self.dj.start + delta .. self.dj.end + delta),
        }
    }


    /**
     * Shift this index space by the given amount on both axes.
     */
    pub fn shift(&self, delta: (i64, i64)) -> Self {
        self.translate(delta.0, Axis::I).translate(delta.1, Axis::J)
    }


    /**
     * Increase the size of this index space by the given factor.
     */
    pub fn refine_by(&self, factor: i64) -> Self {
        Self::new(
            self.di.start * factor .. self.di.end * factor,
            self.dj.start * factor .. self.dj.end * factor)
    }


    /**
     * Return the smallest index space which, when refined by the given
     * factor, covers this one. Division rounds toward negative infinity, so
     * this is correct for indexes below zero (ghost zones at a domain edge).
     */
    pub fn coarsen_by(&self, factor: i64) -> Self {
        assert!(factor > 0, "coarsening factor must be positive");

        if self.is_empty() {
            let (i0, j0) = (self.di.start.div_euclid(factor), self.dj.start.div_euclid(factor));
            return Self::new(i0..i0, j0..j0)
        }
        Self::new(
            self.di.start.div_euclid(factor) .. (self.di.end - 1).div_euclid(factor) + 1,
            self.dj.start.div_euclid(factor) .. (self.dj.end - 1).div_euclid(factor) + 1)
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: (i64, i64)) -> usize {
        let i = (index.0 - self.di.start) as usize;
        let j = (index.1 - self.dj.start) as usize;
        let m = (self.dj.end - self.dj.start) as usize;
        i * m + j
    }


    /**
     * Return a memory region object corresponding to the selection of this
     * index space in the buffer allocated for another one.
     */
    pub fn memory_region_in(&self, parent: &Self) -> MemoryRegion {
        assert!(
            parent.contains_space(self),
            "selection {:?} is not contained in {:?}", self, parent);

        let start = (
            (self.di.start - parent.di.start) as usize,
            (self.dj.start - parent.dj.start) as usize);
        let count = self.dim();
        let shape = parent.dim();
        MemoryRegion { start, count, shape }
    }


    /**
     * Return an iterator which traverses the index space in row-major order
     * (C-like; the final index increases fastest).
     */
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.di.clone().flat_map(move |i| self.dj.clone().map(move |j| (i, j)))
    }
}




/**
 * Less imposing factory function to construct an IndexSpace object.
 */
pub fn range2d(di: Range<i64>, dj: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj)
}




/**
 * A 2D memory region within a contiguous buffer.
 */
pub struct MemoryRegion {
    start: (usize, usize),
    count: (usize, usize),
    shape: (usize, usize),
}




// ============================================================================
impl MemoryRegion {

    pub fn iter_slice<'a>(&self, slice: &'a [f64], chunk: usize) -> impl Iterator<Item = &'a [f64]> + 'a {
        let (start, count, shape) = (self.start, self.count, self.shape);
        let r = chunk;
        let q = shape.1 * r;

        assert!(slice.len() == shape.0 * shape.1 * chunk);

        slice[start.0 * q .. (start.0 + count.0) * q]
        .chunks_exact(q.max(1)).flat_map(move |j| j[start.1 * r .. (start.1 + count.1) * r]
        .chunks_exact(r))
    }

    pub fn iter_slice_mut<'a>(&self, slice: &'a mut [f64], chunk: usize) -> impl Iterator<Item = &'a mut [f64]> + 'a {
        let (start, count, shape) = (self.start, self.count, self.shape);
        let r = chunk;
        let q = shape.1 * r;

        assert!(slice.len() == shape.0 * shape.1 * chunk);

        slice[start.0 * q .. (start.0 + count.0) * q]
        .chunks_exact_mut(q.max(1)).flat_map(move |j| j[start.1 * r .. (start.1 + count.1) * r]
        .chunks_exact_mut(r))
    }
}
