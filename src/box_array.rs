use serde::{Deserialize, Serialize};
use crate::index_space::IndexSpace;




/**
 * An ordered list of disjoint boxes making up the valid region of one AMR
 * level. The position of a box in the list is its identity: data containers
 * built on a box array hold one patch per box, in the same order.
 */
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxArray {
    boxes: Vec<IndexSpace>,
}




// ============================================================================
impl BoxArray {

    pub fn new(boxes: Vec<IndexSpace>) -> Self {
        Self { boxes }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexSpace> {
        self.boxes.iter()
    }

    pub fn get(&self, n: usize) -> &IndexSpace {
        &self.boxes[n]
    }

    /// Total number of cells in all boxes.
    pub fn num_cells(&self) -> usize {
        self.boxes.iter().map(IndexSpace::len).sum()
    }

    /// Return a box array with every box refined by the given ratio.
    pub fn refine(&self, ratio: i64) -> Self {
        self.map(|b| b.refine_by(ratio))
    }

    /// Return a box array with every box coarsened by the given ratio.
    pub fn coarsen(&self, ratio: i64) -> Self {
        self.map(|b| b.coarsen_by(ratio))
    }

    /// Apply a function to each box, keeping the ordering.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&IndexSpace) -> IndexSpace
    {
        Self::new(self.boxes.iter().map(f).collect())
    }

    /// Return the index of the box containing the given cell, if any.
    pub fn find(&self, index: (i64, i64)) -> Option<usize> {
        self.boxes.iter().position(|b| b.contains(index))
    }

    pub fn contains_index(&self, index: (i64, i64)) -> bool {
        self.find(index).is_some()
    }

    /// Determine whether every cell of the given space is in some box.
    pub fn covers(&self, space: &IndexSpace) -> bool {
        space.iter().all(|index| self.contains_index(index))
    }

    /// Iterate over the non-empty overlaps of the boxes with a given space,
    /// yielding the box index and the overlap.
    pub fn intersections<'a>(&'a self, space: &'a IndexSpace) -> impl Iterator<Item = (usize, IndexSpace)> + 'a {
        self.boxes
            .iter()
            .enumerate()
            .filter_map(move |(n, b)| b.intersect(space).map(|o| (n, o)))
    }

    /// The smallest box containing all boxes, or `None` if the array is
    /// empty.
    pub fn minimal_box(&self) -> Option<IndexSpace> {
        let first = self.boxes.first()?;
        let (mut i0, mut j0) = first.start();
        let (mut i1, mut j1) = first.end();

        for b in &self.boxes[1..] {
            i0 = i0.min(b.start().0);
            j0 = j0.min(b.start().1);
            i1 = i1.max(b.end().0);
            j1 = j1.max(b.end().1);
        }
        Some(IndexSpace::new(i0..i1, j0..j1))
    }
}

impl From<Vec<IndexSpace>> for BoxArray {
    fn from(boxes: Vec<IndexSpace>) -> Self {
        Self::new(boxes)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::BoxArray;
    use crate::index_space::range2d;

    #[test]
    fn box_lookup_works() {
        let ba = BoxArray::new(vec![range2d(0..4, 0..4), range2d(4..8, 0..4)]);
        assert_eq!(ba.find((5, 1)), Some(1));
        assert_eq!(ba.find((8, 1)), None);
        assert!(ba.covers(&range2d(2..6, 1..3)));
        assert!(!ba.covers(&range2d(2..6, 1..5)));
    }

    #[test]
    fn minimal_box_covers_everything() {
        let ba = BoxArray::new(vec![range2d(0..4, 2..4), range2d(6..8, -1..1)]);
        assert_eq!(ba.minimal_box(), Some(range2d(0..8, -1..4)));
        assert_eq!(BoxArray::default().minimal_box(), None);
    }
}
