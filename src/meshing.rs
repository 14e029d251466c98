use crate::index_space::IndexSpace;
use crate::patch::Patch;

/// A trait for a container that can respond to queries for a patch whose
/// valid region overlies a point.
///
pub trait PatchQuery {
    /// Return a patch whose valid region contains the given point, if one
    /// exists.
    ///
    fn patch_containing_point(&self, point: (i64, i64)) -> Option<&Patch>;
}

impl PatchQuery for Vec<Patch> {
    fn patch_containing_point(&self, point: (i64, i64)) -> Option<&Patch> {
        self.iter()
            .find(|p| p.index_space().contains(point))
    }
}

/// Guard zone values to be written into a patch: the index of each guard
/// cell which has a neighbor, and the neighbor's field values there.
///
pub struct GuardValues {
    indexes: Vec<(i64, i64)>,
    values: Vec<f64>,
}

/// Sample the guard zone values of a patch covering `space`, whose valid
/// region is `valid_index_space`, from the patches in a `PatchQuery` object.
/// Each guard index is first mapped through `image` (this is where periodic
/// wrapping happens); guard cells with no neighbor at their image are not
/// included. Corners are included.
///
pub fn guard_zone_values<P, G>(
    space: &IndexSpace,
    valid_index_space: &IndexSpace,
    neighbors: &P,
    image: G,
) -> GuardValues
where
    P: PatchQuery,
    G: Fn((i64, i64)) -> (i64, i64),
{
    let mut guard = GuardValues { indexes: Vec::new(), values: Vec::new() };

    for index in space.iter().filter(|&i| !valid_index_space.contains(i)) {
        let source = image(index);

        if let Some(neigh) = neighbors.patch_containing_point(source) {
            guard.indexes.push(index);
            guard.values.extend_from_slice(neigh.get_slice(source));
        }
    }
    guard
}

/// Fill guard zone values in a mutable patch, from values sampled with
/// `guard_zone_values`. Indexes not listed are not touched.
///
pub fn extend_patch_mut(patch: &mut Patch, guard: &GuardValues) {
    let num_fields = patch.num_fields();

    for (index, values) in guard.indexes.iter().zip(guard.values.chunks_exact(num_fields)) {
        patch.get_slice_mut(*index).copy_from_slice(values)
    }
}
