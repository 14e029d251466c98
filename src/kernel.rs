use crossbeam_channel::Receiver;
use rayon::prelude::*;
use crate::geometry::Geometry;
use crate::index_space::range2d;
use crate::multifab::MultiFab;
use crate::patch::Patch;
use crate::physics::Physics;




/// The face fluxes computed for one box, tagged with the box's position in
/// the level's box array.
pub type BoxFluxes = (usize, [Patch; 2]);




/**
 * Evaluate the time derivative of a ghost-filled state into `uprime`, one box
 * per task. If `want_fluxes` is set, each box's face fluxes are sent to the
 * returned channel as soon as that box is finished; the channel is complete
 * (all senders dropped) when this function returns, so the caller drains it
 * on a single thread. Nothing is checked for finiteness here.
 */
pub fn dudt<P>(physics: &P, u: &MultiFab, geom: &Geometry, uprime: &mut MultiFab, want_fluxes: bool) -> Receiver<BoxFluxes>
where
    P: Physics + ?Sized
{
    assert_eq!(u.boxes(), uprime.boxes(), "state and derivative layouts differ");

    let (sink, source) = crossbeam_channel::unbounded();
    let dx = geom.cell_size();
    let num_fields = u.num_fields();

    uprime.par_iter_mut().for_each_with(sink, |sink, (n, valid, du)| {
        if want_fluxes {
            let empty = || Patch::zeros(num_fields, range2d(0..0, 0..0));
            let mut fluxes = [empty(), empty()];
            physics.dudt(u.patch(n), valid, dx, du, Some(&mut fluxes));
            sink.send((n, fluxes)).expect("flux receiver is held by the caller");
        } else {
            physics.dudt(u.patch(n), valid, dx, du, None);
        }
    });
    source
}
