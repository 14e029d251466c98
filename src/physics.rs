use crate::config::{Chemistry, PhysicsConfig};
use crate::index_space::{Axis, IndexSpace};
use crate::patch::Patch;
use crate::variables::{Variables, DENSITY, ENERGY, FIRST_SPEC, TEMP};




/**
 * The point-wise and per-box physics of a reacting flow, as needed by the
 * level integrators. Slices passed to the per-cell methods hold all state
 * components of a single cell.
 */
pub trait Physics: Send + Sync {

    /// The layout of the state vector.
    fn variables(&self) -> Variables;

    /// Compute the time derivative of the conserved state over the valid box,
    /// given a state patch whose ghost cells have been filled. If `fluxes` is
    /// given, the face fluxes on the two axes are written there, on the face
    /// spaces of the valid box.
    fn dudt(&self, u: &Patch, valid: &IndexSpace, dx: (f64, f64), dudt: &mut Patch, fluxes: Option<&mut [Patch; 2]>);

    /// Rescale the species densities so they sum to the total density.
    fn enforce_consistent_y(&self, u: &mut [f64]);

    /// Recompute the temperature from the conserved variables.
    fn compute_temp(&self, u: &mut [f64]);

    fn has_chemistry(&self) -> bool;

    /// Advance the reactions by `dt` in a single cell (operator split).
    fn advance_chemistry(&self, u: &mut [f64], dt: f64);

    /// The reaction source terms, the implicit part of an IMEX splitting.
    fn chemistry_rate(&self, u: &[f64], f2: &mut [f64]);

    /// Solve `q - dt * f2(q) = rhs` for `q`, in a single cell.
    fn chemistry_solve(&self, q: &mut [f64], rhs: &[f64], dt: f64);

    /// The state imposed at position `x` at time `t`, used by the
    /// external-Dirichlet boundary fill.
    fn boundary_value(&self, x: (f64, f64), t: f64, u: &mut [f64]);

    /// The largest signal speed along each axis in a single cell.
    fn max_signal_speed(&self, u: &[f64]) -> (f64, f64);
}




/**
 * Conserved quantities advected with a constant velocity, using first-order
 * upwind fluxes, with an optional linear conversion of the first species
 * into the second.
 */
#[derive(Clone, Debug)]
pub struct ReactiveAdvection {
    variables: Variables,
    velocity: (f64, f64),
    chemistry: Option<Chemistry>,
    boundary_state: Vec<f64>,
}




// ============================================================================
impl ReactiveAdvection {

    pub fn new(variables: Variables, velocity: (f64, f64), chemistry: Option<Chemistry>) -> Self {
        let mut boundary_state = vec![0.0; variables.num_state()];
        boundary_state[DENSITY] = 1.0;
        boundary_state[ENERGY] = 1.0;
        boundary_state[TEMP] = 1.0;

        if variables.num_species() > 0 {
            boundary_state[FIRST_SPEC] = 1.0;
        }
        Self { variables, velocity, chemistry, boundary_state }
    }

    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self::new(Variables::new(config.num_species), config.velocity, config.chemistry)
    }

    /// Replace the state imposed at external-Dirichlet boundaries.
    pub fn with_boundary_state(mut self, state: Vec<f64>) -> Self {
        assert_eq!(state.len(), self.variables.num_state());
        self.boundary_state = state;
        self
    }

    fn speed(&self, axis: Axis) -> f64 {
        match axis {
            Axis::I => self.velocity.0,
            Axis::J => self.velocity.1,
        }
    }

    fn upwind_flux(&self, u: &Patch, face: (i64, i64), axis: Axis, flux: &mut [f64]) {
        let a = self.speed(axis);
        let upwind = if a >= 0.0 {
            match axis {
                Axis::I => (face.0 - 1, face.1),
                Axis::J => (face.0, face.1 - 1),
            }
        } else {
            face
        };
        let state = u.get_slice(upwind);

        for (n, f) in flux.iter_mut().enumerate() {
            *f = if n == TEMP { 0.0 } else { a * state[n] };
        }
    }
}




// ============================================================================
impl Physics for ReactiveAdvection {

    fn variables(&self) -> Variables {
        self.variables
    }

    fn dudt(&self, u: &Patch, valid: &IndexSpace, dx: (f64, f64), dudt: &mut Patch, fluxes: Option<&mut [Patch; 2]>) {
        let num_fields = u.num_fields();
        let fi = Patch::from_slice_function(num_fields, valid.extend_upper(1, Axis::I), |face, f| self.upwind_flux(u, face, Axis::I, f));
        let fj = Patch::from_slice_function(num_fields, valid.extend_upper(1, Axis::J), |face, f| self.upwind_flux(u, face, Axis::J, f));

        for ((i, j), d) in valid.iter().zip(dudt.select_mut(valid)) {
            let (fl, fr) = (fi.get_slice((i, j)), fi.get_slice((i + 1, j)));
            let (gl, gr) = (fj.get_slice((i, j)), fj.get_slice((i, j + 1)));

            for n in 0..num_fields {
                d[n] = -(fr[n] - fl[n]) / dx.0 - (gr[n] - gl[n]) / dx.1;
            }
        }
        if let Some(fluxes) = fluxes {
            *fluxes = [fi, fj];
        }
    }

    fn enforce_consistent_y(&self, u: &mut [f64]) {
        let species = self.variables.species();
        let sum: f64 = u[species.clone()].iter().sum();

        if sum > 0.0 {
            let factor = u[DENSITY] / sum;
            for y in &mut u[species] {
                *y *= factor
            }
        }
    }

    fn compute_temp(&self, u: &mut [f64]) {
        u[TEMP] = u[ENERGY] / u[DENSITY];
    }

    fn has_chemistry(&self) -> bool {
        self.chemistry.is_some()
    }

    fn advance_chemistry(&self, u: &mut [f64], dt: f64) {
        if let Some(chem) = self.chemistry {
            let a = u[FIRST_SPEC];
            let a_new = a * (-chem.rate * dt).exp();
            u[FIRST_SPEC] = a_new;
            u[FIRST_SPEC + 1] += a - a_new;
        }
    }

    fn chemistry_rate(&self, u: &[f64], f2: &mut [f64]) {
        for f in f2.iter_mut() {
            *f = 0.0
        }
        if let Some(chem) = self.chemistry {
            let r = chem.rate * u[FIRST_SPEC];
            f2[FIRST_SPEC] = -r;
            f2[FIRST_SPEC + 1] = r;
        }
    }

    fn chemistry_solve(&self, q: &mut [f64], rhs: &[f64], dt: f64) {
        q.copy_from_slice(rhs);

        if let Some(chem) = self.chemistry {
            let a = rhs[FIRST_SPEC] / (1.0 + dt * chem.rate);
            q[FIRST_SPEC] = a;
            q[FIRST_SPEC + 1] = rhs[FIRST_SPEC + 1] + dt * chem.rate * a;
        }
    }

    fn boundary_value(&self, _x: (f64, f64), _t: f64, u: &mut [f64]) {
        u.copy_from_slice(&self.boundary_state)
    }

    fn max_signal_speed(&self, _u: &[f64]) -> (f64, f64) {
        (self.velocity.0.abs(), self.velocity.1.abs())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{Physics, ReactiveAdvection};
    use crate::config::Chemistry;
    use crate::index_space::range2d;
    use crate::patch::Patch;
    use crate::variables::{Variables, DENSITY, FIRST_SPEC, TEMP};

    fn model(velocity: (f64, f64)) -> ReactiveAdvection {
        ReactiveAdvection::new(Variables::new(2), velocity, Some(Chemistry { rate: 2.0 }))
    }

    #[test]
    fn uniform_state_has_zero_derivative() {
        let physics = model((1.0, -0.5));
        let valid = range2d(0..4, 0..4);
        let u = Patch::from_slice_function(7, valid.extend_all(1), |_, s| s.iter_mut().for_each(|x| *x = 1.5));
        let mut d = Patch::zeros(7, valid.clone());
        physics.dudt(&u, &valid, (0.1, 0.1), &mut d, None);
        assert_eq!(d.max_abs(&valid), 0.0);
    }

    #[test]
    fn upwind_derivative_uses_the_upstream_cell() {
        let physics = model((1.0, 0.0));
        let valid = range2d(0..4, 0..1);
        let u = Patch::from_slice_function(7, valid.extend_all(1), |(i, _), s| s[DENSITY] = i as f64);
        let mut d = Patch::zeros(7, valid.clone());
        let mut fluxes = [Patch::zeros(7, range2d(0..0, 0..0)), Patch::zeros(7, range2d(0..0, 0..0))];
        physics.dudt(&u, &valid, (0.5, 1.0), &mut d, Some(&mut fluxes));
        assert_eq!(d.get((2, 0), DENSITY), -2.0);
        assert_eq!(fluxes[0].get((4, 0), DENSITY), 3.0);
        assert_eq!(fluxes[0].index_space(), &range2d(0..5, 0..1));
        assert_eq!(d.get((2, 0), TEMP), 0.0);
    }

    #[test]
    fn implicit_chemistry_solve_satisfies_its_equation() {
        let physics = model((0.0, 0.0));
        let rhs = vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.6, 0.4];
        let mut q = vec![0.0; 7];
        let mut f2 = vec![0.0; 7];
        let dt = 0.3;
        physics.chemistry_solve(&mut q, &rhs, dt);
        physics.chemistry_rate(&q, &mut f2);

        for n in 0..7 {
            assert!((q[n] - dt * f2[n] - rhs[n]).abs() < 1e-14);
        }
    }

    #[test]
    fn chemistry_conserves_the_species_total() {
        let physics = model((0.0, 0.0));
        let mut u = vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.6, 0.4];
        physics.advance_chemistry(&mut u, 0.25);
        assert!((u[FIRST_SPEC] - 0.6 * (-0.5f64).exp()).abs() < 1e-15);
        assert!((u[FIRST_SPEC] + u[FIRST_SPEC + 1] - 1.0).abs() < 1e-15);
    }
}
