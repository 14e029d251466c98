use crate::index_space::Axis;




pub const DENSITY: usize = 0;
pub const XMOM: usize = 1;
pub const YMOM: usize = 2;
pub const ENERGY: usize = 3;
pub const TEMP: usize = 4;
pub const FIRST_SPEC: usize = 5;




/**
 * Layout of the conserved state vector: density, two momentum components,
 * total energy, temperature, and the partial densities of each species.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Variables {
    num_species: usize,
}




// ============================================================================
impl Variables {

    pub fn new(num_species: usize) -> Self {
        Self { num_species }
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    pub fn num_state(&self) -> usize {
        FIRST_SPEC + self.num_species
    }

    pub fn species(&self) -> std::ops::Range<usize> {
        FIRST_SPEC..FIRST_SPEC + self.num_species
    }

    pub fn momentum(axis: Axis) -> usize {
        match axis {
            Axis::I => XMOM,
            Axis::J => YMOM,
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["density", "xmom", "ymom", "energy", "temp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.extend(self.species().map(|n| format!("rho_y{}", n - FIRST_SPEC)));
        names
    }
}
