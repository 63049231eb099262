//! Physical and integrator constants carried in a simulation layout

use serde::{Deserialize, Serialize};

/// How nonbonded interactions are truncated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum NonbondedMethod {
    #[default]
    NoCutoff = 0,
    Cutoff = 1,
    Periodic = 2,
    Ewald = 3,
}

impl NonbondedMethod {
    /// Whether a cutoff distance applies
    pub const fn uses_cutoff(self) -> bool {
        !matches!(self, NonbondedMethod::NoCutoff)
    }

    /// Whether a periodic box applies
    pub const fn is_periodic(self) -> bool {
        matches!(self, NonbondedMethod::Periodic | NonbondedMethod::Ewald)
    }
}

/// Force-field and solvent-model constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    /// Flag value marking constrained atoms
    pub big_float: f32,
    pub epsfac: f32,
    pub nonbonded_method: NonbondedMethod,
    pub nonbonded_cutoff_sqr: f32,
    pub periodic_box_size: [f32; 3],
    pub reaction_field_k: f32,
    pub probe_radius: f32,
    pub surface_area_factor: f32,
    pub electric_constant: f32,
    pub force_conversion_factor: f32,
    pub pre_factor: f32,
    pub dielectric_offset: f32,
    pub alpha_obc: f32,
    pub beta_obc: f32,
    pub gamma_obc: f32,
    /// Used for linear momentum removal
    pub inverse_total_mass: f32,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            big_float: 99_999_999.0,
            epsfac: 0.0,
            nonbonded_method: NonbondedMethod::NoCutoff,
            nonbonded_cutoff_sqr: 0.0,
            periodic_box_size: [0.0; 3],
            reaction_field_k: 0.0,
            probe_radius: 0.14,
            surface_area_factor: 0.0,
            electric_constant: 0.0,
            force_conversion_factor: 1.0,
            pre_factor: 0.0,
            dielectric_offset: 0.009,
            alpha_obc: 1.0,
            beta_obc: 0.8,
            gamma_obc: 4.85,
            inverse_total_mass: 0.0,
        }
    }
}

impl PhysicalConstants {
    /// Set the nonbonded method and its cutoff distance
    pub fn with_cutoff(mut self, method: NonbondedMethod, cutoff: f32) -> Self {
        self.nonbonded_method = method;
        self.nonbonded_cutoff_sqr = cutoff * cutoff;
        self
    }

    /// Set the periodic box edge lengths
    pub fn with_periodic_box(mut self, x: f32, y: f32, z: f32) -> Self {
        self.periodic_box_size = [x, y, z];
        self
    }
}

/// Integrator and thermostat constants
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConstants {
    pub delta_t: f32,
    pub one_over_delta_t: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub eph: f32,
    pub emh: f32,
    pub em: f32,
    pub ep: f32,
    pub gdt: f32,
    pub one_minus_em: f32,
    pub tau_one_minus_em: f32,
    pub tau_d_over_em_minus_one: f32,
    pub t: f32,
    pub kt: f32,
    pub v: f32,
    pub x: f32,
    pub yv: f32,
    pub yx: f32,
    pub tau: f32,
    pub fix1: f32,
    pub one_over_fix1: f32,
    pub d_over_tau_c: f32,
    /// Andersen thermostat collision probability
    pub collision_probability: f32,
}

impl IntegratorConstants {
    /// Set the time step and its reciprocal
    pub fn with_time_step(mut self, delta_t: f32) -> Self {
        self.delta_t = delta_t;
        self.one_over_delta_t = if delta_t != 0.0 { 1.0 / delta_t } else { 0.0 };
        self
    }
}

/// Interaction and constraint counts for one topology
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyCounts {
    pub bonds: u32,
    pub bond_angles: u32,
    pub dihedrals: u32,
    pub rb_dihedrals: u32,
    pub lj14s: u32,

    pub shake_constraints: u32,
    pub settle_constraints: u32,
    pub lincs_constraints: u32,
    pub non_shake_constraints: u32,
    pub rigid_clusters: u32,
    pub max_rigid_cluster_size: u32,
    pub cluster_shake_block_size: u32,
    pub max_shake_iterations: u32,
    pub shake_tolerance: f32,
    pub inv_mass_j: f32,
    pub lincs_terms: u32,
    pub degrees_of_freedom: u32,

    pub randoms: u32,
    pub total_randoms: u32,
    pub total_randoms_times_two: u32,
    pub random_iterations: u32,
    pub random_frames: u32,
}

/// Cumulative ends of the bonded-term ranges
///
/// The local-forces kernel walks one flat index space: bonds first, then
/// angles, dihedrals, Ryckaert-Bellemans dihedrals and 1-4 pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondedOffsets {
    pub bond_offset: u32,
    pub bond_angle_offset: u32,
    pub dihedral_offset: u32,
    pub rb_dihedral_offset: u32,
    pub lj14_offset: u32,
}

impl TopologyCounts {
    /// Cumulative bonded-term offsets
    pub fn bonded_offsets(&self) -> BondedOffsets {
        let bond_offset = self.bonds;
        let bond_angle_offset = bond_offset + self.bond_angles;
        let dihedral_offset = bond_angle_offset + self.dihedrals;
        let rb_dihedral_offset = dihedral_offset + self.rb_dihedrals;
        BondedOffsets {
            bond_offset,
            bond_angle_offset,
            dihedral_offset,
            rb_dihedral_offset,
            lj14_offset: rb_dihedral_offset + self.lj14s,
        }
    }

    /// Set the random pool size; `total_randoms` includes `overflow` spare slots
    pub fn with_randoms(mut self, randoms: u32, overflow: u32) -> Self {
        self.randoms = randoms;
        self.total_randoms = randoms + overflow;
        self.total_randoms_times_two = self.total_randoms * 2;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bonded_offsets_are_cumulative() {
        let counts = TopologyCounts {
            bonds: 10,
            bond_angles: 5,
            dihedrals: 3,
            rb_dihedrals: 0,
            lj14s: 7,
            ..TopologyCounts::default()
        };
        let offsets = counts.bonded_offsets();
        assert_eq!(offsets.bond_offset, 10);
        assert_eq!(offsets.bond_angle_offset, 15);
        assert_eq!(offsets.dihedral_offset, 18);
        assert_eq!(offsets.rb_dihedral_offset, 18);
        assert_eq!(offsets.lj14_offset, 25);
    }

    #[test]
    fn test_nonbonded_method_flags() {
        assert!(!NonbondedMethod::NoCutoff.uses_cutoff());
        assert!(NonbondedMethod::Cutoff.uses_cutoff());
        assert!(!NonbondedMethod::Cutoff.is_periodic());
        assert!(NonbondedMethod::Ewald.is_periodic());
        assert_eq!(NonbondedMethod::Periodic as u32, 2);
    }

    #[test]
    fn test_builders() {
        let physical = PhysicalConstants::default()
            .with_cutoff(NonbondedMethod::Periodic, 2.0)
            .with_periodic_box(3.0, 4.0, 5.0);
        assert_eq!(physical.nonbonded_cutoff_sqr, 4.0);
        assert_eq!(physical.periodic_box_size, [3.0, 4.0, 5.0]);

        let integrator = IntegratorConstants::default().with_time_step(0.002);
        assert!((integrator.one_over_delta_t - 500.0).abs() < 1e-3);
        assert_eq!(IntegratorConstants::default().with_time_step(0.0).one_over_delta_t, 0.0);

        let counts = TopologyCounts::default().with_randoms(100, 28);
        assert_eq!(counts.total_randoms, 128);
        assert_eq!(counts.total_randoms_times_two, 256);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let physical: PhysicalConstants = serde_json::from_str(r#"{"nonbonded_method":"ewald"}"#).unwrap();
        assert_eq!(physical.nonbonded_method, NonbondedMethod::Ewald);
        assert_eq!(physical.beta_obc, 0.8);
    }
}
