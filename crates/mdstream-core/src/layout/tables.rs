//! Device storage references grouped by the kernels that consume them
//!
//! Every field is optional; a table is only required when its declared count
//! is non-zero. Sizes are checked by [`crate::layout::SimulationLayout::validate`].

use super::device_ref::DeviceRef;
use super::vector::{Float2, Float4, Int2, Int4, UInt4};

/// Collects coverage violations while a layout is validated
#[derive(Debug, Default)]
pub(crate) struct Coverage {
    violations: Vec<String>,
}

impl Coverage {
    /// A table that must exist whenever `count > 0`
    pub(crate) fn required<T>(&mut self, field: &str, table: &Option<DeviceRef<T>>, count: u32) {
        match table {
            None if count > 0 => self
                .violations
                .push(format!("{field}: missing, {count} entries declared")),
            _ => self.optional(field, table, count),
        }
    }

    /// A table that may be absent but must cover `count` entries when present
    pub(crate) fn optional<T>(&mut self, field: &str, table: &Option<DeviceRef<T>>, count: u32) {
        if let Some(table) = table {
            if !table.covers(count as usize) {
                self.violations.push(format!(
                    "{field}: covers {} entries, {count} declared",
                    table.len()
                ));
            }
        }
    }

    pub(crate) fn check(&mut self, ok: bool, message: impl FnOnce() -> String) {
        if !ok {
            self.violations.push(message());
        }
    }

    pub(crate) fn into_violations(self) -> Vec<String> {
        self.violations
    }
}

/// Per-atom state streams
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AtomState {
    /// Positions and charges
    pub posq: Option<DeviceRef<Float4>>,
    /// Mid-integration positions
    pub posq_p: Option<DeviceRef<Float4>>,
    pub old_posq: Option<DeviceRef<Float4>>,
    /// Velocities and inverse masses
    pub velm4: Option<DeviceRef<Float4>>,
    pub v_vector4: Option<DeviceRef<Float4>>,
    pub x_vector4: Option<DeviceRef<Float4>>,
    /// All force output buffers
    pub force4: Option<DeviceRef<Float4>>,
    pub force4a: Option<DeviceRef<Float4>>,
    pub force4b: Option<DeviceRef<Float4>>,
    pub out_force4: Option<DeviceRef<Float4>>,
    /// One partial sum per linear block
    pub linear_momentum: Option<DeviceRef<Float4>>,
    /// Original index of each (sorted) atom
    pub atom_index: Option<DeviceRef<i32>>,
}

impl AtomState {
    pub(crate) fn check(&self, atoms: u32, blocks: u32, coverage: &mut Coverage) {
        coverage.required("posq", &self.posq, atoms);
        coverage.required("velm4", &self.velm4, atoms);
        coverage.required("force4", &self.force4, atoms);
        coverage.optional("posq_p", &self.posq_p, atoms);
        coverage.optional("old_posq", &self.old_posq, atoms);
        coverage.optional("v_vector4", &self.v_vector4, atoms);
        coverage.optional("x_vector4", &self.x_vector4, atoms);
        coverage.optional("force4a", &self.force4a, atoms);
        coverage.optional("force4b", &self.force4b, atoms);
        coverage.optional("out_force4", &self.out_force4, atoms);
        coverage.optional("linear_momentum", &self.linear_momentum, blocks);
        coverage.optional("atom_index", &self.atom_index, atoms);
    }
}

/// Implicit-solvent (Born / OBC) streams and per-atom parameters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BornTables {
    pub born_force: Option<DeviceRef<f32>>,
    /// Born radii output buffers
    pub born_sum: Option<DeviceRef<f32>>,
    pub born_radii: Option<DeviceRef<f32>>,
    pub obc_chain: Option<DeviceRef<f32>>,
    /// Fixed OBC radius and scale factor
    pub obc_data: Option<DeviceRef<Float2>>,
    /// Lennard-Jones sigma and epsilon
    pub attr: Option<DeviceRef<Float2>>,
}

impl BornTables {
    pub(crate) fn check(&self, atoms: u32, coverage: &mut Coverage) {
        coverage.optional("born_force", &self.born_force, atoms);
        coverage.optional("born_sum", &self.born_sum, atoms);
        coverage.optional("born_radii", &self.born_radii, atoms);
        coverage.optional("obc_chain", &self.obc_chain, atoms);
        coverage.optional("obc_data", &self.obc_data, atoms);
        coverage.optional("attr", &self.attr, atoms);
    }
}

/// Bonded-term IDs and parameters
///
/// ID tables carry atom indices and output buffer indices packed per term.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BondedTables {
    pub bond_id: Option<DeviceRef<Int4>>,
    pub bond_parameter: Option<DeviceRef<Float2>>,
    pub bond_angle_id1: Option<DeviceRef<Int4>>,
    pub bond_angle_id2: Option<DeviceRef<Int2>>,
    pub bond_angle_parameter: Option<DeviceRef<Float2>>,
    pub dihedral_id1: Option<DeviceRef<Int4>>,
    pub dihedral_id2: Option<DeviceRef<Int4>>,
    pub dihedral_parameter: Option<DeviceRef<Float4>>,
    pub rb_dihedral_id1: Option<DeviceRef<Int4>>,
    pub rb_dihedral_id2: Option<DeviceRef<Int4>>,
    pub rb_dihedral_parameter1: Option<DeviceRef<Float4>>,
    pub rb_dihedral_parameter2: Option<DeviceRef<Float2>>,
    pub lj14_id: Option<DeviceRef<Int4>>,
    pub lj14_parameter: Option<DeviceRef<Float4>>,
}

impl BondedTables {
    pub(crate) fn check(&self, bonds: u32, angles: u32, dihedrals: u32, rb: u32, lj14s: u32, coverage: &mut Coverage) {
        coverage.required("bond_id", &self.bond_id, bonds);
        coverage.required("bond_parameter", &self.bond_parameter, bonds);
        coverage.required("bond_angle_id1", &self.bond_angle_id1, angles);
        coverage.required("bond_angle_id2", &self.bond_angle_id2, angles);
        coverage.required("bond_angle_parameter", &self.bond_angle_parameter, angles);
        coverage.required("dihedral_id1", &self.dihedral_id1, dihedrals);
        coverage.required("dihedral_id2", &self.dihedral_id2, dihedrals);
        coverage.required("dihedral_parameter", &self.dihedral_parameter, dihedrals);
        coverage.required("rb_dihedral_id1", &self.rb_dihedral_id1, rb);
        coverage.required("rb_dihedral_id2", &self.rb_dihedral_id2, rb);
        coverage.required("rb_dihedral_parameter1", &self.rb_dihedral_parameter1, rb);
        coverage.required("rb_dihedral_parameter2", &self.rb_dihedral_parameter2, rb);
        coverage.required("lj14_id", &self.lj14_id, lj14s);
        coverage.required("lj14_parameter", &self.lj14_parameter, lj14s);
    }
}

/// SHAKE, SETTLE, LINCS and rigid-cluster tables
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConstraintTables {
    /// Atoms outside any SHAKE group
    pub non_shake_id: Option<DeviceRef<i32>>,
    pub shake_id: Option<DeviceRef<Int4>>,
    pub shake_parameter: Option<DeviceRef<Float4>>,
    pub shake_reduced_mass: Option<DeviceRef<f32>>,
    pub settle_id: Option<DeviceRef<Int4>>,
    pub settle_parameter: Option<DeviceRef<Float2>>,

    pub lincs_atoms: Option<DeviceRef<Int2>>,
    /// Displacement (x, y, z) and constraint distance (w)
    pub lincs_distance: Option<DeviceRef<Float4>>,
    pub lincs_connections: Option<DeviceRef<i32>>,
    pub lincs_num_connections: Option<DeviceRef<i32>>,
    pub lincs_s: Option<DeviceRef<f32>>,
    pub lincs_coupling: Option<DeviceRef<f32>>,
    pub lincs_rhs1: Option<DeviceRef<f32>>,
    pub lincs_rhs2: Option<DeviceRef<f32>>,
    pub lincs_solution: Option<DeviceRef<f32>>,
    pub lincs_atom_constraints: Option<DeviceRef<i32>>,
    pub lincs_num_atom_constraints: Option<DeviceRef<i32>>,

    /// Global thread synchronization counter
    pub sync_counter: Option<DeviceRef<i16>>,
    /// SHAKE convergence flag
    pub required_iterations: Option<DeviceRef<u32>>,

    pub rigid_cluster_constraints: Option<DeviceRef<i32>>,
    pub rigid_cluster_matrix: Option<DeviceRef<f32>>,
    pub rigid_cluster_constraint_index: Option<DeviceRef<u32>>,
    pub rigid_cluster_matrix_index: Option<DeviceRef<u32>>,
}

pub(crate) struct ConstraintCounts {
    pub atoms: u32,
    pub shake: u32,
    pub settle: u32,
    pub lincs: u32,
    pub non_shake: u32,
    pub rigid_clusters: u32,
}

impl ConstraintTables {
    pub(crate) fn check(&self, counts: &ConstraintCounts, coverage: &mut Coverage) {
        coverage.required("non_shake_id", &self.non_shake_id, counts.non_shake);
        coverage.required("shake_id", &self.shake_id, counts.shake);
        coverage.required("shake_parameter", &self.shake_parameter, counts.shake);
        coverage.optional("shake_reduced_mass", &self.shake_reduced_mass, counts.shake);
        coverage.required("settle_id", &self.settle_id, counts.settle);
        coverage.required("settle_parameter", &self.settle_parameter, counts.settle);

        coverage.required("lincs_atoms", &self.lincs_atoms, counts.lincs);
        coverage.required("lincs_distance", &self.lincs_distance, counts.lincs);
        coverage.optional("lincs_connections", &self.lincs_connections, counts.lincs);
        coverage.optional("lincs_num_connections", &self.lincs_num_connections, counts.lincs);
        coverage.optional("lincs_s", &self.lincs_s, counts.lincs);
        coverage.optional("lincs_coupling", &self.lincs_coupling, counts.lincs);
        coverage.optional("lincs_rhs1", &self.lincs_rhs1, counts.lincs);
        coverage.optional("lincs_rhs2", &self.lincs_rhs2, counts.lincs);
        coverage.optional("lincs_solution", &self.lincs_solution, counts.lincs);
        coverage.optional("lincs_atom_constraints", &self.lincs_atom_constraints, counts.atoms);
        coverage.optional("lincs_num_atom_constraints", &self.lincs_num_atom_constraints, counts.atoms);

        coverage.optional("rigid_cluster_constraints", &self.rigid_cluster_constraints, counts.rigid_clusters);
        coverage.optional("rigid_cluster_matrix", &self.rigid_cluster_matrix, counts.rigid_clusters);
        coverage.optional(
            "rigid_cluster_constraint_index",
            &self.rigid_cluster_constraint_index,
            counts.rigid_clusters,
        );
        coverage.optional("rigid_cluster_matrix_index", &self.rigid_cluster_matrix_index, counts.rigid_clusters);
    }
}

/// Tile work lists and neighbour data for the nonbonded kernels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NonbondedTables {
    /// Packed tile-pair coordinates, one per work unit
    pub work_unit: Option<DeviceRef<u32>>,
    pub interacting_work_unit: Option<DeviceRef<u32>>,
    pub interaction_flag: Option<DeviceRef<u32>>,
    pub interaction_count: Option<DeviceRef<u64>>,
    pub exclusion: Option<DeviceRef<u32>>,
    /// Start of each work unit's exclusion data
    pub exclusion_index: Option<DeviceRef<u32>>,
    /// Extent of each tile
    pub grid_bounding_box: Option<DeviceRef<Float4>>,
    pub grid_center: Option<DeviceRef<Float4>>,
}

impl NonbondedTables {
    pub(crate) fn check(&self, work_units: u32, tiles: u32, coverage: &mut Coverage) {
        coverage.required("work_unit", &self.work_unit, work_units);
        coverage.optional("interacting_work_unit", &self.interacting_work_unit, work_units);
        coverage.optional("interaction_flag", &self.interaction_flag, work_units);
        coverage.optional("interaction_count", &self.interaction_count, 1);
        coverage.optional("exclusion_index", &self.exclusion_index, work_units);
        coverage.optional("grid_bounding_box", &self.grid_bounding_box, tiles);
        coverage.optional("grid_center", &self.grid_center, tiles);
    }
}

/// Random number pools for stochastic integrators and thermostats
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RandomPool {
    pub random4a: Option<DeviceRef<Float4>>,
    pub random4b: Option<DeviceRef<Float4>>,
    pub random2a: Option<DeviceRef<Float2>>,
    pub random2b: Option<DeviceRef<Float2>>,
    /// Per-thread generator state
    pub random_seed: Option<DeviceRef<UInt4>>,
    pub random_position: Option<DeviceRef<i32>>,
}

impl RandomPool {
    pub(crate) fn check(&self, total_randoms: u32, coverage: &mut Coverage) {
        coverage.required("random4a", &self.random4a, total_randoms);
        coverage.required("random4b", &self.random4b, total_randoms);
        coverage.required("random2a", &self.random2a, total_randoms);
        coverage.required("random2b", &self.random2b, total_randoms);
    }
}
