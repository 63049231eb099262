//! Simulation layout descriptor
//!
//! A [`SimulationLayout`] is the flat parameter block handed to the kernel
//! layer: launch sizing, physical and integrator constants, topology counts,
//! and non-owning [`DeviceRef`]s into stream device storage. It owns nothing
//! and is built once per topology; a change to any field means building a
//! new layout.
//!
//! # Example
//!
//! ```rust
//! use mdstream_core::layout::{
//!     AtomState, DeviceProfile, Float4, GpuGeneration, LaunchSizing, NonbondedTables,
//!     SimulationLayout,
//! };
//! use mdstream_core::Device;
//!
//! # fn main() -> mdstream_core::Result<()> {
//! let device = Device::cpu();
//! let sizing = LaunchSizing::compute(100, DeviceProfile::new(GpuGeneration::Gt2xx, 30))?;
//!
//! let posq = device.stream::<Float4>(sizing.padded_atoms as usize, 1, "posq")?;
//! let velm4 = device.stream::<Float4>(sizing.padded_atoms as usize, 1, "velm4")?;
//! let force4 = device.stream::<Float4>(sizing.stride as usize, sizing.output_buffers as usize, "force4")?;
//! let work_unit = device.stream::<u32>(sizing.work_units as usize, 1, "work_unit")?;
//!
//! let layout = SimulationLayout::builder(sizing)
//!     .atom_state(AtomState {
//!         posq: Some(posq.device_ref()?),
//!         velm4: Some(velm4.device_ref()?),
//!         force4: Some(force4.device_ref()?),
//!         ..AtomState::default()
//!     })
//!     .nonbonded(NonbondedTables {
//!         work_unit: Some(work_unit.device_ref()?),
//!         ..NonbondedTables::default()
//!     })
//!     .build()?;
//! assert_eq!(layout.sizing().atoms, 100);
//! # Ok(())
//! # }
//! ```

mod constants;
mod device_ref;
mod launch;
mod tables;
mod vector;

pub use constants::{BondedOffsets, IntegratorConstants, NonbondedMethod, PhysicalConstants, TopologyCounts};
pub use device_ref::DeviceRef;
pub use launch::{DeviceProfile, GpuGeneration, KernelFamily, LaunchSizing, GRID, GRID_BITS};
pub use tables::{AtomState, BondedTables, BornTables, ConstraintTables, NonbondedTables, RandomPool};
pub use vector::{Float2, Float4, Int2, Int4, UInt4};

use crate::error::{Error, Result};
use tables::{ConstraintCounts, Coverage};

/// Everything the kernel layer reads for one topology
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationLayout {
    sizing: LaunchSizing,
    physical: PhysicalConstants,
    integrator: IntegratorConstants,
    counts: TopologyCounts,
    offsets: BondedOffsets,
    atoms: AtomState,
    born: BornTables,
    bonded: BondedTables,
    constraints: ConstraintTables,
    nonbonded: NonbondedTables,
    random: RandomPool,
}

impl SimulationLayout {
    /// Start a layout for the given launch sizing
    pub fn builder(sizing: LaunchSizing) -> SimulationLayoutBuilder {
        SimulationLayoutBuilder {
            layout: SimulationLayout {
                sizing,
                physical: PhysicalConstants::default(),
                integrator: IntegratorConstants::default(),
                counts: TopologyCounts::default(),
                offsets: BondedOffsets::default(),
                atoms: AtomState::default(),
                born: BornTables::default(),
                bonded: BondedTables::default(),
                constraints: ConstraintTables::default(),
                nonbonded: NonbondedTables::default(),
                random: RandomPool::default(),
            },
        }
    }

    pub fn sizing(&self) -> &LaunchSizing {
        &self.sizing
    }

    pub fn physical(&self) -> &PhysicalConstants {
        &self.physical
    }

    pub fn integrator(&self) -> &IntegratorConstants {
        &self.integrator
    }

    pub fn counts(&self) -> &TopologyCounts {
        &self.counts
    }

    /// Cumulative bonded-term offsets derived from the counts
    pub fn offsets(&self) -> &BondedOffsets {
        &self.offsets
    }

    pub fn atom_state(&self) -> &AtomState {
        &self.atoms
    }

    pub fn born(&self) -> &BornTables {
        &self.born
    }

    pub fn bonded(&self) -> &BondedTables {
        &self.bonded
    }

    pub fn constraints(&self) -> &ConstraintTables {
        &self.constraints
    }

    pub fn nonbonded(&self) -> &NonbondedTables {
        &self.nonbonded
    }

    pub fn random(&self) -> &RandomPool {
        &self.random
    }

    /// Check that every reference covers its declared count
    ///
    /// All violations are reported together.
    pub fn validate(&self) -> Result<()> {
        let sizing = &self.sizing;
        let counts = &self.counts;
        let mut coverage = Coverage::default();

        coverage.check(sizing.padded_atoms >= sizing.atoms, || {
            format!("padded_atoms {} < atoms {}", sizing.padded_atoms, sizing.atoms)
        });
        coverage.check(sizing.stride >= sizing.padded_atoms, || {
            format!("stride {} < padded_atoms {}", sizing.stride, sizing.padded_atoms)
        });
        coverage.check(counts.total_randoms >= counts.randoms, || {
            format!("total_randoms {} < randoms {}", counts.total_randoms, counts.randoms)
        });

        self.atoms.check(sizing.atoms, sizing.blocks, &mut coverage);
        self.born.check(sizing.atoms, &mut coverage);
        self.bonded.check(
            counts.bonds,
            counts.bond_angles,
            counts.dihedrals,
            counts.rb_dihedrals,
            counts.lj14s,
            &mut coverage,
        );
        self.constraints.check(
            &ConstraintCounts {
                atoms: sizing.atoms,
                shake: counts.shake_constraints,
                settle: counts.settle_constraints,
                lincs: counts.lincs_constraints,
                non_shake: counts.non_shake_constraints,
                rigid_clusters: counts.rigid_clusters,
            },
            &mut coverage,
        );
        self.nonbonded
            .check(sizing.work_units, sizing.padded_atoms / GRID, &mut coverage);
        self.random.check(counts.total_randoms, &mut coverage);

        let violations = coverage.into_violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidLayout { violations })
        }
    }
}

/// Assembles a [`SimulationLayout`]; [`build`](Self::build) validates it
#[derive(Debug, Clone)]
pub struct SimulationLayoutBuilder {
    layout: SimulationLayout,
}

impl SimulationLayoutBuilder {
    pub fn physical(mut self, physical: PhysicalConstants) -> Self {
        self.layout.physical = physical;
        self
    }

    pub fn integrator(mut self, integrator: IntegratorConstants) -> Self {
        self.layout.integrator = integrator;
        self
    }

    pub fn counts(mut self, counts: TopologyCounts) -> Self {
        self.layout.counts = counts;
        self
    }

    pub fn atom_state(mut self, atoms: AtomState) -> Self {
        self.layout.atoms = atoms;
        self
    }

    pub fn born(mut self, born: BornTables) -> Self {
        self.layout.born = born;
        self
    }

    pub fn bonded(mut self, bonded: BondedTables) -> Self {
        self.layout.bonded = bonded;
        self
    }

    pub fn constraints(mut self, constraints: ConstraintTables) -> Self {
        self.layout.constraints = constraints;
        self
    }

    pub fn nonbonded(mut self, nonbonded: NonbondedTables) -> Self {
        self.layout.nonbonded = nonbonded;
        self
    }

    pub fn random(mut self, random: RandomPool) -> Self {
        self.layout.random = random;
        self
    }

    /// Derive the bonded offsets and validate every reference
    #[tracing::instrument(skip(self), fields(atoms = self.layout.sizing.atoms))]
    pub fn build(mut self) -> Result<SimulationLayout> {
        self.layout.offsets = self.layout.counts.bonded_offsets();
        self.layout.validate()?;

        tracing::debug!(
            sizing = %self.layout.sizing,
            bonded_terms = self.layout.offsets.lj14_offset,
            "simulation_layout_built"
        );
        Ok(self.layout)
    }
}
