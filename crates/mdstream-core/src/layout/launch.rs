//! Launch geometry
//!
//! Atoms are processed in tiles of [`GRID`] atoms. The nonbonded work is the
//! upper triangle of the tile-pair matrix, one work unit per tile pair, dealt
//! out across one block per multiprocessor.

use crate::error::{Error, Result};
use crate::stream::aligned_stride;
use mdstream_backends::LaunchConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Atoms per tile (one warp)
pub const GRID: u32 = 32;

/// `log2(GRID)`
pub const GRID_BITS: u32 = 5;

/// Device generation, which selects the threads-per-block tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuGeneration {
    /// Compute capability 1.0 / 1.1
    G8x,
    /// Compute capability 1.2 and later
    #[default]
    Gt2xx,
}

/// Kernel families with their own threads-per-block settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelFamily {
    /// Linear per-atom kernels
    Generic,
    /// Coulomb / Lennard-Jones and Born force part 1
    Nonbond,
    /// Born force part 2
    BornForce2,
    /// SHAKE constraints
    Shake,
    /// Integrator update
    Update,
    /// Bonded (local) forces
    LocalForces,
    /// Random number generation
    Random,
}

impl KernelFamily {
    pub const ALL: [KernelFamily; 7] = [
        KernelFamily::Generic,
        KernelFamily::Nonbond,
        KernelFamily::BornForce2,
        KernelFamily::Shake,
        KernelFamily::Update,
        KernelFamily::LocalForces,
        KernelFamily::Random,
    ];
}

impl GpuGeneration {
    /// Pick the generation from a CUDA compute capability
    pub const fn from_compute_capability(major: u32, minor: u32) -> Self {
        if major > 1 || (major == 1 && minor >= 2) {
            GpuGeneration::Gt2xx
        } else {
            GpuGeneration::G8x
        }
    }

    /// Threads per block for `family`
    pub const fn threads_per_block(self, family: KernelFamily) -> u32 {
        use GpuGeneration::*;
        use KernelFamily::*;
        match (self, family) {
            (G8x, Nonbond) => 256,
            (Gt2xx, Nonbond) => 320,
            (G8x, BornForce2) => 256,
            (Gt2xx, BornForce2) => 320,
            (G8x, Shake) => 128,
            (Gt2xx, Shake) => 256,
            (G8x, Update) => 192,
            (Gt2xx, Update) => 384,
            (G8x, LocalForces) => 192,
            (Gt2xx, LocalForces) => 384,
            (G8x, Generic) => 256,
            (Gt2xx, Generic) => 256,
            (G8x, Random) => 256,
            (Gt2xx, Random) => 384,
        }
    }

    /// Nonbonded work units resident per multiprocessor
    pub const fn nonbond_work_units_per_sm(self) -> u32 {
        match self {
            GpuGeneration::G8x => 220,
            GpuGeneration::Gt2xx => 256,
        }
    }
}

/// The device properties launch sizing depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub generation: GpuGeneration,
    pub multiprocessors: u32,
}

impl DeviceProfile {
    pub const fn new(generation: GpuGeneration, multiprocessors: u32) -> Self {
        Self {
            generation,
            multiprocessors,
        }
    }
}

/// Launch-sizing scalars of a simulation layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchSizing {
    pub atoms: u32,
    pub padded_atoms: u32,
    pub generation: GpuGeneration,

    pub blocks: u32,
    pub nonbond_blocks: u32,
    pub bornforce2_blocks: u32,
    pub interaction_blocks: u32,

    pub threads_per_block: u32,
    pub nonbond_threads_per_block: u32,
    pub bornforce2_threads_per_block: u32,
    pub max_update_threads_per_block: u32,
    pub update_threads_per_block: u32,
    pub bf_reduce_threads_per_block: u32,
    pub bsf_reduce_threads_per_block: u32,
    pub max_shake_threads_per_block: u32,
    pub shake_threads_per_block: u32,
    pub settle_threads_per_block: u32,
    pub lincs_threads_per_block: u32,
    pub nonshake_threads_per_block: u32,
    pub max_local_forces_threads_per_block: u32,
    pub local_forces_threads_per_block: u32,
    pub random_threads_per_block: u32,
    pub interaction_threads_per_block: u32,

    pub work_units: u32,
    pub nonbond_work_block: u32,
    pub bornforce2_work_block: u32,
    pub work_units_per_sm: u32,
    pub nb_work_units_per_block: u32,
    pub nb_work_units_per_block_remainder: u32,
    pub bf2_work_units_per_block: u32,
    pub bf2_work_units_per_block_remainder: u32,

    pub stride: u32,
    pub stride2: u32,
    pub stride3: u32,
    pub stride4: u32,

    pub nonbond_output_buffers: u32,
    pub total_nonbond_output_buffers: u32,
    pub output_buffers: u32,
}

impl LaunchSizing {
    /// Derive launch sizing for `atoms` atoms on `profile`
    ///
    /// Fails with [`Error::InvalidConfig`] when the padded atom count, the
    /// tile-pair count or the widest stride no longer fits in 32 bits.
    ///
    /// ```rust
    /// use mdstream_core::layout::{DeviceProfile, GpuGeneration, LaunchSizing};
    ///
    /// # fn main() -> mdstream_core::Result<()> {
    /// let sizing = LaunchSizing::compute(100, DeviceProfile::new(GpuGeneration::Gt2xx, 30))?;
    /// assert_eq!(sizing.padded_atoms, 128);
    /// assert_eq!(sizing.work_units, 10);
    /// assert_eq!(sizing.nonbond_threads_per_block, 320);
    /// # Ok(())
    /// # }
    /// ```
    pub fn compute(atoms: u32, profile: DeviceProfile) -> Result<Self> {
        let generation = profile.generation;
        let tpb = |family| generation.threads_per_block(family);
        let sms = profile.multiprocessors.max(1);

        let too_large = |what: &str| Error::InvalidConfig(format!("{atoms} atoms: {what} exceeds 32 bits"));
        let padded = u64::from(atoms).div_ceil(u64::from(GRID)) * u64::from(GRID);
        let padded_atoms = u32::try_from(padded).map_err(|_| too_large("padded atom count"))?;
        let cells = padded_atoms >> GRID_BITS;
        let pairs = u64::from(cells) * (u64::from(cells) + 1) / 2;
        let work_units = u32::try_from(pairs).map_err(|_| too_large("tile-pair count"))?;
        let stride = u32::try_from(aligned_stride(padded_atoms as usize)).map_err(|_| too_large("stride"))?;
        let stride4 = stride.checked_mul(4).ok_or_else(|| too_large("4 x stride"))?;

        let nonbond_threads_per_block = tpb(KernelFamily::Nonbond);
        let bornforce2_threads_per_block = tpb(KernelFamily::BornForce2);
        let threads_per_block = tpb(KernelFamily::Generic);
        let shake = tpb(KernelFamily::Shake);
        let update = tpb(KernelFamily::Update);
        let local_forces = tpb(KernelFamily::LocalForces);

        Ok(Self {
            atoms,
            padded_atoms,
            generation,

            blocks: sms,
            nonbond_blocks: sms,
            bornforce2_blocks: sms,
            interaction_blocks: sms,

            threads_per_block,
            nonbond_threads_per_block,
            bornforce2_threads_per_block,
            max_update_threads_per_block: update,
            update_threads_per_block: update,
            bf_reduce_threads_per_block: threads_per_block,
            bsf_reduce_threads_per_block: threads_per_block,
            max_shake_threads_per_block: shake,
            shake_threads_per_block: shake,
            settle_threads_per_block: shake,
            lincs_threads_per_block: shake,
            nonshake_threads_per_block: update,
            max_local_forces_threads_per_block: local_forces,
            local_forces_threads_per_block: local_forces,
            random_threads_per_block: tpb(KernelFamily::Random),
            interaction_threads_per_block: threads_per_block,

            work_units,
            nonbond_work_block: nonbond_threads_per_block / GRID,
            bornforce2_work_block: bornforce2_threads_per_block / GRID,
            work_units_per_sm: generation.nonbond_work_units_per_sm(),
            nb_work_units_per_block: work_units / sms,
            nb_work_units_per_block_remainder: work_units % sms,
            bf2_work_units_per_block: work_units / sms,
            bf2_work_units_per_block_remainder: work_units % sms,

            stride,
            stride2: stride * 2,
            stride3: stride * 3,
            stride4,

            nonbond_output_buffers: cells,
            total_nonbond_output_buffers: cells,
            output_buffers: cells,
        })
    }

    /// Double the nonbonded output buffers for the Born sum pass of
    /// implicit-solvent runs
    pub fn with_implicit_solvent(mut self) -> Self {
        self.total_nonbond_output_buffers = self.nonbond_output_buffers * 2;
        self.output_buffers = self.total_nonbond_output_buffers;
        self
    }

    /// Blocks and threads per block for `family`
    pub fn launch_config(&self, family: KernelFamily) -> LaunchConfig {
        let (blocks, threads) = match family {
            KernelFamily::Generic => (self.blocks, self.threads_per_block),
            KernelFamily::Nonbond => (self.nonbond_blocks, self.nonbond_threads_per_block),
            KernelFamily::BornForce2 => (self.bornforce2_blocks, self.bornforce2_threads_per_block),
            KernelFamily::Shake => (self.blocks, self.shake_threads_per_block),
            KernelFamily::Update => (self.blocks, self.update_threads_per_block),
            KernelFamily::LocalForces => (self.blocks, self.local_forces_threads_per_block),
            KernelFamily::Random => (self.blocks, self.random_threads_per_block),
        };
        LaunchConfig::blocks(blocks, threads)
    }
}

impl fmt::Display for LaunchSizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} atoms (padded {}), {} work units over {} blocks, stride {}",
            self.atoms, self.padded_atoms, self.work_units, self.nonbond_blocks, self.stride
        )
    }
}
