//! Assembling a simulation layout from live streams
//!
//! Builds the streams a small constrained, thermostatted system would carry
//! and checks that the layout references line up with their storage.

use mdstream_core::layout::{
    AtomState, BondedTables, ConstraintTables, DeviceProfile, Float2, Float4, GpuGeneration, Int2, Int4,
    IntegratorConstants, KernelFamily, LaunchSizing, NonbondedMethod, NonbondedTables, PhysicalConstants,
    RandomPool, SimulationLayout, TopologyCounts, UInt4,
};
use mdstream_core::{upload_all, Device, Error};

struct SmallSystem {
    posq: mdstream_core::ResidentStream<Float4>,
    velm4: mdstream_core::ResidentStream<Float4>,
    force4: mdstream_core::ResidentStream<Float4>,
    work_unit: mdstream_core::ResidentStream<u32>,
    bond_id: mdstream_core::ResidentStream<Int4>,
    bond_parameter: mdstream_core::ResidentStream<Float2>,
    lincs_atoms: mdstream_core::ResidentStream<Int2>,
    lincs_distance: mdstream_core::ResidentStream<Float4>,
    random4: mdstream_core::ResidentStream<Float4>,
    random2: mdstream_core::ResidentStream<Float2>,
    random_seed: mdstream_core::ResidentStream<UInt4>,
}

const ATOMS: u32 = 90;
const BONDS: u32 = 89;

fn sizing() -> LaunchSizing {
    LaunchSizing::compute(ATOMS, DeviceProfile::new(GpuGeneration::Gt2xx, 2)).unwrap()
}

fn counts() -> TopologyCounts {
    TopologyCounts {
        bonds: BONDS,
        lincs_constraints: BONDS,
        lincs_terms: 4,
        ..TopologyCounts::default()
    }
    .with_randoms(ATOMS, 38)
}

fn allocate(device: &Device, sizing: &LaunchSizing, counts: &TopologyCounts) -> mdstream_core::Result<SmallSystem> {
    let atoms = sizing.padded_atoms as usize;
    let randoms = counts.total_randoms as usize;
    Ok(SmallSystem {
        posq: device.stream(atoms, 1, "posq")?,
        velm4: device.stream(atoms, 1, "velm4")?,
        force4: device.stream(sizing.stride as usize, sizing.output_buffers as usize, "force4")?,
        work_unit: device.stream(sizing.work_units as usize, 1, "work_unit")?,
        bond_id: device.stream(counts.bonds as usize, 1, "bond_id")?,
        bond_parameter: device.stream(counts.bonds as usize, 1, "bond_parameter")?,
        lincs_atoms: device.stream(counts.lincs_constraints as usize, 1, "lincs_atoms")?,
        lincs_distance: device.stream(counts.lincs_constraints as usize, 1, "lincs_distance")?,
        random4: device.stream(randoms, 2, "random4")?,
        random2: device.stream(randoms, 2, "random2")?,
        random_seed: device.stream(
            (sizing.blocks * sizing.random_threads_per_block) as usize,
            1,
            "random_seed",
        )?,
    })
}

fn layout(system: &SmallSystem) -> mdstream_core::Result<SimulationLayout> {
    SimulationLayout::builder(sizing())
        .physical(
            PhysicalConstants::default()
                .with_cutoff(NonbondedMethod::Periodic, 1.0)
                .with_periodic_box(3.0, 3.0, 3.0),
        )
        .integrator(IntegratorConstants::default().with_time_step(0.002))
        .counts(counts())
        .atom_state(AtomState {
            posq: Some(system.posq.device_ref()?),
            velm4: Some(system.velm4.device_ref()?),
            force4: Some(system.force4.device_ref()?),
            ..AtomState::default()
        })
        .bonded(BondedTables {
            bond_id: Some(system.bond_id.device_ref()?),
            bond_parameter: Some(system.bond_parameter.device_ref()?),
            ..BondedTables::default()
        })
        .constraints(ConstraintTables {
            lincs_atoms: Some(system.lincs_atoms.device_ref()?),
            lincs_distance: Some(system.lincs_distance.device_ref()?),
            ..ConstraintTables::default()
        })
        .nonbonded(NonbondedTables {
            work_unit: Some(system.work_unit.device_ref()?),
            ..NonbondedTables::default()
        })
        .random(RandomPool {
            random4a: Some(system.random4.sub_stream_ref(0)?),
            random4b: Some(system.random4.sub_stream_ref(1)?),
            random2a: Some(system.random2.sub_stream_ref(0)?),
            random2b: Some(system.random2.sub_stream_ref(1)?),
            random_seed: Some(system.random_seed.device_ref()?),
            ..RandomPool::default()
        })
        .build()
}

#[test]
fn test_layout_from_live_streams() -> mdstream_core::Result<()> {
    let device = Device::cpu();
    let mut system = allocate(&device, &sizing(), &counts())?;
    upload_all(&mut [&mut system.posq, &mut system.velm4, &mut system.bond_id])?;

    let layout = layout(&system)?;
    let sizing = layout.sizing();
    assert_eq!(sizing.padded_atoms, 96);
    assert_eq!(sizing.work_units, 6);
    assert_eq!(layout.offsets().bond_offset, BONDS);
    assert_eq!(layout.physical().nonbonded_cutoff_sqr, 1.0);
    assert_eq!(
        sizing.launch_config(KernelFamily::Random).total_threads(),
        (sizing.blocks * 384) as u64
    );

    let random = layout.random();
    let a = random.random4a.unwrap();
    let b = random.random4b.unwrap();
    assert_eq!(b.address() - a.address(), system.random4.stride() as u64 * 16);
    assert_eq!(a.handle(), b.handle());
    Ok(())
}

#[test]
fn test_force_buffers_follow_a_collapse() -> mdstream_core::Result<()> {
    let device = Device::cpu();
    let mut system = allocate(&device, &sizing(), &counts())?;
    let before = layout(&system)?;
    let force4 = before.atom_state().force4.unwrap();

    // reduce the per-tile output buffers into one before download
    let buffers = system.force4.sub_streams();
    system.force4.collapse(1, 1)?;
    system.force4.upload()?;

    let after = layout(&system)?;
    let collapsed = after.atom_state().force4.unwrap();
    assert_eq!(collapsed.address(), force4.address());
    assert_eq!(collapsed.len(), force4.len());
    assert_eq!(system.force4.length(), sizing().stride as usize * buffers);
    Ok(())
}

#[test]
fn test_dropped_table_is_reported() {
    let device = Device::cpu();
    let mut system = allocate(&device, &sizing(), &counts()).unwrap();
    system.lincs_distance.deallocate().unwrap();

    let err = layout(&system).unwrap_err();
    assert!(matches!(err, Error::NotResident { ref stream } if stream == "lincs_distance"));

    // a table that is too short for its count is caught at build time
    system.lincs_distance = device.stream(16, 1, "lincs_distance").unwrap();
    match layout(&system) {
        Err(Error::InvalidLayout { violations }) => {
            assert_eq!(violations, vec![format!("lincs_distance: covers 16 entries, {BONDS} declared")]);
        }
        other => panic!("expected InvalidLayout, got {other:?}"),
    }
}
