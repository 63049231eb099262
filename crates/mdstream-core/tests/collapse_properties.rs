//! Property tests for collapse and stream comparison

use mdstream_core::{compare_streams, Device, ResidentStream};
use proptest::prelude::*;

/// Stream whose logical element at `(i, j)` is `j * 10_000 + i`
fn labelled(device: &Device, length: usize, sub_streams: usize) -> ResidentStream<i32> {
    let mut stream = device.stream::<i32>(length, sub_streams, "labelled").unwrap();
    for j in 0..sub_streams {
        let values: Vec<i32> = (0..length).map(|i| (j * 10_000 + i) as i32).collect();
        stream.write_sub_stream(j, &values).unwrap();
    }
    stream
}

fn logical_values(stream: &ResidentStream<i32>) -> Vec<i32> {
    (0..stream.sub_streams())
        .flat_map(|j| stream.sub_stream(j).to_vec())
        .collect()
}

/// `(length, sub_streams, new_sub_streams, interleave)` that collapse cleanly
///
/// Either the new sub-streams evenly group the old ones, or the length is a
/// multiple of `new_sub_streams * interleave * 16`; both keep the new stride a
/// whole, aligned share of the extent.
fn collapsible_shapes() -> impl Strategy<Value = (usize, usize, usize, usize)> {
    let grouping = (1usize..6, 1usize..4, 1usize..4, 1usize..40).prop_map(|(new_sub_streams, group, interleave, units)| {
        (units * interleave, new_sub_streams * group, new_sub_streams, interleave)
    });
    let aligned = (1usize..6, 1usize..6, 1usize..4, 1usize..4).prop_map(|(sub_streams, new_sub_streams, interleave, units)| {
        (units * new_sub_streams * interleave * 16, sub_streams, new_sub_streams, interleave)
    });
    prop_oneof![grouping, aligned]
}

proptest! {
    #[test]
    fn collapse_conserves_logical_values((length, sub_streams, new_sub_streams, interleave) in collapsible_shapes()) {
        let device = Device::cpu();
        let mut stream = labelled(&device, length, sub_streams);
        let mut before = logical_values(&stream);

        stream.collapse(new_sub_streams, interleave).unwrap();
        let mut after = logical_values(&stream);

        before.sort_unstable();
        after.sort_unstable();
        prop_assert_eq!(before, after);
        prop_assert_eq!(stream.length() * stream.sub_streams(), length * sub_streams);
    }

    #[test]
    fn collapse_round_trip_restores_sub_streams((length, sub_streams, new_sub_streams, _) in collapsible_shapes()) {
        let device = Device::cpu();
        let mut stream = labelled(&device, length, sub_streams);
        let original: Vec<Vec<i32>> = (0..sub_streams).map(|j| stream.sub_stream(j).to_vec()).collect();

        stream.collapse(new_sub_streams, 1).unwrap();
        stream.collapse(sub_streams, 1).unwrap();

        prop_assert_eq!(stream.length(), length);
        for (j, expected) in original.iter().enumerate() {
            prop_assert_eq!(stream.sub_stream(j), expected.as_slice());
        }
    }

    #[test]
    fn collapse_preserves_extent_and_zeroes_padding(
        (length, sub_streams, new_sub_streams, interleave) in collapsible_shapes(),
    ) {
        let device = Device::cpu();
        let mut stream = labelled(&device, length, sub_streams);
        let extent = stream.extent();
        stream.fill(-1);
        for j in 0..sub_streams {
            let values: Vec<i32> = (0..stream.length()).map(|i| i as i32).collect();
            stream.write_sub_stream(j, &values).unwrap();
        }

        stream.collapse(new_sub_streams, interleave).unwrap();
        prop_assert_eq!(stream.extent(), extent);
        prop_assert_eq!(stream.stride() % 16, 0);
        let shape = stream.shape();
        for (index, &value) in stream.as_slice().iter().enumerate() {
            if shape.is_padding(index) {
                prop_assert_eq!(value, 0, "padding slot {} not zeroed", index);
            } else {
                prop_assert!(value >= 0);
            }
        }
    }

    #[test]
    fn collapse_never_changes_the_extent(length in 0usize..200, sub_streams in 1usize..6, new_sub_streams in 1usize..9, interleave in 1usize..4) {
        let device = Device::cpu();
        let mut stream = labelled(&device, length, sub_streams);
        let extent = stream.extent();
        let before = stream.as_slice().to_vec();

        match stream.collapse(new_sub_streams, interleave) {
            Ok(()) => {
                prop_assert_eq!(stream.extent(), extent);
                prop_assert_eq!(stream.stride() * new_sub_streams, extent);
                prop_assert_eq!(stream.stride() % 16, 0);
            }
            Err(_) => {
                prop_assert_eq!(stream.sub_streams(), sub_streams);
                prop_assert_eq!(stream.as_slice(), before.as_slice());
            }
        }
    }

    #[test]
    fn comparing_a_stream_with_itself_is_exact(values in prop::collection::vec(-1.0e6f32..1.0e6, 1..200), sub_streams in 1usize..4) {
        let device = Device::cpu();
        let mut a = device.stream::<f32>(values.len(), sub_streams, "a").unwrap();
        for j in 0..sub_streams {
            a.write_sub_stream(j, &values).unwrap();
        }

        let cmp = compare_streams(&a, &a, 0.0, 0).unwrap();
        prop_assert!(cmp.within_tolerance());
        prop_assert_eq!(cmp.max_error, 0.0);
        prop_assert_eq!(cmp.compared, values.len() * sub_streams);
    }

    #[test]
    fn any_difference_exceeds_zero_tolerance(
        values in prop::collection::vec(-1.0e3f32..1.0e3, 1..100),
        pick in any::<prop::sample::Index>(),
        delta in 0.5f32..10.0,
    ) {
        let device = Device::cpu();
        let mut a = device.stream::<f32>(values.len(), 1, "a").unwrap();
        let mut b = device.stream::<f32>(values.len(), 1, "b").unwrap();
        a.write_sub_stream(0, &values).unwrap();
        b.write_sub_stream(0, &values).unwrap();

        let index = pick.index(values.len());
        b[index] += delta;

        let cmp = compare_streams(&a, &b, 0.0, 0).unwrap();
        prop_assert!(!cmp.within_tolerance());
        prop_assert_eq!(cmp.exceeded, 1);
        prop_assert_eq!(cmp.max_error_index, Some(index));

        let loose = compare_streams(&a, &b, delta * 2.0, 0).unwrap();
        prop_assert!(loose.within_tolerance());
    }
}
