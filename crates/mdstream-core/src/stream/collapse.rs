//! Round-robin redistribution of sub-streams
//!
//! Logical elements are read in row-major `(i, j)` order, element `i` of every
//! sub-stream before element `i + 1` of any, and dealt out to the target
//! sub-streams in runs of `interleave`. With `interleave == 1` the target
//! sub-stream changes on every element and the write position advances once
//! per full cycle, so collapsing `[a0 a1 ..] [b0 b1 ..]` into one sub-stream
//! gives `a0 b0 a1 b1 ..`.
//!
//! ```text
//! from: 2 x 20, stride 32            to: 1 x 40, stride 64
//!
//! [ 0  1 .. 19 | pad ]               [ 0 100 1 101 .. 19 119 | pad ]
//! [100 101 ..119 | pad ]
//! ```

use super::shape::StreamShape;

/// Flat index in `to` that receives the `n`th logical element
#[inline]
pub(crate) fn destination(n: usize, to: &StreamShape, interleave: usize) -> usize {
    let run = n / interleave;
    let sub_stream = run % to.sub_streams;
    let position = (run / to.sub_streams) * interleave + n % interleave;
    sub_stream * to.stride + position
}

/// Deal the logical elements of `src` (laid out as `from`) into `scratch`
/// (laid out as `to`)
///
/// `scratch` must be `to.extent()` long and is expected to be zeroed; padding
/// slots are left as they are. The caller validates `to` with
/// [`StreamShape::collapsed`].
pub(crate) fn interleave_into<T: Copy>(
    src: &[T],
    from: &StreamShape,
    to: &StreamShape,
    interleave: usize,
    scratch: &mut [T],
) {
    debug_assert_eq!(scratch.len(), to.extent());
    debug_assert_eq!(from.logical_elements(), to.logical_elements());

    let mut n = 0;
    for i in 0..from.length {
        for j in 0..from.sub_streams {
            scratch[destination(n, to, interleave)] = src[j * from.stride + i];
            n += 1;
        }
    }
}
