//! Tolerance comparison of two host-mirrored float streams
//!
//! Used to check a device result (downloaded) against a reference computed
//! on the host. Only logical slots are compared; padding never is.

use crate::error::{Error, Result};
use crate::stream::{ResidentStream, ShapeError};

/// Outcome of [`compare_streams`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamComparison {
    /// Largest absolute difference seen (infinite if exactly one side was NaN)
    pub max_error: f32,
    /// Flat index of the first element reaching `max_error`
    pub max_error_index: Option<usize>,
    /// Logical elements compared
    pub compared: usize,
    /// Elements whose difference exceeded the tolerance
    pub exceeded: usize,
    /// Threshold the differences were checked against
    pub tolerance: f32,
}

impl StreamComparison {
    /// Whether no compared element exceeded the tolerance
    pub fn within_tolerance(&self) -> bool {
        self.exceeded == 0
    }
}

#[inline]
fn difference(a: f32, b: f32) -> f32 {
    if a.to_bits() == b.to_bits() {
        return 0.0;
    }
    let diff = (a - b).abs();
    if diff.is_nan() {
        f32::INFINITY
    } else {
        diff
    }
}

/// Compare the host copies of `a` and `b` element by element
///
/// `max_index` limits the comparison to flat indices below it; `0` compares
/// the whole extent. Both streams must have the same shape.
///
/// ```rust
/// use mdstream_core::{compare_streams, Device};
///
/// # fn main() -> mdstream_core::Result<()> {
/// let device = Device::cpu();
/// let mut reference = device.stream::<f32>(4, 1, "reference")?;
/// let mut result = device.stream::<f32>(4, 1, "result")?;
/// reference.write_sub_stream(0, &[1.0, 2.0, 3.0, 4.0])?;
/// result.write_sub_stream(0, &[1.0, 2.0, 3.1, 4.0])?;
///
/// let cmp = compare_streams(&reference, &result, 0.01, 0)?;
/// assert!(!cmp.within_tolerance());
/// assert_eq!(cmp.max_error_index, Some(2));
/// # Ok(())
/// # }
/// ```
#[tracing::instrument(skip(a, b), fields(a = a.name(), b = b.name()))]
pub fn compare_streams(
    a: &ResidentStream<f32>,
    b: &ResidentStream<f32>,
    tolerance: f32,
    max_index: usize,
) -> Result<StreamComparison> {
    if tolerance.is_nan() || tolerance < 0.0 {
        return Err(Error::InvalidOperation(format!(
            "tolerance must be a non-negative number, got {tolerance}"
        )));
    }
    if a.shape() != b.shape() {
        return Err(Error::shape(
            a.name(),
            ShapeError::Mismatch {
                left: a.shape(),
                right: b.shape(),
            },
        ));
    }

    let shape = a.shape();
    let (left, right) = (a.as_slice(), b.as_slice());
    let extent = left.len().min(right.len());
    let limit = if max_index == 0 { extent } else { max_index.min(extent) };

    let mut result = StreamComparison {
        max_error: 0.0,
        max_error_index: None,
        compared: 0,
        exceeded: 0,
        tolerance,
    };

    for (index, (&x, &y)) in left[..limit].iter().zip(&right[..limit]).enumerate() {
        if shape.is_padding(index) {
            continue;
        }
        let diff = difference(x, y);
        result.compared += 1;
        if diff > tolerance {
            result.exceeded += 1;
        }
        if diff > result.max_error {
            result.max_error = diff;
            result.max_error_index = Some(index);
        }
    }

    if !result.within_tolerance() {
        mdstream_tracing::perf_event!(
            "streams_differ",
            max_error = result.max_error,
            exceeded = result.exceeded,
            compared = result.compared
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Device, ErrorKind};

    fn pair(length: usize, sub_streams: usize) -> (ResidentStream<f32>, ResidentStream<f32>) {
        let device = Device::cpu();
        (
            device.stream(length, sub_streams, "a").unwrap(),
            device.stream(length, sub_streams, "b").unwrap(),
        )
    }

    #[test]
    fn test_identical_streams_match() {
        let (mut a, mut b) = pair(20, 2);
        for (i, v) in a.as_mut_slice().iter_mut().enumerate() {
            *v = i as f32 * 0.25;
        }
        b.as_mut_slice().copy_from_slice(a.as_slice());

        let cmp = compare_streams(&a, &b, 0.0, 0).unwrap();
        assert!(cmp.within_tolerance());
        assert_eq!(cmp.max_error, 0.0);
        assert_eq!(cmp.compared, 40);
    }

    #[test]
    fn test_padding_is_skipped() {
        let (mut a, b) = pair(20, 2);
        a[25] = 1000.0;
        a[63] = -1000.0;
        let cmp = compare_streams(&a, &b, 0.0, 0).unwrap();
        assert!(cmp.within_tolerance());
    }

    #[test]
    fn test_max_index_limits_the_range() {
        let (mut a, b) = pair(20, 2);
        a[40] = 5.0;
        assert!(compare_streams(&a, &b, 0.0, 40).unwrap().within_tolerance());

        let cmp = compare_streams(&a, &b, 0.0, 41).unwrap();
        assert_eq!(cmp.exceeded, 1);
        assert_eq!(cmp.max_error, 5.0);

        // larger than the extent is clamped
        assert_eq!(compare_streams(&a, &b, 0.0, 1000).unwrap().compared, 40);
    }

    #[test]
    fn test_nan_handling() {
        let (mut a, mut b) = pair(4, 1);
        a[0] = f32::NAN;
        b[0] = f32::NAN;
        assert!(compare_streams(&a, &b, 0.0, 0).unwrap().within_tolerance());

        b[0] = 1.0;
        let cmp = compare_streams(&a, &b, 1e6, 0).unwrap();
        assert_eq!(cmp.tolerance, 1e6);
        assert_eq!(cmp.max_error, f32::INFINITY);
        assert!(!cmp.within_tolerance());
    }

    #[test]
    fn test_shape_mismatch() {
        let device = Device::cpu();
        let a = device.stream::<f32>(20, 2, "a").unwrap();
        let b = device.stream::<f32>(40, 1, "b").unwrap();
        let err = compare_streams(&a, &b, 0.1, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_invalid_tolerance() {
        let (a, b) = pair(4, 1);
        assert!(compare_streams(&a, &b, -1.0, 0).is_err());
        assert!(compare_streams(&a, &b, f32::NAN, 0).is_err());
    }
}
