//! Sub-stream geometry
//!
//! A stream of `length` elements per sub-stream and `sub_streams` parallel
//! sub-streams is laid out as one flat array. Each sub-stream starts at a
//! multiple of `stride`; slots `[length, stride)` are padding.

use std::fmt;

/// Sub-stream capacity is rounded up to a multiple of this many elements
pub const STRIDE_ALIGNMENT: usize = 16;

/// Round `length` up to the sub-stream alignment
///
/// ```rust
/// use mdstream_core::stream::aligned_stride;
///
/// assert_eq!(aligned_stride(0), 0);
/// assert_eq!(aligned_stride(20), 32);
/// assert_eq!(aligned_stride(32), 32);
/// ```
pub const fn aligned_stride(length: usize) -> usize {
    length.div_ceil(STRIDE_ALIGNMENT) * STRIDE_ALIGNMENT
}

/// Shape precondition failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("sub-stream count must be at least 1")]
    ZeroSubStreams,

    #[error("interleave must be at least 1")]
    ZeroInterleave,

    #[error(
        "{elements} logical elements cannot be split into {sub_streams} sub-streams \
         with interleave {interleave}"
    )]
    Indivisible {
        elements: usize,
        sub_streams: usize,
        interleave: usize,
    },

    /// The new stride would not be a whole, aligned share of the flat extent
    #[error(
        "flat extent of {extent} elements cannot be split into {sub_streams} sub-streams \
         of {STRIDE_ALIGNMENT}-aligned stride"
    )]
    UnevenExtent { extent: usize, sub_streams: usize },

    #[error("{sub_streams} sub-streams of {length} elements overflow the address space")]
    Overflow { length: usize, sub_streams: usize },

    #[error("shapes differ: {left} vs {right}")]
    Mismatch { left: StreamShape, right: StreamShape },
}

/// Geometry of a sub-stream partitioned buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamShape {
    /// Logical elements per sub-stream
    pub length: usize,
    /// Number of parallel sub-streams
    pub sub_streams: usize,
    /// Padded capacity per sub-stream
    pub stride: usize,
}

impl StreamShape {
    /// Shape for a freshly constructed stream
    pub fn new(length: usize, sub_streams: usize) -> Result<Self, ShapeError> {
        if sub_streams == 0 {
            return Err(ShapeError::ZeroSubStreams);
        }
        let overflow = ShapeError::Overflow { length, sub_streams };
        let stride = length
            .checked_add(STRIDE_ALIGNMENT - 1)
            .map(|_| aligned_stride(length))
            .ok_or_else(|| overflow.clone())?;
        stride.checked_mul(sub_streams).ok_or(overflow)?;

        Ok(Self {
            length,
            sub_streams,
            stride,
        })
    }

    /// Flat extent: `stride * sub_streams`
    pub const fn extent(&self) -> usize {
        self.stride * self.sub_streams
    }

    /// Logical element count: `length * sub_streams`
    pub const fn logical_elements(&self) -> usize {
        self.length * self.sub_streams
    }

    /// Size of the flat extent in bytes for element type `T`
    pub fn byte_len<T>(&self) -> Result<usize, ShapeError> {
        self.extent()
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(ShapeError::Overflow {
                length: self.length,
                sub_streams: self.sub_streams,
            })
    }

    /// View of sub-stream `index` (covers the full stride, padding included)
    pub const fn view(&self, index: usize) -> StreamView {
        StreamView {
            offset: index * self.stride,
            len: self.stride,
        }
    }

    /// View table, one entry per sub-stream
    pub fn views(&self) -> Vec<StreamView> {
        (0..self.sub_streams).map(|i| self.view(i)).collect()
    }

    /// Whether flat index `index` falls in a padding slot
    pub const fn is_padding(&self, index: usize) -> bool {
        self.stride == 0 || index % self.stride >= self.length
    }

    /// Shape after redistributing the logical elements over `sub_streams`
    /// sub-streams in runs of `interleave`
    ///
    /// The flat extent is preserved; the new stride is `extent / sub_streams`,
    /// which must stay a multiple of [`STRIDE_ALIGNMENT`].
    ///
    /// ```rust
    /// use mdstream_core::stream::StreamShape;
    ///
    /// let shape = StreamShape::new(20, 2).unwrap();
    /// let collapsed = shape.collapsed(1, 1).unwrap();
    /// assert_eq!((collapsed.length, collapsed.stride), (40, 64));
    /// ```
    pub fn collapsed(&self, sub_streams: usize, interleave: usize) -> Result<Self, ShapeError> {
        if sub_streams == 0 {
            return Err(ShapeError::ZeroSubStreams);
        }
        if interleave == 0 {
            return Err(ShapeError::ZeroInterleave);
        }

        let elements = self.logical_elements();
        let indivisible = ShapeError::Indivisible {
            elements,
            sub_streams,
            interleave,
        };
        let run = sub_streams.checked_mul(interleave).ok_or_else(|| indivisible.clone())?;
        if elements % run != 0 {
            return Err(indivisible);
        }

        let extent = self.extent();
        let uneven = ShapeError::UnevenExtent { extent, sub_streams };
        let share = sub_streams.checked_mul(STRIDE_ALIGNMENT).ok_or_else(|| uneven.clone())?;
        if extent % share != 0 {
            return Err(uneven);
        }

        Ok(Self {
            length: elements / sub_streams,
            sub_streams,
            stride: extent / sub_streams,
        })
    }
}

impl fmt::Display for StreamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} (stride {})", self.sub_streams, self.length, self.stride)
    }
}

/// Location of one sub-stream inside the flat storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamView {
    /// Element offset from the start of the storage
    pub offset: usize,
    /// Elements covered (the stride)
    pub len: usize,
}

impl StreamView {
    /// Element range covered by this view
    pub const fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_rounds_to_sixteen() {
        for (length, stride) in [(0, 0), (1, 16), (15, 16), (16, 16), (17, 32), (1000, 1008)] {
            let shape = StreamShape::new(length, 3).unwrap();
            assert_eq!(shape.stride, stride, "length {length}");
            assert_eq!(shape.extent(), stride * 3);
        }
    }

    #[test]
    fn test_zero_sub_streams_rejected() {
        assert_eq!(StreamShape::new(10, 0), Err(ShapeError::ZeroSubStreams));
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(matches!(StreamShape::new(usize::MAX, 1), Err(ShapeError::Overflow { .. })));
        assert!(matches!(StreamShape::new(1 << 40, 1 << 40), Err(ShapeError::Overflow { .. })));
        let huge = StreamShape::new(usize::MAX / 8, 1).unwrap();
        assert!(huge.byte_len::<[f32; 4]>().is_err());
    }

    #[test]
    fn test_views_tile_the_extent() {
        let shape = StreamShape::new(20, 3).unwrap();
        let views = shape.views();
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].range(), 0..32);
        assert_eq!(views[2].range(), 64..96);
    }

    #[test]
    fn test_padding_detection() {
        let shape = StreamShape::new(20, 2).unwrap();
        assert!(!shape.is_padding(19));
        assert!(shape.is_padding(20));
        assert!(shape.is_padding(31));
        assert!(!shape.is_padding(32));
        assert!(shape.is_padding(52));
    }

    #[test]
    fn test_collapsed_shape() {
        let shape = StreamShape::new(20, 2).unwrap();

        let one = shape.collapsed(1, 1).unwrap();
        assert_eq!(one, StreamShape { length: 40, sub_streams: 1, stride: 64 });

        let four = shape.collapsed(4, 1).unwrap();
        assert_eq!(four, StreamShape { length: 10, sub_streams: 4, stride: 16 });
        assert_eq!(four.extent(), shape.extent());

        assert_eq!(shape.collapsed(0, 1), Err(ShapeError::ZeroSubStreams));
        assert_eq!(shape.collapsed(1, 0), Err(ShapeError::ZeroInterleave));
        assert!(matches!(shape.collapsed(3, 1), Err(ShapeError::Indivisible { elements: 40, .. })));
        assert!(matches!(shape.collapsed(4, 3), Err(ShapeError::Indivisible { .. })));
        assert!(shape.collapsed(4, 2).is_ok());
    }

    #[test]
    fn test_collapse_keeps_extent_and_alignment() {
        // 40 logical elements split five ways, but 64 slots do not
        let shape = StreamShape::new(20, 2).unwrap();
        assert_eq!(
            shape.collapsed(5, 1),
            Err(ShapeError::UnevenExtent { extent: 64, sub_streams: 5 })
        );

        // 16 slots into three sub-streams would give stride 5
        let short = StreamShape::new(3, 1).unwrap();
        assert_eq!(
            short.collapsed(3, 1),
            Err(ShapeError::UnevenExtent { extent: 16, sub_streams: 3 })
        );

        let wide = StreamShape::new(24, 8).unwrap();
        for n in [1, 2, 4, 8, 16] {
            let to = wide.collapsed(n, 1).unwrap();
            assert_eq!(to.extent(), wide.extent(), "collapse to {n}");
            assert_eq!(to.stride % STRIDE_ALIGNMENT, 0, "collapse to {n}");
        }
        assert!(matches!(wide.collapsed(32, 1), Err(ShapeError::UnevenExtent { .. })));
    }

    #[test]
    fn test_empty_stream_collapses_anywhere() {
        let empty = StreamShape::new(0, 3).unwrap();
        let to = empty.collapsed(7, 2).unwrap();
        assert_eq!((to.length, to.stride, to.extent()), (0, 0, 0));
    }

    #[test]
    fn test_display() {
        let shape = StreamShape::new(20, 2).unwrap();
        assert_eq!(shape.to_string(), "2x20 (stride 32)");
    }
}
