use super::{Sample, SampleType};
use crate::Real;
use ndarray::Array2;
use std::ops::Range;
use trace_aligner_common::TraceIndex;

/// A `[trace, sample]` array kept in its native element type.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelArray {
    Uint8(Array2<u8>),
    Int8(Array2<i8>),
    Uint16(Array2<u16>),
    Int16(Array2<i16>),
    Uint32(Array2<u32>),
    Int32(Array2<i32>),
    Float32(Array2<f32>),
    Float64(Array2<f64>),
}

/// Evaluates `$body` with `$array` bound to the typed array inside `$self`.
macro_rules! with_array {
    ($self:expr, $array:ident => $body:expr) => {
        match $self {
            ChannelArray::Uint8($array) => $body,
            ChannelArray::Int8($array) => $body,
            ChannelArray::Uint16($array) => $body,
            ChannelArray::Int16($array) => $body,
            ChannelArray::Uint32($array) => $body,
            ChannelArray::Int32($array) => $body,
            ChannelArray::Float32($array) => $body,
            ChannelArray::Float64($array) => $body,
        }
    };
}
pub(crate) use with_array;

/// One row of a gather: the source trace and the sample range taken from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowSlice {
    pub trace: TraceIndex,
    pub samples: Range<usize>,
}

impl ChannelArray {
    pub fn from_array<T: Sample>(array: Array2<T>) -> Self {
        T::wrap(array)
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            ChannelArray::Uint8(_) => SampleType::Uint8,
            ChannelArray::Int8(_) => SampleType::Int8,
            ChannelArray::Uint16(_) => SampleType::Uint16,
            ChannelArray::Int16(_) => SampleType::Int16,
            ChannelArray::Uint32(_) => SampleType::Uint32,
            ChannelArray::Int32(_) => SampleType::Int32,
            ChannelArray::Float32(_) => SampleType::Float32,
            ChannelArray::Float64(_) => SampleType::Float64,
        }
    }

    pub fn trace_count(&self) -> usize {
        with_array!(self, array => array.nrows())
    }

    pub fn samples_per_trace(&self) -> usize {
        with_array!(self, array => array.ncols())
    }

    /// The samples of one trace, widened to [Real].
    pub fn row(&self, trace: TraceIndex) -> Option<Vec<Real>> {
        with_array!(self, array => (trace < array.nrows())
            .then(|| array.row(trace).iter().map(|&v| v.into()).collect()))
    }

    /// Builds a new array whose rows are the given slices of this one, in order.
    /// Every slice must be in bounds and `width` samples long.
    pub(crate) fn gather(&self, rows: &[RowSlice], width: usize) -> Self {
        with_array!(self, array => Self::from_array(gather_rows(array, rows, width)))
    }

    /// Little-endian, row-major bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        with_array!(self, array => {
            let mut out = Vec::new();
            for row in array.rows() {
                encode_row(&row.to_vec(), &mut out);
            }
            out
        })
    }

    /// Inverse of [Self::to_le_bytes] for `traces` rows of `length` samples.
    pub fn from_le_bytes(
        sample_type: SampleType,
        bytes: &[u8],
        traces: usize,
        length: usize,
    ) -> Option<Self> {
        fn decode<T: Sample>(bytes: &[u8], traces: usize, length: usize) -> Option<ChannelArray> {
            Array2::from_shape_vec((traces, length), T::decode_le(bytes))
                .ok()
                .map(T::wrap)
        }
        match sample_type {
            SampleType::Uint8 => decode::<u8>(bytes, traces, length),
            SampleType::Int8 => decode::<i8>(bytes, traces, length),
            SampleType::Uint16 => decode::<u16>(bytes, traces, length),
            SampleType::Int16 => decode::<i16>(bytes, traces, length),
            SampleType::Uint32 => decode::<u32>(bytes, traces, length),
            SampleType::Int32 => decode::<i32>(bytes, traces, length),
            SampleType::Float32 => decode::<f32>(bytes, traces, length),
            SampleType::Float64 => decode::<f64>(bytes, traces, length),
        }
    }
}

fn encode_row<T: Sample>(row: &[T], out: &mut Vec<u8>) {
    T::encode_le(row, out)
}

fn gather_rows<T: Sample>(array: &Array2<T>, rows: &[RowSlice], width: usize) -> Array2<T> {
    Array2::from_shape_fn((rows.len(), width), |(r, c)| {
        rows.get(r)
            .map(|slice| array[[slice.trace, slice.samples.start + c]])
            .unwrap_or_default()
    })
}
