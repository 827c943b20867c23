use super::ChannelArray;
use crate::{FormatError, Real};
use ndarray::Array2;
use ndarray_npy::{ReadableElement, WritableElement};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/// Native element type of a channel, named as numpy names it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum SampleType {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float32,
    Float64,
}

impl SampleType {
    pub fn item_size(self) -> usize {
        match self {
            SampleType::Uint8 | SampleType::Int8 => 1,
            SampleType::Uint16 | SampleType::Int16 => 2,
            SampleType::Uint32 | SampleType::Int32 | SampleType::Float32 => 4,
            SampleType::Float64 => 8,
        }
    }

    /// Parses a numpy dtype name such as `int8` or `float32`.
    pub fn from_dtype(dtype: &str) -> Result<Self, FormatError> {
        SampleType::from_str(dtype.trim())
            .map_err(|_| FormatError::UnsupportedSampleType(dtype.to_owned()))
    }

    /// Parses the `descr` field of an npy header, e.g. `<i2` or `|u1`.
    /// Big-endian descriptors are rejected.
    pub fn from_npy_descr(descr: &str) -> Result<Self, FormatError> {
        let unsupported = || FormatError::UnsupportedSampleType(descr.to_owned());
        let (order, code) = descr.split_at_checked(1).ok_or_else(unsupported)?;
        if !matches!(order, "<" | "|" | "=") {
            return Err(unsupported());
        }
        match code {
            "u1" => Ok(SampleType::Uint8),
            "i1" => Ok(SampleType::Int8),
            "u2" => Ok(SampleType::Uint16),
            "i2" => Ok(SampleType::Int16),
            "u4" => Ok(SampleType::Uint32),
            "i4" => Ok(SampleType::Int32),
            "f4" => Ok(SampleType::Float32),
            "f8" => Ok(SampleType::Float64),
            _ => Err(unsupported()),
        }
    }
}

/// An element type that can back a [ChannelArray].
pub trait Sample:
    Copy + Default + Send + Sync + Into<Real> + ReadableElement + WritableElement + 'static
{
    const SAMPLE_TYPE: SampleType;

    /// Decodes little-endian bytes, ignoring a trailing partial element.
    fn decode_le(bytes: &[u8]) -> Vec<Self>;

    fn encode_le(values: &[Self], out: &mut Vec<u8>);

    /// Saturating conversion, used when synthesising data.
    fn from_real(value: Real) -> Self;

    fn wrap(array: Array2<Self>) -> ChannelArray;
}

macro_rules! impl_sample {
    ($t:ty, $variant:ident) => {
        impl Sample for $t {
            const SAMPLE_TYPE: SampleType = SampleType::$variant;

            fn decode_le(bytes: &[u8]) -> Vec<Self> {
                bytes
                    .chunks_exact(size_of::<Self>())
                    .filter_map(|chunk| chunk.try_into().ok())
                    .map(<$t>::from_le_bytes)
                    .collect()
            }

            fn encode_le(values: &[Self], out: &mut Vec<u8>) {
                out.reserve(values.len() * size_of::<Self>());
                for value in values {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }

            fn from_real(value: Real) -> Self {
                value as $t
            }

            fn wrap(array: Array2<Self>) -> ChannelArray {
                ChannelArray::$variant(array)
            }
        }
    };
}

impl_sample!(u8, Uint8);
impl_sample!(i8, Int8);
impl_sample!(u16, Uint16);
impl_sample!(i16, Int16);
impl_sample!(u32, Uint32);
impl_sample!(i32, Int32);
impl_sample!(f32, Float32);
impl_sample!(f64, Float64);
