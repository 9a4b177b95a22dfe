use super::SampleFormat;
use crate::tiff::Endian;
use std::fmt::Debug;

/// Pixel types a GeoTIFF band can hold.
pub trait Sample: Copy + PartialEq + PartialOrd + Debug + Default + Send + Sync + 'static {
    const FORMAT: SampleFormat;
    const BITS: u16;

    fn to_f64(self) -> f64;

    /// Saturating cast; NaN becomes zero for integer types.
    fn from_f64(value: f64) -> Self;

    fn decode_all(endian: Endian, bytes: &[u8]) -> Option<Vec<Self>>;

    fn encode_all(endian: Endian, values: &[Self]) -> Vec<u8>;

    fn to_f32(self) -> f32 {
        self.to_f64() as f32
    }
}

impl Sample for u8 {
    const FORMAT: SampleFormat = SampleFormat::Unsigned;
    const BITS: u16 = 8;

    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value as u8
    }
    fn decode_all(_: Endian, bytes: &[u8]) -> Option<Vec<Self>> {
        Some(bytes.to_vec())
    }
    fn encode_all(_: Endian, values: &[Self]) -> Vec<u8> {
        values.to_vec()
    }
}

impl Sample for i8 {
    const FORMAT: SampleFormat = SampleFormat::Signed;
    const BITS: u16 = 8;

    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value as i8
    }
    fn decode_all(_: Endian, bytes: &[u8]) -> Option<Vec<Self>> {
        Some(bytes.iter().map(|b| *b as i8).collect())
    }
    fn encode_all(_: Endian, values: &[Self]) -> Vec<u8> {
        values.iter().map(|v| *v as u8).collect()
    }
}

macro_rules! impl_sample {
    ($t:ty, $n:literal, $format:expr) => {
        impl Sample for $t {
            const FORMAT: SampleFormat = $format;
            const BITS: u16 = $n * 8;

            fn to_f64(self) -> f64 {
                self as f64
            }
            fn from_f64(value: f64) -> Self {
                value as $t
            }
            fn decode_all(endian: Endian, bytes: &[u8]) -> Option<Vec<Self>> {
                endian.decode_all::<$n, $t>(bytes)
            }
            fn encode_all(endian: Endian, values: &[Self]) -> Vec<u8> {
                endian.encode_all::<$n, $t>(values)
            }
        }
    };
}

impl_sample!(u16, 2, SampleFormat::Unsigned);
impl_sample!(i16, 2, SampleFormat::Signed);
impl_sample!(u32, 4, SampleFormat::Unsigned);
impl_sample!(i32, 4, SampleFormat::Signed);
impl_sample!(f32, 4, SampleFormat::Float);
impl_sample!(f64, 8, SampleFormat::Float);

/// Equality that treats every NaN as the same nodata value.
pub fn same_value(value: f64, nodata: f64) -> bool {
    value == nodata || (value.is_nan() && nodata.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_casts() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-4.0), 0);
        assert_eq!(i16::from_f64(f64::NAN), 0);
        assert!(f32::from_f64(f64::NAN).is_nan());
    }

    #[test]
    fn test_codec_by_type() {
        let bytes = i16::encode_all(Endian::Big, &[-2, 300]);
        assert_eq!(bytes, vec![0xFF, 0xFE, 0x01, 0x2C]);
        assert_eq!(i16::decode_all(Endian::Big, &bytes), Some(vec![-2, 300]));
        assert_eq!(<f64 as Sample>::BITS, 64);
    }

    #[test]
    fn test_nan_nodata_matches() {
        assert!(same_value(f64::NAN, f64::NAN));
        assert!(same_value(-9999.0, -9999.0));
        assert!(!same_value(0.0, f64::NAN));
    }
}
