// refs
// https://www.itu.int/itudoc/itu-t/com16/tiff-fx/docs/tiff6.pdf
// https://www.awaresystems.be/imaging/tiff/bigtiff.html

use super::Endian;
use num_enum::{FromPrimitive, IntoPrimitive};
use num_traits::NumCast;
use std::fmt::Display;

mod data;
mod id;
mod value;

pub use data::TagData;
pub use id::TagId;
pub use value::TagValue;

#[derive(Clone, Debug)]
pub struct Tag {
    pub code: u16,
    pub datatype: TagType,
    pub count: usize,
    pub data: Vec<u8>,
    pub endian: Endian,
}

impl Tag {
    pub fn new(id: TagId, data: TagData, endian: Endian) -> Self {
        Self {
            code: id.into(),
            datatype: data.tag_type(),
            count: data.len(),
            data: data.bytes(endian),
            endian,
        }
    }

    pub fn id(&self) -> Option<TagId> {
        TagId::try_from(self.code).ok()
    }

    /// Numeric values coerced into `T`, `None` for text and opaque tags.
    pub fn values<T: NumCast>(&self) -> Option<Vec<T>> {
        let endian = self.endian;
        let data = self.data.as_slice();
        match self.datatype {
            TagType::Byte => data.iter().map(|v| T::from(*v)).collect(),
            TagType::SByte => data.iter().map(|v| T::from(*v as i8)).collect(),
            TagType::Short => cast_all(endian.decode_all::<2, u16>(data)?),
            TagType::SShort => cast_all(endian.decode_all::<2, i16>(data)?),
            TagType::Long | TagType::Ifd => cast_all(endian.decode_all::<4, u32>(data)?),
            TagType::SLong => cast_all(endian.decode_all::<4, i32>(data)?),
            TagType::Long8 | TagType::Ifd8 => cast_all(endian.decode_all::<8, u64>(data)?),
            TagType::SLong8 => cast_all(endian.decode_all::<8, i64>(data)?),
            TagType::Float => cast_all(endian.decode_all::<4, f32>(data)?),
            TagType::Double => cast_all(endian.decode_all::<8, f64>(data)?),
            TagType::Rational => {
                let parts = endian.decode_all::<4, u32>(data)?;
                parts
                    .chunks_exact(2)
                    .map(|r| T::from(r[0] as f64 / r[1] as f64))
                    .collect()
            }
            TagType::SRational => {
                let parts = endian.decode_all::<4, i32>(data)?;
                parts
                    .chunks_exact(2)
                    .map(|r| T::from(r[0] as f64 / r[1] as f64))
                    .collect()
            }
            TagType::Ascii | TagType::Undefined | TagType::Unknown => None,
        }
    }

    pub fn value<T: NumCast + Copy>(&self) -> Option<T> {
        self.values()?.first().copied()
    }

    pub fn try_to_string(&self) -> Option<String> {
        match self.datatype {
            TagType::Ascii => String::from_utf8(self.data.clone())
                .ok()
                .map(|s| s.trim_end_matches('\0').to_string()),
            _ => None,
        }
    }
}

fn cast_all<A: num_traits::ToPrimitive, T: NumCast>(values: Vec<A>) -> Option<Vec<T>> {
    values.into_iter().map(|v| T::from(v)).collect()
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut value_string = format!("{}", TagValue::from(self));
        if value_string.len() > 100 {
            let cut = (0..=98)
                .rev()
                .find(|i| value_string.is_char_boundary(*i))
                .unwrap_or(0);
            value_string = format!("{}...", &value_string[..cut])
        }
        let id_string = match self.id() {
            Some(id) => format!("{id:?}"),
            None => format!("Unknown({})", self.code),
        };
        write!(
            f,
            "{} {:?}[{}]: {}",
            id_string, self.datatype, self.count, value_string
        )
    }
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum TagType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
    Ifd = 13,
    Long8 = 16,
    SLong8 = 17,
    Ifd8 = 18,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

impl TagType {
    pub fn size_in_bytes(&self) -> usize {
        match self {
            TagType::Byte | TagType::Ascii | TagType::SByte | TagType::Undefined => 1,
            TagType::Short | TagType::SShort => 2,
            TagType::Long | TagType::SLong | TagType::Float | TagType::Ifd => 4,
            TagType::Rational | TagType::SRational | TagType::Double => 8,
            TagType::Long8 | TagType::SLong8 | TagType::Ifd8 => 8,
            TagType::Unknown => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_coerce_between_numeric_types() {
        let tag = Tag::new(TagId::ImageWidth, TagData::Short(vec![256, 512]), Endian::Big);
        assert_eq!(tag.count, 2);
        assert_eq!(tag.values::<u32>(), Some(vec![256, 512]));
        assert_eq!(tag.values::<f64>(), Some(vec![256.0, 512.0]));
        assert_eq!(tag.value::<u64>(), Some(256));
    }

    #[test]
    fn test_ascii_tag_round_trips_without_terminator() {
        let tag = Tag::new(TagId::GDALNoData, TagData::from_string("-9999"), Endian::Little);
        assert_eq!(tag.count, 6);
        assert_eq!(tag.try_to_string().as_deref(), Some("-9999"));
        assert_eq!(tag.values::<f64>(), None);
    }

    #[test]
    fn test_rational_values_are_divided() {
        let tag = Tag::new(
            TagId::XResolution,
            TagData::Rational(vec![(300, 2)]),
            Endian::Little,
        );
        assert_eq!(tag.value::<f64>(), Some(150.0));
    }
}
