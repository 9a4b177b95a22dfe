use super::{Tag, TagType};
use std::fmt::Display;

/// Human readable view of a tag, used by `info`.
pub enum TagValue {
    Empty,
    String(String),
    Number(f64),
    Array(Vec<f64>),
    Undefined,
}

impl Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_num = |v: f64| {
            if v.fract() == 0.0 && v.abs() < 1e15 {
                format!("{}", v as i64)
            } else {
                format!("{v}")
            }
        };
        match self {
            TagValue::Empty => write!(f, ""),
            TagValue::String(s) => write!(f, "{}", s.replace('\n', "\\n")),
            TagValue::Number(v) => write!(f, "{}", fmt_num(*v)),
            TagValue::Array(arr) => {
                let items: Vec<String> = arr.iter().map(|v| fmt_num(*v)).collect();
                write!(f, "[{}]", items.join(", "))
            }
            TagValue::Undefined => write!(f, "Undefined"),
        }
    }
}

impl From<&Tag> for TagValue {
    fn from(tag: &Tag) -> TagValue {
        if tag.data.is_empty() {
            return TagValue::Empty;
        }
        match tag.datatype {
            TagType::Ascii => tag
                .try_to_string()
                .map(TagValue::String)
                .unwrap_or(TagValue::Undefined),
            TagType::Undefined | TagType::Unknown => TagValue::Undefined,
            _ => match tag.values::<f64>() {
                Some(values) if values.len() == 1 => TagValue::Number(values[0]),
                Some(values) => TagValue::Array(values),
                None => TagValue::Undefined,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiff::{Endian, TagData, TagId};

    #[test]
    fn test_display_formats_integers_and_floats() {
        let tag = Tag::new(
            TagId::ModelPixelScale,
            TagData::Double(vec![30.0, 0.5, 0.0]),
            Endian::Little,
        );
        assert_eq!(format!("{}", TagValue::from(&tag)), "[30, 0.5, 0]");
    }
}
