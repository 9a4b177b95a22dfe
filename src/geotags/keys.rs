// https://docs.ogc.org/is/19-008r4/19-008r4.html#_requirements_class_geokeydirectorytag

use super::{GeoKeyId, GeoKeyValue, GeoTiffError};
use crate::tiff::{Endian, Ifd, TagData, TagId, TagType};
use std::fmt::Display;

#[derive(Clone, Debug)]
pub struct GeoKeyDirectory {
    pub version: u16,
    pub revision: (u16, u16),
    pub keys: Vec<GeoKey>,
}

#[derive(Clone, Debug)]
pub struct GeoKey {
    pub code: u16,
    pub value: GeoKeyValue,
}

impl GeoKey {
    pub fn id(&self) -> Option<GeoKeyId> {
        GeoKeyId::try_from(self.code).ok()
    }
}

impl Default for GeoKeyDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoKeyDirectory {
    pub fn new() -> Self {
        Self {
            version: 1,
            revision: (1, 0),
            keys: vec![],
        }
    }

    pub fn parse(ifd: &Ifd) -> Result<Self, GeoTiffError> {
        // Directory is a tiff tag
        let directory_values: Vec<u16> = ifd
            .get_tag(TagId::GeoKeyDirectory)
            .map_err(|_| GeoTiffError::MissingTag(TagId::GeoKeyDirectory))?
            .values()
            .ok_or(GeoTiffError::BadTag(TagId::GeoKeyDirectory))?;

        // Directory header
        let [version, revision, minor_revision, key_count] = directory_values
            .get(..4)
            .and_then(|header| <[u16; 4]>::try_from(header).ok())
            .ok_or(GeoTiffError::BadTag(TagId::GeoKeyDirectory))?;

        let min_valid_directory_size = 4 + key_count as usize * 4;
        if directory_values.len() < min_valid_directory_size {
            return Err(GeoTiffError::BadTag(TagId::GeoKeyDirectory));
        }

        // Parse keys
        let keys: Vec<GeoKey> = (0..key_count as usize)
            .map(|i| {
                let entry_offset = (i + 1) * 4;
                let code = directory_values[entry_offset];
                let location = directory_values[entry_offset + 1];
                let count = directory_values[entry_offset + 2] as usize;
                let offset = directory_values[entry_offset + 3] as usize;

                let value = if location == 0 {
                    GeoKeyValue::Short(vec![offset as u16])
                } else {
                    let range = offset..offset + count;
                    ifd.get_tag_by_code(location)
                        .and_then(|tag| match tag.datatype {
                            TagType::Ascii => tag.try_to_string().and_then(|s| {
                                s.get(range).map(|v| {
                                    GeoKeyValue::Ascii(
                                        v.trim_end_matches(|c| c == '|' || c == '\0').to_string(),
                                    )
                                })
                            }),
                            TagType::Short => tag
                                .values::<u16>()
                                .and_then(|v| v.get(range).map(|v| GeoKeyValue::Short(v.to_vec()))),
                            TagType::Double => tag
                                .values::<f64>()
                                .and_then(|v| v.get(range).map(|v| GeoKeyValue::Double(v.to_vec()))),
                            _ => None,
                        })
                        .unwrap_or(GeoKeyValue::Undefined)
                };

                GeoKey { code, value }
            })
            .collect();

        Ok(Self {
            version,
            revision: (revision, minor_revision),
            keys,
        })
    }

    pub fn get(&self, id: GeoKeyId) -> Option<&GeoKeyValue> {
        let code: u16 = id.into();
        self.keys.iter().find(|key| key.code == code).map(|key| &key.value)
    }

    /// Inserts or replaces a key, keeping keys sorted by code.
    pub fn set(&mut self, id: GeoKeyId, value: GeoKeyValue) {
        let key = GeoKey {
            code: id.into(),
            value,
        };
        match self.keys.binary_search_by_key(&key.code, |k| k.code) {
            Ok(index) => self.keys[index] = key,
            Err(index) => self.keys.insert(index, key),
        }
    }

    pub fn add_to_ifd(&self, ifd: &mut Ifd, endian: Endian) {
        let (key_directory, mut ascii_params, double_params) = self.unparse();
        ifd.set_tag(
            TagId::GeoKeyDirectory,
            TagData::Short(key_directory),
            endian,
        );
        if !ascii_params.is_empty() {
            ascii_params.push(0);
            ifd.set_tag(TagId::GeoAsciiParams, TagData::Ascii(ascii_params), endian);
        }
        if !double_params.is_empty() {
            ifd.set_tag(
                TagId::GeoDoubleParams,
                TagData::Double(double_params),
                endian,
            );
        }
    }

    pub fn unparse(&self) -> (Vec<u16>, Vec<u8>, Vec<f64>) {
        let mut directory = vec![];
        let mut shorts = vec![];
        let mut asciis = vec![];
        let mut doubles = vec![];
        let dir_size = 4 * (self.keys.len() + 1) as u16;

        // Directory header
        directory.push(self.version);
        directory.push(self.revision.0);
        directory.push(self.revision.1);
        directory.push(self.keys.len() as u16);

        // Keys
        for key in &self.keys {
            directory.push(key.code);

            match &key.value {
                GeoKeyValue::Short(vec) => match vec.len() {
                    0 => directory.extend([0, 0, 0]),
                    1 => directory.extend([0, 1, vec[0]]),
                    n => {
                        directory.push(TagId::GeoKeyDirectory.into());
                        directory.push(n as u16);
                        directory.push(dir_size + shorts.len() as u16);
                        shorts.extend(vec);
                    }
                },
                GeoKeyValue::Ascii(s) => {
                    directory.push(TagId::GeoAsciiParams.into());
                    directory.push(s.len() as u16 + 1);
                    directory.push(asciis.len() as u16);
                    asciis.extend(s.bytes());
                    asciis.push(b'|');
                }
                GeoKeyValue::Double(vec) => {
                    directory.push(TagId::GeoDoubleParams.into());
                    directory.push(vec.len() as u16);
                    directory.push(doubles.len() as u16);
                    doubles.extend(vec);
                }
                GeoKeyValue::Undefined => directory.extend([0, 0, 0]),
            }
        }

        ([directory, shorts].concat(), asciis, doubles)
    }
}

impl Display for GeoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_string = match self.id() {
            Some(id) => format!("{id:?}"),
            None => format!("0x{:04X}", self.code),
        };
        write!(f, "{}: {}", id_string, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_survives_ifd() {
        let mut directory = GeoKeyDirectory::new();
        directory.set(GeoKeyId::ProjectedCSTypeGeoKey, GeoKeyValue::Short(vec![32615]));
        directory.set(GeoKeyId::GTModelTypeGeoKey, GeoKeyValue::Short(vec![1]));
        directory.set(
            GeoKeyId::GTCitationGeoKey,
            GeoKeyValue::Ascii("WGS 84 / UTM zone 15N".into()),
        );
        directory.set(
            GeoKeyId::GeogSemiMajorAxisGeoKey,
            GeoKeyValue::Double(vec![6378137.0]),
        );

        let mut ifd = Ifd::default();
        directory.add_to_ifd(&mut ifd, Endian::Little);
        let parsed = GeoKeyDirectory::parse(&ifd).unwrap();

        assert_eq!(parsed.keys.len(), 4);
        assert_eq!(parsed.keys[0].code, 1024);
        assert_eq!(
            parsed
                .get(GeoKeyId::ProjectedCSTypeGeoKey)
                .and_then(|v| v.as_number::<u16>()),
            Some(32615)
        );
        assert_eq!(
            parsed
                .get(GeoKeyId::GTCitationGeoKey)
                .and_then(|v| v.as_string().cloned()),
            Some("WGS 84 / UTM zone 15N".to_string())
        );
        assert_eq!(
            parsed.get(GeoKeyId::GeogSemiMajorAxisGeoKey),
            Some(&GeoKeyValue::Double(vec![6378137.0]))
        );
    }

    #[test]
    fn test_missing_directory() {
        let result = GeoKeyDirectory::parse(&Ifd::default());
        assert!(matches!(
            result,
            Err(GeoTiffError::MissingTag(TagId::GeoKeyDirectory))
        ));
    }
}
