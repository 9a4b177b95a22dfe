// https://docs.ogc.org/is/19-008r4/19-008r4.html#_geotiff_tags_for_coordinate_transformations

use crate::raster::Affine;
use crate::tiff::{Endian, Ifd, TagData, TagId};
use std::fmt::Display;

mod error;
mod id;
mod keys;
mod value;

pub use error::GeoTiffError;
pub use id::*;
pub use keys::{GeoKey, GeoKeyDirectory};
pub use value::GeoKeyValue;

#[derive(Clone, Debug)]
pub struct GeoTags {
    pub directory: GeoKeyDirectory,
    pub model: GeoModel,
}

#[derive(Clone, Debug)]
pub enum GeoModel {
    Transformed(GeoModelTransformed),
    Scaled(GeoModelScaled),
}

#[derive(Clone, Debug)]
pub struct GeoModelTransformed {
    pub transformation: [f64; 16],
    pub tiepoint: Option<[f64; 6]>,
}

#[derive(Clone, Debug)]
pub struct GeoModelScaled {
    pub pixel_scale: [f64; 3],
    pub tiepoint: [f64; 6],
}

impl Display for GeoTags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "GeoTIFF Tags:")?;
        match &self.model {
            GeoModel::Transformed(model) => {
                writeln!(f, "  Tiepoint: {:?}", model.tiepoint)?;
                writeln!(f, "  Transformation: {:?}", model.transformation)?;
            }
            GeoModel::Scaled(model) => {
                writeln!(f, "  Tiepoint: {:?}", model.tiepoint)?;
                writeln!(f, "  Pixel Scale: {:?}", model.pixel_scale)?;
            }
        }
        write!(
            f,
            "  Directory: {{version: {}, revision: {}.{}}}",
            self.directory.version, self.directory.revision.0, self.directory.revision.1,
        )?;
        if !self.directory.keys.is_empty() {
            write!(f, "\n  Keys:")?;
            for key in self.directory.keys.iter() {
                write!(f, "\n    {key}")?;
            }
        }
        Ok(())
    }
}

impl GeoTags {
    pub fn parse(ifd: &Ifd) -> Result<Self, GeoTiffError> {
        let tiepoint = get_tag_as_array(ifd, TagId::ModelTiepoint);
        let pixel_scale = get_tag_as_array(ifd, TagId::ModelPixelScale);
        let transformation = get_tag_as_array(ifd, TagId::ModelTransformation);
        let model = match (tiepoint, pixel_scale, transformation) {
            (Some(tiepoint), Some(pixel_scale), _) => GeoModel::Scaled(GeoModelScaled {
                tiepoint,
                pixel_scale,
            }),
            (tiepoint, _, Some(transformation)) => GeoModel::Transformed(GeoModelTransformed {
                tiepoint,
                transformation,
            }),
            _ => return Err(GeoTiffError::MissingTag(TagId::ModelPixelScale)),
        };

        // Plain model tags without keys still georeference the pixels
        let directory = match GeoKeyDirectory::parse(ifd) {
            Err(GeoTiffError::MissingTag(_)) => GeoKeyDirectory::new(),
            other => other?,
        };

        Ok(Self { model, directory })
    }

    /// Tags for a pixel-is-area raster with the given transform and EPSG code.
    pub fn from_affine(transform: &Affine, epsg: Option<u16>, geographic: bool) -> Self {
        let model = if transform.is_north_up() {
            GeoModel::Scaled(GeoModelScaled {
                tiepoint: [0.0, 0.0, 0.0, transform.c, transform.f, 0.0],
                pixel_scale: [transform.a, -transform.e, 0.0],
            })
        } else {
            let Affine { a, b, c, d, e, f } = *transform;
            GeoModel::Transformed(GeoModelTransformed {
                tiepoint: None,
                transformation: [
                    a, b, 0.0, c, //
                    d, e, 0.0, f, //
                    0.0, 0.0, 0.0, 0.0, //
                    0.0, 0.0, 0.0, 1.0,
                ],
            })
        };

        let mut directory = GeoKeyDirectory::new();
        directory.set(
            GeoKeyId::GTRasterTypeGeoKey,
            GeoKeyValue::Short(vec![RASTER_PIXEL_IS_AREA]),
        );
        if let Some(epsg) = epsg {
            let (model_type, cs_key) = if geographic {
                (MODEL_TYPE_GEOGRAPHIC, GeoKeyId::GeographicTypeGeoKey)
            } else {
                (MODEL_TYPE_PROJECTED, GeoKeyId::ProjectedCSTypeGeoKey)
            };
            directory.set(
                GeoKeyId::GTModelTypeGeoKey,
                GeoKeyValue::Short(vec![model_type]),
            );
            directory.set(cs_key, GeoKeyValue::Short(vec![epsg]));
        }

        Self { directory, model }
    }

    pub fn add_to_ifd(&self, ifd: &mut Ifd, endian: Endian) {
        match &self.model {
            GeoModel::Transformed(model) => {
                ifd.set_tag(
                    TagId::ModelTransformation,
                    TagData::Double(model.transformation.to_vec()),
                    endian,
                );
                if let Some(tiepoint) = model.tiepoint {
                    ifd.set_tag(
                        TagId::ModelTiepoint,
                        TagData::Double(tiepoint.to_vec()),
                        endian,
                    );
                }
            }
            GeoModel::Scaled(model) => {
                ifd.set_tag(
                    TagId::ModelTiepoint,
                    TagData::Double(model.tiepoint.to_vec()),
                    endian,
                );
                ifd.set_tag(
                    TagId::ModelPixelScale,
                    TagData::Double(model.pixel_scale.to_vec()),
                    endian,
                );
            }
        }
        self.directory.add_to_ifd(ifd, endian);
    }

    /// EPSG code of the projected CRS, falling back to the geographic one.
    pub fn epsg(&self) -> Option<u16> {
        [GeoKeyId::ProjectedCSTypeGeoKey, GeoKeyId::GeographicTypeGeoKey]
            .into_iter()
            .filter_map(|id| self.directory.get(id))
            .filter_map(|value| value.as_number::<u16>())
            .find(|code| *code != 0 && *code != 32767)
    }

    pub fn is_pixel_is_point(&self) -> bool {
        self.directory
            .get(GeoKeyId::GTRasterTypeGeoKey)
            .and_then(|value| value.as_number::<u16>())
            == Some(RASTER_PIXEL_IS_POINT)
    }

    /// Pixel-corner geotransform of the raster.
    pub fn affine(&self) -> Result<Affine, GeoTiffError> {
        let affine = match &self.model {
            GeoModel::Scaled(model) => {
                let [i, j, _, x, y, _] = model.tiepoint;
                let [sx, sy, _] = model.pixel_scale;
                Affine::new(sx, 0.0, x - i * sx, 0.0, -sy, y + j * sy)
            }
            GeoModel::Transformed(model) => {
                let t = model.transformation;
                Affine::new(t[0], t[1], t[3], t[4], t[5], t[7])
            }
        };
        if !affine.is_invertible() {
            return Err(GeoTiffError::InvalidTransform(affine.to_array()));
        }
        if self.is_pixel_is_point() {
            Ok(affine.translated_pixels(-0.5, -0.5))
        } else {
            Ok(affine)
        }
    }
}

fn get_tag_as_array<const N: usize>(ifd: &Ifd, id: TagId) -> Option<[f64; N]> {
    let values: Vec<f64> = ifd.get_tag_values(id).ok()?;
    values.get(..N)?.try_into().ok()
}
