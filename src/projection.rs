use proj4rs::errors::Error as Proj4Error;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::fmt::Display;
use thiserror::Error;

pub const EPSG_WGS84: u16 = 4326;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("proj4rs error: {0:?}")]
    Proj4Error(Proj4Error),

    #[error("EPSG:{0} is not a known coordinate reference system")]
    UnknownEpsg(u16),

    #[error("raster has no coordinate reference system")]
    MissingCrs,

    #[error("point ({0}, {1}) has no finite image in the target CRS")]
    NonFinite(f64, f64),
}

impl From<Proj4Error> for ProjectionError {
    fn from(e: Proj4Error) -> Self {
        ProjectionError::Proj4Error(e)
    }
}

/// Coordinate reference system identified by its EPSG code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Crs {
    epsg: u16,
    geographic: bool,
}

impl Crs {
    pub fn from_epsg(epsg: u16) -> Result<Self, ProjectionError> {
        let proj = Proj::from_epsg_code(epsg).map_err(|_| ProjectionError::UnknownEpsg(epsg))?;
        Ok(Self {
            epsg,
            geographic: proj.is_latlong(),
        })
    }

    pub fn wgs84() -> Self {
        Self {
            epsg: EPSG_WGS84,
            geographic: true,
        }
    }

    pub fn epsg(&self) -> u16 {
        self.epsg
    }

    /// Axis units are degrees rather than a linear unit.
    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    pub fn proj(&self) -> Result<Proj, ProjectionError> {
        Ok(Proj::from_epsg_code(self.epsg)?)
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Point transformer between two CRSs.
///
/// Geographic coordinates are taken and returned in degrees as (lon, lat).
/// No densification or approximation: every call projects exactly one point
/// and fails if the result is not finite.
#[derive(Debug)]
pub struct Transformer {
    from: Crs,
    to: Crs,
    from_proj: Proj,
    to_proj: Proj,
}

impl Transformer {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self, ProjectionError> {
        Ok(Self {
            from: *from,
            to: *to,
            from_proj: from.proj()?,
            to_proj: to.proj()?,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if self.is_identity() {
            return Ok((x, y));
        }
        let mut point = if self.from.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.from_proj, &self.to_proj, &mut point)
            .map_err(|_| ProjectionError::NonFinite(x, y))?;
        let (u, v, _) = point;
        let (u, v) = if self.to.is_geographic() {
            (u.to_degrees(), v.to_degrees())
        } else {
            (u, v)
        };
        if u.is_finite() && v.is_finite() {
            Ok((u, v))
        } else {
            Err(ProjectionError::NonFinite(x, y))
        }
    }
}
