//! AOI to satellite tile matching (Sentinel-2 MGRS, Landsat WRS-2).

use geo::{Coord, Geometry, Intersects, LineString, Point, Polygon};
use geojson::{FeatureCollection, JsonValue};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum TileError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("bad KML coordinate tuple {0:?}")]
    BadCoordinate(String),

    #[error("no Point or Polygon geometries found")]
    NoGeometries,

    #[error("tile grid has no features")]
    EmptyGrid,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// `lon,lat[,alt]` whitespace separated tuples.
fn parse_coordinates(text: &str) -> Result<Vec<Coord<f64>>, TileError> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',').map(|v| v.trim().parse::<f64>());
            match (parts.next(), parts.next()) {
                (Some(Ok(x)), Some(Ok(y))) => Ok(Coord { x, y }),
                _ => Err(TileError::BadCoordinate(tuple.to_string())),
            }
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Context {
    Point,
    Outer,
    Inner,
    Other,
}

#[derive(Default)]
struct PolygonRings {
    exterior: Option<LineString<f64>>,
    interiors: Vec<LineString<f64>>,
}

/// Points and polygons (outer ring plus holes) from KML text.
pub fn parse_kml(text: &str) -> Result<Vec<Geometry<f64>>, TileError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut geometries = Vec::new();
    let mut context = vec![];
    let mut polygon: Option<PolygonRings> = None;
    let mut in_coordinates = false;
    let mut coordinates = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Point" => context.push(Context::Point),
                b"Polygon" => polygon = Some(PolygonRings::default()),
                b"outerBoundaryIs" => context.push(Context::Outer),
                b"innerBoundaryIs" => context.push(Context::Inner),
                b"LineString" | b"LinearRing" if context.is_empty() => {
                    context.push(Context::Other)
                }
                b"coordinates" => {
                    in_coordinates = true;
                    coordinates.clear();
                }
                _ => {}
            },
            Event::Text(t) if in_coordinates => coordinates.push_str(&t.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"coordinates" => {
                    in_coordinates = false;
                    let coords = parse_coordinates(&coordinates)?;
                    match (context.last(), polygon.as_mut()) {
                        (Some(Context::Point), _) => {
                            if let Some(first) = coords.first() {
                                geometries.push(Point::from(*first).into());
                            }
                        }
                        (Some(Context::Outer), Some(rings)) => {
                            rings.exterior = Some(LineString::from(coords))
                        }
                        (Some(Context::Inner), Some(rings)) => {
                            rings.interiors.push(LineString::from(coords))
                        }
                        _ => trace!("Skipping {} coordinates outside Point/Polygon", coords.len()),
                    }
                }
                b"Point" | b"outerBoundaryIs" | b"innerBoundaryIs" => {
                    context.pop();
                }
                b"LineString" | b"LinearRing" if context.last() == Some(&Context::Other) => {
                    context.pop();
                }
                b"Polygon" => {
                    if let Some(PolygonRings {
                        exterior: Some(exterior),
                        interiors,
                    }) = polygon.take()
                    {
                        geometries.push(Polygon::new(exterior, interiors).into());
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if geometries.is_empty() {
        return Err(TileError::NoGeometries);
    }
    debug!("Parsed {} AOI geometries from KML", geometries.len());
    Ok(geometries)
}

pub fn load_kml<P: AsRef<Path>>(path: P) -> Result<Vec<Geometry<f64>>, TileError> {
    parse_kml(&fs::read_to_string(path)?)
}

/// One tile footprint and its attribute table row.
#[derive(Clone, Debug)]
pub struct Tile {
    pub geometry: Geometry<f64>,
    pub properties: geojson::JsonObject,
}

impl Tile {
    /// Property as text; strings unquoted, other JSON values as written.
    pub fn property(&self, column: &str) -> Option<String> {
        self.properties.get(column).map(|value| match value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Identifier built from `columns`, joined with `-`.
    pub fn id(&self, columns: &[String]) -> Option<String> {
        columns
            .iter()
            .map(|column| self.property(column))
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join("-"))
    }
}

/// Tiling grid loaded from a GeoJSON feature collection in WGS84.
#[derive(Clone, Debug, Default)]
pub struct TileGrid {
    pub tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn from_geojson(text: &str) -> Result<Self, TileError> {
        let collection: FeatureCollection = text.parse()?;
        let mut tiles = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let Some(geometry) = feature.geometry else {
                continue;
            };
            tiles.push(Tile {
                geometry: Geometry::try_from(geometry)?,
                properties: feature.properties.unwrap_or_default(),
            });
        }
        if tiles.is_empty() {
            return Err(TileError::EmptyGrid);
        }
        Ok(Self { tiles })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TileError> {
        Self::from_geojson(&fs::read_to_string(path)?)
    }
}

/// Identifiers of all tiles touching any AOI geometry, boundaries included,
/// deduplicated in first-seen order.
///
/// Tiles missing one of the id columns are skipped with a warning.
pub fn match_tiles(aoi: &[Geometry<f64>], grid: &TileGrid, id_columns: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for geometry in aoi {
        for tile in grid.tiles.iter().filter(|t| t.geometry.intersects(geometry)) {
            match tile.id(id_columns) {
                Some(id) => {
                    if seen.insert(id.clone()) {
                        ids.push(id);
                    }
                }
                None => warn!("Matched tile lacks one of the columns {id_columns:?}"),
            }
        }
    }
    info!("{} tile(s) intersect the AOI", ids.len());
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Gillam</name>
      <Point><coordinates>-94.70,56.35,0</coordinates></Point>
    </Placemark>
    <Placemark>
      <name>Reservoir</name>
      <Polygon>
        <outerBoundaryIs><LinearRing><coordinates>
          -94.8,56.3,0 -94.3,56.3,0 -94.3,56.05,0 -94.8,56.05,0 -94.8,56.3,0
        </coordinates></LinearRing></outerBoundaryIs>
        <innerBoundaryIs><LinearRing><coordinates>
          -94.6,56.2 -94.5,56.2 -94.5,56.1 -94.6,56.2
        </coordinates></LinearRing></innerBoundaryIs>
      </Polygon>
    </Placemark>
    <Placemark>
      <LineString><coordinates>-94.0,56.0 -93.0,56.0</coordinates></LineString>
    </Placemark>
  </Document>
</kml>"#;

    // Two WRS-2 like cells sharing the x = 1 edge
    const GRID: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "properties": {"PATH": 34, "ROW": 20, "Name": "15VVK"},
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
        {"type": "Feature", "properties": {"PATH": 33, "ROW": 20, "Name": "15VWK"},
         "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}},
        {"type": "Feature", "properties": {"PATH": 34, "ROW": 20, "Name": "dup"},
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,1],[0,1],[0,0]]]}}
      ]
    }"#;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_kml_points_and_polygons() {
        let geometries = parse_kml(KML).unwrap();
        assert_eq!(geometries.len(), 2);
        assert_eq!(geometries[0], Geometry::Point(Point::new(-94.70, 56.35)));
        let Geometry::Polygon(polygon) = &geometries[1] else {
            panic!("expected polygon, got {:?}", geometries[1]);
        };
        assert_eq!(polygon.exterior().0.len(), 5);
        assert_eq!(polygon.interiors().len(), 1);
    }

    #[test]
    fn test_kml_without_geometries() {
        let kml = r#"<kml><Document><name>empty</name></Document></kml>"#;
        assert!(matches!(parse_kml(kml), Err(TileError::NoGeometries)));
    }

    #[test]
    fn test_bad_coordinates() {
        let kml = r#"<kml><Point><coordinates>abc,1</coordinates></Point></kml>"#;
        assert!(matches!(parse_kml(kml), Err(TileError::BadCoordinate(_))));
    }

    #[test]
    fn test_point_inside_one_cell() {
        let grid = TileGrid::from_geojson(GRID).unwrap();
        let aoi = vec![Geometry::Point(Point::new(0.5, 0.5))];
        assert_eq!(match_tiles(&aoi, &grid, &columns(&["Name"])), vec!["15VVK", "dup"]);
    }

    #[test]
    fn test_boundary_point_matches_both_cells() {
        let grid = TileGrid::from_geojson(GRID).unwrap();
        let aoi = vec![Geometry::Point(Point::new(1.0, 0.5))];
        assert_eq!(
            match_tiles(&aoi, &grid, &columns(&["PATH", "ROW"])),
            vec!["34-20", "33-20"]
        );
    }

    #[test]
    fn test_missing_column_is_skipped() {
        let grid = TileGrid::from_geojson(GRID).unwrap();
        let aoi = vec![Geometry::Point(Point::new(0.5, 0.5))];
        assert!(match_tiles(&aoi, &grid, &columns(&["MGRS"])).is_empty());
    }
}
