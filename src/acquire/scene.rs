use super::AcquireError;
use crate::config::Sensor;

/// `LC08_L2SP_034020_20160711_20200905_02_T1`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LandsatScene {
    pub id: String,
    pub path: String,
    pub row: String,
    pub date: String,
}

impl LandsatScene {
    pub fn parse(id: &str) -> Result<Self, AcquireError> {
        let bad = || AcquireError::BadSceneId(id.to_string());
        let mut parts = id.split('_');
        let (_, _, path_row, date) = (parts.next(), parts.next(), parts.next(), parts.next());
        let path_row = path_row.filter(|s| s.len() == 6).ok_or_else(bad)?;
        let date = date.filter(|s| is_date(s)).ok_or_else(bad)?;
        Ok(Self {
            id: id.to_string(),
            path: path_row[..3].to_string(),
            row: path_row[3..].to_string(),
            date: date.to_string(),
        })
    }
}

/// `S2A_MSIL2A_20160720T165911_N0204_R112_T15XVS`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentinelScene {
    pub id: String,
    pub mission: String,
    pub date: String,
    /// MGRS tile without the leading `T`, e.g. `15XVS`.
    pub tile: String,
}

impl SentinelScene {
    pub fn parse(id: &str) -> Result<Self, AcquireError> {
        let bad = || AcquireError::BadSceneId(id.to_string());
        let parts: Vec<&str> = id.split('_').collect();
        if parts.len() < 6 {
            return Err(bad());
        }
        let date = parts[2].get(..8).filter(|s| is_date(s)).ok_or_else(bad)?;
        let tile = parts[5]
            .strip_prefix('T')
            .filter(|t| t.len() == 5 && t[..2].bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(bad)?;
        Ok(Self {
            id: id.to_string(),
            mission: parts[0].to_string(),
            date: date.to_string(),
            tile: tile.to_string(),
        })
    }

    pub fn utm_zone(&self) -> &str {
        self.tile[..2].trim_start_matches('0')
    }

    pub fn lat_band(&self) -> &str {
        &self.tile[2..3]
    }

    pub fn grid_square(&self) -> &str {
        &self.tile[3..]
    }
}

fn is_date(s: &str) -> bool {
    s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit())
}

/// A parsed scene identifier of either sensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scene {
    Landsat(LandsatScene),
    Sentinel(SentinelScene),
}

impl Scene {
    pub fn parse(sensor: Sensor, id: &str) -> Result<Self, AcquireError> {
        match sensor {
            Sensor::Landsat => LandsatScene::parse(id).map(Scene::Landsat),
            Sensor::Sentinel => SentinelScene::parse(id).map(Scene::Sentinel),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Scene::Landsat(s) => &s.id,
            Scene::Sentinel(s) => &s.id,
        }
    }

    fn date(&self) -> &str {
        match self {
            Scene::Landsat(s) => &s.date,
            Scene::Sentinel(s) => &s.date,
        }
    }

    /// Template placeholders and their values. Month and day are not zero
    /// padded; `{date}` is `YYYYMMDD`.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        let date = self.date();
        let mut values = vec![
            ("scene", self.id().to_string()),
            ("date", date.to_string()),
            ("year", date[..4].to_string()),
            ("month", date[4..6].trim_start_matches('0').to_string()),
            ("day", date[6..8].trim_start_matches('0').to_string()),
        ];
        match self {
            Scene::Landsat(s) => {
                values.push(("path", s.path.clone()));
                values.push(("row", s.row.clone()));
            }
            Scene::Sentinel(s) => {
                values.push(("mission", s.mission.clone()));
                values.push(("tile", s.tile.clone()));
                values.push(("utm_zone", s.utm_zone().to_string()));
                values.push(("lat_band", s.lat_band().to_string()));
                values.push(("grid_square", s.grid_square().to_string()));
            }
        }
        values
    }

    /// Replaces `{name}` placeholders, `{band}` included.
    pub fn render(&self, template: &str, band: &str) -> Result<String, AcquireError> {
        let mut values = self.placeholders();
        values.push(("band", band.to_string()));

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after
                .find('}')
                .ok_or_else(|| AcquireError::BadTemplate(template.to_string()))?;
            let name = &after[..end];
            let value = values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value)
                .ok_or_else(|| AcquireError::UnknownPlaceholder(name.to_string(), self.id().to_string()))?;
            out.push_str(value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landsat_slicing() {
        let scene = LandsatScene::parse("LC08_L2SP_034020_20160711_20200905_02_T1").unwrap();
        assert_eq!(scene.path, "034");
        assert_eq!(scene.row, "020");
        assert_eq!(scene.date, "20160711");
        assert!(LandsatScene::parse("LC08_L2SP_34020").is_err());
    }

    #[test]
    fn test_sentinel_slicing() {
        let scene = SentinelScene::parse("S2B_MSIL2A_20190722T165919_N0213_R112_T15XVS").unwrap();
        assert_eq!(scene.mission, "S2B");
        assert_eq!(scene.date, "20190722");
        assert_eq!(scene.tile, "15XVS");
        assert_eq!(scene.utm_zone(), "15");
        assert_eq!(scene.lat_band(), "X");
        assert_eq!(scene.grid_square(), "VS");
        assert!(matches!(
            SentinelScene::parse("S2B_MSIL2A_2019_N0213_R112_T15XVS"),
            Err(AcquireError::BadSceneId(_))
        ));
    }

    #[test]
    fn test_render_sentinel_cog_url() {
        let scene = Scene::parse(Sensor::Sentinel, "S2A_MSIL2A_20160720T165911_N0204_R112_T15XVS")
            .unwrap();
        let url = scene
            .render(
                "https://bucket/{utm_zone}/{lat_band}/{grid_square}/{year}/{month}/{mission}_{tile}_{date}_0_L2A/{band}.tif",
                "B03",
            )
            .unwrap();
        assert_eq!(
            url,
            "https://bucket/15/X/VS/2016/7/S2A_15XVS_20160720_0_L2A/B03.tif"
        );
    }

    #[test]
    fn test_render_landsat_and_unknown_placeholder() {
        let scene =
            Scene::parse(Sensor::Landsat, "LC08_L2SP_034020_20180816_20200822_02_T1").unwrap();
        assert_eq!(
            scene.render("{year}/{path}/{row}/{scene}_{band}.TIF", "SR_B3").unwrap(),
            "2018/034/020/LC08_L2SP_034020_20180816_20200822_02_T1_SR_B3.TIF"
        );
        assert!(matches!(
            scene.render("{tile}/{band}", "SR_B3"),
            Err(AcquireError::UnknownPlaceholder(name, _)) if name == "tile"
        ));
        assert!(matches!(
            scene.render("{year", "SR_B3"),
            Err(AcquireError::BadTemplate(_))
        ));
    }
}
