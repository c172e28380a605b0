// src/analysis/zones.rs
//
// Polygonal store zones with a type tag and a visit counter.
//
// Lookup walks the configured zones in id order and returns the first one
// whose polygon contains the point; zones are expected not to overlap but
// that is not enforced. Points outside every polygon belong to "other".

use crate::error::ZoneLookupError;
use crate::types::{Point, ZoneType, OTHER_ZONE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Zone as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub name: String,
    pub polygon: Vec<Point>,
    #[serde(default = "default_zone_type")]
    pub zone_type: ZoneType,
}

fn default_zone_type() -> ZoneType {
    ZoneType::Other
}

#[derive(Debug, Clone, Serialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub polygon: Vec<Point>,
    pub zone_type: ZoneType,
    pub visit_count: u64,
}

impl Zone {
    pub fn from_spec(id: &str, spec: &ZoneSpec) -> Result<Self, ZoneLookupError> {
        if spec.polygon.len() < 3 {
            return Err(ZoneLookupError::DegeneratePolygon {
                zone_id: id.to_string(),
                vertices: spec.polygon.len(),
            });
        }
        if spec.polygon.iter().any(|p| !p.is_finite()) {
            return Err(ZoneLookupError::NonFinitePolygon(id.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            name: spec.name.clone(),
            polygon: spec.polygon.clone(),
            zone_type: spec.zone_type,
            visit_count: 0,
        })
    }

    pub fn contains(&self, p: Point) -> bool {
        point_in_polygon(p, &self.polygon)
    }
}

/// Ray casting (even-odd rule). Edges whose endpoints share a y coordinate
/// never straddle the ray and are skipped, so the intersection x is only
/// computed when `yi != yj`.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_cross = pj.x + (p.y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<Zone>,
}

impl ZoneIndex {
    /// Build from configuration, dropping malformed zones individually.
    pub fn from_specs(specs: &BTreeMap<String, ZoneSpec>) -> Self {
        let mut index = Self::default();
        for (id, spec) in specs {
            if let Err(e) = index.add_zone(id, spec) {
                warn!("Skipping zone {}: {}", id, e);
            }
        }
        if index.zones.is_empty() {
            warn!("No valid zones configured; every point resolves to '{}'", OTHER_ZONE);
        } else {
            info!("✓ Zone index ready ({} zones)", index.zones.len());
        }
        index
    }

    pub fn add_zone(&mut self, id: &str, spec: &ZoneSpec) -> Result<(), ZoneLookupError> {
        let zone = Zone::from_spec(id, spec)?;
        self.zones.retain(|z| z.id != id);
        self.zones.push(zone);
        Ok(())
    }

    /// Admin update: swap the zone set, keeping visit counters of zone ids
    /// that survive. Returns the number of zones rejected as malformed.
    pub fn replace_zones(&mut self, specs: &BTreeMap<String, ZoneSpec>) -> usize {
        let old_counts = self.visit_counts();
        let mut next = Self::default();
        let mut rejected = 0;
        for (id, spec) in specs {
            match Zone::from_spec(id, spec) {
                Ok(mut zone) => {
                    zone.visit_count = old_counts.get(id).copied().unwrap_or(0);
                    next.zones.push(zone);
                }
                Err(e) => {
                    warn!("Rejecting zone {} in update: {}", id, e);
                    rejected += 1;
                }
            }
        }
        info!(
            "🗺️  Zone configuration replaced: {} zones ({} rejected)",
            next.zones.len(),
            rejected
        );
        *self = next;
        rejected
    }

    /// Zone id containing `p`, or "other".
    pub fn zone_of(&self, p: Point) -> &str {
        self.zones
            .iter()
            .find(|z| z.contains(p))
            .map(|z| z.id.as_str())
            .unwrap_or(OTHER_ZONE)
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Type of a zone id; "other" and unknown ids are `ZoneType::Other`.
    pub fn zone_type(&self, id: &str) -> ZoneType {
        self.zone(id).map(|z| z.zone_type).unwrap_or(ZoneType::Other)
    }

    pub fn record_visit(&mut self, id: &str) -> Result<u64, ZoneLookupError> {
        let zone = self
            .zones
            .iter_mut()
            .find(|z| z.id == id)
            .ok_or_else(|| ZoneLookupError::UnknownZone(id.to_string()))?;
        zone.visit_count += 1;
        Ok(zone.visit_count)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn visit_counts(&self) -> BTreeMap<String, u64> {
        self.zones
            .iter()
            .map(|z| (z.id.clone(), z.visit_count))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f32, y0: f32, size: f32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + size, y0),
            Point::new(x0 + size, y0 + size),
            Point::new(x0, y0 + size),
        ]
    }

    fn spec(name: &str, polygon: Vec<Point>, zone_type: ZoneType) -> ZoneSpec {
        ZoneSpec {
            name: name.to_string(),
            polygon,
            zone_type,
        }
    }

    #[test]
    fn test_point_in_square() {
        let poly = square(0.0, 0.0, 100.0);
        assert!(point_in_polygon(Point::new(50.0, 50.0), &poly));
        assert!(!point_in_polygon(Point::new(150.0, 50.0), &poly));
        assert!(!point_in_polygon(Point::new(-1.0, 50.0), &poly));
    }

    #[test]
    fn test_point_level_with_horizontal_edge() {
        // Horizontal edges never produce an intersection: the top edge is
        // half-open (inside), the bottom edge is excluded.
        let poly = square(0.0, 0.0, 100.0);
        assert!(point_in_polygon(Point::new(50.0, 0.0), &poly));
        assert!(!point_in_polygon(Point::new(50.0, 100.0), &poly));
        assert!(!point_in_polygon(Point::new(150.0, 0.0), &poly));

        // Concave polygon with a horizontal notch edge at y = 50
        let notch = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(60.0, 100.0),
            Point::new(60.0, 50.0),
            Point::new(40.0, 50.0),
            Point::new(40.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        assert!(point_in_polygon(Point::new(20.0, 50.0), &notch));
        assert!(point_in_polygon(Point::new(50.0, 25.0), &notch));
        assert!(!point_in_polygon(Point::new(50.0, 75.0), &notch));
    }

    #[test]
    fn test_point_beside_vertical_edge() {
        let tri = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 100.0),
            Point::new(100.0, 100.0),
        ];
        assert!(point_in_polygon(Point::new(10.0, 50.0), &tri));
        assert!(!point_in_polygon(Point::new(60.0, 50.0), &tri));
    }

    #[test]
    fn test_zone_of_falls_back_to_other() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "dairy".to_string(),
            spec("Dairy", square(0.0, 0.0, 100.0), ZoneType::Product),
        );
        let index = ZoneIndex::from_specs(&specs);
        assert_eq!(index.zone_of(Point::new(10.0, 10.0)), "dairy");
        assert_eq!(index.zone_of(Point::new(500.0, 10.0)), OTHER_ZONE);
        assert_eq!(index.zone_type("dairy"), ZoneType::Product);
        assert_eq!(index.zone_type(OTHER_ZONE), ZoneType::Other);
    }

    #[test]
    fn test_degenerate_zone_is_dropped() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "line".to_string(),
            spec(
                "Line",
                vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
                ZoneType::Service,
            ),
        );
        specs.insert(
            "till".to_string(),
            spec("Till", square(200.0, 200.0, 50.0), ZoneType::Checkout),
        );
        let index = ZoneIndex::from_specs(&specs);
        assert_eq!(index.zones().len(), 1);
        assert!(index.zone("line").is_none());
    }

    #[test]
    fn test_empty_index_resolves_everything_to_other() {
        let index = ZoneIndex::from_specs(&BTreeMap::new());
        assert!(index.is_empty());
        assert_eq!(index.zone_of(Point::new(1.0, 1.0)), OTHER_ZONE);
    }

    #[test]
    fn test_record_visit_and_unknown_zone() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "dairy".to_string(),
            spec("Dairy", square(0.0, 0.0, 100.0), ZoneType::Product),
        );
        let mut index = ZoneIndex::from_specs(&specs);
        assert_eq!(index.record_visit("dairy"), Ok(1));
        assert_eq!(index.record_visit("dairy"), Ok(2));
        assert_eq!(
            index.record_visit("bakery"),
            Err(ZoneLookupError::UnknownZone("bakery".to_string()))
        );
    }

    #[test]
    fn test_replace_zones_keeps_surviving_counters() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "dairy".to_string(),
            spec("Dairy", square(0.0, 0.0, 100.0), ZoneType::Product),
        );
        specs.insert(
            "bakery".to_string(),
            spec("Bakery", square(200.0, 0.0, 100.0), ZoneType::Product),
        );
        let mut index = ZoneIndex::from_specs(&specs);
        index.record_visit("dairy").unwrap();
        index.record_visit("bakery").unwrap();

        let mut next = BTreeMap::new();
        next.insert(
            "dairy".to_string(),
            spec("Dairy (moved)", square(0.0, 300.0, 100.0), ZoneType::Product),
        );
        next.insert(
            "broken".to_string(),
            spec("Broken", vec![], ZoneType::Other),
        );
        let rejected = index.replace_zones(&next);
        assert_eq!(rejected, 1);
        assert_eq!(index.zones().len(), 1);
        assert_eq!(index.zone("dairy").unwrap().visit_count, 1);
        assert_eq!(index.zone_of(Point::new(50.0, 350.0)), "dairy");
    }
}
