//! Gazetteer rows and the in-memory gazetteer table.

use geo::Point;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{AdminCodes, AdminLevel};

/// Feature class of rows describing administrative boundaries
pub const ADMIN_FEATURE_CLASS: &str = "A";

/// One named place from the gazetteer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Gazetteer id
    pub id: i64,

    pub name: String,

    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,

    /// Location as (longitude, latitude)
    pub point: Point<f64>,

    /// Feature class, e.g. "A" (admin) or "P" (populated place)
    pub feature_class: String,

    /// Feature code, e.g. "ADM1" or "PPL"
    pub feature_code: String,

    pub admin_codes: AdminCodes,
}

impl Place {
    /// Create a place with no feature classification and no admin codes
    pub fn new(id: i64, name: &str, country_code: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            country_code: country_code.to_string(),
            point: Point::new(longitude, latitude),
            feature_class: String::new(),
            feature_code: String::new(),
            admin_codes: AdminCodes::default(),
        }
    }

    pub fn with_feature(mut self, class: &str, code: &str) -> Self {
        self.feature_class = class.to_string();
        self.feature_code = code.to_string();
        self
    }

    pub fn with_admin_codes(mut self, codes: AdminCodes) -> Self {
        self.admin_codes = codes;
        self
    }

    pub fn latitude(&self) -> f64 {
        self.point.y()
    }

    pub fn longitude(&self) -> f64 {
        self.point.x()
    }

    /// Whether this row is itself the record of an admin area at `level`
    pub fn is_admin_area(&self, level: AdminLevel) -> bool {
        self.feature_class == ADMIN_FEATURE_CLASS && self.feature_code == level.feature_code()
    }
}

/// Read-only table of places, indexed by country and id.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    places: Vec<Place>,
    by_country: HashMap<String, Vec<usize>>,
    by_id: HashMap<i64, usize>,
}

impl Gazetteer {
    pub fn new(places: Vec<Place>) -> Self {
        let mut by_country: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(places.len());

        for (i, place) in places.iter().enumerate() {
            if !place.country_code.is_empty() {
                by_country
                    .entry(place.country_code.clone())
                    .or_default()
                    .push(i);
            }
            by_id.entry(place.id).or_insert(i);
        }

        Self {
            places,
            by_country,
            by_id,
        }
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn into_places(self) -> Vec<Place> {
        self.places
    }

    pub fn get(&self, id: i64) -> Option<&Place> {
        self.by_id.get(&id).map(|&i| &self.places[i])
    }

    /// Places of one country, in table order
    pub fn in_country<'a>(&'a self, country: &str) -> impl Iterator<Item = &'a Place> + 'a {
        self.by_country
            .get(country)
            .map(|indices| indices.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.places[i])
    }

    /// All country codes present, sorted
    pub fn countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self.by_country.keys().cloned().collect();
        countries.sort();
        countries
    }

    /// Fill in admin5 codes from a separate id → code table.
    pub fn merge_admin5(&mut self, codes: &std::collections::HashMap<i64, String>) -> usize {
        let mut merged = 0;
        for place in &mut self.places {
            if let Some(code) = codes.get(&place.id) {
                place.admin_codes.set(5, Some(code.clone()));
                merged += 1;
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_is_lon_lat() {
        let place = Place::new(1, "Zurich", "CH", 47.37, 8.54);
        assert_eq!(place.point.x(), 8.54);
        assert_eq!(place.latitude(), 47.37);
    }

    #[test]
    fn test_admin_area_classification() {
        let level = AdminLevel::new(1).unwrap();
        let adm = Place::new(1, "Bern", "CH", 46.8, 7.6).with_feature("A", "ADM1");
        let town = Place::new(2, "Thun", "CH", 46.75, 7.63).with_feature("P", "PPL");
        assert!(adm.is_admin_area(level));
        assert!(!adm.is_admin_area(AdminLevel::new(2).unwrap()));
        assert!(!town.is_admin_area(level));
    }

    #[test]
    fn test_country_index_preserves_order() {
        let gazetteer = Gazetteer::new(vec![
            Place::new(3, "c", "CH", 0.0, 0.0),
            Place::new(1, "a", "AT", 0.0, 0.0),
            Place::new(2, "b", "CH", 0.0, 0.0),
        ]);
        let ids: Vec<i64> = gazetteer.in_country("CH").map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(gazetteer.in_country("DE").count(), 0);
        assert_eq!(gazetteer.countries(), vec!["AT", "CH"]);
        assert_eq!(gazetteer.get(1).map(|p| p.name.as_str()), Some("a"));
    }

    #[test]
    fn test_merge_admin5() {
        let mut gazetteer = Gazetteer::new(vec![Place::new(7, "x", "FR", 0.0, 0.0)]);
        let codes = std::collections::HashMap::from([(7, "75056".to_string())]);
        assert_eq!(gazetteer.merge_admin5(&codes), 1);
        assert_eq!(gazetteer.get(7).unwrap().admin_codes.get(5), Some("75056"));
    }
}
