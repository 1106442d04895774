//! Country outline polygons.

use geo::MultiPolygon;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Low-resolution boundary of one country, pre-unioned from all its shapes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryOutline {
    pub country_code: String,
    pub geometry: MultiPolygon<f64>,
}

/// Country code → outline lookup
#[derive(Debug, Clone, Default)]
pub struct OutlineTable {
    outlines: HashMap<String, CountryOutline>,
}

impl OutlineTable {
    pub fn new(outlines: Vec<CountryOutline>) -> Self {
        Self {
            outlines: outlines
                .into_iter()
                .map(|o| (o.country_code.clone(), o))
                .collect(),
        }
    }

    pub fn get(&self, country: &str) -> Option<&CountryOutline> {
        self.outlines.get(country)
    }

    pub fn len(&self) -> usize {
        self.outlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }

    pub fn into_outlines(self) -> Vec<CountryOutline> {
        let mut outlines: Vec<CountryOutline> = self.outlines.into_values().collect();
        outlines.sort_by(|a, b| a.country_code.cmp(&b.country_code));
        outlines
    }
}
