use geo::MultiPolygon;
use std::fmt;

use super::{AdminLevel, Place};

/// One (country, admin level) unit of work
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Task {
    pub country: String,
    pub level: AdminLevel,
}

impl Task {
    pub fn new(country: impl Into<String>, level: AdminLevel) -> Self {
        Self {
            country: country.into(),
            level,
        }
    }

    /// `"{country}-{level}"`, used both as the completed-log entry and the
    /// output file stem
    pub fn label(&self) -> String {
        format!("{}-{}", self.country, self.level)
    }

    /// Cross product of countries and levels, countries outermost
    pub fn all(countries: &[String], levels: &[AdminLevel]) -> Vec<Task> {
        countries
            .iter()
            .flat_map(|country| levels.iter().map(move |&level| Task::new(country.clone(), level)))
            .collect()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.country, self.level)
    }
}

/// Generated polygons of one administrative area
#[derive(Debug, Clone)]
pub struct AreaPolygons {
    pub id: i64,
    pub name: String,
    pub country_code: String,
    pub polygons: MultiPolygon<f64>,
}

impl AreaPolygons {
    pub fn new(area: &Place, polygons: MultiPolygon<f64>) -> Self {
        Self {
            id: area.id,
            name: area.name.clone(),
            country_code: area.country_code.clone(),
            polygons,
        }
    }
}

/// Everything one task produced, areas in selection order
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub task: Task,
    pub areas: Vec<AreaPolygons>,
}
