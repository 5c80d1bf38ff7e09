//! Ready-made road networks for experiments and tests.

use ambulance_dispatch_core::{Location, LocationCategory, LocationId, Position};
use rand::{seq::index, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::network::{NetworkError, RoadNetwork};

const DISTRICT_ROADS: [(u32, u32, f64); 7] = [
    (0, 4, 2.0),
    (1, 5, 1.0),
    (2, 4, 3.0),
    (2, 5, 4.0),
    (3, 4, 1.0),
    (3, 6, 5.0),
    (4, 5, 5.0),
];

/// Seven-location district with one base, two hospitals, and two incident sites.
///
/// | id | category      | name                    |
/// |----|---------------|-------------------------|
/// | 0  | base          | Ambulance Base 1        |
/// | 1  | hospital      | City General Hospital   |
/// | 2  | hospital      | Suburban Medical Center |
/// | 3  | incident site | Downtown                |
/// | 4  | intersection  | Intersection A          |
/// | 5  | intersection  | Intersection B          |
/// | 6  | incident site | Highway                 |
pub fn reference_district() -> Result<RoadNetwork, NetworkError> {
    let table = [
        (LocationCategory::Base, (0.0, 2.0), "Ambulance Base 1"),
        (LocationCategory::Hospital, (6.0, 0.0), "City General Hospital"),
        (LocationCategory::Hospital, (4.0, 6.0), "Suburban Medical Center"),
        (LocationCategory::IncidentSite, (3.0, 4.0), "Downtown"),
        (LocationCategory::Intersection, (2.0, 2.0), "Intersection A"),
        (LocationCategory::Intersection, (5.0, 2.0), "Intersection B"),
        (LocationCategory::IncidentSite, (10.0, 3.0), "Highway"),
    ];

    let locations = table
        .into_iter()
        .enumerate()
        .map(|(index, (category, (x, y), name))| {
            Location::new(
                LocationId::new(index as u32),
                category,
                Position::new(x, y),
                name,
            )
        })
        .collect();

    RoadNetwork::from_roads(locations, &DISTRICT_ROADS)
}

/// Parameters of a randomly weighted grid city.
#[derive(Clone, Debug)]
pub struct GridSpec {
    /// Number of intersection rows.
    pub rows: u32,
    /// Number of intersection columns.
    pub columns: u32,
    /// Intersections converted into ambulance bases.
    pub bases: usize,
    /// Intersections converted into hospitals.
    pub hospitals: usize,
    /// Intersections converted into incident sites.
    pub incident_sites: usize,
    /// Seed driving weights and category placement.
    pub seed: u64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            rows: 8,
            columns: 10,
            bases: 3,
            hospitals: 2,
            incident_sites: 6,
            seed: 0,
        }
    }
}

/// Builds a rows × columns grid of intersections with random road weights.
///
/// Roads connect horizontal and vertical neighbours with whole weights in
/// `1..=5`. Bases, hospitals, and incident sites are placed on distinct
/// intersections; requests beyond the number of intersections are truncated.
pub fn grid_city(spec: &GridSpec) -> Result<RoadNetwork, NetworkError> {
    let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
    let count = spec.rows as usize * spec.columns as usize;

    let mut categories = vec![LocationCategory::Intersection; count];
    let wanted = (spec.bases + spec.hospitals + spec.incident_sites).min(count);
    let picked = index::sample(&mut rng, count, wanted).into_vec();
    let mut slots = picked.into_iter();
    for (category, amount) in [
        (LocationCategory::Base, spec.bases),
        (LocationCategory::Hospital, spec.hospitals),
        (LocationCategory::IncidentSite, spec.incident_sites),
    ] {
        for slot in slots.by_ref().take(amount) {
            categories[slot] = category;
        }
    }

    let locations = categories
        .into_iter()
        .enumerate()
        .map(|(index, category)| {
            let (row, column) = (index as u32 / spec.columns, index as u32 % spec.columns);
            let name = match category {
                LocationCategory::Base => format!("Base {index}"),
                LocationCategory::Hospital => format!("Hospital {index}"),
                LocationCategory::IncidentSite => format!("Incident Zone {index}"),
                LocationCategory::Intersection => format!("Intersection {index}"),
            };
            Location::new(
                LocationId::new(index as u32),
                category,
                Position::new(column as f32, row as f32),
                name,
            )
        })
        .collect();

    let mut roads = Vec::new();
    for row in 0..spec.rows {
        for column in 0..spec.columns {
            let node = row * spec.columns + column;
            if column + 1 < spec.columns {
                roads.push((node, node + 1, f64::from(rng.gen_range(1..=5u32))));
            }
            if row + 1 < spec.rows {
                roads.push((node, node + spec.columns, f64::from(rng.gen_range(1..=5u32))));
            }
        }
    }

    RoadNetwork::from_roads(locations, &roads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn district_categories_match_table() {
        let network = reference_district().expect("district builds");
        assert_eq!(network.len(), 7);
        assert_eq!(network.locations_of(LocationCategory::Base).count(), 1);
        assert_eq!(network.locations_of(LocationCategory::Hospital).count(), 2);
        assert_eq!(network.locations_of(LocationCategory::IncidentSite).count(), 2);
        assert_eq!(network.roads().count(), DISTRICT_ROADS.len());
    }

    #[test]
    fn grid_city_places_requested_categories() {
        let spec = GridSpec {
            rows: 4,
            columns: 5,
            bases: 2,
            hospitals: 1,
            incident_sites: 3,
            seed: 9,
        };
        let network = grid_city(&spec).expect("grid builds");
        assert_eq!(network.len(), 20);
        assert_eq!(network.locations_of(LocationCategory::Base).count(), 2);
        assert_eq!(network.locations_of(LocationCategory::Hospital).count(), 1);
        assert_eq!(network.locations_of(LocationCategory::IncidentSite).count(), 3);
        assert_eq!(network.roads().count(), 4 * 4 + 3 * 5);
        assert!(network
            .roads()
            .all(|(_, _, weight)| (1.0..=5.0).contains(&weight)));
    }

    #[test]
    fn grid_city_is_reproducible_for_a_seed() {
        let spec = GridSpec::default();
        let first = grid_city(&spec).expect("grid builds");
        let second = grid_city(&spec).expect("grid builds");
        assert_eq!(first.locations(), second.locations());
        assert!(first.roads().eq(second.roads()));
    }
}
