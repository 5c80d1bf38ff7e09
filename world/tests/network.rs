use ambulance_dispatch_core::LocationId;
use ambulance_dispatch_world::{layouts, RoadNetwork, TravelMode};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn id(value: u32) -> LocationId {
    LocationId::new(value)
}

fn ids(values: &[u32]) -> Vec<LocationId> {
    values.iter().copied().map(LocationId::new).collect()
}

fn assert_valid_chain(network: &RoadNetwork, from: LocationId, to: LocationId) {
    let route = network.shortest_path(from, to);
    let path = route.path().expect("district is connected");
    assert_eq!(path.first(), Some(&from));
    assert_eq!(path.last(), Some(&to));

    let mut total = 0.0;
    for pair in path.windows(2) {
        assert!(network.are_adjacent(pair[0], pair[1]));
        total += network.weight(pair[0], pair[1]);
    }
    assert_eq!(total, route.cost());
}

#[test]
fn district_routes_follow_cheapest_roads() {
    let network = layouts::reference_district().expect("district builds");

    let downtown = network.shortest_path(id(0), id(3));
    assert_eq!(downtown.path(), Some(&ids(&[0, 4, 3])[..]));
    assert_eq!(downtown.cost(), 3.0);

    let highway = network.shortest_path(id(1), id(6));
    assert_eq!(highway.path(), Some(&ids(&[1, 5, 4, 3, 6])[..]));
    assert_eq!(highway.cost(), 12.0);
}

#[test]
fn route_to_self_is_free() {
    let network = layouts::reference_district().expect("district builds");
    for location in network.locations() {
        let route = network.shortest_path(location.id(), location.id());
        assert_eq!(route.path(), Some(&[location.id()][..]));
        assert_eq!(route.cost(), 0.0);
    }
}

#[test]
fn every_route_is_a_chain_of_roads() {
    let network = layouts::reference_district().expect("district builds");
    for from in network.locations() {
        for to in network.locations() {
            assert_valid_chain(&network, from.id(), to.id());
        }
    }
}

#[test]
fn congestion_updates_are_routed_around_and_reset() {
    let mut network = layouts::reference_district().expect("district builds");
    network
        .update_weight(id(4), id(3), 5.0)
        .expect("road exists");

    let detour = network.shortest_path(id(0), id(3));
    assert_eq!(detour.cost(), 7.0);
    assert_valid_chain(&network, id(0), id(3));

    network.reset();
    assert_eq!(network.weight(id(3), id(4)), 1.0);
    assert_eq!(network.shortest_path(id(0), id(3)).cost(), 3.0);
}

#[test]
fn perturbation_keeps_topology_and_symmetry() {
    let mut network = layouts::reference_district().expect("district builds");
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    for _ in 0..50 {
        let _ = network.perturb(&mut rng);
    }

    for from in network.locations() {
        for to in network.locations() {
            let (a, b) = (from.id(), to.id());
            assert_eq!(network.weight(a, b), network.weight(b, a));
            assert_eq!(network.weight(a, b) > 0.0, network.original_weight(a, b) > 0.0);
            assert!(network.weight(a, b) <= network.config().congestion_cap.max(network.original_weight(a, b)));
        }
    }
}

#[test]
fn stochastic_travel_is_bounded_by_the_delay_factor() {
    let network = layouts::reference_district().expect("district builds");
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    for _ in 0..100 {
        let route = network.travel_time(id(1), id(6), TravelMode::Stochastic, &mut rng);
        assert!(route.cost() >= 12.0);
        assert!(route.cost() <= 18.0);
    }
}
