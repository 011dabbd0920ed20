use crate::{location::Coordinate, post::Post};

/// Mean radius of the earth
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates using the haversine formula.
/// Symmetric, and exactly zero for identical coordinates.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let half_lat = (lat_b - lat_a).abs() / 2.0;
    let half_long = (b.longitude - a.longitude).abs().to_radians() / 2.0;

    let h = half_lat.sin().powi(2) + lat_a.cos() * lat_b.cos() * half_long.sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Order `posts` by ascending distance from `reference`.
///
/// Posts at exactly the same distance keep their relative order from `posts`.
pub fn rank_by_distance(posts: &[Post], reference: Coordinate) -> Vec<Post> {
    let mut ranked = posts
        .iter()
        .map(|post| (distance_meters(post.coordinate(), reference), post))
        .collect::<Vec<_>>();

    // sort_by is stable
    ranked.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    ranked.into_iter().map(|(_, post)| post.clone()).collect()
}
