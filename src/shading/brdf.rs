//! Measured BRDF lookup.
//!
//! The dataset samples reflectance of each material at a fixed set of canonical
//! (incoming, outgoing) direction pairs. Lookups map a direction pair to a 3D similarity
//! coordinate and average the weights of nearby canonical entries.

use std::{f32::consts::PI, fs, path::Path};

use rand::Rng;
use thiserror::Error;

use crate::geometry::{FloatType, WorldVector};

/// Number of direction pairs in a dataset file.
pub const CANONICAL_DIRECTION_COUNT: usize = 205;

/// How many times the search radius is doubled before a lookup gives up.
pub const RADIUS_DOUBLINGS: u32 = 4;

const INITIAL_RADIUS: FloatType = 0.1;

/// Jittered lookups are offset by up to this much along each similarity axis.
const JITTER: FloatType = INITIAL_RADIUS / 2.0;

#[derive(Debug, Error)]
pub enum BrdfLoadError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Expected {expected} directions, found {found}")]
    DirectionCount { expected: usize, found: usize },

    #[error("Material {material} has {found} weights, expected {expected}")]
    WeightCount {
        material: usize,
        expected: usize,
        found: usize,
    },
}

/// Measured reflectance table, immutable once loaded.
#[derive(Clone, Debug)]
pub struct BrdfDataset {
    /// Similarity coordinates of the canonical direction pairs.
    coordinates: Vec<WorldVector>,
    /// Weights per material, aligned with `coordinates`.
    weights: Vec<Vec<FloatType>>,
}

impl BrdfDataset {
    /// Builds a dataset from (θi, φi, θo, φo) direction pairs in radians and per material weights.
    pub fn new(
        directions: &[[FloatType; 4]],
        weights: Vec<Vec<FloatType>>,
    ) -> Result<BrdfDataset, BrdfLoadError> {
        if let Some((material, row)) = weights
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != directions.len())
        {
            return Err(BrdfLoadError::WeightCount {
                material,
                expected: directions.len(),
                found: row.len(),
            });
        }

        let coordinates = directions
            .iter()
            .map(|&[theta_i, phi_i, theta_o, phi_o]| {
                similarity_coordinate(theta_i, phi_i, theta_o, phi_o)
            })
            .collect();

        Ok(BrdfDataset {
            coordinates,
            weights,
        })
    }

    /// Loads the directions file and the weights file.
    pub fn load(
        directions_path: impl AsRef<Path>,
        weights_path: impl AsRef<Path>,
    ) -> Result<BrdfDataset, BrdfLoadError> {
        let directions = fs::read_to_string(directions_path)?;
        let weights = fs::read_to_string(weights_path)?;
        let dataset = Self::from_strs(&directions, &weights)?;
        log::info!(
            "Loaded BRDF dataset with {} materials",
            dataset.material_count()
        );
        Ok(dataset)
    }

    pub fn from_strs(directions: &str, weights: &str) -> Result<BrdfDataset, BrdfLoadError> {
        let directions = parse_rows(directions)?
            .into_iter()
            .map(|(line, row)| {
                <[FloatType; 4]>::try_from(row).map_err(|row| BrdfLoadError::ParseError {
                    line,
                    message: format!("Expected 4 angles, found {}", row.len()),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if directions.len() != CANONICAL_DIRECTION_COUNT {
            return Err(BrdfLoadError::DirectionCount {
                expected: CANONICAL_DIRECTION_COUNT,
                found: directions.len(),
            });
        }

        let weights = parse_rows(weights)?
            .into_iter()
            .map(|(_, row)| row)
            .collect();

        Self::new(&directions, weights)
    }

    pub fn material_count(&self) -> usize {
        self.weights.len()
    }

    /// Scalar reflectance of `material` for light arriving from `incoming` and leaving
    /// towards `outgoing`, both unit vectors in the surface tangent frame (z is the normal).
    ///
    /// Averages `sample_count` jittered lookups, a single exact lookup if zero.
    ///
    /// # Panics
    /// If `material` is not in the dataset.
    pub fn luminosity(
        &self,
        material: usize,
        incoming: &WorldVector,
        outgoing: &WorldVector,
        sample_count: u32,
        rng: &mut impl Rng,
    ) -> FloatType {
        assert!(
            material < self.material_count(),
            "BRDF material {material} out of range, dataset has {} materials",
            self.material_count()
        );

        let (theta_i, phi_i) = spherical_angles(incoming);
        let (theta_o, phi_o) = spherical_angles(outgoing);
        let coordinate = similarity_coordinate(theta_i, phi_i, theta_o, phi_o);

        if sample_count == 0 {
            return self.lookup(material, &coordinate);
        }

        let sum: FloatType = (0..sample_count)
            .map(|_| {
                let offset = WorldVector::from_fn(|_, _| rng.random_range(-JITTER..=JITTER));
                self.lookup(material, &(coordinate + offset))
            })
            .sum();
        sum / sample_count as FloatType
    }

    /// Gaussian weighted average of the entries around `coordinate`.
    fn lookup(&self, material: usize, coordinate: &WorldVector) -> FloatType {
        let weights = &self.weights[material];
        let mut radius = INITIAL_RADIUS;

        for _ in 0..=RADIUS_DOUBLINGS {
            let sigma = radius / 2.0;
            let (weighted_sum, weight_sum) = self
                .coordinates
                .iter()
                .zip(weights)
                .map(|(entry, weight)| ((entry - coordinate).norm_squared(), weight))
                .filter(|(distance_squared, _)| *distance_squared <= radius * radius)
                .fold((0.0, 0.0), |(weighted_sum, weight_sum), (distance_squared, weight)| {
                    let g = (-distance_squared / (2.0 * sigma * sigma)).exp();
                    (weighted_sum + g * weight, weight_sum + g)
                });

            if weight_sum > 0.0 {
                return weighted_sum / weight_sum;
            }
            radius *= 2.0;
        }

        0.0
    }
}

/// Maps a direction pair to (sin θi sin θo, Δφ/π, cos θi cos θo), Δφ wrapped into [0, π].
fn similarity_coordinate(
    theta_i: FloatType,
    phi_i: FloatType,
    theta_o: FloatType,
    phi_o: FloatType,
) -> WorldVector {
    let delta_phi = (phi_o - phi_i).abs().rem_euclid(2.0 * PI);
    let delta_phi = if delta_phi > PI {
        2.0 * PI - delta_phi
    } else {
        delta_phi
    };

    WorldVector::new(
        theta_i.sin() * theta_o.sin(),
        delta_phi / PI,
        theta_i.cos() * theta_o.cos(),
    )
}

/// Polar angle from the z axis and azimuth of a unit vector.
fn spherical_angles(v: &WorldVector) -> (FloatType, FloatType) {
    (v.z.clamp(-1.0, 1.0).acos(), v.y.atan2(v.x))
}

/// Parses whitespace separated numbers, one row per non-empty line, `#` starts a comment.
/// Returns rows with their 1-based line numbers.
fn parse_rows(content: &str) -> Result<Vec<(usize, Vec<FloatType>)>, BrdfLoadError> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line_number, line)| {
            let row = line
                .split_whitespace()
                .map(|token| {
                    token.parse().map_err(|_| BrdfLoadError::ParseError {
                        line: line_number,
                        message: format!("Invalid number {token:?}"),
                    })
                })
                .collect::<Result<Vec<FloatType>, _>>()?;
            Ok((line_number, row))
        })
        .collect()
}

#[cfg(test)]
pub mod test {
    use super::*;
    use assert2::{assert, let_assert};
    use rand::{SeedableRng, rngs::SmallRng};
    use std::fmt::Write as _;

    /// Canonical directions spread over the hemisphere, deterministic.
    pub fn canonical_directions() -> Vec<[FloatType; 4]> {
        (0..CANONICAL_DIRECTION_COUNT)
            .map(|i| {
                let f = i as FloatType;
                [
                    (f * 0.37).rem_euclid(PI / 2.0),
                    (f * 1.13).rem_euclid(2.0 * PI),
                    (f * 0.71).rem_euclid(PI / 2.0),
                    (f * 2.29).rem_euclid(2.0 * PI),
                ]
            })
            .collect()
    }

    /// Dataset with material 0 constant 0.5, material 1 equal to cos θi cos θo.
    pub fn test_dataset() -> BrdfDataset {
        let directions = canonical_directions();
        let constant = vec![0.5; directions.len()];
        let cosine = directions
            .iter()
            .map(|[theta_i, _, theta_o, _]| theta_i.cos() * theta_o.cos())
            .collect();
        BrdfDataset::new(&directions, vec![constant, cosine]).unwrap()
    }

    #[test]
    fn delta_phi_is_wrapped() {
        let a = similarity_coordinate(0.5, 0.1, 0.5, 2.0 * PI - 0.1);
        let b = similarity_coordinate(0.5, 0.0, 0.5, 0.2);
        assert!((a - b).norm() < 1e-5);
        assert!(a.y >= 0.0 && a.y <= 1.0);
    }

    #[test]
    fn constant_material_gives_constant_luminosity() {
        let dataset = test_dataset();
        let mut rng = SmallRng::seed_from_u64(3);
        let incoming = WorldVector::new(0.3, 0.1, 0.9).normalize();
        let outgoing = WorldVector::new(-0.2, 0.4, 0.8).normalize();
        for samples in [0, 1, 8] {
            let lum = dataset.luminosity(0, &incoming, &outgoing, samples, &mut rng);
            assert!((lum - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn exact_lookup_at_entry_is_close_to_its_weight() {
        let dataset = test_dataset();
        let coordinate = dataset.coordinates[10];
        let expected = coordinate.z;
        assert!((dataset.lookup(1, &coordinate) - expected).abs() < 0.1);
    }

    #[test]
    fn far_away_coordinate_gives_zero() {
        let dataset = test_dataset();
        let far = WorldVector::new(100.0, 100.0, 100.0);
        assert!(dataset.lookup(0, &far) == 0.0);
    }

    #[test]
    #[should_panic]
    fn material_out_of_range_panics() {
        let dataset = test_dataset();
        let mut rng = SmallRng::seed_from_u64(0);
        dataset.luminosity(2, &WorldVector::z(), &WorldVector::z(), 1, &mut rng);
    }

    #[test]
    fn parse_files() {
        let mut directions = String::from("# theta_i phi_i theta_o phi_o\n");
        for [a, b, c, d] in canonical_directions() {
            writeln!(directions, "{a} {b} {c} {d}").unwrap();
        }
        let weights = "0.25 ".repeat(CANONICAL_DIRECTION_COUNT) + "\n\n# second\n"
            + &"1 ".repeat(CANONICAL_DIRECTION_COUNT);

        let dataset = BrdfDataset::from_strs(&directions, &weights).unwrap();
        assert!(dataset.material_count() == 2);
    }

    #[test]
    fn wrong_direction_count() {
        let_assert!(
            Err(BrdfLoadError::DirectionCount { found: 1, .. }) =
                BrdfDataset::from_strs("0 0 0 0\n", "")
        );
    }

    #[test]
    fn wrong_weight_count() {
        let directions = canonical_directions();
        let_assert!(
            Err(BrdfLoadError::WeightCount { material: 1, found: 3, .. }) =
                BrdfDataset::new(&directions, vec![vec![0.0; directions.len()], vec![0.0; 3]])
        );
    }

    #[test]
    fn malformed_number() {
        let_assert!(
            Err(BrdfLoadError::ParseError { line: 2, .. }) =
                BrdfDataset::from_strs("0 0 0 0\n0 x 0 0\n", "")
        );
    }
}
