use crate::geometry::{FloatType, WorldVector, reflect};

/// Direction of a ray crossing an interface between two media.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Refraction {
    Refracted(WorldVector),
    /// Angle of incidence is past the critical angle, the ray is mirrored instead.
    TotalInternalReflection(WorldVector),
}

impl Refraction {
    pub fn direction(&self) -> WorldVector {
        match self {
            Refraction::Refracted(d) | Refraction::TotalInternalReflection(d) => *d,
        }
    }
}

/// Bends `direction` by Snell's law when passing from a medium with index `n1` to `n2`.
/// Both vectors are unit length and `normal` faces against `direction`.
pub fn refract(
    direction: &WorldVector,
    normal: &WorldVector,
    n1: FloatType,
    n2: FloatType,
) -> Refraction {
    let eta = n1 / n2;
    let cos_incident = -normal.dot(direction);
    let k = 1.0 - eta * eta * (1.0 - cos_incident * cos_incident);

    if k < 0.0 {
        Refraction::TotalInternalReflection(reflect(direction, normal))
    } else {
        Refraction::Refracted((direction * eta + normal * (eta * cos_incident - k.sqrt())).normalize())
    }
}
