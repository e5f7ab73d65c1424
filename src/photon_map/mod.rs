//! Photon mapping for indirect illumination.
//!
//! Photons are traced from the light before rendering and stored in a KD-tree. Shading
//! points gather the photons around the surfaces visible from them.

mod tree;

pub use tree::PhotonTree;

use bon::Builder;
use nalgebra::Unit;
use rand::Rng;

use crate::{
    geometry::{FloatType, WorldPoint, WorldVector, cosine_hemisphere, reflect},
    scene::{QueryOptions, Scene},
    util::{Color, ColorExt as _},
};

/// Which kind of bounce deposited a photon.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BounceKind {
    Diffuse,
    Specular,
}

#[derive(Clone, Debug)]
pub struct Photon {
    pub color: Color,
    pub position: WorldPoint,
    /// Direction the photon was travelling when it hit, normalized.
    pub incoming: WorldVector,
    pub intensity: FloatType,
    pub kind: BounceKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct PhotonSettings {
    /// Number of photons emitted from the light, zero disables photon mapping.
    #[builder(default = 0)]
    pub photon_count: usize,
    #[builder(default = 4)]
    pub max_bounces: u32,
    /// Probability of a bounce being diffuse.
    #[builder(default = 0.5)]
    pub diffuse_probability: FloatType,
    /// Probability of a bounce being specular, the remaining probability absorbs the photon.
    #[builder(default = 0.2)]
    pub specular_probability: FloatType,
    /// Intensity multiplier applied at each bounce.
    #[builder(default = 0.7)]
    pub decay: FloatType,
    /// Number of secondary rays cast when gathering.
    #[builder(default = 16)]
    pub gather_rays: u32,
    #[builder(default = 0.5)]
    pub gather_radius: FloatType,
}

impl Default for PhotonSettings {
    fn default() -> Self {
        PhotonSettings::builder().build()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PhotonMap {
    tree: PhotonTree,
}

impl PhotonMap {
    /// Traces `settings.photon_count` photons from the scene light.
    pub fn build(
        scene: &Scene,
        settings: &PhotonSettings,
        options: &QueryOptions,
        rng: &mut impl Rng,
    ) -> PhotonMap {
        let mut photons = Vec::new();
        for _ in 0..settings.photon_count {
            trace_photon(scene, settings, options, rng, &mut photons);
        }

        let tree = PhotonTree::build(photons);
        log::info!(
            "Photon map built: {} photons stored from {} emitted",
            tree.len(),
            settings.photon_count
        );
        let depth = tree.depth_statistics();
        log::debug!("Photon tree depth: {depth}");

        PhotonMap { tree }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn tree(&self) -> &PhotonTree {
        &self.tree
    }

    /// Estimates light arriving at `point` indirectly, as (diffuse, specular) colors.
    ///
    /// Casts cosine weighted rays about `normal` and collects photons around each hit,
    /// weighted by their intensity, their distance from the hit and the angle of incidence.
    /// The sums are averaged over the rays that hit something.
    pub fn gather(
        &self,
        scene: &Scene,
        point: &WorldPoint,
        normal: &Unit<WorldVector>,
        settings: &PhotonSettings,
        options: &QueryOptions,
        rng: &mut impl Rng,
    ) -> (Color, Color) {
        let mut diffuse = Color::black();
        let mut specular = Color::black();

        if self.is_empty() || settings.gather_radius <= 0.0 {
            return (diffuse, specular);
        }

        let mut hit_count = 0u32;
        for _ in 0..settings.gather_rays {
            let direction = cosine_hemisphere(normal, rng);
            let Some(hit) = scene.closest_hit(None, *point, direction, options) else {
                continue;
            };
            hit_count += 1;

            self.tree
                .for_each_within(&hit.point, settings.gather_radius, |photon, distance| {
                    let falloff = 1.0 - distance / settings.gather_radius;
                    let angle = (-photon.incoming.dot(hit.normal.as_ref())).max(0.0);
                    let contribution = photon.color * (photon.intensity * falloff * angle);
                    match photon.kind {
                        BounceKind::Diffuse => diffuse += contribution,
                        BounceKind::Specular => specular += contribution,
                    }
                });
        }

        if hit_count == 0 {
            return (Color::black(), Color::black());
        }

        let scale = 1.0 / hit_count as FloatType;
        (diffuse * scale, specular * scale)
    }

    /// Indirect light reflected by a surface with the given diffuse and specular colors.
    #[allow(clippy::too_many_arguments)]
    pub fn indirect_light(
        &self,
        scene: &Scene,
        point: &WorldPoint,
        normal: &Unit<WorldVector>,
        diffuse_color: &Color,
        specular_color: &Color,
        settings: &PhotonSettings,
        options: &QueryOptions,
        rng: &mut impl Rng,
    ) -> Color {
        let (diffuse, specular) = self.gather(scene, point, normal, settings, options, rng);
        diffuse.modulate(diffuse_color) + specular.modulate(specular_color)
    }
}

/// Follows a single photon from the light, storing one photon record per bounce.
fn trace_photon(
    scene: &Scene,
    settings: &PhotonSettings,
    options: &QueryOptions,
    rng: &mut impl Rng,
    photons: &mut Vec<Photon>,
) {
    let light = &scene.light;
    let mut origin = light.position;
    let mut direction = cosine_hemisphere(&light.direction, rng);
    let mut color = light.emission;
    let mut intensity: FloatType = 1.0;

    for _ in 0..settings.max_bounces {
        let roll: FloatType = rng.random();
        let kind = if roll < settings.diffuse_probability {
            BounceKind::Diffuse
        } else if roll < settings.diffuse_probability + settings.specular_probability {
            BounceKind::Specular
        } else {
            return;
        };

        let Some(hit) = scene.closest_hit(None, origin, direction, options) else {
            return;
        };

        color = color.modulate(&scene.object(hit.object).surface_color(&hit.point));
        intensity *= settings.decay;
        photons.push(Photon {
            color,
            position: hit.point,
            incoming: hit.ray.direction,
            intensity,
            kind,
        });

        // Continue on the side the photon came from
        let normal = if hit.normal.dot(&hit.ray.direction) > 0.0 {
            -hit.normal
        } else {
            hit.normal
        };
        origin = hit.point;
        direction = match kind {
            BounceKind::Diffuse => cosine_hemisphere(&normal, rng),
            BounceKind::Specular => reflect(&hit.ray.direction, &normal),
        };
    }
}
