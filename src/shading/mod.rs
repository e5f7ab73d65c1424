//! Coloring of ray hits.
//!
//! Mirrors and dielectrics recurse into further rays, depth counts the number of such
//! bounces and is capped by `RenderSettings::max_depth`. Past the cap these surfaces
//! are shaded by their local lighting instead.

mod brdf;
mod refraction;

pub use brdf::{BrdfDataset, BrdfLoadError, CANONICAL_DIRECTION_COUNT, RADIUS_DOUBLINGS};
pub use refraction::{Refraction, refract};

use nalgebra::Unit;
use rand::Rng;

use crate::{
    camera::Camera,
    geometry::{EPSILON, FloatType, Ray, ScreenPoint, WorldPoint, WorldVector, reflect, tangent_frame},
    material::{Material, Surface},
    photon_map::PhotonMap,
    renderer::{LightingModel, RenderSettings},
    scene::{Intersection, ObjectIdx, QueryOptions, Scene},
    util::{Color, ColorExt as _},
};

/// Everything needed to compute the color of a ray.
/// Only holds shared references, so a single tracer can be used from many threads.
#[derive(Copy, Clone, Debug)]
pub struct Tracer<'a> {
    scene: &'a Scene,
    settings: &'a RenderSettings,
    brdf: Option<&'a BrdfDataset>,
    photon_map: Option<&'a PhotonMap>,
    options: QueryOptions,
}

/// Direct light arriving at a surface point.
struct LightSample {
    direction: Unit<WorldVector>,
    /// 1 for points seeing the light, shadow factor otherwise
    visibility: FloatType,
}

impl<'a> Tracer<'a> {
    pub fn new(scene: &'a Scene, settings: &'a RenderSettings) -> Tracer<'a> {
        Tracer {
            scene,
            settings,
            brdf: None,
            photon_map: None,
            options: settings.query_options(),
        }
    }

    pub fn with_brdf(mut self, dataset: Option<&'a BrdfDataset>) -> Tracer<'a> {
        self.brdf = dataset;
        self
    }

    pub fn with_photon_map(mut self, photon_map: Option<&'a PhotonMap>) -> Tracer<'a> {
        self.photon_map = photon_map;
        self
    }

    /// Averages `sample_count` jittered camera rays through the pixel.
    pub fn render_pixel(
        &self,
        camera: &Camera,
        point: &ScreenPoint,
        rng: &mut impl Rng,
    ) -> Color {
        let sample_count = self.settings.sample_count.get();
        let mut pixel_sum = Color::black();
        for _ in 0..sample_count {
            let ray = camera.sample_ray(point, rng);
            pixel_sum += self.trace_primary(&ray, rng);
        }
        pixel_sum * (1.0 / sample_count as FloatType)
    }

    /// Color of a camera ray, background if it misses.
    pub fn trace_primary(&self, ray: &Ray, rng: &mut impl Rng) -> Color {
        self.trace(None, ray.origin, ray.direction, 0, rng)
            .map_or(self.scene.background, |(color, _)| color)
    }

    /// Color of the nearest surface along a ray and its distance, None on miss.
    pub fn trace(
        &self,
        exclude: Option<ObjectIdx>,
        origin: WorldPoint,
        direction: WorldVector,
        depth: u32,
        rng: &mut impl Rng,
    ) -> Option<(Color, FloatType)> {
        let hit = self
            .scene
            .closest_hit(exclude, origin, direction, &self.options)?;
        Some((self.shade(&hit, depth, rng), hit.distance))
    }

    pub fn shade(&self, hit: &Intersection, depth: u32, rng: &mut impl Rng) -> Color {
        let material = self.scene.object(hit.object).material();
        let can_recurse = depth < self.settings.max_depth;

        match material.surface {
            Surface::Mirror if can_recurse => self.mirror(hit, material, depth, rng),
            Surface::Dielectric {
                refractive_index,
                absorption,
            } if can_recurse => self.dielectric(hit, refractive_index, &absorption, depth, rng),
            Surface::MeasuredBrdf { index } if self.settings.lighting == LightingModel::Phong => {
                self.measured_brdf(hit, material, index, rng)
            }
            _ => self.local(hit, material, rng),
        }
    }

    /// Shading without any recursion.
    fn local(&self, hit: &Intersection, material: &Material, rng: &mut impl Rng) -> Color {
        let surface_color = self.scene.object(hit.object).surface_color(&hit.point);

        match self.settings.lighting {
            LightingModel::Flat => material.emission + surface_color,
            LightingModel::Phong => {
                let color = self.phong(hit, material, &surface_color);
                let receives_photons =
                    matches!(material.surface, Surface::Flat | Surface::Checkerboard { .. });
                match self.photon_map {
                    Some(photon_map) if receives_photons => {
                        color
                            + photon_map.indirect_light(
                                self.scene,
                                &hit.point,
                                &facing_normal(hit),
                                &surface_color,
                                &material.specular,
                                &self.settings.photons,
                                &self.options,
                                rng,
                            )
                    }
                    _ => color,
                }
            }
        }
    }

    fn phong(&self, hit: &Intersection, material: &Material, surface_color: &Color) -> Color {
        let light = &self.scene.light;
        let normal = facing_normal(hit);
        let sample = self.light_sample(&hit.point, &normal);

        let n_dot_l = normal.dot(sample.direction.as_ref());
        let (diffuse, specular) = if n_dot_l > 0.0 {
            let view = -hit.ray.direction;
            let reflected = reflect(&-sample.direction.into_inner(), &normal);
            let r_dot_v = reflected.dot(&view).max(0.0);
            (
                surface_color.modulate(&light.emission) * n_dot_l,
                material.specular.modulate(&light.emission) * r_dot_v.powf(material.shininess),
            )
        } else {
            (Color::black(), Color::black())
        };

        material.emission
            + material.ambient.modulate(&light.ambient)
            + (diffuse + specular) * sample.visibility
    }

    fn measured_brdf(
        &self,
        hit: &Intersection,
        material: &Material,
        index: usize,
        rng: &mut impl Rng,
    ) -> Color {
        let Some(dataset) = self.brdf else {
            panic!("Material uses measured BRDF {index}, but no BRDF dataset was provided");
        };

        let light = &self.scene.light;
        let normal = facing_normal(hit);
        let sample = self.light_sample(&hit.point, &normal);
        let n_dot_l = normal.dot(sample.direction.as_ref()).max(0.0);

        let (tangent, bitangent) = tangent_frame(&normal);
        let to_local = |v: &WorldVector| {
            WorldVector::new(v.dot(&tangent), v.dot(&bitangent), v.dot(normal.as_ref()))
        };
        let luminosity = dataset.luminosity(
            index,
            &to_local(sample.direction.as_ref()),
            &to_local(&-hit.ray.direction),
            self.settings.brdf_sample_count,
            rng,
        );

        let surface_color = self.scene.object(hit.object).surface_color(&hit.point);
        material.emission
            + material.ambient.modulate(&light.ambient)
            + surface_color.modulate(&light.emission) * (sample.visibility * luminosity * n_dot_l)
    }

    fn mirror(
        &self,
        hit: &Intersection,
        material: &Material,
        depth: u32,
        rng: &mut impl Rng,
    ) -> Color {
        let direction = reflect(&hit.ray.direction, &facing_normal(hit));
        let reflected = self
            .trace(Some(hit.object), hit.point, direction, depth + 1, rng)
            .map_or(self.scene.light.ambient, |(color, _)| color);
        reflected.modulate(&material.specular)
    }

    fn dielectric(
        &self,
        hit: &Intersection,
        refractive_index: FloatType,
        absorption: &Color,
        depth: u32,
        rng: &mut impl Rng,
    ) -> Color {
        let direction = hit.ray.direction;
        let entering = hit.normal.dot(&direction) < 0.0;
        let (normal, n1, n2) = if entering {
            (hit.normal.into_inner(), self.scene.aether_index, refractive_index)
        } else {
            (-hit.normal.into_inner(), refractive_index, self.scene.aether_index)
        };

        let refraction = refract(&direction, &normal, n1, n2);
        let Some((color, distance)) =
            self.trace(None, hit.point, refraction.direction(), depth + 1, rng)
        else {
            return self.scene.light.ambient;
        };

        match refraction {
            Refraction::Refracted(_) if entering => color.modulate(&Color::new(
                (-absorption.r * distance).exp(),
                (-absorption.g * distance).exp(),
                (-absorption.b * distance).exp(),
            )),
            _ => color,
        }
    }

    /// Direction towards the light and whether it is blocked.
    fn light_sample(&self, point: &WorldPoint, normal: &Unit<WorldVector>) -> LightSample {
        let to_light = self.scene.light.position - point;
        let distance = to_light.norm();
        let Some(direction) = Unit::try_new(to_light, EPSILON) else {
            return LightSample {
                direction: *normal,
                visibility: 1.0,
            };
        };

        let occluded = self
            .scene
            .closest_hit(None, *point, direction.into_inner(), &self.options)
            .is_some_and(|occluder| occluder.distance < distance);

        LightSample {
            direction,
            visibility: if occluded {
                self.settings.shadow_factor
            } else {
                1.0
            },
        }
    }
}

/// Surface normal turned towards the ray origin.
fn facing_normal(hit: &Intersection) -> Unit<WorldVector> {
    if hit.normal.dot(&hit.ray.direction) > 0.0 {
        -hit.normal
    } else {
        hit.normal
    }
}
