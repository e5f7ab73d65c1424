mod machinery;
mod worker;

use std::num::NonZeroU32;

use bon::Builder;

pub use crate::renderer::machinery::{RenderProgress, render};
use crate::{geometry::FloatType, photon_map::PhotonSettings, scene::QueryOptions};

/// Local illumination model for diffuse surfaces.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LightingModel {
    /// Emission plus surface color, no light or shadows.
    Flat,
    #[default]
    Phong,
}

#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct RenderSettings {
    #[builder(default = NonZeroU32::new(32).unwrap_or(NonZeroU32::MIN))]
    pub tile_size: NonZeroU32,
    /// Jittered camera rays per pixel.
    #[builder(default = NonZeroU32::MIN)]
    pub sample_count: NonZeroU32,
    /// Jittered lookups per measured BRDF evaluation.
    #[builder(default = 4)]
    pub brdf_sample_count: u32,
    /// Maximum number of mirror or refraction bounces along a path.
    #[builder(default = 8)]
    pub max_depth: u32,
    /// Use KD-trees for mesh intersections.
    #[builder(default = true)]
    pub accelerate: bool,
    #[builder(default)]
    pub lighting: LightingModel,
    /// Multiplier of direct light for shadowed points.
    #[builder(default = 0.2)]
    pub shadow_factor: FloatType,
    #[builder(default)]
    pub photons: PhotonSettings,
    /// Seed of all random sampling, equal seeds give equal images.
    #[builder(default = 0)]
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings::builder().build()
    }
}

impl RenderSettings {
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            accelerate: self.accelerate,
        }
    }
}
