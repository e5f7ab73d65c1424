mod camera;
pub mod geometry;
pub mod material;
pub mod photon_map;
mod renderer;
pub mod scene;
mod screen_block;
pub mod shading;
pub mod util;

pub use crate::renderer::{LightingModel, RenderProgress, RenderSettings, render};
pub use camera::Camera;
pub use material::{Material, Surface};
pub use photon_map::{PhotonMap, PhotonSettings};
pub use scene::{Light, Scene, Shape, TriangleMesh};
pub use screen_block::ScreenBlockExt;
pub use shading::{BrdfDataset, Tracer};
pub use util::{Color, ColorExt};
