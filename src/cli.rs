use std::{f32::consts::PI, path::Path, sync::Arc};

use anyhow::Context as _;
use indicatif::{ProgressBar, ProgressStyle};
use photonpath::{
    BrdfDataset, Camera, Color, ColorExt as _, LightingModel, Material, PhotonSettings,
    RenderSettings, Scene, Shape, Surface, TriangleMesh,
    geometry::{ScreenSize, Triangle, WorldPoint, WorldVector},
    render,
    scene::{Light, Plane, Sphere},
};

const OUTPUT_PATH: &str = "render.png";

/// Usage: photonpath-cli [MESH.ply|MESH.obj] [BRDF_DIRECTIONS BRDF_WEIGHTS]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mesh = match args.first() {
        Some(path) => load_mesh(Path::new(path))?,
        None => torus(1.2, 0.4, 48, 24)?,
    };

    let brdf = match (args.get(1), args.get(2)) {
        (Some(directions), Some(weights)) => Some(Arc::new(
            BrdfDataset::load(directions, weights).context("Loading BRDF dataset")?,
        )),
        _ => None,
    };

    let scene = demo_scene(mesh, brdf.is_some());
    let camera = Camera::builder()
        .center(WorldPoint::new(0.0, 2.5, 9.0))
        .forward(WorldVector::new(0.0, -0.25, -1.0))
        .up(WorldVector::new(0.0, 1.0, 0.0))
        .resolution(ScreenSize::new(960, 640))
        .vertical_fov(45.0)
        .build();
    let settings = RenderSettings::builder()
        .tile_size(32.try_into()?)
        .sample_count(16.try_into()?)
        .lighting(LightingModel::Phong)
        .photons(
            PhotonSettings::builder()
                .photon_count(50_000)
                .gather_rays(8)
                .gather_radius(0.3)
                .build(),
        )
        .build();

    let bar = ProgressBar::no_length().with_style(ProgressStyle::with_template(
        "{wide_bar} {pos}/{len} tiles, {elapsed} elapsed, eta {eta}",
    )?);
    let mut render_progress = render(scene, camera, settings, brdf, |_| {}, {
        let bar = bar.clone();
        move |_| bar.inc(1)
    })?;
    bar.set_length(render_progress.progress().1 as u64);

    render_progress.wait();
    bar.finish();

    render_progress
        .image()
        .lock()
        .map_err(|_| anyhow::anyhow!("Render worker panicked"))?
        .save(OUTPUT_PATH)
        .with_context(|| format!("Saving {OUTPUT_PATH}"))?;
    log::info!("Saved {OUTPUT_PATH}");

    Ok(())
}

fn load_mesh(path: &Path) -> anyhow::Result<TriangleMesh> {
    let mesh = match path.extension().and_then(|e| e.to_str()) {
        Some("ply") => TriangleMesh::from_ply(path),
        _ => TriangleMesh::from_obj(path),
    };
    mesh.with_context(|| format!("Loading mesh {}", path.display()))
}

/// Torus around the y axis, centered at the origin.
fn torus(
    major_radius: f32,
    minor_radius: f32,
    major_segments: usize,
    minor_segments: usize,
) -> anyhow::Result<TriangleMesh> {
    let positions = itertools::iproduct!(0..major_segments, 0..minor_segments)
        .map(|(i, j)| {
            let u = 2.0 * PI * i as f32 / major_segments as f32;
            let v = 2.0 * PI * j as f32 / minor_segments as f32;
            let r = major_radius + minor_radius * v.cos();
            WorldPoint::new(r * u.cos(), minor_radius * v.sin(), r * u.sin())
        })
        .collect();

    let index = |i: usize, j: usize| (i % major_segments) * minor_segments + j % minor_segments;
    let faces = itertools::iproduct!(0..major_segments, 0..minor_segments)
        .flat_map(|(i, j)| {
            [
                Triangle::new(index(i, j), index(i, j + 1), index(i + 1, j)),
                Triangle::new(index(i + 1, j), index(i, j + 1), index(i + 1, j + 1)),
            ]
        })
        .collect();

    Ok(TriangleMesh::new(positions, None, faces)?)
}

fn demo_scene(mesh: TriangleMesh, measured_brdf: bool) -> Scene {
    let mut scene = Scene::new(Light::new(WorldPoint::new(0.0, 6.0, 2.0)));
    scene.background = Color::new(0.05, 0.05, 0.1);

    scene.add(
        Shape::Plane(Plane::axis_aligned(
            WorldPoint::new(-8.0, -1.0, -8.0),
            WorldPoint::new(8.0, -1.0, 8.0),
        )),
        Material::builder()
            .diffuse(Color::gray(0.9))
            .specular(Color::black())
            .surface(Surface::Checkerboard {
                color: Color::new(0.2, 0.2, 0.3),
                cell_size: 1.0,
            })
            .build(),
    );
    scene.add(
        Shape::Plane(Plane::axis_aligned(
            WorldPoint::new(-8.0, -1.0, -4.0),
            WorldPoint::new(8.0, 7.0, -4.0),
        )),
        Material::builder().diffuse(Color::new(0.7, 0.3, 0.25)).build(),
    );
    scene.add(
        Shape::Sphere(Sphere::new(WorldPoint::new(-2.5, 0.0, -1.0), 1.0)),
        Material::builder()
            .specular(Color::gray(0.9))
            .surface(Surface::Mirror)
            .build(),
    );
    scene.add(
        Shape::Sphere(Sphere::new(WorldPoint::new(2.5, 0.0, 0.5), 1.0)),
        Material::builder()
            .surface(Surface::Dielectric {
                refractive_index: 1.5,
                absorption: Color::new(0.3, 0.05, 0.1),
            })
            .build(),
    );

    let surface = if measured_brdf {
        Surface::MeasuredBrdf { index: 0 }
    } else {
        Surface::Flat
    };
    scene.add(
        Shape::Mesh(mesh),
        Material::builder()
            .diffuse(Color::new(0.3, 0.6, 0.9))
            .shininess(40.0)
            .surface(surface)
            .build(),
    );

    scene
}
