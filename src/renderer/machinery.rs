use std::{
    ops::Deref as _,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use image::{GenericImage, GenericImageView, RgbImage};
use rand::{SeedableRng, rngs::SmallRng};

use crate::{
    camera::Camera,
    geometry::ScreenBlock,
    photon_map::PhotonMap,
    renderer::{RenderSettings, worker::Worker},
    scene::Scene,
    screen_block::ScreenBlockExt,
    shading::{BrdfDataset, Tracer},
};

/// Starts rendering `scene` on one worker thread per core and returns immediately.
///
/// The photon map (if `settings.photons.photon_count` is nonzero) is built on the calling
/// thread before any worker starts.
pub fn render<F1, F2>(
    scene: Scene,
    camera: Camera,
    settings: RenderSettings,
    brdf: Option<Arc<BrdfDataset>>,
    started_tile_callback: F1,
    finished_tile_callback: F2,
) -> anyhow::Result<RenderProgress>
where
    F1: Fn(ScreenBlock) + Send + Sync + 'static,
    F2: Fn(ScreenBlock) + Send + Sync + 'static,
{
    let resolution = camera.resolution();

    let photon_map = (settings.photons.photon_count > 0).then(|| {
        let mut rng = SmallRng::seed_from_u64(settings.seed);
        PhotonMap::build(
            &scene,
            &settings.photons,
            &settings.query_options(),
            &mut rng,
        )
    });

    let state = Arc::new(RenderState {
        scene,
        camera,
        settings,
        brdf,
        photon_map,

        image: Mutex::new(RgbImage::new(resolution.x, resolution.y)),

        tile_ordering: ScreenBlock::from_size(resolution).tile_ordering(settings.tile_size),
        next_tile_index: AtomicUsize::new(0),
    });
    let started_tile_callback = Arc::new(started_tile_callback);
    let finished_tile_callback = Arc::new(finished_tile_callback);

    let cores: Vec<Option<core_affinity::CoreId>> = match core_affinity::get_core_ids() {
        Some(ids) if !ids.is_empty() => ids.into_iter().map(Some).collect(),
        _ => {
            log::warn!("CPU list not available, running unpinned workers");
            (0..num_cpus::get().max(1)).map(|_| None).collect()
        }
    };

    log::info!(
        "Rendering {}x{} pixels in {} tiles on {} threads",
        resolution.x,
        resolution.y,
        state.tile_ordering.len(),
        cores.len()
    );

    let threads = cores
        .into_iter()
        .enumerate()
        .map(|(worker_id, core)| {
            let state = Arc::clone(&state);
            let started_tile_callback = Arc::clone(&started_tile_callback);
            let finished_tile_callback = Arc::clone(&finished_tile_callback);

            thread::Builder::new()
                .name(format!("worker{worker_id}"))
                .spawn(move || {
                    if let Some(core) = core {
                        core_affinity::set_for_current(core);
                    }

                    let tracer = Tracer::new(&state.scene, &state.settings)
                        .with_brdf(state.brdf.as_deref())
                        .with_photon_map(state.photon_map.as_ref());
                    let mut worker = Worker::new(state.settings.tile_size);

                    while let Some((tile_index, tile)) = state.get_next_tile() {
                        (started_tile_callback)(*tile);

                        let buffer = worker.render_tile(
                            &tracer,
                            &state.camera,
                            state.settings.seed,
                            tile_index,
                            tile,
                        );
                        state
                            .image
                            .lock()
                            .expect("Poisoned lock!")
                            .copy_from(
                                buffer.view(0, 0, tile.width(), tile.height()).deref(),
                                tile.min.x,
                                tile.min.y,
                            )
                            .unwrap_or_else(|_| {
                                unreachable!("The buffer should always fit into the output")
                            });

                        (finished_tile_callback)(*tile);
                    }
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderProgress {
        render_state: state,
        threads,
    })
}

pub struct RenderProgress {
    render_state: Arc<RenderState>,
    threads: Vec<JoinHandle<()>>,
}

impl RenderProgress {
    /// Return number of processed and total tiles.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.render_state.tile_ordering.len();
        let processed = self
            .render_state
            .next_tile_index
            .load(Ordering::Acquire)
            .min(total);
        (processed, total)
    }

    pub fn progress_percent(&self) -> f32 {
        let (processed, total) = self.progress();
        if total == 0 {
            return 100.0;
        }
        100.0 * (processed as f32) / (total as f32)
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Signal the workers to abort.
    /// Any running workers will still finish their tiles, but no new ones will be started.
    pub fn abort(&self) {
        self.render_state
            .next_tile_index
            .store(self.render_state.tile_ordering.len(), Ordering::Release);
    }

    /// Block until all workers finish.
    /// Panics from workers are propagated.
    pub fn wait(&mut self) {
        for handle in self.threads.drain(..) {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
        log::info!("Rendering finished");
    }

    pub fn image(&self) -> &Mutex<RgbImage> {
        &self.render_state.image
    }

    pub fn photon_map(&self) -> Option<&PhotonMap> {
        self.render_state.photon_map.as_ref()
    }
}

struct RenderState {
    scene: Scene,
    camera: Camera,
    settings: RenderSettings,
    brdf: Option<Arc<BrdfDataset>>,
    photon_map: Option<PhotonMap>,

    image: Mutex<RgbImage>,

    tile_ordering: Vec<ScreenBlock>,
    next_tile_index: AtomicUsize,
}

impl RenderState {
    fn get_next_tile(&self) -> Option<(usize, &ScreenBlock)> {
        let id = self.next_tile_index.fetch_add(1, Ordering::AcqRel);
        self.tile_ordering.get(id).map(|tile| (id, tile))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{ScreenPoint, ScreenSize, WorldPoint, WorldVector},
        material::Material,
        photon_map::PhotonSettings,
        renderer::worker::tile_rng,
        scene::{Light, Plane, Shape, Sphere},
        util::{Color, color_to_image},
    };
    use assert2::assert;
    use std::{num::NonZeroU32, sync::atomic::AtomicU32};

    fn scene() -> Scene {
        let mut scene = Scene::new(Light::new(WorldPoint::new(0.0, 5.0, 5.0)));
        scene.add(
            Shape::Plane(Plane::axis_aligned(
                WorldPoint::new(-10.0, -1.0, -10.0),
                WorldPoint::new(10.0, -1.0, 10.0),
            )),
            Material::default(),
        );
        scene.add(
            Shape::Sphere(Sphere::new(WorldPoint::origin(), 1.0)),
            Material::builder().diffuse(Color::new(0.9, 0.2, 0.1)).build(),
        );
        scene
    }

    fn camera() -> Camera {
        Camera::builder()
            .center(WorldPoint::new(0.0, 0.0, 5.0))
            .forward(-WorldVector::z())
            .up(WorldVector::y())
            .resolution(ScreenSize::new(20, 12))
            .build()
    }

    fn settings() -> RenderSettings {
        RenderSettings::builder()
            .tile_size(NonZeroU32::new(8).unwrap())
            .sample_count(NonZeroU32::new(2).unwrap())
            .photons(
                PhotonSettings::builder()
                    .photon_count(200)
                    .gather_rays(4)
                    .build(),
            )
            .seed(17)
            .build()
    }

    fn render_image(settings: RenderSettings) -> (RgbImage, usize) {
        let finished = Arc::new(AtomicU32::new(0));
        let finished_in_callback = Arc::clone(&finished);
        let mut progress = render(
            scene(),
            camera(),
            settings,
            None,
            |_| {},
            move |_| {
                finished_in_callback.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();
        progress.wait();

        assert!(progress.is_finished());
        let (processed, total) = progress.progress();
        assert!(processed == total);
        assert!(finished.load(Ordering::Relaxed) as usize == total);
        assert!(progress.photon_map().is_some());

        let image = progress.image().lock().unwrap().clone();
        (image, total)
    }

    #[test]
    fn render_covers_image_with_all_tiles() {
        let (image, tile_count) = render_image(settings());
        assert!(image.dimensions() == (20, 12));
        // 3 x 2 tiles of 8 pixels
        assert!(tile_count == 6);

        // Sphere in the middle is red
        let center = image.get_pixel(10, 6);
        assert!(center[0] > center[2]);
    }

    #[test]
    fn equal_seeds_give_equal_images() {
        let (a, _) = render_image(settings());
        let (b, _) = render_image(settings());
        assert!(a == b);
    }

    #[test]
    fn render_matches_single_pixel_tracing() {
        let settings = RenderSettings::builder()
            .tile_size(NonZeroU32::new(8).unwrap())
            .sample_count(NonZeroU32::new(3).unwrap())
            .seed(5)
            .build();
        // Single tile, its first pixel starts the tile's random sequence
        let camera = Camera::builder()
            .center(WorldPoint::new(0.0, 0.0, 5.0))
            .forward(-WorldVector::z())
            .up(WorldVector::y())
            .resolution(ScreenSize::new(8, 8))
            .vertical_fov(20.0)
            .build();
        let mut progress = render(scene(), camera, settings, None, |_| {}, |_| {}).unwrap();
        progress.wait();
        let image = progress.image().lock().unwrap().clone();

        let scene = scene();
        let tracer = Tracer::new(&scene, &settings);
        let mut rng = tile_rng(settings.seed, 0);
        let expected = tracer.render_pixel(&camera, &ScreenPoint::new(0, 0), &mut rng);
        assert!(*image.get_pixel(0, 0) == color_to_image(expected));
    }
}
