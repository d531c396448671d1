//! Headless render loop demo
//!
//! Drives the render core through a few frames against the recording
//! device: sprites in two materials, a fading model, a HUD label whose text
//! changes every frame, and a simulated trip to the background halfway
//! through (buffers torn down and recreated without reloading meshes).
//!
//! Usage: `bane_demo [config.toml|config.ron]`

use bane_render::foundation::logging;
use bane_render::prelude::*;
use thiserror::Error;

const FRAMES: u32 = 8;
const BACKGROUND_AT: u32 = 4;
const HUD_CAPACITY: usize = 16;

const QUAD_OBJ: &str = "\
v -0.5 -0.5 0
v 0.5 -0.5 0
v 0.5 0.5 0
v -0.5 0.5 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

const CUBE_OBJ: &str = "\
# unit cube
v -0.5 -0.5 0.5
v 0.5 -0.5 0.5
v 0.5 0.5 0.5
v -0.5 0.5 0.5
v -0.5 -0.5 -0.5
v 0.5 -0.5 -0.5
v 0.5 0.5 -0.5
v -0.5 0.5 -0.5
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
f 6/1 5/2 8/3 7/4
f 5/1 1/2 4/3 8/4
f 2/1 6/2 7/3 3/4
f 4/1 3/2 7/3 8/4
f 5/1 6/2 2/3 1/4
";

#[derive(Error, Debug)]
enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

struct DemoScene {
    sprites: Vec<Sprite>,
    models: Vec<ModelNode>,
    hud: Label,
}

impl DemoScene {
    fn new(quad: MeshHandle, cube: MeshHandle, hud_mesh: MeshHandle) -> Self {
        let stone = MaterialKey::textured(TextureId(1));
        let glass = MaterialKey::textured(TextureId(2));
        let font = MaterialKey::textured(TextureId(3));

        let sprites = (0..6u64)
            .map(|i| {
                let material = if i % 2 == 0 { stone } else { glass };
                let position = Vec3::new(i as f32 - 2.5, 0.0, -(i as f32));
                let sprite = Sprite::new(NodeId(i), quad, material, Mat4::new_translation(&position));
                if material == glass {
                    sprite.with_color([0.6, 0.8, 1.0, 0.5])
                } else {
                    sprite
                }
            })
            .collect();

        let models = vec![
            ModelNode::new(NodeId(100), cube, stone, Mat4::new_translation(&Vec3::new(-1.0, 1.0, -2.0))),
            ModelNode::new(NodeId(101), cube, stone, Mat4::new_translation(&Vec3::new(1.0, 1.0, -3.0))),
        ];

        let hud = Label::new(
            NodeId(200),
            "",
            hud_mesh,
            HUD_CAPACITY,
            font,
            Mat4::new_translation(&Vec3::new(-4.0, 3.0, -1.0)),
        );

        Self { sprites, models, hud }
    }

    fn animate(&mut self, frame: u32) {
        // The second cube fades out and back in, crossing into the transparent pass
        let phase = frame as f32 * 0.8;
        self.models[1].opacity = (0.6 + 0.6 * phase.cos()).clamp(0.0, 1.0);
        self.hud.text = format!("frame {frame}");
    }
}

fn main() -> Result<(), DemoError> {
    logging::init_with_level(log::LevelFilter::Info);

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading render config from {}", path);
            RenderConfig::load_from_file(&path)?
        }
        None => RenderConfig::default(),
    };

    let mut manager = RenderManager::new(RecordingDevice::new(), config)?;
    manager.set_camera(Camera::look_at(Point3::new(0.0, 0.0, 5.0), Point3::origin()));

    let source = MemoryMeshSource::new()
        .with("quad", "obj", QUAD_OBJ)
        .with("cube", "obj", CUBE_OBJ);
    let quad = manager.load_mesh("quad", "obj", &source)?;
    let cube = manager.load_mesh("cube", "obj", &source)?;
    let hud_mesh = manager.insert_mesh(Mesh::from_data(
        "hud",
        MeshData::glyph_strip(HUD_CAPACITY),
        BufferUsage::Dynamic,
    )?)?;

    let report = manager.create_buffers();
    if !report.is_complete() {
        log::warn!("{} meshes could not be uploaded", report.failed.len());
    }

    let mut scene = DemoScene::new(quad, cube, hud_mesh);

    for frame in 1..=FRAMES {
        if frame == BACKGROUND_AT {
            log::info!("Entering background");
            manager.tear_down_buffers();
            log::info!("Returning to foreground");
            let report = manager.create_buffers();
            log::info!("Restored {} buffers without reloading meshes", report.created);
        }

        scene.animate(frame);
        manager.update_label(&scene.hud)?;

        manager.begin_frame();
        for sprite in &scene.sprites {
            manager.render_sprite(sprite);
        }
        for model in &scene.models {
            manager.render_model(model);
        }
        manager.draw_transparent_label(&scene.hud);
        manager.render();

        let stats = manager.last_frame_stats();
        log::info!(
            "Frame {}: {} opaque + {} transparent -> {} draws, {} batches, {} sprites merged",
            stats.frame,
            stats.opaque_items,
            stats.transparent_items,
            stats.draw_calls,
            stats.batch_count,
            stats.batched_sprites
        );
    }

    let stats = manager.print_debug_stats();
    println!("{stats}");

    manager.tear_down_buffers();
    Ok(())
}
