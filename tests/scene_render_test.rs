//! End-to-end render of a small lit scene into an offscreen target.

#![cfg(feature = "integration-tests")]

use std::{iter, time::Duration};

use cgmath::{Point3, Vector3};
use lumina::{
    context::Context,
    data_structures::{instance::Instance, mesh, texture::Texture, volume::Volume},
    editor::{EditorState, MeshVariant, SkyboxVariant},
    materials::{
        IsoVolumeMaterial, Material, PbrMaps, PbrMaterial, PhongMaterial, StandardMaterial,
        TextureMaterial, VolumeMaterial,
    },
    scene::{Light, Scene, SceneNode, SkyboxNode},
};

const SIZE: [u32; 2] = [256, 256];

fn read_back_rgba(ctx: &Context, target: &lumina::data_structures::texture::Texture) -> Vec<u8> {
    let bytes_per_row = 4 * SIZE[0];
    assert_eq!(bytes_per_row % 256, 0, "rows must already be aligned");
    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: None,
        size: (bytes_per_row * SIZE[1]) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(SIZE[1]),
            },
        },
        wgpu::Extent3d {
            width: SIZE[0],
            height: SIZE[1],
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    ctx.device
        .poll(wgpu::PollType::Wait)
        .unwrap();
    futures::executor::block_on(rx).unwrap().unwrap();
    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    data
}

fn render_scene(ctx: &Context, scene: &mut Scene) -> Vec<u8> {
    let target = ctx.create_render_target("test target");
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    scene.encode(ctx, &mut encoder, &target.view);
    ctx.queue.submit(iter::once(encoder.finish()));
    read_back_rgba(ctx, &target)
}

fn lit_pixel_count(rgba: &[u8]) -> usize {
    rgba.chunks_exact(4)
        .filter(|px| px[0] > 8 || px[1] > 8 || px[2] > 8)
        .count()
}

#[test]
fn phong_scene_lights_up_with_two_lights() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    let mut scene = Scene::new();
    scene.ambient_light = [0.1; 3];
    scene
        .lights
        .push(Light::new(&ctx, "key", Point3::new(3.0, 3.0, 3.0)));
    scene
        .lights
        .push(Light::new(&ctx, "fill", Point3::new(-3.0, 1.0, 2.0)));

    let mut node = SceneNode::new(&ctx, Some("sphere"));
    node.set_mesh(mesh::mk_uv_sphere(&ctx.device, 24, 24));
    node.set_material(&ctx, Box::new(PhongMaterial::new(&ctx, None, None)));
    scene.nodes.push(node);

    let one_light = {
        scene.lights[1].visible = false;
        render_scene(&ctx, &mut scene)
    };
    let two_lights = {
        scene.lights[1].visible = true;
        render_scene(&ctx, &mut scene)
    };

    let single = lit_pixel_count(&one_light);
    let double = lit_pixel_count(&two_lights);
    assert!(single > 0, "one-light render is black");
    // The second light faces the other hemisphere, so more pixels light up
    // and none get darker.
    assert!(double >= single, "adding a light darkened the image");
}

#[test]
fn node_without_material_renders_nothing() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    let mut scene = Scene::new();
    let mut node = SceneNode::new(&ctx, None);
    node.set_mesh(mesh::mk_cube(&ctx.device));
    scene.nodes.push(node);

    let rgba = render_scene(&ctx, &mut scene);
    assert_eq!(lit_pixel_count(&rgba), 0);
}

#[test]
fn volume_march_composites_over_the_clear_color() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    // A solid ball of density in the middle of the field.
    let volume = Volume::from_fn(32, 32, 32, |x, y, z| {
        let d = ((x - 0.5).powi(2) + (y - 0.5).powi(2) + (z - 0.5).powi(2)).sqrt();
        if d < 0.3 { 0.8 } else { 0.0 }
    })
    .expect("volume");

    let mut scene = Scene::new();
    let mut node = SceneNode::new(&ctx, Some("cloud"));
    node.set_mesh(mesh::mk_cube(&ctx.device));
    let material = VolumeMaterial::new(&ctx, &volume).expect("volume material");
    node.set_material(&ctx, Box::new(material));
    node.set_transform(
        &ctx,
        Instance {
            scale: Vector3::new(2.0, 2.0, 2.0),
            ..Instance::new()
        },
    );
    scene.nodes.push(node);

    let rgba = render_scene(&ctx, &mut scene);
    assert!(lit_pixel_count(&rgba) > 0, "marched volume left no trace");
}

#[test]
fn volume_survives_the_camera_moving_inside_the_box() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    let volume = Volume::from_fn(16, 16, 16, |_, _, _| 0.6).expect("volume");

    let mut scene = Scene::new();
    let mut node = SceneNode::new(&ctx, Some("fog"));
    node.set_mesh(mesh::mk_cube(&ctx.device));
    node.set_material(
        &ctx,
        Box::new(VolumeMaterial::new(&ctx, &volume).expect("volume material")),
    );
    // Scale the box far past the camera so every ray starts inside it. Only
    // the back faces rasterize, so the march must still run.
    node.set_transform(
        &ctx,
        Instance {
            scale: Vector3::new(20.0, 20.0, 20.0),
            ..Instance::new()
        },
    );
    scene.nodes.push(node);

    let rgba = render_scene(&ctx, &mut scene);
    assert!(
        lit_pixel_count(&rgba) > 0,
        "volume vanished with the camera inside its bounds"
    );
}

#[test]
fn iso_surface_needs_a_visible_light() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    let volume = Volume::from_fn(32, 32, 32, |x, _, _| x).expect("volume");

    let mut scene = Scene::new();
    let mut node = SceneNode::new(&ctx, Some("iso"));
    node.set_mesh(mesh::mk_cube(&ctx.device));
    node.set_material(
        &ctx,
        Box::new(IsoVolumeMaterial::new(&ctx, &volume).expect("iso material")),
    );
    node.set_transform(
        &ctx,
        Instance {
            scale: Vector3::new(2.0, 2.0, 2.0),
            ..Instance::new()
        },
    );
    scene.nodes.push(node);

    // No lights at all: the accumulation plan is empty, nothing is drawn.
    let dark = render_scene(&ctx, &mut scene);
    assert_eq!(lit_pixel_count(&dark), 0);

    scene
        .lights
        .push(Light::new(&ctx, "key", Point3::new(2.0, 2.0, 4.0)));
    let lit = render_scene(&ctx, &mut scene);
    assert!(lit_pixel_count(&lit) > 0, "lit iso surface is black");
}

#[test]
fn material_and_mesh_swaps_keep_the_bound_texture() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    let red = Texture::solid_color(&ctx.device, &ctx.queue, "red", [255, 0, 0, 255]);
    let mut node = SceneNode::new(&ctx, Some("swap"));
    node.set_mesh(mesh::mk_cube(&ctx.device));
    node.set_material(&ctx, Box::new(TextureMaterial::new(&ctx, Some(red))));

    // Swapping to a material that arrives bare carries the map over.
    node.set_material(&ctx, Box::new(PhongMaterial::new(&ctx, None, None)));
    assert!(node.material().unwrap().base_texture().is_some());

    // A mesh variant without its own albedo leaves the map alone.
    let mut editor = EditorState::new();
    let variants = [MeshVariant {
        name: "sphere".into(),
        mesh: mesh::mk_uv_sphere(&ctx.device, 8, 8),
        albedo: None,
    }];
    assert!(editor.select_mesh(&ctx, &mut node, &variants, 0));
    assert!(node.material().unwrap().base_texture().is_some());
    assert_eq!(node.mesh().unwrap().name, "sphere");

    // Out of range: nothing changes, including the selection index.
    assert!(!editor.select_mesh(&ctx, &mut node, &variants, 5));
    assert_eq!(editor.mesh_selected, 0);
}

#[test]
fn opacity_map_enables_the_transparency_pass() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    let faces: [Vec<u8>; 6] = std::array::from_fn(|_| vec![128, 128, 128, 255]);
    let environment =
        Texture::cubemap_from_faces(&ctx.device, &ctx.queue, "env", 1, &faces).expect("cubemap");
    let brdf_lut = Texture::solid_color(&ctx.device, &ctx.queue, "brdf", [255, 255, 0, 255]);
    let prefiltered = std::array::from_fn(|_| environment.clone());

    let opaque = PbrMaterial::new(
        &ctx,
        PbrMaps::default(),
        brdf_lut.clone(),
        environment.clone(),
        prefiltered,
    );
    assert!(!opaque.transparent, "no opacity map, no transparency pass");

    let glass_maps = PbrMaps {
        opacity: Some(Texture::solid_color(
            &ctx.device,
            &ctx.queue,
            "opacity",
            [255, 255, 255, 128],
        )),
        ..Default::default()
    };
    let prefiltered = std::array::from_fn(|_| environment.clone());
    let mut glass = PbrMaterial::new(&ctx, glass_maps, brdf_lut, environment, prefiltered);
    assert!(glass.transparent, "opacity map must enable the pass");

    glass.set_maps(&ctx, PbrMaps::default());
    assert!(!glass.transparent, "dropping the map turns the pass back off");
}

#[test]
fn mismatched_skybox_faces_leave_the_selection_alone() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    let faces: [Vec<u8>; 6] = std::array::from_fn(|_| vec![0u8; 2 * 2 * 4]);
    let environment =
        Texture::cubemap_from_faces(&ctx.device, &ctx.queue, "sky", 2, &faces).expect("cubemap");
    let skybox = SkyboxNode::new(&ctx, environment);

    let variants = [
        SkyboxVariant {
            name: "matching".into(),
            face_size: 2,
            faces: faces.clone(),
        },
        SkyboxVariant {
            name: "wrong size".into(),
            face_size: 4,
            faces: std::array::from_fn(|_| vec![0u8; 4 * 4 * 4]),
        },
    ];

    let mut editor = EditorState::new();
    assert!(editor.select_skybox(&ctx, &skybox, &variants, 0).expect("select"));
    assert_eq!(editor.skybox_selected, 0);

    // The variant exists but its faces cannot be applied; the selection must
    // stay where it was.
    assert!(!editor.select_skybox(&ctx, &skybox, &variants, 1).expect("select"));
    assert_eq!(editor.skybox_selected, 0);
}

#[test]
fn wireframe_overlay_draws_on_top() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = Context::new_blocking(SIZE).expect("context");

    let mut scene = Scene::new();
    scene.ambient_light = [1.0; 3];
    let mut node = SceneNode::new(&ctx, Some("cube"));
    node.set_mesh(mesh::mk_cube(&ctx.device));
    node.set_material(&ctx, Box::new(StandardMaterial::new(&ctx, [0.0, 1.0, 0.0, 1.0])));
    scene.nodes.push(node);

    scene.render_wireframe = true;
    let rgba = render_scene(&ctx, &mut scene);
    assert!(lit_pixel_count(&rgba) > 0);
}
