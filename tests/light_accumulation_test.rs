//! The multi-light draw plan and the draw-state descriptors behind it.

use lumina::materials::{Blend, Culling, DepthTest, DrawState, Fill, light_passes};

const AMBIENT: [f32; 3] = [0.2, 0.25, 0.3];

#[test]
fn one_pass_per_visible_light_with_ambient_handoff() {
    let plan = light_passes(AMBIENT, &[true, true, true]);
    assert_eq!(plan.len(), 3);

    assert_eq!(plan[0].light, 0);
    assert_eq!(plan[0].ambient, AMBIENT);
    assert_eq!(plan[0].state.blend, Blend::Replace);
    assert_eq!(plan[0].state.depth, DepthTest::Less);

    for pass in &plan[1..] {
        assert_eq!(pass.ambient, [0.0; 3]);
        assert_eq!(pass.state.blend, Blend::Additive);
        assert_eq!(pass.state.depth, DepthTest::LessEqual);
    }
}

#[test]
fn invisible_lights_consume_no_pass() {
    let plan = light_passes(AMBIENT, &[false, true, false, true]);
    assert_eq!(plan.len(), 2);
    // Light indices are positions in the scene list, not in the plan.
    assert_eq!(plan[0].light, 1);
    assert_eq!(plan[1].light, 3);
    // The first *visible* light gets the ambient term and the base state.
    assert_eq!(plan[0].ambient, AMBIENT);
    assert_eq!(plan[0].state, DrawState::OPAQUE);
    assert_eq!(plan[1].state, DrawState::ACCUMULATE);
}

#[test]
fn no_visible_lights_means_an_empty_plan() {
    assert!(light_passes(AMBIENT, &[]).is_empty());
    assert!(light_passes(AMBIENT, &[false, false]).is_empty());
}

#[test]
fn skybox_is_the_only_state_without_depth_testing() {
    assert_eq!(DrawState::SKY.depth, DepthTest::Disabled);
    assert!(!DrawState::SKY.depth_write);

    let testing = [
        DrawState::OPAQUE,
        DrawState::ACCUMULATE,
        DrawState::WIREFRAME,
        DrawState::SEE_THROUGH,
        DrawState::VOLUME_BOX,
        DrawState::VOLUME_BOX_ACCUMULATE,
    ];
    for state in testing {
        assert_ne!(state.depth, DepthTest::Disabled, "{state:?}");
    }
}

#[test]
fn accumulation_blend_sums_into_the_framebuffer() {
    let blend = DrawState::ACCUMULATE.blend_state();
    assert_eq!(blend.color.src_factor, lumina::BlendFactor::SrcAlpha);
    assert_eq!(blend.color.dst_factor, lumina::BlendFactor::One);
    assert_eq!(blend.alpha.src_factor, lumina::BlendFactor::One);
    assert_eq!(blend.alpha.dst_factor, lumina::BlendFactor::One);
}

#[test]
fn volume_boxes_march_from_their_back_faces() {
    for state in [DrawState::VOLUME_BOX, DrawState::VOLUME_BOX_ACCUMULATE] {
        assert_eq!(state.cull, Culling::Front);
        assert!(!state.depth_write);
        // Meshes wind counter-clockwise, so keeping the Ccw convention and
        // culling front faces leaves exactly the far side of the box. With
        // the camera inside, the surrounding faces are all back-classified
        // and the box still rasterizes.
        let primitive = state.primitive_state();
        assert_eq!(primitive.front_face, lumina::FrontFace::Ccw);
        assert_eq!(primitive.cull_mode, Some(lumina::Face::Front));
    }
}

#[test]
fn marched_volumes_composite_premultiplied() {
    // The march already weights emitted color by alpha; blending with
    // src_alpha would apply that weight twice.
    let blend = DrawState::VOLUME_BOX.blend_state();
    assert_eq!(blend.color.src_factor, lumina::BlendFactor::One);
    assert_eq!(blend.color.dst_factor, lumina::BlendFactor::OneMinusSrcAlpha);
}

#[test]
fn wireframe_rasterizes_lines() {
    assert_eq!(DrawState::WIREFRAME.fill, Fill::Lines);
    let primitive = DrawState::WIREFRAME.primitive_state();
    assert_eq!(primitive.polygon_mode, lumina::PolygonMode::Line);
}
