//! Device state mirror: every setter elides redundant commands.

mod common;

use glint::device::{
    BlendFactor, BufferTarget, Capability, CullFace, DepthFunc, Device, UniformData, VarKind,
    Winding,
};
use glint::{Command, DeviceState, TraceDevice};

#[test]
fn repeated_setter_issues_one_command() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();

    state.set_depth_func(&mut device, DepthFunc::LessEqual);
    state.set_depth_func(&mut device, DepthFunc::LessEqual);
    assert_eq!(device.count(|c| matches!(c, Command::DepthFunc(_))), 1);

    state.set_depth_func(&mut device, DepthFunc::Always);
    assert_eq!(device.count(|c| matches!(c, Command::DepthFunc(_))), 2);
}

#[test]
fn setters_matching_device_defaults_issue_nothing() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();

    // A fresh context already believes these values.
    state.set_depth_func(&mut device, DepthFunc::Less);
    state.set_front_face(&mut device, Winding::Ccw);
    state.set_depth_mask(&mut device, true);
    state.set_blend_func(&mut device, BlendFactor::One, BlendFactor::Zero, None, None);
    assert!(device.commands().is_empty());
}

#[test]
fn capability_toggles_deduplicate() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();

    state.enable(&mut device, Capability::Blend);
    state.enable(&mut device, Capability::Blend);
    state.disable(&mut device, Capability::Blend);
    state.disable(&mut device, Capability::Blend);
    state.enable(&mut device, Capability::Blend);

    let toggles: Vec<_> = device
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::Enable(_) | Command::Disable(_)))
        .cloned()
        .collect();
    assert_eq!(
        toggles,
        vec![
            Command::Enable(Capability::Blend),
            Command::Disable(Capability::Blend),
            Command::Enable(Capability::Blend),
        ]
    );
}

#[test]
fn blend_func_compares_all_four_factors() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();

    state.set_blend_func(
        &mut device,
        BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha,
        None,
        None,
    );
    state.set_blend_func(
        &mut device,
        BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha,
        None,
        None,
    );
    assert_eq!(device.count(|c| matches!(c, Command::BlendFunc(..))), 1);

    // Same color factors, different alpha pair: must re-issue.
    state.set_blend_func(
        &mut device,
        BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha,
        Some(BlendFactor::One),
        Some(BlendFactor::Zero),
    );
    assert_eq!(device.count(|c| matches!(c, Command::BlendFunc(..))), 2);
}

#[test]
fn cull_face_first_set_always_issues() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();

    state.set_cull_face(&mut device, CullFace::Back);
    state.set_cull_face(&mut device, CullFace::Back);
    state.set_cull_face(&mut device, CullFace::Front);
    assert_eq!(device.count(|c| matches!(c, Command::CullFace(_))), 2);
}

#[test]
fn buffer_bindings_are_tracked_per_target() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();

    let vertices = device.create_buffer();
    let indices = device.create_buffer();
    device.take_commands();

    state.bind_buffer(&mut device, BufferTarget::Array, Some(vertices));
    state.bind_buffer(&mut device, BufferTarget::ElementArray, Some(indices));
    // The array binding survived the element-array bind; nothing to do.
    state.bind_buffer(&mut device, BufferTarget::Array, Some(vertices));
    assert_eq!(device.count(|c| matches!(c, Command::BindBuffer(..))), 2);

    state.bind_buffer(&mut device, BufferTarget::Array, Some(indices));
    assert_eq!(device.count(|c| matches!(c, Command::BindBuffer(..))), 3);
}

#[test]
fn texture_bindings_are_tracked_per_unit() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();

    let raw_a = device.create_texture();
    let raw_b = device.create_texture();
    device.take_commands();

    // Unit 0 is already active on a fresh context.
    assert!(state.bind_texture(&mut device, 0, 1, raw_a));
    assert_eq!(device.count(|c| matches!(c, Command::ActiveTexture(_))), 0);
    assert_eq!(device.count(|c| matches!(c, Command::BindTexture(_))), 1);

    // Re-binding the same texture to the same unit is free.
    assert!(!state.bind_texture(&mut device, 0, 1, raw_a));
    assert_eq!(device.count(|c| matches!(c, Command::BindTexture(_))), 1);

    // A second unit holds its own binding.
    assert!(state.bind_texture(&mut device, 1, 2, raw_b));
    assert!(!state.bind_texture(&mut device, 1, 2, raw_b));
    assert_eq!(device.count(|c| matches!(c, Command::ActiveTexture(_))), 1);
    assert_eq!(device.count(|c| matches!(c, Command::BindTexture(_))), 2);
    assert_eq!(state.texture_bound(0), Some(1));
    assert_eq!(state.texture_bound(1), Some(2));
}

#[test]
fn uniform_scalars_deduplicate_by_value() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();
    let location = glint::device::UniformLocation(42);

    state.set_uniform(&mut device, location, VarKind::Float, &UniformData::Float(1.5));
    state.set_uniform(&mut device, location, VarKind::Float, &UniformData::Float(1.5));
    assert_eq!(device.count(|c| matches!(c, Command::SetUniform(..))), 1);

    state.set_uniform(&mut device, location, VarKind::Float, &UniformData::Float(2.5));
    assert_eq!(device.count(|c| matches!(c, Command::SetUniform(..))), 2);
}

#[test]
fn uniform_arrays_compare_element_wise() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();
    let location = glint::device::UniformLocation(7);

    let value = UniformData::FloatVec(vec![1.0, 2.0, 3.0]);
    state.set_uniform(&mut device, location, VarKind::FloatVec3, &value);
    state.set_uniform(&mut device, location, VarKind::FloatVec3, &value.clone());
    assert_eq!(device.count(|c| matches!(c, Command::SetUniform(..))), 1);

    // One element differs.
    let changed = UniformData::FloatVec(vec![1.0, 2.0, 4.0]);
    state.set_uniform(&mut device, location, VarKind::FloatVec3, &changed);
    assert_eq!(device.count(|c| matches!(c, Command::SetUniform(..))), 2);

    // Same prefix, different length.
    let longer = UniformData::FloatVec(vec![1.0, 2.0, 4.0, 0.0]);
    state.set_uniform(&mut device, location, VarKind::FloatVec4, &longer);
    assert_eq!(device.count(|c| matches!(c, Command::SetUniform(..))), 3);
}

#[test]
fn viewport_and_framebuffer_deduplicate() {
    common::init_logger();
    let mut device = TraceDevice::new();
    let mut state = DeviceState::new();

    state.set_viewport(&mut device, 800, 600);
    state.set_viewport(&mut device, 800, 600);
    state.set_viewport(&mut device, 800, 400);
    assert_eq!(device.count(|c| matches!(c, Command::Viewport(..))), 2);

    // The default framebuffer is already bound on a fresh context.
    state.bind_framebuffer(&mut device, None);
    assert_eq!(device.count(|c| matches!(c, Command::BindFramebuffer(_))), 0);
}
