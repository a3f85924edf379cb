use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy::render::render_resource::{Maintain, MapMode};
use bevy::render::renderer::RenderDevice;

use npr_sph::cpu::sph3d::{SPHState, SimParams};
use npr_sph::gpu::buffers::{AllowCopy, GPUSPHPlugin, ReadbackBuffer, SimControl};
use npr_sph::gpu::ffi::GPUParticle;
use npr_sph::{ControlTarget, Rotates, RotationMode, SceneControl};

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, FrameTimeDiagnosticsPlugin::default()))
        .insert_resource(ClearColor(Color::Srgba(
            bevy::color::palettes::css::DARK_SLATE_GRAY,
        )))
        .insert_resource(ControlTarget::Camera)
        .insert_resource(SimParams::default())
        // 1k particle block, simulated on the GPU
        .insert_resource(SPHState::demo_block_1k())
        .add_plugins(GPUSPHPlugin)
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (
                keyboard_control,
                orbit_controlled,
                rotate_entities,
                probe_particles,
                log_fps,
            ),
        )
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 0.3, 1.0).looking_at(Vec3::ZERO, Vec3::Y),
        SceneControl {
            target: ControlTarget::Camera,
            speed: 1.2,
        },
    ));
    commands.spawn((
        PointLight {
            intensity: 2_000_000.0,
            range: 20.0,
            ..Default::default()
        },
        Transform::from_xyz(1.0, 2.0, 1.0),
        Rotates {
            axis: Vec3::Y,
            speed: 0.4,
            mode: RotationMode::OrbitAround,
        },
        SceneControl {
            target: ControlTarget::Light,
            speed: 1.2,
        },
    ));
}

// space pauses, R re-seeds, tab switches what the arrows steer
fn keyboard_control(
    keys: Res<ButtonInput<KeyCode>>,
    mut control: ResMut<SimControl>,
    mut target: ResMut<ControlTarget>,
) {
    if keys.just_pressed(KeyCode::Space) {
        control.toggle_pause();
        info!(
            "simulation {}",
            if control.paused { "paused" } else { "running" }
        );
    }
    if keys.just_pressed(KeyCode::KeyR) {
        control.request_reset();
    }
    if keys.just_pressed(KeyCode::Tab) {
        *target = match *target {
            ControlTarget::Camera => ControlTarget::Light,
            ControlTarget::Light => ControlTarget::Camera,
        };
        info!("arrow keys steer {:?}", *target);
    }
}

fn orbit_controlled(
    keys: Res<ButtonInput<KeyCode>>,
    target: Res<ControlTarget>,
    time: Res<Time>,
    mut query: Query<(&SceneControl, &mut Transform)>,
) {
    let dir = keys.pressed(KeyCode::ArrowRight) as i32 - keys.pressed(KeyCode::ArrowLeft) as i32;
    if dir == 0 {
        return;
    }
    for (control, mut transform) in query.iter_mut() {
        if control.target != *target {
            continue;
        }
        let angle = dir as f32 * control.speed * time.delta_secs();
        transform.rotate_around(Vec3::ZERO, Quat::from_rotation_y(angle));
    }
}

fn rotate_entities(time: Res<Time>, mut query: Query<(&Rotates, &mut Transform)>) {
    for (rotates, mut transform) in query.iter_mut() {
        let rot = Quat::from_axis_angle(rotates.axis.normalize(), rotates.speed * time.delta_secs());
        match rotates.mode {
            RotationMode::SpinInPlace => transform.rotate(rot),
            RotationMode::OrbitAround => transform.rotate_around(Vec3::ZERO, rot),
        }
    }
}

// P toggles a GPU readback probe:
//   copy frame:  allow copy GPU -> readback
//   map frame:   block, map, log the particle spread, unmap
fn probe_particles(
    keys: Res<ButtonInput<KeyCode>>,
    mut allow_copy: ResMut<AllowCopy>,
    readback: Option<Res<ReadbackBuffer>>,
    render_device: Res<RenderDevice>,
    mut enabled: Local<bool>,
    mut fsm: Local<u8>, // 0 copy, 1 disable, 2 wait, 3 map, 4 cool-down
) {
    if keys.just_pressed(KeyCode::KeyP) {
        *enabled = !*enabled;
        *fsm = 0;
        if !*enabled {
            allow_copy.0 = false;
        }
    }
    if !*enabled {
        return;
    }
    let Some(readback) = readback else { return };

    match *fsm {
        0 => {
            allow_copy.0 = true;
            *fsm = 1;
        }
        1 => {
            allow_copy.0 = false;
            *fsm = 2;
        }
        2 => {
            *fsm = 3;
        }
        3 => {
            let slice = readback.buffer.slice(..);
            render_device.poll(Maintain::Wait);

            let status = Arc::new(AtomicU8::new(0));
            let cb = status.clone();
            slice.map_async(MapMode::Read, move |r| {
                cb.store(if r.is_ok() { 1 } else { 2 }, Ordering::SeqCst)
            });

            loop {
                render_device.poll(Maintain::Poll);
                match status.load(Ordering::SeqCst) {
                    0 => std::thread::yield_now(),
                    1 => break,
                    2 => {
                        readback.buffer.unmap();
                        *fsm = 0;
                        return;
                    }
                    _ => unreachable!(),
                }
            }

            {
                let data = slice.get_mapped_range();
                let gpu: &[GPUParticle] = bytemuck::cast_slice(&data);
                let (mut min_y, mut max_y) = (f32::MAX, f32::MIN);
                for p in gpu {
                    min_y = min_y.min(p.pos[1]);
                    max_y = max_y.max(p.pos[1]);
                }
                info!(
                    "probe: {} particles, y in [{min_y:.3}, {max_y:.3}]",
                    gpu.len()
                );
            }
            readback.buffer.unmap();

            *fsm = 4;
        }
        4 => {
            *fsm = 0;
        }
        _ => *fsm = 0,
    }
}

fn log_fps(diagnostics: Res<DiagnosticsStore>, mut counter: Local<u32>) {
    *counter += 1;
    if *counter >= 120 {
        *counter = 0;

        if let Some(fps_diag) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
            if let Some(avg) = fps_diag.average() {
                info!("==== Average FPS over last ~2 s: {:.1} ====", avg);
            }
        }
    }
}
