use bevy::prelude::*;

use npr_sph::cpu::sph3d::{SPHState, SimParams};
use npr_sph::solid_color::SolidColor;
use npr_sph::{ControlTarget, Rotates, RotationMode, SceneControl};

#[derive(Component)]
struct ParticleVisual(usize);

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, MaterialPlugin::<SolidColor>::default()))
        .insert_resource(ClearColor(Color::Srgba(
            bevy::color::palettes::css::DARK_SLATE_GRAY,
        )))
        .insert_resource(ControlTarget::Camera)
        .insert_resource(SimParams::default())
        .insert_resource(SPHState::demo_block_1k())
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (
                keyboard_control,
                sph_step,
                sync_particles,
                orbit_controlled,
                rotate_entities,
            ),
        )
        .run();
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<SolidColor>>,
    sph: Res<SPHState>,
    params: Res<SimParams>,
) {
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

    // one sphere per particle
    let sphere = meshes.add(Sphere::new(params.particle_radius));
    let cyan = materials.add(SolidColor {
        color: LinearRgba::rgb(0.0, 1.0, 1.0),
    });
    for (i, p) in sph.particles.iter().enumerate() {
        commands.spawn((
            Mesh3d(sphere.clone()),
            MeshMaterial3d(cyan.clone()),
            Transform::from_translation(Vec3::new(p.pos.x, p.pos.y, p.pos.z)),
            ParticleVisual(i),
        ));
    }

    // slab at the bottom of the domain box
    let span_x = params.bounds_max.x - params.bounds_min.x;
    let span_z = params.bounds_max.z - params.bounds_min.z;
    let floor = meshes.add(Cuboid::new(span_x, 0.01, span_z));
    let slate = materials.add(SolidColor {
        color: LinearRgba::rgb(0.35, 0.35, 0.4),
    });
    commands.spawn((
        Mesh3d(floor),
        MeshMaterial3d(slate),
        Transform::from_xyz(0.0, params.bounds_min.y - 0.005, 0.0),
    ));
}

fn keyboard_control(
    keys: Res<ButtonInput<KeyCode>>,
    mut sph: ResMut<SPHState>,
    mut target: ResMut<ControlTarget>,
) {
    if keys.just_pressed(KeyCode::Space) {
        sph.toggle_pause();
        info!(
            "simulation {}",
            if sph.paused { "paused" } else { "running" }
        );
    }
    if keys.just_pressed(KeyCode::Tab) {
        *target = match *target {
            ControlTarget::Camera => ControlTarget::Light,
            ControlTarget::Light => ControlTarget::Camera,
        };
        info!("arrow keys steer {:?}", *target);
    }
}

fn sph_step(mut sph: ResMut<SPHState>, params: Res<SimParams>) {
    sph.step(&params);
}

fn sync_particles(sph: Res<SPHState>, mut query: Query<(&ParticleVisual, &mut Transform)>) {
    for (visual, mut transform) in query.iter_mut() {
        let particle = &sph.particles[visual.0];
        transform.translation = Vec3::new(particle.pos.x, particle.pos.y, particle.pos.z);
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
