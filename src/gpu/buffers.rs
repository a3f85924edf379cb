use bevy::asset::AssetLoadFailedEvent;
use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;
use bevy::render::render_resource::{
    BindGroup, BindGroupEntry, BindGroupLayout, BindGroupLayoutEntry, BindingType, Buffer,
    BufferBindingType, BufferDescriptor, BufferInitDescriptor, BufferUsages,
    CommandEncoderDescriptor, ShaderStages,
};
use bevy::render::renderer::{RenderDevice, RenderQueue};
use bevy::render::{Extract, ExtractSchedule, Render, RenderApp, RenderSet};

use crate::cpu::sph3d::{SPHState, SimParams};
use crate::gpu::draw_buffers::{
    extract_draw_params_buffer, extract_draw_resources, init_draw_bgl, init_draw_params,
    init_quad_vb, prepare_draw_bg, update_draw_params,
};
use crate::gpu::draw_pass::add_particles_draw_node_to_graph;
use crate::gpu::draw_pipeline::prepare_draw_pipeline;
use crate::gpu::ffi::{GPUParticle, GPUSimParams};
use crate::gpu::pipeline::{add_sim_node_to_graph, prepare_sim_pipelines};

/// Clear color swapped in when a kernel shader fails to load, in lieu of
/// structured error reporting.
pub const FAULT_CLEAR_COLOR: Color = Color::srgb(1.0, 0.0, 1.0);

// ==================== resources ======================================

/* interface of resources for a shader -> actual resource binding via BindGroup
and is created via RenderDevice::create_bind_group_layout. */
#[derive(Resource, Clone)]
pub struct ParticleBindGroupLayout(pub BindGroupLayout);

// responsible for render resources --> accessible in the pipeline
#[derive(Resource, Clone, ExtractResource)]
pub struct ParticleBindGroup(pub BindGroup);

/// Canonical particle store. Allocated once from the seed state, fixed
/// count, mutated only by the three compute stages.
#[derive(Resource)]
pub struct ParticleBuffers {
    pub particle_buffer: Buffer,
    pub num_particles: u32,
}

#[derive(Resource)]
pub struct SimParamsBuffer {
    pub buffer: Buffer,
}

/// Host-side run/pause/reset switchboard for the simulation driver.
/// Written between frames only; the render world sees a per-frame copy.
#[derive(Resource, Clone, Debug, Default)]
pub struct SimControl {
    pub paused: bool,
    /// Latched on initialization failure; no further ticks are dispatched.
    pub halted: bool,
    /// One-shot: re-upload the seed layout over the particle buffer.
    pub reset_requested: bool,
}

impl SimControl {
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }
}

// Gate for the particle -> readback copy; the host maps the readback
// buffer only while this is on.
#[derive(Resource, Clone, Default)]
pub struct AllowCopy(pub bool);

#[derive(Resource)]
pub struct ReadbackBuffer {
    pub buffer: Buffer,
}

// Rendering world copies

#[derive(Resource, Clone, ExtractResource)]
pub struct ExtractedParticleBuffer {
    pub buffer: Buffer,
    pub num_particles: u32,
}

#[derive(Resource, Clone)]
pub struct ExtractedSimParamsBuffer {
    pub buffer: Buffer,
}

#[derive(Resource, Clone)]
pub struct ExtractedReadbackBuffer {
    pub buffer: Buffer,
}

// =====================================================================

// ========================== systems ==================================

// Startup systems that have to run only once

fn init_gpu_buffers(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    sph: Res<SPHState>,
    params: Res<SimParams>,
) {
    let particle_buffers = ParticleBuffers::new(&render_device, &sph);

    let gpu_params = GPUSimParams::from_params(&params, particle_buffers.num_particles);
    let params_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("sim_params_uniform"),
        contents: bytemuck::bytes_of(&gpu_params),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });

    let readback_size =
        (particle_buffers.num_particles as usize).max(1) * std::mem::size_of::<GPUParticle>();
    let readback = render_device.create_buffer(&BufferDescriptor {
        label: Some("particle_readback"),
        size: readback_size as u64,
        usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    commands.insert_resource(particle_buffers);
    commands.insert_resource(SimParamsBuffer {
        buffer: params_buffer,
    });
    commands.insert_resource(ReadbackBuffer { buffer: readback });
}

fn init_particle_bind_group_layout(mut commands: Commands, render_device: Res<RenderDevice>) {
    let layout = render_device.create_bind_group_layout(
        Some("particle_bind_group_layout"),
        &[
            // binding 0: particle store (rw storage, all three stages)
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // binding 1: SimParams (uniform, read-only inside a tick)
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    );
    commands.insert_resource(ParticleBindGroupLayout(layout));
}

// Update systems that have to run per frame

// The constants are host-mutable between frames; push the current values
// every frame so the next tick's kernels read them.
fn queue_sim_params(
    params: Res<SimParams>,
    particle_buffers: Option<Res<ParticleBuffers>>,
    params_buffer: Option<Res<SimParamsBuffer>>,
    render_queue: Res<RenderQueue>,
) {
    let (Some(particle_buffers), Some(params_buffer)) = (particle_buffers, params_buffer) else {
        return;
    };
    let gpu_params = GPUSimParams::from_params(&params, particle_buffers.num_particles);
    render_queue.write_buffer(&params_buffer.buffer, 0, bytemuck::bytes_of(&gpu_params));
}

// Re-seed the particle store from the initial layout on request. This is
// the recovery path for numerically corrupted state.
fn apply_reset(
    mut control: ResMut<SimControl>,
    sph: Res<SPHState>,
    particle_buffers: Option<Res<ParticleBuffers>>,
    render_queue: Res<RenderQueue>,
) {
    if !control.reset_requested {
        return;
    }
    let Some(particle_buffers) = particle_buffers else {
        return;
    };

    let gpu_particles: Vec<GPUParticle> = sph.particles.iter().map(GPUParticle::from).collect();
    render_queue.write_buffer(
        &particle_buffers.particle_buffer,
        0,
        bytemuck::cast_slice(&gpu_particles),
    );
    control.reset_requested = false;
    info!(
        "particle buffer re-seeded ({} particles)",
        particle_buffers.num_particles
    );
}

// A kernel that never loads can never be dispatched; flag it on screen
// and stop advancing the simulation, the app itself keeps running.
fn watch_shader_assets(
    mut events: EventReader<AssetLoadFailedEvent<Shader>>,
    mut clear_color: ResMut<ClearColor>,
    mut control: ResMut<SimControl>,
) {
    for ev in events.read() {
        let path = ev.path.to_string();
        if path.contains("sph_density") || path.contains("sph_force") || path.contains("sph_integrate")
        {
            error!("kernel shader failed to load: {path}: {}", ev.error);
            clear_color.0 = FAULT_CLEAR_COLOR;
            control.halted = true;
        }
    }
}

// Extract systems that send from App to Render

fn extract_particle_buffer(
    mut commands: Commands,
    particle_buffers: Extract<Option<Res<ParticleBuffers>>>,
) {
    let Some(particle_buffers) = particle_buffers.as_ref() else {
        return;
    };
    commands.insert_resource(ExtractedParticleBuffer {
        buffer: particle_buffers.particle_buffer.clone(),
        num_particles: particle_buffers.num_particles,
    });
}

fn extract_bind_group_layout(
    mut commands: Commands,
    layout: Extract<Option<Res<ParticleBindGroupLayout>>>,
) {
    let Some(layout) = layout.as_ref() else {
        return;
    };
    commands.insert_resource(ParticleBindGroupLayout(layout.0.clone()));
}

fn extract_sim_params_buffer(
    mut commands: Commands,
    params_buffer: Extract<Option<Res<SimParamsBuffer>>>,
) {
    let Some(params_buffer) = params_buffer.as_ref() else {
        return;
    };
    commands.insert_resource(ExtractedSimParamsBuffer {
        buffer: params_buffer.buffer.clone(),
    });
}

fn extract_sim_control(mut commands: Commands, control: Extract<Res<SimControl>>) {
    commands.insert_resource(SimControl {
        paused: control.paused,
        halted: control.halted,
        reset_requested: control.reset_requested,
    });
}

fn extract_readback(
    mut commands: Commands,
    readback: Extract<Option<Res<ReadbackBuffer>>>,
    allow: Extract<Res<AllowCopy>>,
) {
    if let Some(readback) = readback.as_ref() {
        commands.insert_resource(ExtractedReadbackBuffer {
            buffer: readback.buffer.clone(),
        });
    }
    commands.insert_resource(AllowCopy(allow.0));
}

// Systems in Render

fn prepare_particle_bind_group(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    layout: Option<Res<ParticleBindGroupLayout>>,
    extracted: Option<Res<ExtractedParticleBuffer>>,
    params: Option<Res<ExtractedSimParamsBuffer>>,
) {
    let (Some(layout), Some(extracted), Some(params)) = (layout, extracted, params) else {
        return;
    };
    let bind_group = render_device.create_bind_group(
        Some("particle_bind_group"),
        &layout.0,
        &[
            BindGroupEntry {
                binding: 0,
                resource: extracted.buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: params.buffer.as_entire_binding(),
            },
        ],
    );
    commands.insert_resource(ParticleBindGroup(bind_group));
}

// Copies the particle store into the mappable readback buffer after the
// frame's simulation work. The host blocks only when it maps this buffer.
fn copy_particles_to_readback(
    render_device: Res<RenderDevice>,
    render_queue: Res<RenderQueue>,
    allow: Option<Res<AllowCopy>>,
    particles: Option<Res<ExtractedParticleBuffer>>,
    readback: Option<Res<ExtractedReadbackBuffer>>,
) {
    let (Some(allow), Some(particles), Some(readback)) = (allow, particles, readback) else {
        return;
    };
    if !allow.0 {
        return;
    }

    let mut encoder = render_device.create_command_encoder(&CommandEncoderDescriptor {
        label: Some("particle_readback_copy"),
    });
    let bytes =
        particles.num_particles as u64 * std::mem::size_of::<GPUParticle>() as u64;
    encoder.copy_buffer_to_buffer(&particles.buffer, 0, &readback.buffer, 0, bytes);
    render_queue.submit([encoder.finish()]);
}

// Implementations

impl ParticleBuffers {
    pub fn new(render_device: &RenderDevice, sph: &SPHState) -> Self {
        // converting the seed particles to the shared GPU record
        let gpu_particles: Vec<GPUParticle> =
            sph.particles.iter().map(GPUParticle::from).collect();

        // storage buffer with the init data
        let particle_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: bytemuck::cast_slice(&gpu_particles),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        });

        Self {
            particle_buffer,
            num_particles: gpu_particles.len() as u32,
        }
    }
}

// =====================================================================

// Plugin

pub struct GPUSPHPlugin;

impl Plugin for GPUSPHPlugin {
    fn build(&self, app: &mut App) {
        // App
        app.init_resource::<SimControl>()
            .init_resource::<AllowCopy>()
            .init_resource::<ClearColor>()
            .init_resource::<SimParams>()
            .add_systems(
                Startup,
                (
                    init_gpu_buffers,
                    init_particle_bind_group_layout,
                    init_draw_params,
                    init_quad_vb,
                    init_draw_bgl,
                ),
            )
            .add_systems(
                Update,
                (
                    queue_sim_params,
                    apply_reset,
                    watch_shader_assets,
                    update_draw_params,
                ),
            );

        // Render
        let render_app = app.sub_app_mut(RenderApp);
        render_app
            .add_systems(
                ExtractSchedule,
                (
                    extract_particle_buffer,
                    extract_bind_group_layout,
                    extract_sim_params_buffer,
                    extract_sim_control,
                    extract_readback,
                    extract_draw_params_buffer,
                    extract_draw_resources,
                ),
            )
            .add_systems(
                Render,
                (
                    prepare_particle_bind_group.in_set(RenderSet::Prepare),
                    prepare_sim_pipelines.in_set(RenderSet::Prepare),
                    prepare_draw_bg.in_set(RenderSet::Prepare),
                    prepare_draw_pipeline.in_set(RenderSet::Prepare),
                    copy_particles_to_readback.in_set(RenderSet::Cleanup),
                ),
            );

        add_sim_node_to_graph(render_app);
        add_particles_draw_node_to_graph(render_app);
    }
}
