use bevy::prelude::*;
use bevy::render::camera::CameraProjection;
use bevy::render::extract_resource::ExtractResource;
use bevy::render::render_resource::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};

use bevy::render::Extract;

use crate::cpu::sph3d::SimParams;
use crate::gpu::buffers::ExtractedParticleBuffer;

// ---------------- Types ----------------

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawParams {
    pub view_proj: [[f32; 4]; 4],
    // camera basis for billboarding the particle quads
    pub cam_right: [f32; 4],
    pub cam_up: [f32; 4],
    pub particle_size: f32,
    pub rest_density: f32,
    pub _pad: [f32; 2],
    pub color: [f32; 4],
}

#[derive(Resource)]
pub struct DrawParamsBuffer {
    pub buffer: Buffer,
}

#[derive(Resource, Clone)]
pub struct DrawBindGroupLayout(pub BindGroupLayout);

#[derive(Resource)]
pub struct DrawBindGroup(pub BindGroup);

#[derive(Resource, Clone)]
pub struct QuadVertexBuffer {
    pub buffer: Buffer,
}

#[derive(Resource, Clone, ExtractResource)]
pub struct ExtractedDrawParamsBuffer {
    pub buffer: Buffer,
}

const QUAD_VERTS: &[[f32; 2]] = &[
    [-0.5, -0.5],
    [0.5, -0.5],
    [0.5, 0.5],
    [-0.5, -0.5],
    [0.5, 0.5],
    [-0.5, 0.5],
];

// ---------------- Systems (App world) ----------------

// Create a default DrawParams UBO
pub fn init_draw_params(mut commands: Commands, rd: Res<RenderDevice>) {
    let dp = DrawParams {
        view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
        cam_right: [1.0, 0.0, 0.0, 0.0],
        cam_up: [0.0, 1.0, 0.0, 0.0],
        particle_size: 0.01,
        rest_density: 1000.0,
        _pad: [0.0; 2],
        color: [0.0, 1.0, 1.0, 1.0],
    };
    let buffer = rd.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("draw_params_uniform"),
        contents: bytemuck::bytes_of(&dp),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });
    commands.insert_resource(DrawParamsBuffer { buffer });
}

// Refresh the UBO from the live 3D camera each frame (cheap).
pub fn update_draw_params(
    rq: Res<RenderQueue>,
    dp: Option<Res<DrawParamsBuffer>>,
    params: Res<SimParams>,
    camera: Query<(&Transform, &Projection), With<Camera3d>>,
) {
    let Some(dp) = dp else {
        return;
    };
    let Ok((transform, projection)) = camera.single() else {
        return;
    };

    let view = transform.compute_matrix().inverse();
    let view_proj = projection.get_clip_from_view() * view;
    let right = *transform.right();
    let up = *transform.up();

    let dp_cpu = DrawParams {
        view_proj: view_proj.to_cols_array_2d(),
        cam_right: [right.x, right.y, right.z, 0.0],
        cam_up: [up.x, up.y, up.z, 0.0],
        particle_size: params.particle_radius * 2.0,
        rest_density: params.rest_density,
        _pad: [0.0; 2],
        color: [0.0, 1.0, 1.0, 1.0],
    };
    rq.write_buffer(&dp.buffer, 0, bytemuck::bytes_of(&dp_cpu));
}

// Make a small quad VB; one instance of it per particle
pub fn init_quad_vb(mut commands: Commands, rd: Res<RenderDevice>) {
    let vb = rd.create_buffer_with_data(&BufferInitDescriptor {
        label: Some("instanced_quad_vb"),
        contents: bytemuck::cast_slice(QUAD_VERTS),
        usage: BufferUsages::VERTEX,
    });
    commands.insert_resource(QuadVertexBuffer { buffer: vb });
}

// Layout: 0 = particles SSBO (read-only, vertex fetch), 1 = draw params UBO
pub fn init_draw_bgl(mut commands: Commands, rd: Res<RenderDevice>) {
    let bgl = rd.create_bind_group_layout(
        Some("draw_bgl"),
        &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    );
    commands.insert_resource(DrawBindGroupLayout(bgl));
}

// ---------------- Systems (Render world) ----------------

pub fn extract_draw_params_buffer(
    mut commands: Commands,
    dp: Extract<Option<Res<DrawParamsBuffer>>>,
) {
    let Some(dp) = dp.as_ref() else {
        return;
    };
    commands.insert_resource(ExtractedDrawParamsBuffer {
        buffer: dp.buffer.clone(),
    });
}

pub fn extract_draw_resources(
    mut commands: Commands,
    vb: Extract<Option<Res<QuadVertexBuffer>>>,
    bgl: Extract<Option<Res<DrawBindGroupLayout>>>,
) {
    if let Some(vb) = vb.as_ref() {
        commands.insert_resource(QuadVertexBuffer {
            buffer: vb.buffer.clone(),
        });
    }
    if let Some(bgl) = bgl.as_ref() {
        commands.insert_resource(DrawBindGroupLayout(bgl.0.clone()));
    }
}

// Create the BG: particles SSBO + draw params UBO
pub fn prepare_draw_bg(
    mut commands: Commands,
    rd: Res<RenderDevice>,
    layout: Option<Res<DrawBindGroupLayout>>,
    particles: Option<Res<ExtractedParticleBuffer>>,
    dp: Option<Res<ExtractedDrawParamsBuffer>>,
) {
    let (Some(layout), Some(particles), Some(dp)) = (layout, particles, dp) else {
        return;
    };
    let bg = rd.create_bind_group(
        Some("draw_bg"),
        &layout.0,
        &[
            BindGroupEntry {
                binding: 0,
                resource: particles.buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: dp.buffer.as_entire_binding(),
            },
        ],
    );
    commands.insert_resource(DrawBindGroup(bg));
}
