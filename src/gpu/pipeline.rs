use std::borrow::Cow;

use bevy::prelude::*;
use bevy::render::graph::CameraDriverLabel;
use bevy::render::render_graph::{
    Node, NodeRunError, RenderGraph, RenderGraphContext, RenderLabel,
};
use bevy::render::render_resource::{
    CachedComputePipelineId, CachedPipelineState, ComputePassDescriptor, ComputePipeline,
    ComputePipelineDescriptor, PipelineCache, PushConstantRange, ShaderDefVal,
};
use bevy::render::renderer::RenderContext;

use crate::gpu::buffers::{
    ExtractedParticleBuffer, ParticleBindGroup, ParticleBindGroupLayout, SimControl,
};

/// Invocations per work group; the dispatch covers all particles with
/// `ceil(n / WORKGROUP_SIZE)` groups. Must match the WGSL entry points.
pub const WORKGROUP_SIZE: u32 = 256;

/// The three stage programs, resolved as a complete set only. A tick is
/// never dispatched with a missing or partially compiled program.
#[derive(Resource)]
pub struct SimPipelines {
    pub density: ComputePipeline,
    pub force: ComputePipeline,
    pub integrate: ComputePipeline,
}

#[derive(Default)]
pub struct SimPipelineIds {
    density: Option<CachedComputePipelineId>,
    force: Option<CachedComputePipelineId>,
    integrate: Option<CachedComputePipelineId>,
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct SimPassLabel;

/// Simulation driver: density/pressure -> force -> integrate, once per
/// frame, gated on the pause flag.
#[derive(Default)]
struct SimNode;

impl Node for SimNode {
    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), NodeRunError> {
        let Some(pipelines) = world.get_resource::<SimPipelines>() else {
            return Ok(());
        };
        let Some(bind_group) = world.get_resource::<ParticleBindGroup>() else {
            return Ok(());
        };
        let Some(extracted) = world.get_resource::<ExtractedParticleBuffer>() else {
            return Ok(());
        };
        let Some(control) = world.get_resource::<SimControl>() else {
            return Ok(());
        };
        if control.paused || control.halted {
            return Ok(());
        }

        // how many workgroups do we actually need?
        let n = extracted.num_particles.max(1);
        let workgroups = (n + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;

        let encoder = render_context.command_encoder();

        // One pass per stage. Ending a compute pass is the full storage
        // barrier here: stage N's writes are visible before stage N+1
        // starts, which is what keeps density/pressure -> force ->
        // integrate coherent while mutating the buffer in place.
        for (label, pipeline) in [
            ("sph_density_pass", &pipelines.density),
            ("sph_force_pass", &pipelines.force),
            ("sph_integrate_pass", &pipelines.integrate),
        ] {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group.0, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        Ok(())
    }
}

fn queue_kernel(
    pipeline_cache: &PipelineCache,
    layout: &ParticleBindGroupLayout,
    assets: &AssetServer,
    path: &'static str,
    label: &'static str,
) -> CachedComputePipelineId {
    let shader: Handle<Shader> = assets.load(path);
    pipeline_cache.queue_compute_pipeline(ComputePipelineDescriptor {
        label: Some(label.into()),
        layout: vec![layout.0.clone()],
        push_constant_ranges: Vec::<PushConstantRange>::new(),
        shader,
        shader_defs: Vec::<ShaderDefVal>::new(),
        entry_point: Cow::from("main"),
        zero_initialize_workgroup_memory: false,
    })
}

pub fn prepare_sim_pipelines(
    mut commands: Commands,
    pipeline_cache: Res<PipelineCache>,
    layout: Option<Res<ParticleBindGroupLayout>>,
    mut ids: Local<SimPipelineIds>,
    assets: Res<AssetServer>,
) {
    let Some(layout) = layout else {
        return;
    };

    if ids.density.is_none() {
        ids.density = Some(queue_kernel(
            &pipeline_cache,
            &layout,
            &assets,
            "shaders/sph_density.wgsl",
            "sph_density_pipeline",
        ));
        ids.force = Some(queue_kernel(
            &pipeline_cache,
            &layout,
            &assets,
            "shaders/sph_force.wgsl",
            "sph_force_pipeline",
        ));
        ids.integrate = Some(queue_kernel(
            &pipeline_cache,
            &layout,
            &assets,
            "shaders/sph_integrate.wgsl",
            "sph_integrate_pipeline",
        ));
        return; // waits for compilation
    }

    let (Some(density_id), Some(force_id), Some(integrate_id)) =
        (ids.density, ids.force, ids.integrate)
    else {
        return;
    };

    // A stage that failed to compile keeps the previously resolved set
    // in place; the cache hands back the last good program on success.
    for id in [density_id, force_id, integrate_id] {
        if let CachedPipelineState::Err(err) = pipeline_cache.get_compute_pipeline_state(id) {
            error!("SPH kernel failed to compile: {err:?}");
            return;
        }
    }

    let (Some(density), Some(force), Some(integrate)) = (
        pipeline_cache.get_compute_pipeline(density_id),
        pipeline_cache.get_compute_pipeline(force_id),
        pipeline_cache.get_compute_pipeline(integrate_id),
    ) else {
        return; // all three or nothing
    };

    commands.insert_resource(SimPipelines {
        density: density.clone(),
        force: force.clone(),
        integrate: integrate.clone(),
    });
}

pub fn add_sim_node_to_graph(render_app: &mut bevy::app::SubApp) {
    let mut graph = render_app.world_mut().resource_mut::<RenderGraph>();
    graph.add_node(SimPassLabel, SimNode::default());
    // simulate before any camera renders: the frame's command stream is
    // simulate-then-draw
    graph.add_node_edge(SimPassLabel, CameraDriverLabel);
}
