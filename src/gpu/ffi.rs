use bytemuck::{Pod, Zeroable};

use crate::cpu::sph3d::{Particle, SimParams};

/// The one declaration of the particle record shared by the host
/// allocator, the three compute kernels and the draw shader. Field order
/// and sizes here must match the WGSL `Particle` struct exactly.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GPUParticle {
    // not using glam to make sure WGSL compatibility
    pub pos: [f32; 4],   // xyz, w = 1
    pub vel: [f32; 4],   // xyz, w unused
    pub force: [f32; 4], // xyz, w unused
    pub rho: f32,
    pub p: f32,
    pub age: f32,
    pub _pad: f32,
}

impl From<&Particle> for GPUParticle {
    fn from(p: &Particle) -> Self {
        Self {
            pos: [p.pos.x, p.pos.y, p.pos.z, 1.0],
            vel: [p.vel.x, p.vel.y, p.vel.z, 0.0],
            force: [p.force.x, p.force.y, p.force.z, 0.0],
            rho: p.rho,
            p: p.p,
            age: p.age,
            _pad: 0.0,
        }
    }
}

/// Uniform-block mirror of `SimParams`, plus the live particle count.
/// vec4 fields first so the WGSL side needs no extra padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GPUSimParams {
    pub gravity: [f32; 4],
    pub bounds_min: [f32; 4],
    pub bounds_max: [f32; 4],
    pub particle_mass: f32,
    pub smoothing_radius: f32,
    pub rest_density: f32,
    pub stiffness: f32,
    pub viscosity: f32,
    pub dt: f32,
    pub damping: f32,
    pub num_particles: u32,
}

impl GPUSimParams {
    pub fn from_params(params: &SimParams, num_particles: u32) -> Self {
        let g = params.gravity;
        let lo = params.bounds_min;
        let hi = params.bounds_max;
        Self {
            gravity: [g.x, g.y, g.z, 0.0],
            bounds_min: [lo.x, lo.y, lo.z, 0.0],
            bounds_max: [hi.x, hi.y, hi.z, 0.0],
            particle_mass: params.particle_mass,
            smoothing_radius: params.smoothing_radius(),
            rest_density: params.rest_density,
            stiffness: params.stiffness,
            viscosity: params.viscosity,
            dt: params.dt,
            damping: params.damping,
            num_particles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    // These pin the host structs to the layout the WGSL declarations
    // assume; a drift here is a silent buffer corruption at runtime.

    #[test]
    fn particle_record_is_64_bytes() {
        assert_eq!(size_of::<GPUParticle>(), 64);
        assert_eq!(offset_of!(GPUParticle, pos), 0);
        assert_eq!(offset_of!(GPUParticle, vel), 16);
        assert_eq!(offset_of!(GPUParticle, force), 32);
        assert_eq!(offset_of!(GPUParticle, rho), 48);
        assert_eq!(offset_of!(GPUParticle, p), 52);
        assert_eq!(offset_of!(GPUParticle, age), 56);
    }

    #[test]
    fn sim_params_match_uniform_layout() {
        assert_eq!(size_of::<GPUSimParams>(), 80);
        assert_eq!(offset_of!(GPUSimParams, gravity), 0);
        assert_eq!(offset_of!(GPUSimParams, bounds_min), 16);
        assert_eq!(offset_of!(GPUSimParams, bounds_max), 32);
        assert_eq!(offset_of!(GPUSimParams, particle_mass), 48);
        assert_eq!(offset_of!(GPUSimParams, num_particles), 76);
    }
}
