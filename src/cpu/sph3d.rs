// smoothed particle hydrodynamics in 3D, host-side mirror of the GPU kernels
use std::{collections::HashMap, f32::consts::PI};

use bevy::prelude::Resource;
use glam::{IVec3, Vec3};

type Cell = IVec3;

#[inline]
fn cell(pos: Vec3, h: f32) -> IVec3 {
    (pos / h).floor().as_ivec3()
}

// define 3D kernels

#[inline]
fn w_poly6(r2: f32, h: f32) -> f32 {
    let k: f32 = 315.0 / (64.0 * PI * h.powi(9));
    if r2 >= 0.0 && r2 <= h * h {
        k * (h * h - r2).powi(3)
    } else {
        0.0
    }
}

#[inline]
fn grad_spiky_kernel(r: Vec3, h: f32) -> Vec3 {
    let r_len = r.length();
    let k = -45.0 / (PI * h.powi(6));
    if r_len == 0.0 || r_len >= h {
        Vec3::ZERO
    } else {
        k * (h - r_len).powi(2) * r.normalize()
    }
}

#[inline]
fn laplacian_visc(r: f32, h: f32) -> f32 {
    let k: f32 = 45.0 / (PI * h.powi(6));
    if r == 0.0 || r >= h {
        0.0
    } else {
        k * (h - r)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub pos: Vec3,   // position
    pub vel: Vec3,   // velocity
    pub force: Vec3, // net force this tick
    pub rho: f32,    // density
    pub p: f32,      // pressure
    pub age: f32,    // simulated seconds alive
}

impl Particle {
    pub fn new(pos: Vec3) -> Self {
        Self {
            pos,
            vel: Vec3::ZERO,
            force: Vec3::ZERO,
            rho: 0.0,
            p: 0.0,
            age: 0.0,
        }
    }
}

/// Simulation constants. Externally mutable between frames, read-only
/// inside a tick; the kernels see a copy of this in a uniform buffer.
#[derive(Resource, Clone, Copy, Debug)]
pub struct SimParams {
    pub particle_mass: f32,
    pub particle_radius: f32,
    pub smoothing_coeff: f32, // h = smoothing_coeff * particle_radius
    pub rest_density: f32,
    pub stiffness: f32,
    pub viscosity: f32,
    pub gravity: Vec3,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub dt: f32,
    pub damping: f32, // boundary reflection keeps -damping * velocity
}

impl SimParams {
    #[inline]
    pub fn smoothing_radius(&self) -> f32 {
        self.smoothing_coeff * self.particle_radius
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            particle_mass: 1.25e-4, // rest_density * spacing^3 of the demo grid
            particle_radius: 0.005,
            smoothing_coeff: 4.0,
            rest_density: 1000.0,
            stiffness: 3.0,
            viscosity: 0.2,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            bounds_min: Vec3::new(-0.25, -0.5, -0.25),
            bounds_max: Vec3::new(0.25, 1.0, 0.25),
            dt: 0.0025,
            damping: 0.5,
        }
    }
}

/// Broad-phase strategy for the host solver. The GPU kernels are always
/// brute force; the grid variant exists for larger CPU runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NeighborSearch {
    #[default]
    BruteForce,
    UniformGrid,
}

#[derive(Resource)]
pub struct SPHState {
    pub particles: Vec<Particle>,
    pub neighbor_search: NeighborSearch,
    pub paused: bool,
}

impl SPHState {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            neighbor_search: NeighborSearch::default(),
            paused: false,
        }
    }

    /// Seed `count` particles from a layout function. Velocity, force and
    /// age start at zero; the count is fixed from here on.
    pub fn with_layout(count: usize, layout: impl Fn(usize) -> Vec3) -> Self {
        let mut state = Self::new();
        state.particles = (0..count).map(|i| Particle::new(layout(i))).collect();
        state
    }

    // initializing particles on a dense grid
    pub fn init_grid(&mut self, n_x: usize, n_y: usize, n_z: usize, spacing: f32) {
        for iz in 0..n_z {
            for iy in 0..n_y {
                for ix in 0..n_x {
                    let x = ix as f32 * spacing;
                    let y = iy as f32 * spacing;
                    let z = iz as f32 * spacing;
                    self.particles.push(Particle::new(Vec3::new(x, y, z)));
                }
            }
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn build_grid(&self, h: f32) -> HashMap<Cell, Vec<usize>> {
        let mut grid: HashMap<Cell, Vec<usize>> = HashMap::with_capacity(self.particles.len());

        for (i, p) in self.particles.iter().enumerate() {
            let key = cell(p.pos, h);
            grid.entry(key).or_default().push(i);
        }
        grid
    }

    // Runs `f` over every neighbor candidate of `pos`: all particles for
    // brute force, the 3 x 3 x 3 surrounding cells with a grid.
    fn for_each_candidate(
        &self,
        pos: Vec3,
        h: f32,
        grid: Option<&HashMap<Cell, Vec<usize>>>,
        mut f: impl FnMut(usize),
    ) {
        match grid {
            None => {
                for j in 0..self.particles.len() {
                    f(j);
                }
            }
            Some(grid) => {
                let c = cell(pos, h);
                for ox in -1..=1 {
                    for oy in -1..=1 {
                        for oz in -1..=1 {
                            if let Some(list) = grid.get(&(c + IVec3::new(ox, oy, oz))) {
                                for &j in list {
                                    f(j);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn maybe_grid(&self, h: f32) -> Option<HashMap<Cell, Vec<usize>>> {
        match self.neighbor_search {
            NeighborSearch::BruteForce => None,
            NeighborSearch::UniformGrid => Some(self.build_grid(h)),
        }
    }

    /// Stage 1: density from kernel-weighted neighbor masses (self term
    /// included), then pressure from the equation of state, clamped to
    /// non-negative.
    pub fn density_pressure(&mut self, params: &SimParams) {
        let h = params.smoothing_radius();
        let h2 = h * h;
        let grid = self.maybe_grid(h);
        let mut rho_vec = vec![0.0; self.particles.len()];

        for i in 0..self.particles.len() {
            let pos_i = self.particles[i].pos;
            let mut rho = 0.0;

            self.for_each_candidate(pos_i, h, grid.as_ref(), |j| {
                let r2 = (pos_i - self.particles[j].pos).length_squared();
                if r2 < h2 {
                    rho += params.particle_mass * w_poly6(r2, h);
                }
            });
            rho_vec[i] = rho;
        }
        for i in 0..self.particles.len() {
            self.particles[i].rho = rho_vec[i];
            self.particles[i].p = (params.stiffness * (rho_vec[i] - params.rest_density)).max(0.0);
        }
    }

    /// Stage 2: net force from the symmetrized pressure gradient, the
    /// viscosity Laplacian, and gravity. Overwrites last tick's force.
    pub fn compute_forces(&mut self, params: &SimParams) {
        let h = params.smoothing_radius();
        let grid = self.maybe_grid(h);
        let mut force_vec = vec![Vec3::ZERO; self.particles.len()];

        for i in 0..self.particles.len() {
            let particle_i = &self.particles[i];
            let pos_i = particle_i.pos;
            let p_i = particle_i.p;
            let vel_i = particle_i.vel;
            let rho_i = particle_i.rho;
            let mut f = Vec3::ZERO;

            self.for_each_candidate(pos_i, h, grid.as_ref(), |j| {
                if i == j {
                    return; // kernel gradient/Laplacian vanish at zero distance
                }
                let particle_j = &self.particles[j];
                let r = pos_i - particle_j.pos;

                // pressure gradient, symmetrized so pairs cancel exactly
                let grad_spiky = grad_spiky_kernel(r, h);
                let f_p =
                    -params.particle_mass * (p_i + particle_j.p) / (2.0 * particle_j.rho)
                        * grad_spiky;

                // viscosity from the velocity Laplacian
                let laplacian = laplacian_visc(r.length(), h);
                let f_v = params.viscosity * params.particle_mass * (particle_j.vel - vel_i)
                    / particle_j.rho
                    * laplacian;

                f += f_p + f_v;
            });

            // rho_i * g, so integration's f / rho recovers g itself
            force_vec[i] = f + params.gravity * rho_i;
        }

        for i in 0..self.particles.len() {
            self.particles[i].force = force_vec[i];
        }
    }

    /// Stage 3: semi-implicit Euler advance, damped reflection off the
    /// domain box, age accumulation.
    pub fn integrate(&mut self, params: &SimParams) {
        let min = params.bounds_min;
        let max = params.bounds_max;
        for p in &mut self.particles {
            p.vel += (p.force / p.rho) * params.dt;
            p.pos += p.vel * params.dt;

            if p.pos.x < min.x {
                p.pos.x = min.x;
                p.vel.x *= -params.damping;
            }
            if p.pos.x > max.x {
                p.pos.x = max.x;
                p.vel.x *= -params.damping;
            }
            if p.pos.y < min.y {
                p.pos.y = min.y;
                p.vel.y *= -params.damping;
            }
            if p.pos.y > max.y {
                p.pos.y = max.y;
                p.vel.y *= -params.damping;
            }
            if p.pos.z < min.z {
                p.pos.z = min.z;
                p.vel.z *= -params.damping;
            }
            if p.pos.z > max.z {
                p.pos.z = max.z;
                p.vel.z *= -params.damping;
            }

            p.age += params.dt;
        }
    }

    /// One tick: density/pressure, forces, integration, in that order.
    /// A paused state is left untouched.
    pub fn step(&mut self, params: &SimParams) {
        if self.paused {
            return;
        }
        self.density_pressure(params);
        self.compute_forces(params);
        self.integrate(params);
    }

    // demo function ----------------------------------------------
    pub fn demo_block_1k() -> Self {
        let mut demo_sim = Self::new();
        demo_sim.init_grid(10, 10, 10, 0.005);
        demo_sim
    }
    // ------------------------------------------------------------
}

impl Default for SPHState {
    fn default() -> Self {
        Self::new()
    }
}
