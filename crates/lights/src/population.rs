use glam::{Quat, Vec3, Vec4};
use lumen_common::{LightConfig, Range};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::light::{BoundedLights, PointLight};
use crate::upload::{LightBufferWriter, LightUploadError};

/// Bounds for randomised light attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRanges {
    pub x: Range,
    pub y: Range,
    pub z: Range,
    pub radius: Range,
    /// Applied independently to each of R, G and B.
    pub color: Range,
}

impl SpawnRanges {
    pub fn from_config(config: &LightConfig) -> Self {
        Self {
            x: config.spawn_x,
            y: config.spawn_y,
            z: config.spawn_z,
            radius: config.spawn_radius,
            color: config.spawn_color,
        }
    }

    fn sample(&self, rng: &mut ChaCha8Rng) -> PointLight {
        let mut pick = |r: Range| rng.random_range(r.min..=r.max);
        let position = Vec3::new(pick(self.x), pick(self.y), pick(self.z));
        let radius = pick(self.radius);
        let color = Vec4::new(pick(self.color), pick(self.color), pick(self.color), 0.0);
        PointLight::new(position, radius, color)
    }
}

/// Snapshot of the population after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightStats {
    pub count: usize,
    pub capacity: usize,
    pub spawned_last_update: usize,
    pub full: bool,
}

/// Growing set of orbiting point lights.
#[derive(Debug, Clone)]
pub struct LightPopulation {
    lights: BoundedLights,
    spawn_interval: f32,
    accumulator: f32,
    ranges: SpawnRanges,
    rng: ChaCha8Rng,
    spawned_last_update: usize,
    reported_full: bool,
}

impl LightPopulation {
    /// Create the population with its seed light.
    ///
    /// `config` must have passed validation: capacity of at least one and a
    /// positive spawn frequency.
    pub fn new(config: &LightConfig) -> Self {
        let spawn_interval = 1.0 / config.spawn_frequency;
        let mut lights = BoundedLights::with_capacity(config.capacity);
        let seed = &config.seed_light;
        let _ = lights.try_append(PointLight::new(seed.position, seed.radius, seed.color));
        tracing::debug!(
            capacity = config.capacity,
            frequency = config.spawn_frequency,
            "light population created"
        );
        Self {
            lights,
            spawn_interval,
            accumulator: spawn_interval,
            ranges: SpawnRanges::from_config(config),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            spawned_last_update: 0,
            reported_full: false,
        }
    }

    /// Advance the population by one frame: spawn, then orbit.
    pub fn update(&mut self, frame_time: f32) {
        let _span = tracing::trace_span!("lights_update").entered();
        self.spawned_last_update = self.spawn(frame_time);
        Self::orbit(&mut self.lights, frame_time);
        tracing::trace!(
            count = self.lights.count(),
            spawned = self.spawned_last_update,
            "lights updated"
        );
    }

    /// Each elapsed interval spawns one light. An interval that elapses at
    /// capacity is consumed without spawning.
    fn spawn(&mut self, frame_time: f32) -> usize {
        self.accumulator -= frame_time;
        let mut spawned = 0;
        while self.accumulator < 0.0 {
            if !self.lights.is_full() {
                let light = self.ranges.sample(&mut self.rng);
                if self.lights.try_append(light).is_ok() {
                    spawned += 1;
                }
            }
            self.accumulator += self.spawn_interval;
        }
        if self.lights.is_full() && !self.reported_full {
            self.reported_full = true;
            tracing::info!(capacity = self.lights.capacity(), "light capacity reached");
        }
        spawned
    }

    /// Rotate every light but the seed about the Y axis. Speed depends on
    /// the fractional part of the light's distance from the origin.
    fn orbit(lights: &mut BoundedLights, frame_time: f32) {
        for (index, light) in lights.iter_mut() {
            if index == 0 {
                continue;
            }
            let position = light.position();
            let dist = position.length();
            let speed = ((dist % 1.0) - 0.5) * 200.0 / (dist + 0.1);
            light.set_position(Quat::from_rotation_y(speed * frame_time) * position);
        }
    }

    /// Write the full live prefix to the GPU-visible buffer.
    pub fn upload<W>(&self, writer: &mut W) -> Result<(), LightUploadError>
    where
        W: LightBufferWriter + ?Sized,
    {
        writer.write_lights(self.lights.as_slice())
    }

    pub fn lights(&self) -> &BoundedLights {
        &self.lights
    }

    pub fn count(&self) -> usize {
        self.lights.count()
    }

    pub fn capacity(&self) -> usize {
        self.lights.capacity()
    }

    pub fn stats(&self) -> LightStats {
        LightStats {
            count: self.lights.count(),
            capacity: self.lights.capacity(),
            spawned_last_update: self.spawned_last_update,
            full: self.lights.is_full(),
        }
    }
}
