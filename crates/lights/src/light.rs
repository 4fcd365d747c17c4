use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// GPU-facing point light record.
///
/// Laid out as position, radius, colour so it can be bound directly as a
/// per-instance vertex stream or a storage buffer element.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PointLight {
    pub position: [f32; 3],
    /// Influence distance in world units.
    pub radius: f32,
    /// RGB plus an unused alpha channel.
    pub color: [f32; 4],
}

impl PointLight {
    /// Size of one record in bytes.
    pub const SIZE: usize = std::mem::size_of::<PointLight>();

    pub fn new(position: Vec3, radius: f32, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            radius,
            color: color.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position.to_array();
    }

    pub fn color(&self) -> Vec4 {
        Vec4::from_array(self.color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("light container is full ({capacity} lights)")]
pub struct ContainerFull {
    pub capacity: usize,
}

/// Fixed-capacity light array with a live count.
///
/// Storage for `capacity` lights is reserved up front and never grows past
/// it. Lights are appended, never removed.
#[derive(Debug, Clone)]
pub struct BoundedLights {
    lights: Vec<PointLight>,
    capacity: usize,
}

impl BoundedLights {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lights: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live lights.
    pub fn count(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lights.len() >= self.capacity
    }

    /// Append a light, returning its index.
    pub fn try_append(&mut self, light: PointLight) -> Result<usize, ContainerFull> {
        if self.is_full() {
            return Err(ContainerFull {
                capacity: self.capacity,
            });
        }
        self.lights.push(light);
        Ok(self.lights.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&PointLight> {
        self.lights.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PointLight> {
        self.lights.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PointLight> {
        self.lights.iter()
    }

    /// Mutable iteration over the live lights with their indices.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut PointLight)> {
        self.lights.iter_mut().enumerate()
    }

    /// The live prefix, ready for upload.
    pub fn as_slice(&self) -> &[PointLight] {
        &self.lights
    }

    /// The live prefix as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.lights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_32_bytes() {
        assert_eq!(PointLight::SIZE, 32);
        let light = PointLight::new(Vec3::new(1.0, 2.0, 3.0), 4.0, Vec4::new(0.5, 0.6, 0.7, 0.0));
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&light));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 0.5, 0.6, 0.7, 0.0]);
    }

    #[test]
    fn append_until_full() {
        let mut lights = BoundedLights::with_capacity(2);
        assert_eq!(lights.try_append(PointLight::default()), Ok(0));
        assert_eq!(lights.try_append(PointLight::default()), Ok(1));
        assert!(lights.is_full());
        assert_eq!(
            lights.try_append(PointLight::default()),
            Err(ContainerFull { capacity: 2 })
        );
        assert_eq!(lights.count(), 2);
    }

    #[test]
    fn bytes_cover_live_prefix_only() {
        let mut lights = BoundedLights::with_capacity(8);
        lights.try_append(PointLight::default()).unwrap();
        lights.try_append(PointLight::default()).unwrap();
        assert_eq!(lights.as_bytes().len(), 2 * PointLight::SIZE);
    }

    #[test]
    fn iter_mut_yields_indices() {
        let mut lights = BoundedLights::with_capacity(4);
        for _ in 0..3 {
            lights.try_append(PointLight::default()).unwrap();
        }
        for (i, light) in lights.iter_mut() {
            light.radius = i as f32;
        }
        let radii: Vec<f32> = lights.iter().map(|l| l.radius).collect();
        assert_eq!(radii, vec![0.0, 1.0, 2.0]);
    }
}
