use crate::light::PointLight;

/// Errors from writing the light buffer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LightUploadError {
    #[error("{count} lights exceed the buffer capacity of {capacity}")]
    CapacityExceeded { count: usize, capacity: usize },
    #[error("light buffer write failed: {0}")]
    Backend(String),
}

/// Destination for the per-frame light upload.
///
/// Each call replaces the previous contents entirely.
pub trait LightBufferWriter {
    fn write_lights(&mut self, lights: &[PointLight]) -> Result<(), LightUploadError>;
}

/// Host-memory light buffer with a fixed capacity.
#[derive(Debug, Clone)]
pub struct HostLightBuffer {
    capacity: usize,
    lights: Vec<PointLight>,
    uploads: u64,
}

impl HostLightBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lights: Vec::with_capacity(capacity),
            uploads: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lights written by the most recent upload.
    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn upload_count(&self) -> u64 {
        self.uploads
    }
}

impl LightBufferWriter for HostLightBuffer {
    fn write_lights(&mut self, lights: &[PointLight]) -> Result<(), LightUploadError> {
        if lights.len() > self.capacity {
            return Err(LightUploadError::CapacityExceeded {
                count: lights.len(),
                capacity: self.capacity,
            });
        }
        self.lights.clear();
        self.lights.extend_from_slice(lights);
        self.uploads += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_replaces_contents() {
        let mut buffer = HostLightBuffer::new(4);
        buffer.write_lights(&[PointLight::default(); 3]).unwrap();
        buffer.write_lights(&[PointLight::default(); 1]).unwrap();
        assert_eq!(buffer.lights().len(), 1);
        assert_eq!(buffer.upload_count(), 2);
    }

    #[test]
    fn oversized_write_is_rejected() {
        let mut buffer = HostLightBuffer::new(2);
        let err = buffer.write_lights(&[PointLight::default(); 3]).unwrap_err();
        assert_eq!(
            err,
            LightUploadError::CapacityExceeded {
                count: 3,
                capacity: 2
            }
        );
        assert_eq!(buffer.upload_count(), 0);
    }
}
