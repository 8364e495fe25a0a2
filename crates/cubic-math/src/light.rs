// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Capacity of the per-frame light uniform. Lights past this are dropped.
pub const MAX_LIGHTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Light {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            range: 0.0,
        }
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Light {
            kind: LightKind::Point,
            position,
            direction: Vec3::NEG_Y,
            color,
            intensity,
            range,
        }
    }

    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Light {
            kind: LightKind::Spot,
            position,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            range,
        }
    }
}

/// Ordered light list, read once per frame.
pub trait LightSource {
    fn lights(&self) -> &[Light];
}

impl LightSource for [Light] {
    fn lights(&self) -> &[Light] {
        self
    }
}

impl LightSource for Vec<Light> {
    fn lights(&self) -> &[Light] {
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct LightingRig {
    lights: Vec<Light>,
}

impl LightingRig {
    /// Warm key sun, cool fill and a soft overhead point light.
    pub fn studio() -> Self {
        let mut rig = LightingRig::default();
        rig.add(Light::directional(
            Vec3::new(0.5, -1.0, 0.3),
            Vec3::new(1.0, 0.95, 0.8),
            1.0,
        ));
        rig.add(Light::directional(
            Vec3::new(-0.3, -0.5, -0.8),
            Vec3::new(0.6, 0.7, 1.0),
            0.3,
        ));
        rig.add(Light::point(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.8, 0.8, 1.0),
            0.5,
            15.0,
        ));
        rig
    }

    pub fn add(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn remove(&mut self, index: usize) -> Option<Light> {
        (index < self.lights.len()).then(|| self.lights.remove(index))
    }

    pub fn clear(&mut self) {
        self.lights.clear();
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

impl LightSource for LightingRig {
    fn lights(&self) -> &[Light] {
        &self.lights
    }
}

/// std140-compatible light record: three vec4s.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GpuLight {
    /// xyz = position, w = kind
    pub position_kind: [f32; 4],
    /// xyz = direction, w = range
    pub direction_range: [f32; 4],
    /// rgb = color, a = intensity
    pub color_intensity: [f32; 4],
}

impl From<&Light> for GpuLight {
    fn from(l: &Light) -> Self {
        GpuLight {
            position_kind: [l.position.x, l.position.y, l.position.z, l.kind as u32 as f32],
            direction_range: [l.direction.x, l.direction.y, l.direction.z, l.range],
            color_intensity: [l.color.x, l.color.y, l.color.z, l.intensity],
        }
    }
}

/// Contents of the per-frame light uniform buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightBlock {
    pub count: u32,
    pub _pad: [u32; 3],
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl Default for LightBlock {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl LightBlock {
    /// Packs the first `MAX_LIGHTS` lights. Returns the block and how many
    /// lights did not fit.
    pub fn pack(lights: &[Light]) -> (Self, usize) {
        let mut block = LightBlock::default();
        let used = lights.len().min(MAX_LIGHTS);
        for (dst, src) in block.lights.iter_mut().zip(&lights[..used]) {
            *dst = GpuLight::from(src);
        }
        block.count = used as u32;
        (block, lights.len() - used)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
