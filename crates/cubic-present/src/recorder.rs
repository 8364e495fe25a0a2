// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use cubic_math::glam::Mat4;

use crate::device::{GpuDevice, PipelineVariant, Viewport};
use crate::error::GpuResult;
use crate::geometry::{InstanceBuffer, UploadedGeometry};
use crate::overlay::OverlayHost;
use crate::RenderSize;

/// Surface parameters pushed with every draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialConstants {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 0.0,
            roughness: 0.5,
        }
    }
}

/// Push-constant block: `{ mat4 viewProj; vec4 baseColor; float metallic; float roughness; }`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameConstants {
    pub view_proj: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub _pad: [f32; 2],
}

impl FrameConstants {
    pub fn new(view_proj: Mat4, material: &MaterialConstants) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            base_color: material.base_color,
            metallic: material.metallic,
            roughness: material.roughness,
            _pad: [0.0; 2],
        }
    }
}

/// What the last recorded frame drew.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawSummary {
    pub index_count: u32,
    pub instance_count: u32,
    pub instanced: bool,
}

pub(crate) struct FrameRecording<'a, D: GpuDevice> {
    pub framebuffer: D::Framebuffer,
    pub extent: RenderSize,
    pub clear_color: [f32; 4],
    pub lights: D::UniformSet,
    pub geometry: Option<&'a UploadedGeometry<D>>,
    pub instances: Option<&'a InstanceBuffer<D>>,
    pub constants: FrameConstants,
}

/// Record the whole frame into `cmd`: clear, mesh draw (if any), overlay.
/// Returns the draw that was issued, `None` when there was no geometry.
pub(crate) fn record_frame<D: GpuDevice>(
    device: &D,
    cmd: D::CommandBuffer,
    frame: &FrameRecording<'_, D>,
    overlay: &mut OverlayHost<D>,
) -> GpuResult<Option<DrawSummary>> {
    device.reset_command_buffer(cmd)?;
    device.begin_command_buffer(cmd, false)?;
    device.cmd_begin_render_pass(cmd, frame.framebuffer, frame.extent, frame.clear_color);
    device.cmd_set_viewport(cmd, Viewport::covering(frame.extent));
    device.cmd_set_scissor(cmd, frame.extent);

    let drawn = frame.geometry.map(|geo| {
        let variant = if frame.instances.is_some() {
            PipelineVariant::Instanced
        } else {
            PipelineVariant::Single
        };
        device.cmd_bind_pipeline(cmd, variant);
        device.cmd_bind_uniform_set(cmd, variant, frame.lights);
        device.cmd_bind_vertex_buffer(cmd, 0, geo.vertices.buffer);
        if let Some(inst) = frame.instances {
            device.cmd_bind_vertex_buffer(cmd, 1, inst.buffer.buffer);
        }
        device.cmd_bind_index_buffer(cmd, geo.indices.buffer);
        device.cmd_push_constants(cmd, variant, bytemuck::bytes_of(&frame.constants));

        let instance_count = frame.instances.map_or(1, |i| i.count);
        device.cmd_draw_indexed(cmd, geo.index_count, instance_count);
        DrawSummary {
            index_count: geo.index_count,
            instance_count,
            instanced: variant == PipelineVariant::Instanced,
        }
    });

    overlay.render(device, cmd)?;
    device.cmd_end_render_pass(cmd);
    device.end_command_buffer(cmd)?;
    Ok(drawn)
}
