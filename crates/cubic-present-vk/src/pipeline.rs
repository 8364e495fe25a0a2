// SPDX-License-Identifier: CEPL-1.0
//! Render pass, mesh pipelines and the descriptor/pipeline layouts they share.

use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use ash::util::read_spv;
use ash::vk;
use cubic_present::{FrameConstants, PipelineVariant, VERTEX_STRIDE};

/// Where the mesh SPIR-V comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ShaderSource {
    /// Compiled into the binary by the build script.
    #[default]
    Embedded,
    /// `mesh.vert.spv`, `mesh_instanced.vert.spv` and `mesh.frag.spv` in this directory.
    Directory(PathBuf),
}

const EMBEDDED: [(&str, &[u8]); 3] = [
    (
        "mesh.vert",
        include_bytes!(concat!(env!("OUT_DIR"), "/mesh.vert.spv")),
    ),
    (
        "mesh_instanced.vert",
        include_bytes!(concat!(env!("OUT_DIR"), "/mesh_instanced.vert.spv")),
    ),
    (
        "mesh.frag",
        include_bytes!(concat!(env!("OUT_DIR"), "/mesh.frag.spv")),
    ),
];

impl ShaderSource {
    fn load(&self, name: &str) -> Result<Vec<u32>> {
        let bytes = match self {
            ShaderSource::Embedded => EMBEDDED
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, b)| b.to_vec())
                .ok_or_else(|| anyhow!("no embedded shader {name}"))?,
            ShaderSource::Directory(dir) => {
                let path = dir.join(format!("{name}.spv"));
                std::fs::read(&path).with_context(|| format!("read {}", path.display()))?
            }
        };
        read_spv(&mut Cursor::new(&bytes[..])).with_context(|| format!("{name}: not SPIR-V"))
    }
}

/// SPIR-V words for the three mesh stages, loaded once at device creation.
pub(crate) struct ShaderCode {
    vert: Vec<u32>,
    vert_instanced: Vec<u32>,
    frag: Vec<u32>,
}

impl ShaderCode {
    pub(crate) fn load(source: &ShaderSource) -> Result<Self> {
        Ok(Self {
            vert: source.load("mesh.vert")?,
            vert_instanced: source.load("mesh_instanced.vert")?,
            frag: source.load("mesh.frag")?,
        })
    }
}

/// Objects that depend on the chain's color and depth formats.
pub(crate) struct RenderTargets {
    pub color: vk::Format,
    pub depth: vk::Format,
    pub render_pass: vk::RenderPass,
    pub single: vk::Pipeline,
    pub instanced: vk::Pipeline,
}

impl RenderTargets {
    pub(crate) unsafe fn create(
        device: &ash::Device,
        layout: vk::PipelineLayout,
        shaders: &ShaderCode,
        color: vk::Format,
        depth: vk::Format,
    ) -> Result<Self> {
        let render_pass = unsafe { create_render_pass(device, color, depth) }?;
        let single =
            match unsafe { create_pipeline(device, render_pass, layout, shaders, PipelineVariant::Single) } {
                Ok(p) => p,
                Err(e) => {
                    unsafe { device.destroy_render_pass(render_pass, None) };
                    return Err(e);
                }
            };
        let instanced = match unsafe {
            create_pipeline(device, render_pass, layout, shaders, PipelineVariant::Instanced)
        } {
            Ok(p) => p,
            Err(e) => {
                unsafe {
                    device.destroy_pipeline(single, None);
                    device.destroy_render_pass(render_pass, None);
                }
                return Err(e);
            }
        };
        Ok(Self {
            color,
            depth,
            render_pass,
            single,
            instanced,
        })
    }

    pub(crate) fn pipeline(&self, variant: PipelineVariant) -> vk::Pipeline {
        match variant {
            PipelineVariant::Single => self.single,
            PipelineVariant::Instanced => self.instanced,
        }
    }

    pub(crate) unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.instanced, None);
            device.destroy_pipeline(self.single, None);
            device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// One subpass: color cleared and handed to present, depth cleared and discarded.
unsafe fn create_render_pass(
    device: &ash::Device,
    color: vk::Format,
    depth: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription {
            format: color,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: depth,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_depth_stencil_attachment: &depth_ref,
        ..Default::default()
    };
    // The acquire semaphore is waited at COLOR_ATTACHMENT_OUTPUT; the layout
    // transition must not run ahead of it. The shared depth image must not be
    // cleared while a previous frame still writes it.
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: stages,
        dst_stage_mask: stages,
        src_access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ..Default::default()
    };
    let ci = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    unsafe { device.create_render_pass(&ci, None) }.context("create_render_pass")
}

/// Set 0, binding 0: the per-slot light uniform, read by the fragment stage.
pub(crate) unsafe fn create_light_set_layout(device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
    let binding = vk::DescriptorSetLayoutBinding {
        binding: 0,
        descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: 1,
        stage_flags: vk::ShaderStageFlags::FRAGMENT,
        ..Default::default()
    };
    let ci = vk::DescriptorSetLayoutCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
        binding_count: 1,
        p_bindings: &binding,
        ..Default::default()
    };
    unsafe { Ok(device.create_descriptor_set_layout(&ci, None)?) }
}

/// Sets are freed one by one when the engine drops a uniform slot.
pub(crate) unsafe fn create_descriptor_pool(device: &ash::Device, max_sets: u32) -> Result<vk::DescriptorPool> {
    let size = vk::DescriptorPoolSize {
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: max_sets,
    };
    let ci = vk::DescriptorPoolCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
        flags: vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
        max_sets,
        pool_size_count: 1,
        p_pool_sizes: &size,
        ..Default::default()
    };
    unsafe { Ok(device.create_descriptor_pool(&ci, None)?) }
}

pub(crate) const PUSH_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

/// Shared by both pipeline variants: the light set plus the frame constants block.
pub(crate) unsafe fn create_pipeline_layout(
    device: &ash::Device,
    set_layout: vk::DescriptorSetLayout,
) -> Result<vk::PipelineLayout> {
    let push = vk::PushConstantRange {
        stage_flags: PUSH_STAGES,
        offset: 0,
        size: std::mem::size_of::<FrameConstants>() as u32,
    };
    let layout_info = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        set_layout_count: 1,
        p_set_layouts: &set_layout,
        push_constant_range_count: 1,
        p_push_constant_ranges: &push,
        ..Default::default()
    };
    unsafe { Ok(device.create_pipeline_layout(&layout_info, None)?) }
}

fn vertex_input(variant: PipelineVariant) -> (Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>) {
    let f3 = std::mem::size_of::<[f32; 3]>() as u32;
    let mut bindings = vec![vk::VertexInputBindingDescription {
        binding: 0,
        stride: VERTEX_STRIDE as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let mut attrs = vec![
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: f3,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: 2 * f3,
        },
    ];
    if variant == PipelineVariant::Instanced {
        // one column-major mat4 per instance, a vec4 per location
        let column = std::mem::size_of::<[f32; 4]>() as u32;
        bindings.push(vk::VertexInputBindingDescription {
            binding: 1,
            stride: 4 * column,
            input_rate: vk::VertexInputRate::INSTANCE,
        });
        attrs.extend((0..4).map(|c| vk::VertexInputAttributeDescription {
            location: 3 + c,
            binding: 1,
            format: vk::Format::R32G32B32A32_SFLOAT,
            offset: c * column,
        }));
    }
    (bindings, attrs)
}

unsafe fn create_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    shaders: &ShaderCode,
    variant: PipelineVariant,
) -> Result<vk::Pipeline> {
    // STRICT: render_pass MUST be the one the chain's framebuffers are built against.
    // On a color/depth format change, pipelines are rebuilt together with it.

    // --- Shader modules (destroyed before return) ---
    let vs_code = match variant {
        PipelineVariant::Single => &shaders.vert,
        PipelineVariant::Instanced => &shaders.vert_instanced,
    };
    let vs_ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: vs_code.as_ptr(),
        code_size: vs_code.len() * 4,
        ..Default::default()
    };
    let fs_ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: shaders.frag.as_ptr(),
        code_size: shaders.frag.len() * 4,
        ..Default::default()
    };
    let vs = unsafe { device.create_shader_module(&vs_ci, None)? };
    let fs = match unsafe { device.create_shader_module(&fs_ci, None) } {
        Ok(m) => m,
        Err(e) => {
            unsafe { device.destroy_shader_module(vs, None) };
            return Err(e.into());
        }
    };
    let entry = c"main";

    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    // --- Fixed-function state ---
    let (bindings, attrs) = vertex_input(variant);
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        vertex_binding_description_count: bindings.len() as u32,
        p_vertex_binding_descriptions: bindings.as_ptr(),
        vertex_attribute_description_count: attrs.len() as u32,
        p_vertex_attribute_descriptions: attrs.as_ptr(),
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        ..Default::default()
    };
    // viewport/scissor are set per frame
    let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        scissor_count: 1,
        ..Default::default()
    };
    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        ..Default::default()
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        depth_test_enable: vk::TRUE,
        depth_write_enable: vk::TRUE,
        depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
        ..Default::default()
    };
    let color_blend_att = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::R
            | vk::ColorComponentFlags::G
            | vk::ColorComponentFlags::B
            | vk::ColorComponentFlags::A,
        blend_enable: vk::FALSE,
        ..Default::default()
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_depth_stencil_state: &depth_stencil,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        render_pass,
        subpass: 0,
        ..Default::default()
    };

    let created = unsafe {
        device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&pipeline_info),
            None,
        )
    };
    unsafe {
        device.destroy_shader_module(vs, None);
        device.destroy_shader_module(fs, None);
    }
    match created {
        Ok(p) => Ok(p[0]),
        Err((_, err)) => Err(anyhow!("create_graphics_pipelines({variant:?}) failed: {err:?}")),
    }
}
