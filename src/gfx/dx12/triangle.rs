//! 三角形实体
//!
//! 根签名只有一个 CBV（b0），管线状态为实心填充、背面剔除、无深度测试。
//! 顶点缓冲区和每个后台缓冲区一份的常量缓冲区都放在上传堆中。

use std::path::{Path, PathBuf};

use windows::core::s;
use windows::Win32::Graphics::Direct3D::{D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST, ID3DBlob};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::command::FrameMetadata;
use crate::renderer::vertex::{triangle_vertices, ConstantBufferPayload, Vertex};
use crate::scene::entity::{Entity, ResourceInitMetadata};

use super::backend::Dx12Backend;
use super::shader::{ShaderBytecode, ShaderStage};
use super::swap_chain::BACK_BUFFER_FORMAT;
use super::{hr_error, set_debug_name};

struct TriangleResources {
    root_signature: ID3D12RootSignature,
    pipeline_state: ID3D12PipelineState,
    vertex_buffer: ID3D12Resource,
    vertex_buffer_size: u32,
    constant_buffers: Vec<ID3D12Resource>,
}

/// 彩色三角形
pub struct TriangleEntity {
    shader_dir: PathBuf,
    frame: u64,
    resources: Option<TriangleResources>,
}

impl TriangleEntity {
    /// # 参数
    ///
    /// * `shader_dir` - 着色器目录，见 `shader` 模块
    pub fn new(shader_dir: &Path) -> Self {
        Self {
            shader_dir: shader_dir.to_path_buf(),
            frame: 0,
            resources: None,
        }
    }

    fn create_root_signature(device: &ID3D12Device) -> Result<ID3D12RootSignature> {
        let parameters = [D3D12_ROOT_PARAMETER {
            ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
            Anonymous: D3D12_ROOT_PARAMETER_0 {
                Descriptor: D3D12_ROOT_DESCRIPTOR {
                    ShaderRegister: 0, // b0
                    RegisterSpace: 0,
                },
            },
            ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
        }];

        let desc = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: parameters.len() as u32,
            pParameters: parameters.as_ptr(),
            NumStaticSamplers: 0,
            pStaticSamplers: std::ptr::null(),
            Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        };

        let mut signature: Option<ID3DBlob> = None;
        unsafe { D3D12SerializeRootSignature(&desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut signature, None) }
            .map_err(hr_error(GraphicsError::ResourceCreation, "Failed to serialize root signature"))?;
        let signature = signature.ok_or_else(|| {
            GraphicsError::ResourceCreation("Root signature serialization produced no blob".to_string())
        })?;

        let root_signature: ID3D12RootSignature = unsafe {
            device.CreateRootSignature(
                0,
                std::slice::from_raw_parts(signature.GetBufferPointer() as *const u8, signature.GetBufferSize()),
            )
        }
        .map_err(hr_error(GraphicsError::ResourceCreation, "Failed to create root signature"))?;
        set_debug_name(&root_signature, "Triangle Root Signature");

        Ok(root_signature)
    }

    fn create_pipeline_state(
        device: &ID3D12Device,
        root_signature: &ID3D12RootSignature,
        vertex_shader: &ShaderBytecode,
        pixel_shader: &ShaderBytecode,
    ) -> Result<ID3D12PipelineState> {
        let input_elements = [
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32A32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: Vertex::COLOR_OFFSET,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];

        let mut blend_targets = [D3D12_RENDER_TARGET_BLEND_DESC::default(); 8];
        blend_targets[0] = D3D12_RENDER_TARGET_BLEND_DESC {
            BlendEnable: false.into(),
            LogicOpEnable: false.into(),
            SrcBlend: D3D12_BLEND_ONE,
            DestBlend: D3D12_BLEND_ZERO,
            BlendOp: D3D12_BLEND_OP_ADD,
            SrcBlendAlpha: D3D12_BLEND_ONE,
            DestBlendAlpha: D3D12_BLEND_ZERO,
            BlendOpAlpha: D3D12_BLEND_OP_ADD,
            LogicOp: D3D12_LOGIC_OP_NOOP,
            RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };

        let mut desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
            // 借用根签名指针，不增加引用计数
            pRootSignature: unsafe { std::mem::transmute_copy(root_signature) },
            VS: vertex_shader.as_d3d12(),
            PS: pixel_shader.as_d3d12(),
            BlendState: D3D12_BLEND_DESC {
                AlphaToCoverageEnable: false.into(),
                IndependentBlendEnable: false.into(),
                RenderTarget: blend_targets,
            },
            SampleMask: u32::MAX,
            RasterizerState: D3D12_RASTERIZER_DESC {
                FillMode: D3D12_FILL_MODE_SOLID,
                CullMode: D3D12_CULL_MODE_BACK,
                FrontCounterClockwise: false.into(),
                DepthBias: 0,
                DepthBiasClamp: 0.0,
                SlopeScaledDepthBias: 0.0,
                DepthClipEnable: true.into(),
                MultisampleEnable: false.into(),
                AntialiasedLineEnable: false.into(),
                ForcedSampleCount: 0,
                ConservativeRaster: D3D12_CONSERVATIVE_RASTERIZATION_MODE_OFF,
            },
            DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
                DepthEnable: false.into(),
                StencilEnable: false.into(),
                ..Default::default()
            },
            InputLayout: D3D12_INPUT_LAYOUT_DESC {
                pInputElementDescs: input_elements.as_ptr(),
                NumElements: input_elements.len() as u32,
            },
            PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
            NumRenderTargets: 1,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            ..Default::default()
        };
        desc.RTVFormats[0] = BACK_BUFFER_FORMAT;

        let pipeline_state: ID3D12PipelineState = unsafe { device.CreateGraphicsPipelineState(&desc) }
            .map_err(hr_error(GraphicsError::ResourceCreation, "Failed to create pipeline state"))?;
        set_debug_name(&pipeline_state, "Triangle Pipeline State");

        Ok(pipeline_state)
    }

    fn create_upload_buffer(device: &ID3D12Device, size: usize, name: &str) -> Result<ID3D12Resource> {
        let heap_properties = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_UPLOAD,
            CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
            MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
            CreationNodeMask: 1,
            VisibleNodeMask: 1,
        };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Width: size as u64,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DXGI_FORMAT_UNKNOWN,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            Flags: D3D12_RESOURCE_FLAG_NONE,
            ..Default::default()
        };

        let mut buffer: Option<ID3D12Resource> = None;
        unsafe {
            device.CreateCommittedResource(
                &heap_properties,
                D3D12_HEAP_FLAG_NONE,
                &desc,
                D3D12_RESOURCE_STATE_GENERIC_READ,
                None,
                &mut buffer,
            )
        }
        .map_err(hr_error(GraphicsError::ResourceCreation, "Failed to create upload buffer"))?;

        let buffer = buffer.ok_or_else(|| {
            GraphicsError::ResourceCreation(format!("{}: CreateCommittedResource returned no resource", name))
        })?;
        set_debug_name(&buffer, name);
        Ok(buffer)
    }

    /// 把 `data` 写入上传堆中的缓冲区
    fn write_buffer(buffer: &ID3D12Resource, data: &[u8]) -> Result<()> {
        // 只写不读
        let read_range = D3D12_RANGE { Begin: 0, End: 0 };
        let mut mapped = std::ptr::null_mut();
        unsafe { buffer.Map(0, Some(&read_range), Some(&mut mapped)) }
            .map_err(hr_error(GraphicsError::ResourceCreation, "Failed to map buffer"))?;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
            buffer.Unmap(0, None);
        }
        Ok(())
    }
}

impl Entity<Dx12Backend> for TriangleEntity {
    fn name(&self) -> &str {
        "Triangle"
    }

    fn on_resource_create(&mut self, init: &ResourceInitMetadata<'_, Dx12Backend>) -> Result<()> {
        let device = init.device;

        let root_signature = Self::create_root_signature(device)?;

        let vertex_shader = ShaderBytecode::load(&self.shader_dir, self.name(), ShaderStage::Vertex)?;
        let pixel_shader = ShaderBytecode::load(&self.shader_dir, self.name(), ShaderStage::Pixel)?;
        let pipeline_state = Self::create_pipeline_state(device, &root_signature, &vertex_shader, &pixel_shader)?;

        let vertices = triangle_vertices();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let vertex_buffer = Self::create_upload_buffer(device, vertex_bytes.len(), "Triangle Vertex Buffer")?;
        Self::write_buffer(&vertex_buffer, vertex_bytes)?;

        let mut constant_buffers = Vec::with_capacity(init.back_buffer_count);
        for i in 0..init.back_buffer_count {
            let buffer = Self::create_upload_buffer(
                device,
                std::mem::size_of::<ConstantBufferPayload>(),
                &format!("Triangle Constant Buffer {}", i),
            )?;
            constant_buffers.push(buffer);
        }

        crate::scene_info!(
            vertex_shader = %vertex_shader.path().display(),
            pixel_shader = %pixel_shader.path().display(),
            constant_buffers = constant_buffers.len(),
            "Triangle resources created"
        );

        self.resources = Some(TriangleResources {
            root_signature,
            pipeline_state,
            vertex_buffer,
            vertex_buffer_size: vertex_bytes.len() as u32,
            constant_buffers,
        });
        Ok(())
    }

    fn on_update(&mut self, frame: u64) {
        self.frame = frame;
    }

    fn on_render(&mut self, frame: &mut FrameMetadata<Dx12Backend>) -> Result<()> {
        let resources = self.resources.as_ref().ok_or_else(|| {
            GraphicsError::CommandExecution("Triangle rendered before its resources were created".to_string())
        })?;

        let constant_buffer = resources.constant_buffers.get(frame.back_buffer_index).ok_or_else(|| {
            GraphicsError::CommandExecution(format!(
                "No triangle constant buffer for back buffer {}",
                frame.back_buffer_index
            ))
        })?;

        let payload = ConstantBufferPayload::for_frame(self.frame);
        Self::write_buffer(constant_buffer, bytemuck::bytes_of(&payload))?;

        let vertex_buffer_view = D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: unsafe { resources.vertex_buffer.GetGPUVirtualAddress() },
            SizeInBytes: resources.vertex_buffer_size,
            StrideInBytes: Vertex::stride(),
        };

        let list = frame.command_list.raw();
        unsafe {
            list.SetPipelineState(&resources.pipeline_state);
            list.SetGraphicsRootSignature(&resources.root_signature);
            list.IASetVertexBuffers(0, Some(&[vertex_buffer_view]));
            list.SetGraphicsRootConstantBufferView(0, constant_buffer.GetGPUVirtualAddress());
            list.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            list.DrawInstanced(3, 1, 0, 0);
        }
        Ok(())
    }

    fn on_shutdown(&mut self) {
        if let Some(resources) = self.resources.take() {
            crate::scene_info!(
                constant_buffers = resources.constant_buffers.len(),
                "Triangle resources released"
            );
            drop(resources);
        }
    }
}
