
use eframe::egui;
use eframe::egui_wgpu::{self, CallbackResources, CallbackTrait, RenderState, ScreenDescriptor};
use eframe::wgpu;
use eframe::wgpu::util::DeviceExt;
use tracing::{debug, info, warn};

use crate::ops::color::{ColorPipeline, ColorUniforms};
use crate::ops::geometry::{ProjectionMesh, Vertex};
use crate::ops::sharpen::SharpenUniforms;
use crate::renderer::frame_bridge::TextureUpload;
use crate::renderer::render_loop::{FrameParams, SceneBackend};

const SCENE_SHADER: &str = include_str!("shaders/scene.wgsl");
const SHARPEN_SHADER: &str = include_str!("shaders/sharpen.wgsl");

/// Format of the offscreen target the scene is rasterized into.
const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const VIDEO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

struct MeshBuffers {
    generation: u64,
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

struct VideoTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

struct SceneTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

fn linear_clamp_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Draws the projection mesh into an offscreen target. Lives next to the
/// egui renderer and shares its device and queue.
pub struct WgpuBackend {
    render_state: RenderState,
    pipeline: wgpu::RenderPipeline,
    uniforms_bind_group: wgpu::BindGroup,
    camera_buffer: wgpu::Buffer,
    color_buffer: wgpu::Buffer,
    video_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    mesh: Option<MeshBuffers>,
    video: Option<VideoTexture>,
    target: Option<SceneTarget>,
}

impl WgpuBackend {
    pub fn new(render_state: &RenderState) -> Self {
        let device = &render_state.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("orbview scene shader"),
            source: wgpu::ShaderSource::Wgsl(SCENE_SHADER.into()),
        });

        let uniforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene uniforms layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let video_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("video texture layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera uniforms"),
            contents: bytemuck::bytes_of(&glam::Mat4::IDENTITY.to_cols_array_2d()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let color_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("color uniforms"),
            contents: bytemuck::bytes_of(&ColorPipeline::default().uniforms()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniforms_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene uniforms"),
            layout: &uniforms_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: color_buffer.as_entire_binding(),
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene pipeline layout"),
            bind_group_layouts: &[&uniforms_layout, &video_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SCENE_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            // The sphere is seen from inside; the plane from the front.
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = linear_clamp_sampler(device, "video sampler");
        let sharpen = SharpenResources::new(device, render_state.target_format);
        render_state
            .renderer
            .write()
            .callback_resources
            .insert(sharpen);
        info!(target_format = ?render_state.target_format, "gpu scene initialised");

        Self {
            render_state: render_state.clone(),
            pipeline,
            uniforms_bind_group,
            camera_buffer,
            color_buffer,
            video_layout,
            sampler,
            mesh: None,
            video: None,
            target: None,
        }
    }

    fn device(&self) -> &wgpu::Device {
        &self.render_state.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.render_state.queue
    }

    fn ensure_target(&mut self, size: (u32, u32)) {
        let max = self.max_texture_dimension();
        let size = (size.0.clamp(1, max), size.1.clamp(1, max));
        if self.target.as_ref().is_some_and(|t| t.size == size) {
            return;
        }
        let texture = self.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("scene target"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SCENE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        debug!(width = size.0, height = size.1, "scene target resized");

        {
            let mut renderer = self.render_state.renderer.write();
            if let Some(sharpen) = renderer.callback_resources.get_mut::<SharpenResources>() {
                sharpen.bind_source(&self.render_state.device, &view);
            }
        }
        self.target = Some(SceneTarget { view, size });
    }

    /// Returns false when the frame exceeds the device's texture limit.
    fn allocate_video(&mut self, width: u32, height: u32) -> bool {
        if let Some(old) = self.video.take() {
            old.texture.destroy();
        }
        let max = self.max_texture_dimension();
        if width.max(height) > max {
            warn!(width, height, max, "video frame exceeds the texture limit");
            return false;
        }
        let texture = self.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("video frame"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: VIDEO_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("video frame bind group"),
            layout: &self.video_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.video = Some(VideoTexture {
            texture,
            bind_group,
            size: (width, height),
        });
        true
    }

    fn write_vertices(&self, mesh: &ProjectionMesh, buffer: &wgpu::Buffer) {
        self.queue()
            .write_buffer(buffer, 0, bytemuck::cast_slice(&mesh.vertices()));
    }
}

impl SceneBackend for WgpuBackend {
    fn upload_mesh(&mut self, generation: u64, mesh: &ProjectionMesh) {
        let device = self.device();
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices()),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh indices"),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        if let Some(old) = self.mesh.take() {
            old.vertex.destroy();
            old.index.destroy();
        }
        self.mesh = Some(MeshBuffers {
            generation,
            vertex,
            index,
            index_count: mesh.indices().len() as u32,
        });
    }

    fn update_uvs(&mut self, generation: u64, mesh: &ProjectionMesh) {
        if let Some(buffers) = self.mesh.as_ref().filter(|m| m.generation == generation) {
            self.write_vertices(mesh, &buffers.vertex);
        }
    }

    fn release_mesh(&mut self, generation: u64) {
        if self.mesh.as_ref().is_some_and(|m| m.generation == generation) {
            if let Some(old) = self.mesh.take() {
                old.vertex.destroy();
                old.index.destroy();
            }
        }
    }

    fn upload_frame(&mut self, upload: &TextureUpload<'_>) {
        let size = (upload.width, upload.height);
        if (upload.reallocate || self.video.as_ref().is_none_or(|v| v.size != size))
            && !self.allocate_video(upload.width, upload.height)
        {
            return;
        }
        let Some(video) = self.video.as_ref() else {
            return;
        };
        self.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &video.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(upload.texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(upload.width * 8),
                rows_per_image: Some(upload.height),
            },
            wgpu::Extent3d {
                width: upload.width,
                height: upload.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn release_texture(&mut self) {
        if let Some(old) = self.video.take() {
            old.texture.destroy();
            debug!("video texture released");
        }
    }

    fn set_color(&mut self, uniforms: &ColorUniforms) {
        self.queue()
            .write_buffer(&self.color_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn max_texture_dimension(&self) -> u32 {
        self.device().limits().max_texture_dimension_2d
    }

    fn render(&mut self, params: &FrameParams) {
        self.ensure_target(params.target_size);
        self.queue()
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&params.view_proj));
        let Some(target) = self.target.as_ref() else {
            return;
        };

        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("orbview scene"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let (Some(mesh), Some(video)) = (self.mesh.as_ref(), self.video.as_ref()) {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &self.uniforms_bind_group, &[]);
                pass.set_bind_group(1, &video.bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        self.queue().submit(Some(encoder.finish()));
    }
}

/// Sharpen pass state, stored in the egui renderer's callback resources.
pub struct SharpenResources {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniforms: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

impl SharpenResources {
    fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sharpen shader"),
            source: wgpu::ShaderSource::Wgsl(SHARPEN_SHADER.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sharpen layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sharpen pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sharpen pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sharpen uniforms"),
            contents: bytemuck::bytes_of(&SharpenUniforms {
                texel: [1.0, 1.0],
                strength: 0.0,
                _pad: 0.0,
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            pipeline,
            layout,
            sampler: linear_clamp_sampler(device, "sharpen sampler"),
            uniforms,
            bind_group: None,
        }
    }

    fn bind_source(&mut self, device: &wgpu::Device, view: &wgpu::TextureView) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sharpen bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniforms.as_entire_binding(),
                },
            ],
        }));
    }
}

/// Paints the sharpened scene target into the egui viewport rect.
pub struct SharpenCallback {
    pub uniforms: SharpenUniforms,
}

impl CallbackTrait for SharpenCallback {
    fn prepare(
        &self,
        _device: &wgpu::Device,
        queue: &wgpu::Queue,
        _screen: &ScreenDescriptor,
        _egui_encoder: &mut wgpu::CommandEncoder,
        resources: &mut CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        if let Some(sharpen) = resources.get::<SharpenResources>() {
            queue.write_buffer(&sharpen.uniforms, 0, bytemuck::bytes_of(&self.uniforms));
        }
        Vec::new()
    }

    fn paint(
        &self,
        _info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        resources: &CallbackResources,
    ) {
        let Some(sharpen) = resources.get::<SharpenResources>() else {
            return;
        };
        let Some(bind_group) = sharpen.bind_group.as_ref() else {
            return;
        };
        render_pass.set_pipeline(&sharpen.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

/// Adds the sharpen pass for `rect` to the current egui frame.
pub fn paint_scene(ui: &egui::Ui, rect: egui::Rect, uniforms: SharpenUniforms) {
    let callback = egui_wgpu::Callback::new_paint_callback(rect, SharpenCallback { uniforms });
    ui.painter().add(callback);
}
