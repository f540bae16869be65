//! Vulkan frame backend drawing one mesh.

use std::sync::Arc;

use ash::vk;
use invert_core::{Extent, Mesh};
use invert_gpu::command::{
    begin_command_buffer, end_command_buffer, submit, transition_image, CommandPool,
    ImageTransition, SubmitSync,
};
use invert_gpu::swapchain::DEPTH_FORMAT;
use invert_gpu::sync::{reset_fence, wait_for_fence};
use invert_gpu::{
    write_uniform_buffer, AcquireOutcome, DescriptorPool, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, FrameFences, GpuBuffer, GpuContext, GraphicsPipeline,
    GraphicsPipelineConfig, ImageSemaphores, PresentOutcome, ShaderCode, SwapchainManager,
    UploadStrategy, Uploader, VertexLayout,
};

use crate::camera::{model_rotation, Camera, FrameUniforms};
use crate::error::{RenderError, Result};
use crate::scheduler::FrameBackend;

/// Renderer settings.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Vertex and fragment SPIR-V for `vertex_layout`.
    pub shader: ShaderCode,
    pub vertex_layout: VertexLayout,
    pub frames_in_flight: usize,
    pub upload: UploadStrategy,
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    pub fn new(shader: ShaderCode) -> Self {
        Self {
            shader,
            vertex_layout: VertexLayout::PositionColor,
            frames_in_flight: 2,
            upload: UploadStrategy::Direct,
            clear_color: [0.02, 0.02, 0.04, 1.0],
        }
    }
}

/// Per frame-in-flight resources. The fence lives in [`FrameFences`].
struct FrameSlot {
    cmd: vk::CommandBuffer,
    uniforms: GpuBuffer,
    descriptor_set: vk::DescriptorSet,
}

struct MeshBuffers {
    vertices: GpuBuffer,
    indices: Option<GpuBuffer>,
    vertex_count: u32,
    index_count: u32,
}

impl MeshBuffers {
    fn upload(ctx: &Arc<GpuContext>, mesh: &Mesh, config: &RendererConfig) -> Result<Self> {
        mesh.validate()?;

        let uploader = Uploader::new(Arc::clone(ctx))?;
        let usage = vk::BufferUsageFlags::VERTEX_BUFFER;
        let vertices = match config.vertex_layout {
            VertexLayout::Position => {
                uploader.upload(&mesh.position_vertices(), usage, config.upload)?
            }
            VertexLayout::PositionColor => {
                uploader.upload(&mesh.color_vertices(), usage, config.upload)?
            }
        };
        let indices = if mesh.indices.is_empty() {
            None
        } else {
            Some(uploader.upload(
                &mesh.indices,
                vk::BufferUsageFlags::INDEX_BUFFER,
                config.upload,
            )?)
        };

        tracing::info!(
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            strategy = ?config.upload,
            "Mesh uploaded"
        );

        Ok(Self {
            vertices,
            indices,
            vertex_count: mesh.vertex_count() as u32,
            index_count: mesh.indices.len() as u32,
        })
    }
}

/// Draws a single mesh into the swapchain.
///
/// Fields drop in declaration order, after [`Drop::drop`] has idled the
/// device: frame resources first, the context last.
pub struct MeshRenderer {
    slots: Vec<FrameSlot>,
    fences: FrameFences,
    semaphores: ImageSemaphores,
    mesh: MeshBuffers,
    /// Owns the slots' descriptor sets.
    _descriptor_pool: DescriptorPool,
    descriptor_layout: DescriptorSetLayout,
    pipeline: GraphicsPipeline,
    /// Owns the slots' command buffers.
    _command_pool: CommandPool,
    swapchain: SwapchainManager,
    camera: Camera,
    config: RendererConfig,
    ctx: Arc<GpuContext>,
}

impl MeshRenderer {
    /// Upload `mesh`, build the swapchain for `drawable` and all per-frame
    /// resources.
    pub fn new(
        ctx: Arc<GpuContext>,
        mesh: &Mesh,
        config: RendererConfig,
        drawable: Extent,
    ) -> Result<Self> {
        if config.frames_in_flight == 0 {
            return Err(RenderError::Config(
                "frames in flight must be at least 1".to_string(),
            ));
        }
        let frames = config.frames_in_flight;
        let device = ctx.device_arc();

        let mesh = MeshBuffers::upload(&ctx, mesh, &config)?;

        let mut swapchain = SwapchainManager::new(Arc::clone(&ctx));
        if !swapchain.create(drawable)? {
            return Err(RenderError::Config(format!(
                "cannot create a swapchain for a {}x{} drawable",
                drawable.width, drawable.height
            )));
        }

        let layout_builder =
            DescriptorSetLayoutBuilder::new().uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        let descriptor_layout = layout_builder.build(Arc::clone(&device))?;
        let descriptor_pool = DescriptorPool::new(
            Arc::clone(&device),
            frames as u32,
            &layout_builder.pool_sizes(frames as u32),
        )?;
        let descriptor_sets =
            descriptor_pool.allocate(&vec![descriptor_layout.handle(); frames])?;

        let pipeline =
            Self::build_pipeline(&device, &config, swapchain.format(), &descriptor_layout)?;

        let command_pool = CommandPool::new(Arc::clone(&device), ctx.graphics_queue_family())?;
        let command_buffers = command_pool.allocate(frames as u32)?;

        let uniform_size = std::mem::size_of::<FrameUniforms>() as vk::DeviceSize;
        let mut slots = Vec::with_capacity(frames);
        for (cmd, descriptor_set) in command_buffers.into_iter().zip(descriptor_sets) {
            let mut uniforms = GpuBuffer::allocate_and_bind(
                &ctx,
                uniform_size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                &[],
            )?;
            uniforms.map_persistent()?;
            unsafe {
                write_uniform_buffer(&device, descriptor_set, 0, uniforms.handle(), uniform_size);
            }
            slots.push(FrameSlot {
                cmd,
                uniforms,
                descriptor_set,
            });
        }

        let fences = FrameFences::new(Arc::clone(&device), frames)?;
        let semaphores = ImageSemaphores::new(Arc::clone(&device), swapchain.image_count())?;

        let extent = swapchain.extent();
        let mut camera = Camera::default();
        camera.set_aspect(Extent::new(extent.width, extent.height).aspect_ratio());

        tracing::info!(
            frames_in_flight = frames,
            images = swapchain.image_count(),
            "Renderer ready"
        );

        Ok(Self {
            slots,
            fences,
            semaphores,
            mesh,
            _descriptor_pool: descriptor_pool,
            descriptor_layout,
            pipeline,
            _command_pool: command_pool,
            swapchain,
            camera,
            config,
            ctx,
        })
    }

    fn build_pipeline(
        device: &Arc<ash::Device>,
        config: &RendererConfig,
        color_format: vk::Format,
        descriptor_layout: &DescriptorSetLayout,
    ) -> Result<GraphicsPipeline> {
        let pipeline_config = GraphicsPipelineConfig::for_vertex_layout(
            config.vertex_layout,
            config.shader.clone(),
            color_format,
            Some(DEPTH_FORMAT),
        );
        Ok(GraphicsPipeline::new(
            Arc::clone(device),
            &pipeline_config,
            &[descriptor_layout.handle()],
        )?)
    }

}

impl FrameBackend for MeshRenderer {
    fn wait_for_fence(&mut self, frame: usize) -> Result<()> {
        unsafe { wait_for_fence(self.ctx.device(), self.fences.get(frame))? };
        Ok(())
    }

    fn acquire(&mut self, semaphore_index: usize) -> Result<AcquireOutcome> {
        Ok(self
            .swapchain
            .acquire_next_image(self.semaphores.image_acquired(semaphore_index))?)
    }

    fn reset_fence(&mut self, frame: usize) -> Result<()> {
        unsafe { reset_fence(self.ctx.device(), self.fences.get(frame))? };
        Ok(())
    }

    fn update(&mut self, frame: usize, frame_number: u64) -> Result<()> {
        let uniforms = self.camera.uniforms(model_rotation(frame_number));
        self.slots[frame].uniforms.write(&[uniforms])?;
        Ok(())
    }

    fn record(&mut self, frame: usize, image_index: u32) -> Result<()> {
        let device = self.ctx.device();
        let slot = &self.slots[frame];
        let cmd = slot.cmd;
        let extent = self.swapchain.extent();
        let depth = self
            .swapchain
            .depth()
            .ok_or_else(|| invert_gpu::GpuError::InvalidState("no depth buffer".to_string()))?;

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(image_index))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.config.clear_color,
                },
            });
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(depth.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };

        unsafe {
            begin_command_buffer(device, cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

            transition_image(
                device,
                cmd,
                self.swapchain.image(image_index),
                ImageTransition::to_color_attachment(),
            );
            transition_image(device, cmd, depth.image(), ImageTransition::to_depth_attachment());

            device.cmd_begin_rendering(cmd, &rendering_info);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout(),
                0,
                &[slot.descriptor_set],
                &[],
            );
            device.cmd_set_viewport_with_count(cmd, &[viewport]);
            device.cmd_set_scissor_with_count(cmd, &[scissor]);
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.mesh.vertices.handle()], &[0]);

            match &self.mesh.indices {
                Some(indices) => {
                    device.cmd_bind_index_buffer(cmd, indices.handle(), 0, vk::IndexType::UINT32);
                    device.cmd_draw_indexed(cmd, self.mesh.index_count, 1, 0, 0, 0);
                }
                None => device.cmd_draw(cmd, self.mesh.vertex_count, 1, 0, 0),
            }

            device.cmd_end_rendering(cmd);

            transition_image(
                device,
                cmd,
                self.swapchain.image(image_index),
                ImageTransition::to_present(),
            );
            end_command_buffer(device, cmd)?;
        }
        Ok(())
    }

    fn submit(&mut self, frame: usize, image_index: u32, semaphore_index: usize) -> Result<()> {
        let sync = SubmitSync {
            wait: Some((
                self.semaphores.image_acquired(semaphore_index),
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            )),
            signal: Some(self.semaphores.render_finished(image_index as usize)),
        };
        unsafe {
            submit(
                self.ctx.device(),
                self.ctx.graphics_queue(),
                self.slots[frame].cmd,
                sync,
                self.fences.get(frame),
            )?;
        }
        Ok(())
    }

    fn present(&mut self, image_index: u32) -> PresentOutcome {
        self.swapchain.present(
            self.ctx.graphics_queue(),
            image_index,
            self.semaphores.render_finished(image_index as usize),
        )
    }

    fn recreate(
        &mut self,
        drawable: &dyn Fn() -> Extent,
        cancel: &dyn Fn() -> bool,
    ) -> Result<bool> {
        let old_format = self.swapchain.format();
        if !self.swapchain.recreate(drawable, cancel)? {
            return Ok(false);
        }

        // The device is idle here, so every semaphore can be replaced.
        self.semaphores =
            ImageSemaphores::new(self.ctx.device_arc(), self.swapchain.image_count())?;

        if self.swapchain.format() != old_format {
            tracing::warn!(
                old = ?old_format,
                new = ?self.swapchain.format(),
                "Surface format changed, rebuilding pipeline"
            );
            self.pipeline = Self::build_pipeline(
                &self.ctx.device_arc(),
                &self.config,
                self.swapchain.format(),
                &self.descriptor_layout,
            )?;
        }

        let extent = self.swapchain.extent();
        self.camera
            .set_aspect(Extent::new(extent.width, extent.height).aspect_ratio());
        Ok(true)
    }

    fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.ctx.wait_idle()?;
        Ok(())
    }
}

impl Drop for MeshRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            tracing::error!("Failed to idle device before teardown: {e}");
        }
    }
}
