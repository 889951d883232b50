// SPDX-License-Identifier: CEPL-1.0
//! Swapchain images plus everything sized or formatted after them: views,
//! depth targets, the render pass, framebuffers and per-image sync.

use std::sync::Arc;

use ash::vk;
use prism_core::{RenderError, RenderResult};
use prism_render::{PresentationChain, RenderSize, SwapStatus};
use tracing::{info, warn};

use crate::{vk_err, DeviceContext, VkVsyncMode};

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy)]
struct AcquireSlot {
    sem: vk::Semaphore,
    fence: vk::Fence,
    /// False once `fence` is reset until a queue submission that signals it is
    /// accepted. Waiting on an unarmed fence never returns.
    armed: bool,
}

/// Slot fences that some queue submission will eventually signal.
fn armed_fences(slots: &[AcquireSlot]) -> Vec<vk::Fence> {
    slots.iter().filter(|s| s.armed).map(|s| s.fence).collect()
}

struct DepthTarget {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

pub struct Swapchain {
    ctx: Arc<DeviceContext>,
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,

    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth: Vec<DepthTarget>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    /// Signalled by the submit for image i, waited on by its present.
    render_finished: Vec<vk::Semaphore>,
    /// Slot fence of the frame currently using image i, or null.
    images_in_flight: Vec<vk::Fence>,
    acq_slots: Vec<AcquireSlot>,
    acq_index: usize,
}

fn fmt_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::D32_SFLOAT => "D32_SFLOAT",
        vk::Format::D32_SFLOAT_S8_UINT => "D32_SFLOAT_S8_UINT",
        vk::Format::D24_UNORM_S8_UINT => "D24_UNORM_S8_UINT",
        _ => "OTHER",
    }
}

fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB)
        .or_else(|| {
            formats
                .iter()
                .copied()
                .find(|f| f.format == vk::Format::R8G8B8A8_SRGB)
        })
        .or_else(|| {
            formats.iter().copied().find(|f| {
                f.format == vk::Format::B8G8R8A8_UNORM
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| formats.first().copied())
}

pub(crate) fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    mode: VkVsyncMode,
) -> vk::PresentModeKHR {
    let preferred: &[vk::PresentModeKHR] = match mode {
        VkVsyncMode::Mailbox => &[vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
        VkVsyncMode::Fifo => &[vk::PresentModeKHR::FIFO],
    };
    preferred
        .iter()
        .copied()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub(crate) fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 means no maximum).
pub(crate) fn image_count_from_caps(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        want
    } else {
        want.min(caps.max_image_count)
    }
}

const DEPTH_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

pub(crate) fn choose_depth_format(supported: impl Fn(vk::Format) -> bool) -> Option<vk::Format> {
    DEPTH_CANDIDATES.into_iter().find(|&f| supported(f))
}

fn chain_err(what: &'static str) -> impl Fn(vk::Result) -> RenderError {
    vk_err(RenderError::SwapchainCreation, what)
}

impl Swapchain {
    /// Builds a chain for `extent`. `previous` becomes the old swapchain and is
    /// destroyed once the new one is complete.
    pub fn create(
        ctx: Arc<DeviceContext>,
        extent: RenderSize,
        previous: Option<Swapchain>,
        mode: VkVsyncMode,
    ) -> RenderResult<Self> {
        if extent.is_degenerate() {
            return Err(RenderError::SwapchainCreation(format!(
                "requested extent {}x{} has no area",
                extent.width, extent.height
            )));
        }

        // Partially built state is released by Drop if any step fails.
        let mut chain = Swapchain {
            ctx,
            swapchain: vk::SwapchainKHR::null(),
            format: vk::Format::UNDEFINED,
            depth_format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            image_views: Vec::new(),
            depth: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            render_finished: Vec::new(),
            images_in_flight: Vec::new(),
            acq_slots: Vec::new(),
            acq_index: 0,
        };

        unsafe {
            let old = previous
                .as_ref()
                .map_or(vk::SwapchainKHR::null(), |p| p.swapchain);
            chain.create_swapchain(extent, old, mode)?;
            chain.create_image_views()?;
            chain.create_depth_targets()?;
            chain.create_render_pass()?;
            chain.create_framebuffers()?;
            chain.create_sync_objects()?;
        }

        if let Some(prev) = &previous {
            if prev.format != chain.format || prev.depth_format != chain.depth_format {
                warn!(
                    "chain formats changed: colour {} -> {}, depth {} -> {}",
                    fmt_name(prev.format),
                    fmt_name(chain.format),
                    fmt_name(prev.depth_format),
                    fmt_name(chain.depth_format)
                );
            }
        }
        drop(previous);

        Ok(chain)
    }

    unsafe fn create_swapchain(
        &mut self,
        want: RenderSize,
        old_swapchain: vk::SwapchainKHR,
        mode: VkVsyncMode,
    ) -> RenderResult<()> {
        let surf_i = self.ctx.surface_loader();
        let phys = self.ctx.physical_device();
        let surface = self.ctx.surface();

        // capabilities: image counts, transforms, current extent (or u32::MAX for free-size)
        let caps = surf_i
            .get_physical_device_surface_capabilities(phys, surface)
            .map_err(chain_err("surface capabilities"))?;
        let formats = surf_i
            .get_physical_device_surface_formats(phys, surface)
            .map_err(chain_err("surface formats"))?;
        let modes = surf_i
            .get_physical_device_surface_present_modes(phys, surface)
            .map_err(chain_err("surface present modes"))?;

        let surf_format = choose_surface_format(&formats)
            .ok_or_else(|| RenderError::SwapchainCreation("surface reports no formats".into()))?;
        let present_mode = choose_present_mode(&modes, mode);
        let extent = extent_from_caps(&caps, want);
        if extent.width == 0 || extent.height == 0 {
            return Err(RenderError::SwapchainCreation(
                "surface extent has no area".into(),
            ));
        }
        let min_count = image_count_from_caps(&caps);

        let pre_transform = if caps
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            caps.current_transform
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface,
            min_image_count: min_count,
            image_format: surf_format.format,
            image_color_space: surf_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            // graphics and present share one queue family
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain,
            ..Default::default()
        };

        let loader = self.ctx.swapchain_loader();
        self.swapchain = loader
            .create_swapchain(&swap_info, None)
            .map_err(chain_err("create_swapchain"))?;
        self.images = loader
            .get_swapchain_images(self.swapchain)
            .map_err(chain_err("get_swapchain_images"))?;
        self.format = surf_format.format;
        self.extent = extent;

        info!(
            "swapchain: format {}, present_mode {}, extent {}x{}, images(min={} -> {})",
            fmt_name(self.format),
            pm_name(present_mode),
            extent.width,
            extent.height,
            caps.min_image_count,
            self.images.len()
        );
        Ok(())
    }

    unsafe fn create_image_views(&mut self) -> RenderResult<()> {
        let d = self.ctx.device();
        for &image in &self.images {
            let view = create_view(d, image, self.format, vk::ImageAspectFlags::COLOR)
                .map_err(chain_err("create_image_view(colour)"))?;
            self.image_views.push(view);
        }
        Ok(())
    }

    unsafe fn create_depth_targets(&mut self) -> RenderResult<()> {
        let instance = self.ctx.instance();
        let phys = self.ctx.physical_device();
        self.depth_format = choose_depth_format(|f| {
            instance
                .get_physical_device_format_properties(phys, f)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| RenderError::SwapchainCreation("no supported depth format".into()))?;

        for _ in 0..self.images.len() {
            let target = self.create_depth_target()?;
            self.depth.push(target);
        }
        Ok(())
    }

    unsafe fn create_depth_target(&self) -> RenderResult<DepthTarget> {
        let d = self.ctx.device();
        let img_ci = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format: self.depth_format,
            extent: vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = d
            .create_image(&img_ci, None)
            .map_err(chain_err("create_image(depth)"))?;

        let req = d.get_image_memory_requirements(image);
        let memory = self
            .ctx
            .find_memory_type(req.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .and_then(|memory_type_index| {
                let alloc = vk::MemoryAllocateInfo {
                    s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                    allocation_size: req.size,
                    memory_type_index,
                    ..Default::default()
                };
                d.allocate_memory(&alloc, None)
                    .map_err(chain_err("allocate_memory(depth)"))
            });
        let memory = match memory {
            Ok(m) => m,
            Err(e) => {
                d.destroy_image(image, None);
                return Err(RenderError::SwapchainCreation(format!("depth memory: {e}")));
            }
        };

        let view = d
            .bind_image_memory(image, memory, 0)
            .and_then(|()| create_view(d, image, self.depth_format, vk::ImageAspectFlags::DEPTH));
        match view {
            Ok(view) => Ok(DepthTarget {
                image,
                memory,
                view,
            }),
            Err(e) => {
                d.destroy_image(image, None);
                d.free_memory(memory, None);
                Err(RenderError::SwapchainCreation(format!("depth view: {e}")))
            }
        }
    }

    unsafe fn create_render_pass(&mut self) -> RenderResult<()> {
        let attachments = [
            vk::AttachmentDescription {
                format: self.format,
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
                format: self.depth_format,
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
        let colour_ref = vk::AttachmentReference {
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
            p_color_attachments: &colour_ref,
            p_depth_stencil_attachment: &depth_ref,
            ..Default::default()
        };
        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: stages,
            src_access_mask: vk::AccessFlags::empty(),
            dst_stage_mask: stages,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        self.render_pass = self
            .ctx
            .device()
            .create_render_pass(&info, None)
            .map_err(chain_err("create_render_pass"))?;
        Ok(())
    }

    unsafe fn create_framebuffers(&mut self) -> RenderResult<()> {
        let d = self.ctx.device();
        for (colour, depth) in self.image_views.iter().zip(&self.depth) {
            let attachments = [*colour, depth.view];
            let info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = d
                .create_framebuffer(&info, None)
                .map_err(chain_err("create_framebuffer"))?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    unsafe fn create_sync_objects(&mut self) -> RenderResult<()> {
        let d = self.ctx.device();
        let sem_ci = vk::SemaphoreCreateInfo::default();
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let sem = d
                .create_semaphore(&sem_ci, None)
                .map_err(chain_err("create_semaphore(image available)"))?;
            let fence = match d.create_fence(&fence_ci, None) {
                Ok(f) => f,
                Err(e) => {
                    d.destroy_semaphore(sem, None);
                    return Err(chain_err("create_fence(in flight)")(e));
                }
            };
            self.acq_slots.push(AcquireSlot {
                sem,
                fence,
                armed: true,
            });
        }
        for _ in 0..self.images.len() {
            let sem = d
                .create_semaphore(&sem_ci, None)
                .map_err(chain_err("create_semaphore(render finished)"))?;
            self.render_finished.push(sem);
        }
        self.images_in_flight = vec![vk::Fence::null(); self.images.len()];
        Ok(())
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    pub fn extent_vk(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }
}

unsafe fn create_view(
    d: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> ash::prelude::VkResult<vk::ImageView> {
    let sub = vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    };
    let view_ci = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: sub,
        ..Default::default()
    };
    d.create_image_view(&view_ci, None)
}

// STRICT PER-FRAME ORDER:
// 1) wait the slot fence, acquire with the slot's image-available semaphore
// 2) wait whichever slot still owns that image, hand the image to this slot
// 3) reset the slot fence, submit (signals the image's render-finished + slot fence)
// 4) present waiting on render-finished, advance the slot
impl PresentationChain for Swapchain {
    type CommandBuffer = vk::CommandBuffer;

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> RenderSize {
        RenderSize::new(self.extent.width, self.extent.height)
    }

    fn acquire_next_image(&mut self) -> RenderResult<(u32, SwapStatus)> {
        let AcquireSlot { sem, fence, armed } = self.acq_slots[self.acq_index];
        let d = self.ctx.device();
        let lost = |what: &'static str| vk_err(RenderError::SurfaceLost, what);

        unsafe {
            if armed {
                d.wait_for_fences(&[fence], true, u64::MAX)
                    .map_err(lost("wait_for_fences(acquire slot)"))?;
            }

            let (image_index, status) = match self.ctx.swapchain_loader().acquire_next_image(
                self.swapchain,
                u64::MAX,
                sem,
                vk::Fence::null(),
            ) {
                Ok((i, false)) => (i, SwapStatus::Optimal),
                Ok((i, true)) => (i, SwapStatus::Suboptimal),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok((0, SwapStatus::OutOfDate)),
                Err(e) => return Err(lost("acquire_next_image")(e)),
            };

            let owner = self.images_in_flight[image_index as usize];
            let owner_pending = armed_fences(&self.acq_slots).contains(&owner);
            if owner != vk::Fence::null() && owner != fence && owner_pending {
                d.wait_for_fences(&[owner], true, u64::MAX)
                    .map_err(lost("wait_for_fences(image in flight)"))?;
            }
            self.images_in_flight[image_index as usize] = fence;
            Ok((image_index, status))
        }
    }

    fn submit_and_present(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
    ) -> RenderResult<SwapStatus> {
        let slot = self.acq_index;
        let AcquireSlot { sem, fence, .. } = self.acq_slots[slot];
        let render_finished = self.render_finished[image_index as usize];
        let d = self.ctx.device();
        let queue = self.ctx.queue();
        let failed = |what: &'static str| vk_err(RenderError::Presentation, what);

        unsafe {
            d.reset_fences(&[fence]).map_err(failed("reset_fences"))?;
            self.acq_slots[slot].armed = false;

            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let submit = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                wait_semaphore_count: 1,
                p_wait_semaphores: &sem,
                p_wait_dst_stage_mask: wait_stages.as_ptr(),
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                signal_semaphore_count: 1,
                p_signal_semaphores: &render_finished,
                ..Default::default()
            };
            if let Err(e) = d.queue_submit(queue, std::slice::from_ref(&submit), fence) {
                // An empty submit still signals the fence, so teardown can wait on it.
                if d.queue_submit(queue, &[], fence).is_ok() {
                    self.acq_slots[slot].armed = true;
                } else {
                    warn!("slot fence left unsignalled after a failed submit");
                }
                return Err(failed("queue_submit")(e));
            }
            self.acq_slots[slot].armed = true;

            let present = vk::PresentInfoKHR {
                s_type: vk::StructureType::PRESENT_INFO_KHR,
                wait_semaphore_count: 1,
                p_wait_semaphores: &render_finished,
                swapchain_count: 1,
                p_swapchains: &self.swapchain,
                p_image_indices: &image_index,
                ..Default::default()
            };
            let status = match self.ctx.swapchain_loader().queue_present(queue, &present) {
                Ok(false) => SwapStatus::Optimal,
                Ok(true) => SwapStatus::Suboptimal,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => SwapStatus::OutOfDate,
                Err(e) => return Err(failed("queue_present")(e)),
            };

            self.acq_index = (self.acq_index + 1) % MAX_FRAMES_IN_FLIGHT;
            Ok(status)
        }
    }
}

// STRICT TEARDOWN ORDER:
// - wait all armed slot fences (no submit still references these resources)
// - framebuffers before the render pass and the views they reference
// - depth views before their images, images before their memory
// - colour views before the swapchain that owns the images
// - sync objects, then the swapchain itself
impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            let d = self.ctx.device();

            let fences = armed_fences(&self.acq_slots);
            if !fences.is_empty() {
                let _ = d.wait_for_fences(&fences, true, u64::MAX);
            }

            for &fb in &self.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            d.destroy_render_pass(self.render_pass, None);

            for t in &self.depth {
                d.destroy_image_view(t.view, None);
                d.destroy_image(t.image, None);
                d.free_memory(t.memory, None);
            }
            for &iv in &self.image_views {
                d.destroy_image_view(iv, None);
            }

            for &sem in &self.render_finished {
                d.destroy_semaphore(sem, None);
            }
            for s in &self.acq_slots {
                d.destroy_fence(s.fence, None);
                d.destroy_semaphore(s.sem, None);
            }

            self.ctx
                .swapchain_loader()
                .destroy_swapchain(self.swapchain, None);
        }
    }
}
