// SPDX-License-Identifier: CEPL-1.0
//! Frame lifecycle and presentation-chain recreation.
//!
//! A frame is `begin_frame` -> `begin_render_pass` -> draws -> `end_render_pass`
//! -> `end_frame`. Calling these out of order is a programming error and panics.
//! A stale chain (out of date, suboptimal, or the window was resized) is rebuilt
//! in place; `begin_frame` returns `None` when the frame has to be skipped.

use std::mem;

use prism_core::RenderResult;
use tracing::{debug, info, warn};

use crate::{
    ClearValues, GraphicsBackend, PresentationChain, RenderSize, SurfaceProvider, SwapStatus,
    Viewport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Acquiring,
    Recording,
    Submitting,
    Rebuilding,
}

pub struct Renderer<B: GraphicsBackend> {
    chain: Option<B::Chain>,
    pipeline: Option<B::Pipeline>,
    /// One per chain image, indexed by the acquired image index.
    command_buffers: Vec<B::CommandBuffer>,
    phase: FramePhase,
    image_index: u32,
    render_pass_open: bool,
    /// Set when the acquire reported a suboptimal chain; forces a rebuild after present.
    stale_after_present: bool,
    clear: ClearValues,
    rebuilds: u64,
    backend: B,
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Builds the first chain, its command buffers and the pipeline.
    ///
    /// Blocks in `surface.wait_events()` while the window has no area. If the
    /// window is closed during that wait no chain exists; check
    /// `surface.should_close()` before the first frame.
    pub fn new<S: SurfaceProvider>(backend: B, surface: &mut S) -> RenderResult<Self> {
        let mut renderer = Self {
            chain: None,
            pipeline: None,
            command_buffers: Vec::new(),
            phase: FramePhase::Idle,
            image_index: 0,
            render_pass_open: false,
            stale_after_present: false,
            clear: ClearValues::default(),
            rebuilds: 0,
            backend,
        };
        renderer.recreate_chain(surface)?;
        Ok(renderer)
    }

    /// Acquires the next image and opens its command buffer.
    ///
    /// Returns `Ok(None)` when the chain was out of date; it has been rebuilt and
    /// the caller should skip this frame.
    pub fn begin_frame<S: SurfaceProvider>(
        &mut self,
        surface: &mut S,
    ) -> RenderResult<Option<B::CommandBuffer>> {
        assert!(
            self.phase == FramePhase::Idle,
            "cannot begin a frame while one is in progress ({:?})",
            self.phase
        );

        self.phase = FramePhase::Acquiring;
        let (image_index, status) = match self.chain_mut().acquire_next_image() {
            Ok(acquired) => acquired,
            Err(e) => {
                self.phase = FramePhase::Idle;
                return Err(e);
            }
        };

        match status {
            SwapStatus::OutOfDate => {
                debug!("acquire: chain out of date");
                // This rebuild already covers any pending resize.
                surface.reset_resized_flag();
                self.recreate_chain(surface)?;
                return Ok(None);
            }
            SwapStatus::Suboptimal => self.stale_after_present = true,
            SwapStatus::Optimal => {}
        }

        assert!(
            (image_index as usize) < self.command_buffers.len(),
            "acquired image {image_index} but only {} command buffers exist",
            self.command_buffers.len()
        );
        self.image_index = image_index;
        let cmd = self.command_buffers[image_index as usize];
        if let Err(e) = self.backend.begin_commands(cmd) {
            self.phase = FramePhase::Idle;
            return Err(e);
        }
        self.phase = FramePhase::Recording;
        Ok(Some(cmd))
    }

    /// Starts the render pass on the current image and sets a full-extent viewport
    /// and scissor.
    pub fn begin_render_pass(&mut self, cmd: B::CommandBuffer) {
        self.assert_current(cmd, "begin a render pass");
        assert!(!self.render_pass_open, "render pass is already open");

        let chain = self.chain.as_ref().expect("chain exists while recording");
        self.backend
            .begin_render_pass(cmd, chain, self.image_index, &self.clear);
        self.backend
            .set_viewport(cmd, &Viewport::full(chain.extent()));
        self.render_pass_open = true;
    }

    pub fn end_render_pass(&mut self, cmd: B::CommandBuffer) {
        self.assert_current(cmd, "end a render pass");
        assert!(self.render_pass_open, "no render pass is open");

        self.backend.end_render_pass(cmd);
        self.render_pass_open = false;
    }

    /// Closes the command buffer, submits it and presents. Rebuilds the chain if
    /// the present reported it stale, the acquire did, or the window was resized.
    pub fn end_frame<S: SurfaceProvider>(&mut self, surface: &mut S) -> RenderResult<()> {
        assert!(
            self.phase == FramePhase::Recording,
            "cannot end a frame that is not in progress ({:?})",
            self.phase
        );
        assert!(
            !self.render_pass_open,
            "cannot end a frame while its render pass is open"
        );

        let cmd = self.command_buffers[self.image_index as usize];
        self.phase = FramePhase::Submitting;
        let status = match self.submit(cmd) {
            Ok(status) => status,
            Err(e) => {
                self.phase = FramePhase::Idle;
                return Err(e);
            }
        };
        self.phase = FramePhase::Idle;

        let acquired_suboptimal = mem::take(&mut self.stale_after_present);
        let resized = surface.was_resized();
        if status != SwapStatus::Optimal || acquired_suboptimal || resized {
            debug!(?status, acquired_suboptimal, resized, "present: rebuilding chain");
            surface.reset_resized_flag();
            self.recreate_chain(surface)?;
        }
        Ok(())
    }

    fn submit(&mut self, cmd: B::CommandBuffer) -> RenderResult<SwapStatus> {
        self.backend.end_commands(cmd)?;
        let image_index = self.image_index;
        self.chain_mut().submit_and_present(cmd, image_index)
    }

    fn recreate_chain<S: SurfaceProvider>(&mut self, surface: &mut S) -> RenderResult<()> {
        self.phase = FramePhase::Rebuilding;

        let mut extent = surface.extent();
        if extent.is_degenerate() {
            info!("surface has no area; waiting for it to be restored");
        }
        while extent.is_degenerate() {
            if surface.should_close() {
                // Keep the old chain; the caller's loop sees the close and tears down.
                self.phase = FramePhase::Idle;
                return Ok(());
            }
            surface.wait_events();
            extent = surface.extent();
        }

        self.backend.wait_idle()?;

        self.pipeline = None;
        let previous = self.chain.take();
        let chain = self.backend.create_chain(extent, previous)?;

        if chain.image_count() != self.command_buffers.len() {
            let old = mem::take(&mut self.command_buffers);
            if !old.is_empty() {
                self.backend.free_command_buffers(old);
            }
            self.command_buffers = self.backend.allocate_command_buffers(chain.image_count())?;
        }

        self.pipeline = Some(self.backend.build_pipeline(&chain)?);
        info!(
            "chain ready: {}x{}, {} images",
            chain.extent().width,
            chain.extent().height,
            chain.image_count()
        );
        self.chain = Some(chain);
        self.rebuilds += 1;
        self.phase = FramePhase::Idle;
        Ok(())
    }

    fn assert_current(&self, cmd: B::CommandBuffer, action: &str) {
        assert!(
            self.phase == FramePhase::Recording,
            "cannot {action} outside a frame ({:?})",
            self.phase
        );
        assert!(
            self.command_buffers[self.image_index as usize] == cmd,
            "cannot {action} with a command buffer from another frame"
        );
    }

    fn chain_mut(&mut self) -> &mut B::Chain {
        self.chain.as_mut().expect("renderer has no chain")
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn pipeline(&self) -> &B::Pipeline {
        self.pipeline.as_ref().expect("renderer has no pipeline")
    }

    pub fn extent(&self) -> RenderSize {
        self.chain.as_ref().map(|c| c.extent()).unwrap_or_default()
    }

    pub fn image_count(&self) -> usize {
        self.chain.as_ref().map_or(0, |c| c.image_count())
    }

    /// Width over height of the current chain; 1.0 before one exists.
    pub fn aspect_ratio(&self) -> f32 {
        let e = self.extent();
        if e.is_degenerate() {
            1.0
        } else {
            e.width as f32 / e.height as f32
        }
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.phase == FramePhase::Recording
    }

    pub fn is_render_pass_open(&self) -> bool {
        self.render_pass_open
    }

    pub fn current_command_buffer(&self) -> B::CommandBuffer {
        assert!(
            self.is_frame_in_progress(),
            "no command buffer outside a frame"
        );
        self.command_buffers[self.image_index as usize]
    }

    pub fn current_image_index(&self) -> u32 {
        assert!(self.is_frame_in_progress(), "no image outside a frame");
        self.image_index
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// How many chains have been built, the first one included.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn clear_values(&self) -> ClearValues {
        self.clear
    }

    pub fn set_clear_colour(&mut self, colour: [f32; 4]) {
        self.clear.colour = colour;
    }

    pub fn wait_idle(&self) -> RenderResult<()> {
        self.backend.wait_idle()
    }
}

impl<B: GraphicsBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        // Teardown order: idle -> command buffers -> pipeline -> chain -> backend.
        if let Err(e) = self.backend.wait_idle() {
            warn!("wait_idle failed during teardown: {e}");
        }
        let buffers = mem::take(&mut self.command_buffers);
        if !buffers.is_empty() {
            self.backend.free_command_buffers(buffers);
        }
        drop(self.pipeline.take());
        drop(self.chain.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{setup, Call, MockBackend, MockSurface};
    use crate::RenderError;

    const SIZE: RenderSize = RenderSize::new(800, 600);

    fn renderer() -> (crate::mock::Log, Renderer<MockBackend>, MockSurface) {
        let (log, backend, mut surface) = setup(&[SIZE]);
        let r = Renderer::new(backend, &mut surface).unwrap();
        log.borrow_mut().clear();
        (log, r, surface)
    }

    fn count(log: &crate::mock::Log, f: impl Fn(&Call) -> bool) -> usize {
        log.borrow().iter().filter(|c| f(c)).count()
    }

    #[test]
    fn new_builds_chain_then_buffers_then_pipeline() {
        let (log, backend, mut surface) = setup(&[SIZE]);
        let r = Renderer::new(backend, &mut surface).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                Call::WaitIdle,
                Call::CreateChain {
                    id: 0,
                    extent: SIZE,
                    previous: None
                },
                Call::Allocate(3),
                Call::BuildPipeline { id: 1, chain: 0 },
            ]
        );
        assert_eq!(r.phase(), FramePhase::Idle);
        assert_eq!(r.image_count(), 3);
        assert_eq!(r.extent(), SIZE);
        assert_eq!(r.rebuild_count(), 1);
        assert!((r.aspect_ratio() - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn frame_records_in_order() {
        let (log, mut r, mut surface) = renderer();

        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        assert!(r.is_frame_in_progress());
        assert_eq!(r.current_command_buffer(), cmd);
        r.begin_render_pass(cmd);
        r.end_render_pass(cmd);
        r.end_frame(&mut surface).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                Call::Acquire,
                Call::Begin(cmd),
                Call::BeginRenderPass {
                    cmd,
                    image: 0,
                    clear: ClearValues::default()
                },
                Call::SetViewport(Viewport::full(SIZE)),
                Call::EndRenderPass(cmd),
                Call::End(cmd),
                Call::SubmitPresent { cmd, image: 0 },
            ]
        );
        assert_eq!(r.phase(), FramePhase::Idle);
        assert_eq!(r.rebuild_count(), 1);
    }

    #[test]
    fn each_image_uses_its_own_command_buffer() {
        let (_log, mut r, mut surface) = renderer();
        let mut seen = Vec::new();
        for _ in 0..3 {
            let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
            seen.push((r.current_image_index(), cmd));
            r.end_frame(&mut surface).unwrap();
        }
        assert_eq!(seen, vec![(0, 100), (1, 101), (2, 102)]);
    }

    #[test]
    fn clear_colour_is_configurable() {
        let (log, mut r, mut surface) = renderer();
        r.set_clear_colour([0.2, 0.3, 0.4, 1.0]);
        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        r.begin_render_pass(cmd);
        let expected = ClearValues {
            colour: [0.2, 0.3, 0.4, 1.0],
            depth: 1.0,
            stencil: 0,
        };
        assert!(log.borrow().iter().any(
            |c| matches!(c, Call::BeginRenderPass { clear, .. } if *clear == expected)
        ));
    }

    #[test]
    #[should_panic(expected = "cannot end a frame that is not in progress")]
    fn end_frame_while_idle_panics() {
        let (_log, mut r, mut surface) = renderer();
        let _ = r.end_frame(&mut surface);
    }

    #[test]
    #[should_panic(expected = "cannot begin a frame while one is in progress")]
    fn begin_frame_twice_panics() {
        let (_log, mut r, mut surface) = renderer();
        r.begin_frame(&mut surface).unwrap();
        let _ = r.begin_frame(&mut surface);
    }

    #[test]
    #[should_panic(expected = "cannot begin a render pass outside a frame")]
    fn render_pass_outside_frame_panics() {
        let (_log, mut r, _surface) = renderer();
        r.begin_render_pass(100);
    }

    #[test]
    #[should_panic(expected = "command buffer from another frame")]
    fn render_pass_on_foreign_command_buffer_panics() {
        let (_log, mut r, mut surface) = renderer();
        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        r.begin_render_pass(cmd + 1);
    }

    #[test]
    #[should_panic(expected = "no render pass is open")]
    fn end_render_pass_without_begin_panics() {
        let (_log, mut r, mut surface) = renderer();
        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        r.end_render_pass(cmd);
    }

    #[test]
    #[should_panic(expected = "render pass is already open")]
    fn nested_render_pass_panics() {
        let (_log, mut r, mut surface) = renderer();
        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        r.begin_render_pass(cmd);
        r.begin_render_pass(cmd);
    }

    #[test]
    #[should_panic(expected = "while its render pass is open")]
    fn end_frame_with_open_render_pass_panics() {
        let (_log, mut r, mut surface) = renderer();
        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        r.begin_render_pass(cmd);
        let _ = r.end_frame(&mut surface);
    }

    #[test]
    #[should_panic(expected = "no command buffer outside a frame")]
    fn current_command_buffer_outside_frame_panics() {
        let (_log, r, _surface) = renderer();
        r.current_command_buffer();
    }

    #[test]
    fn out_of_date_acquire_rebuilds_and_skips_the_frame() {
        let (log, mut r, mut surface) = renderer();
        r.backend()
            .script
            .borrow_mut()
            .acquire
            .push_back(Ok((0, SwapStatus::OutOfDate)));

        assert_eq!(r.begin_frame(&mut surface).unwrap(), None);
        assert_eq!(r.phase(), FramePhase::Idle);
        assert_eq!(
            *log.borrow(),
            vec![
                Call::Acquire,
                Call::WaitIdle,
                Call::DropPipeline(1),
                Call::CreateChain {
                    id: 2,
                    extent: SIZE,
                    previous: Some(0)
                },
                Call::DropChain(0),
                Call::BuildPipeline { id: 3, chain: 2 },
            ]
        );

        // The next frame proceeds normally on the new chain.
        assert!(r.begin_frame(&mut surface).unwrap().is_some());
    }

    #[test]
    fn repeated_rebuilds_keep_command_buffers() {
        let (log, mut r, mut surface) = renderer();
        for _ in 0..4 {
            r.backend()
                .script
                .borrow_mut()
                .acquire
                .push_back(Ok((0, SwapStatus::OutOfDate)));
            assert!(r.begin_frame(&mut surface).unwrap().is_none());
        }

        assert_eq!(r.rebuild_count(), 5);
        assert_eq!(r.image_count(), 3);
        assert_eq!(count(&log, |c| matches!(c, Call::Allocate(_))), 0);
        assert_eq!(count(&log, |c| matches!(c, Call::Free(_))), 0);
        assert_eq!(count(&log, |c| matches!(c, Call::CreateChain { .. })), 4);
    }

    #[test]
    fn image_count_change_reallocates_command_buffers() {
        let (log, mut r, mut surface) = renderer();
        r.backend().image_count.set(4);
        surface.resized = true;

        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        r.end_frame(&mut surface).unwrap();

        assert_eq!(cmd, 100);
        assert_eq!(r.image_count(), 4);
        let log = log.borrow();
        let free = log.iter().position(|c| *c == Call::Free(3)).unwrap();
        let alloc = log.iter().position(|c| *c == Call::Allocate(4)).unwrap();
        assert!(free < alloc);

        drop(log);
        let next = r.begin_frame(&mut surface).unwrap().unwrap();
        assert_eq!(next, 103);
    }

    #[test]
    fn degenerate_extent_waits_before_touching_the_device() {
        let (log, backend, mut surface) = setup(&[
            RenderSize::new(0, 600),
            RenderSize::new(800, 0),
            SIZE,
        ]);
        let r = Renderer::new(backend, &mut surface).unwrap();

        let log = log.borrow();
        assert_eq!(&log[..2], &[Call::WaitEvents, Call::WaitEvents]);
        assert_eq!(log[2], Call::WaitIdle);
        assert_eq!(
            log[3],
            Call::CreateChain {
                id: 0,
                extent: SIZE,
                previous: None
            }
        );
        assert_eq!(r.extent(), SIZE);
    }

    #[test]
    fn closing_while_minimized_keeps_the_old_chain() {
        let (log, mut r, _) = renderer();
        let mut surface = MockSurface::new(log.clone(), &[RenderSize::new(0, 0)]);
        surface.close = true;
        r.backend()
            .script
            .borrow_mut()
            .acquire
            .push_back(Ok((0, SwapStatus::OutOfDate)));

        assert_eq!(r.begin_frame(&mut surface).unwrap(), None);
        assert_eq!(r.phase(), FramePhase::Idle);
        assert_eq!(r.extent(), SIZE);
        assert_eq!(count(&log, |c| matches!(c, Call::CreateChain { .. })), 0);
    }

    #[test]
    fn stale_present_rebuilds_after_the_frame() {
        for status in [SwapStatus::Suboptimal, SwapStatus::OutOfDate] {
            let (log, mut r, mut surface) = renderer();
            r.backend().script.borrow_mut().present.push_back(Ok(status));

            r.begin_frame(&mut surface).unwrap().unwrap();
            r.end_frame(&mut surface).unwrap();

            assert_eq!(r.rebuild_count(), 2, "{status:?}");
            let log = log.borrow();
            let present = log
                .iter()
                .position(|c| matches!(c, Call::SubmitPresent { .. }))
                .unwrap();
            let create = log
                .iter()
                .position(|c| matches!(c, Call::CreateChain { .. }))
                .unwrap();
            assert!(present < create);
        }
    }

    #[test]
    fn suboptimal_acquire_draws_then_rebuilds() {
        let (log, mut r, mut surface) = renderer();
        r.backend()
            .script
            .borrow_mut()
            .acquire
            .push_back(Ok((1, SwapStatus::Suboptimal)));

        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        assert_eq!(cmd, 101);
        assert_eq!(r.rebuild_count(), 1);
        r.end_frame(&mut surface).unwrap();
        assert_eq!(r.rebuild_count(), 2);

        // Only once.
        r.begin_frame(&mut surface).unwrap().unwrap();
        r.end_frame(&mut surface).unwrap();
        assert_eq!(r.rebuild_count(), 2);
        assert_eq!(count(&log, |c| matches!(c, Call::CreateChain { .. })), 1);
    }

    #[test]
    fn resize_flag_rebuilds_and_is_reset() {
        let (_log, mut r, mut surface) = renderer();
        surface.resized = true;

        r.begin_frame(&mut surface).unwrap().unwrap();
        r.end_frame(&mut surface).unwrap();
        assert!(!surface.resized);
        assert_eq!(r.rebuild_count(), 2);

        r.begin_frame(&mut surface).unwrap().unwrap();
        r.end_frame(&mut surface).unwrap();
        assert_eq!(r.rebuild_count(), 2);
    }

    #[test]
    fn out_of_date_acquire_consumes_pending_resize() {
        let (log, mut r, mut surface) = renderer();
        surface.resized = true;
        r.backend()
            .script
            .borrow_mut()
            .acquire
            .push_back(Ok((0, SwapStatus::OutOfDate)));

        assert!(r.begin_frame(&mut surface).unwrap().is_none());
        assert!(!surface.resized);
        assert_eq!(r.rebuild_count(), 2);

        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        r.begin_render_pass(cmd);
        r.end_render_pass(cmd);
        r.end_frame(&mut surface).unwrap();
        assert_eq!(r.rebuild_count(), 2);
        assert_eq!(count(&log, |c| *c == Call::WaitIdle), 1);
    }

    #[test]
    fn render_pass_flag_tracks_begin_and_end() {
        let (_log, mut r, mut surface) = renderer();
        assert!(!r.is_render_pass_open());
        let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
        r.begin_render_pass(cmd);
        assert!(r.is_render_pass_open());
        r.end_render_pass(cmd);
        assert!(!r.is_render_pass_open());
        r.end_frame(&mut surface).unwrap();
    }

    #[test]
    fn optimal_frames_never_rebuild() {
        let (log, mut r, mut surface) = renderer();
        for _ in 0..10 {
            let cmd = r.begin_frame(&mut surface).unwrap().unwrap();
            r.begin_render_pass(cmd);
            r.end_render_pass(cmd);
            r.end_frame(&mut surface).unwrap();
        }
        assert_eq!(r.rebuild_count(), 1);
        assert_eq!(count(&log, |c| *c == Call::WaitIdle), 0);
    }

    #[test]
    fn surface_lost_on_acquire_propagates() {
        let (_log, mut r, mut surface) = renderer();
        r.backend()
            .script
            .borrow_mut()
            .acquire
            .push_back(Err(RenderError::SurfaceLost("device lost".into())));

        let err = r.begin_frame(&mut surface).unwrap_err();
        assert!(matches!(err, RenderError::SurfaceLost(_)));
        assert_eq!(r.phase(), FramePhase::Idle);
    }

    #[test]
    fn presentation_failure_propagates() {
        let (_log, mut r, mut surface) = renderer();
        r.backend()
            .script
            .borrow_mut()
            .present
            .push_back(Err(RenderError::Presentation("queue submit".into())));

        r.begin_frame(&mut surface).unwrap().unwrap();
        let err = r.end_frame(&mut surface).unwrap_err();
        assert!(matches!(err, RenderError::Presentation(_)));
        assert_eq!(r.rebuild_count(), 1);
    }

    #[test]
    fn drop_releases_in_order() {
        let (log, r, _surface) = renderer();
        drop(r);
        assert_eq!(
            *log.borrow(),
            vec![
                Call::WaitIdle,
                Call::Free(3),
                Call::DropPipeline(1),
                Call::DropChain(0),
            ]
        );
    }
}
