// SPDX-License-Identifier: CEPL-1.0
//! In-memory backend, chain and surface that log every call, for state-machine tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use prism_core::RenderResult;

use crate::{
    ClearValues, GraphicsBackend, PresentationChain, PushConstantPayload, RenderSize,
    SurfaceProvider, SwapStatus, Viewport,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    WaitEvents,
    WaitIdle,
    CreateChain { id: u32, extent: RenderSize, previous: Option<u32> },
    DropChain(u32),
    Allocate(usize),
    Free(usize),
    BuildPipeline { id: u32, chain: u32 },
    DropPipeline(u32),
    Begin(u32),
    End(u32),
    BeginRenderPass { cmd: u32, image: u32, clear: ClearValues },
    SetViewport(Viewport),
    EndRenderPass(u32),
    Acquire,
    SubmitPresent { cmd: u32, image: u32 },
    BindPipeline(u32),
    PushConstants(PushConstantPayload),
    BindMesh(u32),
    DrawMesh(u32),
}

pub type Log = Rc<RefCell<Vec<Call>>>;

#[derive(Default)]
pub struct Script {
    pub acquire: VecDeque<RenderResult<(u32, SwapStatus)>>,
    pub present: VecDeque<RenderResult<SwapStatus>>,
}

pub struct MockBackend {
    pub log: Log,
    pub script: Rc<RefCell<Script>>,
    /// Image count handed to the next chain.
    pub image_count: Rc<Cell<usize>>,
    next_id: Cell<u32>,
    next_cmd: Cell<u32>,
}

impl MockBackend {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            script: Rc::default(),
            image_count: Rc::new(Cell::new(3)),
            next_id: Cell::new(0),
            next_cmd: Cell::new(100),
        }
    }

    fn id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn push(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }
}

pub struct MockChain {
    pub id: u32,
    extent: RenderSize,
    image_count: usize,
    next_image: u32,
    log: Log,
    script: Rc<RefCell<Script>>,
}

impl Drop for MockChain {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Call::DropChain(self.id));
    }
}

impl PresentationChain for MockChain {
    type CommandBuffer = u32;

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn extent(&self) -> RenderSize {
        self.extent
    }

    fn acquire_next_image(&mut self) -> RenderResult<(u32, SwapStatus)> {
        self.log.borrow_mut().push(Call::Acquire);
        if let Some(next) = self.script.borrow_mut().acquire.pop_front() {
            return next;
        }
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        Ok((image, SwapStatus::Optimal))
    }

    fn submit_and_present(&mut self, cmd: u32, image_index: u32) -> RenderResult<SwapStatus> {
        self.log.borrow_mut().push(Call::SubmitPresent {
            cmd,
            image: image_index,
        });
        self.script
            .borrow_mut()
            .present
            .pop_front()
            .unwrap_or(Ok(SwapStatus::Optimal))
    }
}

pub struct MockPipeline {
    pub id: u32,
    log: Log,
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Call::DropPipeline(self.id));
    }
}

pub struct MockMesh(pub u32);

impl GraphicsBackend for MockBackend {
    type CommandBuffer = u32;
    type Chain = MockChain;
    type Pipeline = MockPipeline;
    type Mesh = MockMesh;

    fn wait_idle(&self) -> RenderResult<()> {
        self.push(Call::WaitIdle);
        Ok(())
    }

    fn create_chain(
        &self,
        extent: RenderSize,
        previous: Option<MockChain>,
    ) -> RenderResult<MockChain> {
        let id = self.id();
        self.push(Call::CreateChain {
            id,
            extent,
            previous: previous.as_ref().map(|c| c.id),
        });
        let chain = MockChain {
            id,
            extent,
            image_count: self.image_count.get(),
            next_image: 0,
            log: self.log.clone(),
            script: self.script.clone(),
        };
        drop(previous);
        Ok(chain)
    }

    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<u32>> {
        self.push(Call::Allocate(count));
        let first = self.next_cmd.get();
        self.next_cmd.set(first + count as u32);
        Ok((first..first + count as u32).collect())
    }

    fn free_command_buffers(&self, buffers: Vec<u32>) {
        self.push(Call::Free(buffers.len()));
    }

    fn build_pipeline(&self, chain: &MockChain) -> RenderResult<MockPipeline> {
        let id = self.id();
        self.push(Call::BuildPipeline {
            id,
            chain: chain.id,
        });
        Ok(MockPipeline {
            id,
            log: self.log.clone(),
        })
    }

    fn begin_commands(&self, cmd: u32) -> RenderResult<()> {
        self.push(Call::Begin(cmd));
        Ok(())
    }

    fn end_commands(&self, cmd: u32) -> RenderResult<()> {
        self.push(Call::End(cmd));
        Ok(())
    }

    fn begin_render_pass(&self, cmd: u32, _chain: &MockChain, image_index: u32, clear: &ClearValues) {
        self.push(Call::BeginRenderPass {
            cmd,
            image: image_index,
            clear: *clear,
        });
    }

    fn set_viewport(&self, _cmd: u32, viewport: &Viewport) {
        self.push(Call::SetViewport(*viewport));
    }

    fn end_render_pass(&self, cmd: u32) {
        self.push(Call::EndRenderPass(cmd));
    }

    fn bind_pipeline(&self, _cmd: u32, pipeline: &MockPipeline) {
        self.push(Call::BindPipeline(pipeline.id));
    }

    fn push_constants(&self, _cmd: u32, _pipeline: &MockPipeline, payload: &PushConstantPayload) {
        self.push(Call::PushConstants(*payload));
    }

    fn bind_mesh(&self, _cmd: u32, mesh: &MockMesh) {
        self.push(Call::BindMesh(mesh.0));
    }

    fn draw_mesh(&self, _cmd: u32, mesh: &MockMesh) {
        self.push(Call::DrawMesh(mesh.0));
    }
}

/// A window whose size only changes when events are waited for.
pub struct MockSurface {
    log: Log,
    extents: RefCell<VecDeque<RenderSize>>,
    pub resized: bool,
    pub close: bool,
}

impl MockSurface {
    pub fn new(log: Log, extents: &[RenderSize]) -> Self {
        Self {
            log,
            extents: RefCell::new(extents.iter().copied().collect()),
            resized: false,
            close: false,
        }
    }
}

impl SurfaceProvider for MockSurface {
    fn extent(&self) -> RenderSize {
        self.extents.borrow().front().copied().unwrap_or_default()
    }

    fn should_close(&self) -> bool {
        self.close
    }

    fn poll_events(&mut self) {}

    fn wait_events(&mut self) {
        self.log.borrow_mut().push(Call::WaitEvents);
        let mut extents = self.extents.borrow_mut();
        if extents.len() > 1 {
            extents.pop_front();
        }
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }
}

pub fn setup(extents: &[RenderSize]) -> (Log, MockBackend, MockSurface) {
    let log: Log = Rc::default();
    let backend = MockBackend::new(log.clone());
    let surface = MockSurface::new(log.clone(), extents);
    (log, backend, surface)
}
