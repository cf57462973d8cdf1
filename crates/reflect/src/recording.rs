use std::fmt::Write as _;
use std::marker::PhantomData;

use waterglass_common::{NodeId, Viewport};

use crate::pass::{
    HostRenderer, OffscreenTargetDesc, RenderCamera, RendererFlags, SceneGraph,
};

/// Handle to a target created by a [`RecordingRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub u32);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordingError {
    #[error("render failure injected by fail_next_render")]
    Injected,
    #[error("render target {0:?} was never created")]
    UnknownTarget(TargetId),
}

/// One `render` call as the renderer saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub target: Option<TargetId>,
    pub flags: RendererFlags,
    pub camera: RenderCamera,
    pub visible: Vec<NodeId>,
}

/// Headless host renderer that records every draw instead of rasterizing.
///
/// Useful for CLI output, logging, and exercising the mirror pass without a
/// GPU. Failures can be injected to check state restoration. Counters cover
/// every draw; the [`DrawCall`] log keeps at most `log_limit` entries.
#[derive(Debug)]
pub struct RecordingRenderer<S> {
    targets: Vec<OffscreenTargetDesc>,
    current: Option<TargetId>,
    flags: RendererFlags,
    auto_clear: bool,
    depth_write: bool,
    viewport: Option<Viewport>,
    clears: usize,
    draws: Vec<DrawCall>,
    log_limit: Option<usize>,
    draw_count: usize,
    draws_per_target: Vec<usize>,
    fail_next: bool,
    _scene: PhantomData<fn(&S)>,
}

impl<S> Default for RecordingRenderer<S> {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            current: None,
            flags: RendererFlags::default(),
            auto_clear: true,
            depth_write: false,
            viewport: None,
            clears: 0,
            draws: Vec::new(),
            log_limit: None,
            draw_count: 0,
            draws_per_target: Vec::new(),
            fail_next: false,
            _scene: PhantomData,
        }
    }
}

impl<S> RecordingRenderer<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the first `limit` draws in the log. Counters keep counting.
    pub fn with_log_limit(mut self, limit: usize) -> Self {
        self.log_limit = Some(limit);
        self.draws.truncate(limit);
        self
    }

    /// Logged draws, oldest first.
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Every `render` call that succeeded, logged or not.
    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    /// Draws that went to `target`.
    pub fn draws_into(&self, target: TargetId) -> usize {
        self.draws_per_target
            .get(target.0 as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn target_desc(&self, target: TargetId) -> Option<&OffscreenTargetDesc> {
        self.targets.get(target.0 as usize)
    }

    pub fn clear_count(&self) -> usize {
        self.clears
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn set_auto_clear(&mut self, auto_clear: bool) {
        self.auto_clear = auto_clear;
    }

    /// Make the next `render` call fail with [`RecordingError::Injected`].
    pub fn fail_next_render(&mut self) {
        self.fail_next = true;
    }

    /// Human-readable log of everything recorded so far.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Recording (targets={}, draws={}, clears={}) ===",
            self.targets.len(),
            self.draw_count,
            self.clears
        );
        for (i, t) in self.targets.iter().enumerate() {
            let _ = writeln!(
                out,
                "  target #{i} {:<16} {}x{} {:?}",
                t.label, t.width, t.height, t.format
            );
        }
        for (i, d) in self.draws.iter().enumerate() {
            let where_to = match d.target {
                Some(t) => format!("target #{}", t.0),
                None => "back buffer".to_string(),
            };
            let p = d.camera.position;
            let _ = writeln!(
                out,
                "  draw #{i} -> {where_to}: eye=({:.2}, {:.2}, {:.2}) far={:.0} nodes={} xr={} shadows={}",
                p.x,
                p.y,
                p.z,
                d.camera.far,
                d.visible.len(),
                d.flags.xr_enabled,
                d.flags.shadow_auto_update
            );
        }
        let dropped = self.draw_count - self.draws.len();
        if dropped > 0 {
            let _ = writeln!(out, "  ... {dropped} more draws not logged");
        }
        out
    }
}

impl<S: SceneGraph> HostRenderer for RecordingRenderer<S> {
    type Scene = S;
    type Target = TargetId;
    type Error = RecordingError;

    fn create_target(&mut self, desc: &OffscreenTargetDesc) -> Result<TargetId, RecordingError> {
        self.targets.push(*desc);
        self.draws_per_target.push(0);
        Ok(TargetId(self.targets.len() as u32 - 1))
    }

    fn render_target(&self) -> Option<TargetId> {
        self.current
    }

    fn set_render_target(&mut self, target: Option<TargetId>) {
        self.current = target;
    }

    fn flags(&self) -> RendererFlags {
        self.flags
    }

    fn set_flags(&mut self, flags: RendererFlags) {
        self.flags = flags;
    }

    fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    fn clear(&mut self) {
        self.clears += 1;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn render(&mut self, scene: &S, camera: &RenderCamera) -> Result<(), RecordingError> {
        if std::mem::take(&mut self.fail_next) {
            return Err(RecordingError::Injected);
        }
        if let Some(t) = self.current {
            if self.target_desc(t).is_none() {
                return Err(RecordingError::UnknownTarget(t));
            }
        }
        self.draw_count += 1;
        if let Some(count) = self
            .current
            .and_then(|t| self.draws_per_target.get_mut(t.0 as usize))
        {
            *count += 1;
        }
        if self.log_limit.is_none_or(|limit| self.draws.len() < limit) {
            self.draws.push(DrawCall {
                target: self.current,
                flags: self.flags,
                camera: *camera,
                visible: scene.visible_nodes(),
            });
        }
        Ok(())
    }
}
