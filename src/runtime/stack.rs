use crate::runtime::{EvalError, RuntimeError, RuntimeErrorKind, frame::Frame};

/// Host-owned evaluation context: the frame stack plus the last error.
#[derive(Debug)]
pub struct Stack {
    id: u32,
    max_depth: usize,
    frames: Vec<Frame>,
    error: Option<EvalError>,
}

impl Stack {
    pub(crate) fn new(id: u32, max_depth: usize) -> Self {
        Self {
            id,
            max_depth,
            frames: Vec::new(),
            error: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&EvalError> {
        self.error.as_ref()
    }

    /// Message of the last error, or an empty string.
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub(crate) fn set_error(&mut self, error: EvalError) {
        self.error = Some(error);
    }

    pub(crate) fn check_depth(&self) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.max_depth {
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow {
                depth: self.max_depth,
            }));
        }
        Ok(())
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        match (frame.caller, frame.iteration) {
            (Some(caller), Some(i)) => log::debug!(
                "push {:?} frame {} for {} iteration {} (depth {})",
                frame.kind,
                frame.branch,
                caller,
                i,
                self.frames.len() + 1
            ),
            (Some(caller), None) => log::debug!(
                "push {:?} frame {} for {} (depth {})",
                frame.kind,
                frame.branch,
                caller,
                self.frames.len() + 1
            ),
            _ => log::debug!("push {:?} frame {} (depth {})", frame.kind, frame.branch, self.frames.len() + 1),
        }
        self.frames.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) -> Option<Frame> {
        let frame = self.frames.pop();
        if let Some(frame) = &frame {
            log::debug!("pop frame {:?} {}", frame.kind, frame.branch);
        }
        frame
    }

    pub(crate) fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub(crate) fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub(crate) fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// Drops every frame, e.g. after an internal error left the stack dirty.
    pub(crate) fn unwind_all(&mut self) {
        self.frames.clear();
    }
}
