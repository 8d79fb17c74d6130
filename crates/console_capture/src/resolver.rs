use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use crate::{
    context::{ExecutionContext, UNKNOWN_TASK_ID},
    stack::{
        write_path_end, StackCapture, StackFrame, CONSOLE_EMIT_MARKER, INTERNAL_FRAME_BUDGET,
    },
};

/// Distance from the console entry frame to the code that called the console.
const CALLER_OFFSET: usize = 2;

/// Works out which task a write belongs to.
pub struct TaskResolver {
    context: Arc<dyn ExecutionContext>,
    stack: Arc<dyn StackCapture>,
    root: PathBuf,
}

impl TaskResolver {
    pub fn new(
        context: Arc<dyn ExecutionContext>,
        stack: Arc<dyn StackCapture>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            context,
            stack,
            root: root.into(),
        }
    }

    /// Current test, then suite, then file, then the caller's source file,
    /// then [`UNKNOWN_TASK_ID`].
    pub fn resolve(&self) -> String {
        let from_context = self
            .context
            .current_test()
            .filter(|id| !id.is_empty())
            .or_else(|| self.context.current_suite().filter(|id| !id.is_empty()))
            .or_else(|| self.context.current_file().filter(|id| !id.is_empty()));
        if let Some(id) = from_context {
            return id;
        }

        let frames = self
            .stack
            .capture(INTERNAL_FRAME_BUDGET + CALLER_OFFSET + 1);
        task_id_from_stack(&frames, &self.root).unwrap_or_else(|| UNKNOWN_TASK_ID.to_string())
    }
}

/// Console calls are attributed to whoever called the console method; raw
/// sink writes to the first frame past the interceptor and `std::io` adapters.
fn task_id_from_stack(frames: &[StackFrame], root: &Path) -> Option<String> {
    let caller = match frames
        .iter()
        .position(|frame| frame.matches(CONSOLE_EMIT_MARKER))
    {
        Some(index) => frames.get(index + CALLER_OFFSET)?,
        None => frames.get(write_path_end(frames)?)?,
    };
    let file = caller.file()?;
    if file.as_os_str().is_empty() {
        return None;
    }
    Some(relative_to(root, file))
}

/// Lexical relative path from `root` to `path`, joined with `/`. Relative
/// inputs are taken relative to the working directory.
pub(crate) fn relative_to(root: &Path, path: &Path) -> String {
    let cwd = std::env::current_dir().ok();
    let root = absolutize(root, cwd.as_deref());
    let path = absolutize(path, cwd.as_deref());

    let root_parts: Vec<Component<'_>> = root.components().collect();
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let common = root_parts
        .iter()
        .zip(&path_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    segments.extend(std::iter::repeat("..".to_string()).take(root_parts.len() - common));
    segments.extend(
        path_parts[common..]
            .iter()
            .map(|part| part.as_os_str().to_string_lossy().into_owned()),
    );
    segments.join("/")
}

fn absolutize(path: &Path, cwd: Option<&Path>) -> PathBuf {
    let joined = match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    };
    let mut out = PathBuf::new();
    for part in joined.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(part);
                }
            }
            other => out.push(other),
        }
    }
    out
}
