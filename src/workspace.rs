use std::any::Any;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// Type-erased scratch buffers reused across evaluations.
///
/// Lookups search from the most recently used entry, since evaluation loops tend to request the
/// same buffer type many times in a row.
#[derive(Debug, Default)]
pub struct Workspace {
    buffers: Vec<Box<dyn Any + Send>>,
}

impl Workspace {
    pub fn get_or_insert_with<W, F>(&mut self, create: F) -> &mut W
    where
        W: 'static + Send,
        F: FnOnce() -> W,
    {
        let idx = match self.buffers.iter().rposition(|buffer| buffer.is::<W>()) {
            Some(idx) => idx,
            None => {
                self.buffers.push(Box::new(create()));
                self.buffers.len() - 1
            }
        };

        let last = self.buffers.len() - 1;
        self.buffers.swap(idx, last);
        self.buffers[last]
            .downcast_mut()
            .expect("Internal error: the entry was found by its type")
    }
}

/// Per-thread workspaces for parallel evaluation loops.
pub type ThreadLocalWorkspace = ThreadLocal<RefCell<Workspace>>;

/// Runs `f` with the calling thread's buffer of type `W`, creating it with `create` if needed.
pub fn with_thread_local_buffer<W, R>(
    workspace: &ThreadLocalWorkspace,
    create: impl FnOnce() -> W,
    f: impl FnOnce(&mut W) -> R,
) -> R
where
    W: 'static + Send,
{
    let cell = workspace.get_or_default();
    let mut ws = cell.borrow_mut();
    f(ws.get_or_insert_with(create))
}
