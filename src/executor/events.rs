use uuid::Uuid;

/// Events streamed from the worker thread to the UI while a graph runs.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Log(String),
    NodeActive(Uuid),
    Finished,
}
