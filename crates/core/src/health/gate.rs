/// Answers whether new work may start right now.
///
/// Implemented by the health monitor (remote and direct backends) and by
/// the local engine adapter.
pub trait ReadinessGate: Send + Sync {
    fn is_ready(&self) -> bool;
}

/// A gate with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticGate(pub bool);

impl ReadinessGate for StaticGate {
    fn is_ready(&self) -> bool {
        self.0
    }
}
