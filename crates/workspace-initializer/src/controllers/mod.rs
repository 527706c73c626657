pub mod queue;
pub mod workspace;
