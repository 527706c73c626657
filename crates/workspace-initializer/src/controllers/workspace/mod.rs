mod controller;
mod reconciler;
mod state;

pub use controller::*;
pub use reconciler::*;
pub use state::*;
