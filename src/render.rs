pub mod broker;
pub mod dirty;
pub mod frame;
pub mod geometry;
pub mod pipeline;

/// Resource broker implementations.
pub mod backends {
    /// In-memory device, used by tests and headless hosts.
    pub mod software;
}

mod viewport;

pub use viewport::Viewport;
