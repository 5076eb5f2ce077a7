//! Core emulator primitives and traits.
//!
//! Pin-driven chips share the [`chip`] contract: every clock cycle a chip is
//! handed a 64-bit pin word and returns it with its outputs applied. Boards
//! built from these chips implement [`System`] for hosts.

pub mod chip;
pub mod logging;
pub mod via_6522;
pub mod vic_6561;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A rendered frame, one ARGB pixel per `u32`
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }
    }

    pub type AudioSample = f32;
}

use serde_json::Value;

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Cartridge", "Program")
    pub id: String,
    /// User-friendly name for display
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["prg"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset the chips; memory contents survive
    fn reset(&mut self);

    /// Emulate one video frame and return it.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Capture the complete emulator state as JSON.
    fn save_state(&self) -> Result<Value, Self::Error>;

    /// Restore a state captured by `save_state`. An incompatible state is
    /// rejected without touching the running system.
    fn load_state(&mut self, v: &Value) -> Result<(), Self::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}
