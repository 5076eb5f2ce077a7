//! Versioned save states
//!
//! A snapshot is a plain copy of [`X65State`]. Banks are addressed by
//! [`crate::memory::Bank`] ids and the host callbacks live outside the state,
//! so nothing needs rebinding when a snapshot is loaded into a running system.

use crate::{X65Error, X65State, X65System};
use emu_core::chip::PinCpu;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bumped whenever the layout of [`X65State`] changes
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<C> {
    pub version: u32,
    pub state: X65State<C>,
}

impl<C: Serialize + DeserializeOwned> Snapshot<C> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, X65Error> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a snapshot and check that its state can run
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, X65Error> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        snapshot.state.validate()?;
        Ok(snapshot)
    }
}

impl<C> X65State<C> {
    /// Check the structure the tick path relies on: bank sizes, regions
    /// inside their banks, buffer positions and beam position.
    pub fn validate(&self) -> Result<(), X65Error> {
        let check = |ok: bool, what: &'static str| {
            if ok {
                Ok(())
            } else {
                Err(X65Error::SnapshotInvalid(what))
            }
        };
        check(self.banks.has_board_sizes(), "memory banks")?;
        check(self.mem_cpu.fits(&self.banks), "CPU memory map")?;
        check(self.mem_vic.fits(&self.banks), "VIC memory map")?;
        check(self.audio.is_consistent(), "audio buffer")?;
        check(self.kbd.is_consistent(), "keyboard matrix")?;
        check(self.vic.is_consistent(), "VIC state")
    }
}

impl<C: PinCpu + Clone> X65System<C> {
    pub fn save_snapshot(&self) -> Snapshot<C> {
        Snapshot {
            version: SNAPSHOT_VERSION,
            state: self.state.clone(),
        }
    }

    /// Replace the running state. A snapshot from another version, or one
    /// whose state fails [`X65State::validate`], is rejected and the system
    /// is left as it was.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot<C>) -> Result<(), X65Error> {
        if snapshot.version != SNAPSHOT_VERSION {
            log(LogCategory::Bus, LogLevel::Warn, || {
                format!(
                    "X65: rejecting snapshot version {} (expected {})",
                    snapshot.version, SNAPSHOT_VERSION
                )
            });
            return Err(X65Error::SnapshotVersion {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }
        if let Err(err) = snapshot.state.validate() {
            log(LogCategory::Bus, LogLevel::Warn, || {
                format!("X65: rejecting snapshot: {}", err)
            });
            return Err(err);
        }
        self.state = snapshot.state.clone();
        log(LogCategory::Bus, LogLevel::Info, || {
            "X65: snapshot loaded".to_string()
        });
        Ok(())
    }
}
