//! Rigid alignment of secondary views to the reference view.
//!
//! Registration is a capability behind [`ViewRegistrar`]; every call
//! returns either an aligned volume or a failure that aborts the run.

pub mod command;
pub mod phase;

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::error::{FusionError, Result};
use crate::volume::Volume;

pub use command::CommandRegistrar;
pub use phase::PhaseCorrelationRegistrar;

/// Reason a registrar could not align a view.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct RegistrationFailure {
    pub reason: String,
}

impl RegistrationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Transform produced by a registrar.
#[derive(Clone, Debug, PartialEq)]
pub enum TransformArtifact {
    Identity,
    /// Translation of the moving view, in voxels (x, y, z) and in physical units.
    Translation {
        voxels: [f64; 3],
        physical: [f64; 3],
        peak: f64,
    },
    /// Transform file written by an external tool.
    External { path: PathBuf },
}

/// Aligned view plus the transform that produced it.
#[derive(Clone, Debug)]
pub struct Registration {
    pub volume: Volume,
    pub transform: TransformArtifact,
}

/// Aligns a moving volume to a fixed volume on the same grid.
pub trait ViewRegistrar: Send + Sync {
    fn name(&self) -> &str;

    fn register(
        &self,
        fixed: &Volume,
        moving: &Volume,
    ) -> std::result::Result<Registration, RegistrationFailure>;
}

/// Views are already co-registered; returns the moving volume unchanged.
pub struct IdentityRegistrar;

impl ViewRegistrar for IdentityRegistrar {
    fn name(&self) -> &str {
        "identity"
    }

    fn register(
        &self,
        _fixed: &Volume,
        moving: &Volume,
    ) -> std::result::Result<Registration, RegistrationFailure> {
        Ok(Registration {
            volume: moving.clone(),
            transform: TransformArtifact::Identity,
        })
    }
}

/// Register every secondary view against `fixed`.
///
/// Views are numbered from 1 (the reference is view 0). The first failure
/// stops the run; a registrar that returns a volume off the canonical grid
/// counts as a failure.
pub fn register_views<F>(
    registrar: &dyn ViewRegistrar,
    fixed: &Volume,
    moving: &[Volume],
    on_progress: F,
) -> Result<Vec<Registration>>
where
    F: Fn(usize),
{
    let mut registered = Vec::with_capacity(moving.len());
    for (i, view) in moving.iter().enumerate() {
        let index = i + 1;
        fixed
            .geometry
            .ensure_same_grid(&view.geometry, &format!("view {index} before registration"))?;

        let registration = registrar.register(fixed, view).map_err(|failure| {
            warn!(view = index, registrar = registrar.name(), reason = %failure, "Registration failed");
            FusionError::Registration {
                view: index,
                reason: failure.reason,
            }
        })?;

        if !fixed.geometry.same_grid(&registration.volume.geometry) {
            return Err(FusionError::Registration {
                view: index,
                reason: format!(
                    "{} returned a volume off the canonical grid (size {:?})",
                    registrar.name(),
                    registration.volume.size()
                ),
            });
        }

        info!(view = index, registrar = registrar.name(), transform = ?registration.transform, "Registered view");
        registered.push(registration);
        on_progress(index);
    }
    Ok(registered)
}
