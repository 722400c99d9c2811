//! Release flows for the fork's Python packages and container images
//!
//! # Pipeline
//!
//! 1. **version**: resolve one release version from tag history (strict or permissive)
//! 2. **targets**: enumerate what to build (primary package, integrations, image matrix)
//! 3. **overlay**: for each target, overlay the generated build-info module and pinned
//!    manifest, run the build, and restore the originals whatever happens
//! 4. **driver**: collect per-target results without aborting siblings
//! 5. **registry**: publish to the artifact registry
//!
//! Configuration errors (no tag, bad arguments, leftover backups) surface before any
//! file is touched.

pub mod context;
pub mod driver;
pub mod image;
pub mod metadata;
pub mod overlay;
pub mod package;
pub mod registry;
pub mod targets;
pub mod version;

pub use context::ReleaseContext;
pub use overlay::PendingMutations;
pub use registry::RegistryCoordinates;
