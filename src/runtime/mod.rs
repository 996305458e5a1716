//! Runtime Provisioning
//!
//! Detection and version checking for the language runtimes a workflow
//! pins before running its scripts.

pub mod toolchain;

pub use toolchain::{
    locate_toolchain, provision, version_from_output, Runtime, Toolchain, Version, VersionRequirement,
};
