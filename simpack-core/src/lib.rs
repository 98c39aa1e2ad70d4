#![doc = "simpack-core: core logic library for simpack."]

//! This crate contains the packaging pipeline and everything it touches:
//! build-directory layout, pinned dependency manifests, the external
//! resolver/installer contracts and deterministic zip archives.
//! The `simpack` binary crate is only CLI glue on top of this.
//!
//! # Usage
//! Build a [`config::PackageConfig`], pick a [`contract::DependencyResolver`]
//! and a [`contract::PackageInstaller`], and call [`package::package`].

pub mod archive;
pub mod config;
pub mod contract;
pub mod error;
pub mod install;
pub mod layout;
pub mod manifest;
pub mod package;
pub mod resolve;
pub mod tool;
