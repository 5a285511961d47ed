//! # berth-plugin
//!
//! Plugin-facing capability surface for Berth machines.
//!
//! Plugins implement one or more capability traits ([`Guest`],
//! [`SyncedFolder`]) and are handed to the core as [`Component`] values by a
//! component source. The core never inspects concrete plugin types: it asks
//! each candidate to [`Detect`] applicability against a [`TargetDescriptor`]
//! and, when a candidate wins, seeds it through the optional [`Seeder`]
//! interface.
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use berth_plugin::{Detect, Guest, TargetDescriptor};
//!
//! struct Ubuntu;
//!
//! #[async_trait]
//! impl Detect for Ubuntu {
//!     async fn detect(&self, target: &TargetDescriptor) -> anyhow::Result<bool> {
//!         Ok(target.hint("distro") == Some("ubuntu"))
//!     }
//! }
//!
//! impl Guest for Ubuntu {}
//! ```
//!
//! ## Contents
//!
//! - **Capability traits**: [`Detect`], [`Seeder`], [`Guest`], [`SyncedFolder`]
//! - **Typed components**: [`Component`], [`NamedComponent`], [`Capability`]
//! - **Machine data**: [`MachineState`], [`BoxReference`], [`SyncedFolderSpec`]
//! - **Context**: [`TargetDescriptor`], [`ProjectInfo`], [`SeedContext`]

mod boxes;
mod component;
mod error;
mod folder;
mod kind;
mod state;
mod target;

pub use boxes::BoxReference;
pub use component::{Capability, Component, Detect, Guest, NamedComponent, Seeder, SyncedFolder};
pub use error::{PluginError, Result};
pub use folder::SyncedFolderSpec;
pub use kind::CapabilityKind;
pub use state::MachineState;
pub use target::{MachineId, MachineInfo, ProjectInfo, SeedContext, TargetDescriptor};
