//! # berth-core
//!
//! Capability resolution and machine lifecycle for Berth environments.
//!
//! A [`Machine`] is driven by plugin-supplied implementations whose
//! applicability is only known at runtime. This crate decides which
//! implementation drives which machine, and keeps the machine's durable record
//! consistent while doing so.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      berth-core                           │
//! ├───────────────────────────────────────────────────────────┤
//! │                                                           │
//! │  ┌─────────────────┐      ┌────────────────────────────┐  │
//! │  │    Machine      │─────▶│  DurableStore              │  │
//! │  │  - guest()      │ save │  (opaque record bytes)     │  │
//! │  │  - box_ref()    │      └────────────────────────────┘  │
//! │  │  - set_state()  │                                      │
//! │  └─────────────────┘                                      │
//! │       │        │                                          │
//! │       ▼        ▼                                          │
//! │  ┌──────────┐ ┌──────────────────┐  ┌──────────────────┐  │
//! │  │ Registry │ │ ResourceResolver │─▶│ BoxCatalog /     │  │
//! │  │ detect   │ │ box, folders     │  │ BoxAcquisition   │  │
//! │  │ rank     │ └──────────────────┘  └──────────────────┘  │
//! │  │ seed     │          │                                  │
//! │  └──────────┘          │                                  │
//! │       │                │                                  │
//! │       ▼                ▼                                  │
//! │  ┌────────────────────────────┐                           │
//! │  │ ComponentSource            │                           │
//! │  │ (loaded plugins by kind)   │                           │
//! │  └────────────────────────────┘                           │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use berth_core::{CoreConfig, MachineConfig, Project, ProjectServices};
//!
//! # async fn example(services: ProjectServices) -> berth_core::Result<()> {
//! let project = Project::new(
//!     berth_plugin::ProjectInfo::new("demo", "/srv/demo"),
//!     CoreConfig::from_env(),
//!     services,
//! )?;
//!
//! let machine = project.machine(
//!     MachineConfig::new("default")
//!         .with_box("hashicorp/bionic64")
//!         .with_hint("os", "linux"),
//! )?;
//!
//! // Resolves (and persists) the box on first access
//! let box_ref = machine.box_ref().await?;
//!
//! // Detects, ranks and seeds the guest adapter on first access
//! let guest = machine.guest().await?;
//! println!("{} on {}", guest.name, box_ref);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Detection**: concurrent, timeout-bounded probes; a broken plugin never
//!   blocks resolution
//! - **Specificity ranking**: the most specific applicable plugin wins, ties
//!   follow a configurable order
//! - **Seeding**: winners are initialized with machine and project context
//!   before use
//! - **Durable lifecycle**: every mutation is saved before it becomes visible
//! - **Explicit caches**: resolved box, guest and folders can be invalidated

mod boxes;
mod config;
mod error;
mod machine;
mod machine_config;
mod project;
mod rank;
mod record;
mod registry;
mod resolver;
mod source;
mod store;

pub use boxes::{BoxAcquisition, BoxCatalog, MemoryBoxCatalog};
pub use config::{CoreConfig, CoreConfigBuilder, TieBreak};
pub use error::{CoreError, Result};
pub use machine::Machine;
pub use machine_config::MachineConfig;
pub use project::{Project, ProjectServices};
pub use rank::{ParentChainRanker, Specificity, SpecificityRanker};
pub use record::MachineRecord;
pub use registry::{CapabilityRegistry, Resolved};
pub use resolver::{ResourceResolver, TransportHandle};
pub use source::{ComponentSource, MemoryComponentSource};
pub use store::{DurableStore, FileStore, MemoryStore, StoreError};

pub use tokio_util::sync::CancellationToken;
