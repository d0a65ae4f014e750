//! # Core Types
//!
//! This crate defines the fundamental types shared by the simulated kernel
//! and its callers.
//!
//! ## Philosophy
//!
//! Core types are designed with these principles:
//! - **Opaque handles**: Guest code never sees object references, only handles.
//! - **Type safety first**: Raw syscall arguments are narrowed into typed values
//!   before any kernel state is touched.
//! - **No ambient authority**: Every operation names the process it acts for.
//!
//! ## Key Types
//!
//! - [`ProcessId`]: Unique identifier for a guest process
//! - [`ObjectId`]: Unique identifier for a kernel object
//! - [`Handle`]: Process-scoped opaque token naming a kernel object
//! - [`MemoryPermission`]: Raw permission bits as passed by the guest
//! - [`TransferMemoryPermission`]: The permissions a transfer memory may grant

pub mod handle;
pub mod ids;
pub mod memory;

pub use handle::Handle;
pub use ids::{ObjectId, ProcessId};
pub use memory::{
    is_page_aligned, AddressSpaceType, InvalidPermission, MemoryPermission,
    TransferMemoryPermission, VAddr, PAGE_BITS, PAGE_SIZE,
};
