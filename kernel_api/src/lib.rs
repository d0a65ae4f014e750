//! # Kernel API
//!
//! This crate defines the interface between guest-facing syscall handlers and
//! the kernel that services them.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**, not policies:
//! - Kernel objects are named by opaque handles, never by references
//! - Every operation either completes or leaves no trace
//! - Failures are values ([`KernelError`]), never panics
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - An ABI layer (argument marshalling and register decoding live elsewhere)
//! - A memory mapper (creating a transfer memory does not map it anywhere)

pub mod error;
pub mod kernel;

pub use error::{KernelError, ResultCode, KERNEL_MODULE, RESULT_SUCCESS};
pub use kernel::KernelApi;
