//! Simulated guest processes

use crate::handle_table::{HandleTable, HandleTableError, MAX_TABLE_SIZE};
use crate::page_table::PageTable;
use core_types::{AddressSpaceType, ProcessId};
use parking_lot::Mutex;
use resources::{ResourceLimit, ResourceLimitConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for creating a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub name: String,
    pub address_space_type: AddressSpaceType,
    pub resource_limits: ResourceLimitConfig,
    /// Handle table size, `0` selects the maximum
    pub handle_table_size: usize,
}

impl ProcessConfig {
    /// Creates a config with default geometry and unlimited quotas
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_address_space_type(mut self, address_space_type: AddressSpaceType) -> Self {
        self.address_space_type = address_space_type;
        self
    }

    pub fn with_resource_limits(mut self, resource_limits: ResourceLimitConfig) -> Self {
        self.resource_limits = resource_limits;
        self
    }

    pub fn with_handle_table_size(mut self, handle_table_size: usize) -> Self {
        self.handle_table_size = handle_table_size;
        self
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            name: "process".to_string(),
            address_space_type: AddressSpaceType::default(),
            resource_limits: ResourceLimitConfig::unlimited(),
            handle_table_size: MAX_TABLE_SIZE,
        }
    }
}

/// A guest process as seen by kernel calls
#[derive(Debug)]
pub struct SimulatedProcess {
    id: ProcessId,
    name: String,
    page_table: PageTable,
    handle_table: Mutex<HandleTable>,
    resource_limit: Arc<ResourceLimit>,
}

impl SimulatedProcess {
    /// Builds a process from its config
    pub fn new(config: ProcessConfig) -> Result<Self, HandleTableError> {
        let handle_table = HandleTable::new(config.handle_table_size)?;

        Ok(Self {
            id: ProcessId::new(),
            name: config.name,
            page_table: PageTable::new(config.address_space_type),
            handle_table: Mutex::new(handle_table),
            resource_limit: Arc::new(ResourceLimit::new(config.resource_limits)),
        })
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    /// Locked access to the handle table
    ///
    /// Kernel objects may be destroyed when a reference taken from the
    /// table is dropped, so drop those after the guard.
    pub fn handle_table(&self) -> &Mutex<HandleTable> {
        &self.handle_table
    }

    pub fn resource_limit(&self) -> &Arc<ResourceLimit> {
        &self.resource_limit
    }
}
