//! Object/Resource registry — §4.3, interface only.
//!
//! The session manager never interprets object/resource data; it only
//! needs somewhere to hand inbound CoAP operations to and a uniform status
//! code to hand back. This module is the hexagonal port boundary — the
//! same role the teacher's `app::ports::{SensorPort, ActuatorPort}` play
//! for hardware — with the registry itself (the porting stubs that return
//! fixed device telemetry) explicitly out of scope per spec.md §1.

use crate::error::Lwm2mStatus;

/// Object id / instance id / resource id addressing a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    pub object_id: u16,
    pub instance_id: u16,
    pub resource_id: u16,
}

/// Read side of a registered resource.
pub trait ReadPort {
    fn read(&self, path: ResourcePath) -> Result<Vec<u8>, Lwm2mStatus>;
}

/// Write side of a registered resource.
pub trait WritePort {
    fn write(&mut self, path: ResourcePath, data: &[u8]) -> Result<(), Lwm2mStatus>;
}

/// Executable side of a registered resource (e.g. `Reboot`, `Update`).
pub trait ExecutePort {
    fn execute(&mut self, path: ResourcePath, args: &[u8]) -> Result<(), Lwm2mStatus>;
}

/// A single registered object/resource entry, composed of whichever of the
/// three operations the object supports.
pub struct RegisteredResource {
    pub path: ResourcePath,
    pub read: Option<Box<dyn ReadPort + Send>>,
    pub write: Option<Box<dyn WritePort + Send>>,
    pub execute: Option<Box<dyn ExecutePort + Send>>,
}

/// In-memory registry of LwM2M objects/resources, exposed to the CoAP
/// layer via [`crate::ports::CoapPort`]. The session manager holds one of
/// these and passes it through untouched.
#[derive(Default)]
pub struct ObjectRegistry {
    resources: Vec<RegisteredResource>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: RegisteredResource) {
        self.resources.push(resource);
    }

    pub fn find(&self, path: ResourcePath) -> Option<&RegisteredResource> {
        self.resources.iter().find(|r| r.path == path)
    }

    pub fn find_mut(&mut self, path: ResourcePath) -> Option<&mut RegisteredResource> {
        self.resources.iter_mut().find(|r| r.path == path)
    }

    /// Dispatch a read; `OpNotSupported` if the resource has no read side.
    pub fn read(&self, path: ResourcePath) -> Result<Vec<u8>, Lwm2mStatus> {
        let entry = self.find(path).ok_or(Lwm2mStatus::InvalidArg)?;
        let read = entry.read.as_ref().ok_or(Lwm2mStatus::OpNotSupported)?;
        read.read(path)
    }

    /// Dispatch a write; `OpNotSupported` if the resource has no write side.
    pub fn write(&mut self, path: ResourcePath, data: &[u8]) -> Result<(), Lwm2mStatus> {
        let entry = self.find_mut(path).ok_or(Lwm2mStatus::InvalidArg)?;
        let write = entry.write.as_mut().ok_or(Lwm2mStatus::OpNotSupported)?;
        write.write(path, data)
    }

    /// Dispatch an execute; `OpNotSupported` if the resource is not
    /// executable.
    pub fn execute(&mut self, path: ResourcePath, args: &[u8]) -> Result<(), Lwm2mStatus> {
        let entry = self.find_mut(path).ok_or(Lwm2mStatus::InvalidArg)?;
        let execute = entry.execute.as_mut().ok_or(Lwm2mStatus::OpNotSupported)?;
        execute.execute(path, args)
    }
}
