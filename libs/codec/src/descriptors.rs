//! Descriptor pool loading and type-path helpers

use crate::error::{TraceError, TraceResult};
use prost_reflect::{DescriptorPool, MessageDescriptor};
use std::path::Path;
use types::TopLevelType;

/// Load a serialized `FileDescriptorSet` (`protoc --include_imports --descriptor_set_out`).
pub fn load_descriptor_pool(path: impl AsRef<Path>) -> TraceResult<DescriptorPool> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| TraceError::io(path, e))?;
    DescriptorPool::decode(bytes.as_slice()).map_err(|e| TraceError::Descriptor {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Look up the descriptor of a top-level message kind inside `package`.
pub fn message_descriptor(
    pool: &DescriptorPool,
    package: &str,
    kind: TopLevelType,
) -> TraceResult<MessageDescriptor> {
    let full_name = kind.full_name(package);
    pool.get_message_by_name(&full_name).ok_or_else(|| {
        let known = TopLevelType::ALL
            .iter()
            .map(|k| k.full_name(package))
            .filter(|name| pool.get_message_by_name(name).is_some())
            .collect::<Vec<_>>()
            .join(", ");
        TraceError::UnknownMessageType {
            name: full_name,
            known: if known.is_empty() { "none".to_string() } else { known },
        }
    })
}

/// Rule-lookup path of a message type: full name minus package, split on `.`.
///
/// `osi3.MovingObject.VehicleAttributes` → `["MovingObject", "VehicleAttributes"]`
pub fn type_path(descriptor: &MessageDescriptor) -> Vec<String> {
    let full_name = descriptor.full_name();
    let package = descriptor.package_name();
    let local = if package.is_empty() {
        full_name
    } else {
        full_name
            .strip_prefix(package)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(full_name)
    };
    local.split('.').map(str::to_string).collect()
}
