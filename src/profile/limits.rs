//! Resource limits carried by a launch profile and their wire encoding.
//!
//! Limit scalars travel as plain JSON numbers and the receiver reads them as
//! generic numbers, so only integers that survive a round trip through `f64`
//! are representable. Anything larger, including the `RLIM_INFINITY`
//! "unlimited" sentinel, is encoded as `0`, which the receiver reads back as
//! "not set". A single unrepresentable limit never fails the profile encode.

use crate::config::types::{LaunchError, Result};
use crate::profile::reader::ObjectReader;
use serde_json::{Map, Value};

/// Largest limit value that is exactly representable on the wire (2^53 - 1)
pub const MAX_WIRE_LIMIT: u64 = (1 << 53) - 1;

/// Per-CPU inclusion flags; index is the logical CPU number
pub type CpuAffinity = Vec<bool>;

/// Process resource limits applied to a launched session.
///
/// A limit of `Some(0)` means the same as `None`: not set. It is neither
/// transmitted nor applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Scheduling priority (nice value) for the session process
    pub priority: i32,
    pub memory_limit_bytes: Option<u64>,
    pub stack_limit_bytes: Option<u64>,
    pub user_processes_limit: Option<u64>,
    /// CPU time in seconds
    pub cpu_limit: Option<u64>,
    pub nice_limit: Option<u64>,
    /// Maximum open file descriptors
    pub files_limit: Option<u64>,
    /// Empty means no explicit affinity
    pub cpu_affinity: CpuAffinity,
}

/// Wire form of one limit scalar. Unset and unrepresentable values become `0`.
pub fn limit_to_json(limit: Option<u64>) -> Value {
    match limit {
        Some(value) if value <= MAX_WIRE_LIMIT => Value::from(value),
        Some(value) => {
            log::debug!("Limit {} not representable on the wire, encoding as 0", value);
            Value::from(0u64)
        }
        None => Value::from(0u64),
    }
}

fn limit_from_wire(value: u64) -> Option<u64> {
    (value != 0).then_some(value)
}

/// A limit as the receiving side sees it: zero and unrepresentable values
/// are unset.
pub fn wire_limit(limit: Option<u64>) -> Option<u64> {
    limit.filter(|value| (1..=MAX_WIRE_LIMIT).contains(value))
}

/// Wire form of an affinity mask
pub fn cpu_affinity_to_json(affinity: &[bool]) -> Value {
    Value::Array(affinity.iter().copied().map(Value::Bool).collect())
}

/// Strict affinity decode: every element must be a boolean.
///
/// On error the caller is expected to fall back to an empty affinity.
pub fn cpu_affinity_from_json(items: &[Value]) -> Result<CpuAffinity> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_bool().ok_or(LaunchError::ParamTypeMismatch {
                field: "cpuAffinity",
                index,
            })
        })
        .collect()
}

impl ResourceLimits {
    /// Flatten the limit fields into an existing config object
    pub(crate) fn write_json(&self, config: &mut Map<String, Value>) {
        config.insert("priority".into(), Value::from(self.priority));
        config.insert("memoryLimitBytes".into(), limit_to_json(self.memory_limit_bytes));
        config.insert("stackLimitBytes".into(), limit_to_json(self.stack_limit_bytes));
        config.insert("userProcessesLimit".into(), limit_to_json(self.user_processes_limit));
        config.insert("cpuLimit".into(), limit_to_json(self.cpu_limit));
        config.insert("niceLimit".into(), limit_to_json(self.nice_limit));
        config.insert("filesLimit".into(), limit_to_json(self.files_limit));
        config.insert("cpuAffinity".into(), cpu_affinity_to_json(&self.cpu_affinity));
    }

    /// Read the flattened limit fields from a config object.
    ///
    /// An affinity array with a non-boolean element is recorded as an error
    /// and leaves the affinity empty; the other limits are still read.
    pub(crate) fn read_json(reader: &mut ObjectReader<'_>) -> Self {
        let priority = reader.int("priority");
        let priority = i32::try_from(priority).unwrap_or_else(|_| {
            reader.fail(
                "priority",
                crate::config::types::FieldProblem::OutOfRange { value: priority },
            );
            0
        });

        let mut limits = ResourceLimits {
            priority,
            memory_limit_bytes: limit_from_wire(reader.uint("memoryLimitBytes")),
            stack_limit_bytes: limit_from_wire(reader.uint("stackLimitBytes")),
            user_processes_limit: limit_from_wire(reader.uint("userProcessesLimit")),
            cpu_limit: limit_from_wire(reader.uint("cpuLimit")),
            nice_limit: limit_from_wire(reader.uint("niceLimit")),
            files_limit: limit_from_wire(reader.uint("filesLimit")),
            cpu_affinity: Vec::new(),
        };

        let affinity = reader.array("cpuAffinity");
        match cpu_affinity_from_json(affinity) {
            Ok(affinity) => limits.cpu_affinity = affinity,
            Err(err) => reader.push(err),
        }

        limits
    }

    /// These limits as they decode on the receiving side
    pub fn wire_normalized(&self) -> ResourceLimits {
        ResourceLimits {
            priority: self.priority,
            memory_limit_bytes: wire_limit(self.memory_limit_bytes),
            stack_limit_bytes: wire_limit(self.stack_limit_bytes),
            user_processes_limit: wire_limit(self.user_processes_limit),
            cpu_limit: wire_limit(self.cpu_limit),
            nice_limit: wire_limit(self.nice_limit),
            files_limit: wire_limit(self.files_limit),
            cpu_affinity: self.cpu_affinity.clone(),
        }
    }

    /// Number of CPUs included in the affinity mask
    pub fn affinity_cpu_count(&self) -> usize {
        self.cpu_affinity.iter().filter(|included| **included).count()
    }
}
