//! Applying profile resource limits to a process
//!
//! A `LimitPlan` is built from decoded `ResourceLimits` in the launcher,
//! where allocation and logging are fine, and applied either to the current
//! process (`apply`) or inside a freshly forked child before exec
//! (`apply_in_child`), which only issues syscalls.

use crate::config::types::{LaunchError, Result};
use crate::profile::limits::ResourceLimits;
use nix::sched::{sched_setaffinity, CpuSet};
use nix::sys::resource::{setrlimit, Resource};
use nix::unistd::Pid;

/// Precomputed limit syscalls for one session
#[derive(Debug)]
pub struct LimitPlan {
    rlimits: Vec<(&'static str, Resource, u64)>,
    priority: i32,
    affinity: Option<CpuSet>,
}

impl LimitPlan {
    pub fn from_limits(limits: &ResourceLimits) -> Result<Self> {
        let candidates = [
            ("RLIMIT_AS", Resource::RLIMIT_AS, limits.memory_limit_bytes),
            ("RLIMIT_STACK", Resource::RLIMIT_STACK, limits.stack_limit_bytes),
            ("RLIMIT_NPROC", Resource::RLIMIT_NPROC, limits.user_processes_limit),
            ("RLIMIT_CPU", Resource::RLIMIT_CPU, limits.cpu_limit),
            ("RLIMIT_NICE", Resource::RLIMIT_NICE, limits.nice_limit),
            ("RLIMIT_NOFILE", Resource::RLIMIT_NOFILE, limits.files_limit),
        ];
        // Zero means unset, matching what the receiver decodes.
        let rlimits = candidates
            .into_iter()
            .filter_map(|(name, resource, value)| {
                value.filter(|v| *v != 0).map(|v| (name, resource, v))
            })
            .collect();

        Ok(Self {
            rlimits,
            priority: limits.priority,
            affinity: cpu_set_from_affinity(&limits.cpu_affinity)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rlimits.is_empty() && self.priority == 0 && self.affinity.is_none()
    }

    /// Apply to the current process. In permissive mode failures are
    /// logged and skipped.
    pub fn apply(&self, strict: bool) -> Result<()> {
        for (name, resource, value) in &self.rlimits {
            if let Err(e) = setrlimit(*resource, *value, *value) {
                if strict {
                    return Err(LaunchError::Process(format!(
                        "Failed to apply {}={}: {}",
                        name, value, e
                    )));
                }
                log::warn!("Failed to apply {}={} in permissive mode: {}", name, value, e);
            } else {
                log::debug!("Applied {}={}", name, value);
            }
        }

        if self.priority != 0 {
            if let Err(e) = set_priority(self.priority) {
                if strict {
                    return Err(LaunchError::Process(format!(
                        "Failed to set priority {}: {}",
                        self.priority, e
                    )));
                }
                log::warn!("Failed to set priority {} in permissive mode: {}", self.priority, e);
            }
        }

        if let Some(cpu_set) = &self.affinity {
            if let Err(e) = sched_setaffinity(Pid::from_raw(0), cpu_set) {
                if strict {
                    return Err(LaunchError::Process(format!("Failed to set CPU affinity: {}", e)));
                }
                log::warn!("Failed to set CPU affinity in permissive mode: {}", e);
            }
        }

        Ok(())
    }

    /// Apply between fork and exec. Issues syscalls only: no allocation,
    /// no logging. Permissive mode ignores failures.
    pub fn apply_in_child(&self, strict: bool) -> std::io::Result<()> {
        for (_, resource, value) in &self.rlimits {
            if let Err(e) = setrlimit(*resource, *value, *value) {
                if strict {
                    return Err(e.into());
                }
            }
        }

        if self.priority != 0 {
            if let Err(e) = set_priority(self.priority) {
                if strict {
                    return Err(e);
                }
            }
        }

        if let Some(cpu_set) = &self.affinity {
            if let Err(e) = sched_setaffinity(Pid::from_raw(0), cpu_set) {
                if strict {
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }
}

fn set_priority(priority: i32) -> std::io::Result<()> {
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, priority) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Affinity flags to a kernel CPU set. No included CPU means no explicit
/// affinity. A CPU index beyond what the kernel set can hold is rejected.
fn cpu_set_from_affinity(affinity: &[bool]) -> Result<Option<CpuSet>> {
    if !affinity.iter().any(|included| *included) {
        return Ok(None);
    }

    let mut cpu_set = CpuSet::new();
    for (cpu, _) in affinity.iter().enumerate().filter(|(_, included)| **included) {
        cpu_set.set(cpu).map_err(|e| {
            LaunchError::Config(format!(
                "CPU {} outside supported affinity range ({}): {}",
                cpu,
                CpuSet::count(),
                e
            ))
        })?;
    }
    Ok(Some(cpu_set))
}

/// Apply `limits` to the current process
pub fn apply_resource_limits(limits: &ResourceLimits, strict: bool) -> Result<()> {
    let plan = LimitPlan::from_limits(limits)?;
    if plan.is_empty() {
        return Ok(());
    }
    plan.apply(strict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_skips_unset_limits() {
        let limits = ResourceLimits {
            memory_limit_bytes: Some(1 << 30),
            files_limit: Some(256),
            ..Default::default()
        };
        let plan = LimitPlan::from_limits(&limits).unwrap();
        assert_eq!(plan.rlimits.len(), 2);
        assert!(plan.affinity.is_none());
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_zero_limit_is_not_applied() {
        let limits = ResourceLimits {
            files_limit: Some(0),
            cpu_limit: Some(0),
            ..Default::default()
        };
        let plan = LimitPlan::from_limits(&limits).unwrap();
        assert!(plan.rlimits.is_empty());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_empty_limits_are_noop() {
        let plan = LimitPlan::from_limits(&ResourceLimits::default()).unwrap();
        assert!(plan.is_empty());
        assert!(apply_resource_limits(&ResourceLimits::default(), true).is_ok());
    }

    #[test]
    fn test_affinity_conversion() {
        let cpu_set = cpu_set_from_affinity(&[true, false, true]).unwrap().unwrap();
        assert!(cpu_set.is_set(0).unwrap());
        assert!(!cpu_set.is_set(1).unwrap());
        assert!(cpu_set.is_set(2).unwrap());

        assert!(cpu_set_from_affinity(&[false, false]).unwrap().is_none());
        assert!(cpu_set_from_affinity(&[]).unwrap().is_none());
    }

    #[test]
    fn test_affinity_out_of_range() {
        let mut affinity = vec![false; CpuSet::count() + 1];
        affinity[CpuSet::count()] = true;
        assert!(matches!(
            cpu_set_from_affinity(&affinity),
            Err(LaunchError::Config(_))
        ));
    }
}
