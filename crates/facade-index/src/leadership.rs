//! Scheduler election.

/// Decides whether this instance runs the scheduling loops.
///
/// Only scheduling is gated; any instance executes submitted scans.
pub trait Leadership: Send + Sync {
    fn is_scheduler(&self) -> bool;
}

/// Static election: the instance whose hostname equals the configured
/// master hostname is the scheduler. A blank master makes every instance
/// a scheduler.
#[derive(Debug, Clone)]
pub struct HostnameLeadership {
    master: Option<String>,
    local: String,
}

impl HostnameLeadership {
    pub fn new(master: Option<String>, local: impl Into<String>) -> Self {
        Self {
            master: master.filter(|m| !m.trim().is_empty()),
            local: local.into(),
        }
    }
}

impl Leadership for HostnameLeadership {
    fn is_scheduler(&self) -> bool {
        match &self.master {
            None => true,
            Some(master) => master.trim().eq_ignore_ascii_case(self.local.trim()),
        }
    }
}

/// Fixed answer, for tests and single-instance deployments.
#[derive(Debug, Clone, Copy)]
pub struct StaticLeadership(pub bool);

impl Leadership for StaticLeadership {
    fn is_scheduler(&self) -> bool {
        self.0
    }
}
