use super::AgentStatus;

/// Rendering-facing state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualStatus {
    /// Running and holding the cursor: the agent actually doing work.
    Active,
    /// Running but blocked on a descendant.
    Waiting,
    Completed,
    Error,
}

impl VisualStatus {
    pub fn project(status: AgentStatus, is_current: bool) -> Self {
        match (status, is_current) {
            (AgentStatus::Completed, _) => VisualStatus::Completed,
            (AgentStatus::Error, _) => VisualStatus::Error,
            (AgentStatus::Running, true) => VisualStatus::Active,
            (AgentStatus::Running, false) => VisualStatus::Waiting,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            VisualStatus::Active => "●",
            VisualStatus::Waiting => "◌",
            VisualStatus::Completed => "✓",
            VisualStatus::Error => "✗",
        }
    }
}

impl std::fmt::Display for VisualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisualStatus::Active => write!(f, "active"),
            VisualStatus::Waiting => write!(f, "waiting"),
            VisualStatus::Completed => write!(f, "completed"),
            VisualStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_is_total() {
        let cases = [
            (AgentStatus::Running, true, VisualStatus::Active),
            (AgentStatus::Running, false, VisualStatus::Waiting),
            (AgentStatus::Completed, true, VisualStatus::Completed),
            (AgentStatus::Completed, false, VisualStatus::Completed),
            (AgentStatus::Error, true, VisualStatus::Error),
            (AgentStatus::Error, false, VisualStatus::Error),
        ];
        for (status, current, expected) in cases {
            assert_eq!(VisualStatus::project(status, current), expected, "{status} current={current}");
        }
    }
}
