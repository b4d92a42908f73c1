use std::fmt::Write as _;

/// A named ACL policy: an ordered list of path-pattern rules. Writing a
/// policy replaces any prior rule set under the same name wholesale.
#[derive(Debug, Clone)]
pub struct Policy {
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub path: String,
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    List,
    Create,
    Update,
    Delete,
}

impl Capability {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl PolicyRule {
    #[must_use]
    pub fn new(path: &str, capabilities: &[Capability]) -> Self {
        Self {
            path: path.to_string(),
            capabilities: capabilities.to_vec(),
        }
    }
}

impl Policy {
    /// Renders the rule list as an HCL policy document.
    #[must_use]
    pub fn render_hcl(&self) -> String {
        let mut out = String::new();
        for rule in &self.rules {
            let caps = rule
                .capabilities
                .iter()
                .map(|cap| format!("\"{}\"", cap.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "path \"{}\" {{\n  capabilities = [{caps}]\n}}", rule.path);
        }
        out
    }
}

/// The fixed read-only policy applied during provisioning. One static
/// template for every area/service; no per-service naming scheme exists.
#[must_use]
pub fn read_only_policy() -> Policy {
    use Capability::{List, Read};
    Policy {
        name: "dev_postgres".to_string(),
        rules: vec![
            PolicyRule::new("dev/*", &[Read, List]),
            PolicyRule::new("dev/postgres/*", &[Read, List]),
            PolicyRule::new("sys/mounts/", &[Read, List]),
        ],
    }
}
