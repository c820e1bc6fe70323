use mess_protocol::Role;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;

/// Resolves the acting role at the moment of a mutation attempt. Role
/// assignment itself belongs to the identity provider; this seam only
/// reports what was resolved.
pub trait AccessContext: Send + Sync {
    fn current_role(&self) -> Role;
}

/// Fixed-role context, used per request once the edge has resolved the
/// actor, and by tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticAccess(pub Role);

impl AccessContext for StaticAccess {
    fn current_role(&self) -> Role {
        self.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnerRule {
    pub kind_prefix: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub allow_all: bool,
    #[serde(default)]
    pub owner_rules: Vec<OwnerRule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        posture_to_config("standard")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    #[serde(default)]
    pub explain: Value,
}

#[derive(Clone, Debug)]
pub struct PolicyEngine {
    cfg: PolicyConfig,
}

impl PolicyEngine {
    pub fn load_from_env() -> Self {
        // Highest precedence: explicit JSON file
        if let Ok(path) = std::env::var("MESS_POLICY_FILE") {
            if let Ok(bytes) = fs::read(path) {
                if let Ok(cfg) = serde_json::from_slice::<PolicyConfig>(&bytes) {
                    return Self::with_config(cfg);
                }
            }
        }
        // Next: security posture presets
        if let Ok(posture) = std::env::var("MESS_SECURITY_POSTURE") {
            return Self::with_config(posture_to_config(&posture));
        }
        // Default posture when nothing set
        Self::with_config(posture_to_config("standard"))
    }

    pub fn with_config(cfg: PolicyConfig) -> Self {
        Self { cfg }
    }

    /// Evaluate one action kind for the given role. Owner-gated prefixes
    /// deny everything below `owner`; all other kinds pass.
    pub fn evaluate_action(&self, role: Role, kind: &str) -> Decision {
        if self.cfg.allow_all {
            return Decision {
                allow: true,
                explain: base_explain(kind, role, "allow_all"),
            };
        }
        let gated = self
            .cfg
            .owner_rules
            .iter()
            .any(|r| kind.starts_with(&r.kind_prefix));
        if !gated {
            return Decision {
                allow: true,
                explain: base_explain(kind, role, "ungated"),
            };
        }
        if role == Role::Owner {
            Decision {
                allow: true,
                explain: base_explain(kind, role, "owner_satisfied"),
            }
        } else {
            let mut explain = base_explain(kind, role, "owner_required");
            explain["message"] = json!(format!(
                "Action {} requires the owner role; acting role is {}.",
                kind,
                role.as_str()
            ));
            Decision {
                allow: false,
                explain,
            }
        }
    }

    pub fn snapshot(&self) -> Value {
        serde_json::to_value(&self.cfg).unwrap_or(json!({}))
    }
}

fn base_explain(kind: &str, role: Role, reason: &str) -> Value {
    json!({
        "action": kind,
        "role": role.as_str(),
        "reason": reason,
    })
}

fn posture_to_config(posture: &str) -> PolicyConfig {
    let p = posture.trim().to_ascii_lowercase();
    match p.as_str() {
        // Dev-friendly: wide open
        "relaxed" => PolicyConfig {
            allow_all: true,
            owner_rules: vec![],
        },
        // Default: gate status mutation behind the owner role
        "standard" => PolicyConfig {
            allow_all: false,
            owner_rules: vec![OwnerRule {
                kind_prefix: "feedback.status.".into(),
            }],
        },
        _ => posture_to_config("standard"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    // Env-var tests share process state; serialize them.
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock")
    }

    #[test]
    fn allow_all_short_circuits() {
        let engine = PolicyEngine::with_config(PolicyConfig {
            allow_all: true,
            owner_rules: vec![OwnerRule {
                kind_prefix: "feedback.status.".into(),
            }],
        });
        let decision = engine.evaluate_action(Role::Viewer, "feedback.status.toggle");
        assert!(decision.allow);
        assert_eq!(decision.explain["reason"], "allow_all");
    }

    #[test]
    fn owner_rules_gate_viewer_mutations() {
        let engine = PolicyEngine::with_config(PolicyConfig::default());
        let denied = engine.evaluate_action(Role::Viewer, "feedback.status.toggle");
        assert!(!denied.allow);
        assert_eq!(denied.explain["reason"], "owner_required");
        assert!(denied.explain["message"]
            .as_str()
            .unwrap_or_default()
            .contains("requires the owner role"));

        let allowed = engine.evaluate_action(Role::Owner, "feedback.status.toggle");
        assert!(allowed.allow);
        assert_eq!(allowed.explain["reason"], "owner_satisfied");
    }

    #[test]
    fn ungated_kinds_pass_for_any_role() {
        let engine = PolicyEngine::with_config(PolicyConfig::default());
        let decision = engine.evaluate_action(Role::Viewer, "feedback.read");
        assert!(decision.allow);
        assert_eq!(decision.explain["reason"], "ungated");
    }

    #[test]
    fn posture_env_selects_config() {
        let _guard = env_lock();
        std::env::set_var("MESS_SECURITY_POSTURE", "relaxed");
        let relaxed = PolicyEngine::load_from_env();
        assert!(relaxed
            .evaluate_action(Role::Viewer, "feedback.status.toggle")
            .allow);

        std::env::set_var("MESS_SECURITY_POSTURE", "nonsense");
        let fallback = PolicyEngine::load_from_env();
        assert!(!fallback
            .evaluate_action(Role::Viewer, "feedback.status.toggle")
            .allow);
        std::env::remove_var("MESS_SECURITY_POSTURE");
    }

    #[test]
    fn static_access_reports_its_role() {
        let ctx = StaticAccess(Role::Owner);
        assert_eq!(ctx.current_role(), Role::Owner);
    }
}
