//! Rights policies backing `Authenticator::test_rights`.
//!
//! A policy is a list of CEL rules compiled when the configuration is loaded. With
//! `default_allow = true` (the default) rules are deny rules: the first one evaluating
//! to `true` denies. With `default_allow = false` rules are allow rules: the first one
//! evaluating to `true` allows.
//!
//! # Available Variables
//!
//! - `identifier`: the identifier established by the authenticator
//! - `authenticator`: the authentication method name (`basic`, `session`, ...)
//! - `model`: the model being acted upon
//! - `method`: `read`, `create`, `update` or `delete`

use cel_interpreter::{Context, Program, Value};
use serde::Deserialize;
use tracing::{debug, warn};

use super::AccessMethod;
use crate::configuration::Error as ConfigError;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_allow")]
    pub default_allow: bool,
    #[serde(default)]
    pub rules: Vec<String>,
}

impl Config {
    fn default_allow() -> bool {
        true
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_allow: Config::default_allow(),
            rules: Vec::new(),
        }
    }
}

/// The subject of a rights decision.
pub struct RightsRequest<'a> {
    pub identifier: &'a str,
    pub authenticator: &'a str,
    pub model: &'a str,
    pub method: AccessMethod,
}

pub struct RightsPolicy {
    default_allow: bool,
    rules: Vec<Program>,
}

impl RightsPolicy {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();

        for (index, rule) in config.rules.iter().enumerate() {
            match Program::compile(rule) {
                Ok(program) => rules.push(program),
                Err(e) => {
                    return Err(ConfigError::PolicyCompilation(format!(
                        "Failed to compile rights rule #{} '{rule}': {e}",
                        index + 1
                    )));
                }
            }
        }

        Ok(Self {
            default_allow: config.default_allow,
            rules,
        })
    }

    pub fn permits(&self, request: &RightsRequest) -> bool {
        if self.rules.is_empty() {
            return self.default_allow;
        }

        let context = Self::build_context(request);

        for (index, rule) in self.rules.iter().enumerate() {
            let rule_index = index + 1;
            match (self.default_allow, rule.execute(&context)) {
                (true, Ok(Value::Bool(true))) => {
                    debug!("Deny rule #{rule_index} matched");
                    return false;
                }
                (false, Ok(Value::Bool(true))) => {
                    debug!("Allow rule #{rule_index} matched");
                    return true;
                }
                (_, Ok(Value::Bool(false))) => {}
                (true, Ok(value)) => {
                    warn!("Deny rule #{rule_index} returned non-boolean value: {value:?}, treating as deny");
                    return false;
                }
                (false, Ok(value)) => {
                    warn!("Allow rule #{rule_index} returned non-boolean value: {value:?}, skipping rule");
                }
                (_, Err(e)) => {
                    warn!("Rights rule #{rule_index} evaluation failed: {e}, skipping rule");
                }
            }
        }

        self.default_allow
    }

    fn build_context(request: &RightsRequest) -> Context<'static> {
        let mut context = Context::default();
        context.add_variable_from_value("identifier", request.identifier.to_string());
        context.add_variable_from_value("authenticator", request.authenticator.to_string());
        context.add_variable_from_value("model", request.model.to_string());
        context.add_variable_from_value("method", request.method.as_str().to_string());
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(default_allow: bool, rules: &[&str]) -> RightsPolicy {
        let config = Config {
            default_allow,
            rules: rules.iter().map(ToString::to_string).collect(),
        };
        RightsPolicy::new(&config).unwrap()
    }

    fn request<'a>(identifier: &'a str, model: &'a str, method: AccessMethod) -> RightsRequest<'a> {
        RightsRequest {
            identifier,
            authenticator: "basic",
            model,
            method,
        }
    }

    #[test]
    fn test_default_config_allows_everything() {
        let policy = RightsPolicy::new(&Config::default()).unwrap();
        assert!(policy.permits(&request("alice", "invoice", AccessMethod::Delete)));
    }

    #[test]
    fn test_default_deny_without_rules() {
        let policy = policy(false, &[]);
        assert!(!policy.permits(&request("alice", "invoice", AccessMethod::Read)));
    }

    #[test]
    fn test_deny_rules() {
        let policy = policy(true, &["model == 'invoice' && method == 'delete'"]);

        assert!(!policy.permits(&request("alice", "invoice", AccessMethod::Delete)));
        assert!(policy.permits(&request("alice", "invoice", AccessMethod::Read)));
        assert!(policy.permits(&request("alice", "customer", AccessMethod::Delete)));
    }

    #[test]
    fn test_allow_rules() {
        let policy = policy(
            false,
            &["method == 'read'", "identifier == 'admin' && authenticator == 'basic'"],
        );

        assert!(policy.permits(&request("guest", "invoice", AccessMethod::Read)));
        assert!(!policy.permits(&request("guest", "invoice", AccessMethod::Update)));
        assert!(policy.permits(&request("admin", "invoice", AccessMethod::Update)));
    }

    #[test]
    fn test_non_boolean_results() {
        let deny = policy(true, &["model"]);
        assert!(!deny.permits(&request("alice", "invoice", AccessMethod::Read)));

        let allow = policy(false, &["model", "method == 'read'"]);
        assert!(allow.permits(&request("alice", "invoice", AccessMethod::Read)));
        assert!(!allow.permits(&request("alice", "invoice", AccessMethod::Create)));
    }

    #[test]
    fn test_failing_rules_are_skipped() {
        let deny = policy(true, &["unknown_variable == 'x'"]);
        assert!(deny.permits(&request("alice", "invoice", AccessMethod::Read)));

        let allow = policy(false, &["unknown_variable == 'x'"]);
        assert!(!allow.permits(&request("alice", "invoice", AccessMethod::Read)));
    }

    #[test]
    fn test_invalid_rule_is_rejected() {
        let config = Config {
            default_allow: true,
            rules: vec!["method ==".to_string()],
        };

        match RightsPolicy::new(&config) {
            Err(ConfigError::PolicyCompilation(msg)) => {
                assert!(msg.contains("rule #1 'method =='"));
            }
            _ => panic!("Expected a policy compilation error"),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.default_allow);
        assert!(config.rules.is_empty());

        let config: Config = toml::from_str(
            r#"
            default_allow = false
            rules = ["method == 'read'"]
            "#,
        )
        .unwrap();
        assert!(!config.default_allow);
        assert_eq!(config.rules, vec!["method == 'read'".to_string()]);
    }
}
