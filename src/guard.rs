//! Route guard: decides whether a console view renders or redirects.

use chrono::Utc;
use url::form_urlencoded;

use crate::{config::RoutesConfig, models::role::Role, session::AuthState};

/// Paths under `prefix` are limited to `roles`
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub prefix: String,
    pub roles: Vec<Role>,
}

impl RouteRule {
    fn matches(&self, path: &str) -> bool {
        path == self.prefix
            || path
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Authentication still loading, nothing conclusive yet
    Pending,
    Render,
    /// Not signed in; `return_to` is the originally requested path
    RedirectToSignIn { return_to: String },
    /// Signed in but the role does not satisfy the path's restriction
    RedirectToLanding,
}

impl GuardDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardDecision::Pending => "pending",
            GuardDecision::Render => "render",
            GuardDecision::RedirectToSignIn { .. } => "redirect_sign_in",
            GuardDecision::RedirectToLanding => "redirect_landing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    rules: Vec<RouteRule>,
    sign_in_path: String,
    landing_path: String,
}

impl RouteGuard {
    pub fn new(sign_in_path: impl Into<String>, landing_path: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            sign_in_path: sign_in_path.into(),
            landing_path: landing_path.into(),
        }
    }

    /// Console sections and the roles allowed to open them
    pub fn console_defaults(sign_in_path: impl Into<String>, landing_path: impl Into<String>) -> Self {
        use Role::*;

        Self::new(sign_in_path, landing_path)
            .with_rule("/console/users", &[Admin])
            .with_rule("/console/api-users", &[Admin])
            .with_rule("/console/invoices", &[Admin, Dispatcher])
            .with_rule("/console/airports", &[Admin, Dispatcher])
            .with_rule("/console/complaints", &[Admin, Dispatcher])
            .with_rule("/console/quality-reviews", &[Admin, Dispatcher])
            .with_rule("/console/vehicles", &[Admin, Dispatcher, Fleet])
            .with_rule("/console/drivers", &[Admin, Dispatcher, Fleet])
    }

    pub fn from_config(config: &RoutesConfig) -> Self {
        Self::console_defaults(&config.sign_in_path, &config.landing_path)
    }

    /// Add a restriction. Rules covering the landing page are ignored, since
    /// denied users are sent there.
    pub fn with_rule(mut self, prefix: impl Into<String>, roles: &[Role]) -> Self {
        let rule = RouteRule {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            roles: roles.to_vec(),
        };
        if rule.matches(&self.landing_path) {
            tracing::warn!(prefix = %rule.prefix, "Ignoring route rule that covers the landing page");
            return self;
        }
        self.rules.push(rule);
        self
    }

    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    /// Most specific rule covering `path`
    pub fn rule_for(&self, path: &str) -> Option<&RouteRule> {
        let route = route_of(path);
        self.rules
            .iter()
            .filter(|rule| rule.matches(route))
            .max_by_key(|rule| rule.prefix.len())
    }

    pub fn decide(&self, state: &AuthState, requested_path: &str) -> GuardDecision {
        if state.loading {
            return GuardDecision::Pending;
        }

        let user = match &state.user {
            Some(user) if state.is_authenticated_at(Utc::now()) => user,
            _ => {
                return GuardDecision::RedirectToSignIn {
                    return_to: requested_path.to_string(),
                }
            }
        };

        // Rules match literal segments; an encoded route could slip past them
        if route_of(requested_path).contains(['%', '\\']) {
            tracing::info!(
                user_id = %user.id,
                path = %requested_path,
                "Encoded route path rejected"
            );
            return GuardDecision::RedirectToLanding;
        }

        match self.rule_for(requested_path) {
            Some(rule) if !rule.roles.contains(&user.role) => {
                tracing::info!(
                    user_id = %user.id,
                    role = %user.role,
                    path = %requested_path,
                    "Role not allowed on path"
                );
                GuardDecision::RedirectToLanding
            }
            _ => GuardDecision::Render,
        }
    }

    /// `<sign_in_path>?redirect=<return_to>`
    pub fn sign_in_location(&self, return_to: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect", return_to)
            .finish();
        format!("{}?{}", self.sign_in_path, query)
    }
}

/// Path without query or fragment
fn route_of(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}
