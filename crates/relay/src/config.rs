//! Relay configuration loaded from the environment.

use std::env;

use notify::render::DEFAULT_GIT_WEB_URL;
use notify::NotifyConfig;
use scm::GITHUB_API_URL;

/// Placeholder replaced by the environment name in the workflow template.
pub const ENVIRONMENT_PLACEHOLDER: &str = "{environment}";

/// Default naming convention of the preview deployment workflow file.
pub const DEFAULT_WORKFLOW_TEMPLATE: &str = "preview_{environment}_env.yml";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub notify: NotifyConfig,
    /// Token used for GitHub API calls.
    pub github_token: Option<String>,
    pub github_api_url: String,
    /// Web host used for commit links in comments.
    pub git_web_url: String,
    /// Workflow file name template, see [`workflow_file_name`].
    pub workflow_template: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            notify: NotifyConfig::default(),
            github_token: None,
            github_api_url: GITHUB_API_URL.to_string(),
            git_web_url: DEFAULT_GIT_WEB_URL.to_string(),
            workflow_template: DEFAULT_WORKFLOW_TEMPLATE.to_string(),
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            notify: NotifyConfig::from_env(),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty()),
            github_api_url: env::var("GITHUB_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.github_api_url),
            git_web_url: env::var("GIT_WEB_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .map_or(defaults.git_web_url, |s| s.trim_end_matches('/').to_string()),
            workflow_template: env::var("PREVIEW_WORKFLOW_TEMPLATE")
                .ok()
                .filter(|s| s.contains(ENVIRONMENT_PLACEHOLDER))
                .unwrap_or(defaults.workflow_template),
        }
    }
}

/// Workflow file that deploys `environment_name`.
#[must_use]
pub fn workflow_file_name(template: &str, environment_name: &str) -> String {
    template.replace(ENVIRONMENT_PLACEHOLDER, environment_name)
}
