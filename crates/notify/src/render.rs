//! Routing URLs and comment bodies built from event data.
//!
//! Everything here is a pure function. The URL shapes are consumed by the
//! dashboard router, so they must not drift.

use std::fmt::Write as _;

use crate::events::{is_job_kind, SuccessfulResource};

/// Shown in the live URL row when the deployment has no ingress.
pub const INGRESS_DISABLED_PLACEHOLDER: &str = "*Ingress is disabled for this deployment*";

/// Default web host used for commit links.
pub const DEFAULT_GIT_WEB_URL: &str = "https://github.com";

/// Build the dashboard URL an incident notification links to.
///
/// Points at the application view unless `object_kind` is `job` (any case), in
/// which case the job view is used and the involved object is passed as the
/// `job` query parameter.
#[must_use]
pub fn build_routing_url(
    server_url: &str,
    cluster_name: &str,
    namespace: &str,
    release_name: &str,
    project_id: u64,
    object_kind: &str,
    object_name: &str,
) -> String {
    if is_job_kind(object_kind) {
        format!(
            "{server_url}/jobs/{cluster_name}/{namespace}/{release_name}?project_id={project_id}&job={object_name}"
        )
    } else {
        format!(
            "{server_url}/applications/{cluster_name}/{namespace}/{release_name}?project_id={project_id}"
        )
    }
}

/// Dashboard link for one deployed release.
#[must_use]
pub fn resource_url(
    server_url: &str,
    cluster_name: &str,
    namespace: &str,
    project_id: u64,
    resource: &SuccessfulResource,
) -> String {
    let section = if resource.is_job() { "jobs" } else { "applications" };
    format!(
        "{server_url}/{section}/{cluster_name}/{namespace}/{}?project_id={project_id}",
        resource.name
    )
}

#[must_use]
pub fn commit_url(git_web_url: &str, owner: &str, repo: &str, sha: &str) -> String {
    format!("{git_web_url}/{owner}/{repo}/commit/{sha}")
}

#[must_use]
pub fn deployment_details_url(server_url: &str, namespace: &str, environment_id: u64) -> String {
    format!("{server_url}/preview-environments/details/{namespace}?environment_id={environment_id}")
}

/// Everything the pull request comment shows.
#[derive(Debug, Clone)]
pub struct CommentContext {
    pub server_url: String,
    pub git_web_url: String,
    pub cluster_name: String,
    pub project_id: u64,
    pub namespace: String,
    pub environment_id: u64,
    pub commit_sha: String,
    pub repo_owner: String,
    pub repo_name: String,
    /// Empty when ingress is disabled.
    pub live_url: String,
    pub build_logs_url: String,
    pub resources: Vec<SuccessfulResource>,
}

/// Render the markdown body of the deployment comment.
#[must_use]
pub fn render_deployment_comment(ctx: &CommentContext) -> String {
    let live_url = if ctx.live_url.is_empty() {
        INGRESS_DISABLED_PLACEHOLDER
    } else {
        ctx.live_url.as_str()
    };

    let mut body = String::from("## Preview Environments\n");
    body.push_str("✅ All changes deployed successfully\n");
    body.push_str("||Deployment Information|\n");
    body.push_str("|-|-|\n");
    let _ = writeln!(
        body,
        "| Latest SHA | [`{}`]({}) |",
        ctx.commit_sha,
        commit_url(&ctx.git_web_url, &ctx.repo_owner, &ctx.repo_name, &ctx.commit_sha)
    );
    let _ = writeln!(body, "| Live URL | {live_url} |");
    let _ = writeln!(body, "| Build Logs | {} |", ctx.build_logs_url);
    let _ = write!(
        body,
        "| Deployment Details | {} |",
        deployment_details_url(&ctx.server_url, &ctx.namespace, ctx.environment_id)
    );

    if !ctx.resources.is_empty() {
        body.push_str("\n#### Successfully deployed resources\n");
        for resource in &ctx.resources {
            let _ = writeln!(
                body,
                "- [`{}`]({})",
                resource.name,
                resource_url(
                    &ctx.server_url,
                    &ctx.cluster_name,
                    &ctx.namespace,
                    ctx.project_id,
                    resource
                )
            );
        }
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = "https://dash.example.com";

    fn context(live_url: &str, resources: Vec<SuccessfulResource>) -> CommentContext {
        CommentContext {
            server_url: SERVER.to_string(),
            git_web_url: DEFAULT_GIT_WEB_URL.to_string(),
            cluster_name: "prod".to_string(),
            project_id: 12,
            namespace: "pr-7-widgets".to_string(),
            environment_id: 3,
            commit_sha: "abcd123".to_string(),
            repo_owner: "acme".to_string(),
            repo_name: "widgets".to_string(),
            live_url: live_url.to_string(),
            build_logs_url: "https://github.com/acme/widgets/actions/runs/99".to_string(),
            resources,
        }
    }

    #[test]
    fn test_routing_url_application() {
        let url = build_routing_url(SERVER, "prod", "default", "web", 12, "Deployment", "web-abc");
        assert_eq!(
            url,
            "https://dash.example.com/applications/prod/default/web?project_id=12"
        );
    }

    #[test]
    fn test_routing_url_job_any_case() {
        for kind in ["job", "Job", "JOB"] {
            let url = build_routing_url(SERVER, "prod", "default", "nightly", 12, kind, "nightly-1");
            assert_eq!(
                url,
                "https://dash.example.com/jobs/prod/default/nightly?project_id=12&job=nightly-1"
            );
        }
    }

    #[test]
    fn test_routing_url_near_miss_is_application() {
        let url = build_routing_url(SERVER, "prod", "default", "cron", 1, "CronJob", "cron-1");
        assert!(url.contains("/applications/"));
        assert!(!url.contains("job="));
    }

    #[test]
    fn test_comment_scenario() {
        let body = render_deployment_comment(&context(
            "app.example.com",
            vec![
                SuccessfulResource::new("web", "application"),
                SuccessfulResource::new("nightly", "job"),
            ],
        ));

        assert!(body.starts_with("## Preview Environments\n"));
        assert!(body.contains("[`abcd123`](https://github.com/acme/widgets/commit/abcd123)"));
        assert!(body.contains("| Live URL | app.example.com |"));
        assert!(body.contains(
            "| Deployment Details | https://dash.example.com/preview-environments/details/pr-7-widgets?environment_id=3 |"
        ));
        assert!(body.contains("#### Successfully deployed resources"));
        assert!(body.contains(
            "- [`web`](https://dash.example.com/applications/prod/pr-7-widgets/web?project_id=12)\n"
        ));
        assert!(body.contains(
            "- [`nightly`](https://dash.example.com/jobs/prod/pr-7-widgets/nightly?project_id=12)\n"
        ));
    }

    #[test]
    fn test_comment_ingress_disabled() {
        let body = render_deployment_comment(&context("", vec![]));
        assert!(body.contains("| Live URL | *Ingress is disabled for this deployment* |"));
        assert!(!body.contains("Successfully deployed resources"));
        assert!(body.ends_with("environment_id=3 |"));
    }
}
