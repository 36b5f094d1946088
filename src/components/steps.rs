//! Shared building blocks for the daemon components.
//!
//! Every Configure step maps its failure to `Configuration { step, .. }`
//! while cancellation stays [`ComponentError::Canceled`].

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ComponentError;
use crate::exec::{self, Invocation};
use crate::ownership::Owner;

/// Runs one Configure command and returns its output.
pub(crate) async fn run_step(
    inv: &Invocation,
    step: &str,
    token: &CancellationToken,
) -> Result<String, ComponentError> {
    tracing::debug!(step, command = %inv, "configure step");
    exec::output(inv, token)
        .await
        .map_err(|e| e.into_configuration(step))
}

/// Runs one Configure command bounded by `limit`; the child is killed on expiry.
pub(crate) async fn run_step_within(
    inv: &Invocation,
    step: &str,
    limit: Duration,
    token: &CancellationToken,
) -> Result<String, ComponentError> {
    match tokio::time::timeout(limit, run_step(inv, step, token)).await {
        Ok(res) => res,
        Err(_) => Err(ComponentError::configuration(
            step,
            format!("no answer within {limit:?}"),
        )),
    }
}

/// Runs a long-lived daemon; a stop requested through `token` is `Canceled`.
pub(crate) async fn run_daemon(
    inv: &Invocation,
    token: &CancellationToken,
) -> Result<(), ComponentError> {
    tracing::debug!(command = %inv, "starting daemon");
    exec::run_until_exit(inv, token)
        .await
        .map_err(|e| e.into_start())
}

pub(crate) async fn make_dir(path: &Path) -> Result<(), ComponentError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ComponentError::configuration(format!("create {}", path.display()), e))
}

pub(crate) fn hand_over(owner: &Owner, path: &Path) -> Result<(), ComponentError> {
    owner
        .chown(path)
        .map_err(|e| ComponentError::configuration(format!("chown {}", path.display()), e))
}

pub(crate) fn hand_over_tree(owner: &Owner, root: &Path) -> Result<(), ComponentError> {
    owner
        .chown_recursive(root)
        .map_err(|e| ComponentError::configuration(format!("chown -R {}", root.display()), e))
}

/// `ceph auth get-or-create <entity> <caps..>` with the keyring written to `keyring`.
pub(crate) fn auth_get_or_create(
    cfg: &Config,
    entity: &str,
    caps: &[&str],
    keyring: &Path,
) -> Invocation {
    cfg.ceph_command("ceph")
        .args(["auth", "get-or-create", entity])
        .args(caps.iter().copied())
        .stdout_to(keyring)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn failed_step_names_the_step() {
        let err = run_step(&sh("echo nope >&2; exit 1"), "create monmap", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ComponentError::Configuration { step, reason } => {
                assert_eq!(step, "create monmap");
                assert!(reason.contains("nope"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn bounded_step_gives_up() {
        let err = run_step_within(
            &sh("sleep 30"),
            "fetch keyring",
            Duration::from_millis(50),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_configuration_failure());
        assert!(!err.is_canceled());
    }

    #[tokio::test]
    async fn cancelled_step_is_not_a_failure() {
        let token = CancellationToken::new();
        token.cancel();
        let err = run_step(&sh("true"), "anything", &token).await.unwrap_err();
        assert!(err.is_canceled());
    }

    #[test]
    fn auth_invocation_redirects_the_keyring() {
        let inv = auth_get_or_create(
            &Config::default(),
            "mgr.a",
            &["mon", "allow profile mgr"],
            Path::new("/k"),
        );
        assert_eq!(inv.arguments(), ["auth", "get-or-create", "mgr.a", "mon", "allow profile mgr"]);
        assert_eq!(inv.stdout_path().map(|p| p.as_path()), Some(Path::new("/k")));
    }
}
