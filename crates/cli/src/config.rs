//! Kubernetes client configuration for the CLI

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::PathBuf;

/// Kubeconfig to use: the override, then `$KUBECONFIG`, then `~/.kube/config`
pub fn kubeconfig_path(override_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var("KUBECONFIG") {
        return Ok(PathBuf::from(path));
    }

    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".kube").join("config"))
}

/// Client for the cluster named by the kubeconfig, or the in-cluster
/// configuration when no kubeconfig file exists
pub async fn kube_client(override_path: Option<&str>, context: Option<&str>) -> Result<Client> {
    let path = kubeconfig_path(override_path)?;
    if !path.exists() {
        return Client::try_default()
            .await
            .context("No kubeconfig found and in-cluster configuration failed");
    }

    let kubeconfig = Kubeconfig::read_from(&path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .context("Invalid kubeconfig")?;
    Client::try_from(config).context("Failed to create Kubernetes client")
}
