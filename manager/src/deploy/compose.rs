//! Docker Compose strategy

use std::collections::BTreeMap;
use std::path::Path;

use crate::deploy::step::Step;
use crate::filesys::dir::Dir;

/// Manifest names recognised at the workspace root
pub const MANIFEST_NAMES: [&str; 2] = ["docker-compose.yml", "docker-compose.yaml"];

/// Check whether the workspace root holds a compose manifest
pub async fn has_manifest(workspace: &Path) -> bool {
    let dir = Dir::new(workspace);
    for name in MANIFEST_NAMES {
        if dir.contains(name).await {
            return true;
        }
    }
    false
}

/// `docker compose up -d --build` inside the workspace
pub fn up_step(docker_bin: &str, workspace: &Path, env: &BTreeMap<String, String>) -> Step {
    Step::new("compose", docker_bin)
        .args(["compose", "up", "-d", "--build"])
        .current_dir(workspace)
        .envs(env)
}
