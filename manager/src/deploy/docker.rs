//! Single-container strategy
//!
//! Builds one image from the workspace's Dockerfile and runs one container,
//! both named `service-<bot id>`.

use std::path::Path;

use crate::deploy::step::Step;
use crate::models::bot::Bot;

/// Container label carrying the bot id
pub const LABEL_BOT_ID: &str = "com.bothandler.bot_id";

/// Container label carrying the service type
pub const LABEL_SERVICE_TYPE: &str = "com.bothandler.service_type";

/// Routing hint read by the reverse proxy companion
pub const ENV_VIRTUAL_HOST: &str = "VIRTUAL_HOST";

/// Certificate hint read by the TLS companion
pub const ENV_LETSENCRYPT_HOST: &str = "LETSENCRYPT_HOST";

/// Variables only ever derived from the bot's domain
pub const RESERVED_ENV: [&str; 2] = [ENV_VIRTUAL_HOST, ENV_LETSENCRYPT_HOST];

/// `docker build -t <name> .`
pub fn build_step(docker_bin: &str, name: &str, workspace: &Path) -> Step {
    Step::new("build", docker_bin)
        .args(["build", "-t", name, "."])
        .current_dir(workspace)
}

/// `docker rm -f <name>`; a missing container is not a failure
pub fn remove_step(docker_bin: &str, name: &str) -> Step {
    Step::new("remove", docker_bin)
        .args(["rm", "-f", name])
        .ignore_failure()
}

/// `docker run -d --name <name> ...` with labels, routing hints and env
pub fn run_step(docker_bin: &str, bot: &Bot, workspace: &Path) -> Step {
    let name = bot.service_name();
    let mut step = Step::new("run", docker_bin)
        .args(["run", "-d", "--name", name.as_str()])
        .arg("--label")
        .arg(format!("{}={}", LABEL_BOT_ID, bot.id))
        .arg("--label")
        .arg(format!("{}={}", LABEL_SERVICE_TYPE, bot.service_type))
        .current_dir(workspace);

    if let Some(domain) = bot.public_domain() {
        step = step
            .arg("-e")
            .arg(format!("{}={}", ENV_VIRTUAL_HOST, domain))
            .arg("-e")
            .arg(format!("{}={}", ENV_LETSENCRYPT_HOST, domain));
    }

    for (key, value) in &bot.environment {
        if RESERVED_ENV.contains(&key.as_str()) {
            continue;
        }
        step = step.arg("-e").arg(format!("{}={}", key, value));
    }

    step.arg(name)
}
