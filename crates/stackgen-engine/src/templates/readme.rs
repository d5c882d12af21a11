use crate::manifest::OrchestrationManifest;

/// `README.md` for one stack version
#[must_use]
pub fn readme_md(manifest: &OrchestrationManifest, installers: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", manifest.project));
    out.push_str(&format!(
        "CPU-only AI stack generated by stackgen {}. This directory is immutable;\n\
         generate a new version instead of editing it.\n\n",
        env!("CARGO_PKG_VERSION")
    ));

    out.push_str("## Services\n\n");
    out.push_str("| Service | Kind | Endpoint | Image |\n");
    out.push_str("|---------|------|----------|-------|\n");
    for service in manifest.services() {
        let optional = if service.required { "" } else { " (optional)" };
        out.push_str(&format!(
            "| {}{optional} | {} | {} | `{}` |\n",
            service.name,
            service.kind,
            service.endpoint().unwrap_or_else(|| "-".to_string()),
            service.image
        ));
    }

    out.push_str("\n## Quick start\n\n");
    out.push_str("```sh\n");
    out.push_str("./install.sh                          # provision every service in order\n");
    out.push_str("./scripts/health_check.sh             # verify all services are running\n");
    out.push_str("./scripts/download_ollama_models.sh   # pull models from config/ollama_models.txt\n");
    out.push_str("./scripts/clean_stack.sh [--volumes]  # stop and remove containers\n");
    out.push_str("```\n\n");
    out.push_str("Every installer can be re-run on its own; running it again changes nothing.\n\n");

    out.push_str("## Layout\n\n");
    out.push_str("- `docker-compose.yml`: services, ports, volumes, dependencies\n");
    out.push_str("- `install.sh`: runs the installers below in order\n");
    for script in installers {
        out.push_str(&format!("- `scripts/{script}`\n"));
    }
    out.push_str("- `scripts/common.sh`: shared logging and compose helpers\n");
    out.push_str("- `config/ollama_models.txt`: models pulled by the model script\n");
    out.push_str("- `stack.json`: generation metadata and artifact digests\n");
    out.push_str("- `logs/`: created on first script run\n");
    out
}
