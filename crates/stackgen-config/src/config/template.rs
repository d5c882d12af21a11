use super::{DEFAULT_OLLAMA_MODELS, DEFAULT_PORT_STRIDE, DEFAULT_TTS_VOICE};

/// Commented default `.stackgen/config.toml`, written by `stackgen init`
#[must_use]
pub fn default_config_toml() -> String {
    let models = DEFAULT_OLLAMA_MODELS
        .iter()
        .map(|m| format!("\"{m}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"# stackgen configuration
# Precedence: CLI flags > this file > built-in defaults

[defaults]
# Directory that holds stack-v1, stack-v2, ...
base_dir = "."
# Optional services to enable (see `stackgen services`)
enable = []
# Host ports move by this much for every new version
port_stride = {DEFAULT_PORT_STRIDE}
# Also write stack-v<N>.tar.gz inside each version directory
archive = false

# Per-service overrides. host_port is the port used by stack-v1.
# params merge into the service's parameters; keys the service does not
# already use, and that no {{placeholder}} references, become environment
# variables of the container.
# [services.open-webui]
# image = "ghcr.io/open-webui/open-webui:main"
# host_port = 3000
# params = {{ WEBUI_NAME = "CPU AI Stack" }}

[models]
ollama = [{models}]

[tts]
voice = "{DEFAULT_TTS_VOICE}"
"#
    )
}
