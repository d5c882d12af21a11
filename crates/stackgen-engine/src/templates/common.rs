use super::sh_quote;

/// `scripts/common.sh`: logging, dependency checks and compose helpers
///
/// Sourced by every script after it has set `SCRIPT_DIR`. Holds no state
/// between scripts; each one re-sources it.
#[must_use]
pub fn common_sh(stack_name: &str) -> String {
    let mut out = String::new();
    out.push_str("#!/bin/sh\n");
    out.push_str(&format!("# Shared helpers for {stack_name}.\n"));
    out.push_str("# Sourced by every script in this stack; expects SCRIPT_DIR to be set.\n\n");
    out.push_str(&format!("STACK_NAME={}\n", sh_quote(stack_name)));
    out.push_str(COMMON_BODY);
    out
}

const COMMON_BODY: &str = r#"ROOT_DIR=$(CDPATH= cd -- "${SCRIPT_DIR}/.." && pwd)
COMPOSE_FILE="${ROOT_DIR}/docker-compose.yml"
LOG_DIR="${ROOT_DIR}/logs"
ACTION_LOG="${LOG_DIR}/stack_actions.log"
ERROR_LOG="${LOG_DIR}/stack_errors.log"

[ -d "${LOG_DIR}" ] || mkdir -p "${LOG_DIR}"

timestamp_utc() {
    date -u +"%Y-%m-%dT%H:%M:%SZ"
}

log_info() {
    printf '%s [INFO] [%s]: %s\n' "$(timestamp_utc)" "$1" "$2" | tee -a "${ACTION_LOG}"
}

log_error() {
    printf '%s [ERROR] [%s]: %s (see %s for details)\n' \
        "$(timestamp_utc)" "$1" "$2" "${ERROR_LOG}" | tee -a "${ERROR_LOG}" >&2
}

require_command() {
    if ! command -v "$1" >/dev/null 2>&1; then
        log_error "${2:-env-check}" "Required command '$1' is not available on PATH."
        exit 1
    fi
}

require_docker() {
    require_command docker docker-check
    if ! docker info >/dev/null 2>&1; then
        log_error docker-check "Docker is not running or not accessible by the current user."
        exit 1
    fi
}

require_compose() {
    if docker compose version >/dev/null 2>&1; then
        COMPOSE_BIN="docker compose"
    elif command -v docker-compose >/dev/null 2>&1; then
        COMPOSE_BIN="docker-compose"
    else
        log_error compose-check "Neither 'docker compose' nor 'docker-compose' is available."
        exit 1
    fi
}

# Run the compose engine against this stack's manifest and project name.
compose() {
    require_docker
    require_compose
    ${COMPOSE_BIN} -p "${STACK_NAME}" -f "${COMPOSE_FILE}" "$@"
}

# Create a directory once; optional second argument is its mode.
ensure_dir() {
    if [ ! -d "$1" ]; then
        mkdir -p "$1"
        if [ -n "${2:-}" ]; then
            chmod "$2" "$1" || true
        fi
    fi
}

# compose_up <subsystem> <service>...
compose_up() {
    subsystem=$1
    shift
    log_info "${subsystem}" "Starting services: $*"
    if ! compose up -d "$@"; then
        log_error "${subsystem}" "Failed to start services: $*"
        exit 1
    fi
}

# Names of running services, one per line.
running_services() {
    compose ps --services --filter status=running 2>/dev/null || true
}
"#;
