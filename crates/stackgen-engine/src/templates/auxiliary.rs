//! Supporting scripts that the driver does not run

use super::{prologue, sh_quote};

fn open(stack_name: &str, script_name: &str, purpose: &str) -> String {
    let mut out = String::new();
    out.push_str("#!/bin/sh\n");
    out.push_str(&format!("# {stack_name}: {purpose}\n\n"));
    prologue(&mut out, script_name, "$(dirname -- \"$0\")");
    out
}

/// `scripts/health_check.sh`: exit 1 unless every service is running
#[must_use]
pub fn health_check_sh(stack_name: &str, services: &[&str]) -> String {
    let mut out = open(stack_name, "health_check.sh", "report which services are running");
    let names: Vec<String> = services.iter().map(|s| sh_quote(s)).collect();

    out.push_str("log_info \"${SCRIPT_NAME}\" \"Checking services of ${STACK_NAME}\"\n");
    out.push_str("running=$(running_services)\n");
    out.push_str("overall_ok=0\n\n");
    out.push_str(&format!("for svc in {}; do\n", names.join(" ")));
    out.push_str(
        r#"    if printf '%s\n' "${running}" | grep -qx "${svc}"; then
        echo " - ${svc}: running"
    else
        log_error "${SCRIPT_NAME}" "Service '${svc}' is NOT running."
        echo " - ${svc}: not-running"
        overall_ok=1
    fi
done

if [ "${overall_ok}" -eq 0 ]; then
    echo "All services of ${STACK_NAME} are running."
else
    echo "One or more services are not running. Check ${ERROR_LOG} for details."
    exit 1
fi
"#,
    );
    out
}

/// `scripts/clean_stack.sh [--volumes]`: non-interactive `compose down`
#[must_use]
pub fn clean_stack_sh(stack_name: &str) -> String {
    let mut out = open(
        stack_name,
        "clean_stack.sh",
        "stop and remove containers; --volumes also removes volumes",
    );
    out.push_str(
        r#"usage() {
    echo "Usage: $0 [--volumes]"
}

remove_volumes=0
for arg in "$@"; do
    case "${arg}" in
        -v|--volumes)
            remove_volumes=1
            ;;
        -h|--help)
            usage
            exit 0
            ;;
        *)
            log_error "${SCRIPT_NAME}" "Unknown argument: ${arg}"
            usage >&2
            exit 2
            ;;
    esac
done

if [ "${remove_volumes}" -eq 1 ]; then
    log_info "${SCRIPT_NAME}" "Stopping ${STACK_NAME} and removing its volumes."
    if ! compose down -v; then
        log_error "${SCRIPT_NAME}" "compose down -v failed."
        exit 1
    fi
else
    log_info "${SCRIPT_NAME}" "Stopping ${STACK_NAME} (volumes preserved)."
    if ! compose down; then
        log_error "${SCRIPT_NAME}" "compose down failed."
        exit 1
    fi
fi
log_info "${SCRIPT_NAME}" "${STACK_NAME} containers removed."
"#,
    );
    out
}

/// `config/ollama_models.txt`
#[must_use]
pub fn models_list(models: &[String]) -> String {
    let mut out = String::from(
        "# One model per line. Lines starting with # are comments.\n# Pulled by scripts/download_ollama_models.sh\n",
    );
    for model in models {
        out.push_str(model);
        out.push('\n');
    }
    out
}

/// `scripts/download_ollama_models.sh [model...]`
///
/// Pulls the listed models (or every model in `config/ollama_models.txt`)
/// that the LLM service does not already report.
#[must_use]
pub fn download_models_sh(stack_name: &str, llm_service: &str, models: &[String]) -> String {
    let mut out = open(
        stack_name,
        "download_ollama_models.sh",
        "pull Ollama models that are not present yet",
    );
    out.push_str(&format!("LLM_SERVICE={}\n", sh_quote(llm_service)));
    out.push_str("MODEL_LIST_FILE=\"${ROOT_DIR}/config/ollama_models.txt\"\n\n");

    out.push_str("ensure_model_list() {\n");
    out.push_str("    if [ ! -f \"${MODEL_LIST_FILE}\" ]; then\n");
    out.push_str(
        "        log_info \"${SCRIPT_NAME}\" \"Model list missing; writing defaults to ${MODEL_LIST_FILE}\"\n",
    );
    out.push_str("        ensure_dir \"$(dirname -- \"${MODEL_LIST_FILE}\")\"\n");
    out.push_str("        cat > \"${MODEL_LIST_FILE}\" <<'MODELS'\n");
    out.push_str(&models_list(models));
    out.push_str("MODELS\n");
    out.push_str("    fi\n");
    out.push_str("}\n\n");

    out.push_str(
        r#"ensure_llm_service() {
    if ! running_services | grep -qx "${LLM_SERVICE}"; then
        compose_up "${SCRIPT_NAME}" "${LLM_SERVICE}"
    fi
}

installed_models() {
    compose exec -T "${LLM_SERVICE}" ollama list 2>/dev/null | awk 'NR > 1 { print $1 }'
}

pull_model() {
    model=$1
    if printf '%s\n' "${INSTALLED}" | grep -qx -e "${model}" -e "${model}:latest"; then
        log_info "${SCRIPT_NAME}" "Model '${model}' already present; skipping."
        return 0
    fi
    log_info "${SCRIPT_NAME}" "Pulling model '${model}'."
    if ! compose exec -T "${LLM_SERVICE}" ollama pull "${model}"; then
        log_error "${SCRIPT_NAME}" "Failed to pull model '${model}'."
        exit 1
    fi
}

ensure_model_list
ensure_llm_service
INSTALLED=$(installed_models || true)

if [ "$#" -gt 0 ]; then
    for model in "$@"; do
        pull_model "${model}"
    done
else
    models=$(sed -e 's/#.*$//' -e 's/^[[:space:]]*//' -e 's/[[:space:]]*$//' "${MODEL_LIST_FILE}" | grep -v '^$' || true)
    for model in ${models}; do
        pull_model "${model}"
    done
fi
log_info "${SCRIPT_NAME}" "Model sync complete."
"#,
    );
    out
}
