//! Shell and text templates emitted into a stack directory
//!
//! Every function returns a complete file body. Values interpolated into
//! shell code go through [`sh_quote`].

mod auxiliary;
mod common;
mod driver;
mod installers;
mod readme;

pub use auxiliary::{clean_stack_sh, download_models_sh, health_check_sh, models_list};
pub use common::common_sh;
pub use driver::install_sh;
pub use installers::{
    FrontendParams, ImageGenParams, LlmInferenceParams, ScriptHeader, TtsAdapterParams,
    TtsEngineParams, frontend, image_gen, llm_inference, tts_adapter, tts_engine,
};
pub use readme::readme_md;

/// Quote `value` for POSIX sh as a single word
#[must_use]
pub fn sh_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Lines shared by every script after the shebang: strict mode, own
/// location, and the shared library.
pub(crate) fn prologue(out: &mut String, script_name: &str, script_dir_expr: &str) {
    out.push_str("set -eu\n");
    out.push_str(&format!("SCRIPT_NAME={}\n", sh_quote(script_name)));
    out.push_str(&format!(
        "SCRIPT_DIR=$(CDPATH= cd -- \"{script_dir_expr}\" && pwd)\n"
    ));
    out.push_str("# shellcheck source=/dev/null\n");
    out.push_str(". \"${SCRIPT_DIR}/common.sh\"\n\n");
}
