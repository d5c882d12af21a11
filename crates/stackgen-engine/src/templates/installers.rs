//! Per-variant installer bodies
//!
//! One function per service kind, each taking a typed parameter record.
//! Every installer guards its directory creation and starts its service
//! with `compose up -d`, so running it twice changes nothing.

use super::{prologue, sh_quote};

/// Identity of one installer script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHeader {
    pub script_name: String,
    pub service: String,
    pub stack_name: String,
    /// Human-readable variant label, e.g. `llm-inference`
    pub variant: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmInferenceParams {
    pub data_dir: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendParams {
    pub data_dir: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGenParams {
    pub models_dir: String,
    pub workflows_dir: String,
    pub output_dir: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsEngineParams {
    pub data_dir: String,
    pub voice: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsAdapterParams {
    pub data_dir: String,
    pub endpoint: String,
}

fn open(header: &ScriptHeader) -> String {
    let mut out = String::new();
    out.push_str("#!/bin/sh\n");
    out.push_str(&format!(
        "# {}: install and start {} ({})\n",
        header.stack_name, header.service, header.variant
    ));
    out.push_str("# Safe to re-run: directories are created once, compose up is idempotent.\n\n");
    prologue(&mut out, &header.script_name, "$(dirname -- \"$0\")");
    out.push_str(&format!(
        "log_info \"${{SCRIPT_NAME}}\" {}\n",
        sh_quote(&format!("Installing {}", header.service))
    ));
    out
}

fn ensure_dir(out: &mut String, dir: &str, mode: Option<&str>) {
    match mode {
        Some(mode) => out.push_str(&format!("ensure_dir {} {mode}\n", sh_quote(dir))),
        None => out.push_str(&format!("ensure_dir {}\n", sh_quote(dir))),
    }
}

fn start_and_report(out: &mut String, header: &ScriptHeader, message: &str) {
    out.push_str(&format!(
        "compose_up \"${{SCRIPT_NAME}}\" {}\n",
        sh_quote(&header.service)
    ));
    out.push_str(&format!(
        "log_info \"${{SCRIPT_NAME}}\" {}\n",
        sh_quote(message)
    ));
}

#[must_use]
pub fn llm_inference(header: &ScriptHeader, params: &LlmInferenceParams) -> String {
    let mut out = open(header);
    ensure_dir(&mut out, &params.data_dir, Some("700"));
    start_and_report(
        &mut out,
        header,
        &format!(
            "{} API is up at {}. Pull models with scripts/download_ollama_models.sh",
            header.service, params.endpoint
        ),
    );
    out
}

#[must_use]
pub fn frontend(header: &ScriptHeader, params: &FrontendParams) -> String {
    let mut out = open(header);
    ensure_dir(&mut out, &params.data_dir, None);
    start_and_report(
        &mut out,
        header,
        &format!("{} is up at {}", header.service, params.endpoint),
    );
    out
}

#[must_use]
pub fn image_gen(header: &ScriptHeader, params: &ImageGenParams) -> String {
    let mut out = open(header);
    ensure_dir(&mut out, &params.models_dir, None);
    ensure_dir(&mut out, &params.workflows_dir, None);
    ensure_dir(&mut out, &params.output_dir, None);
    start_and_report(
        &mut out,
        header,
        &format!("{} is up at {}", header.service, params.endpoint),
    );
    out
}

#[must_use]
pub fn tts_engine(header: &ScriptHeader, params: &TtsEngineParams) -> String {
    let mut out = open(header);
    ensure_dir(&mut out, &params.data_dir, None);
    out.push_str(&format!(
        "log_info \"${{SCRIPT_NAME}}\" {}\n",
        sh_quote(&format!("Using voice {}", params.voice))
    ));
    start_and_report(
        &mut out,
        header,
        &format!("{} is listening on {}", header.service, params.endpoint),
    );
    out
}

#[must_use]
pub fn tts_adapter(header: &ScriptHeader, params: &TtsAdapterParams) -> String {
    let mut out = open(header);
    ensure_dir(&mut out, &params.data_dir, None);
    start_and_report(
        &mut out,
        header,
        &format!("{} HTTP speech API is up at {}", header.service, params.endpoint),
    );
    out
}
