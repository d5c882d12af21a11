use super::{prologue, sh_quote};

/// Top-level `install.sh`
///
/// Runs each installer as its own `sh` process, in the order given.
#[must_use]
pub fn install_sh(stack_name: &str, installers: &[String]) -> String {
    let mut out = String::new();
    out.push_str("#!/bin/sh\n");
    out.push_str(&format!(
        "# {stack_name}: provision every service in manifest order.\n"
    ));
    out.push_str("# Re-running on a provisioned stack is a no-op.\n\n");
    prologue(&mut out, "install.sh", "$(dirname -- \"$0\")/scripts");

    out.push_str("run_installer() {\n");
    out.push_str("    log_info \"${SCRIPT_NAME}\" \"Running $1\"\n");
    out.push_str("    sh \"${SCRIPT_DIR}/$1\"\n");
    out.push_str("}\n\n");

    out.push_str(&format!(
        "log_info \"${{SCRIPT_NAME}}\" {}\n",
        sh_quote(&format!(
            "Provisioning {stack_name} ({} installers)",
            installers.len()
        ))
    ));
    for script in installers {
        out.push_str(&format!("run_installer {}\n", sh_quote(script)));
    }
    out.push_str(&format!(
        "log_info \"${{SCRIPT_NAME}}\" {}\n",
        sh_quote(&format!(
            "{stack_name} provisioned. Verify with scripts/health_check.sh"
        ))
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_runs_installers_in_order() {
        let body = install_sh(
            "stack-v1",
            &[
                "10_install_ollama.sh".to_string(),
                "20_install_open-webui.sh".to_string(),
            ],
        );

        let first = body.find("run_installer 10_install_ollama.sh").unwrap();
        let second = body.find("run_installer 20_install_open-webui.sh").unwrap();
        assert!(first < second);
        assert!(body.contains("SCRIPT_DIR=$(CDPATH= cd -- \"$(dirname -- \"$0\")/scripts\" && pwd)"));
        assert!(body.contains("sh \"${SCRIPT_DIR}/$1\""));
    }
}
