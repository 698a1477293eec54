//! Subprocess toolchain configuration

/// Configuration for [`SubprocessToolchain`](super::SubprocessToolchain)
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    /// Interpreter for shell-string commands
    pub shell: String,

    /// Flag that makes `shell` read a command from its next argument
    pub shell_flag: String,

    /// Cargo executable used for target enumeration
    pub cargo: String,

    /// Send child stdout to our stderr, keeping our stdout for reports
    pub stdout_to_stderr: bool,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            shell_flag: "-c".to_string(),
            cargo: "cargo".to_string(),
            stdout_to_stderr: false,
        }
    }
}

impl ToolchainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>, flag: impl Into<String>) -> Self {
        self.shell = shell.into();
        self.shell_flag = flag.into();
        self
    }

    pub fn with_cargo(mut self, cargo: impl Into<String>) -> Self {
        self.cargo = cargo.into();
        self
    }

    pub fn with_stdout_to_stderr(mut self, enabled: bool) -> Self {
        self.stdout_to_stderr = enabled;
        self
    }
}
