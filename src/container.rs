//! Container build plan for the service image.
//!
//! The image is produced by a fixed, linear sequence of steps: pick the base
//! image, set build flags, set the working directory, install the toolchain,
//! fetch the dependencies declared by the manifest, copy and compile the
//! application, expose the service port and declare the startup command.
//!
//! [`BuildPlan::render`] turns the plan into Dockerfile text and
//! [`BuildPlan::check_context`] verifies a build context before anything is
//! rendered, so a missing manifest stops the build ahead of the copy step.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{BIND_HOST, DEFAULT_PORT};

pub const BASE_IMAGE: &str = "rust:1.89-slim";
pub const WORKDIR: &str = "/app";
pub const MANIFEST: &str = "Cargo.toml";
pub const LOCKFILE: &str = "Cargo.lock";
pub const BINARY: &str = "agent-evaluator";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Dependency manifest not found: {0}")]
    MissingManifest(PathBuf),

    #[error("Build context is not a directory: {0}")]
    InvalidContext(PathBuf),

    #[error("Invalid build plan: {0}")]
    InvalidOrder(String),
}

/// One instruction group of the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStep {
    Base { image: String },
    Env { vars: Vec<(String, String)> },
    Workdir { path: String },
    /// OS packages, installed then followed by a package cache cleanup.
    Toolchain { packages: Vec<String> },
    /// Copy the manifest files alone and fetch what they declare.
    Dependencies { manifests: Vec<String>, command: String },
    CopyApplication,
    Compile { command: String },
    /// Metadata only; the port is bound by the startup command.
    Expose { port: u16 },
    Command { argv: Vec<String> },
}

impl BuildStep {
    fn kind(&self) -> &'static str {
        match self {
            Self::Base { .. } => "base",
            Self::Env { .. } => "env",
            Self::Workdir { .. } => "workdir",
            Self::Toolchain { .. } => "toolchain",
            Self::Dependencies { .. } => "dependencies",
            Self::CopyApplication => "copy",
            Self::Compile { .. } => "compile",
            Self::Expose { .. } => "expose",
            Self::Command { .. } => "command",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base { image } => write!(f, "FROM {}", image),
            Self::Env { vars } => {
                let pairs: Vec<String> = vars.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "ENV {}", pairs.join(" \\\n    "))
            }
            Self::Workdir { path } => write!(f, "WORKDIR {}", path),
            Self::Toolchain { packages } => write!(
                f,
                "RUN apt-get update \\\n    && apt-get install -y --no-install-recommends {} \\\n    && rm -rf /var/lib/apt/lists/*",
                packages.join(" ")
            ),
            Self::Dependencies { manifests, command } => {
                write!(f, "COPY {} ./\nRUN {}", manifests.join(" "), command)
            }
            Self::CopyApplication => write!(f, "COPY . ."),
            Self::Compile { command } => write!(f, "RUN {}", command),
            Self::Expose { port } => write!(f, "EXPOSE {}", port),
            Self::Command { argv } => {
                let quoted: Vec<String> = argv.iter().map(|a| format!("{:?}", a)).collect();
                write!(f, "CMD [{}]", quoted.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub steps: Vec<BuildStep>,
}

impl Default for BuildPlan {
    fn default() -> Self {
        let port = DEFAULT_PORT;
        BuildPlan {
            steps: vec![
                BuildStep::Base {
                    image: BASE_IMAGE.to_string(),
                },
                BuildStep::Env {
                    vars: vec![
                        ("CARGO_INCREMENTAL".to_string(), "0".to_string()),
                        ("RUST_LOG_STYLE".to_string(), "never".to_string()),
                        (
                            "CARGO_REGISTRIES_CRATES_IO_PROTOCOL".to_string(),
                            "sparse".to_string(),
                        ),
                    ],
                },
                BuildStep::Workdir {
                    path: WORKDIR.to_string(),
                },
                BuildStep::Toolchain {
                    packages: vec![
                        "build-essential".to_string(),
                        "pkg-config".to_string(),
                        "libssl-dev".to_string(),
                    ],
                },
                BuildStep::Dependencies {
                    manifests: vec![MANIFEST.to_string(), format!("{}*", LOCKFILE)],
                    command: "mkdir -p src && touch src/lib.rs src/main.rs && cargo fetch"
                        .to_string(),
                },
                BuildStep::CopyApplication,
                BuildStep::Compile {
                    command: "cargo build --release".to_string(),
                },
                BuildStep::Expose { port },
                BuildStep::Command {
                    argv: vec![
                        format!("{}/target/release/{}", WORKDIR, BINARY),
                        "serve".to_string(),
                        "--host".to_string(),
                        BIND_HOST.to_string(),
                        "--port".to_string(),
                        port.to_string(),
                    ],
                },
            ],
        }
    }
}

impl BuildPlan {
    fn position(&self, kind: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.kind() == kind)
    }

    pub fn exposed_port(&self) -> Option<u16> {
        self.steps.iter().find_map(|s| match s {
            BuildStep::Expose { port } => Some(*port),
            _ => None,
        })
    }

    pub fn command(&self) -> Option<&[String]> {
        self.steps.iter().find_map(|s| match s {
            BuildStep::Command { argv } => Some(argv.as_slice()),
            _ => None,
        })
    }

    /// Value following `flag` in the startup command.
    pub fn command_arg(&self, flag: &str) -> Option<&str> {
        let argv = self.command()?;
        argv.iter()
            .position(|a| a == flag)
            .and_then(|i| argv.get(i + 1))
            .map(|s| s.as_str())
    }

    /// Check step ordering: base first, dependencies before the copy,
    /// expose before the command, command last.
    pub fn validate(&self) -> Result<(), BuildError> {
        let require = |kind: &str| {
            self.position(kind)
                .ok_or_else(|| BuildError::InvalidOrder(format!("missing {} step", kind)))
        };

        if require("base")? != 0 {
            return Err(BuildError::InvalidOrder("base image must come first".into()));
        }
        if require("dependencies")? > require("copy")? {
            return Err(BuildError::InvalidOrder(
                "dependencies must be installed before the application is copied".into(),
            ));
        }
        let command = require("command")?;
        if require("expose")? > command {
            return Err(BuildError::InvalidOrder("port must be exposed before the command".into()));
        }
        if command != self.steps.len() - 1 {
            return Err(BuildError::InvalidOrder("command must be the last step".into()));
        }
        Ok(())
    }

    /// Verify the build context holds the dependency manifest.
    pub fn check_context(&self, context: &Path) -> Result<(), BuildError> {
        if !context.is_dir() {
            return Err(BuildError::InvalidContext(context.to_path_buf()));
        }
        let manifest = context.join(MANIFEST);
        if !manifest.is_file() {
            return Err(BuildError::MissingManifest(manifest));
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        let blocks: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        let mut out = blocks.join("\n\n");
        out.push('\n');
        out
    }

    /// Validate, check `context`, then render.
    pub fn render_for(&self, context: &Path) -> Result<String, BuildError> {
        self.validate()?;
        self.check_context(context)?;
        Ok(self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_plan_is_valid() {
        assert_eq!(BuildPlan::default().validate(), Ok(()));
    }

    #[test]
    fn test_exposes_8000_and_binds_all_interfaces() {
        let plan = BuildPlan::default();
        assert_eq!(plan.exposed_port(), Some(8000));
        assert_eq!(plan.command_arg("--host"), Some("0.0.0.0"));
        assert_eq!(plan.command_arg("--port"), Some("8000"));
        assert_eq!(plan.command().map(|c| c[1].as_str()), Some("serve"));
    }

    #[test]
    fn test_render_is_stable() {
        let plan = BuildPlan::default();
        let first = plan.render();
        assert_eq!(first, plan.render());
        assert_eq!(first, BuildPlan::default().render());

        assert!(first.starts_with("FROM rust:1.89-slim\n"));
        assert!(first.contains("WORKDIR /app"));
        assert!(first.contains("EXPOSE 8000"));
        assert!(first.ends_with(
            "CMD [\"/app/target/release/agent-evaluator\", \"serve\", \"--host\", \"0.0.0.0\", \"--port\", \"8000\"]\n"
        ));
    }

    #[test]
    fn test_toolchain_provides_openssl_headers() {
        let plan = BuildPlan::default();
        let packages = plan
            .steps
            .iter()
            .find_map(|s| match s {
                BuildStep::Toolchain { packages } => Some(packages.clone()),
                _ => None,
            })
            .unwrap();
        assert!(packages.iter().any(|p| p == "libssl-dev"));
        assert!(packages.iter().any(|p| p == "pkg-config"));
        assert!(plan
            .render()
            .contains("apt-get install -y --no-install-recommends build-essential pkg-config libssl-dev"));
    }

    #[test]
    fn test_base_image_supports_resolved_dependencies() {
        // Without a lockfile `cargo fetch` resolves the newest crates, which need rustc 1.89+.
        let minor: u32 = BASE_IMAGE
            .trim_start_matches("rust:1.")
            .split('-')
            .next()
            .and_then(|m| m.parse().ok())
            .unwrap();
        assert!(minor >= 89, "base image {} is too old", BASE_IMAGE);
    }

    #[test]
    fn test_render_orders_dependencies_before_copy() {
        let out = BuildPlan::default().render();
        let fetch = out.find("cargo fetch").unwrap();
        let copy = out.find("COPY . .").unwrap();
        let expose = out.find("EXPOSE").unwrap();
        let cmd = out.find("CMD").unwrap();
        assert!(fetch < copy && copy < expose && expose < cmd);
    }

    #[test]
    fn test_checked_in_dockerfile_matches_plan() {
        let checked_in = include_str!("../Dockerfile");
        let significant = |s: &str| -> Vec<String> {
            s.lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .collect()
        };
        assert_eq!(significant(checked_in), significant(&BuildPlan::default().render()));
    }

    #[test]
    fn test_missing_manifest_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let err = BuildPlan::default().render_for(dir.path()).unwrap_err();
        assert_eq!(err, BuildError::MissingManifest(dir.path().join("Cargo.toml")));
    }

    #[test]
    fn test_context_with_manifest_renders() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();

        let out = BuildPlan::default().render_for(dir.path()).unwrap();
        assert_eq!(out, BuildPlan::default().render());
    }

    #[test]
    fn test_command_independent_of_source_tree() {
        let empty = TempDir::new().unwrap();
        fs::write(empty.path().join("Cargo.toml"), "").unwrap();
        let full = TempDir::new().unwrap();
        fs::write(full.path().join("Cargo.toml"), "[package]").unwrap();
        fs::create_dir(full.path().join("src")).unwrap();
        fs::write(full.path().join("src/main.rs"), "fn main() {}").unwrap();

        let plan = BuildPlan::default();
        assert_eq!(plan.render_for(empty.path()), plan.render_for(full.path()));
    }

    #[test]
    fn test_invalid_context() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(
            BuildPlan::default().check_context(&missing),
            Err(BuildError::InvalidContext(missing))
        );
    }

    #[test]
    fn test_validate_rejects_bad_order() {
        let mut plan = BuildPlan::default();
        // move the copy ahead of the dependency install
        let copy = plan.steps.remove(5);
        plan.steps.insert(4, copy);
        assert!(matches!(plan.validate(), Err(BuildError::InvalidOrder(_))));

        let mut plan = BuildPlan::default();
        plan.steps.push(BuildStep::Expose { port: 9000 });
        assert!(matches!(plan.validate(), Err(BuildError::InvalidOrder(_))));

        let mut plan = BuildPlan::default();
        plan.steps.remove(0);
        assert!(matches!(plan.validate(), Err(BuildError::InvalidOrder(_))));
    }
}
