//! Mode-specific compile and execute invocations.

use crate::model::{Mode, ToolchainConfig};
use std::ffi::OsString;
use std::path::PathBuf;

const JAVA_SCRIPT: &str = "Main.java";
const KOTLIN_SCRIPT: &str = "Main.kt";
const JAVA_CLASS: &str = "Main";
const JAVA_ARTIFACT: &str = "Main.class";
const KOTLIN_JAR: &str = "Main.jar";

/// One external command, run with the workspace as its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    fn new(program: &PathBuf, args: &[&str]) -> Self {
        Self {
            program: program.clone(),
            args: args.iter().map(OsString::from).collect(),
        }
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut out = self.program_name();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string_lossy());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ToolchainPlan {
    pub mode: Mode,
    pub script_name: &'static str,
    pub compile: Invocation,
    /// Prefix for compiler output lines in the console.
    pub compile_prefix: &'static str,
    pub artifact: &'static str,
    /// Whether a zero compiler exit must also leave `artifact` behind.
    pub verify_artifact: bool,
    pub execute: Invocation,
    pub execute_banner: &'static str,
}

impl ToolchainPlan {
    pub fn for_mode(mode: Mode, tools: &ToolchainConfig) -> Self {
        match mode {
            Mode::Java => Self {
                mode,
                script_name: JAVA_SCRIPT,
                compile: Invocation::new(&tools.javac, &[JAVA_SCRIPT]),
                compile_prefix: "JAVAC: ",
                artifact: JAVA_ARTIFACT,
                verify_artifact: true,
                execute: Invocation::new(&tools.java, &[JAVA_CLASS]),
                execute_banner: "Running Java Class...",
            },
            Mode::Kotlin => Self {
                mode,
                script_name: KOTLIN_SCRIPT,
                compile: Invocation::new(
                    &tools.kotlinc,
                    &[KOTLIN_SCRIPT, "-d", KOTLIN_JAR, "-include-runtime"],
                ),
                compile_prefix: "KOTLINC: ",
                artifact: KOTLIN_JAR,
                verify_artifact: false,
                execute: Invocation::new(&tools.java, &["-jar", KOTLIN_JAR]),
                execute_banner: "Running Kotlin JAR...",
            },
        }
    }
}
