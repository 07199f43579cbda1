//! Process-backed test bodies
//!
//! A case passes when its command exits with status 0.

use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::TestFailure;

/// Number of trailing stderr lines kept as the stack trace
const STDERR_TAIL_LINES: usize = 20;

/// A command line with extra environment
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<String>,
}

impl CommandSpec {
    /// Build from an argv-style list; the first element is the program
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            ..Default::default()
        })
    }
}

/// Render a parameter as a single command-line argument
pub fn argument_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Run a command to completion, killing it if `token` fires
pub async fn run_command(
    spec: &CommandSpec,
    arguments: &[Value],
    token: CancellationToken,
) -> Result<(), TestFailure> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .args(arguments.iter().map(argument_string))
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }

    debug!("Spawning {} {:?}", spec.program, spec.args);
    let child = command.spawn().map_err(|e| {
        TestFailure::unexpected(format!("failed to spawn '{}': {}", spec.program, e))
    })?;

    // Dropping the wait future drops the child, which kills it
    let output = tokio::select! {
        _ = token.cancelled() => return Err(TestFailure::cancelled()),
        output = child.wait_with_output() => output.map_err(|e| {
            TestFailure::unexpected(format!("failed to wait for '{}': {}", spec.program, e))
        })?,
    };

    if output.status.success() {
        return Ok(());
    }

    let message = match output.status.code() {
        Some(code) => format!("'{}' exited with status {}", spec.program, code),
        None => format!("'{}' was terminated by a signal", spec.program),
    };
    let mut failure = TestFailure::assertion(message);

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    if !lines.is_empty() {
        let tail = &lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..];
        failure = failure.with_stack_trace(tail.join("\n"));
    }

    Err(failure)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use serde_json::json;
    use std::time::Duration;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_argument_string() {
        assert_eq!(argument_string(&json!("plain")), "plain");
        assert_eq!(argument_string(&json!(42)), "42");
        assert_eq!(argument_string(&json!(true)), "true");
    }

    #[test]
    fn test_from_argv() {
        let argv = vec!["echo".to_string(), "hi".to_string()];
        let spec = CommandSpec::from_argv(&argv).unwrap();
        assert_eq!(spec.program, "echo");
        assert_eq!(spec.args, vec!["hi".to_string()]);
        assert!(CommandSpec::from_argv(&[]).is_none());
    }

    #[tokio::test]
    async fn test_successful_command() {
        let result = run_command(&sh("exit 0"), &[], CancellationToken::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failing_command_keeps_stderr() {
        let failure = run_command(&sh("echo broken >&2; exit 3"), &[], CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Assertion);
        assert!(failure.message.contains("status 3"));
        assert_eq!(failure.stack_trace.as_deref(), Some("broken"));
    }

    #[tokio::test]
    async fn test_arguments_are_appended() {
        let spec = sh("test \"$1\" = \"$2\"");
        assert!(run_command(&spec, &[json!("a"), json!("a")], CancellationToken::new())
            .await
            .is_ok());
        assert!(run_command(&spec, &[json!("a"), json!(1)], CancellationToken::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_unexpected() {
        let spec = CommandSpec {
            program: "definitely-not-a-real-binary-xyz".to_string(),
            ..Default::default()
        };
        let failure = run_command(&spec, &[], CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Unexpected);
    }

    #[tokio::test]
    async fn test_cancellation_stops_command() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let failure = run_command(&sh("sleep 5"), &[], token).await.unwrap_err();
        assert!(failure.is_cancelled());
    }
}
