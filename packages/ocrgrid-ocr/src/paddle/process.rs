use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::engine::{OcrEngine, OcrError, OcrInput, OcrOutput};
use crate::protocol::{OcrRequest, OcrResponse};

use super::args::EngineArgs;

const READY_MARKER: &str = "OCR init completed";
const MISSING_LIBRARY_MARKER: &str = "not found (required by";

struct Channel {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Channel {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn exchange(&mut self, request: &OcrRequest) -> Result<OcrResponse, OcrError> {
        self.stdin.write_all(request.to_line()?.as_bytes()).await?;
        self.stdin.flush().await?;
        let line = self
            .stdout
            .next_line()
            .await?
            .ok_or(OcrError::Disconnected)?;
        debug!(response_len = line.len(), "engine answered");
        OcrResponse::parse(&line)
    }

    fn discard(mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "engine process already gone");
        }
    }
}

/// Errors after which the same request can be sent again to a fresh process.
fn is_stale(err: &OcrError) -> bool {
    matches!(err, OcrError::Disconnected | OcrError::Io(_))
}

/// Directory the engine is started from. Linux release archives place the
/// binary under `bin/`, so the root sits one level higher there.
fn working_dir_for(exe: &Path) -> PathBuf {
    let dir = exe
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if cfg!(target_os = "linux") {
        dir.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(dir)
            .to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

fn missing_library(line: &str) -> Option<OcrError> {
    line.contains(MISSING_LIBRARY_MARKER)
        .then(|| OcrError::NotReady(format!("missing shared library: {line}")))
}

/// Reads both output streams until the engine reports ready. The dynamic
/// linker complains on stderr, the engine itself on stdout.
async fn wait_until_ready(
    stdout: &mut Lines<BufReader<ChildStdout>>,
    stderr: &mut Lines<BufReader<ChildStderr>>,
) -> Result<(), OcrError> {
    let mut stderr_open = true;
    loop {
        let (line, from_stdout) = tokio::select! {
            line = stdout.next_line() => (line?, true),
            line = stderr.next_line(), if stderr_open => (line?, false),
        };
        let Some(line) = line else {
            if from_stdout {
                while let Ok(Some(line)) = stderr.next_line().await {
                    if let Some(err) = missing_library(&line) {
                        return Err(err);
                    }
                }
                return Err(OcrError::NotReady("engine exited during startup".into()));
            }
            stderr_open = false;
            continue;
        };
        debug!(line = %line, from_stdout, "engine startup");
        if let Some(err) = missing_library(&line) {
            return Err(err);
        }
        if from_stdout && line.contains(READY_MARKER) {
            return Ok(());
        }
    }
}

/// Everything needed to start another engine process.
#[derive(Debug, Clone)]
struct Launcher {
    exe_path: PathBuf,
    flags: Vec<String>,
    working_dir: PathBuf,
}

impl Launcher {
    async fn start(&self, timeout: Duration) -> Result<Channel, OcrError> {
        let mut command = Command::new(&self.exe_path);
        command
            .args(&self.flags)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if cfg!(target_os = "linux") {
            command.env("LD_LIBRARY_PATH", self.working_dir.join("lib"));
        }

        let mut child = command.spawn().map_err(|e| {
            OcrError::EngineError(format!("failed to start {}: {e}", self.exe_path.display()))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::EngineError("engine stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OcrError::EngineError("engine stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| OcrError::EngineError("engine stderr unavailable".into()))?;

        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        match tokio::time::timeout(timeout, wait_until_ready(&mut stdout, &mut stderr)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "engine failed to initialize");
                return Err(e);
            }
            Err(_) => return Err(OcrError::Timeout(timeout)),
        }
        tokio::spawn(async move {
            while let Ok(Some(line)) = stderr.next_line().await {
                debug!(target: "ocrgrid_ocr::engine_stderr", "{line}");
            }
        });
        debug!(exe = %self.exe_path.display(), flags = ?self.flags, pid = ?child.id(), "engine ready");

        Ok(Channel {
            child,
            stdin,
            stdout,
        })
    }
}

/// An engine running as a child process, spoken to over stdin/stdout.
///
/// A process that exited, timed out or was abandoned mid-request is replaced
/// by a fresh one on the next request.
pub struct ProcessEngine {
    launcher: Launcher,
    channel: Mutex<Option<Channel>>,
    timeout: Duration,
}

impl ProcessEngine {
    /// Starts the engine and waits for it to report that its models are loaded.
    pub async fn spawn(
        exe_path: impl AsRef<Path>,
        args: &EngineArgs,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        let exe_path = exe_path.as_ref();
        let launcher = Launcher {
            exe_path: exe_path.to_path_buf(),
            flags: args.to_flags()?,
            working_dir: working_dir_for(exe_path),
        };
        let channel = launcher.start(timeout).await?;

        Ok(Self {
            launcher,
            channel: Mutex::new(Some(channel)),
            timeout,
        })
    }

    pub async fn is_alive(&self) -> bool {
        self.channel
            .lock()
            .await
            .as_mut()
            .is_some_and(|channel| channel.is_alive())
    }

    pub async fn shutdown(self) -> Result<(), OcrError> {
        if let Some(mut channel) = self.channel.into_inner() {
            if channel.is_alive() {
                channel.child.kill().await?;
            }
        }
        Ok(())
    }

    /// Hands out the idle process, or starts a new one. The flag is true for
    /// a new process.
    async fn checkout(&self, idle: Option<Channel>) -> Result<(Channel, bool), OcrError> {
        if let Some(mut channel) = idle {
            if channel.is_alive() {
                return Ok((channel, false));
            }
            debug!("engine process exited, restarting");
            channel.discard();
        } else {
            debug!("starting engine process");
        }
        Ok((self.launcher.start(self.timeout).await?, true))
    }
}

#[async_trait]
impl OcrEngine for ProcessEngine {
    async fn recognize(&self, input: &OcrInput) -> Result<OcrOutput, OcrError> {
        let request = OcrRequest::from_input(input)?;
        let mut slot = self.channel.lock().await;
        loop {
            // The channel stays out of the slot while a request is in flight,
            // so a dropped caller leaves nothing behind to answer the next one.
            let (mut channel, fresh) = self.checkout(slot.take()).await?;
            match tokio::time::timeout(self.timeout, channel.exchange(&request)).await {
                Ok(Ok(response)) => {
                    *slot = Some(channel);
                    return response.into_output();
                }
                Ok(Err(e)) if !fresh && is_stale(&e) => {
                    debug!(error = %e, "engine channel went stale, retrying on a new process");
                    channel.discard();
                }
                Ok(Err(e)) => {
                    if matches!(e, OcrError::Protocol(_)) {
                        *slot = Some(channel);
                    } else {
                        channel.discard();
                    }
                    return Err(e);
                }
                Err(_) => {
                    warn!(timeout = ?self.timeout, "engine did not answer in time, restarting it");
                    channel.discard();
                    return Err(OcrError::Timeout(self.timeout));
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const FAKE_ENGINE: &str = r#"#!/bin/sh
echo "loading detection model"
echo "OCR init completed."
while IFS= read -r line; do
  case "$line" in
    *missing*) echo '{"code":200,"data":"image path does not exist"}' ;;
    *) echo '{"code":100,"data":[{"box":[[0,0],[30,0],[30,10],[0,10]],"score":0.97,"text":"Total"}]}' ;;
  esac
done
"#;

    const BROKEN_ENGINE: &str = r#"#!/bin/sh
echo "./PaddleOCR-json: /lib/libm.so.6: version 'GLIBC_2.38' not found (required by ./PaddleOCR-json)" >&2
exit 1
"#;

    const ONE_SHOT_ENGINE: &str = r#"#!/bin/sh
echo "OCR init completed."
IFS= read -r line
echo '{"code":100,"data":[{"box":[[0,0],[30,0],[30,10],[0,10]],"score":0.97,"text":"Total"}]}'
"#;

    const SLOW_ENGINE: &str = r#"#!/bin/sh
echo "OCR init completed."
while IFS= read -r line; do
  case "$line" in
    *slow*) sleep 1; echo '{"code":100,"data":[{"box":[[0,0],[30,0],[30,10],[0,10]],"score":0.9,"text":"slow"}]}' ;;
    *) echo '{"code":100,"data":[{"box":[[0,0],[30,0],[30,10],[0,10]],"score":0.9,"text":"fast"}]}' ;;
  esac
done
"#;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let path = bin.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn image(name: &str) -> OcrInput {
        OcrInput::FilePath(PathBuf::from(format!("/tmp/{name}.png")))
    }

    #[test]
    fn test_working_dir_for_relative_exe() {
        assert!(!working_dir_for(Path::new("engine")).as_os_str().is_empty());
    }

    async fn answers_and_reports_errors(exe: &Path, timeout: Duration) {
        let bad_args = EngineArgs::empty().with("models_path", "模型");
        assert!(matches!(
            ProcessEngine::spawn(exe, &bad_args, timeout).await,
            Err(OcrError::InvalidArgument(_))
        ));

        let engine = ProcessEngine::spawn(exe, &EngineArgs::default(), timeout)
            .await
            .unwrap();
        assert!(engine.is_alive().await);

        let output = engine.recognize(&image("table")).await.unwrap();
        assert_eq!(output.regions.len(), 1);
        assert_eq!(output.regions[0].text, "Total");

        let output = engine
            .recognize(&OcrInput::Bytes(vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(output.text, "Total");

        let err = engine.recognize(&image("missing")).await.unwrap_err();
        assert!(matches!(err, OcrError::Recognition { code: 200, .. }));
        engine.shutdown().await.unwrap();
    }

    async fn missing_library_on_stderr_is_reported(exe: &Path, timeout: Duration) {
        let err = ProcessEngine::spawn(exe, &EngineArgs::default(), timeout)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OcrError::NotReady(_)));
        assert!(err.to_string().contains("missing shared library"), "{err}");
    }

    async fn exited_engine_is_restarted(exe: &Path, timeout: Duration) {
        let engine = ProcessEngine::spawn(exe, &EngineArgs::default(), timeout)
            .await
            .unwrap();
        for name in ["first", "second", "third"] {
            let output = engine.recognize(&image(name)).await.unwrap();
            assert_eq!(output.text, "Total");
        }
    }

    async fn abandoned_request_does_not_leak_its_answer(exe: &Path, timeout: Duration) {
        let engine = ProcessEngine::spawn(exe, &EngineArgs::default(), timeout)
            .await
            .unwrap();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), engine.recognize(&image("slow"))).await;
        assert!(abandoned.is_err());

        let output = engine.recognize(&image("quick")).await.unwrap();
        assert_eq!(output.text, "fast");
        assert!(engine.is_alive().await);
    }

    async fn timed_out_engine_is_replaced(exe: &Path) {
        let timeout = Duration::from_millis(300);
        let engine = ProcessEngine::spawn(exe, &EngineArgs::default(), Duration::from_secs(5))
            .await
            .unwrap();
        let engine = ProcessEngine { timeout, ..engine };
        let err = engine.recognize(&image("slow")).await.unwrap_err();
        assert!(matches!(err, OcrError::Timeout(_)));

        let output = engine.recognize(&image("quick")).await.unwrap();
        assert_eq!(output.text, "fast");
    }

    // Every script is written before the first spawn so no thread forks while one is open for writing.
    #[tokio::test]
    async fn test_process_engine_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_script(dir.path(), "engine.sh", FAKE_ENGINE);
        let broken = write_script(dir.path(), "broken.sh", BROKEN_ENGINE);
        let one_shot = write_script(dir.path(), "one_shot.sh", ONE_SHOT_ENGINE);
        let slow = write_script(dir.path(), "slow.sh", SLOW_ENGINE);
        let timeout = Duration::from_secs(5);

        answers_and_reports_errors(&good, timeout).await;
        missing_library_on_stderr_is_reported(&broken, timeout).await;
        exited_engine_is_restarted(&one_shot, timeout).await;
        abandoned_request_does_not_leak_its_answer(&slow, timeout).await;
        timed_out_engine_is_replaced(&slow).await;
    }
}
