//! llama.cpp adapter.
//!
//! Runs one `llama-cli` process per generation and streams its stdout as
//! text fragments. The model file and sampling flags come from
//! [`EngineParams`] and [`SamplingConfig`].

use std::{collections::VecDeque, path::PathBuf, process::Stdio, sync::Arc};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use shoplist_core::{
    errors::Error,
    inference::{EngineParams, InferenceEngine, SamplingConfig, TokenStream},
    Result,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::{Child, ChildStdout, Command},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STDERR_TAIL_MAX_BYTES: usize = 16 * 1024;
const STDERR_TAIL_MAX_LINES: usize = 200;
const READ_CHUNK: usize = 4096;

#[derive(Clone, Debug)]
pub struct LlamaCliConfig {
    pub program: PathBuf,
    pub params: EngineParams,
}

/// Program and arguments for one generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

pub fn build_invocation(cfg: &LlamaCliConfig, prompt: &str, sampling: &SamplingConfig) -> Invocation {
    let p = &cfg.params;
    let mut args: Vec<String> = vec![
        "-m".into(),
        p.model_path.to_string_lossy().into_owned(),
        "-c".into(),
        p.context_size.to_string(),
        "-ngl".into(),
        p.gpu_layer_count.to_string(),
        "-n".into(),
        sampling.max_tokens.to_string(),
        "--temp".into(),
        sampling.temperature.to_string(),
        "--top-k".into(),
        sampling.top_k.to_string(),
        "--top-p".into(),
        sampling.top_p.to_string(),
        "--min-p".into(),
        sampling.min_p.to_string(),
        "--typical".into(),
        sampling.typical_p.to_string(),
        "--repeat-penalty".into(),
        sampling.repeat_penalty.to_string(),
        "--repeat-last-n".into(),
        sampling.penalty_count.to_string(),
        "--presence-penalty".into(),
        sampling.presence_penalty.to_string(),
        "--frequency-penalty".into(),
        sampling.frequency_penalty.to_string(),
    ];
    if sampling.penalize_newline {
        args.push("--penalize-nl".into());
    }
    if sampling.prevent_eos {
        args.push("--ignore-eos".into());
    }
    for anti in &sampling.anti_prompts {
        args.push("-r".into());
        args.push(anti.clone());
    }
    args.extend(
        ["-no-cnv", "--no-display-prompt", "--simple-io", "-p"]
            .into_iter()
            .map(String::from),
    );
    args.push(prompt.to_string());

    Invocation {
        program: cfg.program.clone(),
        args,
    }
}

/// [`InferenceEngine`] backed by the `llama-cli` binary.
#[derive(Debug)]
pub struct LlamaCliEngine {
    cfg: LlamaCliConfig,
    disposed: bool,
}

impl LlamaCliEngine {
    /// Validate the model and binary paths. The weights are mapped by each
    /// `llama-cli` run, so nothing stays resident between requests.
    pub fn load(cfg: LlamaCliConfig) -> Result<Self> {
        let model = &cfg.params.model_path;
        if !model.is_file() {
            return Err(Error::Config(format!(
                "model file not found: {}",
                model.display()
            )));
        }
        if cfg.program.is_absolute() && !cfg.program.is_file() {
            return Err(Error::Config(format!(
                "llama-cli not found at {}",
                cfg.program.display()
            )));
        }
        info!(
            model = %model.display(),
            program = %cfg.program.display(),
            context_size = cfg.params.context_size,
            gpu_layers = cfg.params.gpu_layer_count,
            "llama engine ready"
        );
        Ok(Self {
            cfg,
            disposed: false,
        })
    }
}

#[async_trait]
impl InferenceEngine for LlamaCliEngine {
    async fn generate(
        &mut self,
        prompt: &str,
        sampling: &SamplingConfig,
        cancel: CancellationToken,
    ) -> Result<TokenStream> {
        if self.disposed {
            return Err(Error::External("llama engine was disposed".to_string()));
        }

        let inv = build_invocation(&self.cfg, prompt, sampling);
        let mut cmd = Command::new(&inv.program);
        cmd.args(&inv.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::External(format!(
                "failed to start {}: {e}",
                inv.program.display()
            ))
        })?;
        debug!(pid = child.id(), "llama-cli started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::External("llama-cli stdout was not captured".to_string()))?;

        // Drain stderr in background to avoid blocking on a full pipe.
        let stderr_tail = Arc::new(Mutex::new(StderrTail::default()));
        if let Some(stderr) = child.stderr.take() {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut r = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tail.lock().await.push_line(line);
                }
            });
        }

        let run = Run {
            child,
            stdout,
            stderr_tail,
            cancel,
            pending: Vec::new(),
            done: false,
        };
        let fragments = stream::unfold(run, |mut run| async move {
            let item = run.next_fragment().await?;
            Some((item, run))
        });
        Ok(fragments.boxed())
    }

    async fn dispose(&mut self) -> Result<()> {
        self.disposed = true;
        Ok(())
    }
}

/// One running `llama-cli` process.
struct Run {
    child: Child,
    stdout: ChildStdout,
    stderr_tail: Arc<Mutex<StderrTail>>,
    cancel: CancellationToken,
    /// Bytes of a UTF-8 sequence split across reads.
    pending: Vec<u8>,
    done: bool,
}

impl Run {
    async fn next_fragment(&mut self) -> Option<Result<String>> {
        if self.done {
            return None;
        }
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.done = true;
                    if let Err(e) = kill_child(&mut self.child).await {
                        warn!(error = %e, "failed to kill llama-cli");
                    }
                    return Some(Err(Error::Cancelled));
                }
                read = self.stdout.read(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    self.done = true;
                    return self.finish().await;
                }
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    if let Some(text) = take_utf8(&mut self.pending) {
                        return Some(Ok(text));
                    }
                }
                Err(e) => {
                    self.done = true;
                    if let Err(kill_e) = kill_child(&mut self.child).await {
                        warn!(error = %kill_e, "failed to kill llama-cli");
                    }
                    return Some(Err(Error::Io(e)));
                }
            }
        }
    }

    /// Reap the process after stdout closed.
    async fn finish(&mut self) -> Option<Result<String>> {
        let status = match self.child.wait().await {
            Ok(status) => status,
            Err(e) => return Some(Err(Error::Io(e))),
        };
        debug!(%status, "llama-cli exited");

        if !status.success() {
            let stderr = self.stderr_tail.lock().await.snapshot();
            let mut msg = format!("llama-cli exited with status {status}");
            if !stderr.trim().is_empty() {
                msg.push_str("\nstderr (tail):\n");
                msg.push_str(&stderr);
            }
            return Some(Err(Error::External(msg)));
        }

        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(Ok(String::from_utf8_lossy(&rest).into_owned()))
    }
}

/// Split off the longest decodable prefix of `pending`.
///
/// An incomplete sequence at the end stays buffered for the next read;
/// genuinely invalid bytes are replaced.
fn take_utf8(pending: &mut Vec<u8>) -> Option<String> {
    let cut = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    if cut == 0 {
        return None;
    }
    let rest = pending.split_off(cut);
    let chunk = std::mem::replace(pending, rest);
    Some(String::from_utf8_lossy(&chunk).into_owned())
}

async fn kill_child(child: &mut Child) -> Result<()> {
    // If it's already exited, `try_wait` reaps it.
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    match child.kill().await {
        Ok(()) => Ok(()),
        Err(e) => {
            // Exited between `try_wait` and `kill`.
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            Err(Error::Io(e))
        }
    }
}

#[derive(Clone, Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push_line(&mut self, line: String) {
        // +1 for the '\n' we join with later.
        self.bytes = self.bytes.saturating_add(line.len() + 1);
        self.lines.push_back(line);

        while self.lines.len() > STDERR_TAIL_MAX_LINES || self.bytes > STDERR_TAIL_MAX_BYTES {
            if let Some(front) = self.lines.pop_front() {
                self.bytes = self.bytes.saturating_sub(front.len() + 1);
            } else {
                break;
            }
        }
    }

    fn snapshot(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(program: &str) -> LlamaCliConfig {
        LlamaCliConfig {
            program: PathBuf::from(program),
            // Any existing file passes the load check.
            params: EngineParams {
                model_path: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml")),
                context_size: 1024,
                gpu_layer_count: 0,
            },
        }
    }

    #[test]
    fn invocation_carries_sampling_flags() {
        let sampling = SamplingConfig {
            anti_prompts: vec!["User:".to_string()],
            prevent_eos: true,
            ..SamplingConfig::default()
        };
        let inv = build_invocation(&cfg("llama-cli"), "milk, bread", &sampling);

        let pair = |flag: &str| {
            let i = inv.args.iter().position(|a| a == flag).unwrap();
            inv.args[i + 1].clone()
        };
        assert_eq!(pair("-c"), "1024");
        assert_eq!(pair("-ngl"), "0");
        assert_eq!(pair("-n"), "2048");
        assert_eq!(pair("--top-k"), "40");
        assert_eq!(pair("--repeat-last-n"), "64");
        assert_eq!(pair("-r"), "User:");
        assert!(inv.args.contains(&"--ignore-eos".to_string()));
        assert!(!inv.args.contains(&"--penalize-nl".to_string()));
        assert_eq!(inv.args.last().unwrap(), "milk, bread");
        assert_eq!(inv.args[inv.args.len() - 2], "-p");
    }

    #[test]
    fn load_requires_model_file() {
        let mut c = cfg("llama-cli");
        c.params.model_path = PathBuf::from("/nonexistent/model.gguf");
        let err = LlamaCliEngine::load(c).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn utf8_split_across_reads_is_held_back() {
        let bytes = "хлеб".as_bytes();
        let mut pending = bytes[..3].to_vec();
        assert_eq!(take_utf8(&mut pending).as_deref(), Some("х"));
        assert_eq!(pending, bytes[2..3]);

        pending.extend_from_slice(&bytes[3..]);
        assert_eq!(take_utf8(&mut pending).as_deref(), Some("леб"));
        assert!(pending.is_empty());
        assert_eq!(take_utf8(&mut pending), None);
    }

    #[test]
    fn stderr_tail_is_bounded() {
        let mut tail = StderrTail::default();
        for i in 0..(STDERR_TAIL_MAX_LINES + 10) {
            tail.push_line(format!("line {i}"));
        }
        assert_eq!(tail.lines.len(), STDERR_TAIL_MAX_LINES);
        assert!(tail.snapshot().ends_with(&format!("line {}", STDERR_TAIL_MAX_LINES + 9)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_process_stdout() {
        // `echo` prints its arguments, which end with the prompt.
        let mut engine = LlamaCliEngine::load(cfg("echo")).unwrap();
        let stream = engine
            .generate("[\"milk\"]", &SamplingConfig::default(), CancellationToken::new())
            .await
            .unwrap();
        let out: Vec<Result<String>> = stream.collect().await;
        let text: String = out.into_iter().map(|f| f.unwrap()).collect();
        assert!(text.trim_end().ends_with("-p [\"milk\"]"), "{text}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_process_is_an_error() {
        let mut engine = LlamaCliEngine::load(cfg("false")).unwrap();
        let stream = engine
            .generate("x", &SamplingConfig::default(), CancellationToken::new())
            .await
            .unwrap();
        let out: Vec<Result<String>> = stream.collect().await;
        assert!(matches!(out.last(), Some(Err(Error::External(_)))));
    }

    /// Executable that ignores its arguments and prints forever.
    #[cfg(unix)]
    fn endless_program(dir: &tempfile::TempDir) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("endless-llama");
        std::fs::write(&path, "#!/bin/sh\nwhile :; do echo x; sleep 0.01; done\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_kills_endless_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = endless_program(&dir);
        let mut engine = LlamaCliEngine::load(cfg(program.to_str().unwrap())).unwrap();
        let cancel = CancellationToken::new();
        let mut stream = engine
            .generate("x", &SamplingConfig::default(), cancel.clone())
            .await
            .unwrap();

        assert!(stream.next().await.unwrap().unwrap().starts_with('x'));
        cancel.cancel();

        let rest = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            stream.collect::<Vec<_>>(),
        )
        .await
        .expect("stream did not end after cancel");
        assert!(matches!(rest.as_slice(), [Err(e)] if e.is_cancelled()), "{rest:?}");
    }

    #[tokio::test]
    async fn disposed_engine_refuses_work() {
        let mut engine = LlamaCliEngine::load(cfg("echo")).unwrap();
        engine.dispose().await.unwrap();
        let err = engine
            .generate("x", &SamplingConfig::default(), CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::External(_)));
    }
}
