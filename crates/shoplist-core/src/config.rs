use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    errors::Error,
    inference::{EngineParams, SamplingConfig},
    strategy::ReservedCommands,
    Result,
};

const DEFAULT_LLAMA_CLI: &str = "/usr/local/bin/llama-cli";
const DEFAULT_RESERVED_COMMANDS: &str = "/help,/start";

/// Typed runtime configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    // Model
    pub engine: EngineParams,
    pub llama_cli_path: PathBuf,
    pub sampling: SamplingConfig,

    // Assets
    pub system_prompt_path: Option<PathBuf>,
    pub localization_path: Option<PathBuf>,

    pub reserved_commands: ReservedCommands,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = var("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let model_path = var("MODEL_PATH")
            .ok_or_else(|| Error::Config("MODEL_PATH environment variable is required".to_string()))?;
        if model_path.contains('\0') {
            return Err(Error::Config("MODEL_PATH is not a valid path".to_string()));
        }

        let context_size: u32 = parse_var(&var, "MODEL_CONTEXT_SIZE")?.unwrap_or(2048);
        if context_size == 0 {
            return Err(Error::Config("MODEL_CONTEXT_SIZE must be greater than 0".to_string()));
        }
        let gpu_layers: i64 = parse_var(&var, "MODEL_GPU_LAYERS")?.unwrap_or(20);
        let gpu_layer_count = u32::try_from(gpu_layers).map_err(|_| {
            Error::Config(format!(
                "MODEL_GPU_LAYERS must be between 0 and {}, got {gpu_layers}",
                u32::MAX
            ))
        })?;

        let llama_cli_path = var("LLAMA_CLI_PATH")
            .map(PathBuf::from)
            .or_else(|| which_in_path("llama-cli"))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LLAMA_CLI));

        let sampling = sampling_from(&var)?;

        let reserved_commands = ReservedCommands::new(parse_csv(
            var("RESERVED_COMMANDS")
                .as_deref()
                .unwrap_or(DEFAULT_RESERVED_COMMANDS),
        ));

        Ok(Self {
            telegram_bot_token,
            engine: EngineParams {
                model_path: PathBuf::from(model_path),
                context_size,
                gpu_layer_count,
            },
            llama_cli_path,
            sampling,
            system_prompt_path: var("SYSTEM_PROMPT_PATH").map(PathBuf::from),
            localization_path: var("LOCALIZATION_PATH").map(PathBuf::from),
            reserved_commands,
        })
    }
}

fn sampling_from(var: &impl Fn(&str) -> Option<String>) -> Result<SamplingConfig> {
    let d = SamplingConfig::default();

    let max_tokens: i32 = parse_var(var, "INFERENCE_MAX_TOKENS")?.unwrap_or(d.max_tokens);
    if max_tokens <= 0 && max_tokens != -1 {
        return Err(Error::Config(format!(
            "INFERENCE_MAX_TOKENS must be greater than 0 or -1, got {max_tokens}"
        )));
    }

    let frequency_penalty = penalty(var, "INFERENCE_FREQUENCY_PENALTY", d.frequency_penalty)?;
    let presence_penalty = penalty(var, "INFERENCE_PRESENCE_PENALTY", d.presence_penalty)?;

    Ok(SamplingConfig {
        max_tokens,
        anti_prompts: var("INFERENCE_ANTI_PROMPTS")
            .map(|v| parse_csv(&v))
            .unwrap_or(d.anti_prompts),
        repeat_penalty: parse_var(var, "INFERENCE_REPEAT_PENALTY")?.unwrap_or(d.repeat_penalty),
        frequency_penalty,
        presence_penalty,
        penalty_count: parse_var(var, "INFERENCE_PENALTY_COUNT")?.unwrap_or(d.penalty_count),
        penalize_newline: var("INFERENCE_PENALIZE_NEWLINE")
            .map(|v| parse_bool(&v))
            .unwrap_or(d.penalize_newline),
        prevent_eos: var("INFERENCE_PREVENT_EOS")
            .map(|v| parse_bool(&v))
            .unwrap_or(d.prevent_eos),
        temperature: parse_var(var, "INFERENCE_TEMPERATURE")?.unwrap_or(d.temperature),
        top_k: parse_var(var, "INFERENCE_TOP_K")?.unwrap_or(d.top_k),
        typical_p: parse_var(var, "INFERENCE_TYPICAL_P")?.unwrap_or(d.typical_p),
        top_p: parse_var(var, "INFERENCE_TOP_P")?.unwrap_or(d.top_p),
        min_p: parse_var(var, "INFERENCE_MIN_P")?.unwrap_or(d.min_p),
        min_keep: parse_var(var, "INFERENCE_MIN_KEEP")?.unwrap_or(d.min_keep),
    })
}

fn penalty(var: &impl Fn(&str) -> Option<String>, key: &str, default: f32) -> Result<f32> {
    let value: f32 = parse_var(var, key)?.unwrap_or(default);
    if !(-2.0..=2.0).contains(&value) {
        return Err(Error::Config(format!(
            "{key} must be between -2.0 and 2.0, got {value}"
        )));
    }
    Ok(value)
}

/// Parse an optional variable; a present but malformed value is an error.
fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = var(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{key} has invalid value '{raw}': {e}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(binary);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
