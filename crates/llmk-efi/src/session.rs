//! The Session Driver (Component H, §4.H): owns the model instance, the
//! sampling knobs, the governance engine, and the burst/override stack;
//! orchestrates one REPL turn. Config mutation commands touch only this
//! struct's knobs, never the weight buffer (§4.H: "mutate a single
//! config record without touching the weight buffer").

use alloc::string::{String, ToString};

use llmk_engine::{generate, GenConfig, GenResult};
use llmk_governance::{Action, Decision, GovernanceGate, Mode};
use llmk_kernels::{KernelSelector, Kernels};
use uefi::proto::media::file::Directory;

use crate::config::Config;
use crate::error::AppError;
use crate::model::{self, LoadedModel};
use crate::source::FirmwareSource;
use crate::tokenizer::{Tokenizer, TokenizerError};

/// Sampling knobs saved/restored by a `/diopion_burst` override (§4.F
/// "if a burst override is active, decrement its remaining count and
/// restore saved sampling knobs when it reaches zero").
struct BurstOverride {
    turns_remaining: u32,
    saved_top_k: usize,
    saved_temp_milli: i32,
    saved_max_tokens: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub prompt_tokens: usize,
    pub generated_tokens: usize,
    pub turns: u32,
}

pub struct Session {
    model: Option<LoadedModel>,
    tokenizer: Option<Tokenizer>,
    temp_milli: i32,
    top_k: usize,
    max_tokens: usize,
    no_repeat_ngram: usize,
    seed: u64,
    kernel_selector: KernelSelector,
    avx2_supported: bool,
    pub governance: GovernanceGate,
    burst: Option<BurstOverride>,
    pub stats: Stats,
    pub cfg: Config,
}

impl Session {
    pub fn new(avx2_supported: bool, cfg: Config) -> Self {
        let mode = if cfg.oo_enable { Mode::Enforce } else { Mode::Off };
        Session {
            model: None,
            tokenizer: None,
            temp_milli: 800,
            top_k: 40,
            max_tokens: 256,
            no_repeat_ngram: 3,
            seed: 0,
            kernel_selector: KernelSelector::Auto,
            avx2_supported,
            governance: GovernanceGate::new(mode, llmk_governance::Laws::default()),
            burst: None,
            stats: Stats::default(),
            cfg,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn plan_summary(&self) -> Option<(u64, u64, u64)> {
        self.model.as_ref().map(|m| {
            let h = m.plan().hparams;
            (h.dim, h.n_layers, h.vocab)
        })
    }

    /// `/load <path>` (§4.H `load_model`): picks format by magic, builds
    /// the plan, allocates weights + KV cache, and loads the matching
    /// tokenizer. Replaces any previously loaded model.
    pub fn load_model(&mut self, root: &mut Directory, model_path: &str, tokenizer_path: &str) -> Result<(), AppError> {
        let kernels = Kernels::select(self.kernel_selector, self.avx2_supported);

        let file = llmk_firmware::file::open(root, model_path, self.fat83_mode())?;
        let mut source = FirmwareSource::new(file);
        // Always opt into the Q8_0 path when the plan supports it — it's
        // a strict memory win and `materialize_q8_0` already refuses
        // plans with any non-Q8_0 2-D tensor (§4.D).
        let loaded = model::load(&mut source, true, kernels)?;

        let vocab = loaded.plan().hparams.vocab as usize;
        let tok_file = llmk_firmware::file::open(root, tokenizer_path, self.fat83_mode())?;
        let mut tok_source = FirmwareSource::new(tok_file);
        let tokenizer = Tokenizer::load(&mut tok_source, vocab).map_err(tokenizer_error_to_app)?;
        tokenizer.check_vocab_size(vocab).map_err(tokenizer_error_to_app)?;

        self.model = Some(loaded);
        self.tokenizer = Some(tokenizer);
        self.stats = Stats::default();
        Ok(())
    }

    /// `/reset`: clears the KV cache and generated-token history without
    /// unloading the weight buffer (§3 Lifecycle).
    pub fn reset(&mut self) {
        if let Some(model) = self.model.as_mut() {
            model.engine_mut().reset();
        }
    }

    /// `unload_model` (§4.H): frees the weight buffer and tokenizer.
    pub fn unload_model(&mut self) {
        self.model = None;
        self.tokenizer = None;
    }

    pub fn set_temp_milli(&mut self, v: i32) {
        self.temp_milli = v;
    }

    pub fn set_top_k(&mut self, v: usize) {
        self.top_k = v.max(1);
    }

    pub fn set_max_tokens(&mut self, v: usize) {
        self.max_tokens = v;
    }

    pub fn set_kernel_selector(&mut self, sel: KernelSelector) {
        self.kernel_selector = sel;
    }

    pub fn set_governance_mode(&mut self, mode: Mode) {
        self.governance.mode = mode;
    }

    /// `/diopion_burst [turns [tokens [topk [temp_milli]]]]`: temporarily
    /// overrides sampling knobs for `turns` REPL turns, restoring the
    /// prior knobs once the override is exhausted.
    pub fn start_burst(&mut self, turns: u32, tokens: Option<usize>, top_k: Option<usize>, temp_milli: Option<i32>) {
        self.burst = Some(BurstOverride {
            turns_remaining: turns,
            saved_top_k: self.top_k,
            saved_temp_milli: self.temp_milli,
            saved_max_tokens: self.max_tokens,
        });
        if let Some(t) = tokens {
            self.max_tokens = t;
        }
        if let Some(k) = top_k {
            self.top_k = k.max(1);
        }
        if let Some(t) = temp_milli {
            self.temp_milli = t;
        }
    }

    fn end_turn_burst_bookkeeping(&mut self) {
        if let Some(burst) = self.burst.as_mut() {
            burst.turns_remaining = burst.turns_remaining.saturating_sub(1);
            if burst.turns_remaining == 0 {
                self.top_k = burst.saved_top_k;
                self.temp_milli = burst.saved_temp_milli;
                self.max_tokens = burst.saved_max_tokens;
                self.burst = None;
            }
        }
    }

    fn fat83_mode(&self) -> llmk_firmware::file::Fat83Mode {
        if self.cfg.fat83_force {
            llmk_firmware::file::Fat83Mode::ForceAlias
        } else {
            llmk_firmware::file::Fat83Mode::PreferLong
        }
    }

    /// `generate` (§4.H): run one REPL turn against the loaded model.
    pub fn generate(&mut self, prompt: &str, emit: &mut dyn FnMut(&[u8])) -> Result<GenResult, AppError> {
        let tokenizer = self.tokenizer.as_ref().ok_or_else(|| AppError::Tokenizer("no tokenizer loaded".to_string()))?;
        let model = self.model.as_mut().ok_or_else(|| AppError::Firmware("no model loaded".to_string()))?;

        let mut tokens = tokenizer.encode(prompt);
        tokens.insert(0, llmk_engine::BOS_ID);
        self.stats.prompt_tokens += tokens.len();

        let cfg = GenConfig {
            max_gen_tokens: self.max_tokens,
            temperature: self.temp_milli as f32 / 1000.0,
            top_k: self.top_k,
            no_repeat_ngram: self.no_repeat_ngram,
            seed: self.seed,
        };

        let result = generate(model.engine_mut(), &mut tokens, cfg, tokenizer, emit);
        self.stats.generated_tokens += result.generated.len();
        self.stats.turns += 1;
        self.end_turn_burst_bookkeeping();
        Ok(result)
    }

    /// Every side-effecting REPL command must route through here before
    /// acting (§4.H: "All filesystem actions requested by REPL commands
    /// must first call the governance gate"). Returns the decision; the
    /// caller honors it per `mode` (ENFORCE blocks REJECT/FREEZE, TRANSFORM
    /// substitutes `transformed_arg0`, OBSERVE logs only).
    pub fn govern(&mut self, action: Action, arg0: &str, arg1: u32) -> Decision {
        self.governance.decide(action, arg0, arg1)
    }
}

fn tokenizer_error_to_app(e: TokenizerError) -> AppError {
    match e {
        TokenizerError::VocabSizeMismatch { tokenizer, model } => {
            AppError::Tokenizer(alloc::format!("tokenizer vocab {tokenizer} != model vocab {model}"))
        }
        TokenizerError::Corrupt => AppError::Tokenizer("corrupt tokenizer file".to_string()),
    }
}
