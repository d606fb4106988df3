//! Model loading and the self-referential `Engine` handle the session
//! driver keeps alive across turns (§4.H: "owns the model instance, the
//! KV cache...").

use alloc::boxed::Box;

use llmk_engine::Engine;
use llmk_gguf::{build_plan, materialize_f32, materialize_q8_0, supports_q8_0, F32Weights, Plan, Q8_0Weights, Source};
use llmk_kernels::Kernels;

use crate::error::AppError;

const GGUF_MAGIC: [u8; 4] = *b"GGUF";

pub enum WeightsOwned {
    F32(F32Weights),
    Q8_0(Q8_0Weights),
}

impl WeightsOwned {
    fn view(&self) -> llmk_engine::WeightView<'_> {
        match self {
            WeightsOwned::F32(w) => llmk_engine::WeightView::F32(w),
            WeightsOwned::Q8_0(w) => llmk_engine::WeightView::Q8_0(w),
        }
    }
}

struct ModelData {
    plan: Plan,
    weights: WeightsOwned,
}

/// A loaded model plus its running [`Engine`]. `engine` borrows
/// `data.weights` through a transmuted `'static` lifetime.
///
/// SAFETY: `data` is heap-boxed, so its address does not move when
/// `LoadedModel` itself is moved; `engine`'s borrow of `data.weights`
/// stays valid for as long as `data` is alive. Both fields are dropped
/// together in declaration order (`engine` first, `data` after), so the
/// borrow never outlives its target. `engine` is never copied out of
/// this struct or otherwise given a chance to outlive `data`.
pub struct LoadedModel {
    engine: Engine<'static>,
    data: Box<ModelData>,
}

impl LoadedModel {
    pub fn plan(&self) -> &Plan {
        &self.data.plan
    }

    pub fn engine_mut(&mut self) -> &mut Engine<'static> {
        &mut self.engine
    }
}

/// Probe the first four bytes to pick GGUF vs. the legacy headerless
/// `.bin` layout (§4.H, §8 scenario 1).
pub fn load<S: Source + ?Sized>(source: &mut S, prefer_q8_0: bool, kernels: Kernels) -> Result<LoadedModel, AppError> {
    let mut magic = [0u8; 4];
    source.read_exact(&mut magic)?;
    source.seek(0)?;

    if magic != GGUF_MAGIC {
        // §8 scenario 1: legacy `.bin` needs pre-agreed dimensions this
        // loader has no channel to receive, so it always reports the
        // hyperparameter it's missing rather than guessing.
        return Err(AppError::Gguf(llmk_gguf::GgufError::MissingHyperparam("dim (legacy .bin requires out-of-band dims)".into())));
    }

    let plan = build_plan(source)?;
    let weights = if prefer_q8_0 && supports_q8_0(&plan) {
        WeightsOwned::Q8_0(materialize_q8_0(source, &plan)?)
    } else {
        WeightsOwned::F32(materialize_f32(source, &plan)?)
    };

    let data = Box::new(ModelData { plan, weights });
    let view = data.weights.view();
    // SAFETY: see the `LoadedModel` doc comment above.
    let view: llmk_engine::WeightView<'static> = unsafe { core::mem::transmute(view) };
    let engine = Engine::new(&data.plan, view, kernels)?;

    Ok(LoadedModel { engine, data })
}
