//! Candle-based sentence embedding model.
//!
//! Mean pooling over the last hidden state followed by L2 normalization,
//! matching the sentence-transformers pipeline the offline index builder
//! uses, so query vectors land in the same space as the stored passages.

use std::path::Path;
use std::sync::Mutex;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::{
    DevicePreference, EmbeddingConfig, HuggingFaceModelConfig, ModelArchitecture, ModelInfo,
};
use crate::error::{ModelError, ModelResult};
use crate::EmbeddingModel;

enum Encoder {
    Bert(BertModel),
    Roberta(XLMRobertaModel),
}

impl Encoder {
    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        match self {
            Encoder::Bert(model) => model.forward(input_ids, token_type_ids, Some(attention_mask)),
            Encoder::Roberta(model) => {
                model.forward(input_ids, attention_mask, token_type_ids, None, None, None)
            }
        }
    }
}

/// Candle embedding model for BERT and XLM-RoBERTa checkpoints.
pub struct CandleEmbeddingModel {
    model_info: ModelInfo,
    encoder: Mutex<Encoder>,
    tokenizer: Tokenizer,
    device: Device,
    batch_size: usize,
}

impl std::fmt::Debug for CandleEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleEmbeddingModel")
            .field("model_id", &self.model_info.model_id)
            .field("dimension", &self.model_info.dimension)
            .field("device", &self.device.location())
            .finish()
    }
}

// Device handles for Metal/CUDA are not marked Send/Sync by candle; all
// access to the encoder goes through the mutex.
unsafe impl Send for CandleEmbeddingModel {}
unsafe impl Sync for CandleEmbeddingModel {}

impl CandleEmbeddingModel {
    pub fn new(config: &EmbeddingConfig) -> ModelResult<Self> {
        let model_path = config.effective_model_path();
        if !model_path.exists() {
            return Err(ModelError::ModelNotFound {
                model_id: config.model_id.clone(),
                path: model_path,
            });
        }

        let hf_config = read_hf_config(&model_path)?;
        let architecture = hf_config.infer_architecture();
        let dimension = hf_config.hidden_size;
        if dimension == 0 {
            return Err(ModelError::InvalidConfig {
                message: format!("hidden_size missing in {}", model_path.display()),
            });
        }
        let max_seq_len = config
            .max_sequence_length
            .min(hf_config.max_position_embeddings);

        info!(
            model_id = %config.model_id,
            path = %model_path.display(),
            arch = %architecture,
            dimension,
            "loading embedding model"
        );

        let tokenizer = load_tokenizer(&model_path, architecture, max_seq_len)?;
        let device = select_device(config.device)?;
        let encoder = load_encoder(&model_path, architecture, &device)?;

        Ok(Self {
            model_info: ModelInfo::new(&config.model_id, dimension, max_seq_len)
                .with_architecture(architecture),
            encoder: Mutex::new(encoder),
            tokenizer,
            device,
            batch_size: config.batch_size.max(1),
        })
    }

    fn fail(&self, err: impl std::fmt::Display) -> ModelError {
        ModelError::embedding_failed(&self.model_info.model_id, err.to_string())
    }

    fn embed_chunk(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ModelError::tokenization(e.to_string()))?;

        let rows = encodings.len();
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);

        let ids: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_ids().iter().copied())
            .collect();
        let mask: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().iter().copied())
            .collect();

        let ids = Tensor::from_vec(ids, (rows, seq_len), &self.device).map_err(|e| self.fail(e))?;
        let mask =
            Tensor::from_vec(mask, (rows, seq_len), &self.device).map_err(|e| self.fail(e))?;
        let type_ids = ids.zeros_like().map_err(|e| self.fail(e))?;

        let hidden = {
            let encoder = self.encoder.lock().map_err(|e| self.fail(e))?;
            encoder
                .forward(&ids, &type_ids, &mask)
                .map_err(|e| self.fail(format!("forward failed: {e}")))?
        };

        let pooled = mean_pool(&hidden, &mask).map_err(|e| self.fail(e))?;
        let normalized = l2_normalize(&pooled).map_err(|e| self.fail(e))?;
        normalized.to_vec2::<f32>().map_err(|e| self.fail(e))
    }
}

impl EmbeddingModel for CandleEmbeddingModel {
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            debug!(batch = chunk.len(), "embedding batch");
            out.extend(self.embed_chunk(chunk)?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.model_info.dimension
    }

    fn max_sequence_length(&self) -> usize {
        self.model_info.max_seq_len
    }

    fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }
}

// ============================================================================
// Loading
// ============================================================================

fn read_hf_config(model_path: &Path) -> ModelResult<HuggingFaceModelConfig> {
    let config_path = model_path.join("config.json");
    if !config_path.exists() {
        return Err(ModelError::model_load(
            model_path.display().to_string(),
            "config.json not found",
        ));
    }
    let content = std::fs::read_to_string(&config_path)?;
    Ok(serde_json::from_str(&content)?)
}

fn load_tokenizer(
    model_path: &Path,
    architecture: ModelArchitecture,
    max_length: usize,
) -> ModelResult<Tokenizer> {
    let tokenizer_path = model_path.join("tokenizer.json");
    let load_err = |e: &dyn std::fmt::Display| {
        ModelError::model_load(model_path.display().to_string(), e.to_string())
    };

    let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| load_err(&e))?;

    let (pad_id, pad_token) = match architecture {
        ModelArchitecture::Roberta | ModelArchitecture::Mpnet => (1, "<pad>"),
        ModelArchitecture::Bert | ModelArchitecture::Unknown => (0, "[PAD]"),
    };
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token: pad_token.to_string(),
        ..Default::default()
    }));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| load_err(&e))?;

    Ok(tokenizer)
}

fn load_encoder(
    model_path: &Path,
    architecture: ModelArchitecture,
    device: &Device,
) -> ModelResult<Encoder> {
    let weights_path = model_path.join("model.safetensors");
    if !weights_path.exists() {
        return Err(ModelError::model_load(
            model_path.display().to_string(),
            "model.safetensors not found",
        ));
    }
    let load_err =
        |e: candle_core::Error| ModelError::model_load(model_path.display().to_string(), e.to_string());

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, device).map_err(load_err)?
    };
    let raw_config = std::fs::read_to_string(model_path.join("config.json"))?;

    match architecture {
        ModelArchitecture::Bert | ModelArchitecture::Unknown => {
            let config: BertConfig = serde_json::from_str(&raw_config)?;
            Ok(Encoder::Bert(BertModel::load(vb, &config).map_err(load_err)?))
        }
        ModelArchitecture::Roberta | ModelArchitecture::Mpnet => {
            let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
            Ok(Encoder::Roberta(
                XLMRobertaModel::new(&config, vb).map_err(load_err)?,
            ))
        }
    }
}

fn select_device(pref: DevicePreference) -> ModelResult<Device> {
    match pref {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Auto => Ok(try_gpu().unwrap_or_else(|| {
            info!("using CPU for embeddings");
            Device::Cpu
        })),
        DevicePreference::Gpu => try_gpu().ok_or_else(|| ModelError::DeviceNotAvailable {
            reason: if cfg!(any(feature = "metal", feature = "cuda")) {
                "no usable GPU was found on this system".to_string()
            } else {
                "nailbot was built without GPU support; rebuild with --features metal or --features cuda"
                    .to_string()
            },
        }),
    }
}

fn try_gpu() -> Option<Device> {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("using Metal GPU for embeddings");
                return Some(device);
            }
            Err(e) => debug!("Metal not available: {}", e),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("using CUDA GPU for embeddings");
                return Some(device);
            }
            Err(e) => debug!("CUDA not available: {}", e),
        }
    }

    None
}

// ============================================================================
// Pooling
// ============================================================================

fn mean_pool(hidden: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = mask
        .unsqueeze(2)?
        .to_dtype(DType::F32)?
        .broadcast_as(hidden.shape())?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    summed.broadcast_div(&counts)
}

fn l2_normalize(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    let norm = embeddings
        .sqr()?
        .sum_keepdim(1)?
        .sqrt()?
        .clamp(1e-12, f64::MAX)?;
    embeddings.broadcast_div(&norm)
}
