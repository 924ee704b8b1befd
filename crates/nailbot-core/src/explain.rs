//! Prediction explanations on top of retrieval.
//!
//! Given a classifier prediction and an optional user question, the
//! [`Explainer`] retrieves context, builds a generation prompt and asks a
//! [`GenerationBackend`] for the answer. Every failure degrades to a fixed
//! Indonesian template built from the retrieved context, so `explain` always
//! returns text.
//!
//! Sections of the answer, in order:
//!
//! 1. (optional) answer to the user's question
//! 2. prediction and description
//! 3. why the model predicts this category
//! 4. causes
//! 5. prevention
//! 6. disclaimer
//! 7. sources

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RetrievalDefaults;
use crate::context::{ContextFormatter, FormattedContext};
use crate::errors::RagResult;
use crate::labels::NailLabel;
use crate::retrieval::{retrieve_smart_with_report, RetrievalOptions};
use crate::retrieval_context::RetrievalContext;

// ============================================================================
// Constants
// ============================================================================

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for nail health imagery. \
Answer in Bahasa Indonesia, concise, non-diagnostic, empathetic. \
Use ONLY the provided context blocks; if info is missing, say you don't know. \
Always include a brief disclaimer. \
Cite sources with bracketed indices like [L1], [S1] matching the provided context.";

/// Retrieval query used when the user asked nothing.
pub const DEFAULT_QUERY: &str = "Jelaskan secara non-diagnostik";

pub const DISCLAIMER: &str = "Informasi ini bersifat edukasi dan bukan diagnosis medis.";

/// Number of class probabilities passed to the generator.
pub const TOP_PROBS: usize = 6;

const SECTION_QUESTION: &str = "1. (opsional) Tanggapan atas pertanyaan pengguna";
const SECTION_PREDICTION: &str = "2. Hasil prediksi dan deskripsi";
const SECTION_REASON: &str = "3. Mengapa model memperkirakan kategori ini";
const SECTION_CAUSE: &str = "4. Penyebab";
const SECTION_PREVENTION: &str = "5. Pencegahan";
const SECTION_DISCLAIMER: &str = "6. Disclaimer";
const SECTION_SOURCES: &str = "7. Sumber";

const SECTION_RULES: &str = "\
- Tulis **judul seksi persis** seperti di bawah, dalam bahasa Indonesia.
- Ikuti urutan. Jangan menambah atau mengubah nama seksi.
- Jika seksi pertama ditandai *(opsional)* dan prompt kosong/tidak relevan, **jangan tampilkan** seksi itu.
- Gunakan kalimat ringkas; hindari diagnosis pasti; beri sitasi [Lx]/[Sx] pada pernyataan berbasis fakta.
- Batasan: 3–5 kalimat per seksi (kecuali 'Sumber').
";

const OFF_DOMAIN_RULES: &str = "\
- PROMPT PENGGUNA TERDETEKSI TIDAK RELEVAN DENGAN DOMAIN KUKU.
- Tambahkan SATU kalimat di seksi pertama yang menyatakan ketidak-sesuaian prompt dan bahwa jawaban difokuskan pada hasil analisis kuku.
- Abaikan bagian prompt yang tidak relevan di seksi-seksi berikutnya.
";

const INTENT_RULES: &str = "\
- Jika intent=danger: tekankan tingkat risiko & red flags dari KONTEN.
- Jika intent=care: fokus pada perawatan non-diagnostik & kapan perlu evaluasi tenaga kesehatan.
- Jika intent=cause: paparkan kemungkinan penyebab umum, non-diagnostik.
- Jika intent=diagnosis_request: tekankan ini bukan diagnosis; jelaskan apa yang model lihat.
";

const SECTION_HINTS: &str = "\
- 2. Hasil prediksi dan deskripsi: sebut label prediksi dan keyakinan (persen), lalu deskripsi visual ringkas [Lx].
- 3. Mengapa model memperkirakan kategori ini: jelaskan pola/fitur yang cocok menurut KONTEN [Lx]/[Sx].
- 4. Penyebab: kemungkinan penyebab **umum** terkait temuan (non-diagnostik) [Sx] bila tersedia.
- 5. Pencegahan: kebiasaan/perawatan umum & kapan perlu evaluasi; sebut red flags bila ada [Lx]/[Sx].
- 6. Disclaimer: tekankan edukasi, bukan diagnosis medis.
- 7. Sumber: cantumkan [Lx]/[Sx] yang benar-benar dipakai.
";

const OFF_DOMAIN_NOTE: &str = "Catatan: prompt yang Anda masukkan tampaknya tidak terkait dengan \
domain kuku; jawaban berikut difokuskan pada hasil analisis kuku. ";

/// Nail vocabulary, Indonesian and English.
pub const NAIL_KEYWORDS: &[&str] = &[
    "kuku",
    "ujung jari",
    "pelat kuku",
    "lempeng kuku",
    "lunula",
    "matriks kuku",
    "kutikula",
    "kulit kuku",
    "punggung kuku",
    "dasar kuku",
    "clubbing",
    "pitting",
    "melanonychia",
    "paronychia",
    "subungual",
    "hiperkeratosis",
    "onikolisis",
    "onychodystrophy",
    "koilonychia",
    "nail",
    "fingertip",
    "nail bed",
    "nail plate",
    "nail matrix",
    "cuticle",
    "onycholysis",
    "onycho",
    "onychauxis",
    "onychosis",
];

// ============================================================================
// Intent and domain detection
// ============================================================================

/// Coarse intent of the user's question, used to steer emphasis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Danger,
    Care,
    Cause,
    DiagnosisRequest,
    Other,
}

const DANGER_KEYWORDS: &[&str] = &[
    "bahaya", "berbahaya", "parah", "gawat", "darurat", "urgent", "emergency", "danger", "severe",
];
const CARE_KEYWORDS: &[&str] = &[
    "obat",
    "rawat",
    "perawatan",
    "obati",
    "tindakan",
    "apa yang harus",
    "home care",
    "treatment",
];
const CAUSE_KEYWORDS: &[&str] = &[
    "penyebab", "kenapa", "mengapa", "sebab", "etiologi", "cause", "trigger",
];
const DIAGNOSIS_KEYWORDS: &[&str] = &[
    "diagnosa",
    "diagnosis",
    "apakah ini penyakit",
    "apa penyakit",
    "ini apa",
    "penyakit apa",
    "hasilnya apa",
];

impl Intent {
    /// Keyword match on the lowercased prompt. The first matching intent in
    /// declaration order wins.
    pub fn detect(prompt: &str) -> Self {
        let p = prompt.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| p.contains(w));

        if has_any(DANGER_KEYWORDS) {
            Intent::Danger
        } else if has_any(CARE_KEYWORDS) {
            Intent::Care
        } else if has_any(CAUSE_KEYWORDS) {
            Intent::Cause
        } else if has_any(DIAGNOSIS_KEYWORDS) {
            Intent::DiagnosisRequest
        } else {
            Intent::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Danger => "danger",
            Intent::Care => "care",
            Intent::Cause => "cause",
            Intent::DiagnosisRequest => "diagnosis_request",
            Intent::Other => "other",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the prompt is about nails.
///
/// An empty prompt counts as on-domain. Otherwise the lowercased prompt must
/// contain nail vocabulary, a known label or alias, or one of `extra_labels`.
pub fn is_nail_domain(prompt: &str, extra_labels: &[&str]) -> bool {
    let p = prompt.trim().to_lowercase();
    if p.is_empty() {
        return true;
    }
    if NAIL_KEYWORDS.iter().any(|kw| p.contains(kw)) {
        return true;
    }

    let known = NailLabel::ALL.iter().flat_map(|label| {
        std::iter::once(label.as_str())
            .chain(label.aliases().iter().copied())
            // Acronyms like "ALM" occur inside ordinary words
            .filter(|term| term.chars().count() > 3)
    });
    known
        .chain(extra_labels.iter().copied())
        .map(|term| term.trim().to_lowercase().replace('_', " "))
        .any(|term| !term.is_empty() && p.contains(&term))
}

/// Percentage with one decimal and a decimal comma: `0.912` -> `"91,2%"`.
pub fn format_confidence_id(confidence: f32) -> String {
    format!("{:.1}%", confidence * 100.0).replace('.', ",")
}

// ============================================================================
// Prediction and request
// ============================================================================

/// Classifier output for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub label: String,
    /// Probability of `label`, in `[0, 1]`.
    pub confidence: f32,
    /// Probability per class.
    #[serde(default)]
    pub probs: BTreeMap<String, f32>,
}

/// One entry of [`Prediction::top_probs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelProb {
    pub label: String,
    pub p: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            probs: BTreeMap::new(),
        }
    }

    pub fn with_probs<I, S>(mut self, probs: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        self.probs = probs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    /// The `n` most probable classes, highest first. Ties keep label order.
    pub fn top_probs(&self, n: usize) -> Vec<LabelProb> {
        let mut entries: Vec<LabelProb> = self
            .probs
            .iter()
            .map(|(label, &p)| LabelProb {
                label: label.clone(),
                p,
            })
            .collect();
        entries.sort_by(|a, b| b.p.total_cmp(&a.p));
        entries.truncate(n);
        entries
    }
}

/// A prediction plus the user's optional question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationRequest {
    pub prediction: Prediction,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ExplanationRequest {
    pub fn new(prediction: Prediction) -> Self {
        Self {
            prediction,
            prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// The question as given, or `""`.
    pub fn question(&self) -> &str {
        self.prompt.as_deref().unwrap_or("")
    }

    pub fn has_question(&self) -> bool {
        !self.question().trim().is_empty()
    }

    /// Query fed to smart retrieval.
    pub fn retrieval_query(&self) -> String {
        let base = if self.has_question() {
            self.question()
        } else {
            DEFAULT_QUERY
        };
        format!("{} | label: {}", base, self.prediction.label)
    }

    pub fn intent(&self) -> Intent {
        Intent::detect(self.question())
    }

    /// Whether the question is about nails; the predicted and scored labels
    /// count as nail vocabulary.
    pub fn on_domain(&self) -> bool {
        let labels: Vec<&str> = std::iter::once(self.prediction.label.as_str())
            .chain(self.prediction.probs.keys().map(String::as_str))
            .collect();
        is_nail_domain(self.question(), &labels)
    }
}

// ============================================================================
// Generation prompt
// ============================================================================

#[derive(Serialize)]
struct UserPayload<'a> {
    label: &'a str,
    confidence: String,
    confidence_str: String,
    question: &'a str,
    top_probs: Vec<LabelProb>,
    prompt_on_domain: bool,
}

/// Assemble the full generation prompt for `request` over `context`.
pub fn build_generation_prompt(request: &ExplanationRequest, context: &str) -> RagResult<String> {
    let prediction = &request.prediction;
    let on_domain = request.on_domain();
    let payload = UserPayload {
        label: &prediction.label,
        confidence: format!("{:.3}", prediction.confidence),
        confidence_str: format_confidence_id(prediction.confidence),
        question: request.question(),
        top_probs: prediction.top_probs(TOP_PROBS),
        prompt_on_domain: on_domain,
    };
    let user_json = serde_json::to_string(&payload)?;

    let mut prompt = String::with_capacity(SYSTEM_PROMPT.len() + context.len() + 2048);
    prompt.push_str(SYSTEM_PROMPT);
    prompt.push_str("\n\n=== KONTEN ===\n");
    prompt.push_str(context);
    prompt.push_str("\n\n=== USER ===\n");
    prompt.push_str(&user_json);
    prompt.push_str("\n\n=== INTENT TERDETEKSI ===\n");
    let _ = writeln!(prompt, "- intent: {}", request.intent());
    prompt.push_str(INTENT_RULES);

    prompt.push_str("\n=== ATURAN FORMAT ===\n");
    prompt.push_str(SECTION_RULES);
    if !on_domain {
        prompt.push('\n');
        prompt.push_str(OFF_DOMAIN_RULES);
    }

    prompt.push_str("\n=== DAFTAR SEKSI (WAJIB DIIKUTI) ===\n");
    let outline: Vec<String> = outline(request.has_question())
        .map(|section| format!("- {}", section))
        .collect();
    prompt.push_str(&outline.join("\n"));

    prompt.push_str("\n\n=== PETUNJUK ISI PER SEKSI ===\n");
    prompt.push_str(SECTION_HINTS);
    Ok(prompt)
}

fn outline(with_question: bool) -> impl Iterator<Item = &'static str> {
    with_question
        .then_some(SECTION_QUESTION)
        .into_iter()
        .chain([
            SECTION_PREDICTION,
            SECTION_REASON,
            SECTION_CAUSE,
            SECTION_PREVENTION,
            SECTION_DISCLAIMER,
            SECTION_SOURCES,
        ])
}

// ============================================================================
// Generation backend
// ============================================================================

/// Text generator (LLM) turning a prompt into an answer.
pub trait GenerationBackend: Send + Sync {
    fn generate(&self, prompt: &str) -> RagResult<String>;
}

// ============================================================================
// Explainer
// ============================================================================

/// Retrieval-grounded explanation of a prediction.
#[derive(Debug, Clone)]
pub struct Explainer {
    options: RetrievalOptions,
    max_chars: usize,
    formatter: ContextFormatter,
}

impl Default for Explainer {
    fn default() -> Self {
        Self::from_defaults(&RetrievalDefaults::default())
    }
}

impl Explainer {
    pub fn from_defaults(defaults: &RetrievalDefaults) -> Self {
        Self {
            options: RetrievalOptions::from_defaults(defaults),
            max_chars: defaults.max_chars,
            formatter: ContextFormatter::default(),
        }
    }

    pub fn with_options(mut self, options: RetrievalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_formatter(mut self, formatter: ContextFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Retrieve and format context for `request`.
    ///
    /// Without a retrieval context, or when retrieval fails, this is the
    /// "no relevant context" result.
    pub fn gather_context(
        &self,
        ctx: Option<&RetrievalContext>,
        request: &ExplanationRequest,
    ) -> FormattedContext {
        let Some(ctx) = ctx else {
            return FormattedContext::empty();
        };

        let query = request.retrieval_query();
        match retrieve_smart_with_report(ctx, &query, Some(&request.prediction.label), &self.options)
        {
            Ok(report) => {
                debug!(
                    hits = report.hits.len(),
                    elapsed_ms = report.elapsed_ms,
                    "retrieved explanation context"
                );
                self.formatter.format(&report.hits, self.max_chars)
            }
            Err(e) => {
                warn!(error = %e, "retrieval failed, explaining without context");
                FormattedContext::empty()
            }
        }
    }

    /// Explain `request`: retrieve, then generate or fall back.
    pub fn explain(
        &self,
        ctx: Option<&RetrievalContext>,
        generator: Option<&dyn GenerationBackend>,
        request: &ExplanationRequest,
    ) -> String {
        let context = self.gather_context(ctx, request);
        self.explain_with_context(generator, request, &context)
    }

    /// Explain `request` over an already formatted context.
    pub fn explain_with_context(
        &self,
        generator: Option<&dyn GenerationBackend>,
        request: &ExplanationRequest,
        context: &FormattedContext,
    ) -> String {
        let Some(generator) = generator else {
            return full_fallback(request, context);
        };

        let answer = build_generation_prompt(request, &context.context)
            .and_then(|prompt| generator.generate(&prompt));
        let text = match answer {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("generator returned empty text, using fallback template");
                short_fallback(
                    request,
                    context,
                    "Tidak ada respons dari LLM, gunakan konteks di bawah.",
                )
            }
            Err(e) => {
                warn!(error = %e, "generation failed, using fallback template");
                short_fallback(
                    request,
                    context,
                    "Terjadi kendala RAG/LLM, gunakan konteks di bawah.",
                )
            }
        };
        append_sources(text, &context.references)
    }
}

// ============================================================================
// Fallback templates
// ============================================================================

fn heading(section: &str) -> String {
    format!("**{}**", section)
}

fn prediction_line(prediction: &Prediction) -> String {
    format!(
        "Model memperkirakan *{}* (keyakinan {:.1}%).",
        prediction.label,
        prediction.confidence * 100.0
    )
}

fn source_lines(references: &[String]) -> String {
    references
        .iter()
        .map(|r| format!("- {}", r))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Template used when no generator is configured.
fn full_fallback(request: &ExplanationRequest, context: &FormattedContext) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(8);

    if request.has_question() {
        let note = if request.on_domain() { "" } else { OFF_DOMAIN_NOTE };
        parts.push(format!(
            "{}\n{}Pertanyaan Anda telah dicatat. Lihat bagian di bawah untuk konteks dan langkah aman.",
            heading(SECTION_QUESTION),
            note
        ));
    }
    parts.push(format!(
        "{}\n{}\n",
        heading(SECTION_PREDICTION),
        prediction_line(&request.prediction)
    ));
    parts.push(format!(
        "{}\nLihat ringkasan pada konteks yang ditemukan di bawah.",
        heading(SECTION_REASON)
    ));
    parts.push(format!(
        "{}\nKemungkinan bervariasi; butuh konteks klinis tambahan.",
        heading(SECTION_CAUSE)
    ));
    parts.push(format!(
        "{}\nJaga kebersihan, hindari trauma berulang, pantau perubahan.",
        heading(SECTION_PREVENTION)
    ));
    parts.push(format!("{}\n{}", heading(SECTION_DISCLAIMER), DISCLAIMER));
    if !context.references.is_empty() {
        parts.push(format!(
            "{}\n{}",
            heading(SECTION_SOURCES),
            source_lines(&context.references)
        ));
    }
    parts.push(format!("\n**Konteks yang ditemukan:**\n{}", context.context));

    parts.join("\n\n")
}

/// Minimal template used when generation produced nothing usable.
fn short_fallback(request: &ExplanationRequest, context: &FormattedContext, reason: &str) -> String {
    format!(
        "{}\n{}\n\n{}\n{}\n\n{}\n{}\n\n**Konteks yang ditemukan:**\n{}",
        heading(SECTION_PREDICTION),
        prediction_line(&request.prediction),
        heading(SECTION_REASON),
        reason,
        heading(SECTION_DISCLAIMER),
        DISCLAIMER,
        context.context
    )
}

fn append_sources(text: String, references: &[String]) -> String {
    if references.is_empty() {
        return text;
    }
    format!(
        "{}\n\n{}\n{}",
        text.trim_end(),
        heading(SECTION_SOURCES),
        source_lines(references)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NO_CONTEXT;
    use crate::errors::RagError;
    use crate::test_support::{context, record, CountingFactory, FixedCollection, HashingEmbedder};
    use std::sync::Mutex;

    struct CannedGenerator {
        reply: RagResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedGenerator {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(RagError::Generation("quota exceeded".to_string())),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    impl GenerationBackend for CannedGenerator {
        fn generate(&self, prompt: &str) -> RagResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(RagError::Generation(e.to_string())),
            }
        }
    }

    fn pitting_request() -> ExplanationRequest {
        ExplanationRequest::new(Prediction::new("pitting", 0.912).with_probs([
            ("pitting", 0.912),
            ("clubbing", 0.05),
            ("Healthy_Nail", 0.038),
        ]))
    }

    fn context_with_refs() -> FormattedContext {
        FormattedContext {
            context: "=== LITERATUR AKADEMIK ===\n[S1] Pitting is common.\n(Sumber: https://doi.org/x)"
                .to_string(),
            references: vec!["[S1] [Nail pitting review](https://doi.org/x)".to_string()],
            local_rendered: 0,
            scholar_rendered: 1,
            budget_exhausted: false,
        }
    }

    #[test]
    fn test_intent_priority() {
        assert_eq!(Intent::detect("Apakah ini berbahaya? obatnya apa?"), Intent::Danger);
        assert_eq!(Intent::detect("obat apa yang cocok"), Intent::Care);
        assert_eq!(Intent::detect("Kenapa kuku saya begini"), Intent::Cause);
        assert_eq!(Intent::detect("ini apa ya"), Intent::DiagnosisRequest);
        assert_eq!(Intent::detect("halo"), Intent::Other);
        assert_eq!(Intent::detect(""), Intent::Other);
        assert_eq!(Intent::DiagnosisRequest.to_string(), "diagnosis_request");
    }

    #[test]
    fn test_nail_domain() {
        assert!(is_nail_domain("", &[]));
        assert!(is_nail_domain("   ", &[]));
        assert!(is_nail_domain("Kuku saya berlubang", &[]));
        assert!(is_nail_domain("my NAIL BED hurts", &[]));
        assert!(is_nail_domain("apakah jari kebiruan berbahaya?", &[]));
        assert!(is_nail_domain("tentang acral lentiginous melanoma", &[]));
        assert!(is_nail_domain("what about beau lines", &["beau_lines"]));
        assert!(!is_nail_domain("resep nasi goreng", &[]));
        // "ALM" must not match inside "palm"
        assert!(!is_nail_domain("palm oil prices", &[]));
    }

    #[test]
    fn test_format_confidence_id() {
        assert_eq!(format_confidence_id(0.912), "91,2%");
        assert_eq!(format_confidence_id(1.0), "100,0%");
        assert_eq!(format_confidence_id(0.0), "0,0%");
    }

    #[test]
    fn test_top_probs_sorted_and_capped() {
        let prediction = Prediction::new("a", 0.3).with_probs(
            (0..8).map(|i| (format!("c{i}"), i as f32 / 10.0)),
        );
        let top = prediction.top_probs(TOP_PROBS);
        assert_eq!(top.len(), 6);
        assert_eq!(top[0].label, "c7");
        assert!(top.windows(2).all(|w| w[0].p >= w[1].p));
    }

    #[test]
    fn test_retrieval_query() {
        let request = pitting_request();
        assert_eq!(
            request.retrieval_query(),
            "Jelaskan secara non-diagnostik | label: pitting"
        );
        let request = request.with_prompt("apa penyebabnya?");
        assert_eq!(request.retrieval_query(), "apa penyebabnya? | label: pitting");
        assert_eq!(request.intent(), Intent::Cause);
    }

    #[test]
    fn test_generation_prompt_layout() {
        let request = pitting_request().with_prompt("apa penyebab kuku berlubang?");
        let prompt = build_generation_prompt(&request, "CTX").unwrap();

        assert!(prompt.starts_with(SYSTEM_PROMPT));
        let order = [
            "=== KONTEN ===\nCTX",
            "=== USER ===\n{\"label\":\"pitting\",\"confidence\":\"0.912\"",
            "=== INTENT TERDETEKSI ===\n- intent: cause\n",
            "=== ATURAN FORMAT ===",
            "=== DAFTAR SEKSI (WAJIB DIIKUTI) ===\n- 1. (opsional)",
            "- 7. Sumber\n\n=== PETUNJUK ISI PER SEKSI ===",
        ];
        let mut cursor = 0;
        for marker in order {
            let at = prompt[cursor..]
                .find(marker)
                .unwrap_or_else(|| panic!("missing or out of order: {marker}"));
            cursor += at + marker.len();
        }
        assert!(prompt.contains("\"confidence_str\":\"91,2%\""));
        assert!(prompt.contains("\"prompt_on_domain\":true"));
        assert!(!prompt.contains("TIDAK RELEVAN"));
        assert!(prompt.ends_with("yang benar-benar dipakai.\n"));
    }

    #[test]
    fn test_generation_prompt_without_question() {
        let prompt = build_generation_prompt(&pitting_request(), "CTX").unwrap();
        assert!(!prompt.contains(SECTION_QUESTION));
        assert!(prompt.contains("=== DAFTAR SEKSI (WAJIB DIIKUTI) ===\n- 2. Hasil prediksi"));
        assert!(prompt.contains("- intent: other\n"));
    }

    #[test]
    fn test_generation_prompt_off_domain() {
        let request = pitting_request().with_prompt("resep nasi goreng");
        let prompt = build_generation_prompt(&request, "CTX").unwrap();
        assert!(prompt.contains("\"prompt_on_domain\":false"));
        assert!(prompt.contains("TIDAK RELEVAN DENGAN DOMAIN KUKU"));
    }

    #[test]
    fn test_full_fallback_without_generator() {
        let explainer = Explainer::default();
        let request = pitting_request().with_prompt("kenapa kuku saya berlubang?");
        let text = explainer.explain_with_context(None, &request, &context_with_refs());

        assert!(text.starts_with("**1. (opsional) Tanggapan atas pertanyaan pengguna**\n"));
        assert!(text.contains("Model memperkirakan *pitting* (keyakinan 91.2%).\n"));
        assert!(text.contains("**6. Disclaimer**\n"));
        assert!(text.contains("**7. Sumber**\n- [S1] [Nail pitting review](https://doi.org/x)"));
        assert!(text.ends_with("**Konteks yang ditemukan:**\n=== LITERATUR AKADEMIK ===\n[S1] Pitting is common.\n(Sumber: https://doi.org/x)"));
        assert_eq!(text.matches("**7. Sumber**").count(), 1);
        assert!(!text.contains("Catatan:"));
    }

    #[test]
    fn test_full_fallback_sections_and_off_domain_note() {
        let explainer = Explainer::default();
        let text = explainer.explain_with_context(
            None,
            &pitting_request(),
            &FormattedContext::empty(),
        );
        assert!(text.starts_with("**2. Hasil prediksi dan deskripsi**"));
        assert!(!text.contains("**7. Sumber**"));
        assert!(text.ends_with(NO_CONTEXT));

        let off = pitting_request().with_prompt("resep nasi goreng");
        let text = explainer.explain_with_context(None, &off, &FormattedContext::empty());
        assert!(text.contains("Catatan: prompt yang Anda masukkan tampaknya tidak terkait"));
    }

    #[test]
    fn test_generator_output_gets_sources() {
        let generator = CannedGenerator::replying("  **2. Hasil prediksi dan deskripsi**\nJawaban.\n\n");
        let text = Explainer::default().explain_with_context(
            Some(&generator),
            &pitting_request(),
            &context_with_refs(),
        );
        assert_eq!(
            text,
            "**2. Hasil prediksi dan deskripsi**\nJawaban.\n\n**7. Sumber**\n- [S1] [Nail pitting review](https://doi.org/x)"
        );
        assert!(generator.last_prompt().contains("=== KONTEN ===\n=== LITERATUR AKADEMIK ==="));
    }

    #[test]
    fn test_empty_generator_output_uses_short_fallback() {
        let generator = CannedGenerator::replying("   ");
        let text = Explainer::default().explain_with_context(
            Some(&generator),
            &pitting_request(),
            &FormattedContext::empty(),
        );
        assert!(text.contains("Tidak ada respons dari LLM, gunakan konteks di bawah."));
        assert!(text.ends_with(&format!("**Konteks yang ditemukan:**\n{}", NO_CONTEXT)));
    }

    #[test]
    fn test_generator_error_uses_error_fallback() {
        let generator = CannedGenerator::failing();
        let text = Explainer::default().explain_with_context(
            Some(&generator),
            &pitting_request(),
            &context_with_refs(),
        );
        assert!(text.contains("Terjadi kendala RAG/LLM, gunakan konteks di bawah."));
        assert!(text.ends_with("**7. Sumber**\n- [S1] [Nail pitting review](https://doi.org/x)"));
    }

    #[test]
    fn test_explain_retrieves_context() {
        let ctx = context(
            HashingEmbedder::new(8),
            FixedCollection::new(
                "nail_kb",
                vec![record("l1", "Pitting tampak sebagai cekungan kecil.", "kb/pitting.md", Some(0.2))],
            ),
            FixedCollection::empty("nail_kb_scholar"),
        );
        let text = Explainer::default().explain(Some(&ctx), None, &pitting_request());
        assert!(text.contains("[L1] Pitting tampak sebagai cekungan kecil.\n(Sumber: kb/pitting.md)"));
    }

    #[test]
    fn test_explain_survives_retrieval_failure() {
        let ctx = RetrievalContext::new(Box::new(CountingFactory::failing_embedder()));
        let text = Explainer::default().explain(Some(&ctx), None, &pitting_request());
        assert!(text.ends_with(NO_CONTEXT));
        assert!(text.contains(DISCLAIMER));
    }
}
