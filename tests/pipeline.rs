//! Offline integration tests for the three pipeline steps.
//!
//! Every remote service is replaced by an in-process mock implementing the
//! library's seam traits, so these run without keys or network.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use edgequake_plan2json::{
    backend_from_keys, extract_sync, extract_to_file, list_models, parser_from_keys,
    render_model_list, structure_file, ApiKeys, Completion, DocumentParser, ExtractConfig,
    GeminiModelSource, ListConfig, ListFormat, ModelDescriptor, ModelFilter, ModelSource,
    ParsedDocument, PlanError, Provider, ResponseMode, StructureConfig, StructuredResult,
    StructuringBackend,
};
use edgequake_plan2json::prompts::REQUIRED_JSON_STRUCTURE;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ── Mocks ────────────────────────────────────────────────────────────────────

/// Structuring backend that replays a canned answer and records prompts.
struct ScriptedBackend {
    reply: Result<String, fn() -> PlanError>,
    mode: ResponseMode,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn replying(text: &str, mode: ResponseMode) -> Self {
        Self {
            reply: Ok(text.to_string()),
            mode,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(err: fn() -> PlanError) -> Self {
        Self {
            reply: Err(err),
            mode: ResponseMode::NativeJson,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuringBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn response_mode(&self) -> ResponseMode {
        self.mode
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, PlanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(Completion {
                text: text.clone(),
                model: None,
                input_tokens: Some(1200),
                output_tokens: Some(80),
            }),
            Err(make) => Err(make()),
        }
    }
}

/// Parser that returns fixed documents and records what it was asked for.
struct FixedParser {
    documents: Vec<ParsedDocument>,
    seen: Mutex<Vec<(PathBuf, String)>>,
}

impl FixedParser {
    fn new(texts: &[&str]) -> Self {
        Self {
            documents: texts
                .iter()
                .enumerate()
                .map(|(i, t)| ParsedDocument {
                    job_id: format!("job-{i}"),
                    text: t.to_string(),
                })
                .collect(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DocumentParser for FixedParser {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn parse(&self, pdf: &Path, file_name: &str) -> Result<Vec<ParsedDocument>, PlanError> {
        self.seen
            .lock()
            .unwrap()
            .push((pdf.to_path_buf(), file_name.to_string()));
        Ok(self.documents.clone())
    }
}

struct StaticModels(Vec<ModelDescriptor>);

#[async_trait]
impl ModelSource for StaticModels {
    fn name(&self) -> &str {
        "static"
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, PlanError> {
        Ok(self.0.clone())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const SAMPLE_ANSWER: &str = r#"{"project_info": {"name": "Riverside Library", "address": "12 Mill Rd", "date": "2023-11-02"}, "drawings_list": [{"sheet_number": "A-001", "description": "Cover Sheet", "revision": "1"}, {"sheet_number": "A-101", "description": "Floor Plan", "revision": "1"}, {"sheet_number": "A-201", "description": "Elevations", "revision": "0"}], "summary": "Three sheets."}"#;

fn no_keys() -> ApiKeys {
    ApiKeys::from_lookup(|_| None)
}

fn structure_config(dir: &Path) -> StructureConfig {
    StructureConfig::builder()
        .input_path(dir.join("extracted_text.md"))
        .output_path(dir.join("final_data.json"))
        .build()
        .unwrap()
}

fn write_pdf(dir: &Path) -> PathBuf {
    let path = dir.join("plans.pdf");
    std::fs::write(&path, b"%PDF-1.7\n%fake plan set\n").unwrap();
    path
}

fn extract_config(input: &Path, output: &Path) -> ExtractConfig {
    ExtractConfig::builder()
        .input(input.to_string_lossy())
        .output_path(output)
        .preview_chars(10)
        .build()
        .unwrap()
}

fn descriptor(name: &str, methods: &[&str]) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        display_name: None,
        description: None,
        input_token_limit: None,
        output_token_limit: None,
        supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
    }
}

// ── Missing keys stop each step before any request ───────────────────────────

#[test]
fn missing_google_key_stops_model_listing() {
    let err = GeminiModelSource::from_keys(&no_keys(), &ListConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, PlanError::MissingApiKey { var: "GOOGLE_API_KEY" }));
    assert!(err.is_precondition());
    assert_eq!(
        err.to_string(),
        "GOOGLE_API_KEY is not set. Add it to your .env file or export it."
    );
}

#[test]
fn missing_llama_key_stops_extraction() {
    let err = parser_from_keys(&no_keys(), &ExtractConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        PlanError::MissingApiKey {
            var: "LLAMA_CLOUD_API_KEY"
        }
    ));
}

#[test]
fn missing_openrouter_key_stops_structuring() {
    let config = StructureConfig::builder()
        .provider(Provider::OpenRouter)
        .build()
        .unwrap();
    let err = backend_from_keys(&no_keys(), &config).err().unwrap();
    assert!(matches!(
        err,
        PlanError::MissingApiKey {
            var: "OPENROUTER_API_KEY"
        }
    ));
}

// ── Structurer ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_markdown_makes_no_backend_call() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::replying(SAMPLE_ANSWER, ResponseMode::NativeJson);

    let err = structure_file(&backend, &structure_config(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::MarkdownNotFound { .. }));
    assert!(err.is_precondition());
    assert!(err
        .to_string()
        .ends_with("not found. Did you run the extract step first?"));
    assert_eq!(backend.calls(), 0);
    assert!(!dir.path().join("final_data.json").exists());
}

#[tokio::test]
async fn valid_answer_is_written_with_four_space_indent() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extracted_text.md"), "# Sheet index\nA-001 Cover").unwrap();
    let backend = ScriptedBackend::replying(SAMPLE_ANSWER, ResponseMode::NativeJson);

    let report = structure_file(&backend, &structure_config(dir.path()))
        .await
        .unwrap();

    let written = std::fs::read_to_string(dir.path().join("final_data.json")).unwrap();
    assert!(written.starts_with("{\n    \"project_info\": {\n        \"name\""));
    // Key order follows the model's answer.
    let project = written.find("project_info").unwrap();
    let drawings = written.find("\"drawings_list\"").unwrap();
    let summary = written.find("\"summary\"").unwrap();
    assert!(project < drawings && drawings < summary);

    let reparsed: serde_json::Value = serde_json::from_str(&written).unwrap();
    let expected: serde_json::Value = serde_json::from_str(SAMPLE_ANSWER).unwrap();
    assert_eq!(reparsed, expected);

    assert_eq!(backend.calls(), 1);
    assert_eq!(report.provider, "scripted");
    assert_eq!(report.model, "scripted-model");
    assert_eq!(report.result.drawings().len(), 3);
    assert_eq!(report.result.project_name(), Some("Riverside Library"));
    assert_eq!(report.input_tokens, Some(1200));
    assert!(report.preview.contains("A-101"));
    assert!(!report.preview.contains("A-201"));
}

fn keys(v: &serde_json::Value) -> Vec<&str> {
    v.as_object()
        .map(|o| o.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

#[test]
fn sample_answer_matches_the_prompted_shape() {
    let shape: serde_json::Value = serde_json::from_str(REQUIRED_JSON_STRUCTURE).unwrap();
    let answer: serde_json::Value = serde_json::from_str(SAMPLE_ANSWER).unwrap();

    assert_eq!(keys(&answer), keys(&shape));
    assert_eq!(keys(&answer["project_info"]), keys(&shape["project_info"]));
    assert_eq!(
        keys(&answer["drawings_list"][0]),
        keys(&shape["drawings_list"][0])
    );

    let result = StructuredResult(answer);
    assert_eq!(result.drawings().len(), 3);
    assert_eq!(result.project_name(), Some("Riverside Library"));
}

#[tokio::test]
async fn prompt_embeds_the_markdown_between_fixed_parts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extracted_text.md"), "SHEET A-501 DETAILS").unwrap();
    let backend = ScriptedBackend::replying("{}", ResponseMode::NativeJson);

    structure_file(&backend, &structure_config(dir.path()))
        .await
        .unwrap();

    let prompts = backend.prompts.lock().unwrap();
    let prompt = &prompts[0];
    let input_at = prompt.find("INPUT TEXT:").unwrap();
    let md_at = prompt.find("SHEET A-501 DETAILS").unwrap();
    let shape_at = prompt.find("REQUIRED JSON STRUCTURE:").unwrap();
    assert!(input_at < md_at && md_at < shape_at);
}

#[tokio::test]
async fn fenced_answer_is_accepted_in_text_mode() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extracted_text.md"), "plans").unwrap();
    let fenced = format!("```json\n{SAMPLE_ANSWER}\n```");
    let backend = ScriptedBackend::replying(&fenced, ResponseMode::FencedText);

    let report = structure_file(&backend, &structure_config(dir.path()))
        .await
        .unwrap();

    assert_eq!(report.result.summary(), Some("Three sheets."));
    let written = std::fs::read_to_string(dir.path().join("final_data.json")).unwrap();
    assert!(!written.contains("```"));
}

#[tokio::test]
async fn invalid_answer_leaves_previous_output_untouched() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extracted_text.md"), "plans").unwrap();
    let out = dir.path().join("final_data.json");
    std::fs::write(&out, "{\"previous\": true}").unwrap();
    let backend = ScriptedBackend::replying("Sorry, I cannot help with that.", ResponseMode::FencedText);

    let err = structure_file(&backend, &structure_config(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::InvalidJson { .. }));
    assert!(!err.is_precondition());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "{\"previous\": true}");
}

#[tokio::test]
async fn invalid_answer_creates_no_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extracted_text.md"), "plans").unwrap();
    let backend = ScriptedBackend::replying("{\"drawings_list\": [", ResponseMode::NativeJson);

    structure_file(&backend, &structure_config(dir.path()))
        .await
        .unwrap_err();

    assert!(!dir.path().join("final_data.json").exists());
    assert!(!dir.path().join("final_data.json.tmp").exists());
}

#[tokio::test]
async fn backend_failure_is_propagated_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extracted_text.md"), "plans").unwrap();
    let backend = ScriptedBackend::failing(|| PlanError::RateLimitExceeded {
        provider: "scripted",
        retry_after_secs: Some(30),
    });

    let err = structure_file(&backend, &structure_config(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlanError::RateLimitExceeded {
            retry_after_secs: Some(30),
            ..
        }
    ));
    assert!(!dir.path().join("final_data.json").exists());
}

// ── Extractor ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn extractor_writes_first_document_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path());
    let out = dir.path().join("extracted_text.md");
    let parser = FixedParser::new(&["# Cover\n\n| A-001 | Cover |\n", "second"]);

    let report = extract_to_file(&parser, &extract_config(&pdf, &out))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "# Cover\n\n| A-001 | Cover |\n"
    );
    assert_eq!(report.job_id, "job-0");
    assert_eq!(report.document_count, 2);
    assert_eq!(report.preview, "# Cover\n\n|");

    let seen = parser.seen.lock().unwrap();
    assert_eq!(seen[0].0, pdf);
    assert_eq!(seen[0].1, "plans.pdf");
}

#[tokio::test]
async fn extractor_without_documents_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path());
    let out = dir.path().join("extracted_text.md");
    let parser = FixedParser::new(&[]);

    let err = extract_to_file(&parser, &extract_config(&pdf, &out))
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::EmptyResponse { .. }));
    assert!(!out.exists());
}

#[tokio::test]
async fn extractor_rejects_missing_pdf_before_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("extracted_text.md");
    let parser = FixedParser::new(&["unused"]);

    let err = extract_to_file(&parser, &extract_config(&dir.path().join("nope.pdf"), &out))
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::PdfNotFound { .. }));
    assert!(parser.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn extractor_rejects_non_pdf_files() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("notes.pdf");
    std::fs::write(&fake, "plain text").unwrap();
    let parser = FixedParser::new(&["unused"]);

    let err = extract_to_file(&parser, &extract_config(&fake, &dir.path().join("o.md")))
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::NotAPdf { .. }));
}

#[test]
fn extract_sync_runs_without_a_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path());
    let out = dir.path().join("nested/extracted_text.md");
    let parser = FixedParser::new(&["sheet list"]);

    let report = extract_sync(&parser, &extract_config(&pdf, &out)).unwrap();

    assert_eq!(report.chars, 10);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "sheet list");
}

// ── Model lister ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn lister_filters_to_content_generation_by_default() {
    let source = StaticModels(vec![
        descriptor("models/embedding-001", &["embedContent"]),
        descriptor("models/gemini-2.0-flash", &["generateContent", "countTokens"]),
        descriptor("models/gemini-2.0-flash-lite", &["generateContent"]),
    ]);

    let shown = list_models(&source, &ListConfig::default()).await.unwrap();
    assert_eq!(
        render_model_list(&shown, ListFormat::Names),
        " - models/gemini-2.0-flash\n - models/gemini-2.0-flash-lite\n"
    );

    let all = ListConfig::builder().filter(ModelFilter::All).build().unwrap();
    let shown = list_models(&source, &all).await.unwrap();
    assert_eq!(shown.len(), 3);
    assert_eq!(shown[0].name, "models/embedding-001");
}

#[tokio::test]
async fn lister_with_no_matches_prints_nothing() {
    let source = StaticModels(vec![descriptor("models/aqa", &["generateAnswer"])]);
    let shown = list_models(&source, &ListConfig::default()).await.unwrap();
    assert!(shown.is_empty());
    assert_eq!(render_model_list(&shown, ListFormat::Names), "");
}
