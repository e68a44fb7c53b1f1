//! Prompt text for the structuring step.
//!
//! The instruction and the required JSON shape live here so a prompt change
//! touches exactly one file and unit tests can inspect the assembled prompt
//! without a live model.

/// Instruction placed before the document text.
pub const STRUCTURING_INSTRUCTIONS: &str = r#"You are an expert Data Engineer for the construction industry.
Your goal is to extract structured data from the provided Construction Plan text.

RULES:
1. Extract the "Project Information" (Name, Address, Date) if available.
2. Extract the "Index of Drawings" as a list of objects.
3. Output strictly valid JSON. Do not write markdown blocks (```json)."#;

/// JSON shape the model is asked to produce.
pub const REQUIRED_JSON_STRUCTURE: &str = r#"{
  "project_info": {
    "name": "string",
    "address": "string",
    "date": "string"
  },
  "drawings_list": [
    {
      "sheet_number": "string",
      "description": "string",
      "revision": "string"
    }
  ],
  "summary": "A 1-sentence summary of what this document is."
}"#;

/// Build the single user prompt, embedding `markdown` verbatim.
pub fn structuring_prompt(markdown: &str) -> String {
    format!(
        "\n{STRUCTURING_INSTRUCTIONS}\n\nINPUT TEXT:\n{markdown}\n\nREQUIRED JSON STRUCTURE:\n{REQUIRED_JSON_STRUCTURE}\n"
    )
}
