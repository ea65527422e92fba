//! Textual classification of failed executions.

use tracing::info;

use crate::core::types::{Classification, ErrorCategory};

/// Map a failed execution's captured text onto the error taxonomy.
///
/// Matching is purely textual over `error` (and `output` only for the
/// empty-output case), first match wins; exit codes play no part:
///
/// 1. `SyntaxError` substring
/// 2. `ModuleNotFoundError` substring, extracting the module name from
///    between the last two single quotes when both exist
/// 3. `timed out` substring (the sandbox timeout contract)
/// 4. trimmed-empty `output`
/// 5. everything else
pub fn classify(output: &str, error: &str) -> Classification {
    let classification = if error.contains("SyntaxError") {
        Classification {
            category: ErrorCategory::SyntaxError,
            detail: "Syntax error detected. Please check the code structure and syntax."
                .to_string(),
        }
    } else if error.contains("ModuleNotFoundError") {
        let detail = match quoted_module_name(error) {
            Some(module) => {
                format!("Missing import for '{module}'. Ensure necessary imports are included.")
            }
            None => "Missing import detected. Ensure necessary imports are included.".to_string(),
        };
        Classification {
            category: ErrorCategory::MissingImport,
            detail,
        }
    } else if error.contains("timed out") {
        Classification {
            category: ErrorCategory::Timeout,
            detail: "Execution timed out. Consider optimizing code or simplifying logic."
                .to_string(),
        }
    } else if output.trim().is_empty() {
        Classification {
            category: ErrorCategory::EmptyOutput,
            detail: "Code executed but returned no output. Verify logic and ensure code produces output."
                .to_string(),
        }
    } else {
        Classification {
            category: ErrorCategory::GeneralError,
            detail: "General error occurred. Check the code and logic flow.".to_string(),
        }
    };

    info!(
        category = classification.category.as_str(),
        detail = %classification.detail,
        "classified execution failure"
    );
    classification
}

/// Text between the last two single quotes, if both exist.
fn quoted_module_name(error: &str) -> Option<&str> {
    let mut parts = error.rsplit('\'');
    parts.next()?;
    let module = parts.next()?;
    // A closing quote without an opening one is not an extraction.
    parts.next()?;
    Some(module)
}
