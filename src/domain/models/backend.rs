#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use async_trait::async_trait;

use super::LlmError;
use super::ProviderName;

const REFINE_SYSTEM_PROMPT: &str = r#"
You are a Playwright code refiner. Your job is to take recorded code and make it production-ready.

## SELECTOR STABILIZATION RULES:

1. Convert unstable selectors to stable ones. Patterns such as `.filter(has_text=re.compile(r"^$"))` or a bare `.get_by_role("link").nth(N)` break as soon as the page changes. Replace them with CSS selectors scoped by classes or ids, XPath for complex structures, or test ids when the page provides them.
2. Prefer, in order: `page.locator("css=...")`, `page.locator("xpath=...")`, `page.locator("[data-testid='...']")`, `page.locator("text=...")` for stable text.
3. Replace fixed sleeps and brittle waits with explicit waits on the element the next step needs.
4. When you cannot determine a stable selector, keep the original one and add the comment `# TODO: Verify this selector on the actual page`.

## STRUCTURE:

- Split the script into logically named steps that follow the user's task, each with a short comment.
- Keep the original interaction sequence and every point where data is read or extracted from the page.
- Add `print()` statements to report progress.

## UNDERSTANDING USER INTENT:

- If the user asks to wait for a manual login, skip the recorded login steps and pause with `input("Please complete login manually, then press Enter...")` before the post-login actions.
- If the user wants to keep the login state, use `launch_persistent_context` with a `user_data` directory.

## OUTPUT:

- Return ONLY valid, runnable code with all necessary imports. No prose, no explanations.
"#;

const FIX_SYSTEM_PROMPT: &str = r#"
You are an expert Python and Playwright debugger. Fix the script based on the error output provided.
Keep the structure, step names and comments of the script, and only change what is needed to make it run.
Return ONLY the complete fixed code, no prose.
"#;

const ANALYZE_SYSTEM_PROMPT: &str = r#"
You are an expert Python and Playwright debugger. Analyze the following script failure and provide:
1. A clear explanation of what went wrong
2. Specific suggestions for fixing each issue
3. Any potential security concerns if applicable
Be concise but thorough.
"#;

/// A single request to a completion endpoint. The script and error log are
/// already folded into `text`, they are kept alongside for logging and tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendPrompt {
    pub system: String,
    pub text: String,
    pub script: Option<String>,
    pub error_log: Option<String>,
}

impl BackendPrompt {
    pub fn new(system: &str, text: &str) -> BackendPrompt {
        return BackendPrompt {
            system: system.trim().to_string(),
            text: text.trim().to_string(),
            script: None,
            error_log: None,
        };
    }

    pub fn refine(task: &str, raw_script: &str) -> BackendPrompt {
        let text = format!(
            r#"
## User's task:
{task}

## Original recorded code:
{raw_script}

## Instructions:
1. Understand the user's task and name every step after what it achieves.
2. Preserve the selectors and the order of the main workflow actions.
3. Keep every data extraction point of the recording.
4. Output only the refined code.
"#,
            task = task.trim(),
            raw_script = raw_script.trim_end()
        );

        let mut prompt = BackendPrompt::new(REFINE_SYSTEM_PROMPT, &text);
        prompt.script = Some(raw_script.to_string());
        return prompt;
    }

    pub fn fix(script: &str, error_log: &str) -> BackendPrompt {
        let text = format!(
            "Code:\n{script}\n\nError output:\n{error_log}\n\nPlease fix the code.",
            script = script.trim_end(),
        );

        let mut prompt = BackendPrompt::new(FIX_SYSTEM_PROMPT, &text);
        prompt.script = Some(script.to_string());
        prompt.error_log = Some(error_log.to_string());
        return prompt;
    }

    pub fn analyze(script: &str, error_log: &str, issues: &[String]) -> BackendPrompt {
        let mut text = format!("Code:\n```python\n{}\n```\n\n", script.trim_end());

        if !issues.is_empty() {
            let issues_text = issues
                .iter()
                .map(|issue| return format!("- {issue}"))
                .collect::<Vec<String>>()
                .join("\n");
            text += &format!("Validation issues:\n{issues_text}\n\n");
        }

        text += &format!("Runtime error:\n{error_log}\n\nPlease analyze and provide suggestions.");

        let mut prompt = BackendPrompt::new(ANALYZE_SYSTEM_PROMPT, &text);
        prompt.script = Some(script.to_string());
        prompt.error_log = Some(error_log.to_string());
        return prompt;
    }
}

#[async_trait]
pub trait Backend {
    /// Returns the provider this backend talks to.
    fn name(&self) -> ProviderName;

    /// Used before a run to verify the endpoint, model and key are usable.
    async fn health_check(&self) -> Result<(), LlmError>;

    /// Requests a single completion. There is no retry in here, callers decide
    /// what to do with each failure.
    async fn get_completion(&self, prompt: &BackendPrompt) -> Result<String, LlmError>;
}

pub type BackendBox = Box<dyn Backend + Send + Sync>;
