#[cfg(test)]
#[path = "code_blocks_test.rs"]
mod tests;

const FENCE: &str = "```";

/// Fenced code blocks found in a model response, in order of appearance.
#[derive(Default)]
pub struct CodeBlocks {
    codeblocks: Vec<String>,
}

impl CodeBlocks {
    pub fn parse(text: &str) -> CodeBlocks {
        let mut codeblocks: Vec<String> = vec![];
        let mut current_codeblock: Vec<&str> = vec![];
        let mut in_codeblock = false;

        for line in text.split('\n') {
            if line.trim().starts_with(FENCE) {
                if in_codeblock {
                    codeblocks.push(current_codeblock.join("\n"));
                    current_codeblock = vec![];
                }
                in_codeblock = !in_codeblock;
                continue;
            }

            if in_codeblock {
                current_codeblock.push(line);
            }
        }

        // Responses cut off by the token limit often miss the closing fence.
        if in_codeblock && !current_codeblock.is_empty() {
            codeblocks.push(current_codeblock.join("\n"));
        }

        return CodeBlocks { codeblocks };
    }

    pub fn first(&self) -> Option<&str> {
        return self
            .codeblocks
            .iter()
            .map(|block| return block.as_str())
            .find(|block| return !block.trim().is_empty());
    }

    pub fn len(&self) -> usize {
        return self.codeblocks.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.codeblocks.is_empty();
    }
}

/// Pulls a runnable script out of a model response. Responses without any
/// fence are taken as pure code, otherwise the first non-empty fenced block
/// wins. Returns `None` when nothing runnable is left.
pub fn extract_script(response: &str) -> Option<String> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return None;
    }

    let has_fence = trimmed
        .lines()
        .any(|line| return line.trim_start().starts_with(FENCE));
    if !has_fence {
        return Some(trimmed.to_string());
    }

    let codeblocks = CodeBlocks::parse(trimmed);
    tracing::debug!(codeblocks = codeblocks.len(), "Extracting script from response");
    if codeblocks.is_empty() {
        return None;
    }

    return codeblocks
        .first()
        .map(|block| return block.trim_end().to_string());
}
