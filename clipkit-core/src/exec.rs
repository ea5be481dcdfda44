use tokio::process::Command;

/// Longest diagnostic excerpt surfaced to callers. Process output beyond
/// this is dropped, never the leading part.
pub const MAX_DIAGNOSTIC_LEN: usize = 1900;

#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &mut Command) -> std::io::Result<std::process::Output>;
}

#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait::async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, command: &mut Command) -> std::io::Result<std::process::Output> {
        command.kill_on_drop(true);
        command.output().await
    }
}

pub fn truncate_diagnostic(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_DIAGNOSTIC_LEN) {
        Some((index, _)) => trimmed[..index].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_output_at_boundary() {
        let raw = "e".repeat(4000);
        let truncated = truncate_diagnostic(raw.as_bytes());
        assert_eq!(truncated.len(), MAX_DIAGNOSTIC_LEN);
    }

    #[test]
    fn keeps_short_output_intact() {
        let truncated = truncate_diagnostic(b"  frame dropped\n");
        assert_eq!(truncated, "frame dropped");
    }

    #[test]
    fn respects_multibyte_boundaries() {
        let raw = "é".repeat(2000);
        let truncated = truncate_diagnostic(raw.as_bytes());
        assert_eq!(truncated.chars().count(), MAX_DIAGNOSTIC_LEN);
    }
}
