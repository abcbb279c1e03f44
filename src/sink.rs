//! Destinations for rendered reports and threshold violations.

use std::fmt::Write;

use anyhow::Result;

use crate::github;

/// Where markdown reports, warnings, and build failures end up. Posting is
/// fire-and-forget from the caller's point of view.
pub trait ReportSink {
    fn post_markdown_block(&mut self, text: &str);
    fn post_inline_warning(&mut self, text: &str);
    fn post_build_failure(&mut self, text: &str);
}

/// Markdown to stdout, warnings and failures to stderr.
#[derive(Debug, Default)]
pub struct TerminalSink {
    pub failures: usize,
}

impl ReportSink for TerminalSink {
    fn post_markdown_block(&mut self, text: &str) {
        println!("{text}");
    }

    fn post_inline_warning(&mut self, text: &str) {
        eprintln!("warning: {text}");
    }

    fn post_build_failure(&mut self, text: &str) {
        self.failures += 1;
        eprintln!("error: {text}");
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    pub markdown: Vec<String>,
    pub warnings: Vec<String>,
    pub failures: Vec<String>,
}

impl BufferSink {
    /// Everything collected so far as one markdown document: failures
    /// first, then warnings, then the markdown blocks.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        if !self.failures.is_empty() {
            md.push_str("| | Failures |\n|---|---|\n");
            for failure in &self.failures {
                writeln!(md, "| :no_entry_sign: | {failure} |").unwrap();
            }
            md.push('\n');
        }

        if !self.warnings.is_empty() {
            md.push_str("| | Warnings |\n|---|---|\n");
            for warning in &self.warnings {
                writeln!(md, "| :warning: | {warning} |").unwrap();
            }
            md.push('\n');
        }

        for block in &self.markdown {
            md.push_str(block);
            if !block.ends_with('\n') {
                md.push('\n');
            }
        }

        md
    }
}

impl ReportSink for BufferSink {
    fn post_markdown_block(&mut self, text: &str) {
        self.markdown.push(text.to_string());
    }

    fn post_inline_warning(&mut self, text: &str) {
        self.warnings.push(text.to_string());
    }

    fn post_build_failure(&mut self, text: &str) {
        self.failures.push(text.to_string());
    }
}

/// Buffers everything and posts it as one pull-request comment on
/// [`GitHubCommentSink::finish`].
pub struct GitHubCommentSink {
    context: github::Context,
    buffer: BufferSink,
}

impl GitHubCommentSink {
    pub fn new(context: github::Context) -> Self {
        Self {
            context,
            buffer: BufferSink::default(),
        }
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.buffer.failures.len()
    }

    /// Post the collected comment. Nothing is posted if nothing was
    /// collected.
    pub fn finish(self) -> Result<()> {
        let body = self.buffer.to_markdown();
        if body.is_empty() {
            return Ok(());
        }
        self.context.post_comment(&body)
    }
}

impl ReportSink for GitHubCommentSink {
    fn post_markdown_block(&mut self, text: &str) {
        self.buffer.post_markdown_block(text);
    }

    fn post_inline_warning(&mut self, text: &str) {
        self.buffer.post_inline_warning(text);
    }

    fn post_build_failure(&mut self, text: &str) {
        self.buffer.post_build_failure(text);
    }
}
