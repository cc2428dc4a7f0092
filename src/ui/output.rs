use crate::collector::JobReport;
use crate::error::{EdentityError, UserFriendlyError};
use console::{style, Emoji, Term};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

/// Which log a block of pipeline output belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStream {
    Stdout,
    Stderr,
}

impl PipelineStream {
    fn name(self) -> &'static str {
        match self {
            PipelineStream::Stdout => "stdout",
            PipelineStream::Stderr => "stderr",
        }
    }
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let term = Term::stdout();
        let use_colors = match mode {
            OutputMode::Human => term.features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    /// Errors are shown even in quiet mode.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => eprintln!("{}", json_line(&json_message("error", message))),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    /// Relays captured pipeline output. Stdout goes to the operator log and
    /// respects quiet mode; stderr goes to the error log and is always shown.
    pub fn print_pipeline_output(&self, stream: PipelineStream, text: &str) {
        let text = text.trim_end();
        if text.is_empty() || (stream == PipelineStream::Stdout && self.quiet) {
            return;
        }

        let line = match self.mode {
            OutputMode::Json => json_line(&serde_json::json!({
                "type": "pipeline_output",
                "stream": stream.name(),
                "text": text,
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
            OutputMode::Human | OutputMode::Plain => text.to_string(),
        };

        match stream {
            PipelineStream::Stdout => println!("{}", line),
            PipelineStream::Stderr => eprintln!("{}", line),
        }
    }

    pub fn print_user_friendly_error(&self, error: &EdentityError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    eprintln!(
                        "{}",
                        json_line(&serde_json::json!({
                            "type": "suggestion",
                            "message": suggestion
                        }))
                    );
                }
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    pub fn print_job_report(&self, report: &JobReport) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => self.print_human_report(report),
            OutputMode::Json => match report.to_json() {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{{}}"),
            },
            OutputMode::Plain => self.print_plain_report(report),
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn highlight(&self, value: String) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value
        }
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error | MessageType::Warning => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error | MessageType::Warning => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&json_message(level, message));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!("{}", json_line(obj));
    }

    fn print_human_report(&self, report: &JobReport) {
        self.print_header(&format!("Job report: {}", report.project_name));

        println!("  State:         {}", self.highlight(report.state.to_string()));
        println!("  Reads staged:  {}", self.highlight(report.staged_files.len().to_string()));

        if let Some(ref pipeline) = report.pipeline {
            let status = pipeline
                .status
                .map_or_else(|| "killed by signal".to_string(), |s| s.to_string());
            println!("  Exit status:   {}", self.highlight(status));
            println!("  Pipeline time: {}", self.highlight(format_duration(pipeline.duration)));
        }

        if let Some(ref collection) = report.collection {
            let bytes: u64 = collection.moved.iter().map(|m| m.size).sum();
            println!(
                "  Collected:     {} files ({})",
                self.highlight(collection.moved.len().to_string()),
                format_bytes(bytes)
            );
            println!(
                "  JSON reports:  {}",
                self.highlight(collection.archived_reports.len().to_string())
            );
        }

        let elapsed = report.elapsed().to_std().unwrap_or_default();
        println!("  Total time:    {}", self.highlight(format_duration(elapsed)));

        if self.verbose_level >= 2 {
            println!();
            for stage in &report.stages {
                println!("    {:<10} {}", stage.state.to_string(), stage.reached_at.to_rfc3339());
            }
        }

        self.print_separator();
    }

    fn print_plain_report(&self, report: &JobReport) {
        println!("REPORT: {}", report.project_name);
        println!("State: {}", report.state);
        println!("Reads staged: {}", report.staged_files.len());
        if let Some(ref pipeline) = report.pipeline {
            match pipeline.status {
                Some(code) => println!("Exit status: {}", code),
                None => println!("Exit status: signal"),
            }
        }
        if let Some(ref collection) = report.collection {
            println!("Collected: {}", collection.moved.len());
            println!("JSON reports: {}", collection.archived_reports.len());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

fn json_message(level: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "message",
        "level": level,
        "message": message,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })
}

fn json_line(obj: &serde_json::Value) -> String {
    serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
