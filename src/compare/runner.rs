//! Side-by-side comparison runs: predefined scenarios and interactive prompts.

use crate::compare::{
    Console, Generator, ReportWriter, answer_matches, extract_boxed_answer, generate_or_error,
};
use crate::models::{ComparisonRecord, Config, ModelRole, PrefbenchError, Result, RunStats};
use chrono::Utc;
use std::io::{BufRead, Write};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Scenario name recorded for interactive prompts.
pub const INTERACTIVE_SCENARIO: &str = "interactive";

/// Title built from contender aliases, e.g. "DPO vs GRPO".
pub fn comparison_title(config: &Config) -> String {
    config
        .comparison
        .contenders
        .iter()
        .map(|alias| alias.to_uppercase())
        .collect::<Vec<_>>()
        .join(" vs ")
}

/// Read one line. `None` at end of input.
pub fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut buf = String::new();
    let n = input
        .read_line(&mut buf)
        .map_err(|e| PrefbenchError::io("reading input", e))?;
    Ok((n > 0).then_some(buf))
}

/// One prompt sent to a set of models.
struct Request<'s> {
    scenario: &'s str,
    prompt: &'s str,
    max_tokens: Option<u32>,
    expected_answer: Option<&'s str>,
}

/// Runs comparisons over the configured contenders.
pub struct ComparisonRunner<'a> {
    config: &'a Config,
    generator: &'a dyn Generator,
    report: Option<ReportWriter>,
    run_id: String,
    pause: bool,
    stats: RunStats,
}

impl<'a> ComparisonRunner<'a> {
    pub fn new(config: &'a Config, generator: &'a dyn Generator) -> Self {
        Self {
            config,
            generator,
            report: None,
            run_id: Uuid::new_v4().to_string(),
            pause: config.comparison.pause,
            stats: RunStats::default(),
        }
    }

    /// Record every generation to `report`.
    pub fn with_report(mut self, report: ReportWriter) -> Self {
        self.report = Some(report);
        self
    }

    /// Override the configured pause between scenarios.
    pub fn with_pause(mut self, pause: bool) -> Self {
        self.pause = pause;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn report(&self) -> Option<&ReportWriter> {
        self.report.as_ref()
    }

    /// Run every predefined scenario in order.
    pub async fn run_scenarios<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        console: &mut Console<W>,
    ) -> Result<RunStats> {
        let config = self.config;
        config.validate()?;

        let start = Instant::now();
        self.stats = RunStats::default();

        info!(
            run_id = %self.run_id,
            scenarios = config.scenarios.len(),
            contenders = ?config.comparison.contenders,
            "Starting comparison"
        );

        console.blank()?;
        console.line(format_args!("🔬 {} Model Comparison", comparison_title(config)))?;
        console.separator('=')?;

        let contenders = &config.comparison.contenders;
        let first = contenders[0].as_str();

        for (idx, scenario) in config.scenarios.iter().enumerate() {
            console.section(format_args!("Test {}: {}", idx + 1, scenario.name))?;

            console.line("📝 Prompt:")?;
            console.indented(&scenario.prompt)?;
            console.blank()?;

            if !scenario.expected.is_empty() {
                console.line("💡 Expected:")?;
                console.indented(&scenario.expected)?;
                console.blank()?;
            }

            console.separator('-')?;

            let request = Request {
                scenario: &scenario.name,
                prompt: &scenario.prompt,
                max_tokens: scenario.max_tokens,
                expected_answer: scenario.expected_answer.as_deref(),
            };

            for contender in contenders {
                let baselines = scenario
                    .baselines
                    .iter()
                    .filter(|b| b.before.as_deref().unwrap_or(first) == contender.as_str());

                for baseline in baselines {
                    self.show_model(console, &baseline.model, ModelRole::Baseline, &request)
                        .await?;
                }

                self.show_model(console, contender, ModelRole::Contender, &request)
                    .await?;
            }

            self.stats.total_prompts += 1;

            console.blank()?;
            console.separator('-')?;

            if self.pause {
                self.wait_for_enter(input, console)?;
            }
        }

        self.print_summary(console)?;

        self.stats.runtime_secs = start.elapsed().as_secs_f64();

        info!(
            run_id = %self.run_id,
            generations = self.stats.total_generations,
            failed = self.stats.total_failed,
            runtime_secs = format!("{:.1}", self.stats.runtime_secs),
            "Comparison complete"
        );

        Ok(self.stats.clone())
    }

    /// Prompt loop: every contender answers each prompt until quit or EOF.
    pub async fn run_interactive<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        console: &mut Console<W>,
    ) -> Result<RunStats> {
        let config = self.config;
        config.validate()?;

        let start = Instant::now();
        self.stats = RunStats::default();

        console.blank()?;
        console.line("🎮 Interactive Comparison Mode")?;
        console.separator('=')?;
        console.line(format_args!(
            "Enter your prompts to compare {}.",
            comparison_title(config)
        ))?;
        console.line("Type 'quit' to exit.")?;
        console.blank()?;

        loop {
            console.prompt("Your prompt: ")?;

            let Some(line) = read_line(input)? else {
                console.blank()?;
                break;
            };

            let prompt = line.trim();

            if matches!(prompt.to_lowercase().as_str(), "quit" | "exit" | "q") {
                console.line("Goodbye! 👋")?;
                break;
            }

            if prompt.is_empty() {
                continue;
            }

            console.blank()?;
            console.separator('─')?;

            let request = Request {
                scenario: INTERACTIVE_SCENARIO,
                prompt,
                max_tokens: Some(config.comparison.interactive_max_tokens),
                expected_answer: None,
            };

            for contender in &config.comparison.contenders {
                self.show_model(console, contender, ModelRole::Contender, &request)
                    .await?;
            }

            self.stats.total_prompts += 1;

            console.separator('─')?;
            console.blank()?;
        }

        self.stats.runtime_secs = start.elapsed().as_secs_f64();
        Ok(self.stats.clone())
    }

    /// Generate with one model and print its block.
    async fn show_model<W: Write>(
        &mut self,
        console: &mut Console<W>,
        alias: &str,
        role: ModelRole,
        request: &Request<'_>,
    ) -> Result<()> {
        let config = self.config;
        let model = config.model(alias)?;

        console.blank()?;
        console.line(model.heading())?;

        let max_tokens = request.max_tokens.unwrap_or(model.max_tokens);
        let generation = generate_or_error(self.generator, model, request.prompt, max_tokens).await;
        let outcome = &generation.outcome;

        self.stats.total_generations += 1;
        if outcome.is_failure() {
            self.stats.total_failed += 1;
        }

        console.indented(&outcome.render())?;

        if outcome.is_failure() && role == ModelRole::Contender {
            if let Some(hint) = &model.setup_hint {
                console.indented(&format!("Model not found. Train it first:\n{hint}"))?;
            }
        }

        let mut boxed_answer = None;
        let mut matched = None;

        if let (Some(expected), Some(text)) = (request.expected_answer, outcome.text()) {
            boxed_answer = extract_boxed_answer(text);
            let ok = boxed_answer
                .as_deref()
                .is_some_and(|found| answer_matches(expected, found));

            self.stats.answers_checked += 1;
            if ok {
                self.stats.answers_correct += 1;
            }
            matched = Some(ok);

            let verdict = match &boxed_answer {
                Some(found) if ok => format!("✓ Answer \\boxed{{{found}}} matches expected {expected}"),
                Some(found) => format!("✗ Answer \\boxed{{{found}}}, expected {expected}"),
                None => format!("✗ No \\boxed{{}} answer found, expected {expected}"),
            };
            console.indented(&verdict)?;
        }

        if let Some(report) = &mut self.report {
            report.record(&ComparisonRecord {
                id: Uuid::new_v4().to_string(),
                run_id: self.run_id.clone(),
                scenario: request.scenario.to_string(),
                model_alias: alias.to_string(),
                model_id: model.id.clone(),
                role,
                prompt: request.prompt.to_string(),
                response: outcome.render(),
                error: outcome.error().map(ToString::to_string),
                boxed_answer,
                answer_matches: matched,
                duration_ms: generation.duration.as_millis() as u64,
                generated_at: Utc::now(),
            })?;
        }

        Ok(())
    }

    /// Block until a line is entered. End of input turns pausing off.
    fn wait_for_enter<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        console: &mut Console<W>,
    ) -> Result<()> {
        console.blank()?;
        console.prompt("Press Enter to continue to next test...")?;
        if read_line(input)?.is_none() {
            console.blank()?;
            self.pause = false;
        }
        Ok(())
    }

    fn print_summary<W: Write>(&self, console: &mut Console<W>) -> Result<()> {
        console.section("📊 Summary & Insights")?;

        console.line("Key Observations:")?;
        console.blank()?;

        console.line("1. DPO (Preference-based Training):")?;
        console.line("   ✓ Better at general conversation quality")?;
        console.line("   ✓ More helpful and structured responses")?;
        console.line("   ✓ Good for: chat, writing, helpfulness")?;
        console.blank()?;

        console.line("2. GRPO (Reward-based Training):")?;
        console.line("   ✓ Better at specific verifiable tasks")?;
        console.line("   ✓ Learns to follow formats (e.g., \\boxed{})")?;
        console.line("   ✓ Good for: math, code, reasoning")?;
        console.blank()?;

        console.line("3. When to Use Each:")?;
        console.line("   • DPO: You have human preference data (chosen/rejected pairs)")?;
        console.line("   • GRPO: You have a reward function (correct answers, test cases)")?;
        console.line("   • Both: For production models (SFT → DPO → GRPO pipeline)")?;
        console.blank()?;

        console.line("This run:")?;
        console.line(format_args!(
            "   Generations: {} ({} failed, {:.0}% succeeded)",
            self.stats.total_generations,
            self.stats.total_failed,
            self.stats.success_rate() * 100.0
        ))?;
        if self.stats.answers_checked > 0 {
            console.line(format_args!(
                "   Verified answers: {}/{} correct",
                self.stats.answers_correct, self.stats.answers_checked
            ))?;
        }
        console.blank()?;

        console.separator('=')?;
        console.blank()?;
        console.line("✅ Comparison complete!")?;
        console.blank()
    }
}
