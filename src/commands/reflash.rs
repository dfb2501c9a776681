//! Reflash command implementation

use crate::cli::{Stage, TableArgs};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reflasher_core::progress::ReflashProgress;
use reflasher_core::{ReflashSession, SessionConfig, SessionSummary};
use reflasher_http::{HttpConfig, HttpTransport};
use std::path::Path;
use std::time::Duration;

/// Progress reporter using indicatif progress bars
struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    phase: &'static str,
}

impl IndicatifProgress {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            phase: "",
        }
    }

    fn create_bar(&mut self, total: u64, phase: &'static str) {
        self.phase = phase;
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                    phase
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
    }

    fn create_spinner(&mut self, message: String) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    fn set_position(&self, pos: u32) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(u64::from(pos));
        }
    }
}

impl ReflashProgress for IndicatifProgress {
    fn downloading(&mut self, total_hint: Option<u32>) {
        match total_hint {
            Some(total) => self.create_bar(u64::from(total), "Downloading"),
            None => self.create_spinner("Downloading (size unknown)...".to_string()),
        }
    }

    fn download_progress(&mut self, bytes_written: u32) {
        self.set_position(bytes_written);
        if let Some(pb) = &self.current_bar {
            if pb.length().is_none() {
                pb.set_message(format!(
                    "Downloading... {}",
                    super::format_size(bytes_written)
                ));
            }
        }
    }

    fn erasing(&mut self, len: u32) {
        self.finish("Download staged");
        self.create_spinner(format!("Erasing {}...", super::format_size(len)));
    }

    fn copying(&mut self, total: u32) {
        self.finish("Erase complete");
        self.create_bar(u64::from(total), "Copying");
    }

    fn copy_progress(&mut self, bytes_copied: u32) {
        self.set_position(bytes_copied);
    }

    fn complete(&mut self, bytes: u32) {
        let message = format!("{} {}", self.phase, super::format_size(bytes));
        self.finish(&message);
    }
}

/// Run the reflash command
///
/// The first stage opens the session, each later stage reconfigures it. The
/// image file is only rewritten when every stage succeeded.
pub fn cmd_reflash(
    image: &Path,
    args: &TableArgs,
    running: u32,
    stages: &[Stage],
    target: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (first, rest) = stages.split_first().ok_or("At least one --stage is required")?;

    let mut flash = super::load_image(image)?;
    let table = super::load_table(args, Some(flash.data()))?;
    super::check_running(&table, running)?;

    let target = match target {
        Some(label) => Some(
            table
                .find_by_label(label)
                .cloned()
                .ok_or_else(|| format!("No partition labelled '{}'", label))?,
        ),
        None => None,
    };
    let stage_config = |stage: &Stage| -> Result<SessionConfig<HttpConfig>, Box<dyn std::error::Error>> {
        let config = SessionConfig::new(stage.destination, HttpConfig::parse(&stage.url)?);
        Ok(match &target {
            Some(partition) => config.with_target(partition.clone()),
            None => config,
        })
    };

    let mut transport = HttpTransport::new()?;
    let mut progress = IndicatifProgress::new();

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        running,
        stage_config(first)?,
    )?;
    run_stage(&mut session, first, &mut progress)?;

    for stage in rest {
        session = session.reconfigure(stage_config(stage)?)?;
        run_stage(&mut session, stage, &mut progress)?;
    }

    let summary = session.finish();
    print_summary(&summary);

    super::save_image(&flash, image)
}

fn run_stage(
    session: &mut ReflashSession<'_, reflasher_dummy::DummyFlash, HttpTransport>,
    stage: &Stage,
    progress: &mut IndicatifProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Stage {} -> {} via {}",
        stage.url,
        stage.destination,
        session.target()
    );
    let bytes = session.download_with_progress(progress)?;
    log::info!(
        "Staged {} bytes at offset {:#X} of {}",
        bytes,
        session.copy_cursor(),
        session.target().label
    );
    session.copy_to_region_with_progress(progress)?;
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("Reflash complete");
    println!("================");
    println!("Storage:     {}", summary.target);
    println!("Last dest:   {}", summary.destination);
    println!(
        "Downloads:   {} ({} bytes)",
        summary.downloads, summary.bytes_downloaded
    );
    println!(
        "Copies:      {} ({} bytes)",
        summary.copies, summary.bytes_copied
    );
}
