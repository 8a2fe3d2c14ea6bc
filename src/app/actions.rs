//! CLI command action handlers

use super::App;
use crate::config::MirrorMethod;
use crate::games::{detect_missing_frameworks, FRAMEWORKS};
use crate::launch::{GameProcessInfo, GameStatus};
use crate::mods::{format_conflict, ModMetadataPatch, ProgressCallback};
use crate::shell;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

fn import_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} | {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

impl App {
    // ========== Mod Commands ==========

    pub async fn cmd_mod_list(&self) -> Result<()> {
        let mods = self.mods.list()?;
        if mods.is_empty() {
            println!("No mods imported. Run 'silverhand mod import <archive>' to add one.");
            return Ok(());
        }

        let load_order = self.load_order()?;
        println!("Imported Mods:");
        println!("{:-<60}", "");
        for (i, m) in mods.iter().enumerate() {
            let status = if load_order.is_enabled(&m.id) { "[x]" } else { "[ ]" };
            let version = if m.metadata.version.is_empty() {
                String::new()
            } else {
                format!(" (v{})", m.metadata.version)
            };
            println!(
                "{:>3}. {} {}{} [{}]",
                i + 1,
                status,
                m.metadata.display_name,
                version,
                m.metadata.category
            );
            if m.metadata.display_name != m.id {
                println!("       id: {}", m.id);
            }
        }
        Ok(())
    }

    pub async fn cmd_mod_import(&self, archives: &[String], enable: bool) -> Result<()> {
        let mut failed = 0;
        for archive in archives {
            let pb = import_progress_bar();
            let progress: ProgressCallback = {
                let pb = pb.clone();
                Arc::new(move |entry: String, processed: usize, total: usize| {
                    pb.set_length(total as u64);
                    pb.set_position(processed as u64);
                    pb.set_message(entry);
                })
            };

            match self.import_archive(Path::new(archive), Some(progress)).await {
                Ok(package) => {
                    pb.finish_and_clear();
                    println!("Imported: {}", package.id);
                    if enable {
                        self.set_mod_enabled(&package.id, true)?;
                        println!("Enabled:  {}", package.id);
                    }
                }
                Err(e) => {
                    pb.abandon();
                    println!("Failed to import {}: {:#}", archive, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!("{} of {} archive(s) failed to import", failed, archives.len());
        }
        Ok(())
    }

    pub async fn cmd_mod_enable(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.set_mod_enabled(id, true)?;
            println!("Enabled: {}", id);
        }
        Ok(())
    }

    pub async fn cmd_mod_disable(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.set_mod_enabled(id, false)?;
            println!("Disabled: {}", id);
        }
        Ok(())
    }

    pub async fn cmd_mod_remove(&self, id: &str) -> Result<()> {
        self.remove_mod(id)?;
        println!("Removed: {}", id);
        Ok(())
    }

    pub async fn cmd_mod_info(&self, id: &str) -> Result<()> {
        let m = self.mods.get(id)?;
        let load_order = self.load_order()?;
        let position = load_order.mod_load_order.iter().position(|o| o == id);
        let meta = &m.metadata;

        println!("Mod Information");
        println!("{:-<40}", "");
        println!("Name:       {}", meta.display_name);
        println!("ID:         {}", m.id);
        println!("Enabled:    {}", if load_order.is_enabled(id) { "Yes" } else { "No" });
        if let Some(position) = position {
            println!("Load order: {}", position + 1);
        }
        println!("Category:   {}", meta.category);
        if !meta.version.is_empty() {
            println!("Version:    {}", meta.version);
        }
        if !meta.author.is_empty() {
            println!("Author:     {}", meta.author);
        }
        if !meta.tags.is_empty() {
            let tags: Vec<&str> = meta.tags.iter().map(String::as_str).collect();
            println!("Tags:       {}", tags.join(", "));
        }
        println!("Imported:   {}", meta.import_date.format("%Y-%m-%d %H:%M"));
        println!("Path:       {}", m.path.display());
        if !meta.description.is_empty() {
            println!("\n{}", meta.description);
        }
        Ok(())
    }

    pub async fn cmd_mod_edit(&self, id: &str, patch: ModMetadataPatch) -> Result<()> {
        if patch.is_empty() {
            bail!("Nothing to change. Pass at least one field, e.g. --name or --category.");
        }
        let m = self.edit_mod(id, patch)?;
        println!("Updated: {}", m.metadata.display_name);
        Ok(())
    }

    pub async fn cmd_mod_open(&self, id: &str) -> Result<()> {
        let path = self.mods.mod_path(id)?;
        shell::reveal(&path).with_context(|| format!("Could not open {}", path.display()))?;
        Ok(())
    }

    pub async fn cmd_mod_categories(&self) -> Result<()> {
        let (categories, tags) = self.mods.categories_and_tags()?;
        println!("Categories: {}", categories.join(", "));
        if tags.is_empty() {
            println!("Tags:       (none)");
        } else {
            println!("Tags:       {}", tags.join(", "));
        }
        Ok(())
    }

    // ========== Load Order Commands ==========

    pub async fn cmd_order_show(&self) -> Result<()> {
        let load_order = self.load_order()?;
        if load_order.mod_load_order.is_empty() {
            println!("Load order is empty. Enable mods with 'silverhand mod enable <id>'.");
            return Ok(());
        }

        println!("Load Order (later entries win):");
        println!("{:-<60}", "");
        for (i, id) in load_order.mod_load_order.iter().enumerate() {
            let status = if load_order.is_enabled(id) { "[x]" } else { "[ ]" };
            println!("{:>3}. {} {}", i + 1, status, id);
        }
        Ok(())
    }

    pub async fn cmd_order_set(&self, ids: Vec<String>) -> Result<()> {
        for id in &ids {
            self.mods.get(id)?;
        }
        self.set_load_order(ids)?;
        self.cmd_order_show().await
    }

    /// `position` is one-based
    pub async fn cmd_order_move(&self, id: &str, position: usize) -> Result<()> {
        self.move_mod(id, position.saturating_sub(1))?;
        self.cmd_order_show().await
    }

    // ========== Launch Commands ==========

    pub async fn cmd_conflicts(&self, verbose: bool) -> Result<()> {
        let report = self.preview().await?;

        println!("Merged files:   {}", report.total_files);
        println!("Total size:     {:.1} MiB", report.total_size_bytes as f64 / 1_048_576.0);
        println!("Conflicts:      {}", report.conflict_count);
        if let Some(path) = &report.merged_path {
            println!("Merged into:    {}", path.display());
        }
        for error in &report.errors {
            println!("Unreadable:     {}", error);
        }

        if report.conflict_count == 0 {
            return Ok(());
        }

        println!();
        if verbose {
            for record in report.conflicts() {
                println!("{}", format_conflict(&record));
            }
        } else {
            for (winner, files) in report.conflicts_by_winner() {
                println!("{} wins {} conflict(s)", winner, files.len());
            }
            println!("\nRun with --verbose to list every conflicting path.");
        }
        Ok(())
    }

    pub async fn cmd_launch(&self, wait: bool) -> Result<()> {
        println!("Building virtual environment...");
        let outcome = self.launch_game().await?;

        let mirror = &outcome.mirror;
        println!(
            "Mirrored {} game files ({} linked, {} copied)",
            mirror.linked(),
            mirror.symlinks + mirror.hard_links,
            mirror.copies
        );
        if mirror.is_degraded() {
            println!(
                "Warning: {} file(s) used a fallback method, {} failed",
                mirror.fallbacks.len(),
                mirror.failures.len()
            );
        }

        let overlay = &outcome.overlay;
        println!(
            "Applied {} mod(s): {} files, {:.1} MiB",
            overlay.mods.len(),
            overlay.files_processed,
            overlay.bytes_processed as f64 / 1_048_576.0
        );
        for skipped in &overlay.skipped {
            println!("Skipped missing mod: {}", skipped);
        }
        if overlay.error_count() > 0 {
            println!("Warning: {} mod file(s) could not be copied", overlay.error_count());
        }

        println!("Game started (pid {}) from {}", outcome.pid, outcome.virtual_path.display());

        if wait {
            let mut status = self.orchestrator.subscribe_status();
            status
                .wait_for(|s| *s == GameStatus::Idle)
                .await
                .context("Lost track of the game process")?;
            println!("Game exited.");
        }
        Ok(())
    }

    pub async fn cmd_clean(&self) -> Result<()> {
        if self.orchestrator.clean_virtual_environment().await? {
            println!("Removed virtual environment.");
        } else {
            println!("No virtual environment to remove.");
        }
        Ok(())
    }

    pub async fn cmd_status(&self) -> Result<()> {
        let load_order = self.load_order()?;
        let mods = self.mods.list()?;
        let config = self.config.read().await;
        let virtual_dir = config.virtual_dir();

        println!("Silverhand Status");
        println!("{:-<40}", "");
        match load_order.installation_path() {
            Some(path) => println!("Game:        {}", path.display()),
            None => println!("Game:        not set"),
        }
        let profile = load_order
            .profiles
            .get(&load_order.current_profile)
            .map(|p| p.name.as_str())
            .unwrap_or(&load_order.current_profile);
        println!("Profile:     {}", profile);
        println!(
            "Mods:        {} imported, {} enabled",
            mods.len(),
            load_order.enabled_mods.len()
        );
        println!("Mirror:      {}", config.mirror.method.display_name());
        if let Some(wrapper) = &config.launch.wrapper {
            println!("Wrapper:     {}", wrapper);
        }
        println!(
            "Virtual env: {} ({})",
            virtual_dir.display(),
            if virtual_dir.exists() { "present" } else { "absent" }
        );

        let info = GameProcessInfo::from(&self.orchestrator.status());
        if let Some(pid) = info.process_id {
            println!("Running:     pid {}", pid);
        }
        Ok(())
    }

    // ========== Game Commands ==========

    pub async fn cmd_game_set_path(&self, path: &str) -> Result<()> {
        let path = Path::new(path.trim());
        self.set_installation_path(path).await?;
        println!("Game installation: {}", path.display());
        Ok(())
    }

    pub async fn cmd_game_open(&self, virtual_env: bool) -> Result<()> {
        let path = if virtual_env {
            self.config.read().await.virtual_dir()
        } else {
            self.installation_path()?
        };
        shell::reveal(&path).with_context(|| format!("Could not open {}", path.display()))?;
        Ok(())
    }

    pub async fn cmd_game_frameworks(&self) -> Result<()> {
        let layout = self.game_layout().await?;

        println!("Frameworks:");
        println!("{:-<60}", "");
        for status in layout.check_frameworks() {
            let framework = status.framework;
            let marker = if status.is_installed() { "[x]" } else { "[ ]" };
            let required = if framework.required { " (required)" } else { "" };
            println!("  {} {}{}", marker, framework.name, required);
            if !status.is_installed() && !status.present.is_empty() {
                println!("      incomplete, missing: {}", status.missing.join(", "));
            }
        }
        Ok(())
    }

    /// Scan a script compiler log for errors caused by missing frameworks
    pub async fn cmd_game_check_log(&self, log: &str) -> Result<()> {
        let text = tokio::fs::read_to_string(log)
            .await
            .with_context(|| format!("Failed to read {}", log))?;
        let missing = detect_missing_frameworks(&text);
        if missing.is_empty() {
            println!("No missing frameworks detected.");
            return Ok(());
        }

        println!("The log points at missing frameworks:");
        for framework in missing {
            println!("  - {}: {}", framework.name, framework.nexus_url);
        }
        Ok(())
    }

    pub async fn cmd_game_list_frameworks(&self) -> Result<()> {
        for framework in FRAMEWORKS {
            println!("{} ({})", framework.name, framework.key);
            println!("    {}", framework.description);
        }
        Ok(())
    }

    // ========== Profile Commands ==========

    pub async fn cmd_profile_list(&self) -> Result<()> {
        let load_order = self.load_order()?;
        println!("Profiles:");
        println!("{:-<40}", "");
        for (key, profile) in &load_order.profiles {
            let marker = if *key == load_order.current_profile {
                " [active]"
            } else {
                ""
            };
            println!(
                "  {} - {} ({} mods){}",
                key,
                profile.name,
                profile.enabled_mods.len(),
                marker
            );
        }
        Ok(())
    }

    pub async fn cmd_profile_save(&self, key: &str, name: Option<&str>) -> Result<()> {
        self.modify_load_order(|load_order| {
            load_order.save_profile(key, name);
            Ok(())
        })?;
        println!("Saved profile: {}", key);
        Ok(())
    }

    pub async fn cmd_profile_switch(&self, key: &str) -> Result<()> {
        self.modify_load_order(|load_order| load_order.switch_profile(key))?;
        println!("Switched to profile: {}", key);
        Ok(())
    }

    pub async fn cmd_profile_delete(&self, key: &str) -> Result<()> {
        self.modify_load_order(|load_order| load_order.delete_profile(key))?;
        println!("Deleted profile: {}", key);
        Ok(())
    }

    // ========== Settings Commands ==========

    pub async fn cmd_settings_show(&self) -> Result<()> {
        let config = self.config.read().await;
        println!("Settings ({})", config.paths.config_file().display());
        println!("{:-<40}", "");
        println!("Mods dir:    {}", config.mods_dir().display());
        println!("Virtual dir: {}", config.virtual_dir().display());
        println!("Executable:  {}", config.launch.executable);
        if !config.launch.args.is_empty() {
            println!("Arguments:   {}", config.launch.args.join(" "));
        }
        println!(
            "Wrapper:     {}",
            config.launch.wrapper.as_deref().unwrap_or("(none)")
        );
        println!("Mirror:      {}", config.mirror.method.as_str());
        Ok(())
    }

    pub async fn cmd_settings_mirror(&self, method: &str) -> Result<()> {
        let method = match MirrorMethod::from_cli(method) {
            Some(m) => m,
            None => bail!("Unknown mirror method '{}'. Use symlink, hardlink or copy.", method),
        };
        self.set_mirror_method(method).await?;
        println!("Mirror method: {}", method.display_name());
        Ok(())
    }

    pub async fn cmd_settings_wrapper(&self, wrapper: Option<&str>) -> Result<()> {
        self.set_launch_wrapper(wrapper).await?;
        match self.config.read().await.launch.wrapper.as_deref() {
            Some(w) => println!("Launch wrapper: {}", w),
            None => println!("Launch wrapper cleared."),
        }
        Ok(())
    }
}
